//! §3/§4.C Predicates: the truth-denoting sub-language of annotations.

use crate::diag::Span;
use crate::types::ops::CmpOp;
use crate::types::registry::PredId;
use crate::types::term::Term;
use crate::types::var::VarId;

/// `∀` or `∃`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantifier { Forall, Exists }

/// One node of the predicate tree.
#[derive(Clone, Debug)]
pub enum PredKind {
  /// The trivially true proposition.
  True,
  /// The trivially false proposition.
  False,
  /// A chain of relational comparisons, `t0 ⊙0 t1 ⊙1 t2 ...`. Already
  /// desugared from `a ⊙0 b ⊙1 c` surface syntax into the conjunction-of-
  /// adjacent-pairs form at construction time — `terms.len() == ops.len() + 1`
  /// — with each shared sub-term (`b` above) appearing once, not duplicated,
  /// so the lowered term is only evaluated once (`spec.md` §4.C edge cases).
  Cmp { terms: Vec<Term>, ops: Vec<CmpOp> },
  /// A call to a predicate. No self-recursion is possible by construction
  /// (`spec.md` §3 lifecycle: a predicate is only registered, hence callable,
  /// once its own body is fully lowered).
  App(PredId, Vec<Term>),
  /// A bare reference to a boolean-sorted variable used as an atomic truth
  /// value: a `\forall bool b; ...`-bound proposition (`spec.md` §4.C lists
  /// `boolean` among the three quantifiable sorts, and a bound boolean
  /// variable has nowhere else to appear in the grammar but here), or a ghost
  /// variable the CFG builder snapshots a non-decomposable boolean test
  /// condition into before using it as an edge guard.
  Var(VarId),
  /// `\old(p)`, rewritten the same way as [`crate::types::term::TermKind::Old`].
  Old(Box<Pred>),
  /// N-ary conjunction.
  Conj(Vec<Pred>),
  /// N-ary disjunction.
  Disj(Vec<Pred>),
  /// Implication, predicate-only (no implication in executable expressions).
  Impl(Box<Pred>, Box<Pred>),
  /// If-and-only-if.
  Iff(Box<Pred>, Box<Pred>),
  /// Negation.
  Neg(Box<Pred>),
  /// Exclusive or, predicate-only.
  Xor(Box<Pred>, Box<Pred>),
  /// A quantifier over one or more binders of sort `bool | int | real`.
  Quant(Quantifier, Vec<VarId>, Box<Pred>),
  /// See [`crate::types::expr::ExecExprKind::Error`].
  Error,
}

/// A spanned predicate node. Predicates have no `Type` field (unlike
/// [`crate::types::expr::ExecExpr`]/[`Term`]) since `Pred` is itself the sort —
/// there is nothing further to classify.
#[derive(Clone, Debug)]
pub struct Pred {
  pub kind: PredKind,
  pub span: Span,
}

impl Pred {
  /// Build a node, pairing a kind with its source span.
  pub fn new(kind: PredKind, span: Span) -> Self { Self { kind, span } }

  /// The constant `true` predicate at a given span — used by the annotation
  /// binder when a function/loop declares no explicit clauses of a kind, and
  /// by the `requires \true;`/`ensures \true;` round-trip law in `spec.md` §8.
  #[must_use] pub fn truth(span: Span) -> Self { Self::new(PredKind::True, span) }

  /// Conjoin a list of clauses, collapsing the empty list to `\true` and a
  /// singleton to itself rather than wrapping in a pointless `Conj([p])`
  /// (`spec.md` §8's law that adding `\true` does not change the path count
  /// relies on conjunction not multiplying out spuriously).
  #[must_use] pub fn conj(mut clauses: Vec<Pred>, span: Span) -> Self {
    match clauses.len() {
      0 => Self::truth(span),
      1 => clauses.pop().unwrap(),
      _ => Self::new(PredKind::Conj(clauses), span),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conj_of_empty_is_true() {
    let p = Pred::conj(vec![], Span::DUMMY);
    assert!(matches!(p.kind, PredKind::True));
  }

  #[test]
  fn conj_of_one_is_identity() {
    let inner = Pred::new(PredKind::False, Span::DUMMY);
    let p = Pred::conj(vec![inner], Span::DUMMY);
    assert!(matches!(p.kind, PredKind::False));
  }
}
