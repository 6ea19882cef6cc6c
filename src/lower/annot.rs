//! §4.E The annotation binder: `\old` ghost-snapshot materialization,
//! `\result` binding, and pre/post/loop clause lowering.
//!
//! `\old` is read uniformly as "the value at this function's entry",
//! whether it occurs in an `ensures` clause or a loop invariant — the spec
//! is silent on whether a loop resets it per iteration, and the entry-wide
//! reading needs only one snapshot per variable no matter how many clauses
//! mention it (`DESIGN.md` records this as the chosen resolution). The CFG
//! has no SSA form to read a stale value back out of once later statements
//! overwrite it, so this binder never leaves a `TermKind::Old`/`PredKind::Old`
//! node in its output — it rewrites every free variable under an `Old` into
//! a reference to a dedicated ghost variable (a quantifier binder introduced
//! inside the snapshotted expression is not "free" and is left alone), and
//! returns the `(ghost, original)` pairs the caller must splice in as
//! snapshot assignments ahead of the first place that value could change.

use std::collections::{HashMap, HashSet};
use crate::ast;
use crate::diag::LResult;
use crate::env::ResultBinding;
use crate::lower::expr::AnnotContext;
use crate::lower::Lowerer;
use crate::types::pred::{Pred, PredKind};
use crate::types::term::{Term, TermKind};
use crate::types::var::{VarFlags, VarId, VarKind};

pub struct AnnotBinder<'l, 'a> {
  pub low: &'l mut Lowerer<'a>,
}

impl<'l, 'a> AnnotBinder<'l, 'a> {
  /// `requires` clauses: no `\old`/`\result` in scope, so nothing to rewrite.
  pub fn lower_requires(&mut self, clauses: &[ast::Pred]) -> LResult<Vec<Pred>> {
    clauses.iter().map(|p| self.low.lower_pred(p, AnnotContext::Requires)).collect()
  }

  /// `decreases` clauses attached to a function's precondition.
  pub fn lower_decreases(&mut self, clauses: &[ast::Term]) -> LResult<Vec<Term>> {
    clauses.iter().map(|t| self.low.lower_term(t, AnnotContext::Requires)).collect()
  }

  /// `ensures` clauses. `result_var` is `None` for a void function.
  pub fn lower_ensures(&mut self, clauses: &[ast::Pred], result_var: Option<ResultBinding>)
    -> LResult<(Vec<Pred>, Vec<(VarId, VarId)>)> {
    self.low.env.push_result(result_var);
    let lowered = clauses.iter().map(|p| self.low.lower_pred(p, AnnotContext::Ensures)).collect::<LResult<Vec<_>>>();
    self.low.env.pop_result();
    let mut ghosts = HashMap::new();
    let rewritten = lowered?.into_iter().map(|p| self.rewrite_pred(p, &mut ghosts)).collect();
    Ok((rewritten, ghosts.into_iter().map(|(orig, ghost)| (ghost, orig)).collect()))
  }

  /// `loop invariant` clauses.
  pub fn lower_loop_invariants(&mut self, clauses: &[ast::Pred]) -> LResult<(Vec<Pred>, Vec<(VarId, VarId)>)> {
    let lowered = clauses.iter().map(|p| self.low.lower_pred(p, AnnotContext::LoopAnnot)).collect::<LResult<Vec<_>>>()?;
    let mut ghosts = HashMap::new();
    let rewritten = lowered.into_iter().map(|p| self.rewrite_pred(p, &mut ghosts)).collect();
    Ok((rewritten, ghosts.into_iter().map(|(orig, ghost)| (ghost, orig)).collect()))
  }

  /// `loop variant` (ranking function) clauses. Never mentions `\old` in
  /// practice — a ranking function is compared against its own value one
  /// iteration back, which basic-path extraction handles directly by
  /// evaluating the same term at consecutive loop-head visits — but nothing
  /// here forbids writing one, so the same rewrite still runs for consistency.
  pub fn lower_loop_variant(&mut self, clauses: &[ast::Term]) -> LResult<Vec<Term>> {
    let lowered = clauses.iter().map(|t| self.low.lower_term(t, AnnotContext::LoopAnnot)).collect::<LResult<Vec<_>>>()?;
    let mut ghosts = HashMap::new();
    Ok(lowered.into_iter().map(|t| self.rewrite_term(t, &mut ghosts)).collect())
  }

  /// Mint (or reuse) the ghost variable snapshotting `original`'s
  /// function-entry value.
  fn ghost_for(&mut self, original: VarId, ghosts: &mut HashMap<VarId, VarId>) -> VarId {
    if let Some(&g) = ghosts.get(&original) { return g }
    let data = self.low.vars.get(original);
    let (name, ty) = (data.user_name, data.ty.clone());
    let ghost = self.low.vars.fresh(name, ty, VarKind::Local, VarFlags::GHOST);
    ghosts.insert(original, ghost);
    ghost
  }

  fn rewrite_term(&mut self, t: Term, ghosts: &mut HashMap<VarId, VarId>) -> Term {
    let span = t.span;
    let ty = t.ty.clone();
    let kind = match t.kind {
      // `\old(\old(t))` already collapsed to `\old(t)` before this binder
      // ever sees it (`spec.md` §4.C), so `snapshot_term` never has to
      // collapse a nested `Old` itself — it only has to ghost every free
      // variable under this one.
      TermKind::Old(inner) => return self.snapshot_term(*inner, ghosts, &HashSet::new()),
      TermKind::Var(v) => TermKind::Var(v),
      TermKind::Const(c) => TermKind::Const(c),
      TermKind::Result => TermKind::Result,
      TermKind::Index(a, i) =>
        TermKind::Index(Box::new(self.rewrite_term(*a, ghosts)), Box::new(self.rewrite_term(*i, ghosts))),
      TermKind::Length(a) => TermKind::Length(Box::new(self.rewrite_term(*a, ghosts))),
      TermKind::ArrayUpdate(a, i, v) => TermKind::ArrayUpdate(
        Box::new(self.rewrite_term(*a, ghosts)), Box::new(self.rewrite_term(*i, ghosts)), Box::new(self.rewrite_term(*v, ghosts))),
      TermKind::Call(id, args) => TermKind::Call(id, args.into_iter().map(|a| self.rewrite_term(a, ghosts)).collect()),
      TermKind::Unary(op, a) => TermKind::Unary(op, Box::new(self.rewrite_term(*a, ghosts))),
      TermKind::Binary(op, l, r) =>
        TermKind::Binary(op, Box::new(self.rewrite_term(*l, ghosts)), Box::new(self.rewrite_term(*r, ghosts))),
      TermKind::Error => TermKind::Error,
    };
    Term::new(kind, ty, span)
  }

  fn rewrite_pred(&mut self, p: Pred, ghosts: &mut HashMap<VarId, VarId>) -> Pred {
    let span = p.span;
    let kind = match p.kind {
      // Same snapshot as `TermKind::Old`, just rooted at a predicate instead
      // of a term: every free variable under `inner` is ghosted, including
      // ones nested inside the terms `Cmp`/`App` carry.
      PredKind::Old(inner) => return self.snapshot_pred(*inner, ghosts, &HashSet::new()),
      PredKind::True => PredKind::True,
      PredKind::False => PredKind::False,
      PredKind::Error => PredKind::Error,
      PredKind::Var(v) => PredKind::Var(v),
      PredKind::Cmp { terms, ops } =>
        PredKind::Cmp { terms: terms.into_iter().map(|t| self.rewrite_term(t, ghosts)).collect(), ops },
      PredKind::App(id, args) => PredKind::App(id, args.into_iter().map(|t| self.rewrite_term(t, ghosts)).collect()),
      PredKind::Conj(ps) => PredKind::Conj(ps.into_iter().map(|p| self.rewrite_pred(p, ghosts)).collect()),
      PredKind::Disj(ps) => PredKind::Disj(ps.into_iter().map(|p| self.rewrite_pred(p, ghosts)).collect()),
      PredKind::Impl(l, r) => PredKind::Impl(Box::new(self.rewrite_pred(*l, ghosts)), Box::new(self.rewrite_pred(*r, ghosts))),
      PredKind::Iff(l, r) => PredKind::Iff(Box::new(self.rewrite_pred(*l, ghosts)), Box::new(self.rewrite_pred(*r, ghosts))),
      PredKind::Neg(inner) => PredKind::Neg(Box::new(self.rewrite_pred(*inner, ghosts))),
      PredKind::Xor(l, r) => PredKind::Xor(Box::new(self.rewrite_pred(*l, ghosts)), Box::new(self.rewrite_pred(*r, ghosts))),
      PredKind::Quant(q, ids, body) => PredKind::Quant(q, ids, Box::new(self.rewrite_pred(*body, ghosts))),
    };
    Pred::new(kind, span)
  }

  /// Ghost every free variable under an `\old`, recursing through the full
  /// term tree rather than stopping at a bare `Var` — `bound` holds the
  /// quantifier binders currently in scope, which name their own fresh
  /// `VarId`s and must pass through untouched rather than being snapshotted
  /// as if they were free references to entry-time state.
  fn snapshot_term(&mut self, t: Term, ghosts: &mut HashMap<VarId, VarId>, bound: &HashSet<VarId>) -> Term {
    let span = t.span;
    let ty = t.ty.clone();
    let kind = match t.kind {
      TermKind::Old(inner) => return self.snapshot_term(*inner, ghosts, bound),
      TermKind::Var(v) if bound.contains(&v) => TermKind::Var(v),
      TermKind::Var(v) => TermKind::Var(self.ghost_for(v, ghosts)),
      TermKind::Const(c) => TermKind::Const(c),
      TermKind::Result => TermKind::Result,
      TermKind::Index(a, i) =>
        TermKind::Index(Box::new(self.snapshot_term(*a, ghosts, bound)), Box::new(self.snapshot_term(*i, ghosts, bound))),
      TermKind::Length(a) => TermKind::Length(Box::new(self.snapshot_term(*a, ghosts, bound))),
      TermKind::ArrayUpdate(a, i, v) => TermKind::ArrayUpdate(
        Box::new(self.snapshot_term(*a, ghosts, bound)), Box::new(self.snapshot_term(*i, ghosts, bound)), Box::new(self.snapshot_term(*v, ghosts, bound))),
      TermKind::Call(id, args) => TermKind::Call(id, args.into_iter().map(|a| self.snapshot_term(a, ghosts, bound)).collect()),
      TermKind::Unary(op, a) => TermKind::Unary(op, Box::new(self.snapshot_term(*a, ghosts, bound))),
      TermKind::Binary(op, l, r) =>
        TermKind::Binary(op, Box::new(self.snapshot_term(*l, ghosts, bound)), Box::new(self.snapshot_term(*r, ghosts, bound))),
      TermKind::Error => TermKind::Error,
    };
    Term::new(kind, ty, span)
  }

  /// Predicate-level counterpart of `snapshot_term`, entered from
  /// `PredKind::Old`. Extends `bound` on the way into a `Quant` so a binder
  /// introduced *inside* the snapshotted predicate is never ghosted.
  fn snapshot_pred(&mut self, p: Pred, ghosts: &mut HashMap<VarId, VarId>, bound: &HashSet<VarId>) -> Pred {
    let span = p.span;
    let kind = match p.kind {
      PredKind::Old(inner) => return self.snapshot_pred(*inner, ghosts, bound),
      PredKind::True => PredKind::True,
      PredKind::False => PredKind::False,
      PredKind::Error => PredKind::Error,
      PredKind::Var(v) if bound.contains(&v) => PredKind::Var(v),
      PredKind::Var(v) => PredKind::Var(self.ghost_for(v, ghosts)),
      PredKind::Cmp { terms, ops } =>
        PredKind::Cmp { terms: terms.into_iter().map(|t| self.snapshot_term(t, ghosts, bound)).collect(), ops },
      PredKind::App(id, args) => PredKind::App(id, args.into_iter().map(|t| self.snapshot_term(t, ghosts, bound)).collect()),
      PredKind::Conj(ps) => PredKind::Conj(ps.into_iter().map(|p| self.snapshot_pred(p, ghosts, bound)).collect()),
      PredKind::Disj(ps) => PredKind::Disj(ps.into_iter().map(|p| self.snapshot_pred(p, ghosts, bound)).collect()),
      PredKind::Impl(l, r) => PredKind::Impl(Box::new(self.snapshot_pred(*l, ghosts, bound)), Box::new(self.snapshot_pred(*r, ghosts, bound))),
      PredKind::Iff(l, r) => PredKind::Iff(Box::new(self.snapshot_pred(*l, ghosts, bound)), Box::new(self.snapshot_pred(*r, ghosts, bound))),
      PredKind::Neg(inner) => PredKind::Neg(Box::new(self.snapshot_pred(*inner, ghosts, bound))),
      PredKind::Xor(l, r) => PredKind::Xor(Box::new(self.snapshot_pred(*l, ghosts, bound)), Box::new(self.snapshot_pred(*r, ghosts, bound))),
      PredKind::Quant(q, ids, body) => {
        let mut inner_bound = bound.clone();
        inner_bound.extend(ids.iter().copied());
        PredKind::Quant(q, ids, Box::new(self.snapshot_pred(*body, ghosts, &inner_bound)))
      }
    };
    Pred::new(kind, span)
  }
}

/// Resolve the result binding for a function with the given return slots,
/// failing if a postcondition mentions `\result` on a void function (caught
/// earlier by `AnnotContext`, not here) — this only decides scalar vs. struct
/// shape for a non-void function.
pub fn result_binding(returns: &[VarId], struct_id: Option<crate::types::registry::StructId>) -> Option<ResultBinding> {
  match (returns, struct_id) {
    ([], _) => None,
    ([v], None) => Some(ResultBinding::Scalar(*v)),
    (vs, Some(id)) => Some(ResultBinding::Struct(id, vs.to_vec())),
    (_, None) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diag::Span;
  use crate::env::Env;
  use crate::types::registry::{Type, TypeRegistry};
  use crate::types::var::VarTable;

  #[test]
  fn old_of_bare_var_rewrites_to_ghost() {
    let mut env = Env::new();
    let mut types = TypeRegistry::new();
    let mut vars = VarTable::new();
    let mut errors = Vec::new();
    let x = vars.fresh(crate::symbol::intern("x"), Type::INT, VarKind::Local, VarFlags::empty());
    let mut low = Lowerer { env: &mut env, types: &mut types, vars: &mut vars, restrict_term_calls: false, fail_fast: false, errors: &mut errors };
    let mut binder = AnnotBinder { low: &mut low };
    let t = Term::new(TermKind::Old(Box::new(Term::new(TermKind::Var(x), Type::INT, Span::DUMMY))), Type::INT, Span::DUMMY);
    let mut ghosts = HashMap::new();
    let rewritten = binder.rewrite_term(t, &mut ghosts);
    match rewritten.kind {
      TermKind::Var(g) => assert_ne!(g, x),
      _ => panic!("expected a ghost variable reference"),
    }
    assert_eq!(ghosts.len(), 1);
  }

  #[test]
  fn repeated_old_reuses_one_ghost() {
    let mut env = Env::new();
    let mut types = TypeRegistry::new();
    let mut vars = VarTable::new();
    let mut errors = Vec::new();
    let x = vars.fresh(crate::symbol::intern("x"), Type::INT, VarKind::Local, VarFlags::empty());
    let mut low = Lowerer { env: &mut env, types: &mut types, vars: &mut vars, restrict_term_calls: false, fail_fast: false, errors: &mut errors };
    let mut binder = AnnotBinder { low: &mut low };
    let mut ghosts = HashMap::new();
    let old_x = || Term::new(TermKind::Old(Box::new(Term::new(TermKind::Var(x), Type::INT, Span::DUMMY))), Type::INT, Span::DUMMY);
    let a = binder.rewrite_term(old_x(), &mut ghosts);
    let b = binder.rewrite_term(old_x(), &mut ghosts);
    assert_eq!(format!("{a:?}"), format!("{b:?}"));
  }

  #[test]
  fn old_pred_snapshots_free_variables_in_a_compound_predicate() {
    let mut env = Env::new();
    let mut types = TypeRegistry::new();
    let mut vars = VarTable::new();
    let mut errors = Vec::new();
    let x = vars.fresh(crate::symbol::intern("x"), Type::INT, VarKind::Local, VarFlags::empty());
    let y = vars.fresh(crate::symbol::intern("y"), Type::INT, VarKind::Local, VarFlags::empty());
    let mut low = Lowerer { env: &mut env, types: &mut types, vars: &mut vars, restrict_term_calls: false, fail_fast: false, errors: &mut errors };
    let mut binder = AnnotBinder { low: &mut low };
    let cmp = Pred::new(PredKind::Cmp {
      terms: vec![Term::new(TermKind::Var(x), Type::INT, Span::DUMMY), Term::new(TermKind::Var(y), Type::INT, Span::DUMMY)],
      ops: vec![crate::types::ops::CmpOp::Lt],
    }, Span::DUMMY);
    let old_cmp = Pred::new(PredKind::Old(Box::new(cmp)), Span::DUMMY);
    let mut ghosts = HashMap::new();
    let rewritten = binder.rewrite_pred(old_cmp, &mut ghosts);
    match rewritten.kind {
      PredKind::Cmp { terms, .. } => {
        for t in &terms {
          match t.kind {
            TermKind::Var(v) => assert!(v != x && v != y, "expected a ghost, not the original variable"),
            _ => panic!("expected a variable reference"),
          }
        }
      }
      _ => panic!("expected a comparison"),
    }
    assert_eq!(ghosts.len(), 2);
  }

  #[test]
  fn old_pred_does_not_snapshot_its_own_quantifier_binder() {
    let mut env = Env::new();
    let mut types = TypeRegistry::new();
    let mut vars = VarTable::new();
    let mut errors = Vec::new();
    let i = vars.fresh(crate::symbol::intern("i"), Type::INT, crate::types::var::VarKind::Quantified(crate::types::var::QuantSort::Int), VarFlags::empty());
    let mut low = Lowerer { env: &mut env, types: &mut types, vars: &mut vars, restrict_term_calls: false, fail_fast: false, errors: &mut errors };
    let mut binder = AnnotBinder { low: &mut low };
    let body = Pred::new(PredKind::Var(i), Span::DUMMY);
    let quant = Pred::new(PredKind::Quant(crate::types::pred::Quantifier::Forall, vec![i], Box::new(body)), Span::DUMMY);
    let old_quant = Pred::new(PredKind::Old(Box::new(quant)), Span::DUMMY);
    let mut ghosts = HashMap::new();
    let rewritten = binder.rewrite_pred(old_quant, &mut ghosts);
    match rewritten.kind {
      PredKind::Quant(_, ids, body) => {
        assert_eq!(ids, vec![i]);
        match body.kind {
          PredKind::Var(v) => assert_eq!(v, i, "bound variable must not be rewritten to a ghost"),
          _ => panic!("expected the bound variable reference"),
        }
      }
      _ => panic!("expected a quantifier"),
    }
    assert!(ghosts.is_empty());
  }
}
