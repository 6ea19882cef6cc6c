//! §3/§4.C Logical terms: the value-denoting sub-language of annotations.
//!
//! A term is never boolean-sorted ("booleans are not terms", `spec.md` §3);
//! comparisons and connectives live exclusively in [`crate::types::pred`].

use crate::diag::Span;
use crate::types::ops::{ArithOp, Const, UnOp};
use crate::types::registry::{FunId, Type};
use crate::types::var::VarId;

/// One node of the logical-term tree.
#[derive(Clone, Debug)]
pub enum TermKind {
  /// A variable reference (includes the `\old`-snapshot ghost variables the
  /// annotation binder materializes, and the scalar slots a flattened struct
  /// decomposes into). `s.field` and `\result.field` both resolve straight to
  /// this — a struct-typed name never gets its own `VarId` (see `env.rs`), so
  /// member access is just a compile-time lookup of which scalar slot `field`
  /// names, with no separate projection node.
  Var(VarId),
  /// A literal constant (never `Const::Bool` — booleans are not terms).
  Const(Const),
  /// `\result`, only meaningful inside a postcondition's scope. Resolved to a
  /// concrete return variable (or left as this marker pending a member
  /// selector, see `spec.md` §4.E) by the annotation binder.
  Result,
  /// `a[i]`, reading an array term. Not explicitly named in `spec.md` §3's
  /// term grammar list but required for any invariant/postcondition that reads
  /// array contents (`SPEC_FULL.md` §A.7 supplements this).
  Index(Box<Term>, Box<Term>),
  /// `\length(a)`.
  Length(Box<Term>),
  /// `\old(t)`, rewritten by the annotation binder so every free variable in
  /// `t` refers to its entry-snapshot ghost variable. A nested `\old(\old(t))`
  /// collapses to `\old(t)` — the outer wins (`spec.md` §4.C edge cases) — so
  /// by the time lowering finishes no `Old` node ever contains another `Old`.
  Old(Box<Term>),
  /// `{t \with [i] = v}`, a functional array update of the same type as `t`.
  ArrayUpdate(Box<Term>, Box<Term>, Box<Term>),
  /// A call to a user *function* (predicates cannot be called from a term —
  /// that is an [`crate::diag::ErrorKind::IllegalAnnotationForm`]). Every
  /// function in this language is pure by construction (no side-effectful
  /// expressions, `spec.md` §1 Non-goals), which is the sense in which
  /// `spec.md` §3 means "no Call except to pure ... operators".
  Call(FunId, Vec<Term>),
  /// A unary operator application.
  Unary(UnOp, Box<Term>),
  /// A binary arithmetic operator application.
  Binary(ArithOp, Box<Term>, Box<Term>),
  /// See [`crate::types::expr::ExecExprKind::Error`].
  Error,
}

/// A typed, spanned term node.
#[derive(Clone, Debug)]
pub struct Term {
  pub kind: TermKind,
  pub ty: Type,
  pub span: Span,
}

impl Term {
  /// Build a node, pairing a kind with its type and source span.
  pub fn new(kind: TermKind, ty: Type, span: Span) -> Self { Self { kind, ty, span } }

  /// True if this term (recursively) mentions `\old`. Used by the annotation
  /// binder's own construction logic, not by user code, so collapsing nested
  /// `Old` needs no separate post-pass: the binder only ever wraps a `t` that
  /// it already knows is `Old`-free (it un-wraps before re-wrapping).
  #[must_use] pub fn is_old(&self) -> bool { matches!(self.kind, TermKind::Old(_)) }
}
