//! §3/§4.C Executable expressions: the sub-language of the verified program
//! itself, as opposed to its annotations.

use crate::diag::Span;
use crate::types::ops::{BinOp, Const, UnOp};
use crate::types::registry::{FunId, Type};
use crate::types::var::VarId;

/// One node of the executable-expression tree. Every node is typed at
/// construction time; there is no untyped intermediate form (`spec.md` §9:
/// three disjoint tagged variants make "a predicate where an expression was
/// required" a construction-time impossibility — the same reasoning applies to
/// mixing up which tree a node belongs to).
#[derive(Clone, Debug)]
pub enum ExecExprKind {
  /// A variable reference. `s.field` has no node of its own: a struct-typed
  /// name never gets a `VarId` (struct locals live in the symbol environment
  /// as a bundle of already-allocated member `VarId`s, see `env.rs`), so
  /// member access resolves straight to a `Var` of the member's own scalar
  /// slot at lowering time rather than staying around as a projection node.
  Var(VarId),
  /// A literal constant.
  Const(Const),
  /// A call to a user function. Ill-typed outside statement position if the
  /// callee has zero return values (`spec.md` §4.C edge cases) — enforced by
  /// the lowering visitor, not representable here (this node only exists where
  /// the call has exactly one return value, the arity required of a value
  /// position).
  Call(FunId, Vec<ExecExpr>),
  /// `a[i]`.
  Subscript(Box<ExecExpr>, Box<ExecExpr>),
  /// A unary operator application.
  Unary(UnOp, Box<ExecExpr>),
  /// A binary operator application.
  Binary(BinOp, Box<ExecExpr>, Box<ExecExpr>),
  /// Stands in for a sub-expression that failed to lower. Lets the visitor
  /// keep walking the rest of a definition after an error instead of
  /// aborting outright (`SPEC_FULL.md` §A.7); the definition is discarded
  /// regardless once lowering finishes, so this node is never seen downstream.
  Error,
}

/// A typed, spanned executable-expression node.
#[derive(Clone, Debug)]
pub struct ExecExpr {
  pub kind: ExecExprKind,
  pub ty: Type,
  pub span: Span,
}

impl ExecExpr {
  /// Build a node, pairing a kind with its type and source span.
  pub fn new(kind: ExecExprKind, ty: Type, span: Span) -> Self { Self { kind, ty, span } }
}
