//! The surface syntax tree: the seam between "external collaborators"
//! (lexer/parser, out of scope here) and the lowering pipeline.
//!
//! Every node carries a [`Span`] so errors raised while walking it can report
//! a source location (`spec.md` §6). Names are unresolved [`Symbol`]s; there
//! is no notion of a `VarId` until the symbol environment binds one.

use crate::diag::Span;
use crate::symbol::Symbol;

/// A whole parsed source file: a sequence of top-level definitions.
#[derive(Clone, Debug)]
pub struct Program {
  pub items: Vec<Item>,
}

/// One top-level definition.
#[derive(Clone, Debug)]
pub enum Item {
  Struct(StructDef),
  Predicate(PredicateDef),
  Function(FunctionDef),
}

#[derive(Clone, Debug)]
pub struct StructDef {
  pub name: Symbol,
  pub members: Vec<(Symbol, Type)>,
  pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Param {
  pub name: Symbol,
  pub ty: Type,
  pub span: Span,
}

#[derive(Clone, Debug)]
pub struct PredicateDef {
  pub name: Symbol,
  pub params: Vec<Param>,
  pub body: Pred,
  pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
  pub name: Symbol,
  pub params: Vec<Param>,
  pub returns: Vec<Type>,
  pub contract: Contract,
  pub body: Vec<Stmt>,
  pub span: Span,
}

/// The unresolved, pre-[`crate::types::registry::TypeRegistry`] surface form
/// of a type. `Named` is the only surface form that isn't self-describing —
/// it is resolved against the struct table during lowering.
#[derive(Clone, Debug)]
pub enum Type {
  Int,
  Float,
  Bool,
  Array { elem: Box<Type>, len: Option<u32> },
  Named(Symbol),
}

/// `requires`/`decreases`/`ensures` clauses attached to a function definition.
#[derive(Clone, Debug, Default)]
pub struct Contract {
  pub requires: Vec<Pred>,
  pub decreases: Vec<Term>,
  pub ensures: Vec<Pred>,
}

/// `loop invariant`/`loop variant` clauses attached to a loop statement.
#[derive(Clone, Debug, Default)]
pub struct LoopAnnotation {
  pub invariants: Vec<Pred>,
  pub variant: Vec<Term>,
}

/// A surface statement.
#[derive(Clone, Debug)]
pub enum Stmt {
  Empty,
  Expr(Expr),
  Assign(Place, Expr),
  If { cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt> },
  While { cond: Expr, annot: LoopAnnotation, body: Vec<Stmt> },
  DoWhile { body: Vec<Stmt>, cond: Expr, annot: LoopAnnotation },
  For { init: Box<Stmt>, cond: Expr, step: Box<Stmt>, annot: LoopAnnotation, body: Vec<Stmt> },
  Break(Span),
  Continue(Span),
  Return(Option<Expr>, Span),
  Assert(Pred, Span),
  Block(Vec<Stmt>),
}

/// The left-hand side of an assignment: a bare variable, an array element, or
/// a struct member (`spec.md` §4.D: `Assign`/`ArrayAssign`/`MemberAssign`).
#[derive(Clone, Debug)]
pub enum Place {
  Var(Symbol),
  Index(Symbol, Box<Expr>),
  Member(Symbol, Symbol),
}

/// The surface form of an executable expression.
#[derive(Clone, Debug)]
pub enum ExprKind {
  Var(Symbol),
  IntLit(num::BigInt),
  FloatLit(num::BigRational),
  BoolLit(bool),
  Call(Symbol, Vec<Expr>),
  Subscript(Box<Expr>, Box<Expr>),
  Member(Box<Expr>, Symbol),
  Unary(crate::types::ops::UnOp, Box<Expr>),
  Binary(crate::types::ops::BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Debug)]
pub struct Expr { pub kind: ExprKind, pub span: Span }

/// The surface form of a logical term.
#[derive(Clone, Debug)]
pub enum TermKind {
  Var(Symbol),
  IntLit(num::BigInt),
  FloatLit(num::BigRational),
  Result,
  Index(Box<Term>, Box<Term>),
  Length(Box<Term>),
  Old(Box<Term>),
  ArrayUpdate(Box<Term>, Box<Term>, Box<Term>),
  Member(Box<Term>, Symbol),
  Call(Symbol, Vec<Term>),
  Unary(crate::types::ops::UnOp, Box<Term>),
  Binary(crate::types::ops::ArithOp, Box<Term>, Box<Term>),
}

#[derive(Clone, Debug)]
pub struct Term { pub kind: TermKind, pub span: Span }

/// A single binder inside a [`PredKind::Quant`], e.g. `int i` in `\forall int i; ...`.
#[derive(Clone, Debug)]
pub struct QuantBinder { pub name: Symbol, pub sort: QuantSortSurface, pub span: Span }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantSortSurface { Bool, Int, Real }

/// The surface form of a predicate.
#[derive(Clone, Debug)]
pub enum PredKind {
  True,
  False,
  Cmp { terms: Vec<Term>, ops: Vec<crate::types::ops::CmpOp> },
  App(Symbol, Vec<Term>),
  Old(Box<Pred>),
  Conj(Vec<Pred>),
  Disj(Vec<Pred>),
  Impl(Box<Pred>, Box<Pred>),
  Iff(Box<Pred>, Box<Pred>),
  Neg(Box<Pred>),
  Xor(Box<Pred>, Box<Pred>),
  Quant(crate::types::pred::Quantifier, Vec<QuantBinder>, Box<Pred>),
}

#[derive(Clone, Debug)]
pub struct Pred { pub kind: PredKind, pub span: Span }
