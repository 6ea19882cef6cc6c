//! Source locations and the error kinds surfaced to the caller (`spec.md` §6-§7).

use crate::symbol::Symbol;
use crate::types::registry::Type;

/// A line/column range in the original source, supplied by the external parser on
/// every AST node. Lowering never constructs a `Span` from scratch; it only ever
/// copies one forward from the AST node it is processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
  /// 1-based starting line.
  pub start_line: u32,
  /// 0-based starting column.
  pub start_col: u32,
  /// 1-based ending line.
  pub end_line: u32,
  /// 0-based ending column.
  pub end_col: u32,
}

impl Span {
  /// A placeholder span for IR nodes synthesized by lowering itself (ghost
  /// `\old` snapshot assignments, desugared chained comparisons) that have no
  /// single corresponding source range; they inherit the span of the construct
  /// that generated them, so this is only used where no better span exists.
  pub const DUMMY: Span = Span { start_line: 0, start_col: 0, end_line: 0, end_col: 0 };
}

/// A value together with the source span it came from.
#[derive(Clone, Copy, Debug)]
pub struct Spanned<T> {
  /// The underlying value.
  pub node: T,
  /// Where it came from.
  pub span: Span,
}

impl<T> Spanned<T> {
  /// Pair a value with a span.
  pub fn new(node: T, span: Span) -> Self { Self { node, span } }
}

/// The error kinds listed in `spec.md` §7.
#[derive(Clone, Debug)]
pub enum ErrorKind {
  /// A top-level name collides with an existing function/struct/predicate, or a
  /// local shadows within the same scope.
  DuplicateName(Symbol),
  /// Reference to an undeclared identifier.
  UnknownName(Symbol),
  /// Arithmetic on mixed/unsupported types, non-boolean test conditions, wrong
  /// arity or wrong argument types in calls.
  TypeMismatch {
    /// What the context required.
    expected: TypeExpectation,
    /// What was actually found.
    got: Type,
  },
  /// A non-void function has a reachable non-returning path.
  MissingReturn(Symbol),
  /// `return expr;` used inside a void function.
  ReturnInVoid,
  /// `return;` used inside a non-void function.
  ReturnMissingValue,
  /// Ranking-function cardinality differs between a function's cut points.
  InconsistentRankings { function: Symbol, expected: usize, got: usize },
  /// `\result` of a struct return accessed without a member selector.
  AmbiguousResult,
  /// `\old` outside a postcondition/invariant, a quantifier in an executable
  /// expression, a predicate self-reference, a function call in a predicate
  /// body, or another form the annotation sub-languages forbid.
  IllegalAnnotationForm(&'static str),
  /// A bug in the front end. Never expected to be constructed by correct code;
  /// reserved for defensive checks that should be `debug_assert!` in spirit but
  /// are surfaced as errors instead of aborting the whole process, so that a
  /// caller embedding this library does not get SIGABRT'd by a front-end bug in
  /// someone else's input file.
  InternalInvariant(&'static str),
}

/// What a type-checking context expected, for rendering [`ErrorKind::TypeMismatch`].
#[derive(Clone, Debug)]
pub enum TypeExpectation {
  /// Exactly one concrete type was required.
  Exact(Type),
  /// Any arithmetic type (`int` or `float`, matching on both sides) was required.
  Arithmetic,
  /// A boolean/predicate-sorted value was required.
  Boolean,
  /// An array type was required.
  Array,
  /// A struct type was required.
  Struct,
  /// A specific arity was required (argument count mismatch).
  Arity(usize),
}

/// A complete error: what went wrong, and where.
#[derive(Clone, Debug)]
pub struct Diagnostic {
  /// Which error kind occurred.
  pub kind: ErrorKind,
  /// Where in the source it was detected.
  pub span: Span,
}

impl Diagnostic {
  /// Build a diagnostic.
  pub fn new(kind: ErrorKind, span: Span) -> Self { Self { kind, span } }
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ErrorKind::DuplicateName(s) => write!(f, "duplicate name `{}`", crate::symbol::resolve(*s)),
      ErrorKind::UnknownName(s) => write!(f, "unknown name `{}`", crate::symbol::resolve(*s)),
      ErrorKind::TypeMismatch { expected, got } =>
        write!(f, "type mismatch: expected {expected:?}, got {got:?}"),
      ErrorKind::MissingReturn(s) =>
        write!(f, "function `{}` has a path that falls off the end without returning", crate::symbol::resolve(*s)),
      ErrorKind::ReturnInVoid => write!(f, "return with a value in a void function"),
      ErrorKind::ReturnMissingValue => write!(f, "return with no value in a non-void function"),
      ErrorKind::InconsistentRankings { function, expected, got } => write!(f,
        "function `{}` has {got} ranking function(s) here but {expected} at another cut point",
        crate::symbol::resolve(*function)),
      ErrorKind::AmbiguousResult =>
        write!(f, "\\result of a struct-returning function must select a member"),
      ErrorKind::IllegalAnnotationForm(what) => write!(f, "illegal annotation form: {what}"),
      ErrorKind::InternalInvariant(what) => write!(f, "internal invariant violated: {what}"),
    }
  }
}

impl std::fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}: {}", self.span.start_line, self.span.start_col, self.kind)
  }
}

impl std::error::Error for Diagnostic {}

/// Result alias used throughout the lowering passes.
pub type LResult<T> = Result<T, Diagnostic>;
