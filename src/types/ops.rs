//! Operators shared by the executable-expression, term and predicate sub-languages.

/// A literal constant. `Float` uses an exact rational rather than IEEE `f64`
/// since this system reasons about the annotation language's `real` SMT sort,
/// not about machine rounding (`spec.md` §1 Non-goals excludes generating
/// executable code, so there is no rounding behavior to be faithful to).
#[derive(Clone, Debug, PartialEq)]
pub enum Const {
  /// An arbitrary-precision integer literal.
  Int(num::BigInt),
  /// An exact rational literal.
  Float(num::BigRational),
  /// A boolean literal.
  Bool(bool),
}

/// Arithmetic binary operators. `%` is integer-only (`spec.md` §4.C).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithOp { Add, Sub, Mul, Div, Mod }

/// Relational comparison operators. In the predicate sub-language these chain
/// (`spec.md` §3): `a < b < c` desugars to `(a < b) ∧ (b < c)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp { Lt, Le, Gt, Ge, Eq, Ne }

/// Boolean binary operators available in executable expressions (no implication
/// or xor there — those exist only in the predicate sub-language).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoolOp { And, Or }

/// A unary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
  /// Arithmetic negation, `int`/`float` to the same type.
  Neg,
  /// Boolean negation.
  Not,
}

/// The binary operator of an executable expression: the union of arithmetic,
/// comparison and boolean operators (terms use [`ArithOp`] directly, since a
/// term is never boolean-sorted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
  /// An arithmetic operator.
  Arith(ArithOp),
  /// A comparison operator, producing `Bool`.
  Cmp(CmpOp),
  /// A boolean connective, requiring both operands to be `Bool`.
  Bool(BoolOp),
}
