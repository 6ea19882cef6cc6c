//! §3 Variables and the α-renaming table.
//!
//! `StructVariable` from the data model is *not* represented here: it is a
//! transient name-resolution concept (a declared name standing for a bundle of
//! already-allocated scalar member variables) that only ever exists as a binding
//! in the symbol environment (`env.rs`); it never gets a `VarId` of its own and
//! is erased the moment the flattener rewrites a signature (§4.F). Every
//! [`VarId`] minted here is already scalar.

use bitflags::bitflags;
use crate::symbol::Symbol;
use crate::types::registry::{StructId, Type};

/// A variable handle. Every *defining* occurrence of a variable in a function
/// gets a distinct, monotonically-increasing `VarId` — this is the α-renaming
/// `spec.md` §3/§9 requires so that basic paths concatenate into a well-formed
/// single-static-assignment block for the prover.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl std::fmt::Display for VarId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "_{}", self.0) }
}

/// The three sorts a quantified variable may range over in the predicate
/// sub-language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuantSort { Bool, Int, Real }

/// What kind of variable a [`VarId`] denotes.
#[derive(Clone, Copy, Debug)]
pub enum VarKind {
  /// An ordinary local (includes parameters and the scalar slots a flattened
  /// struct parameter/return decomposes into — those are *also* tagged
  /// [`VarKind::Member`] so the flattener and diagnostics can still name the
  /// struct member a given scalar came from).
  Local,
  /// A scalar standing for the `index`-th member of an instance of `owner`.
  Member { owner: StructId, index: u32 },
  /// A variable bound by a quantifier in a predicate, or the sort carried by a
  /// ghost length variable synthesized for an `Unknown`-length array parameter.
  Quantified(QuantSort),
}

bitflags! {
  /// Bookkeeping flags on a variable, orthogonal to its [`VarKind`].
  #[derive(Clone, Copy, Debug, PartialEq, Eq)]
  pub struct VarFlags: u8 {
    /// Materialized by the annotation binder to hold an `\old(x)` snapshot of
    /// `x` taken at function entry (or loop-head entry).
    const GHOST = 1 << 0;
    /// Bound to (a member of) `\result`.
    const RESULT = 1 << 1;
  }
}

/// Everything the pipeline needs to know about one variable.
#[derive(Clone, Debug)]
pub struct VarData {
  /// The name as written by the user, kept separately from the α-renamed
  /// identity (`VarId`) purely for diagnostics.
  pub user_name: Symbol,
  /// The variable's type. Always atomic or array — never `Struct` (struct
  /// members are atomic by data-model invariant, and whole-struct variables
  /// never get a `VarId`; see the module doc).
  pub ty: Type,
  pub kind: VarKind,
  pub flags: VarFlags,
}

/// The table backing α-renaming: a flat, append-only list of [`VarData`],
/// indexed by [`VarId`]. One table per function (consistent with `spec.md`
/// §9: "a monotonic counter *per function*").
#[derive(Default, Debug)]
pub struct VarTable { vars: Vec<VarData> }

impl VarTable {
  /// An empty table.
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Mint a fresh variable.
  pub fn fresh(&mut self, user_name: Symbol, ty: Type, kind: VarKind, flags: VarFlags) -> VarId {
    let id = VarId(self.vars.len().try_into().expect("variable overflow"));
    self.vars.push(VarData { user_name, ty, kind, flags });
    id
  }

  /// Look up a variable's data.
  #[must_use] pub fn get(&self, id: VarId) -> &VarData { &self.vars[id.0 as usize] }

  /// Iterate all variables in minting order, with their handles.
  pub fn iter(&self) -> impl Iterator<Item = (VarId, &VarData)> {
    self.vars.iter().enumerate().map(|(i, d)| (VarId(i.try_into().expect("variable overflow")), d))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::registry::Type;

  #[test]
  fn fresh_ids_are_monotonic_and_distinct() {
    let mut t = VarTable::new();
    let n = crate::symbol::intern("x");
    let a = t.fresh(n, Type::INT, VarKind::Local, VarFlags::empty());
    let b = t.fresh(n, Type::INT, VarKind::Local, VarFlags::empty());
    assert_ne!(a, b);
    assert_eq!(format!("{a}"), "_0");
    assert_eq!(format!("{b}"), "_1");
  }
}
