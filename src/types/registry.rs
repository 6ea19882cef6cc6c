//! §4.A Type registry.
//!
//! Types are canonical: comparing two [`Type`]s is pointer/identity equality for
//! the interned variants (`Array`, `Fun`, `Pred`) and value equality for the
//! atomic variants, which are singletons by construction (a three-way `Copy`
//! enum has no distinct representations to intern in the first place).
//! Structs are nominal: two struct types are the same iff they carry the same
//! [`StructId`], which is assigned on first declaration and never reused.

use std::rc::Rc;
use hashbrown::HashMap;
use crate::symbol::Symbol;

/// The three atomic (scalar) types of the source and annotation languages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtomicType { Int, Float, Bool }

/// The declared length of an array type. Locals declare a compile-time constant
/// length; parameters may leave it unspecified, in which case the SMT backend
/// receives a symbolic length (see `SPEC_FULL.md` §A.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArrayLen {
  /// A compile-time constant length.
  Fixed(u32),
  /// An unspecified length, only legal on array-typed parameters. The
  /// annotation binder synthesizes one ghost length variable per such
  /// parameter for the SMT backend to treat symbolically.
  Symbolic,
}

/// `Array(elem, length)`. Element types are always atomic (data model invariant).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayTy { pub elem: AtomicType, pub len: ArrayLen }

/// `Fun(returns, params)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunTy { pub params: Vec<Type>, pub returns: Vec<Type> }

/// `Pred(params)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PredTy { pub params: Vec<Type> }

/// A struct's declared layout: the ordered list of `(member name, member type)`
/// pairs. Struct definitions stay in the registry purely to validate member
/// accesses and to drive the flattener (§4.F); they carry no run-time
/// representation of their own.
#[derive(Clone, Debug)]
pub struct StructDef { pub name: Symbol, pub members: Vec<(Symbol, AtomicType)> }

/// A stable handle into the struct table. Struct identity is nominal: this
/// handle, not structural layout comparison, is what [`Type::Struct`] equality
/// checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructId(u32);

/// A stable handle into the function table, assigned when a function's
/// signature is registered (`spec.md` §3 lifecycle: before its body is
/// lowered, so that self-recursive calls resolve).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FunId(pub(crate) u32);

/// A stable handle into the predicate table. Unlike [`FunId`], a predicate is
/// only registered once its body is fully lowered (predicates cannot recurse).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PredId(pub(crate) u32);

/// A canonical type.
#[derive(Clone, Debug, Hash)]
pub enum Type {
  /// One of `int`, `float`, `bool`.
  Atomic(AtomicType),
  /// An interned array type.
  Array(Rc<ArrayTy>),
  /// A nominal struct type.
  Struct(StructId),
  /// An interned function type.
  Fun(Rc<FunTy>),
  /// An interned predicate type.
  Pred(Rc<PredTy>),
}

impl PartialEq for Type {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Type::Atomic(a), Type::Atomic(b)) => a == b,
      (Type::Array(a), Type::Array(b)) => Rc::ptr_eq(a, b),
      (Type::Struct(a), Type::Struct(b)) => a == b,
      (Type::Fun(a), Type::Fun(b)) => Rc::ptr_eq(a, b),
      (Type::Pred(a), Type::Pred(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }
}
impl Eq for Type {}

impl Type {
  /// Shorthand for the three atomic singletons.
  pub const INT: Type = Type::Atomic(AtomicType::Int);
  /// Shorthand for the three atomic singletons.
  pub const FLOAT: Type = Type::Atomic(AtomicType::Float);
  /// Shorthand for the three atomic singletons.
  pub const BOOL: Type = Type::Atomic(AtomicType::Bool);

  /// True for `int`/`float`.
  #[must_use] pub fn is_arithmetic(&self) -> bool {
    matches!(self, Type::Atomic(AtomicType::Int | AtomicType::Float))
  }

  /// True for `bool`.
  #[must_use] pub fn is_bool(&self) -> bool { matches!(self, Type::Atomic(AtomicType::Bool)) }

  /// True for a struct type.
  #[must_use] pub fn is_struct(&self) -> bool { matches!(self, Type::Struct(_)) }
}

/// Hash-consing table for the interned type variants, plus the nominal struct
/// table. One registry is shared by an entire lowering session.
#[derive(Default)]
pub struct TypeRegistry {
  arrays: HashMap<Rc<ArrayTy>, ()>,
  funs: HashMap<Rc<FunTy>, ()>,
  preds: HashMap<Rc<PredTy>, ()>,
  structs: Vec<StructDef>,
  struct_names: HashMap<Symbol, StructId>,
}

impl TypeRegistry {
  /// Create an empty registry.
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Intern an array type.
  pub fn get_array(&mut self, elem: AtomicType, len: ArrayLen) -> Type {
    Type::Array(intern(&mut self.arrays, ArrayTy { elem, len }))
  }

  /// Intern a function type.
  pub fn get_fun(&mut self, params: Vec<Type>, returns: Vec<Type>) -> Type {
    Type::Fun(intern(&mut self.funs, FunTy { params, returns }))
  }

  /// Intern a predicate type.
  pub fn get_pred(&mut self, params: Vec<Type>) -> Type {
    Type::Pred(intern(&mut self.preds, PredTy { params }))
  }

  /// Declare a new struct, failing (returning `None`) if the name is already a
  /// struct. Cross-kind collision with a function/predicate name is checked by
  /// the symbol environment, not here (§4.B: one namespace, one table).
  pub fn declare_struct(&mut self, def: StructDef) -> Option<StructId> {
    if self.struct_names.contains_key(&def.name) { return None }
    let id = StructId(self.structs.len().try_into().expect("struct overflow"));
    self.struct_names.insert(def.name, id);
    self.structs.push(def);
    Some(id)
  }

  /// Look up a struct by name.
  #[must_use] pub fn get_struct(&self, name: Symbol) -> Option<StructId> {
    self.struct_names.get(&name).copied()
  }

  /// Resolve a struct handle to its definition.
  #[must_use] pub fn struct_def(&self, id: StructId) -> &StructDef { &self.structs[id.0 as usize] }

  /// Look up the type of a member, in declaration order index too (needed by
  /// the flattener to know which scalar slot a member occupies).
  #[must_use] pub fn member(&self, id: StructId, name: Symbol) -> Option<(usize, AtomicType)> {
    self.struct_def(id).members.iter().enumerate()
      .find_map(|(i, &(n, ty))| (n == name).then_some((i, ty)))
  }
}

fn intern<T: std::hash::Hash + Eq>(table: &mut HashMap<Rc<T>, ()>, value: T) -> Rc<T> {
  if let Some((k, ())) = table.get_key_value(&value) { return k.clone() }
  let rc = Rc::new(value);
  table.insert(rc.clone(), ());
  rc
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn atomic_types_are_singletons_by_value() {
    assert_eq!(Type::INT, Type::INT);
    assert_ne!(Type::INT, Type::BOOL);
  }

  #[test]
  fn array_types_intern_to_the_same_handle() {
    let mut reg = TypeRegistry::new();
    let a = reg.get_array(AtomicType::Int, ArrayLen::Fixed(3));
    let b = reg.get_array(AtomicType::Int, ArrayLen::Fixed(3));
    let c = reg.get_array(AtomicType::Int, ArrayLen::Fixed(4));
    assert_eq!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn struct_identity_is_nominal() {
    let mut reg = TypeRegistry::new();
    let p = crate::symbol::intern("Point");
    let id1 = reg.declare_struct(StructDef { name: p, members: vec![] }).unwrap();
    assert!(reg.declare_struct(StructDef { name: p, members: vec![] }).is_none());
    assert_eq!(reg.get_struct(p), Some(id1));
  }
}
