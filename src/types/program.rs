//! §6 The finished intermediate representation handed to basic-path extraction
//! (and, downstream, to an SMT backend out of scope here).

use crate::symbol::Symbol;
use crate::types::mir::{BlockId, Cfg};
use crate::types::pred::Pred;
use crate::types::registry::{FunId, PredId, StructId, Type, TypeRegistry};
use crate::types::var::{VarId, VarTable};

/// A flattened function parameter or return slot: a scalar variable together
/// with its atomic type. Struct-typed signature entries never survive past
/// the flattener (`spec.md` §4.F), so every slot here is atomic by construction.
#[derive(Clone, Debug)]
pub struct Slot { pub var: VarId, pub ty: Type }

/// A fully lowered, flattened, CFG-built function.
#[derive(Clone, Debug)]
pub struct Function {
  pub name: Symbol,
  pub id: FunId,
  pub params: Vec<Slot>,
  pub returns: Vec<Slot>,
  pub cfg: Cfg,
  pub precondition: BlockId,
  pub postcondition: BlockId,
}

/// A fully lowered, flattened predicate: a name, a flattened parameter list
/// and a body tree (predicates have no CFG — they are pure boolean functions
/// of their arguments, never control-flow-bearing, `spec.md` §3).
#[derive(Clone, Debug)]
pub struct Predicate {
  pub name: Symbol,
  pub id: PredId,
  pub params: Vec<Slot>,
  pub body: Pred,
}

/// The finished IR: `{ functions, predicates, structs }` per `spec.md` §6.
/// The struct registry is carried by reference (via [`TypeRegistry`]) rather
/// than duplicated, since "no information about struct parameters survives
/// past the flattener except through the struct registry for diagnostics."
pub struct Program {
  pub functions: Vec<Function>,
  pub predicates: Vec<Predicate>,
  pub types: TypeRegistry,
  pub vars: VarTable,
}

impl Program {
  #[must_use] pub fn new(types: TypeRegistry, vars: VarTable) -> Self {
    Self { functions: Vec::new(), predicates: Vec::new(), types, vars }
  }

  #[must_use] pub fn function(&self, id: FunId) -> &Function {
    self.functions.iter().find(|f| f.id == id).expect("dangling FunId")
  }

  #[must_use] pub fn struct_def_name(&self, id: StructId) -> Symbol {
    self.types.struct_def(id).name
  }
}
