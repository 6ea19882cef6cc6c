//! §4.B Symbol environment.
//!
//! One namespace holds every top-level name (struct, function, predicate) so
//! a name used for a function cannot also name a struct or predicate — the
//! same "one enum, not three tables" trick mmcc's `Entity` uses to enforce
//! cross-kind collisions for free, just by sharing a single `HashMap` key space.
//! Locals live in a separate stack of scope frames, pushed at function entry
//! and at each statement block, popped on exit (`spec.md` §3 Lifecycle).

use hashbrown::HashMap;
use crate::diag::{Diagnostic, ErrorKind, Span};
use crate::symbol::Symbol;
use crate::types::registry::{FunId, PredId, StructId, Type};
use crate::types::var::VarId;

/// Registration status of a function. Functions are forward-declared the
/// moment their signature is fixed, so a self-recursive call resolves while
/// the body is still being lowered (`spec.md` §3 Lifecycle).
#[derive(Clone, Copy, Debug)]
pub enum FunStatus {
  ForwardDeclared,
  Defined,
}

#[derive(Clone, Debug)]
pub struct FunEntry {
  pub id: FunId,
  pub sig: Type,
  pub status: FunStatus,
  pub span: Span,
}

/// A predicate is only entered into the table once its body has been fully
/// lowered, so it is never seen in a "forward declared" state and can never
/// call itself (`spec.md` §3 Lifecycle).
#[derive(Clone, Debug)]
pub struct PredEntry {
  pub id: PredId,
  pub sig: Type,
  pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructEntry {
  pub id: StructId,
  pub span: Span,
}

/// A top-level name's binding, tagged by what kind of thing it names.
#[derive(Clone, Debug)]
pub enum Entity {
  Struct(StructEntry),
  Function(FunEntry),
  Predicate(PredEntry),
}

impl Entity {
  #[must_use] pub fn span(&self) -> Span {
    match self {
      Entity::Struct(e) => e.span,
      Entity::Function(e) => e.span,
      Entity::Predicate(e) => e.span,
    }
  }
}

/// One lexical frame of local bindings.
#[derive(Default, Debug)]
struct Scope {
  vars: HashMap<Symbol, VarId>,
  /// Struct-typed locals never get their own `VarId` (see the module doc on
  /// [`crate::types::var::VarKind::Member`]): this records the struct type
  /// and the ordered list of flattened member `VarId`s a struct-typed name
  /// stands for instead.
  struct_vars: HashMap<Symbol, (StructId, Vec<VarId>)>,
}

/// What `\result` is bound to in the current annotation scope.
#[derive(Clone, Debug)]
pub enum ResultBinding {
  /// A function with exactly one scalar return value.
  Scalar(VarId),
  /// A function returning a struct, pre-flattened into ordered member slots
  /// (`spec.md` §4.F) — bare `\result` is [`crate::diag::ErrorKind::AmbiguousResult`]
  /// here; only `\result.field` resolves.
  Struct(StructId, Vec<VarId>),
}

/// The full symbol environment for one lowering session: the unified
/// top-level table plus the local scope stack.
#[derive(Default, Debug)]
pub struct Env {
  top_level: HashMap<Symbol, Entity>,
  scopes: Vec<Scope>,
  /// `\result`'s binding, set on entry to a non-void function body and to a
  /// postcondition, cleared on exit (`spec.md` §4.B: "`\result` (bound when
  /// the enclosing function has non-void return)"). `None` for a void
  /// function's scope.
  result: Vec<Option<ResultBinding>>,
}

impl Env {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Register a top-level name, failing with `DuplicateName` if it already
  /// names anything (struct, function or predicate) in this single namespace.
  pub fn declare_top_level(&mut self, name: Symbol, entity: Entity, span: Span) -> Result<(), Diagnostic> {
    if self.top_level.contains_key(&name) {
      return Err(Diagnostic { kind: ErrorKind::DuplicateName(name), span });
    }
    self.top_level.insert(name, entity);
    Ok(())
  }

  #[must_use] pub fn lookup_top_level(&self, name: Symbol) -> Option<&Entity> { self.top_level.get(&name) }

  pub fn mark_function_defined(&mut self, name: Symbol) {
    if let Some(Entity::Function(e)) = self.top_level.get_mut(&name) { e.status = FunStatus::Defined }
  }

  /// Push a fresh local scope (function entry or a `{ ... }` block).
  pub fn push_scope(&mut self) { self.scopes.push(Scope::default()) }

  /// Pop the innermost local scope.
  pub fn pop_scope(&mut self) { self.scopes.pop().expect("scope stack underflow"); }

  /// Bind a local in the *current* (innermost) scope, failing with
  /// `DuplicateName` if it shadows within that same scope (shadowing an outer
  /// scope's binding is allowed — `resolve` always prefers the innermost).
  pub fn declare_local(&mut self, name: Symbol, var: VarId, span: Span) -> Result<(), Diagnostic> {
    let frame = self.scopes.last_mut().expect("declare_local outside any scope");
    if frame.vars.contains_key(&name) {
      return Err(Diagnostic { kind: ErrorKind::DuplicateName(name), span });
    }
    frame.vars.insert(name, var);
    Ok(())
  }

  /// Resolve a local, searching from the innermost scope outward.
  #[must_use] pub fn resolve_local(&self, name: Symbol) -> Option<VarId> {
    self.scopes.iter().rev().find_map(|s| s.vars.get(&name).copied())
  }

  /// Bind a struct-typed local to its struct type and flattened member
  /// `VarId`s, in declaration order, in the current scope.
  pub fn declare_struct_local(&mut self, name: Symbol, struct_id: StructId, members: Vec<VarId>, span: Span) -> Result<(), Diagnostic> {
    let frame = self.scopes.last_mut().expect("declare_struct_local outside any scope");
    if frame.vars.contains_key(&name) || frame.struct_vars.contains_key(&name) {
      return Err(Diagnostic { kind: ErrorKind::DuplicateName(name), span });
    }
    frame.struct_vars.insert(name, (struct_id, members));
    Ok(())
  }

  /// Resolve a struct-typed local's type and flattened members, searching outward.
  #[must_use] pub fn resolve_struct_local(&self, name: Symbol) -> Option<(StructId, &[VarId])> {
    self.scopes.iter().rev().find_map(|s| s.struct_vars.get(&name).map(|(id, m)| (*id, m.as_slice())))
  }

  /// Bind `\result` for the scope of a postcondition (or annotation) over a
  /// function body.
  pub fn push_result(&mut self, binding: Option<ResultBinding>) { self.result.push(binding) }
  pub fn pop_result(&mut self) { self.result.pop(); }
  #[must_use] pub fn current_result(&self) -> Option<&ResultBinding> { self.result.last().and_then(Option::as_ref) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sym(s: &str) -> Symbol { crate::symbol::intern(s) }

  #[test]
  fn cross_kind_collision_is_rejected() {
    let mut env = Env::new();
    let name = sym("Point");
    env.declare_top_level(name, Entity::Struct(StructEntry { id: StructId_for_test(), span: Span::DUMMY }), Span::DUMMY).unwrap();
    let err = env.declare_top_level(
      name,
      Entity::Predicate(PredEntry { id: PredId_for_test(), sig: Type::BOOL, span: Span::DUMMY }),
      Span::DUMMY,
    ).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateName(_)));
  }

  #[test]
  fn inner_scope_shadows_outer() {
    use crate::types::var::{VarFlags, VarKind, VarTable};
    let mut vars = VarTable::new();
    let x = sym("x");
    let outer = vars.fresh(x, Type::INT, VarKind::Local, VarFlags::empty());
    let inner = vars.fresh(x, Type::INT, VarKind::Local, VarFlags::empty());

    let mut env = Env::new();
    env.push_scope();
    env.declare_local(x, outer, Span::DUMMY).unwrap();
    env.push_scope();
    env.declare_local(x, inner, Span::DUMMY).unwrap();
    assert_eq!(env.resolve_local(x), Some(inner));
    env.pop_scope();
    assert_eq!(env.resolve_local(x), Some(outer));
    env.pop_scope();
  }

  // test-only handle constructors: `StructId`/`PredId` have private fields, so
  // tests reach them through the registry rather than fabricating values directly.
  fn StructId_for_test() -> StructId {
    let mut reg = crate::types::registry::TypeRegistry::new();
    reg.declare_struct(crate::types::registry::StructDef { name: sym("S_test"), members: vec![] }).unwrap()
  }
  fn PredId_for_test() -> PredId {
    PredId(0)
  }
}
