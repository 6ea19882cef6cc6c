//! §4.F Struct flattening: rewrites a struct-typed parameter/return into its
//! ordered scalar member slots at the point a function or predicate's
//! signature is registered, so the CFG, the annotation binder and the symbol
//! environment's struct-local map only ever deal with bundles of scalar
//! `VarId`s — a whole-struct `VarId` never exists past this point
//! (`crate::types::var` module doc).

use crate::ast;
use crate::diag::{Diagnostic, ErrorKind, LResult, Span, TypeExpectation};
use crate::env::ResultBinding;
use crate::lower::Lowerer;
use crate::types::ops::CmpOp;
use crate::types::pred::{Pred, PredKind};
use crate::types::program::Slot;
use crate::types::registry::{ArrayLen, StructId, Type};
use crate::types::term::{Term, TermKind};
use crate::types::var::{QuantSort, VarFlags, VarId, VarKind};

/// Resolve a surface type against the struct table, interning arrays as needed.
pub fn resolve_type(low: &mut Lowerer, ty: &ast::Type, span: Span) -> LResult<Type> {
  match ty {
    ast::Type::Int => Ok(Type::INT),
    ast::Type::Float => Ok(Type::FLOAT),
    ast::Type::Bool => Ok(Type::BOOL),
    ast::Type::Array { elem, len } => {
      let elem_ty = resolve_type(low, elem, span)?;
      let atomic = match elem_ty {
        Type::Atomic(a) => a,
        got => return Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Arithmetic, got }, span)),
      };
      let len = len.map_or(ArrayLen::Symbolic, ArrayLen::Fixed);
      Ok(low.types.get_array(atomic, len))
    }
    ast::Type::Named(name) => low.types.get_struct(*name).map(Type::Struct)
      .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*name), span)),
  }
}

/// Mint one fresh scalar `VarId` per member of `struct_id`, in declaration
/// order, each tagged [`VarKind::Member`] so diagnostics can still name the
/// struct member a given scalar came from.
fn flatten_struct(low: &mut Lowerer, struct_id: StructId) -> Vec<VarId> {
  let def = low.types.struct_def(struct_id).clone();
  def.members.iter().enumerate()
    .map(|(i, &(name, atomic))| low.vars.fresh(
      name, Type::Atomic(atomic), VarKind::Member { owner: struct_id, index: i as u32 }, VarFlags::empty()))
    .collect()
}

/// Declare one parameter in the symbol environment, flattening it first if
/// its resolved type is a struct. Returns the ordered scalar `VarId`s it
/// expands to (length 1 for an atomic/array parameter).
pub fn declare_param(low: &mut Lowerer, param: &ast::Param) -> LResult<Vec<VarId>> {
  let ty = resolve_type(low, &param.ty, param.span)?;
  match ty {
    Type::Struct(struct_id) => {
      let members = flatten_struct(low, struct_id);
      low.env.declare_struct_local(param.name, struct_id, members.clone(), param.span)?;
      Ok(members)
    }
    scalar_or_array => {
      let var = low.vars.fresh(param.name, scalar_or_array, VarKind::Local, VarFlags::empty());
      low.env.declare_local(param.name, var, param.span)?;
      Ok(vec![var])
    }
  }
}

/// A ghost `int` variable standing in for an `Unknown`-length array
/// parameter's length (`SPEC_FULL.md` §A.7), paired with the array variable
/// it describes. The caller binds it with a precondition assertion
/// (`length_assertion`) rather than a snapshot assignment, since there is no
/// concrete value to copy — the array's actual length is never known to this
/// front end, only asserted equal to the ghost for the SMT backend to reason
/// about symbolically.
pub struct LengthGhost { pub ghost: VarId, pub array: VarId }

/// `ghost == \length(array)`, to be folded into the function's `requires`
/// list alongside the user-written ones.
pub fn length_assertion(low: &Lowerer, g: &LengthGhost, span: Span) -> Pred {
  let array_ty = low.vars.get(g.array).ty.clone();
  let array_term = Term::new(TermKind::Var(g.array), array_ty, span);
  let len_term = Term::new(TermKind::Length(Box::new(array_term)), Type::INT, span);
  let ghost_term = Term::new(TermKind::Var(g.ghost), Type::INT, span);
  Pred::new(PredKind::Cmp { terms: vec![ghost_term, len_term], ops: vec![CmpOp::Eq] }, span)
}

/// Flatten a function or predicate's parameter list into the scalar slot
/// list `types::program::Function::params`/`Predicate::params` carries,
/// alongside one [`LengthGhost`] per `Unknown`-length array parameter among
/// them.
pub fn flatten_params(low: &mut Lowerer, params: &[ast::Param]) -> LResult<(Vec<Slot>, Vec<LengthGhost>)> {
  let mut slots = Vec::new();
  let mut length_ghosts = Vec::new();
  for p in params {
    for var in declare_param(low, p)? {
      let ty = low.vars.get(var).ty.clone();
      if let Type::Array(arr) = &ty {
        if arr.len == ArrayLen::Symbolic {
          let name = low.vars.get(var).user_name;
          let ghost = low.vars.fresh(name, Type::INT, VarKind::Quantified(QuantSort::Int), VarFlags::GHOST);
          length_ghosts.push(LengthGhost { ghost, array: var });
        }
      }
      slots.push(Slot { var, ty });
    }
  }
  Ok((slots, length_ghosts))
}

/// What a function's return type list flattens to: the ordered scalar return
/// slots, plus how `\result` should resolve against them in the postcondition.
pub struct FlattenedReturn {
  pub slots: Vec<Slot>,
  pub result_binding: Option<ResultBinding>,
}

/// Flatten a function's return type. The only two shapes `spec.md` §4.F
/// allows: no return type (void), or exactly one — scalar, array, or struct,
/// the last expanding to that struct's member slots exactly as a struct
/// parameter does. A function declaring more than one return type directly
/// (rather than bundling them into a struct) is rejected here rather than in
/// the parser, since "at most one declared return type" is a lowering-level
/// simplification, not a surface-grammar restriction.
pub fn flatten_returns(low: &mut Lowerer, returns: &[ast::Type], span: Span) -> LResult<FlattenedReturn> {
  match returns {
    [] => Ok(FlattenedReturn { slots: vec![], result_binding: None }),
    [one] => {
      let ty = resolve_type(low, one, span)?;
      match ty {
        Type::Struct(struct_id) => {
          let members = flatten_struct(low, struct_id);
          let slots = members.iter().map(|&var| Slot { var, ty: low.vars.get(var).ty.clone() }).collect();
          Ok(FlattenedReturn { slots, result_binding: Some(ResultBinding::Struct(struct_id, members)) })
        }
        scalar_or_array => {
          let var = low.vars.fresh(crate::symbol::Symbol::RESULT, scalar_or_array.clone(), VarKind::Local, VarFlags::RESULT);
          Ok(FlattenedReturn { slots: vec![Slot { var, ty: scalar_or_array }], result_binding: Some(ResultBinding::Scalar(var)) })
        }
      }
    }
    _ => Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm(
      "a function declares at most one return type; bundle multiple values into a struct"), span)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::env::Env;
  use crate::types::registry::{StructDef, TypeRegistry};
  use crate::types::var::VarTable;

  fn sym(s: &str) -> crate::symbol::Symbol { crate::symbol::intern(s) }

  #[test]
  fn struct_return_flattens_to_member_count_slots() {
    let mut env = Env::new();
    let mut types = TypeRegistry::new();
    let mut vars = VarTable::new();
    let mut errors = Vec::new();
    let struct_id = types.declare_struct(StructDef {
      name: sym("Point"),
      members: vec![(sym("x"), crate::types::registry::AtomicType::Int), (sym("y"), crate::types::registry::AtomicType::Int)],
    }).unwrap();
    let mut low = Lowerer { env: &mut env, types: &mut types, vars: &mut vars, restrict_term_calls: false, fail_fast: false, errors: &mut errors };
    let returns = vec![ast::Type::Named(sym("Point"))];
    let flattened = flatten_returns(&mut low, &returns, Span::DUMMY).unwrap();
    assert_eq!(flattened.slots.len(), 2);
    match flattened.result_binding {
      Some(ResultBinding::Struct(id, members)) => { assert_eq!(id, struct_id); assert_eq!(members.len(), 2); }
      _ => panic!("expected a struct result binding"),
    }
  }

  #[test]
  fn symbolic_length_array_param_gets_one_length_ghost() {
    let mut env = Env::new();
    let mut types = TypeRegistry::new();
    let mut vars = VarTable::new();
    let mut errors = Vec::new();
    let mut low = Lowerer { env: &mut env, types: &mut types, vars: &mut vars, restrict_term_calls: false, fail_fast: false, errors: &mut errors };
    low.env.push_scope();
    let params = vec![
      param("a", ast::Type::Array { elem: Box::new(ast::Type::Int), len: None }),
      param("n", ast::Type::Int),
    ];
    let (slots, length_ghosts) = flatten_params(&mut low, &params).unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(length_ghosts.len(), 1);
    assert_eq!(length_ghosts[0].array, slots[0].var);
    assert_ne!(length_ghosts[0].ghost, slots[0].var);
    assert_eq!(low.vars.get(length_ghosts[0].ghost).ty, Type::INT);
  }

  #[test]
  fn fixed_length_array_param_gets_no_length_ghost() {
    let mut env = Env::new();
    let mut types = TypeRegistry::new();
    let mut vars = VarTable::new();
    let mut errors = Vec::new();
    let mut low = Lowerer { env: &mut env, types: &mut types, vars: &mut vars, restrict_term_calls: false, fail_fast: false, errors: &mut errors };
    low.env.push_scope();
    let params = vec![param("a", ast::Type::Array { elem: Box::new(ast::Type::Int), len: Some(4) })];
    let (_, length_ghosts) = flatten_params(&mut low, &params).unwrap();
    assert!(length_ghosts.is_empty());
  }

  fn param(name: &str, ty: ast::Type) -> ast::Param { ast::Param { name: sym(name), ty, span: Span::DUMMY } }

  #[test]
  fn void_return_has_no_result_binding() {
    let mut env = Env::new();
    let mut types = TypeRegistry::new();
    let mut vars = VarTable::new();
    let mut errors = Vec::new();
    let mut low = Lowerer { env: &mut env, types: &mut types, vars: &mut vars, restrict_term_calls: false, fail_fast: false, errors: &mut errors };
    let flattened = flatten_returns(&mut low, &[], Span::DUMMY).unwrap();
    assert!(flattened.slots.is_empty());
    assert!(flattened.result_binding.is_none());
  }
}
