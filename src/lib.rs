//! Front end and basic-path extractor for a deductive program verifier
//! (`spec.md` §1 Overview): lowers a parsed syntax tree into a typed,
//! struct-free control flow graph whose cut blocks carry proof obligations,
//! then decomposes that graph into the finite stream of loop-free segments
//! an SMT backend checks one at a time.
//!
//! [`lower_program`] is the single entry point. It registers struct
//! definitions, then lowers predicates and functions in declaration order —
//! a function's signature is fixed (and so callable) before its own body is
//! lowered, so self-recursion resolves; a predicate is only registered after
//! its body is fully lowered, so it can never call itself (`spec.md` §3
//! Lifecycle). Each top-level definition either fully lowers or contributes
//! nothing to the finished [`types::program::Program`] but one [`diag::Diagnostic`]
//! to the result's error list — recovery is local to the definition that
//! failed (`spec.md` §7).

pub mod ast;
pub mod basic_path;
pub mod consistency;
pub mod diag;
pub mod env;
pub mod flatten;
pub mod lower;
pub mod symbol;
#[cfg(test)]
mod test_support;
pub mod types;

use diag::{Diagnostic, ErrorKind, LResult};
#[cfg(test)]
use diag::Span;
use env::{Entity, Env, FunEntry, FunStatus, PredEntry, StructEntry};
use lower::annot::AnnotBinder;
use lower::expr::AnnotContext;
use lower::stmt::Builder;
use lower::Lowerer;
use types::mir::{Block, BlockId, Cfg, PostconditionBlock, PreconditionBlock, Terminator};
use types::program::{Function, Predicate, Program};
use types::registry::{AtomicType, FunId, PredId, StructDef, Type, TypeRegistry};
use types::var::{VarId, VarTable};

/// Pipeline configuration (`SPEC_FULL.md` §A.4). Built by the embedding
/// driver; there is no file-based config format, since this crate has no
/// standalone executable and no persisted settings of its own.
#[derive(Clone, Copy, Debug)]
pub struct LowerOptions {
  /// Stop at the first error in the first top-level definition instead of
  /// the default `spec.md` §7 behavior of recovering per-definition.
  pub fail_fast: bool,
  /// Resolves `spec.md` §9 Open Question (i). Reserved for a future
  /// extension that forward-declares every function before lowering any
  /// body: this front end only ever processes one in-order pass, so a term
  /// can never observe a function that hasn't been declared yet regardless
  /// of this flag — see [`lower::Lowerer::restrict_term_calls`].
  pub restrict_term_calls: bool,
}

impl Default for LowerOptions {
  fn default() -> Self { Self { fail_fast: false, restrict_term_calls: true } }
}

/// What [`lower_program`] produces: the finished program, if at least one
/// top-level definition fully lowered, plus every diagnostic recovered from
/// along the way (`SPEC_FULL.md` §A.2).
pub struct LowerResult {
  pub program: Option<Program>,
  pub errors: Vec<Diagnostic>,
}

/// Lower a whole parsed program (`spec.md` §3/§7).
pub fn lower_program(program: &ast::Program, options: LowerOptions) -> LowerResult {
  let mut types = TypeRegistry::new();
  let mut vars = VarTable::new();
  let mut env = Env::new();
  let mut errors = Vec::new();
  let mut functions = Vec::new();
  let mut predicates = Vec::new();
  let mut any_succeeded = false;

  // Structs first: they have no body to lower and nothing else can resolve
  // a member access until the struct table is populated.
  for item in &program.items {
    if let ast::Item::Struct(def) = item {
      match declare_struct(&mut types, &mut env, def) {
        Ok(()) => { log::debug!("declared struct `{}`", symbol::resolve(def.name)); any_succeeded = true; }
        Err(e) => errors.push(e),
      }
    }
  }

  let mut next_fun_id = 0u32;
  let mut next_pred_id = 0u32;

  'items: for item in &program.items {
    match item {
      ast::Item::Struct(_) => {}
      ast::Item::Predicate(def) => {
        let id = PredId(next_pred_id);
        next_pred_id += 1;
        match lower_predicate(&mut env, &mut types, &mut vars, def, id, options) {
          Ok(pred) => {
            log::trace!("predicate `{}` registered", symbol::resolve(def.name));
            predicates.push(pred);
            any_succeeded = true;
          }
          Err(e) => {
            errors.push(e);
            if options.fail_fast { break 'items }
          }
        }
      }
      ast::Item::Function(def) => {
        let id = FunId(next_fun_id);
        next_fun_id += 1;
        match lower_function(&mut env, &mut types, &mut vars, def, id, options) {
          Ok(fun) => {
            let paths = basic_path::basic_paths(&fun.cfg).len();
            log::debug!("function `{}` lowered: {paths} basic path(s)", symbol::resolve(def.name));
            functions.push(fun);
            any_succeeded = true;
          }
          Err(e) => {
            errors.push(e);
            if options.fail_fast { break 'items }
          }
        }
      }
    }
  }

  let program = any_succeeded.then(|| {
    let mut program = Program::new(types, vars);
    program.functions = functions;
    program.predicates = predicates;
    program
  });
  LowerResult { program, errors }
}

/// Register one struct definition. Struct members are required to be atomic
/// (`spec.md` §4.A invariant: "struct members are atomic"); an array- or
/// struct-typed field is rejected here rather than ever reaching the
/// flattener, since the flattener's scalar-member assumption is a data model
/// invariant, not something it re-checks.
fn declare_struct(types: &mut TypeRegistry, env: &mut Env, def: &ast::StructDef) -> Result<(), Diagnostic> {
  let mut members = Vec::with_capacity(def.members.len());
  for (name, ty) in &def.members {
    let atomic = match ty {
      ast::Type::Int => AtomicType::Int,
      ast::Type::Float => AtomicType::Float,
      ast::Type::Bool => AtomicType::Bool,
      ast::Type::Array { .. } | ast::Type::Named(_) =>
        return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm("struct fields must be atomic"), def.span)),
    };
    members.push((*name, atomic));
  }
  let id = types.declare_struct(StructDef { name: def.name, members })
    .ok_or_else(|| Diagnostic::new(ErrorKind::DuplicateName(def.name), def.span))?;
  env.declare_top_level(def.name, Entity::Struct(StructEntry { id, span: def.span }), def.span)
}

fn lower_predicate(env: &mut Env, types: &mut TypeRegistry, vars: &mut VarTable,
  def: &ast::PredicateDef, id: PredId, options: LowerOptions) -> Result<Predicate, Diagnostic> {
  let mut errors = Vec::new();
  let mut low = Lowerer {
    env, types, vars, restrict_term_calls: options.restrict_term_calls, fail_fast: options.fail_fast, errors: &mut errors,
  };
  low.env.push_scope();
  let result = build_predicate(&mut low, def, id);
  low.env.pop_scope();
  result.map_err(|e| low.report(e))
}

/// A predicate is only entered into the symbol table once its body has been
/// fully lowered (`spec.md` §3 Lifecycle) — a self-reference inside `body`
/// therefore fails with `UnknownName`, which is exactly how predicate
/// self-recursion is rejected; no separate check is needed.
fn build_predicate(low: &mut Lowerer, def: &ast::PredicateDef, id: PredId) -> LResult<Predicate> {
  // A predicate has no precondition block to bind a length ghost into (no
  // CFG at all, `types::program::Predicate`), and its body has no mutation
  // to snapshot against, so `\length` on one of its array parameters is used
  // directly as a term wherever it's written — no ghost synthesis needed.
  let (params, _length_ghosts) = flatten::flatten_params(low, &def.params)?;
  let param_types: Vec<Type> = params.iter().map(|s| s.ty.clone()).collect();
  let body = low.lower_pred(&def.body, AnnotContext::Requires)?;
  let sig = low.types.get_pred(param_types);
  low.env.declare_top_level(def.name, Entity::Predicate(PredEntry { id, sig, span: def.span }), def.span)?;
  Ok(Predicate { name: def.name, id, params, body })
}

fn lower_function(env: &mut Env, types: &mut TypeRegistry, vars: &mut VarTable,
  def: &ast::FunctionDef, id: FunId, options: LowerOptions) -> Result<Function, Diagnostic> {
  let mut errors = Vec::new();
  let mut low = Lowerer {
    env, types, vars, restrict_term_calls: options.restrict_term_calls, fail_fast: options.fail_fast, errors: &mut errors,
  };
  low.env.push_scope();
  let result = build_function(&mut low, def, id);
  low.env.pop_scope();
  match result {
    Ok(fun) => { low.env.mark_function_defined(def.name); Ok(fun) }
    Err(e) => Err(low.report(e)),
  }
}

/// Build one function's CFG end to end: flatten the signature and register
/// it (so a self-recursive call inside the body resolves), lower
/// `requires`/`decreases` onto a fresh precondition block, lower `ensures`
/// onto a fresh postcondition block (splicing any `\old` ghosts it needs
/// into the entry block), lower the body between them, then gate the whole
/// thing on ranking-function consistency (`spec.md` §4.D-§4.H).
fn build_function(low: &mut Lowerer, def: &ast::FunctionDef, id: FunId) -> LResult<Function> {
  let (params, length_ghosts) = flatten::flatten_params(low, &def.params)?;
  let flatten::FlattenedReturn { slots: returns, result_binding } = flatten::flatten_returns(low, &def.returns, def.span)?;

  let param_types: Vec<Type> = params.iter().map(|s| s.ty.clone()).collect();
  let return_types: Vec<Type> = returns.iter().map(|s| s.ty.clone()).collect();
  let sig = low.types.get_fun(param_types, return_types);
  low.env.declare_top_level(def.name, Entity::Function(FunEntry {
    id, sig, status: FunStatus::ForwardDeclared, span: def.span,
  }), def.span)?;

  let return_vars: Vec<VarId> = returns.iter().map(|s| s.var).collect();

  let mut requires = {
    let mut binder = AnnotBinder { low: &mut *low };
    binder.lower_requires(&def.contract.requires)?
  };
  requires.extend(length_ghosts.iter().map(|g| flatten::length_assertion(low, g, def.span)));
  let ranking_functions = {
    let mut binder = AnnotBinder { low: &mut *low };
    binder.lower_decreases(&def.contract.decreases)?
  };

  let mut cfg = Cfg::new();
  let precondition = cfg.push(Block::Precondition(PreconditionBlock {
    assertions: requires, ranking_functions, terminator: Terminator::Goto(BlockId::ENTRY),
  }));
  let entry = cfg.push_basic();
  if let Block::Precondition(b) = cfg.block_mut(precondition) { b.terminator = Terminator::Goto(entry); }

  let mut binder = AnnotBinder { low: &mut *low };
  let (ensures, old_ghosts) = binder.lower_ensures(&def.contract.ensures, result_binding)?;
  let postcondition = cfg.push(Block::Postcondition(PostconditionBlock { assertions: ensures }));

  let mut builder = Builder::new(&mut *low, cfg, postcondition, entry, return_vars);
  builder.splice_ghost_snapshots(old_ghosts);
  builder.lower_block(&def.body)?;
  let cfg = builder.finish(def.name, def.span)?;

  consistency::check_ranking_consistency(&cfg, def.name, def.span)?;

  Ok(Function { name: def.name, id, params, returns, cfg, precondition, postcondition })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ops::{BinOp, CmpOp, Const};

  fn sym(s: &str) -> crate::symbol::Symbol { crate::symbol::intern(s) }
  fn span() -> Span { Span::DUMMY }

  fn var(name: &str) -> ast::Expr { ast::Expr { kind: ast::ExprKind::Var(sym(name)), span: span() } }
  fn int(v: i64) -> ast::Expr { ast::Expr { kind: ast::ExprKind::IntLit(v.into()), span: span() } }
  fn int_term(v: i64) -> ast::Term { ast::Term { kind: ast::TermKind::IntLit(v.into()), span: span() } }
  fn var_term(name: &str) -> ast::Term { ast::Term { kind: ast::TermKind::Var(sym(name)), span: span() } }
  fn cmp(op: CmpOp, a: ast::Term, b: ast::Term) -> ast::Pred {
    ast::Pred { kind: ast::PredKind::Cmp { terms: vec![a, b], ops: vec![op] }, span: span() }
  }
  fn param(name: &str, ty: ast::Type) -> ast::Param { ast::Param { name: sym(name), ty, span: span() } }

  /// `int abs(int x) ensures \result >= 0 { if (x < 0) return -x; else return x; }`
  /// gives two disjoint returning paths, so two basic paths from precondition
  /// to postcondition (`spec.md` §8 scenario 1).
  #[test]
  fn abs_value_lowers_to_two_basic_paths() {
    crate::test_support::init_logging();
    let neg_x = ast::Expr {
      kind: ast::ExprKind::Unary(crate::types::ops::UnOp::Neg, Box::new(var("x"))), span: span(),
    };
    let cond = ast::Expr {
      kind: ast::ExprKind::Binary(BinOp::Cmp(CmpOp::Lt), Box::new(var("x")), Box::new(int(0))), span: span(),
    };
    let body = vec![ast::Stmt::If {
      cond,
      then_branch: vec![ast::Stmt::Return(Some(neg_x), span())],
      else_branch: vec![ast::Stmt::Return(Some(var("x")), span())],
    }];
    let ensures = vec![cmp(CmpOp::Ge, ast::Term { kind: ast::TermKind::Result, span: span() }, int_term(0))];
    let def = ast::FunctionDef {
      name: sym("abs"),
      params: vec![param("x", ast::Type::Int)],
      returns: vec![ast::Type::Int],
      contract: ast::Contract { requires: vec![], decreases: vec![], ensures },
      body,
      span: span(),
    };
    let program = ast::Program { items: vec![ast::Item::Function(def)] };
    let result = lower_program(&program, LowerOptions::default());
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    let program = result.program.expect("abs should lower");
    let paths = basic_path::basic_paths(&program.functions[0].cfg);
    assert_eq!(paths.len(), 2);
  }

  /// A function whose only path falls off the end without returning is
  /// rejected with `MissingReturn` (`spec.md` §7).
  #[test]
  fn missing_return_is_an_error() {
    let def = ast::FunctionDef {
      name: sym("f"),
      params: vec![],
      returns: vec![ast::Type::Int],
      contract: ast::Contract::default(),
      body: vec![],
      span: span(),
    };
    let program = ast::Program { items: vec![ast::Item::Function(def)] };
    let result = lower_program(&program, LowerOptions::default());
    assert!(result.program.is_none());
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(result.errors[0].kind, ErrorKind::MissingReturn(_)));
  }

  /// A loop head with a `loop variant` whose arity differs from the
  /// precondition's `decreases` is `InconsistentRankings` (`spec.md` §4.H).
  #[test]
  fn mismatched_loop_variant_arity_is_rejected() {
    let cond = ast::Expr {
      kind: ast::ExprKind::Binary(BinOp::Cmp(CmpOp::Lt), Box::new(var("i")), Box::new(int(10))), span: span(),
    };
    let body = vec![
      ast::Stmt::Assign(ast::Place::Var(sym("i")), int(0)),
      ast::Stmt::While {
        cond,
        annot: ast::LoopAnnotation { invariants: vec![], variant: vec![] },
        body: vec![ast::Stmt::Assign(ast::Place::Var(sym("i")), int(1))],
      },
      ast::Stmt::Return(None, span()),
    ];
    let def = ast::FunctionDef {
      name: sym("loopy"),
      params: vec![param("i", ast::Type::Int)],
      returns: vec![],
      contract: ast::Contract { requires: vec![], decreases: vec![int_term(10)], ensures: vec![] },
      body,
      span: span(),
    };
    let program = ast::Program { items: vec![ast::Item::Function(def)] };
    let result = lower_program(&program, LowerOptions::default());
    assert!(result.program.is_none());
    assert!(matches!(result.errors[0].kind, ErrorKind::InconsistentRankings { .. }));
  }

  /// A predicate that references its own name is `UnknownName`, since it is
  /// not registered until its body has already lowered successfully.
  #[test]
  fn predicate_self_reference_is_rejected() {
    let body = ast::Pred { kind: ast::PredKind::App(sym("positive"), vec![var_term("n")]), span: span() };
    let def = ast::PredicateDef { name: sym("positive"), params: vec![param("n", ast::Type::Int)], body, span: span() };
    let program = ast::Program { items: vec![ast::Item::Predicate(def)] };
    let result = lower_program(&program, LowerOptions::default());
    assert!(result.program.is_none());
    assert!(matches!(result.errors[0].kind, ErrorKind::UnknownName(_)));
  }

  /// A struct return flattens into one slot per member, and the postcondition
  /// only ever sees the scalar members, never a whole-struct value
  /// (`spec.md` §8 scenario 3).
  #[test]
  fn struct_return_flattens_postcondition_to_member_scalars() {
    let point = ast::StructDef {
      name: sym("Point"),
      members: vec![(sym("x"), ast::Type::Int), (sym("y"), ast::Type::Int)],
      span: span(),
    };
    // `p` arrives as a struct-typed parameter, already bound to its flattened
    // member slots — no declaration statement needed before assigning into it.
    let body = vec![
      ast::Stmt::Assign(ast::Place::Member(sym("p"), sym("x")), int(1)),
      ast::Stmt::Assign(ast::Place::Member(sym("p"), sym("y")), int(2)),
      ast::Stmt::Return(Some(var("p")), span()),
    ];
    let ensures = vec![cmp(CmpOp::Eq,
      ast::Term { kind: ast::TermKind::Member(Box::new(ast::Term { kind: ast::TermKind::Result, span: span() }), sym("x")), span: span() },
      int_term(1))];
    let def = ast::FunctionDef {
      name: sym("make_point"),
      params: vec![param("p", ast::Type::Named(sym("Point")))],
      returns: vec![ast::Type::Named(sym("Point"))],
      contract: ast::Contract { requires: vec![], decreases: vec![], ensures },
      body,
      span: span(),
    };
    let program = ast::Program { items: vec![ast::Item::Struct(point), ast::Item::Function(def)] };
    let result = lower_program(&program, LowerOptions::default());
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    let program = result.program.expect("make_point should lower");
    let fun = &program.functions[0];
    assert_eq!(fun.returns.len(), 2);
    if let Block::Postcondition(b) = fun.cfg.block(fun.postcondition) {
      assert_eq!(b.assertions.len(), 1);
    } else {
      panic!("expected a postcondition block");
    }
  }

  #[test]
  fn fail_fast_stops_at_the_first_bad_definition() {
    let bad = ast::FunctionDef {
      name: sym("bad"), params: vec![], returns: vec![ast::Type::Int],
      contract: ast::Contract::default(), body: vec![], span: span(),
    };
    let good = ast::FunctionDef {
      name: sym("good"), params: vec![], returns: vec![],
      contract: ast::Contract::default(), body: vec![], span: span(),
    };
    let program = ast::Program { items: vec![ast::Item::Function(bad), ast::Item::Function(good)] };
    let opts = LowerOptions { fail_fast: true, ..LowerOptions::default() };
    let result = lower_program(&program, opts);
    assert_eq!(result.errors.len(), 1);
    assert!(result.program.is_none());
  }
}
