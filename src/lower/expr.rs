//! §4.C Expression/term/predicate lowering: three mutually recursive visitors
//! sharing one [`Lowerer`], one per sub-language so a construction-time type
//! error ("a predicate where an expression was required") is impossible —
//! each visitor only ever builds nodes of its own IR type.

use crate::ast;
use crate::diag::{Diagnostic, ErrorKind, LResult, TypeExpectation};
use crate::lower::Lowerer;
use crate::types::expr::{ExecExpr, ExecExprKind};
use crate::types::ops::{BinOp, Const, UnOp};
use crate::types::pred::{Pred, PredKind};
use crate::types::registry::Type;
use crate::types::term::{Term, TermKind};

/// Where in an annotation a term/predicate visitor currently sits — whether
/// `\old` and `\result` are in scope (`spec.md` §4.C).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotContext {
  /// Inside a precondition or a plain `assert` — neither `\old` nor `\result`.
  Requires,
  /// Inside a postcondition — both `\old` and `\result` are legal.
  Ensures,
  /// Inside a loop invariant/variant — `\old` is legal, `\result` is not.
  LoopAnnot,
}

impl AnnotContext {
  #[must_use] fn allows_old(self) -> bool { matches!(self, AnnotContext::Ensures | AnnotContext::LoopAnnot) }
  #[must_use] fn allows_result(self) -> bool { matches!(self, AnnotContext::Ensures) }
}

impl<'a> Lowerer<'a> {
  /// §4.C executable-expression visitor.
  pub fn lower_exec_expr(&mut self, e: &ast::Expr) -> LResult<ExecExpr> {
    let span = e.span;
    match &e.kind {
      ast::ExprKind::Var(name) => {
        let var = self.env.resolve_local(*name)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*name), span))?;
        let ty = self.vars.get(var).ty.clone();
        Ok(ExecExpr::new(ExecExprKind::Var(var), ty, span))
      }
      ast::ExprKind::IntLit(v) => Ok(ExecExpr::new(ExecExprKind::Const(Const::Int(v.clone())), Type::INT, span)),
      ast::ExprKind::FloatLit(v) => Ok(ExecExpr::new(ExecExprKind::Const(Const::Float(v.clone())), Type::FLOAT, span)),
      ast::ExprKind::BoolLit(v) => Ok(ExecExpr::new(ExecExprKind::Const(Const::Bool(*v)), Type::BOOL, span)),
      ast::ExprKind::Call(callee, args) => self.lower_exec_call(*callee, args, span),
      ast::ExprKind::Subscript(arr, idx) => {
        let arr = self.lower_exec_expr(arr)?;
        let idx = self.lower_exec_expr(idx)?;
        require_arithmetic_int(&idx)?;
        let elem = match &arr.ty {
          Type::Array(a) => Type::Atomic(a.elem),
          got => return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Array, got: got.clone() }, span)),
        };
        Ok(ExecExpr::new(ExecExprKind::Subscript(Box::new(arr), Box::new(idx)), elem, span))
      }
      ast::ExprKind::Member(base, field) => {
        let name = match &base.kind {
          ast::ExprKind::Var(name) => *name,
          _ => return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm(
            "member access base must be a bare variable"), span)),
        };
        let (struct_id, members) = self.env.resolve_struct_local(name)
          .map(|(id, m)| (id, m.to_vec()))
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(name), span))?;
        let (index, member_ty) = self.types.member(struct_id, *field)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*field), span))?;
        Ok(ExecExpr::new(ExecExprKind::Var(members[index]), Type::Atomic(member_ty), span))
      }
      ast::ExprKind::Unary(op, inner) => {
        let inner = self.lower_exec_expr(inner)?;
        let ty = match op {
          UnOp::Neg => { require_arithmetic(&inner)?; inner.ty.clone() }
          UnOp::Not => { require_bool(&inner)?; Type::BOOL }
        };
        Ok(ExecExpr::new(ExecExprKind::Unary(*op, Box::new(inner)), ty, span))
      }
      ast::ExprKind::Binary(op, lhs, rhs) => {
        let lhs = self.lower_exec_expr(lhs)?;
        let rhs = self.lower_exec_expr(rhs)?;
        let ty = type_of_binop(*op, &lhs, &rhs)?;
        Ok(ExecExpr::new(ExecExprKind::Binary(*op, Box::new(lhs), Box::new(rhs)), ty, span))
      }
    }
  }

  fn lower_exec_call(&mut self, callee: crate::symbol::Symbol, args: &[ast::Expr], span: crate::diag::Span) -> LResult<ExecExpr> {
    let (id, lowered, returns) = resolve_call(self, callee, args, span)?;
    if returns.len() != 1 {
      return Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Arity(1), got: self.fun_type(&lowered, &returns) }, span));
    }
    Ok(ExecExpr::new(ExecExprKind::Call(id, lowered), returns[0].clone(), span))
  }

  fn fun_type(&self, args: &[ExecExpr], returns: &[Type]) -> Type {
    Type::Fun(std::rc::Rc::new(crate::types::registry::FunTy {
      params: args.iter().map(|a| a.ty.clone()).collect(),
      returns: returns.to_vec(),
    }))
  }

  /// §4.C term visitor. `ctx` gates `\old`/`\result` legality.
  pub fn lower_term(&mut self, t: &ast::Term, ctx: AnnotContext) -> LResult<Term> {
    let span = t.span;
    match &t.kind {
      ast::TermKind::Var(name) => {
        let var = self.env.resolve_local(*name)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*name), span))?;
        let ty = self.vars.get(var).ty.clone();
        Ok(Term::new(TermKind::Var(var), ty, span))
      }
      ast::TermKind::IntLit(v) => Ok(Term::new(TermKind::Const(Const::Int(v.clone())), Type::INT, span)),
      ast::TermKind::FloatLit(v) => Ok(Term::new(TermKind::Const(Const::Float(v.clone())), Type::FLOAT, span)),
      ast::TermKind::Result => {
        if !ctx.allows_result() {
          return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm("\\result outside a postcondition"), span));
        }
        match self.env.current_result() {
          Some(crate::env::ResultBinding::Scalar(v)) => {
            let ty = self.vars.get(*v).ty.clone();
            Ok(Term::new(TermKind::Var(*v), ty, span))
          }
          Some(crate::env::ResultBinding::Struct(..)) =>
            Err(Diagnostic::new(ErrorKind::AmbiguousResult, span)),
          None => Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm("\\result in a void function"), span)),
        }
      }
      ast::TermKind::Index(arr, idx) => {
        let arr = self.lower_term(arr, ctx)?;
        let idx = self.lower_term(idx, ctx)?;
        let elem = match &arr.ty {
          Type::Array(a) => Type::Atomic(a.elem),
          got => return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Array, got: got.clone() }, span)),
        };
        Ok(Term::new(TermKind::Index(Box::new(arr), Box::new(idx)), elem, span))
      }
      ast::TermKind::Length(arr) => {
        let arr = self.lower_term(arr, ctx)?;
        if !matches!(arr.ty, Type::Array(_)) {
          return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Array, got: arr.ty.clone() }, span));
        }
        Ok(Term::new(TermKind::Length(Box::new(arr)), Type::INT, span))
      }
      ast::TermKind::Old(inner) => {
        if !ctx.allows_old() {
          return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm(
            "\\old outside a postcondition or loop invariant"), span));
        }
        let inner = self.lower_term(inner, ctx)?;
        // Collapse `\old(\old(t))` to `\old(t)` (`spec.md` §4.C edge cases).
        let already_old = matches!(inner.kind, TermKind::Old(_));
        let ty = inner.ty.clone();
        let boxed = if already_old {
          match inner.kind { TermKind::Old(t) => t, _ => unreachable!() }
        } else {
          Box::new(inner)
        };
        Ok(Term::new(TermKind::Old(boxed), ty, span))
      }
      ast::TermKind::ArrayUpdate(base, idx, val) => {
        let base = self.lower_term(base, ctx)?;
        let idx = self.lower_term(idx, ctx)?;
        let val = self.lower_term(val, ctx)?;
        if idx.ty != Type::INT {
          return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(Type::INT), got: idx.ty.clone() }, idx.span));
        }
        let elem = match &base.ty {
          Type::Array(a) => Type::Atomic(a.elem),
          got => return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Array, got: got.clone() }, span)),
        };
        if val.ty != elem {
          return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(elem), got: val.ty.clone() }, span));
        }
        let ty = base.ty.clone();
        Ok(Term::new(TermKind::ArrayUpdate(Box::new(base), Box::new(idx), Box::new(val)), ty, span))
      }
      ast::TermKind::Member(base, field) => match &base.kind {
        ast::TermKind::Var(name) => {
          let (struct_id, members) = self.env.resolve_struct_local(*name)
            .map(|(id, m)| (id, m.to_vec()))
            .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*name), span))?;
          let (index, member_ty) = self.types.member(struct_id, *field)
            .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*field), span))?;
          Ok(Term::new(TermKind::Var(members[index]), Type::Atomic(member_ty), span))
        }
        ast::TermKind::Result => {
          if !ctx.allows_result() {
            return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm("\\result outside a postcondition"), span));
          }
          match self.env.current_result() {
            Some(crate::env::ResultBinding::Struct(struct_id, members)) => {
              let (struct_id, members) = (*struct_id, members.clone());
              let (index, member_ty) = self.types.member(struct_id, *field)
                .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*field), span))?;
              Ok(Term::new(TermKind::Var(members[index]), Type::Atomic(member_ty), span))
            }
            Some(crate::env::ResultBinding::Scalar(v)) => {
              let got = self.vars.get(*v).ty.clone();
              Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Struct, got }, span))
            }
            None => Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm("\\result in a void function"), span)),
          }
        }
        _ => Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm(
          "member access base must be a bare variable or \\result"), span)),
      },
      ast::TermKind::Call(callee, args) => {
        let entity = self.env.lookup_top_level(*callee)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*callee), span))?;
        let crate::env::Entity::Function(fun) = entity else {
          return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm("terms may only call functions"), span));
        };
        let id = fun.id;
        let Type::Fun(sig) = fun.sig.clone() else {
          return Err(Diagnostic::new(ErrorKind::InternalInvariant("function entity without a Fun type"), span));
        };
        if sig.returns.len() != 1 || sig.params.len() != args.len() {
          return Err(Diagnostic::new(ErrorKind::TypeMismatch {
            expected: TypeExpectation::Arity(sig.params.len()), got: Type::Fun(sig.clone()),
          }, span));
        }
        let mut lowered = Vec::with_capacity(args.len());
        for (arg, expected) in args.iter().zip(sig.params.iter()) {
          let a = self.lower_term(arg, ctx)?;
          if &a.ty != expected {
            return Err(Diagnostic::new(ErrorKind::TypeMismatch {
              expected: TypeExpectation::Exact(expected.clone()), got: a.ty.clone(),
            }, arg.span));
          }
          lowered.push(a);
        }
        let ret = sig.returns[0].clone();
        Ok(Term::new(TermKind::Call(id, lowered), ret, span))
      }
      ast::TermKind::Unary(op, inner) => {
        let inner = self.lower_term(inner, ctx)?;
        if !inner.ty.is_arithmetic() {
          return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Arithmetic, got: inner.ty.clone() }, span));
        }
        let ty = inner.ty.clone();
        Ok(Term::new(TermKind::Unary(*op, Box::new(inner)), ty, span))
      }
      ast::TermKind::Binary(op, lhs, rhs) => {
        let lhs = self.lower_term(lhs, ctx)?;
        let rhs = self.lower_term(rhs, ctx)?;
        if !lhs.ty.is_arithmetic() || lhs.ty != rhs.ty {
          return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Arithmetic, got: rhs.ty.clone() }, span));
        }
        if matches!(op, crate::types::ops::ArithOp::Mod) && lhs.ty != Type::INT {
          return Err(Diagnostic::new(
            ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(Type::INT), got: lhs.ty.clone() }, span));
        }
        let ty = lhs.ty.clone();
        Ok(Term::new(TermKind::Binary(*op, Box::new(lhs), Box::new(rhs)), ty, span))
      }
    }
  }

  /// §4.C predicate visitor.
  pub fn lower_pred(&mut self, p: &ast::Pred, ctx: AnnotContext) -> LResult<Pred> {
    let span = p.span;
    match &p.kind {
      ast::PredKind::True => Ok(Pred::new(PredKind::True, span)),
      ast::PredKind::False => Ok(Pred::new(PredKind::False, span)),
      ast::PredKind::Cmp { terms, ops } => {
        let terms = terms.iter().map(|t| self.lower_term(t, ctx)).collect::<LResult<Vec<_>>>()?;
        for w in terms.windows(2) {
          if !w[0].ty.is_arithmetic() || w[0].ty != w[1].ty {
            return Err(Diagnostic::new(
              ErrorKind::TypeMismatch { expected: TypeExpectation::Arithmetic, got: w[1].ty.clone() }, span));
          }
        }
        Ok(Pred::new(PredKind::Cmp { terms, ops: ops.clone() }, span))
      }
      ast::PredKind::App(callee, args) => {
        let entity = self.env.lookup_top_level(*callee)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*callee), span))?;
        let crate::env::Entity::Predicate(pred) = entity else {
          return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm("call target is not a predicate"), span));
        };
        let id = pred.id;
        let Type::Pred(sig) = pred.sig.clone() else {
          return Err(Diagnostic::new(ErrorKind::InternalInvariant("predicate entity without a Pred type"), span));
        };
        if sig.params.len() != args.len() {
          return Err(Diagnostic::new(ErrorKind::TypeMismatch {
            expected: TypeExpectation::Arity(sig.params.len()), got: Type::Pred(sig.clone()),
          }, span));
        }
        let mut lowered = Vec::with_capacity(args.len());
        for (arg, expected) in args.iter().zip(sig.params.iter()) {
          let a = self.lower_term(arg, ctx)?;
          if &a.ty != expected {
            return Err(Diagnostic::new(ErrorKind::TypeMismatch {
              expected: TypeExpectation::Exact(expected.clone()), got: a.ty.clone(),
            }, arg.span));
          }
          lowered.push(a);
        }
        Ok(Pred::new(PredKind::App(id, lowered), span))
      }
      ast::PredKind::Old(inner) => {
        if !ctx.allows_old() {
          return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm(
            "\\old outside a postcondition or loop invariant"), span));
        }
        Ok(Pred::new(PredKind::Old(Box::new(self.lower_pred(inner, ctx)?)), span))
      }
      ast::PredKind::Conj(ps) => Ok(Pred::new(
        PredKind::Conj(ps.iter().map(|p| self.lower_pred(p, ctx)).collect::<LResult<_>>()?), span)),
      ast::PredKind::Disj(ps) => Ok(Pred::new(
        PredKind::Disj(ps.iter().map(|p| self.lower_pred(p, ctx)).collect::<LResult<_>>()?), span)),
      ast::PredKind::Impl(l, r) => Ok(Pred::new(
        PredKind::Impl(Box::new(self.lower_pred(l, ctx)?), Box::new(self.lower_pred(r, ctx)?)), span)),
      ast::PredKind::Iff(l, r) => Ok(Pred::new(
        PredKind::Iff(Box::new(self.lower_pred(l, ctx)?), Box::new(self.lower_pred(r, ctx)?)), span)),
      ast::PredKind::Neg(inner) => Ok(Pred::new(PredKind::Neg(Box::new(self.lower_pred(inner, ctx)?)), span)),
      ast::PredKind::Xor(l, r) => Ok(Pred::new(
        PredKind::Xor(Box::new(self.lower_pred(l, ctx)?), Box::new(self.lower_pred(r, ctx)?)), span)),
      ast::PredKind::Quant(q, binders, body) => {
        self.env.push_scope();
        let mut ids = Vec::with_capacity(binders.len());
        for b in binders {
          let sort = match b.sort {
            ast::QuantSortSurface::Bool => crate::types::var::QuantSort::Bool,
            ast::QuantSortSurface::Int => crate::types::var::QuantSort::Int,
            ast::QuantSortSurface::Real => crate::types::var::QuantSort::Real,
          };
          let ty = match sort {
            crate::types::var::QuantSort::Bool => Type::BOOL,
            crate::types::var::QuantSort::Int => Type::INT,
            crate::types::var::QuantSort::Real => Type::FLOAT,
          };
          let var = self.vars.fresh(b.name, ty, crate::types::var::VarKind::Quantified(sort), crate::types::var::VarFlags::GHOST);
          if let Err(e) = self.env.declare_local(b.name, var, b.span) { self.env.pop_scope(); return Err(e); }
          ids.push(var);
        }
        let body = self.lower_pred(body, ctx);
        self.env.pop_scope();
        let body = body?;
        Ok(Pred::new(PredKind::Quant(*q, ids, Box::new(body)), span))
      }
    }
  }
}

/// Resolve a call's callee and lower its arguments against the declared
/// parameter types, without constraining how many values it returns — shared
/// by the single-value [`Lowerer::lower_exec_call`] and the statement-level
/// multi-return call form `lower/stmt.rs` uses for a struct-returning callee.
pub fn resolve_call(low: &mut Lowerer, callee: crate::symbol::Symbol, args: &[ast::Expr], span: crate::diag::Span)
  -> LResult<(crate::types::registry::FunId, Vec<ExecExpr>, Vec<Type>)> {
  let entity = low.env.lookup_top_level(callee)
    .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(callee), span))?;
  let crate::env::Entity::Function(fun) = entity else {
    return Err(Diagnostic::new(ErrorKind::UnknownName(callee), span));
  };
  let id = fun.id;
  let Type::Fun(sig) = fun.sig.clone() else {
    return Err(Diagnostic::new(ErrorKind::InternalInvariant("function entity without a Fun type"), span));
  };
  if sig.params.len() != args.len() {
    return Err(Diagnostic::new(ErrorKind::TypeMismatch {
      expected: TypeExpectation::Arity(sig.params.len()), got: Type::Fun(sig.clone()),
    }, span));
  }
  let mut lowered = Vec::with_capacity(args.len());
  for (arg, expected) in args.iter().zip(sig.params.iter()) {
    let a = low.lower_exec_expr(arg)?;
    if &a.ty != expected {
      return Err(Diagnostic::new(ErrorKind::TypeMismatch {
        expected: TypeExpectation::Exact(expected.clone()), got: a.ty.clone(),
      }, arg.span));
    }
    lowered.push(a);
  }
  Ok((id, lowered, sig.returns.clone()))
}

/// Re-express an executable expression as the structurally equivalent
/// logical term. Used by the CFG builder to turn a comparison's operands
/// into `Term`s for a `Pred::Cmp` edge guard (`spec.md` §4.D) — every case
/// here is arithmetic/array-shaped, since a `Bool`-typed sub-expression
/// never reaches a comparison operand position (type-checked already by
/// [`Lowerer::lower_exec_expr`]).
pub fn exec_to_term(e: &ExecExpr) -> Term {
  let kind = match &e.kind {
    ExecExprKind::Var(v) => TermKind::Var(*v),
    ExecExprKind::Const(c) => TermKind::Const(c.clone()),
    ExecExprKind::Call(id, args) => TermKind::Call(*id, args.iter().map(exec_to_term).collect()),
    ExecExprKind::Subscript(arr, idx) => TermKind::Index(Box::new(exec_to_term(arr)), Box::new(exec_to_term(idx))),
    ExecExprKind::Unary(op, inner) => TermKind::Unary(*op, Box::new(exec_to_term(inner))),
    ExecExprKind::Binary(BinOp::Arith(op), l, r) => TermKind::Binary(*op, Box::new(exec_to_term(l)), Box::new(exec_to_term(r))),
    ExecExprKind::Binary(_, _, _) | ExecExprKind::Error => TermKind::Error,
  };
  Term::new(kind, e.ty.clone(), e.span)
}

fn require_arithmetic(e: &ExecExpr) -> LResult<()> {
  if e.ty.is_arithmetic() { Ok(()) }
  else { Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Arithmetic, got: e.ty.clone() }, e.span)) }
}

fn require_arithmetic_int(e: &ExecExpr) -> LResult<()> {
  if e.ty == Type::INT { Ok(()) }
  else { Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(Type::INT), got: e.ty.clone() }, e.span)) }
}

fn require_bool(e: &ExecExpr) -> LResult<()> {
  if e.ty.is_bool() { Ok(()) }
  else { Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Boolean, got: e.ty.clone() }, e.span)) }
}

fn type_of_binop(op: BinOp, lhs: &ExecExpr, rhs: &ExecExpr) -> LResult<Type> {
  match op {
    BinOp::Arith(arith) => {
      require_arithmetic(lhs)?;
      if lhs.ty != rhs.ty {
        return Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(lhs.ty.clone()), got: rhs.ty.clone() }, rhs.span));
      }
      if matches!(arith, crate::types::ops::ArithOp::Mod) && lhs.ty != Type::INT {
        return Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(Type::INT), got: lhs.ty.clone() }, lhs.span));
      }
      Ok(lhs.ty.clone())
    }
    BinOp::Cmp(_) => {
      require_arithmetic(lhs)?;
      if lhs.ty != rhs.ty {
        return Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(lhs.ty.clone()), got: rhs.ty.clone() }, rhs.span));
      }
      Ok(Type::BOOL)
    }
    BinOp::Bool(_) => { require_bool(lhs)?; require_bool(rhs)?; Ok(Type::BOOL) }
  }
}
