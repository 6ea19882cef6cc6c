//! §4.D Statement lowering: builds a [`Cfg`] out of structured statements.
//!
//! Mirrors the cursor discipline a basic-block builder over structured input
//! always needs (`cur_block`, `break`/`continue` targets saved and restored
//! around loop bodies), generalized here to the four block kinds of `spec.md`
//! §3 instead of a single block type.

use crate::ast;
use crate::diag::{Diagnostic, ErrorKind, LResult, Span, TypeExpectation};
use crate::lower::annot::AnnotBinder;
use crate::lower::expr::{exec_to_term, resolve_call, AnnotContext};
use crate::lower::Lowerer;
use crate::symbol::Symbol;
use crate::types::expr::{ExecExpr, ExecExprKind};
use crate::types::mir::{Block, BlockId, Cfg, LoopHeadBlock, Statement, Terminator};
use crate::types::ops::{BinOp, BoolOp, Const, UnOp};
use crate::types::pred::{Pred, PredKind};
use crate::types::registry::Type;
use crate::types::var::{VarFlags, VarId, VarKind};

/// Per-function mutable cursor state (`spec.md` §4.D: `currentFunction`,
/// `currentBlock`, `breakTarget`, `continueTarget`).
pub struct Builder<'l, 'a> {
  pub low: &'l mut Lowerer<'a>,
  pub cfg: Cfg,
  cur_block: Option<BlockId>,
  break_target: Option<BlockId>,
  continue_target: Option<BlockId>,
  postcondition: BlockId,
  return_vars: Vec<VarId>,
  /// The function's first basic block. `\old` is read uniformly as "the
  /// value at function entry" everywhere it's legal, including inside a
  /// loop invariant (`spec.md` is silent on a loop resetting it per
  /// iteration; DESIGN.md records the entry-snapshot reading as simpler and
  /// consistent with how `ensures` already needs it) — so every ghost
  /// snapshot assignment, wherever its `\old` occurrence was written, is
  /// spliced in at the front of this one block.
  entry_block: BlockId,
}

impl<'l, 'a> Builder<'l, 'a> {
  pub fn new(low: &'l mut Lowerer<'a>, cfg: Cfg, postcondition: BlockId, entry: BlockId, return_vars: Vec<VarId>) -> Self {
    Self { low, cfg, cur_block: Some(entry), break_target: None, continue_target: None, postcondition, return_vars, entry_block: entry }
  }

  /// Prepend ghost-snapshot assignments (`ghost := original`) to the
  /// function's entry block, ahead of anything already lowered there. Public
  /// within the crate so the function-assembly driver can splice the ghosts
  /// an `ensures` clause's `\old` occurrences need, in addition to the loop
  /// invariant ghosts this builder spices in for itself.
  pub(crate) fn splice_ghost_snapshots(&mut self, pairs: Vec<(VarId, VarId)>) {
    if pairs.is_empty() { return }
    if let Block::Basic(b) = self.cfg.block_mut(self.entry_block) {
      for (i, (ghost, original)) in pairs.into_iter().enumerate() {
        let ty = self.low.vars.get(original).ty.clone();
        let rhs = ExecExpr::new(ExecExprKind::Var(original), ty, Span::DUMMY);
        b.statements.insert(i, Statement::Assign(ghost, rhs));
      }
    }
  }

  /// Finish the function body. A still-open `cur_block` falls off the end:
  /// legal (and made an implicit edge to the postcondition) for a void
  /// function, an error otherwise (`spec.md` §4.D).
  pub fn finish(mut self, fn_name: Symbol, span: Span) -> LResult<Cfg> {
    if let Some(id) = self.cur_block {
      if self.return_vars.is_empty() {
        if let Block::Basic(b) = self.cfg.block_mut(id) { b.terminator = Some(Terminator::Goto(self.postcondition)); }
      } else {
        return Err(Diagnostic::new(ErrorKind::MissingReturn(fn_name), span));
      }
    }
    Ok(self.cfg)
  }

  fn append(&mut self, stmt: Statement) {
    let id = match self.cur_block {
      Some(id) => id,
      None => { let id = self.cfg.push_basic(); self.cur_block = Some(id); id }
    };
    match self.cfg.block_mut(id) {
      Block::Basic(b) => b.statements.push(stmt),
      _ => unreachable!("cur_block always points at a BasicBlock"),
    }
  }

  /// Close the current block with an unconditional jump, if one is open.
  fn goto(&mut self, target: BlockId) {
    if let Some(id) = self.cur_block.take() {
      if let Block::Basic(b) = self.cfg.block_mut(id) { b.terminator = Some(Terminator::Goto(target)); }
    }
  }

  pub fn lower_block(&mut self, stmts: &[ast::Stmt]) -> LResult<()> {
    self.low.env.push_scope();
    let result = stmts.iter().try_for_each(|s| self.lower_stmt(s));
    self.low.env.pop_scope();
    result
  }

  fn lower_stmt(&mut self, stmt: &ast::Stmt) -> LResult<()> {
    match stmt {
      ast::Stmt::Empty => Ok(()),
      ast::Stmt::Expr(e) => self.lower_expr_stmt(e),
      ast::Stmt::Assign(place, rhs) => self.lower_assign(place, rhs),
      ast::Stmt::Block(inner) => self.lower_block(inner),
      ast::Stmt::If { cond, then_branch, else_branch } => self.lower_if(cond, then_branch, else_branch),
      ast::Stmt::While { cond, annot, body } => self.lower_while(cond, annot, body),
      ast::Stmt::DoWhile { body, cond, annot } => self.lower_do_while(body, cond, annot),
      ast::Stmt::For { init, cond, step, annot, body } => self.lower_for(init, cond, step, annot, body),
      ast::Stmt::Break(span) => self.lower_break(*span),
      ast::Stmt::Continue(span) => self.lower_continue(*span),
      ast::Stmt::Return(value, span) => self.lower_return(value.as_ref(), *span),
      ast::Stmt::Assert(p, _span) => {
        let p = self.low.lower_pred(p, AnnotContext::Requires)?;
        self.append(Statement::Assert(p));
        Ok(())
      }
    }
  }

  /// A statement-position call: the only form a bare expression statement
  /// may take, since nothing else in this language has a side effect to
  /// execute for. Any return values (0 for a void callee, N for a flattened
  /// struct return) are bound to fresh, never-resolvable discard variables.
  fn lower_expr_stmt(&mut self, e: &ast::Expr) -> LResult<()> {
    let ast::ExprKind::Call(callee, args) = &e.kind else {
      return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm("a statement expression must be a function call"), e.span));
    };
    let (id, args, returns) = resolve_call(self.low, *callee, args, e.span)?;
    let discard = crate::symbol::intern("_discard");
    let returns = returns.into_iter()
      .map(|ty| self.low.vars.fresh(discard, ty, VarKind::Local, VarFlags::empty()))
      .collect();
    self.append(Statement::Call { callee: id, args, returns });
    Ok(())
  }

  fn lower_assign(&mut self, place: &ast::Place, rhs: &ast::Expr) -> LResult<()> {
    // Whole-struct assignment never goes through the executable expression
    // visitor — struct-typed names live in `resolve_struct_local`, not
    // `resolve_local` (see the module doc on `env.rs`) — so it is
    // special-cased here, either as a member-wise scalar copy (`p = q;`) or,
    // for a struct-returning callee, as a multi-return [`Statement::Call`].
    if let ast::Place::Var(lhs_name) = place {
      if let Some((_, lhs_members)) = self.low.env.resolve_struct_local(*lhs_name) {
        let lhs_members = lhs_members.to_vec();
        match &rhs.kind {
          ast::ExprKind::Var(rhs_name) => {
            let rhs_members = self.low.env.resolve_struct_local(*rhs_name)
              .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*rhs_name), rhs.span))?
              .1.to_vec();
            if lhs_members.len() != rhs_members.len() {
              return Err(Diagnostic::new(ErrorKind::InternalInvariant("struct assignment arity mismatch"), rhs.span));
            }
            for (l, r) in lhs_members.into_iter().zip(rhs_members) {
              let ty = self.low.vars.get(r).ty.clone();
              self.append(Statement::Assign(l, ExecExpr::new(ExecExprKind::Var(r), ty, rhs.span)));
            }
            return Ok(());
          }
          ast::ExprKind::Call(callee, call_args) => {
            let (id, call_args, returns) = resolve_call(self.low, *callee, call_args, rhs.span)?;
            if returns.len() != lhs_members.len() {
              return Err(Diagnostic::new(ErrorKind::InternalInvariant("struct call return arity mismatch"), rhs.span));
            }
            self.append(Statement::Call { callee: id, args: call_args, returns: lhs_members });
            return Ok(());
          }
          _ => return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm(
            "a struct variable can only be assigned from another struct variable or a struct-returning call"), rhs.span)),
        }
      }
    }
    let rhs = self.low.lower_exec_expr(rhs)?;
    match place {
      ast::Place::Var(name) => {
        let var = self.low.env.resolve_local(*name)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*name), rhs.span))?;
        let ty = self.low.vars.get(var).ty.clone();
        if ty != rhs.ty {
          return Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(ty), got: rhs.ty }, rhs.span));
        }
        self.append(Statement::Assign(var, rhs));
      }
      ast::Place::Index(name, idx) => {
        let arr = self.low.env.resolve_local(*name)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*name), rhs.span))?;
        let idx = self.low.lower_exec_expr(idx)?;
        self.append(Statement::ArrayAssign(arr, idx, rhs));
      }
      ast::Place::Member(name, field) => {
        let (struct_id, members) = self.low.env.resolve_struct_local(*name)
          .map(|(id, m)| (id, m.to_vec()))
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*name), rhs.span))?;
        let (index, member_ty) = self.low.types.member(struct_id, *field)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(*field), rhs.span))?;
        let scalar = members[index];
        let expected = Type::Atomic(member_ty);
        if expected != rhs.ty {
          return Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(expected), got: rhs.ty }, rhs.span));
        }
        self.append(Statement::Assign(scalar, rhs));
      }
    }
    Ok(())
  }

  fn require_bool(&self, e: &ExecExpr) -> LResult<()> {
    if e.ty.is_bool() { Ok(()) }
    else { Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Boolean, got: e.ty.clone() }, e.span)) }
  }

  /// `if`: `current` becomes a two-way `Branch` to fresh `then`/`else`
  /// blocks, each carrying the corresponding `Assume` guard as its first
  /// statement; both rejoin at a fresh `join` block unless both branches
  /// ended control flow (`spec.md` §4.D).
  fn lower_if(&mut self, cond: &ast::Expr, then_branch: &[ast::Stmt], else_branch: &[ast::Stmt]) -> LResult<()> {
    let cond = self.low.lower_exec_expr(cond)?;
    self.require_bool(&cond)?;
    let cond_pred = self.cond_to_pred(&cond);

    let then_blk = self.cfg.push_basic();
    let else_blk = self.cfg.push_basic();
    let join = self.cfg.push_basic();

    if let Some(id) = self.cur_block.take() {
      if let Block::Basic(b) = self.cfg.block_mut(id) {
        b.terminator = Some(Terminator::Branch { cond, then_blk, else_blk });
      }
    }
    if let Block::Basic(b) = self.cfg.block_mut(then_blk) { b.statements.push(Statement::Assume(cond_pred.clone())); }
    if let Block::Basic(b) = self.cfg.block_mut(else_blk) { b.statements.push(Statement::Assume(negate(cond_pred))); }

    self.cur_block = Some(then_blk);
    self.lower_block(then_branch)?;
    let then_open = self.cur_block.is_some();
    self.goto(join);

    self.cur_block = Some(else_blk);
    self.lower_block(else_branch)?;
    let else_open = self.cur_block.is_some();
    self.goto(join);

    self.cur_block = if then_open || else_open { Some(join) } else { None };
    Ok(())
  }

  /// Push a fresh, invariant-populated [`LoopHeadBlock`]. Its terminator is a
  /// temporary self-`Goto` — the real two-way branch is wired in by
  /// [`Self::close_loop_head`] once the body/after blocks it needs to name exist.
  fn push_loop_head(&mut self, annot: &ast::LoopAnnotation) -> LResult<BlockId> {
    let mut binder = AnnotBinder { low: self.low };
    let (invariants, ghosts) = binder.lower_loop_invariants(&annot.invariants)?;
    let ranking_functions = binder.lower_loop_variant(&annot.variant)?;
    self.splice_ghost_snapshots(ghosts);
    Ok(self.cfg.push(Block::LoopHead(LoopHeadBlock {
      invariants,
      ranking_functions,
      terminator: Terminator::Goto(BlockId::ENTRY),
    })))
  }

  /// Mirrors `lower_if`'s guard assumptions: `body_blk` assumes the loop
  /// test, `after_blk` assumes its negation. `cond_to_pred` is evaluated
  /// once per successor, with `cur_block` pointed at that successor, so an
  /// atomic (ghost-materializing) condition gets its snapshot statement
  /// appended into the block that actually runs it rather than into
  /// whatever the caller's `cur_block` happened to be (typically `None` at
  /// this point, since a loop head has no statement list of its own to
  /// anchor a shared ghost to). The guard expression has no side effects,
  /// so evaluating it once per successor is sound.
  fn close_loop_head(&mut self, head: BlockId, cond: &ast::Expr, body_blk: BlockId, after_blk: BlockId) -> LResult<()> {
    let cond = self.low.lower_exec_expr(cond)?;
    self.require_bool(&cond)?;

    let saved = self.cur_block.replace(body_blk);
    let body_pred = self.cond_to_pred(&cond);
    if let Block::Basic(b) = self.cfg.block_mut(body_blk) { b.statements.push(Statement::Assume(body_pred)); }

    self.cur_block = Some(after_blk);
    let after_pred = negate(self.cond_to_pred(&cond));
    if let Block::Basic(b) = self.cfg.block_mut(after_blk) { b.statements.push(Statement::Assume(after_pred)); }

    self.cur_block = saved;

    if let Block::LoopHead(h) = self.cfg.block_mut(head) {
      h.terminator = Terminator::Branch { cond, then_blk: body_blk, else_blk: after_blk };
    }
    Ok(())
  }

  /// `while`: `current → loopHead → (body → loopHead) | afterBlock`.
  fn lower_while(&mut self, cond: &ast::Expr, annot: &ast::LoopAnnotation, body: &[ast::Stmt]) -> LResult<()> {
    let head = self.push_loop_head(annot)?;
    self.goto(head);
    let body_blk = self.cfg.push_basic();
    let after_blk = self.cfg.push_basic();
    self.close_loop_head(head, cond, body_blk, after_blk)?;
    self.run_loop_body(body_blk, after_blk, head, body)?;
    self.cur_block = Some(after_blk);
    Ok(())
  }

  /// `do-while`: the first iteration bypasses the test, entering the body
  /// directly; every later iteration goes through the normal `loopHead` test
  /// (`spec.md` §4.D). The body is lowered once per entry path since nothing
  /// here merges separately-typed cursors across the bypass edge.
  fn lower_do_while(&mut self, body: &[ast::Stmt], cond: &ast::Expr, annot: &ast::LoopAnnotation) -> LResult<()> {
    let head = self.push_loop_head(annot)?;
    let body_blk = self.cfg.push_basic();
    let after_blk = self.cfg.push_basic();
    self.close_loop_head(head, cond, body_blk, after_blk)?;

    let first_body = self.cfg.push_basic();
    self.goto(first_body);
    self.cur_block = Some(first_body);
    self.run_loop_body_once(after_blk, head, body)?;
    self.goto(head);

    self.cur_block = Some(body_blk);
    self.run_loop_body_once(after_blk, head, body)?;
    self.goto(head);

    self.cur_block = Some(after_blk);
    Ok(())
  }

  /// `for`: `init` lowers before the loop head; the iteration step lowers
  /// just before the back-edge to the head (`spec.md` §4.D).
  fn lower_for(&mut self, init: &ast::Stmt, cond: &ast::Expr, step: &ast::Stmt,
    annot: &ast::LoopAnnotation, body: &[ast::Stmt]) -> LResult<()> {
    self.low.env.push_scope();
    self.lower_stmt(init)?;
    let head = self.push_loop_head(annot)?;
    self.goto(head);
    let body_blk = self.cfg.push_basic();
    let after_blk = self.cfg.push_basic();
    self.close_loop_head(head, cond, body_blk, after_blk)?;

    self.cur_block = Some(body_blk);
    let saved = self.enter_loop(after_blk, head);
    self.lower_block(body)?;
    self.lower_stmt(step)?;
    self.goto(head);
    self.exit_loop(saved);

    self.low.env.pop_scope();
    self.cur_block = Some(after_blk);
    Ok(())
  }

  fn run_loop_body(&mut self, body_blk: BlockId, after_blk: BlockId, head: BlockId, body: &[ast::Stmt]) -> LResult<()> {
    self.cur_block = Some(body_blk);
    self.run_loop_body_once(after_blk, head, body)?;
    self.goto(head);
    Ok(())
  }

  fn run_loop_body_once(&mut self, break_to: BlockId, continue_to: BlockId, body: &[ast::Stmt]) -> LResult<()> {
    let saved = self.enter_loop(break_to, continue_to);
    let result = self.lower_block(body);
    self.exit_loop(saved);
    result
  }

  fn enter_loop(&mut self, break_to: BlockId, continue_to: BlockId) -> (Option<BlockId>, Option<BlockId>) {
    let saved = (self.break_target, self.continue_target);
    self.break_target = Some(break_to);
    self.continue_target = Some(continue_to);
    saved
  }

  fn exit_loop(&mut self, saved: (Option<BlockId>, Option<BlockId>)) {
    self.break_target = saved.0;
    self.continue_target = saved.1;
  }

  fn lower_break(&mut self, span: Span) -> LResult<()> {
    let target = self.break_target
      .ok_or_else(|| Diagnostic::new(ErrorKind::IllegalAnnotationForm("break outside a loop"), span))?;
    self.goto(target);
    self.cur_block = None;
    Ok(())
  }

  fn lower_continue(&mut self, span: Span) -> LResult<()> {
    let target = self.continue_target
      .ok_or_else(|| Diagnostic::new(ErrorKind::IllegalAnnotationForm("continue outside a loop"), span))?;
    self.goto(target);
    self.cur_block = None;
    Ok(())
  }

  fn lower_return(&mut self, value: Option<&ast::Expr>, span: Span) -> LResult<()> {
    match (value, self.return_vars.len()) {
      (Some(_), 0) => return Err(Diagnostic::new(ErrorKind::ReturnInVoid, span)),
      (None, n) if n > 0 => return Err(Diagnostic::new(ErrorKind::ReturnMissingValue, span)),
      _ => {}
    }
    if let Some(e) = value {
      if self.return_vars.len() > 1 {
        // A flattened struct return (`spec.md` §4.F): the signature already
        // decomposed it into scalar slots, so the surface expression here
        // must be a bare struct-typed variable whose flattened members line
        // up with those slots one-to-one.
        let name = match &e.kind {
          ast::ExprKind::Var(name) => *name,
          _ => return Err(Diagnostic::new(ErrorKind::IllegalAnnotationForm(
            "a struct-returning function must return a bare struct variable"), span)),
        };
        let members = self.low.env.resolve_struct_local(name)
          .ok_or_else(|| Diagnostic::new(ErrorKind::UnknownName(name), span))?
          .1.to_vec();
        if members.len() != self.return_vars.len() {
          return Err(Diagnostic::new(ErrorKind::InternalInvariant("struct return arity mismatch"), span));
        }
        let rets = self.return_vars.clone();
        for (ret, m) in rets.into_iter().zip(members) {
          let ty = self.low.vars.get(m).ty.clone();
          self.append(Statement::Assign(ret, ExecExpr::new(ExecExprKind::Var(m), ty, span)));
        }
      } else {
        let v = self.low.lower_exec_expr(e)?;
        let ret = self.return_vars[0];
        let ty = self.low.vars.get(ret).ty.clone();
        if ty != v.ty {
          return Err(Diagnostic::new(ErrorKind::TypeMismatch { expected: TypeExpectation::Exact(ty), got: v.ty }, span));
        }
        self.append(Statement::Assign(ret, v));
      }
    }
    self.goto(self.postcondition);
    self.cur_block = None;
    Ok(())
  }

  /// Turn a boolean executable expression into the `Pred` used as an edge
  /// guard. Comparisons and boolean connectives translate structurally;
  /// anything else (a bare variable, a function call, a member/subscript
  /// read) is boolean-typed but not further decomposable, so it is recorded
  /// as an atomic [`PredKind::Var`] reference — materializing a fresh ghost
  /// snapshot first if it isn't already a bare variable, the same technique
  /// `annot.rs` uses for `\old`.
  fn cond_to_pred(&mut self, e: &ExecExpr) -> Pred {
    match &e.kind {
      ExecExprKind::Const(Const::Bool(true)) => Pred::new(PredKind::True, e.span),
      ExecExprKind::Const(Const::Bool(false)) => Pred::new(PredKind::False, e.span),
      ExecExprKind::Unary(UnOp::Not, inner) => { let p = self.cond_to_pred(inner); negate(p) }
      ExecExprKind::Binary(BinOp::Bool(BoolOp::And), l, r) => {
        let (l, r) = (self.cond_to_pred(l), self.cond_to_pred(r));
        Pred::new(PredKind::Conj(vec![l, r]), e.span)
      }
      ExecExprKind::Binary(BinOp::Bool(BoolOp::Or), l, r) => {
        let (l, r) = (self.cond_to_pred(l), self.cond_to_pred(r));
        Pred::new(PredKind::Disj(vec![l, r]), e.span)
      }
      ExecExprKind::Binary(BinOp::Cmp(op), l, r) =>
        Pred::new(PredKind::Cmp { terms: vec![exec_to_term(l), exec_to_term(r)], ops: vec![*op] }, e.span),
      ExecExprKind::Var(v) => Pred::new(PredKind::Var(*v), e.span),
      _ => {
        let ghost = self.low.vars.fresh(crate::symbol::intern("\\cond"), Type::BOOL, VarKind::Local, VarFlags::GHOST);
        self.append(Statement::Assign(ghost, e.clone()));
        Pred::new(PredKind::Var(ghost), e.span)
      }
    }
  }
}

fn negate(p: Pred) -> Pred {
  let span = p.span;
  Pred::new(PredKind::Neg(Box::new(p)), span)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn negate_wraps_in_neg() {
    let p = Pred::new(PredKind::True, Span::DUMMY);
    let n = negate(p);
    assert!(matches!(n.kind, PredKind::Neg(_)));
  }
}
