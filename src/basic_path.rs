//! §4.G Basic-path extraction: decomposing a flattened, annotated [`Cfg`]
//! into the finite set of loop-free straight-line segments between cut
//! points, each reducible to one SMT verification condition.
//!
//! The cut blocks `C` are the precondition, the postcondition, and every loop
//! head (`Block::is_cut_block`). For every ordered pair `(h, t) ∈ C × C`
//! connected by a walk whose interior touches only basic blocks, one
//! [`BasicPath`] is emitted per such walk. Enumeration terminates without an
//! explicit visited set: every cycle in the CFG passes through a loop head,
//! which is itself a cut block and so ends a walk rather than extending it —
//! the basic-block-only interior is acyclic by construction.

use crate::diag::Span;
use crate::types::mir::{Block, BlockId, Cfg, Statement};
use crate::types::pred::Pred;
use crate::types::term::Term;

/// One loop-free trace between two cut points.
#[derive(Clone, Debug)]
pub struct BasicPath {
  pub head: BlockId,
  pub tail: BlockId,
  /// Conjunction of the head cut block's own assertions (the precondition's
  /// `requires`, or a loop head's `invariant` clauses).
  pub head_condition: Pred,
  pub head_ranking: Vec<Term>,
  /// Every statement executed along the walk, from the head's first
  /// successor through to (but not including) the tail cut block itself.
  pub statements: Vec<Statement>,
  /// Conjunction of the tail cut block's own assertions (a loop invariant,
  /// or the postcondition's `ensures`).
  pub tail_condition: Pred,
  pub tail_ranking: Vec<Term>,
}

fn cut_block_condition(block: &Block, span: Span) -> Pred {
  match block {
    Block::Precondition(b) => Pred::conj(b.assertions.clone(), span),
    Block::Postcondition(b) => Pred::conj(b.assertions.clone(), span),
    Block::LoopHead(b) => Pred::conj(b.invariants.clone(), span),
    Block::Basic(_) => Pred::truth(span),
  }
}

fn cut_block_ranking(block: &Block) -> Vec<Term> {
  match block {
    Block::Precondition(b) => b.ranking_functions.clone(),
    Block::LoopHead(b) => b.ranking_functions.clone(),
    Block::Postcondition(_) | Block::Basic(_) => Vec::new(),
  }
}

/// Enumerate every basic path of a function's CFG. Eager rather than lazy —
/// `spec.md` §4.G only requires the stream to be finite, and a `Vec` is the
/// simplest thing that satisfies every consumer this front end has.
#[must_use] pub fn basic_paths(cfg: &Cfg) -> Vec<BasicPath> {
  let mut paths = Vec::new();
  for h in cfg.cut_blocks() {
    let head_block = cfg.block(h);
    let head_condition = cut_block_condition(head_block, Span::DUMMY);
    let head_ranking = cut_block_ranking(head_block);
    for succ in head_block.successors() {
      walk(cfg, h, &head_condition, &head_ranking, succ, Vec::new(), &mut paths);
    }
  }
  paths
}

fn walk(cfg: &Cfg, head: BlockId, head_condition: &Pred, head_ranking: &[Term],
  current: BlockId, statements: Vec<Statement>, paths: &mut Vec<BasicPath>) {
  let block = cfg.block(current);
  if block.is_cut_block() {
    paths.push(BasicPath {
      head,
      tail: current,
      head_condition: head_condition.clone(),
      head_ranking: head_ranking.to_vec(),
      statements,
      tail_condition: cut_block_condition(block, Span::DUMMY),
      tail_ranking: cut_block_ranking(block),
    });
    return;
  }
  let Block::Basic(b) = block else { unreachable!("non-cut block is always Basic") };
  let successors = block.successors();
  for succ in successors {
    let mut extended = statements.clone();
    extended.extend(b.statements.iter().cloned());
    walk(cfg, head, head_condition, head_ranking, succ, extended, paths);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::mir::{BasicBlock, LoopHeadBlock, PostconditionBlock, PreconditionBlock, Terminator};

  #[test]
  fn straight_line_function_has_one_basic_path() {
    let mut cfg = Cfg::new();
    let pre = cfg.push(Block::Precondition(PreconditionBlock {
      assertions: vec![], ranking_functions: vec![], terminator: Terminator::Goto(BlockId::default()),
    }));
    let body = cfg.push_basic();
    let post = cfg.push(Block::Postcondition(PostconditionBlock { assertions: vec![] }));
    if let Block::Precondition(b) = cfg.block_mut(pre) { b.terminator = Terminator::Goto(body); }
    if let Block::Basic(b) = cfg.block_mut(body) { b.terminator = Some(Terminator::Goto(post)); }

    let paths = basic_paths(&cfg);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].head, pre);
    assert_eq!(paths[0].tail, post);
  }

  #[test]
  fn loop_yields_three_paths() {
    let mut cfg = Cfg::new();
    let pre = cfg.push(Block::Precondition(PreconditionBlock {
      assertions: vec![], ranking_functions: vec![], terminator: Terminator::Goto(BlockId::default()),
    }));
    let head = cfg.push(Block::LoopHead(LoopHeadBlock {
      invariants: vec![], ranking_functions: vec![], terminator: Terminator::Goto(BlockId::default()),
    }));
    let body = cfg.push_basic();
    let post = cfg.push(Block::Postcondition(PostconditionBlock { assertions: vec![] }));
    if let Block::Precondition(b) = cfg.block_mut(pre) { b.terminator = Terminator::Goto(head); }
    if let Block::LoopHead(b) = cfg.block_mut(head) {
      b.terminator = Terminator::Branch {
        cond: crate::types::expr::ExecExpr::new(
          crate::types::expr::ExecExprKind::Const(crate::types::ops::Const::Bool(true)),
          crate::types::registry::Type::BOOL, Span::DUMMY),
        then_blk: body, else_blk: post,
      };
    }
    if let Block::Basic(b) = cfg.block_mut(body) { b.terminator = Some(Terminator::Goto(head)); }

    let paths = basic_paths(&cfg);
    // pre -> head, head -> (body) -> head, head -> post
    assert_eq!(paths.len(), 3);
  }

  #[test]
  fn dead_end_block_emits_no_path() {
    let mut cfg = Cfg::new();
    let pre = cfg.push(Block::Precondition(PreconditionBlock {
      assertions: vec![], ranking_functions: vec![], terminator: Terminator::Goto(BlockId::default()),
    }));
    let dangling = cfg.push(Block::Basic(BasicBlock::default()));
    if let Block::Precondition(b) = cfg.block_mut(pre) { b.terminator = Terminator::Goto(dangling); }
    assert!(basic_paths(&cfg).is_empty());
  }
}
