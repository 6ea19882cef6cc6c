//! §3/§4.D The control flow graph: blocks, statements and terminators.
//!
//! Four disjoint block kinds instead of one block struct with optional fields,
//! the same construction-time-safe tagging already used for the three
//! expression sub-languages: a basic block can never accidentally carry
//! `rankingFunctions`, and a postcondition block can never accidentally carry
//! a terminator (`spec.md` §3 "Blocks").

use smallvec::SmallVec;
use crate::types::expr::ExecExpr;
use crate::types::pred::Pred;
use crate::types::registry::FunId;
use crate::types::term::Term;
use crate::types::var::VarId;

/// A stable handle into a [`Cfg`]'s block list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockId(u32);

impl BlockId {
  /// Every function's CFG is built with its precondition block first.
  pub const ENTRY: Self = Self(0);
}

impl std::fmt::Display for BlockId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "bb{}", self.0) }
}

/// A statement inside a [`BasicBlock`]. No control flow lives here
/// (`spec.md` §3 "Statements") — every branch is a block [`Terminator`].
#[derive(Clone, Debug)]
pub enum Statement {
  /// `lhs = rhs;`
  Assign(VarId, ExecExpr),
  /// `arr[idx] = rhs;`
  ArrayAssign(VarId, ExecExpr, ExecExpr),
  /// `assume p;` — an edge guard materialized as a statement (`spec.md` §4.D:
  /// branch edges are "guarded by `Assume(cond)`"), or a ghost `\old` snapshot
  /// recorded by the annotation binder.
  Assume(Pred),
  /// `assert p;`, a user-written proof obligation.
  Assert(Pred),
  /// `returns = callee(args);`
  Call { callee: FunId, args: Vec<ExecExpr>, returns: Vec<VarId> },
}

/// What a block does after its statements (if any) finish executing.
#[derive(Clone, Debug)]
pub enum Terminator {
  /// Unconditional jump. The only terminator a [`PreconditionBlock`] ever
  /// carries, and the common case for a [`BasicBlock`].
  Goto(BlockId),
  /// A two-way branch: `cond` true steps to `then_blk`, false to `else_blk`.
  /// Always present at a loop head (`spec.md` §4.D While/do-while/for), and
  /// also how an `if`/`else` terminates the basic block it branches from —
  /// `is_cut_block` is what distinguishes "this is a proof-obligation
  /// boundary" from "this is just a fork in straight-line code", not which
  /// terminator variant is in play.
  Branch { cond: ExecExpr, then_blk: BlockId, else_blk: BlockId },
}

/// The unique function entry, reached by no other block.
#[derive(Clone, Debug)]
pub struct PreconditionBlock {
  pub assertions: Vec<Pred>,
  pub ranking_functions: Vec<Term>,
  pub terminator: Terminator,
}

/// The unique function exit. Terminal: no successors, referencing the
/// (possibly flattened) return variables through its assertions.
#[derive(Clone, Debug)]
pub struct PostconditionBlock {
  pub assertions: Vec<Pred>,
}

/// Inserted at every loop construct, before the loop's test.
#[derive(Clone, Debug)]
pub struct LoopHeadBlock {
  pub invariants: Vec<Pred>,
  pub ranking_functions: Vec<Term>,
  pub terminator: Terminator,
}

/// A straight-line run of statements ending in a [`Terminator::Goto`]. `None`
/// while the CFG builder has not yet closed the block out (`spec.md` §4.D:
/// `currentBlock` starts every statement lowering either appended-to or
/// freshly created).
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
  pub statements: Vec<Statement>,
  pub terminator: Option<Terminator>,
}

/// One node of the control flow graph.
#[derive(Clone, Debug)]
pub enum Block {
  Precondition(PreconditionBlock),
  Postcondition(PostconditionBlock),
  LoopHead(LoopHeadBlock),
  Basic(BasicBlock),
}

impl Block {
  /// True for the three kinds basic-path extraction treats as boundaries
  /// (`spec.md` §4.G: "cut blocks C = {precondition, postcondition} ∪
  /// {loop heads}").
  #[must_use] pub fn is_cut_block(&self) -> bool { !matches!(self, Block::Basic(_)) }

  /// The block's outgoing edges, in terminator order. Empty for a finished
  /// [`PostconditionBlock`] (terminal) and for an unfinished [`BasicBlock`].
  #[must_use] pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
    let term = match self {
      Block::Precondition(b) => Some(&b.terminator),
      Block::LoopHead(b) => Some(&b.terminator),
      Block::Basic(b) => b.terminator.as_ref(),
      Block::Postcondition(_) => None,
    };
    match term {
      None => SmallVec::new(),
      Some(Terminator::Goto(id)) => SmallVec::from_buf_and_len([*id, BlockId::default()], 1),
      Some(Terminator::Branch { then_blk, else_blk, .. }) => SmallVec::from_buf([*then_blk, *else_blk]),
    }
  }
}

/// The control flow graph of a single function or predicate. Block `0`
/// (`BlockId::ENTRY`) is always that function's precondition block.
#[derive(Clone, Debug, Default)]
pub struct Cfg {
  blocks: Vec<Block>,
}

impl Cfg {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Append a block, returning its freshly assigned handle.
  pub fn push(&mut self, block: Block) -> BlockId {
    let id = BlockId(self.blocks.len().try_into().expect("block overflow"));
    self.blocks.push(block);
    id
  }

  /// Start an empty, unterminated basic block — the CFG builder's `null`
  /// `currentBlock` case (`spec.md` §4.D) made concrete as a fresh handle.
  pub fn push_basic(&mut self) -> BlockId { self.push(Block::Basic(BasicBlock::default())) }

  #[must_use] pub fn block(&self, id: BlockId) -> &Block { &self.blocks[id.0 as usize] }
  pub fn block_mut(&mut self, id: BlockId) -> &mut Block { &mut self.blocks[id.0 as usize] }

  /// Iterate all blocks with their handles, in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Block)> {
    self.blocks.iter().enumerate().map(|(i, b)| (BlockId(i.try_into().expect("block overflow")), b))
  }

  /// The cut blocks `C` of `spec.md` §4.G, in insertion order (precondition
  /// first, since it is always pushed first; postcondition and loop heads
  /// follow in the order the builder encountered them).
  pub fn cut_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
    self.iter().filter(|(_, b)| b.is_cut_block()).map(|(id, _)| id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entry_is_block_zero() {
    let mut cfg = Cfg::new();
    let id = cfg.push(Block::Postcondition(PostconditionBlock { assertions: vec![] }));
    assert_eq!(id, BlockId::ENTRY);
  }

  #[test]
  fn postcondition_has_no_successors() {
    let mut cfg = Cfg::new();
    let post = cfg.push(Block::Postcondition(PostconditionBlock { assertions: vec![] }));
    assert!(cfg.block(post).successors().is_empty());
  }

  #[test]
  fn basic_block_goto_has_one_successor() {
    let mut cfg = Cfg::new();
    let target = cfg.push_basic();
    let src = cfg.push_basic();
    if let Block::Basic(b) = cfg.block_mut(src) { b.terminator = Some(Terminator::Goto(target)); }
    assert_eq!(cfg.block(src).successors().as_slice(), &[target]);
  }
}
