//! §4.H Ranking-function consistency: every cut point of a function that
//! carries ranking functions (the precondition and each loop head) must
//! declare the same number of them, so a termination proof obligation can
//! compare "this path's variant decreased" against a fixed-width tuple no
//! matter which two cut points it runs between (`spec.md` §4.H).

use crate::diag::{Diagnostic, ErrorKind, Span};
use crate::symbol::Symbol;
use crate::types::mir::{Block, Cfg};

/// Check ranking-function arity consistency across every cut point of one
/// function's CFG, returning the first mismatch found (cut points are walked
/// in block-insertion order, so the first-declared arity wins as "expected").
pub fn check_ranking_consistency(cfg: &Cfg, function: Symbol, span: Span) -> Result<(), Diagnostic> {
  let mut expected: Option<usize> = None;
  for (_, block) in cfg.iter() {
    let got = match block {
      Block::Precondition(b) => b.ranking_functions.len(),
      Block::LoopHead(b) => b.ranking_functions.len(),
      Block::Postcondition(_) | Block::Basic(_) => continue,
    };
    match expected {
      None => expected = Some(got),
      Some(want) if want != got => {
        return Err(Diagnostic::new(ErrorKind::InconsistentRankings { function, expected: want, got }, span));
      }
      Some(_) => {}
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::mir::{BlockId, LoopHeadBlock, PreconditionBlock, Terminator};

  fn sym(s: &str) -> Symbol { crate::symbol::intern(s) }

  #[test]
  fn matching_arities_pass() {
    let mut cfg = Cfg::new();
    cfg.push(Block::Precondition(PreconditionBlock {
      assertions: vec![], ranking_functions: vec![dummy_term()], terminator: Terminator::Goto(BlockId::ENTRY),
    }));
    cfg.push(Block::LoopHead(LoopHeadBlock {
      invariants: vec![], ranking_functions: vec![dummy_term()], terminator: Terminator::Goto(BlockId::ENTRY),
    }));
    assert!(check_ranking_consistency(&cfg, sym("f"), Span::DUMMY).is_ok());
  }

  #[test]
  fn mismatched_arity_is_rejected() {
    let mut cfg = Cfg::new();
    cfg.push(Block::Precondition(PreconditionBlock {
      assertions: vec![], ranking_functions: vec![dummy_term()], terminator: Terminator::Goto(BlockId::ENTRY),
    }));
    cfg.push(Block::LoopHead(LoopHeadBlock {
      invariants: vec![], ranking_functions: vec![], terminator: Terminator::Goto(BlockId::ENTRY),
    }));
    let err = check_ranking_consistency(&cfg, sym("f"), Span::DUMMY).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InconsistentRankings { expected: 1, got: 0, .. }));
  }

  fn dummy_term() -> crate::types::term::Term {
    crate::types::term::Term::new(
      crate::types::term::TermKind::Const(crate::types::ops::Const::Int(0.into())),
      crate::types::registry::Type::INT, Span::DUMMY,
    )
  }
}
