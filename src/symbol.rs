//! Interned identifiers.
//!
//! Every name in the source program — variables, functions, structs, predicates,
//! struct members — is interned once into a [`Symbol`], a small `Copy` handle.
//! Comparing two `Symbol`s is a `u32` comparison instead of a string comparison,
//! which matters because the lowering passes compare names constantly (duplicate
//! checks, cross-kind collisions, member lookups).

use std::cell::RefCell;
use bumpalo::Bump;
use hashbrown::HashMap;

/// An interned name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
  /// The symbol for `\result`, used by the annotation binder without going through
  /// the interner (it can never collide with a user identifier because the surface
  /// grammar does not allow a bare backslash in identifiers).
  pub const RESULT: Symbol = Symbol(0);
}

/// An arena-backed string interner. Strings live as long as the `Interner` does;
/// `Symbol`s are stable handles that can be copied freely and compared in O(1).
pub struct Interner {
  arena: Bump,
  map: HashMap<&'static str, Symbol>,
  strings: Vec<&'static str>,
}

impl std::fmt::Debug for Interner {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Interner").field("len", &self.strings.len()).finish()
  }
}

impl Default for Interner {
  fn default() -> Self {
    let mut i = Self { arena: Bump::new(), map: HashMap::new(), strings: Vec::new() };
    let result = i.intern("\\result");
    debug_assert_eq!(result, Symbol::RESULT);
    i
  }
}

impl Interner {
  /// Create a fresh interner, pre-seeded with the symbols this crate relies on
  /// having stable handles for.
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Intern a string, returning its stable handle. Interning the same string
  /// twice returns the same `Symbol`.
  pub fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&sym) = self.map.get(s) { return sym }
    // Safety: `arena` outlives `self` (it is a field of `self`), and we never
    // hand out `&'static str` outside this type's own lifetime; the lifetime
    // extension is confined to this module.
    let alloc: &str = self.arena.alloc_str(s);
    let alloc: &'static str = unsafe { std::mem::transmute(alloc) };
    let sym = Symbol(self.strings.len().try_into().expect("too many symbols"));
    self.strings.push(alloc);
    self.map.insert(alloc, sym);
    sym
  }

  /// Recover the original string for a symbol.
  #[must_use] pub fn resolve(&self, sym: Symbol) -> &str { self.strings[sym.0 as usize] }
}

thread_local! {
  static GLOBAL: RefCell<Interner> = RefCell::new(Interner::new());
}

/// Intern a string in the process-wide (thread-local) interner. Used for names
/// that need a `Symbol` outside the context of a particular lowering session,
/// such as the fixed keyword set consumed by the annotation binder.
pub fn intern(s: &str) -> Symbol { GLOBAL.with(|i| i.borrow_mut().intern(s)) }

/// Resolve a symbol interned with [`intern`].
pub fn resolve(sym: Symbol) -> String { GLOBAL.with(|i| i.borrow().resolve(sym).to_owned()) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_is_idempotent() {
    let mut i = Interner::new();
    let a = i.intern("foo");
    let b = i.intern("foo");
    let c = i.intern("bar");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(i.resolve(a), "foo");
    assert_eq!(i.resolve(c), "bar");
  }

  #[test]
  fn result_symbol_is_reserved() {
    let i = Interner::new();
    assert_eq!(i.resolve(Symbol::RESULT), "\\result");
  }
}
