/*!

The tree-walking interpreter core for Asteroid: a tagged-tree term representation, a structural
unifier with full pattern-matching support, and a dispatch-driven walker that evaluates statements
and expressions over that representation.

This crate has no notion of source text: it consumes an already-parsed [`api::Term`] tree (built by
hand, or by a front end living outside this crate) and evaluates it. Parsing, a REPL, a module
loader, and a standard-library prologue are all out of scope; see [`api::prologue`] and
[`api::escape`] for the seams a host embedding this crate is expected to fill in.

The top-level [`Walker`] is the crate's main entry point. [`unify`] is also exported directly: a
semantic-analysis front end can call it with `unifying = false` to check whether one function
clause's pattern subsumes another's, independent of running the walker at all.

*/

pub mod api;
mod core;

pub use core::symbol_table::{Scope, SymbolTable, SymbolTableConfig};
pub use core::unify::{unify, UnificationContext, Unifier};
pub use core::walker::{Walker, WalkerLimits};

#[cfg(test)]
mod tests {
  use super::*;
  use api::Term;

  #[test]
  fn a_minimal_program_runs_end_to_end() {
    let mut walker = Walker::new();
    walker
      .walk_stmt(&Term::Unify(Box::new(Term::id("answer")), Box::new(Term::Integer(42))))
      .unwrap();
    assert_eq!(walker.symbols().lookup_sym(&"answer".into()), Option::Some(&Term::Integer(42)));
  }
}
