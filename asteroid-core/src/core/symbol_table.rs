/*!

Lexical scoping (§4.1). A symbol table is a stack of scopes, innermost last; a lookup walks the
stack from the top down and a `global` declaration marks a name so that a subsequent store in the
current (innermost) scope is redirected to the outermost one instead.

The "configuration" of a symbol table — what `handle_call` in the original walker calls
`get_config`/`set_config` — is the *entire* scope stack at a point in time. A function value
captures its defining configuration (`closure`) when it's created and swaps the live symbol table
to that configuration for the duration of a call, restoring the caller's configuration on return.
Because `SymbolTableConfig` here is a plain `Vec<Scope>` of plain `HashMap`s — not a stack of
shared `Rc` frames — capturing it is a full clone: the walker's invariant that mutations a closure
makes to its own locals after being captured never leak back into the definition site (and vice
versa) falls out of ordinary Rust value semantics rather than needing to be hand-enforced.

*/

use asteroid_abs::{HashMap, IString, Set};

use crate::api::term::Term;

/// One lexical scope: a frame of name-to-value bindings plus the set of names this scope has
/// explicitly declared `global`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scope {
  bindings: HashMap<IString, Term>,
  globals:  Set<IString>,
}

/// A full snapshot of a symbol table's stack of scopes, cheap enough to clone that closures
/// capture it by value at creation time. See the module doc for why this must be a deep clone and
/// not a shared reference.
pub type SymbolTableConfig = Vec<Scope>;

#[derive(Clone, Debug)]
pub struct SymbolTable {
  scopes: SymbolTableConfig,
}

impl Default for SymbolTable {
  fn default() -> Self {
    SymbolTable { scopes: vec![Scope::default()] }
  }
}

impl SymbolTable {
  pub fn new() -> Self {
    SymbolTable::default()
  }

  /// Push a fresh, empty scope (a `with`/function-call-local scope, or a `for`/`while` loop body).
  pub fn push_scope(&mut self) {
    self.scopes.push(Scope::default());
  }

  /// Pop the innermost scope. A no-op past the outermost scope is a programming error in the
  /// walker, so this panics rather than silently doing nothing, matching the original's
  /// `assert len(self.config) > 0` guard.
  pub fn pop_scope(&mut self) {
    assert!(self.scopes.len() > 1, "attempted to pop the outermost symbol table scope");
    self.scopes.pop();
  }

  /// Bind `name` in the *innermost* scope, unless `name` was declared `global` in that scope, in
  /// which case the binding is redirected to the outermost scope (§4.1: "global redirection").
  pub fn enter_sym(&mut self, name: IString, value: Term) {
    let innermost = self.scopes.len() - 1;
    if self.scopes[innermost].globals.contains(&name) {
      self.scopes[0].bindings.insert(name, value);
    } else {
      self.scopes[innermost].bindings.insert(name, value);
    }
  }

  /// Look a name up starting from the innermost scope outward; the first scope that binds it
  /// wins.
  pub fn lookup_sym(&self, name: &IString) -> Option<&Term> {
    for scope in self.scopes.iter().rev() {
      if let Some(value) = scope.bindings.get(name) {
        return Option::Some(value);
      }
    }
    Option::None
  }

  /// Declare `name` as referring to the outermost (module) scope's binding for the rest of the
  /// innermost scope's lifetime.
  pub fn enter_global(&mut self, name: IString) {
    let innermost = self.scopes.len() - 1;
    self.scopes[innermost].globals.insert(name);
  }

  /// True if `name` is already bound in the *innermost* scope specifically (not merely visible
  /// from an outer scope). `global` may only be declared for a name that isn't already local,
  /// matching `EvalError::GlobalAlreadyLocal`.
  pub fn is_symbol_local(&self, name: &IString) -> bool {
    let innermost = self.scopes.len() - 1;
    self.scopes[innermost].bindings.contains_key(name)
  }

  /// Snapshot the entire scope stack. See the module doc: this is a deep clone, not a shared
  /// handle.
  pub fn get_config(&self) -> SymbolTableConfig {
    self.scopes.clone()
  }

  /// Replace the entire scope stack with a previously captured configuration.
  pub fn set_config(&mut self, config: SymbolTableConfig) {
    self.scopes = config;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_walks_outward_through_scopes() {
    let mut table = SymbolTable::new();
    table.enter_sym("x".into(), Term::Integer(1));
    table.push_scope();
    table.enter_sym("y".into(), Term::Integer(2));
    assert_eq!(table.lookup_sym(&"x".into()), Option::Some(&Term::Integer(1)));
    assert_eq!(table.lookup_sym(&"y".into()), Option::Some(&Term::Integer(2)));
    table.pop_scope();
    assert_eq!(table.lookup_sym(&"y".into()), Option::None);
  }

  #[test]
  fn global_redirects_enter_sym_to_outermost_scope() {
    let mut table = SymbolTable::new();
    table.push_scope();
    table.enter_global("x".into());
    table.enter_sym("x".into(), Term::Integer(42));
    table.pop_scope();
    assert_eq!(table.lookup_sym(&"x".into()), Option::Some(&Term::Integer(42)));
  }

  #[test]
  fn captured_configuration_does_not_see_later_mutations() {
    let mut table = SymbolTable::new();
    table.enter_sym("x".into(), Term::Integer(1));
    let closure = table.get_config();
    table.enter_sym("x".into(), Term::Integer(2));

    let mut restored = SymbolTable::new();
    restored.set_config(closure);
    assert_eq!(restored.lookup_sym(&"x".into()), Option::Some(&Term::Integer(1)));
    assert_eq!(table.lookup_sym(&"x".into()), Option::Some(&Term::Integer(2)));
  }

  #[test]
  fn is_symbol_local_checks_only_the_innermost_scope() {
    let mut table = SymbolTable::new();
    table.enter_sym("x".into(), Term::Integer(1));
    table.push_scope();
    assert!(!table.is_symbol_local(&"x".into()));
    table.enter_sym("y".into(), Term::Integer(2));
    assert!(table.is_symbol_local(&"y".into()));
  }
}
