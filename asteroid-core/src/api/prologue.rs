/*!

The original implementation ships two module-level dicts that map a list/string method name used
in surface syntax (e.g. `append`) to the name of a prologue-defined function that implements it.
This crate does not carry the prologue's function bodies (explicitly out of scope: "a prologue that
defines built-in list/string member-function implementations"), only the name→name lookup tables
and the production rule in `index` (§4.4) that consults them when indexing a `list` or `string`
term with an `id` that isn't a normal index.

*/

use asteroid_abs::{HashMap, IString};

/// Name-to-name dispatch tables populated by the embedder before evaluation begins. Looking up
/// `append` in `list_functions` yields the name of the prologue function that implements
/// `[1,2] @append (3)`-style member calls; the core only ever produces a
/// `Term::MemberFunctionVal` that names the target function, it never calls it itself.
#[derive(Debug, Clone, Default)]
pub struct Prologue {
  pub list_functions:   HashMap<IString, IString>,
  pub string_functions: HashMap<IString, IString>,
}

impl Prologue {
  pub fn new() -> Self {
    Prologue::default()
  }

  pub fn register_list_function(&mut self, surface_name: impl Into<IString>, target_name: impl Into<IString>) {
    self.list_functions.insert(surface_name.into(), target_name.into());
  }

  pub fn register_string_function(&mut self, surface_name: impl Into<IString>, target_name: impl Into<IString>) {
    self.string_functions.insert(surface_name.into(), target_name.into());
  }

  pub fn lookup_list_function(&self, surface_name: &IString) -> Option<&IString> {
    self.list_functions.get(surface_name)
  }

  pub fn lookup_string_function(&self, surface_name: &IString) -> Option<&IString> {
    self.string_functions.get(surface_name)
  }
}
