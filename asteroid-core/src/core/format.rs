/*!

There are different text representations possible for a `Term` depending on context: a `repr`
suitable for re-parsing as input, a plain `Display` rendering, and a verbose debugging rendering.
This module provides a unified API for formatting objects across the crate, ported directly from
the symbolic-term formatting module it's grounded on.

The trait that formattable types implement is `Formattable`. It works similarly to the standard
library's `Display` trait; unfortunately `Display` can't be implemented generically for every
`T: Formattable`, so the `impl_display_debug_for_formattable!` macro does that boilerplate once per
type.

*/

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum FormatStyle {
  #[default]
  Default, // Use the default formatting
  Simple, // Use a simplified formatting
  Input,  // Format the term as a valid input expression, if possible.
  Debug,  // Format with extra debugging information
}

pub trait Formattable {
  /// Writes a text representation of `self` according to the given `FormatStyle`.
  /// Use `format!` and friends to create a string.
  fn repr(&self, out: &mut dyn std::fmt::Write, style: FormatStyle) -> std::fmt::Result;
}

#[macro_export]
macro_rules! impl_display_debug_for_formattable {
  ($t:ty) => {
    impl std::fmt::Display for $t {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <$t as $crate::core::format::Formattable>::repr(self, f, $crate::core::format::FormatStyle::Default)
      }
    }

    impl std::fmt::Debug for $t {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <$t as $crate::core::format::Formattable>::repr(self, f, $crate::core::format::FormatStyle::Debug)
      }
    }
  };
}
pub use impl_display_debug_for_formattable;
