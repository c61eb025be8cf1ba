/*!

The public API of the crate: the `Term` data model, the error/control-flow types, the escape hook,
and the prologue dispatch tables. Everything in `core` is internal to the engine.

*/

pub mod term;
pub mod error;
pub mod escape;
pub mod prologue;

pub use term::{
  BodyList,
  Clause,
  CatchClause,
  ClosureConfig,
  ForeignValue,
  FunctionValue,
  IfClause,
  ObjectMemory,
  ObjectValue,
  StructMember,
  StructValue,
  Term,
};
pub use error::{EvalError, EvalResult, PatternMatchFailed, Signal, Unwind};
pub use escape::{EscapeHost, NullEscapeHost};
pub use prologue::Prologue;
