/*!

Three distinct notions of "this call didn't produce a plain value", layered the way §0.1 of the
design notes describes, and unified into one `Unwind` so that `?` composes across unification,
evaluation, and control flow inside a single function body.

- [`PatternMatchFailed`] is the unifier's own failure signal (§4.2): unification is a total
  function from a pair of terms to either a substitution or a reason string, never a panic.
- [`EvalError`] is everything the walker itself calls an error: bad arity, an unsupported operator,
  indexing a non-indexable value, and so on (§7).
- [`Signal`] is not an error at all — it's the three non-local control-flow signals (§5, §7)
  riding the same `Result::Err` channel so `return`/`break`/`throw` can unwind through ordinary
  Rust call stacks without the engine reaching for `panic!`/`catch_unwind`.

*/

use asteroid_abs::IString;
use thiserror::Error;

use crate::api::term::Term;

#[derive(Debug, Clone, Error)]
#[error("pattern match failed: {0}")]
pub struct PatternMatchFailed(pub String);

impl PatternMatchFailed {
  pub fn new(reason: impl Into<String>) -> Self {
    PatternMatchFailed(reason.into())
  }
}

#[derive(Debug, Clone, Error)]
pub enum EvalError {
  #[error("term of type {0} is not indexable")]
  NotIndexable(&'static str),

  #[error("arity mismatch: expected {expected} argument(s), got {got}")]
  ArityMismatch { expected: usize, got: usize },

  #[error("unsupported operator {operator} for operand type(s) {operand_types}")]
  UnsupportedOperator { operator: &'static str, operand_types: String },

  #[error("typematch used in expression position")]
  TypematchInExpressionPosition,

  #[error("step of to-list/raw-to-list must not be zero")]
  ZeroStep,

  #[error("unknown tag encountered during evaluation: {0}")]
  UnknownTag(&'static str),

  #[error("'{0}' is already declared local in this scope and cannot be declared global")]
  GlobalAlreadyLocal(IString),

  #[error("assertion failed")]
  AssertionFailed,

  #[error("none of the function's clauses unified with the argument")]
  NoClauseUnified,

  #[error("invalid lvalue in assignment")]
  InvalidLval,

  #[error("escape is not supported: no EscapeHost installed")]
  EscapeUnsupported,

  #[error("recursion limit of {0} call(s) exceeded")]
  RecursionLimitExceeded(u32),

  #[error("struct '{0}' has no member named '{1}'")]
  NoSuchMember(IString, IString),

  #[error("'{0}' is not bound in this scope")]
  UnboundId(IString),

  #[error("{0}")]
  Message(String),
}

/// The non-local control-flow signals (§5). Not an error in the usual sense: a `Return` unwinding
/// out of a function body all the way to the call site that invoked it is the ordinary, successful
/// outcome of evaluating a function call.
#[derive(Debug, Clone)]
pub enum Signal {
  Return(Term),
  Break,
  Throw(Term),
}

/// The single "something other than a value" channel threaded through every walker method.
#[derive(Debug, Clone)]
pub enum Unwind {
  Signal(Signal),
  PatternMatchFailed(PatternMatchFailed),
  Eval(EvalError),
}

impl From<Signal> for Unwind {
  fn from(signal: Signal) -> Self {
    Unwind::Signal(signal)
  }
}

impl From<PatternMatchFailed> for Unwind {
  fn from(err: PatternMatchFailed) -> Self {
    Unwind::PatternMatchFailed(err)
  }
}

impl From<EvalError> for Unwind {
  fn from(err: EvalError) -> Self {
    Unwind::Eval(err)
  }
}

pub type EvalResult<T> = Result<T, Unwind>;
