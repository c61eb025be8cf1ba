/*!

`Term` is the tagged tree representation used for every runtime value, every pattern, and every
AST node the walker processes (§3 of the design notes: "dynamic dispatch on tagged trees"). The
source this crate is modeled on represents a term as a Python tuple `(tag, *children)` with
duck-typed shape; here it is a single closed `enum`, so an unrecognized tag is a compile error
rather than a `"feature not yet implemented"` panic at run time.

Variants fall into three families, matching the data model's literals/values, patterns/
expressions, and statements. Statements execute for effect (`Walker::walk_stmt`); everything else
evaluates to a value (`Walker::walk_expr`). A handful of variants (`Id`, `Apply`, `HeadTail`, ...)
serve double duty as both a pattern and an expression, exactly as in the source language.

*/

use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use asteroid_abs::{IString, RcCell};
use ordered_float::OrderedFloat;

use crate::core::format::{FormatStyle, Formattable};
use crate::impl_display_debug_for_formattable;

/// A function value's body: one clause per `orwith` alternative, tried in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
  pub pattern: Term,
  pub body:    Rc<Vec<Term>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfClause {
  pub condition: Term,
  pub body:      Rc<Vec<Term>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatchClause {
  pub pattern: Term,
  pub body:    Rc<Vec<Term>>,
}

/// One member of a `struct-def`: a data slot, a method (stored as a `unify` member binding a
/// function expression to a name), or an explicit no-op placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum StructMember {
  Data(IString),
  Method(IString, Term),
  Noop,
}

/// The body of a function value, shared between every closure created from the same
/// `function-exp` and cheap to clone because it is reference counted.
pub type BodyList = Rc<Vec<Clause>>;

/// A function value's captured lexical configuration. See [`crate::core::symbol_table`] for what
/// "configuration" means and why it must be captured by value, not by reference.
pub type ClosureConfig = crate::core::symbol_table::SymbolTableConfig;

/// Shared, interior-mutable object memory. Two aliases of the same object observe each other's
/// writes through `index` stores (§3: "An object owns its own object-memory sequence"); aliasing
/// happens whenever the object term is cloned (copied into a variable, passed as an argument,
/// stored in a list), which is why the memory itself, not the `Term::Object` value, is the shared
/// cell.
pub type ObjectMemory = RcCell<Vec<Term>>;

#[derive(Clone, PartialEq)]
pub struct FunctionValue {
  pub body:    BodyList,
  pub closure: ClosureConfig,
}

#[derive(Clone, PartialEq)]
pub struct StructValue {
  pub struct_id:    IString,
  pub member_names: Rc<Vec<IString>>,
  /// Slot initializers: a `none` for each data member, a `function-val` for each method.
  pub initializers: Rc<Vec<Term>>,
  pub scope:        ClosureConfig,
}

#[derive(Clone, PartialEq)]
pub struct ObjectValue {
  pub struct_id: IString,
  pub memory:    ObjectMemory,
}

/// An opaque value produced by the escape hook (§6). The core never inspects its contents; it
/// only ever flows back out through further `escape` calls or pattern variables.
#[derive(Clone)]
pub struct ForeignValue(pub Rc<dyn std::any::Any>);

impl PartialEq for ForeignValue {
  fn eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }
}

impl Debug for ForeignValue {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "Foreign(..)")
  }
}

#[derive(Clone, PartialEq)]
pub enum Term {
  // region Literals / values
  Integer(i64),
  Real(OrderedFloat<f64>),
  Str(String),
  Boolean(bool),
  /// The unique absent-value term.
  None,
  /// The empty-list sentinel used by the surface syntax's head/tail constructors.
  Nil,
  List(Vec<Term>),
  Tuple(Vec<Term>),
  FunctionVal(Rc<FunctionValue>),
  /// A function value bound to a receiver, produced transiently by indexed access
  /// (§3: "not independently storable").
  MemberFunctionVal(Box<Term>, Box<Term>),
  Struct(Rc<StructValue>),
  Object(ObjectValue),
  Foreign(ForeignValue),
  // endregion

  // region Patterns / expressions
  Id(IString),
  Apply(Box<Term>, Box<Term>),
  Index(Box<Term>, Box<Term>),
  HeadTail(Box<Term>, Box<Term>),
  RawHeadTail(Box<Term>, Box<Term>),
  ToList { start: Box<Term>, stop: Box<Term>, step: Box<Term> },
  RawToList { start: Box<Term>, stop: Box<Term>, step: Box<Term> },
  Quote(Box<Term>),
  Deref(Box<Term>),
  NamedPattern(IString, Box<Term>),
  /// `T` in `x is %T`. Only ever legal in pattern position; see `EvalError::TypematchInExpressionPosition`.
  Typematch(IString),
  /// A conditional pattern, `pattern if guard`.
  CMatch(Box<Term>, Box<Term>),
  Is(Box<Term>, Box<Term>),
  In(Box<Term>, Box<Term>),
  IfExp { condition: Box<Term>, then_branch: Box<Term>, else_branch: Box<Term> },
  /// The string payload handed to the escape hook (§6).
  Escape(String),
  /// `a, b` evaluated for effect; the already-evaluated form carries both results.
  Seq(Box<Term>, Box<Term>),
  /// `eval(exp)`: walk `exp` to unwrap whatever it names, then walk *that* again with `quote`
  /// treated as live AST instead of a literal value (§4.4, §5 "the `ignore_quote` flag").
  Eval(Box<Term>),
  FunctionExp(BodyList),
  // endregion

  // region Statements
  LineInfo(IString, i64),
  Noop,
  Assert(Box<Term>),
  Unify(Box<Term>, Box<Term>),
  While(Box<Term>, Rc<Vec<Term>>),
  Loop(Rc<Vec<Term>>),
  Repeat(Rc<Vec<Term>>, Box<Term>),
  For(Box<Term>, Box<Term>, Rc<Vec<Term>>),
  Global(Vec<IString>),
  Return(Box<Term>),
  Break,
  If(Vec<IfClause>),
  Throw(Box<Term>),
  Try { body: Rc<Vec<Term>>, catches: Vec<CatchClause> },
  StructDef(IString, Vec<StructMember>),
  // endregion
}

impl Term {
  pub fn str(s: impl Into<String>) -> Term {
    Term::Str(s.into())
  }

  pub fn id(name: impl Into<IString>) -> Term {
    Term::Id(name.into())
  }

  pub fn real(v: f64) -> Term {
    Term::Real(OrderedFloat(v))
  }

  pub fn is_truthy_boolean(&self) -> Option<bool> {
    match self {
      Term::Boolean(b) => Option::Some(*b),
      _ => Option::None,
    }
  }

  /// The tag name used in diagnostics, matching the source's tag strings so error messages read
  /// the same way (`"expected typematch integer got a term of type string"`).
  pub fn tag_name(&self) -> &'static str {
    match self {
      Term::Integer(_) => "integer",
      Term::Real(_) => "real",
      Term::Str(_) => "string",
      Term::Boolean(_) => "boolean",
      Term::None => "none",
      Term::Nil => "nil",
      Term::List(_) => "list",
      Term::Tuple(_) => "tuple",
      Term::FunctionVal(_) => "function-val",
      Term::MemberFunctionVal(..) => "member-function-val",
      Term::Struct(_) => "struct",
      Term::Object(_) => "object",
      Term::Foreign(_) => "foreign",
      Term::Id(_) => "id",
      Term::Apply(..) => "apply",
      Term::Index(..) => "index",
      Term::HeadTail(..) => "head-tail",
      Term::RawHeadTail(..) => "raw-head-tail",
      Term::ToList { .. } => "to-list",
      Term::RawToList { .. } => "raw-to-list",
      Term::Quote(_) => "quote",
      Term::Deref(_) => "deref",
      Term::NamedPattern(..) => "named-pattern",
      Term::Typematch(_) => "typematch",
      Term::CMatch(..) => "cmatch",
      Term::Is(..) => "is",
      Term::In(..) => "in",
      Term::IfExp { .. } => "if-exp",
      Term::Escape(_) => "escape",
      Term::Seq(..) => "seq",
      Term::Eval(_) => "eval",
      Term::FunctionExp(_) => "function-exp",
      Term::LineInfo(..) => "lineinfo",
      Term::Noop => "noop",
      Term::Assert(_) => "assert",
      Term::Unify(..) => "unify",
      Term::While(..) => "while",
      Term::Loop(_) => "loop",
      Term::Repeat(..) => "repeat",
      Term::For(..) => "for",
      Term::Global(_) => "global",
      Term::Return(_) => "return",
      Term::Break => "break",
      Term::If(_) => "if",
      Term::Throw(_) => "throw",
      Term::Try { .. } => "try",
      Term::StructDef(..) => "struct-def",
    }
  }

  /// §4.2 rule 10: tags that a pattern may never wear, and that a term may not wear either unless
  /// the pattern is a plain variable. `function-val` and `foreign` are the two carve-outs on the
  /// term side: a closure or opaque foreign value can always flow into a variable pattern, just
  /// never be matched structurally.
  pub fn is_unify_forbidden(&self) -> bool {
    matches!(
      self,
      Term::FunctionVal(_)
        | Term::MemberFunctionVal(..)
        | Term::Foreign(_)
        | Term::LineInfo(..)
        | Term::Noop
        | Term::Assert(_)
        | Term::Unify(..)
        | Term::While(..)
        | Term::Loop(_)
        | Term::Repeat(..)
        | Term::For(..)
        | Term::Global(_)
        | Term::Return(_)
        | Term::Break
        | Term::If(_)
        | Term::Throw(_)
        | Term::Try { .. }
        | Term::StructDef(..)
        | Term::FunctionExp(_)
    )
  }

  /// The two term-side carve-outs from `is_unify_forbidden`.
  pub fn is_unify_forbidden_carveout(&self) -> bool {
    matches!(self, Term::FunctionVal(_) | Term::Foreign(_))
  }
}

impl Formattable for Term {
  fn repr(&self, out: &mut dyn std::fmt::Write, style: FormatStyle) -> std::fmt::Result {
    match self {
      Term::Integer(v) => write!(out, "{v}"),
      Term::Real(v) => write!(out, "{}", v.0),
      Term::Str(s) => {
        if style == FormatStyle::Input {
          write!(out, "\"{s}\"")
        } else {
          write!(out, "{s}")
        }
      }
      Term::Boolean(b) => write!(out, "{b}"),
      Term::None => write!(out, "none"),
      Term::Nil => write!(out, "nil"),
      Term::List(items) => {
        write!(out, "[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            write!(out, ", ")?;
          }
          item.repr(out, style)?;
        }
        write!(out, "]")
      }
      Term::Tuple(items) => {
        write!(out, "(")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            write!(out, ", ")?;
          }
          item.repr(out, style)?;
        }
        write!(out, ")")
      }
      Term::FunctionVal(_) => write!(out, "<function>"),
      Term::MemberFunctionVal(..) => write!(out, "<member-function>"),
      Term::Struct(s) => write!(out, "<struct {}>", s.struct_id),
      Term::Object(o) => write!(out, "<object {}>", o.struct_id),
      Term::Foreign(_) => write!(out, "<foreign>"),
      Term::Id(name) => write!(out, "{name}"),
      other => write!(out, "<{}>", other.tag_name()),
    }
  }
}

impl_display_debug_for_formattable!(Term);
