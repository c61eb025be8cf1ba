//! End-to-end scenarios, one `#[test]` per numbered case. Since the lexer/parser are out of
//! scope for this crate, each test builds its `Term` AST by hand with the same constructors the
//! walker's own inline unit tests use, rather than parsing source text.

use std::rc::Rc;

use asteroid_core::api::{CatchClause, Clause, StructMember, Term};
use asteroid_core::Walker;

fn int(v: i64) -> Term {
  Term::Integer(v)
}

fn id(name: &str) -> Term {
  Term::id(name)
}

fn lookup(walker: &Walker, name: &str) -> Term {
  walker.symbols().lookup_sym(&name.into()).cloned().unwrap_or_else(|| panic!("'{name}' is not bound"))
}

/// 1. `let [x,2,z] = [1,2,3]` ⇒ `x=1, z=3`.
#[test]
fn list_pattern_destructures_positionally() {
  let mut walker = Walker::new();
  let pattern = Term::List(vec![id("x"), int(2), id("z")]);
  let value = Term::List(vec![int(1), int(2), int(3)]);
  walker.walk_stmt(&Term::Unify(Box::new(pattern), Box::new(value))).unwrap();

  assert_eq!(lookup(&walker, "x"), int(1));
  assert_eq!(lookup(&walker, "z"), int(3));
}

/// 2. `let (h|t) = [10,20,30]` ⇒ `h=10, t=[20,30]`.
#[test]
fn head_tail_pattern_splits_a_list() {
  let mut walker = Walker::new();
  let pattern = Term::HeadTail(Box::new(id("h")), Box::new(id("t")));
  let value = Term::List(vec![int(10), int(20), int(30)]);
  walker.walk_stmt(&Term::Unify(Box::new(pattern), Box::new(value))).unwrap();

  assert_eq!(lookup(&walker, "h"), int(10));
  assert_eq!(lookup(&walker, "t"), Term::List(vec![int(20), int(30)]));
}

/// 3. `function f with 0 do return 1 orwith n do return n+1 end`;
///    `f(0)` ⇒ `1`; `f(7)` ⇒ `8`.
#[test]
fn function_dispatch_tries_clauses_in_order() {
  let mut walker = Walker::new();
  let clauses = vec![
    Clause { pattern: int(0), body: Rc::new(vec![Term::Return(Box::new(int(1)))]) },
    Clause {
      pattern: id("n"),
      body: Rc::new(vec![Term::Return(Box::new(Term::Apply(
        Box::new(Term::id("__plus__")),
        Box::new(Term::Tuple(vec![id("n"), int(1)])),
      )))]),
    },
  ];
  walker.walk_stmt(&Term::Unify(Box::new(id("f")), Box::new(Term::FunctionExp(Rc::new(clauses))))).unwrap();

  walker.walk_stmt(&Term::Unify(Box::new(id("r0")), Box::new(Term::Apply(Box::new(id("f")), Box::new(int(0)))))).unwrap();
  assert_eq!(lookup(&walker, "r0"), int(1));

  walker.walk_stmt(&Term::Unify(Box::new(id("r7")), Box::new(Term::Apply(Box::new(id("f")), Box::new(int(7)))))).unwrap();
  assert_eq!(lookup(&walker, "r7"), int(8));
}

/// 4. `try throw ("Exception", "boom") catch ("Exception", msg) do ... end` binds `msg="boom"`.
///
/// A user `throw` carries whatever value was given it verbatim (§7: `ThrowValue` is not
/// automatically reified the way a `PatternMatchFailed` or host exception is) — so the "Exception"
/// tag here is the thrown value's own shape, not something the walker adds.
#[test]
fn try_catch_binds_a_thrown_tuples_payload() {
  let mut walker = Walker::new();
  let try_stmt = Term::Try {
    body:    Rc::new(vec![Term::Throw(Box::new(Term::Tuple(vec![Term::str("Exception"), Term::str("boom")])))]),
    catches: vec![CatchClause {
      pattern: Term::Tuple(vec![Term::str("Exception"), id("msg")]),
      body:    Rc::new(vec![Term::Unify(Box::new(id("caught")), Box::new(id("msg")))]),
    }],
  };
  walker.walk_stmt(&try_stmt).unwrap();
  assert_eq!(lookup(&walker, "caught"), Term::str("boom"));
}

/// `try` also reifies a genuine `PatternMatchFailed` (not just a user `throw`) as
/// `('PatternMatchFailed', msg)`, matching §7.
#[test]
fn try_catch_binds_a_reified_pattern_match_failure() {
  let mut walker = Walker::new();
  let try_stmt = Term::Try {
    body:    Rc::new(vec![Term::Unify(Box::new(int(1)), Box::new(int(2)))]),
    catches: vec![CatchClause {
      pattern: Term::Tuple(vec![Term::str("PatternMatchFailed"), id("msg")]),
      body:    Rc::new(vec![Term::Unify(Box::new(id("caught")), Box::new(id("msg")))]),
    }],
  };
  walker.walk_stmt(&try_stmt).unwrap();
  assert!(matches!(lookup(&walker, "caught"), Term::Str(_)));
}

/// 5. Given `struct Point(x,y)` without `__init__`: `Point(3,4)` produces an object with data
///    slots 3 and 4; `Point(3)` fails with an arity mismatch.
#[test]
fn struct_without_init_default_constructs_by_position() {
  let mut walker = Walker::new();
  walker
    .walk_stmt(&Term::StructDef("Point".into(), vec![StructMember::Data("x".into()), StructMember::Data("y".into())]))
    .unwrap();

  walker
    .walk_stmt(&Term::Unify(
      Box::new(id("p")),
      Box::new(Term::Apply(Box::new(id("Point")), Box::new(Term::Tuple(vec![int(3), int(4)])))),
    ))
    .unwrap();
  let Term::Object(object) = lookup(&walker, "p") else { panic!("expected an object") };
  assert_eq!(object.memory.borrow().clone(), vec![int(3), int(4)]);

  let arity_mismatch =
    walker.walk_stmt(&Term::Unify(Box::new(id("q")), Box::new(Term::Apply(Box::new(id("Point")), Box::new(int(3))))));
  assert!(arity_mismatch.is_err());
}

/// 6. `for (2, y) in [(1,11),(2,22),(2,23)] do print y end` visits `y=22` then `y=23`, skipping
///    the element that doesn't unify — the match doubles as a filter (§4.4).
#[test]
fn for_loop_visits_only_unifying_elements_in_order() {
  let mut walker = Walker::new();
  walker
    .walk_stmt(&Term::StructDef("Acc".into(), vec![StructMember::Data("items".into())]))
    .unwrap();
  walker
    .walk_stmt(&Term::Unify(
      Box::new(id("acc")),
      Box::new(Term::Apply(Box::new(id("Acc")), Box::new(Term::Tuple(vec![Term::List(vec![])])))),
    ))
    .unwrap();

  let pattern = Term::Tuple(vec![int(2), id("y")]);
  let iterable = Term::List(vec![
    Term::Tuple(vec![int(1), int(11)]),
    Term::Tuple(vec![int(2), int(22)]),
    Term::Tuple(vec![int(2), int(23)]),
  ]);
  let append_y = Term::Unify(
    Box::new(Term::Index(Box::new(id("acc")), Box::new(int(0)))),
    Box::new(Term::Apply(
      Box::new(id("__plus__")),
      Box::new(Term::Tuple(vec![
        Term::Index(Box::new(id("acc")), Box::new(int(0))),
        Term::List(vec![id("y")]),
      ])),
    )),
  );
  walker.walk_stmt(&Term::For(Box::new(pattern), Box::new(iterable), Rc::new(vec![append_y]))).unwrap();

  let Term::Object(object) = lookup(&walker, "acc") else { panic!("expected an object") };
  assert_eq!(object.memory.borrow()[0], Term::List(vec![int(22), int(23)]));
}

/// `to-list` bounds (§8): inclusive, direction follows the sign of `step`, and `step=0` fails.
#[test]
fn to_list_bounds_match_the_documented_laws() {
  let mut walker = Walker::new();

  let ascending = walker.walk_expr(&Term::ToList { start: Box::new(int(1)), stop: Box::new(int(5)), step: Box::new(int(1)) }).unwrap();
  assert_eq!(ascending, Term::List(vec![int(1), int(2), int(3), int(4), int(5)]));

  let descending =
    walker.walk_expr(&Term::ToList { start: Box::new(int(5)), stop: Box::new(int(1)), step: Box::new(int(-1)) }).unwrap();
  assert_eq!(descending, Term::List(vec![int(5), int(4), int(3), int(2), int(1)]));

  let stepped = walker.walk_expr(&Term::ToList { start: Box::new(int(1)), stop: Box::new(int(5)), step: Box::new(int(2)) }).unwrap();
  assert_eq!(stepped, Term::List(vec![int(1), int(3), int(5)]));

  let zero_step = walker.walk_expr(&Term::ToList { start: Box::new(int(1)), stop: Box::new(int(5)), step: Box::new(int(0)) });
  assert!(zero_step.is_err());
}

/// Typematch completeness (§8): every scalar tag matches its own `typematch`, and an object's
/// struct id is itself a valid typematch target distinct from any scalar tag.
#[test]
fn typematch_recognizes_scalar_tags_and_struct_identity() {
  let mut walker = Walker::new();
  walker.walk_stmt(&Term::StructDef("Point".into(), vec![StructMember::Data("x".into())])).unwrap();
  walker
    .walk_stmt(&Term::Unify(
      Box::new(id("p")),
      Box::new(Term::Apply(Box::new(id("Point")), Box::new(Term::Tuple(vec![int(1)])))),
    ))
    .unwrap();

  assert_eq!(walker.walk_expr(&Term::Is(Box::new(int(1)), Box::new(Term::Typematch("integer".into())))).unwrap(), Term::Boolean(true));
  assert_eq!(walker.walk_expr(&Term::Is(Box::new(id("p")), Box::new(Term::Typematch("Point".into())))).unwrap(), Term::Boolean(true));
  assert_eq!(walker.walk_expr(&Term::Is(Box::new(id("p")), Box::new(Term::Typematch("integer".into())))).unwrap(), Term::Boolean(false));
}
