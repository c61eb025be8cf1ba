/*!

Structural unification (§4.2): given a term and a pattern, either produce a list of
`(variable-pattern, bound-term)` pairs or fail with a reason. The same variable may appear more
than once in the returned list — it is up to the caller ([`crate::core::walker::Walker::bind`]) to
decide what repeated bindings mean.

Two modes share one implementation, exactly as in the original: *unifying* mode matches a term
against a pattern (the ordinary case — function dispatch, `unify` statements, `is`); *subsumption*
mode matches a pattern against another pattern to detect whether one function clause makes another
unreachable. The `unifying: bool` parameter threads through every recursive call, matching the
two-argument Python `unify(term, pattern, unifying=True)`.

`cmatch` patterns need to evaluate a guard expression against the live symbol table mid-unification,
which is why `unify` is a free function generic over a [`UnificationContext`] rather than a method
directly on `Walker` — it keeps the pure structural-matching rules separate from the one rule that
needs an evaluator, while still letting that rule call back into the walker.

*/

use std::cell::RefCell;

use asteroid_abs::{HashMap, IString};
use regex::Regex;

use crate::api::error::PatternMatchFailed;
use crate::api::term::Term;

thread_local! {
  /// Every scalar term matched against a string pattern (rule 2) anchors and compiles that
  /// pattern as a regex; `for`-as-filter and clause dispatch can retry the same literal pattern
  /// many times over a loop/clause list, so compiled patterns are cached per thread rather than
  /// rebuilt on every attempt.
  static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

fn anchored_regex_is_match(pattern_string: &str, term_string: &str) -> Result<bool, PatternMatchFailed> {
  REGEX_CACHE.with(|cache| {
    let mut cache = cache.borrow_mut();
    if let Option::Some(re) = cache.get(pattern_string) {
      return Result::Ok(re.is_match(term_string));
    }
    let anchored = format!("^(?:{pattern_string})$");
    let re = Regex::new(&anchored).map_err(|e| fail(format!("invalid regular expression {pattern_string}: {e}")))?;
    let is_match = re.is_match(term_string);
    cache.insert(pattern_string.to_string(), re);
    Result::Ok(is_match)
  })
}

/// A single `(pattern, bound-term)` pair. `pattern` is always an lval-shaped term: an `id`, an
/// `index`, or (durign subsumption bookkeeping) the pattern side of a name binding.
pub type Unifier = (Term, Term);

/// The callback surface `unify` needs from its caller to evaluate a `cmatch` guard. Implemented by
/// [`crate::core::walker::Walker`]; kept as a trait so the unifier itself stays free of knowledge
/// about statement execution, scoping, or control flow.
pub trait UnificationContext {
  /// Evaluate `guard` with `unifiers` bound as if by a clause dispatch, in a fresh scope that is
  /// popped before returning. Returns the guard's truthiness.
  fn eval_guard(&mut self, unifiers: &[Unifier], guard: &Term) -> Result<bool, PatternMatchFailed>;

  /// Resolve an `id` to its bound value, used by `deref` patterns (rule 17).
  fn lookup(&self, name: &IString) -> Option<Term>;
}

fn fail(reason: impl Into<String>) -> PatternMatchFailed {
  PatternMatchFailed::new(reason)
}

/// Structural-equality term-to-string coercion used by the "all data types are subtypes of
/// string" rule (rule 2): every scalar term can be matched by a regular expression pattern.
fn term_to_string(term: &Term) -> Option<String> {
  match term {
    Term::Str(s) => Option::Some(s.clone()),
    Term::Integer(v) => Option::Some(v.to_string()),
    Term::Real(v) => Option::Some(v.0.to_string()),
    Term::Boolean(b) => Option::Some(b.to_string()),
    Term::None => Option::Some(String::from("none")),
    _ => Option::None,
  }
}

/// Only the data slots of an object/struct memory list, skipping method slots, used by the
/// object-against-constructor-apply pattern rule (rule 15).
fn data_only(memory: &[Term]) -> Vec<Term> {
  memory
    .iter()
    .filter(|value| !matches!(value, Term::FunctionVal(_)))
    .cloned()
    .collect()
}

/// The length of a right-leaning `head-tail`/`raw-head-tail` chain, counting the final non-list
/// tail as one element. Used only for subsumption between two `head-tail` patterns (rule 13b).
fn head_tail_length(term: &Term) -> usize {
  let mut length = 0;
  let mut cursor = term;
  loop {
    match cursor {
      Term::HeadTail(_, tail) | Term::RawHeadTail(_, tail) => {
        length += 1;
        cursor = tail;
      }
      _ => {
        length += 1;
        break;
      }
    }
  }
  length
}

/// Unify `term` against `pattern`. `unifying = true` is the ordinary term-vs-pattern case;
/// `unifying = false` evaluates pattern-vs-pattern subsumption instead (§4.2's closing note on
/// redundant-clause detection).
pub fn unify<C: UnificationContext>(
  ctx: &mut C,
  term: &Term,
  pattern: &Term,
  unifying: bool,
) -> Result<Vec<Unifier>, PatternMatchFailed> {
  // Rule 1: under subsumption, a named pattern's name is irrelevant; unpack to the wrapped
  // pattern before anything else inspects `term`'s shape.
  let term = if !unifying {
    if let Term::NamedPattern(_, inner) = term {
      inner.as_ref()
    } else {
      term
    }
  } else {
    term
  };

  // Rule 2: every scalar term is also a string, matchable by a regex pattern anchored at both
  // ends.
  if let Option::Some(term_string) = term_to_string(term) {
    if let Term::Str(pattern_string) = pattern {
      return if anchored_regex_is_match(pattern_string, &term_string)? {
        Result::Ok(Vec::new())
      } else {
        Result::Err(fail(format!("regular expression {pattern_string} did not match {term_string}")))
      };
    }
  }

  // Rule 3: scalar Python-level equality for integer/real/boolean terms (a pattern that is itself
  // one of these literals, not a variable or structural pattern).
  match (term, pattern) {
    (Term::Integer(a), Term::Integer(b)) => {
      return if a == b { Result::Ok(Vec::new()) } else { Result::Err(fail(format!("{a} is not the same as {b}"))) };
    }
    (Term::Real(a), Term::Real(b)) => {
      return if a == b { Result::Ok(Vec::new()) } else { Result::Err(fail(format!("{a} is not the same as {b}"))) };
    }
    (Term::Boolean(a), Term::Boolean(b)) => {
      return if a == b { Result::Ok(Vec::new()) } else { Result::Err(fail(format!("{a} is not the same as {b}"))) };
    }
    _ => {}
  }

  // Rule 4 (host lists): the Python original's generic recursion into raw Python lists/tuples is
  // fully subsumed here by the strongly-typed `Term::List`/`Term::Tuple` handling further down;
  // there is no separate "untagged host sequence" shape in this representation.

  // Rule 5: `cmatch` guard evaluation.
  if let Term::CMatch(pexp, cond_exp) = pattern {
    if !unifying {
      asteroid_abs::warning!(1, "conditional patterns not supported for redundancy analysis, clause may be redundant");
    }
    let unifiers = unify(ctx, term, pexp, unifying)?;
    let satisfied = ctx.eval_guard(&unifiers, cond_exp)?;
    return if satisfied { Result::Ok(unifiers) } else { Result::Err(fail("conditional pattern match failed")) };
  }

  // Rule 6: `typematch`.
  if let Term::Typematch(type_name) = pattern {
    return unify_typematch(term, type_name.as_ref(), unifying);
  }

  // Rule 7: `named-pattern` as a pattern (as opposed to rule 1's subsumption unwrap of it in term
  // position) adds a binding for `name` in addition to unifying the wrapped pattern.
  if let Term::NamedPattern(name, inner) = pattern {
    return if unifying {
      let mut unifiers = unify(ctx, term, inner, true)?;
      unifiers.push((Term::Id(name.clone()), term.clone()));
      Result::Ok(unifiers)
    } else {
      unify(ctx, term, inner, false)
    };
  }

  // Rule 8: `none` is matched only by `none`.
  if matches!(pattern, Term::None) {
    return if matches!(term, Term::None) {
      Result::Ok(Vec::new())
    } else {
      Result::Err(fail(format!("expected 'none' got '{}'", term.tag_name())))
    };
  }

  // Rule 9: terms wearing a forbidden tag can still flow through a plain variable pattern
  // (`Term::FunctionVal`/`Term::Foreign`); any other shape of pattern rejects them outright.
  if term.is_unify_forbidden() && !term.is_unify_forbidden_carveout() {
    return Result::Err(fail(format!("term of type '{}' not allowed in pattern matching", term.tag_name())));
  }
  if pattern.is_unify_forbidden() {
    return Result::Err(fail(format!("pattern of type '{}' not allowed in pattern matching", pattern.tag_name())));
  }

  // Rule 10: `quote` on the pattern side is always transparent.
  if let Term::Quote(inner) = pattern {
    return unify(ctx, term, inner, unifying);
  }
  // `quote` on the term side is transparent unless the pattern is itself an lval shape (`id` or
  // `index`), matching the original's special case for quoted-term assignment.
  if let Term::Quote(inner) = term {
    if !matches!(pattern, Term::Id(_) | Term::Index(..)) {
      return unify(ctx, inner, pattern, unifying);
    }
  }

  // Rule 11 (lists/tuples): both sides must be the same list/tuple shape and length.
  match (term, pattern) {
    (Term::List(term_items), Term::List(pattern_items)) | (Term::Tuple(term_items), Term::Tuple(pattern_items)) => {
      if term_items.len() != pattern_items.len() {
        return Result::Err(fail("term and pattern lists/tuples are not the same length"));
      }
      let mut unifiers = Vec::new();
      for (t, p) in term_items.iter().zip(pattern_items.iter()) {
        unifiers.extend(unify(ctx, t, p, unifying)?);
      }
      return Result::Ok(unifiers);
    }
    (Term::List(_), _) | (_, Term::List(_)) | (Term::Tuple(_), _) | (_, Term::Tuple(_)) => {
      if !matches!(term, Term::HeadTail(..) | Term::RawHeadTail(..))
        && !matches!(pattern, Term::HeadTail(..) | Term::RawHeadTail(..))
      {
        return Result::Err(fail("term and pattern do not agree on list/tuple constructor"));
      }
    }
    _ => {}
  }

  // Rule 12: object against a constructor-shaped `apply` pattern (`Foo(a, b)`), matching only the
  // object's data slots.
  if let (Term::Object(object), Term::Apply(pattern_id, pattern_arg)) = (term, pattern) {
    if let Term::Id(pattern_struct_id) = pattern_id.as_ref() {
      if *pattern_struct_id != object.struct_id {
        return Result::Err(fail(format!(
          "expected type '{}' got type '{}'",
          pattern_struct_id, object.struct_id
        )));
      }
      let pattern_list = match pattern_arg.as_ref() {
        Term::Tuple(items) => items.clone(),
        other => vec![other.clone()],
      };
      let object_data = data_only(&object.memory.borrow());
      if object_data.len() != pattern_list.len() {
        return Result::Err(fail("term and pattern lists/tuples are not the same length"));
      }
      let mut unifiers = Vec::new();
      for (t, p) in object_data.iter().zip(pattern_list.iter()) {
        unifiers.extend(unify(ctx, t, p, unifying)?);
      }
      return Result::Ok(unifiers);
    }
  }

  // Rule 13: `index` as a pattern is an lval target; record it verbatim for the caller to store
  // into later.
  if let Term::Index(..) = pattern {
    return Result::Ok(vec![(pattern.clone(), term.clone())]);
  }

  // Rule 14: a bare `id` in term position is never allowed while unifying (only patterns may
  // introduce variables).
  if unifying {
    if let Term::Id(name) = term {
      return Result::Err(fail(format!("variable '{name}' in term not allowed")));
    }
  }

  // Rule 15: a bare `id` in pattern position binds (or, for `_`, discards).
  if let Term::Id(name) = pattern {
    return if name.as_ref() == "_" { Result::Ok(Vec::new()) } else { Result::Ok(vec![(pattern.clone(), term.clone())]) };
  }

  // Rule 16: `head-tail`/`raw-head-tail`.
  if let Term::HeadTail(pattern_head, pattern_tail) | Term::RawHeadTail(pattern_head, pattern_tail) = pattern {
    let term_is_head_tail = matches!(term, Term::HeadTail(..) | Term::RawHeadTail(..));
    if unifying || !term_is_head_tail {
      let Term::List(list_val) = term else {
        return Result::Err(fail(format!("head-tail operator expected type 'list' got type '{}'", term.tag_name())));
      };
      let Option::Some((list_head, list_tail)) = list_val.split_first() else {
        return Result::Err(fail("head-tail operator expected a non-empty list"));
      };
      let tail_term = Term::List(list_tail.to_vec());
      let mut unifiers = unify(ctx, list_head, pattern_head, unifying)?;
      unifiers.extend(unify(ctx, &tail_term, pattern_tail, unifying)?);
      return Result::Ok(unifiers);
    } else {
      // Subsumption between two head-tail chains (rule 13b in the design notes).
      let length_h = head_tail_length(pattern);
      let length_l = head_tail_length(term);
      if length_h == 2 && length_l != 2 {
        let (Term::HeadTail(pattern_head, _) | Term::RawHeadTail(pattern_head, _)) = pattern else { unreachable!() };
        let (Term::HeadTail(term_head, _) | Term::RawHeadTail(term_head, _)) = term else { unreachable!() };
        return unify(ctx, pattern_head, term_head, false);
      }
      if length_h > length_l {
        return Result::Err(fail("subsumption relationship broken, pattern will not be rendered redundant"));
      }
      let (Term::HeadTail(pattern_head, pattern_tail) | Term::RawHeadTail(pattern_head, pattern_tail)) = pattern
      else {
        unreachable!()
      };
      let (Term::HeadTail(term_head, term_tail) | Term::RawHeadTail(term_head, term_tail)) = term else {
        unreachable!()
      };
      let mut unifiers = unify(ctx, term_head, pattern_head, false)?;
      unifiers.extend(unify(ctx, term_tail, pattern_tail, false)?);
      return Result::Ok(unifiers);
    }
  }

  // Rule 17: `deref` as a pattern resolves the named variable to its bound value, then unifies
  // against *that* (a single lookup, unlike `deref` in expression position which double-walks).
  if let Term::Deref(inner) = pattern {
    if let Term::Id(name) = inner.as_ref() {
      let resolved = ctx.lookup(name).ok_or_else(|| fail(format!("'{name}' is not bound in this scope")))?;
      return unify(ctx, term, &resolved, unifying);
    }
    return Result::Err(fail("deref pattern requires an id"));
  }

  // Rule 18: built-in operators are encoded as `apply` nodes; two `apply`s unify only if their
  // operator/function ids agree, then recurse into the argument.
  if let (Term::Apply(term_id, term_arg), Term::Apply(pattern_id, pattern_arg)) = (term, pattern) {
    let (Term::Id(term_name), Term::Id(pattern_name)) = (term_id.as_ref(), pattern_id.as_ref()) else {
      return Result::Err(fail("term and pattern disagree on 'apply' node"));
    };
    if term_name != pattern_name {
      return Result::Err(fail(format!("term '{term_name}' does not match pattern '{pattern_name}'")));
    }
    return unify(ctx, term_arg, pattern_arg, unifying);
  }

  // Rule 19: fallback structural comparison for everything else — tags must match, and children
  // (if any) are unified pairwise.
  structural_fallback(ctx, term, pattern, unifying)
}

fn unify_typematch(term: &Term, type_name: &str, unifying: bool) -> Result<Vec<Unifier>, PatternMatchFailed> {
  match type_name {
    "string" | "real" | "integer" | "list" | "tuple" | "boolean" | "none" => {
      if !unifying {
        if matches!(term, Term::Typematch(_)) {
          let Term::Typematch(term_type) = term else { unreachable!() };
          return if term_type.as_ref() == type_name {
            Result::Ok(Vec::new())
          } else {
            Result::Err(fail(format!("expected typematch {type_name} got a term of type {term_type}")))
          };
        }
        if type_name == "list" && matches!(term, Term::List(_) | Term::HeadTail(..) | Term::RawHeadTail(..)) {
          return Result::Ok(Vec::new());
        }
      }
      if term.tag_name() == type_name {
        Result::Ok(Vec::new())
      } else {
        Result::Err(fail(format!("expected typematch {type_name} got a term of type {}", term.tag_name())))
      }
    }
    "function" => {
      if matches!(term, Term::FunctionVal(_) | Term::MemberFunctionVal(..)) {
        Result::Ok(Vec::new())
      } else {
        Result::Err(fail(format!("expected typematch function got a term of type {}", term.tag_name())))
      }
    }
    _ => {
      if let Term::Object(object) = term {
        if object.struct_id.as_ref() == type_name {
          Result::Ok(Vec::new())
        } else {
          Result::Err(fail(format!("expected typematch {type_name} got an object of type {}", object.struct_id)))
        }
      } else {
        Result::Err(fail(format!("expected typematch {type_name} got a term of type {}", term.tag_name())))
      }
    }
  }
}

fn structural_fallback<C: UnificationContext>(
  ctx: &mut C,
  term: &Term,
  pattern: &Term,
  unifying: bool,
) -> Result<Vec<Unifier>, PatternMatchFailed> {
  if term.tag_name() != pattern.tag_name() {
    return Result::Err(fail(format!("nodes '{}' and '{}' are not the same", term.tag_name(), pattern.tag_name())));
  }
  match (term, pattern) {
    (Term::Str(a), Term::Str(b)) => {
      if a == b {
        Result::Ok(Vec::new())
      } else {
        Result::Err(fail(format!("{a} is not the same as {b}")))
      }
    }
    (Term::Nil, Term::Nil) => Result::Ok(Vec::new()),
    (Term::Seq(ta, tb), Term::Seq(pa, pb)) => {
      let mut unifiers = unify(ctx, ta, pa, unifying)?;
      unifiers.extend(unify(ctx, tb, pb, unifying)?);
      Result::Ok(unifiers)
    }
    _ => Result::Err(fail(format!(
      "nodes '{}' and '{}' are not structurally comparable",
      term.tag_name(),
      pattern.tag_name()
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct NullContext;
  impl UnificationContext for NullContext {
    fn eval_guard(&mut self, _unifiers: &[Unifier], _guard: &Term) -> Result<bool, PatternMatchFailed> {
      Result::Ok(true)
    }
    fn lookup(&self, _name: &IString) -> Option<Term> {
      Option::None
    }
  }

  #[test]
  fn integer_literal_pattern_matches_equal_term() {
    let mut ctx = NullContext;
    let result = unify(&mut ctx, &Term::Integer(5), &Term::Integer(5), true);
    assert_eq!(result.unwrap(), Vec::new());
  }

  #[test]
  fn integer_literal_pattern_rejects_unequal_term() {
    let mut ctx = NullContext;
    let result = unify(&mut ctx, &Term::Integer(5), &Term::Integer(6), true);
    assert!(result.is_err());
  }

  #[test]
  fn variable_pattern_binds_any_term() {
    let mut ctx = NullContext;
    let unifiers = unify(&mut ctx, &Term::Integer(5), &Term::Id("x".into()), true).unwrap();
    assert_eq!(unifiers, vec![(Term::Id("x".into()), Term::Integer(5))]);
  }

  #[test]
  fn anonymous_variable_pattern_discards_binding() {
    let mut ctx = NullContext;
    let unifiers = unify(&mut ctx, &Term::Integer(5), &Term::Id("_".into()), true).unwrap();
    assert!(unifiers.is_empty());
  }

  #[test]
  fn variable_in_term_position_is_rejected_while_unifying() {
    let mut ctx = NullContext;
    let result = unify(&mut ctx, &Term::Id("x".into()), &Term::Integer(5), true);
    assert!(result.is_err());
  }

  #[test]
  fn list_pattern_matches_elementwise() {
    let mut ctx = NullContext;
    let term = Term::List(vec![Term::Integer(1), Term::Integer(2)]);
    let pattern = Term::List(vec![Term::Id("a".into()), Term::Id("b".into())]);
    let unifiers = unify(&mut ctx, &term, &pattern, true).unwrap();
    assert_eq!(
      unifiers,
      vec![(Term::Id("a".into()), Term::Integer(1)), (Term::Id("b".into()), Term::Integer(2))]
    );
  }

  #[test]
  fn head_tail_pattern_splits_non_empty_list() {
    let mut ctx = NullContext;
    let term = Term::List(vec![Term::Integer(1), Term::Integer(2), Term::Integer(3)]);
    let pattern = Term::HeadTail(Box::new(Term::Id("h".into())), Box::new(Term::Id("t".into())));
    let unifiers = unify(&mut ctx, &term, &pattern, true).unwrap();
    assert_eq!(
      unifiers,
      vec![
        (Term::Id("h".into()), Term::Integer(1)),
        (Term::Id("t".into()), Term::List(vec![Term::Integer(2), Term::Integer(3)]))
      ]
    );
  }

  #[test]
  fn head_tail_pattern_rejects_empty_list() {
    let mut ctx = NullContext;
    let term = Term::List(vec![]);
    let pattern = Term::HeadTail(Box::new(Term::Id("h".into())), Box::new(Term::Id("t".into())));
    assert!(unify(&mut ctx, &term, &pattern, true).is_err());
  }

  #[test]
  fn string_pattern_applies_anchored_regex_to_scalar_terms() {
    let mut ctx = NullContext;
    let unifiers = unify(&mut ctx, &Term::Integer(42), &Term::str("[0-9]+"), true).unwrap();
    assert!(unifiers.is_empty());
    assert!(unify(&mut ctx, &Term::Integer(42), &Term::str("[0-9]"), true).is_err());
  }

  #[test]
  fn typematch_accepts_matching_tag_and_rejects_others() {
    let mut ctx = NullContext;
    assert!(unify(&mut ctx, &Term::Integer(1), &Term::Typematch("integer".into()), true).is_ok());
    assert!(unify(&mut ctx, &Term::Integer(1), &Term::Typematch("string".into()), true).is_err());
  }

  #[test]
  fn named_pattern_adds_a_binding_in_addition_to_the_wrapped_pattern() {
    let mut ctx = NullContext;
    let pattern = Term::NamedPattern("whole".into(), Box::new(Term::Id("x".into())));
    let unifiers = unify(&mut ctx, &Term::Integer(7), &pattern, true).unwrap();
    assert_eq!(
      unifiers,
      vec![(Term::Id("x".into()), Term::Integer(7)), (Term::Id("whole".into()), Term::Integer(7))]
    );
  }

  #[test]
  fn none_pattern_only_matches_none() {
    let mut ctx = NullContext;
    assert!(unify(&mut ctx, &Term::None, &Term::None, true).is_ok());
    assert!(unify(&mut ctx, &Term::Integer(1), &Term::None, true).is_err());
  }

  #[test]
  fn function_val_flows_through_a_plain_variable_but_not_structural_patterns() {
    use std::rc::Rc;
    use crate::api::term::{BodyList, FunctionValue};

    let function = Term::FunctionVal(Rc::new(FunctionValue { body: BodyList::default(), closure: Vec::new() }));
    let mut ctx = NullContext;
    assert!(unify(&mut ctx, &function, &Term::Id("f".into()), true).is_ok());
    assert!(unify(&mut ctx, &function, &Term::Integer(1), true).is_err());
  }
}
