/*!

The walker (§4.4): a dispatch-driven evaluator over [`Term`]. `walk_stmt` executes a statement for
effect; `walk_expr` evaluates an expression to a value. Non-local control flow (`return`/`break`/
`throw`) and unification failure both ride the `Unwind` channel established in
[`crate::api::error`]; ordinary `?` propagation is what implements "unwind the Rust call stack".

*/

use std::rc::Rc;

use asteroid_abs::{debug, trace, warning, IString, RcCell};

use crate::api::error::{EvalError, EvalResult, PatternMatchFailed, Signal, Unwind};
use crate::api::escape::{EscapeHost, NullEscapeHost};
use crate::api::prologue::Prologue;
use crate::api::term::{
  CatchClause,
  Clause,
  FunctionValue,
  IfClause,
  ObjectValue,
  StructMember,
  StructValue,
  Term,
};
use crate::core::symbol_table::SymbolTable;
use crate::core::unify::{unify, Unifier, UnificationContext};

/// Recursion guarding (§0.3): the original Python walker has no call-depth budget and simply blows
/// the host stack on unbounded recursion. This is purely an addition beyond the documented
/// semantics for any program that terminates.
#[derive(Copy, Clone, Debug)]
pub struct WalkerLimits {
  pub max_call_depth: u32,
}

impl Default for WalkerLimits {
  fn default() -> Self {
    WalkerLimits { max_call_depth: 10_000 }
  }
}

pub struct Walker {
  symbols:      SymbolTable,
  prologue:     Prologue,
  escape_host:  Box<dyn EscapeHost>,
  limits:       WalkerLimits,
  call_depth:   u32,
  /// §5: toggled by `eval` so that `quote` becomes transparent while re-interpreting an already
  /// evaluated term as live AST.
  ignore_quote: bool,
  /// §5/§6: `(module, line)`, updated by `lineinfo` statements and saved/restored across calls.
  line_info:    (IString, i64),
}

impl Default for Walker {
  fn default() -> Self {
    Walker {
      symbols:      SymbolTable::new(),
      prologue:     Prologue::new(),
      escape_host:  Box::new(NullEscapeHost),
      limits:       WalkerLimits::default(),
      call_depth:   0,
      ignore_quote: false,
      line_info:    (IString::from("<input>"), 1),
    }
  }
}

impl Walker {
  pub fn new() -> Self {
    Walker::default()
  }

  pub fn with_limits(mut self, limits: WalkerLimits) -> Self {
    self.limits = limits;
    self
  }

  pub fn with_escape_host(mut self, host: Box<dyn EscapeHost>) -> Self {
    self.escape_host = host;
    self
  }

  pub fn with_prologue(mut self, prologue: Prologue) -> Self {
    self.prologue = prologue;
    self
  }

  pub fn symbols(&self) -> &SymbolTable {
    &self.symbols
  }

  pub fn symbols_mut(&mut self) -> &mut SymbolTable {
    &mut self.symbols
  }

  // region Statement execution

  pub fn walk_stmts(&mut self, stmts: &[Term]) -> EvalResult<()> {
    for stmt in stmts {
      self.walk_stmt(stmt)?;
    }
    Result::Ok(())
  }

  pub fn walk_stmt(&mut self, node: &Term) -> EvalResult<()> {
    match node {
      Term::LineInfo(module, line) => {
        self.line_info = (module.clone(), *line);
        Result::Ok(())
      }
      Term::Noop => Result::Ok(()),
      Term::Assert(exp) => {
        let value = self.walk_expr(exp)?;
        match value {
          Term::Boolean(true) => Result::Ok(()),
          _ => Result::Err(EvalError::AssertionFailed.into()),
        }
      }
      Term::Unify(pattern, exp) => {
        let term = self.walk_expr(exp)?;
        let unifiers = unify(self, &term, pattern, true)?;
        self.bind(&unifiers)
      }
      Term::While(cond, body) => self.while_stmt(cond, body),
      Term::Loop(body) => self.loop_stmt(body),
      Term::Repeat(body, cond) => self.repeat_stmt(body, cond),
      Term::For(pattern, iterable, body) => self.for_stmt(pattern, iterable, body),
      Term::Global(names) => self.global_stmt(names),
      Term::Return(exp) => {
        let value = self.walk_expr(exp)?;
        Result::Err(Signal::Return(value).into())
      }
      Term::Break => Result::Err(Signal::Break.into()),
      Term::If(clauses) => self.if_stmt(clauses),
      Term::Throw(exp) => {
        let value = self.walk_expr(exp)?;
        Result::Err(Signal::Throw(value).into())
      }
      Term::Try { body, catches } => self.try_stmt(body, catches),
      Term::StructDef(struct_id, members) => self.struct_def_stmt(struct_id, members),
      other => Result::Err(EvalError::UnknownTag(other.tag_name()).into()),
    }
  }

  fn global_stmt(&mut self, names: &[IString]) -> EvalResult<()> {
    for name in names {
      if self.symbols.is_symbol_local(name) {
        return Result::Err(EvalError::GlobalAlreadyLocal(name.clone()).into());
      }
      self.symbols.enter_global(name.clone());
    }
    Result::Ok(())
  }

  fn if_stmt(&mut self, clauses: &[IfClause]) -> EvalResult<()> {
    for clause in clauses {
      if self.walk_expr_as_bool(&clause.condition)? {
        self.walk_stmts(&clause.body)?;
        break;
      }
    }
    Result::Ok(())
  }

  fn while_stmt(&mut self, cond: &Term, body: &[Term]) -> EvalResult<()> {
    let result = (|| -> EvalResult<()> {
      while self.walk_expr_as_bool(cond)? {
        self.walk_stmts(body)?;
      }
      Result::Ok(())
    })();
    self.absorb_break(result)
  }

  fn loop_stmt(&mut self, body: &[Term]) -> EvalResult<()> {
    let result = (|| -> EvalResult<()> {
      loop {
        self.walk_stmts(body)?;
      }
    })();
    self.absorb_break(result)
  }

  fn repeat_stmt(&mut self, body: &[Term], cond: &Term) -> EvalResult<()> {
    let result = (|| -> EvalResult<()> {
      loop {
        self.walk_stmts(body)?;
        if self.walk_expr_as_bool(cond)? {
          break;
        }
      }
      Result::Ok(())
    })();
    self.absorb_break(result)
  }

  /// `break` is caught only at the four loop forms (§5); any other `Unwind` propagates.
  fn absorb_break(&self, result: EvalResult<()>) -> EvalResult<()> {
    match result {
      Result::Err(Unwind::Signal(Signal::Break)) => Result::Ok(()),
      other => other,
    }
  }

  fn for_stmt(&mut self, pattern: &Term, iterable: &Term, body: &[Term]) -> EvalResult<()> {
    let list_term = self.walk_expr(iterable)?;
    let elements: Vec<Term> = match list_term {
      Term::List(items) => items,
      Term::Str(s) => s.chars().map(|c| Term::Str(c.to_string())).collect(),
      other => {
        return Result::Err(EvalError::Message(format!(
          "only iteration over strings and lists is supported, got {}",
          other.tag_name()
        ))
        .into())
      }
    };

    let result = (|| -> EvalResult<()> {
      for element in &elements {
        match unify(self, element, pattern, true) {
          Result::Ok(unifiers) => {
            self.bind(&unifiers)?;
            self.walk_stmts(body)?;
          }
          Result::Err(_) => continue,
        }
      }
      Result::Ok(())
    })();
    self.absorb_break(result)
  }

  fn try_stmt(&mut self, body: &[Term], catches: &[CatchClause]) -> EvalResult<()> {
    let outcome = self.walk_stmts(body);
    match outcome {
      Result::Ok(()) => Result::Ok(()),
      Result::Err(Unwind::Signal(Signal::Return(value))) => Result::Err(Signal::Return(value).into()),
      Result::Err(Unwind::Signal(Signal::Break)) => Result::Err(Signal::Break.into()),
      Result::Err(Unwind::Signal(Signal::Throw(value))) => {
        let original = Unwind::Signal(Signal::Throw(value.clone()));
        self.try_catch(value, catches, original)
      }
      Result::Err(Unwind::PatternMatchFailed(failure)) => {
        let except_val = Term::Tuple(vec![Term::str("PatternMatchFailed"), Term::str(failure.0.clone())]);
        let original = Unwind::PatternMatchFailed(failure);
        self.try_catch(except_val, catches, original)
      }
      Result::Err(Unwind::Eval(eval_error)) => {
        let except_val = Term::Tuple(vec![Term::str("Exception"), Term::str(eval_error.to_string())]);
        let original = Unwind::Eval(eval_error);
        self.try_catch(except_val, catches, original)
      }
    }
  }

  /// §5/§7: sequential catch-pattern unification against the reified exception value; if none
  /// matches, the original unwind re-raises unchanged.
  fn try_catch(&mut self, except_val: Term, catches: &[CatchClause], original: Unwind) -> EvalResult<()> {
    for catch in catches {
      match unify(self, &except_val, &catch.pattern, true) {
        Result::Ok(unifiers) => {
          self.bind(&unifiers)?;
          return self.walk_stmts(&catch.body);
        }
        Result::Err(_) => continue,
      }
    }
    Result::Err(original)
  }

  fn struct_def_stmt(&mut self, struct_id: &IString, members: &[StructMember]) -> EvalResult<()> {
    let mut struct_memory = Vec::with_capacity(members.len());
    let mut member_names = Vec::with_capacity(members.len());

    self.symbols.push_scope();
    for (index, member) in members.iter().enumerate() {
      match member {
        StructMember::Data(member_id) => {
          self.symbols.enter_sym(member_id.clone(), Term::Integer(index as i64));
          struct_memory.push(Term::None);
          member_names.push(member_id.clone());
        }
        StructMember::Method(member_id, function_exp) => {
          self.symbols.enter_sym(member_id.clone(), Term::Integer(index as i64));
          let function_val = self.walk_expr(function_exp)?;
          struct_memory.push(function_val);
          member_names.push(member_id.clone());
        }
        StructMember::Noop => {}
      }
    }
    let struct_scope = self.symbols.get_config();
    self.symbols.pop_scope();

    let struct_value = StructValue {
      struct_id:    struct_id.clone(),
      member_names: Rc::new(member_names),
      initializers: Rc::new(struct_memory),
      scope:        struct_scope,
    };
    self.symbols.enter_sym(struct_id.clone(), Term::Struct(Rc::new(struct_value)));
    Result::Ok(())
  }

  // endregion

  // region Expression evaluation

  fn walk_expr_as_bool(&mut self, node: &Term) -> EvalResult<bool> {
    match self.walk_expr(node)? {
      Term::Boolean(b) => Result::Ok(b),
      other => Result::Err(EvalError::Message(format!("expected a boolean value, got {}", other.tag_name())).into()),
    }
  }

  pub fn walk_expr(&mut self, node: &Term) -> EvalResult<Term> {
    match node {
      Term::Integer(_)
      | Term::Real(_)
      | Term::Str(_)
      | Term::Boolean(_)
      | Term::None
      | Term::Nil
      | Term::Foreign(_)
      | Term::MemberFunctionVal(..) => Result::Ok(node.clone()),
      Term::Id(name) => self.symbols.lookup_sym(name).cloned().ok_or_else(|| EvalError::UnboundId(name.clone()).into()),
      Term::Quote(inner) => {
        if self.ignore_quote {
          self.walk_expr(inner)
        } else {
          Result::Ok(node.clone())
        }
      }
      Term::List(items) => {
        let values = items.iter().map(|item| self.walk_expr(item)).collect::<EvalResult<Vec<_>>>()?;
        Result::Ok(Term::List(values))
      }
      Term::Tuple(items) => {
        let values = items.iter().map(|item| self.walk_expr(item)).collect::<EvalResult<Vec<_>>>()?;
        Result::Ok(Term::Tuple(values))
      }
      Term::Seq(a, b) => {
        let a_val = self.walk_expr(a)?;
        let b_val = self.walk_expr(b)?;
        Result::Ok(Term::Seq(Box::new(a_val), Box::new(b_val)))
      }
      Term::ToList { start, stop, step } => self.to_list_exp(start, stop, step, true),
      Term::RawToList { start, stop, step } => self.to_list_exp(start, stop, step, false),
      Term::HeadTail(head, tail) => self.head_tail_exp(head, tail),
      Term::RawHeadTail(head, tail) => self.head_tail_exp(head, tail),
      Term::FunctionExp(body) => {
        Result::Ok(Term::FunctionVal(Rc::new(FunctionValue { body: body.clone(), closure: self.symbols.get_config() })))
      }
      Term::NamedPattern(_, inner) => self.walk_expr(inner),
      Term::CMatch(inner, _) => self.walk_expr(inner),
      Term::Typematch(_) => Result::Err(EvalError::TypematchInExpressionPosition.into()),
      Term::Deref(id_exp) => {
        let looked_up = self.walk_expr(id_exp)?;
        self.walk_expr(&looked_up)
      }
      Term::Is(term_exp, pattern) => self.is_exp(term_exp, pattern),
      Term::In(exp, exp_list) => self.in_exp(exp, exp_list),
      Term::IfExp { condition, then_branch, else_branch } => {
        if self.walk_expr_as_bool(condition)? {
          self.walk_expr(then_branch)
        } else {
          self.walk_expr(else_branch)
        }
      }
      Term::Escape(payload) => Result::Ok(self.escape_host.run(payload)),
      Term::Eval(exp) => self.eval_exp(exp),
      Term::Index(structure, ix) => self.index_exp(structure, ix),
      Term::Apply(callee, arg) => self.apply_exp(callee, arg),
      other => Result::Err(EvalError::UnknownTag(other.tag_name()).into()),
    }
  }

  fn to_list_exp(&mut self, start: &Term, stop: &Term, step: &Term, inclusive_spelling: bool) -> EvalResult<Term> {
    let _ = inclusive_spelling;
    let start_val = self.walk_integer(start)?;
    let stop_val = self.walk_integer(stop)?;
    let step_val = self.walk_integer(step)?;

    if step_val == 0 {
      return Result::Err(EvalError::ZeroStep.into());
    }

    let mut out = Vec::new();
    let mut ix = start_val;
    if step_val > 0 {
      while ix <= stop_val {
        out.push(Term::Integer(ix));
        ix += step_val;
      }
    } else {
      while ix >= stop_val {
        out.push(Term::Integer(ix));
        ix += step_val;
      }
    }
    Result::Ok(Term::List(out))
  }

  fn walk_integer(&mut self, node: &Term) -> EvalResult<i64> {
    match self.walk_expr(node)? {
      Term::Integer(v) => Result::Ok(v),
      other => Result::Err(EvalError::Message(format!("only integer values allowed, got {}", other.tag_name())).into()),
    }
  }

  fn head_tail_exp(&mut self, head: &Term, tail: &Term) -> EvalResult<Term> {
    let head_val = self.walk_expr(head)?;
    let tail_val = self.walk_expr(tail)?;
    let Term::List(mut tail_items) = tail_val else {
      return Result::Err(EvalError::Message("unsupported tail type in head-tail operator".into()).into());
    };
    tail_items.insert(0, head_val);
    Result::Ok(Term::List(tail_items))
  }

  /// `eval(exp)` (§4.4): first walk `exp` to unwrap whatever it names to the term it is bound to,
  /// then re-walk *that* term with `quote` made transparent, so a previously-quoted AST fragment
  /// gets interpreted as live code rather than returned as a literal value.
  fn eval_exp(&mut self, exp: &Term) -> EvalResult<Term> {
    let resolved = self.walk_expr(exp)?;
    let saved_ignore_quote = self.ignore_quote;
    self.ignore_quote = true;
    let result = self.walk_expr(&resolved);
    self.ignore_quote = saved_ignore_quote;
    result
  }

  fn is_exp(&mut self, term_exp: &Term, pattern: &Term) -> EvalResult<Term> {
    let term_val = self.walk_expr(term_exp)?;
    match unify(self, &term_val, pattern, true) {
      Result::Ok(unifiers) => {
        self.bind(&unifiers)?;
        Result::Ok(Term::Boolean(true))
      }
      Result::Err(_) => Result::Ok(Term::Boolean(false)),
    }
  }

  fn in_exp(&mut self, exp: &Term, exp_list: &Term) -> EvalResult<Term> {
    let value = self.walk_expr(exp)?;
    let list_val = self.walk_expr(exp_list)?;
    let Term::List(items) = list_val else {
      return Result::Err(EvalError::Message("right argument to in operator has to be a list".into()).into());
    };
    Result::Ok(Term::Boolean(items.iter().any(|item| *item == value)))
  }

  fn index_exp(&mut self, structure: &Term, ix: &Term) -> EvalResult<Term> {
    let structure_val = self.walk_expr(structure)?;
    self.read_at_ix(&structure_val, ix)
  }

  fn read_at_ix(&mut self, structure_val: &Term, ix: &Term) -> EvalResult<Term> {
    match structure_val {
      Term::List(memory) => {
        if let Term::Id(name) = ix {
          if let Option::Some(target) = self.prologue.lookup_list_function(name).cloned() {
            let function_val = self.symbols.lookup_sym(&target).cloned().ok_or_else(|| EvalError::UnboundId(target.clone()))?;
            return Result::Ok(Term::MemberFunctionVal(Box::new(structure_val.clone()), Box::new(function_val)));
          }
        }
        let ix_val = self.walk_expr(ix)?;
        self.read_sequence_at_ix(memory, &ix_val, false)
      }
      Term::Str(s) => {
        if let Term::Id(name) = ix {
          if let Option::Some(target) = self.prologue.lookup_string_function(name).cloned() {
            let function_val = self.symbols.lookup_sym(&target).cloned().ok_or_else(|| EvalError::UnboundId(target.clone()))?;
            return Result::Ok(Term::MemberFunctionVal(Box::new(structure_val.clone()), Box::new(function_val)));
          }
        }
        let ix_val = self.walk_expr(ix)?;
        let chars: Vec<Term> = s.chars().map(|c| Term::Str(c.to_string())).collect();
        self.read_sequence_at_ix(&chars, &ix_val, true)
      }
      Term::Object(object) => {
        let struct_value = self.lookup_struct(&object.struct_id)?;
        // `obj.member_name` is an `id` that only resolves inside the struct's own captured scope
        // (where `struct-def` bound each member name to its slot index), never the caller's scope.
        let saved = self.symbols.get_config();
        self.symbols.set_config(struct_value.scope.clone());
        let ix_val = self.walk_expr(ix);
        self.symbols.set_config(saved);
        let ix_val = ix_val?;
        match ix_val {
          Term::Integer(i) => {
            let memory = object.memory.borrow();
            let slot = memory.get(i as usize).cloned().ok_or_else(|| EvalError::Message("index out of range".into()))?;
            if matches!(slot, Term::FunctionVal(_)) {
              Result::Ok(Term::MemberFunctionVal(Box::new(structure_val.clone()), Box::new(slot)))
            } else {
              Result::Ok(slot)
            }
          }
          _ => Result::Err(EvalError::Message("unsupported object index".into()).into()),
        }
      }
      other => Result::Err(EvalError::NotIndexable(other.tag_name()).into()),
    }
  }

  fn read_sequence_at_ix(&self, memory: &[Term], ix_val: &Term, as_string: bool) -> EvalResult<Term> {
    match ix_val {
      Term::Integer(i) => {
        let value = memory.get(*i as usize).cloned().ok_or_else(|| EvalError::Message("index out of range".into()))?;
        if as_string {
          Result::Ok(value)
        } else {
          Result::Ok(value)
        }
      }
      Term::List(indices) => {
        if indices.is_empty() {
          return Result::Err(EvalError::Message("index list is empty".into()).into());
        }
        let mut collected = Vec::with_capacity(indices.len());
        for index_term in indices {
          let Term::Integer(i) = index_term else {
            return Result::Err(EvalError::Message("unsupported list index".into()).into());
          };
          collected.push(memory.get(*i as usize).cloned().ok_or_else(|| EvalError::Message("index out of range".into()))?);
        }
        if as_string {
          let joined: String = collected
            .into_iter()
            .map(|term| match term {
              Term::Str(s) => s,
              other => other.to_string(),
            })
            .collect();
          Result::Ok(Term::Str(joined))
        } else {
          Result::Ok(Term::List(collected))
        }
      }
      other => Result::Err(EvalError::Message(format!("index op '{}' not supported", other.tag_name())).into()),
    }
  }

  /// Resolves an object's struct definition, failing if the struct binding has gone out of scope
  /// or been shadowed by something else.
  fn lookup_struct(&self, struct_id: &IString) -> EvalResult<Rc<StructValue>> {
    match self.symbols.lookup_sym(struct_id) {
      Option::Some(Term::Struct(struct_value)) => Result::Ok(struct_value.clone()),
      _ => Result::Err(EvalError::Message(format!("'{}' is not a known struct", struct_id)).into()),
    }
  }

  /// `structure` is the unevaluated lval expression, not its value: a list has no shared memory
  /// cell of its own (unlike an object), so an indexed store into one has to walk `structure` back
  /// down to a bound variable to write the mutated list back into (§4.3, §3: "positions are stable
  /// under mutation through indexed stores").
  fn store_at_ix(&mut self, structure: &Term, ix: &Term, value: Term) -> EvalResult<()> {
    let structure_val = self.walk_expr(structure)?;
    match structure_val {
      Term::List(mut memory) => {
        let ix_val = self.walk_expr(ix)?;
        match ix_val {
          Term::Integer(i) => {
            let slot = memory.get_mut(i as usize).ok_or_else(|| EvalError::Message("index out of range".into()))?;
            *slot = value;
          }
          Term::List(_) => return Result::Err(EvalError::Message("slicing in patterns not supported".into()).into()),
          other => {
            return Result::Err(EvalError::Message(format!("index op '{}' in patterns not supported", other.tag_name())).into())
          }
        }
        let Term::Id(name) = structure else {
          return Result::Err(EvalError::Message("indexed assignment into a list requires a bound list variable".into()).into());
        };
        self.symbols.enter_sym(name.clone(), Term::List(memory));
        Result::Ok(())
      }
      Term::Object(object) => {
        let struct_value = self.lookup_struct(&object.struct_id)?;
        let saved = self.symbols.get_config();
        self.symbols.set_config(struct_value.scope.clone());
        let ix_val = self.walk_expr(ix);
        self.symbols.set_config(saved);
        let ix_val = ix_val?;
        match ix_val {
          Term::Integer(i) => {
            let mut memory = object.memory.borrow_mut();
            let slot = memory.get_mut(i as usize).ok_or_else(|| EvalError::Message("index out of range".into()))?;
            *slot = value;
            Result::Ok(())
          }
          Term::List(_) => Result::Err(EvalError::Message("slicing in patterns not supported".into()).into()),
          other => Result::Err(EvalError::Message(format!("index op '{}' in patterns not supported", other.tag_name())).into()),
        }
      }
      other => Result::Err(EvalError::Message(format!("'{}' is not a mutable structure", other.tag_name())).into()),
    }
  }

  fn apply_exp(&mut self, callee: &Term, arg: &Term) -> EvalResult<Term> {
    if let Term::Id(name) = callee {
      if is_builtin_operator(name) {
        return self.handle_builtins(name, arg);
      }
    }

    let callee_val = self.walk_expr(callee)?;
    let arg_val = self.walk_expr(arg)?;

    match callee_val {
      Term::MemberFunctionVal(receiver, function_val) => {
        let full_args = match &arg_val {
          Term::None => (*receiver).clone(),
          Term::Tuple(items) => {
            let mut with_receiver = Vec::with_capacity(items.len() + 1);
            with_receiver.push((*receiver).clone());
            with_receiver.extend(items.iter().cloned());
            Term::Tuple(with_receiver)
          }
          _ => Term::Tuple(vec![(*receiver).clone(), arg_val]),
        };
        let Term::FunctionVal(fval) = *function_val else {
          return Result::Err(EvalError::Message("member function slot does not hold a function value".into()).into());
        };
        self.handle_call(&fval, full_args)
      }
      Term::FunctionVal(fval) => self.handle_call(&fval, arg_val),
      Term::Struct(struct_value) => self.construct_object(&struct_value, arg_val),
      other => Result::Err(EvalError::Message(format!("unknown apply term '{}'", other.tag_name())).into()),
    }
  }

  fn construct_object(&mut self, struct_value: &Rc<StructValue>, arg_val: Term) -> EvalResult<Term> {
    let object_memory: Vec<Term> = struct_value.initializers.as_ref().clone();
    let memory_cell = RcCell::new(object_memory);
    let obj_ref = Term::Object(ObjectValue { struct_id: struct_value.struct_id.clone(), memory: memory_cell.clone() });

    let init_ix = struct_value.member_names.iter().position(|name| name.as_ref() == "__init__");
    if let Option::Some(ix) = init_ix {
      let init_fval = memory_cell.borrow()[ix].clone();
      let Term::FunctionVal(init_fval) = init_fval else {
        return Result::Err(EvalError::Message("'__init__' member is not a function".into()).into());
      };
      let full_args = match arg_val {
        Term::None => obj_ref.clone(),
        Term::Tuple(mut items) => {
          items.insert(0, obj_ref.clone());
          Term::Tuple(items)
        }
        other => Term::Tuple(vec![obj_ref.clone(), other]),
      };
      let saved = self.symbols.get_config();
      self.symbols.set_config(struct_value.scope.clone());
      let call_result = self.handle_call(&init_fval, full_args);
      self.symbols.set_config(saved);
      call_result?;
    } else if !matches!(arg_val, Term::None) {
      let arg_array = match arg_val {
        Term::Tuple(items) => items,
        other => vec![other],
      };
      let mut memory = memory_cell.borrow_mut();
      let data_ixs: Vec<usize> =
        memory.iter().enumerate().filter(|(_, v)| !matches!(v, Term::FunctionVal(_))).map(|(i, _)| i).collect();
      if data_ixs.len() != arg_array.len() {
        return Result::Err(
          EvalError::ArityMismatch { expected: data_ixs.len(), got: arg_array.len() }.into(),
        );
      }
      for (slot_ix, value) in data_ixs.into_iter().zip(arg_array.into_iter()) {
        memory[slot_ix] = value;
      }
    }

    Result::Ok(obj_ref)
  }

  fn handle_builtins(&mut self, opname: &IString, args: &Term) -> EvalResult<Term> {
    let name = opname.as_ref();
    if is_binary_operator(name) {
      let Term::Tuple(bin_args) = args else {
        return Result::Err(EvalError::ArityMismatch { expected: 2, got: 0 }.into());
      };
      if bin_args.len() != 2 {
        return Result::Err(EvalError::ArityMismatch { expected: 2, got: bin_args.len() }.into());
      }
      let a = self.walk_expr(&bin_args[0])?;
      let b = self.walk_expr(&bin_args[1])?;
      return eval_binary_operator(name, a, b);
    }
    if is_unary_operator(name) {
      let value = self.walk_expr(args)?;
      return eval_unary_operator(name, value);
    }
    Result::Err(EvalError::Message(format!("unknown builtin operator '{name}'")).into())
  }

  pub fn handle_call(&mut self, fval: &FunctionValue, actual_arg: Term) -> EvalResult<Term> {
    if self.call_depth >= self.limits.max_call_depth {
      return Result::Err(EvalError::RecursionLimitExceeded(self.limits.max_call_depth).into());
    }

    let saved_config = self.symbols.get_config();
    let saved_line_info = self.line_info.clone();
    self.symbols.set_config(fval.closure.clone());
    self.symbols.push_scope();
    self.call_depth += 1;

    debug!(2, "entering function call at depth {}", self.call_depth);

    let dispatch_result = self.dispatch_clause(&fval.body, &actual_arg);

    self.call_depth -= 1;
    let return_value = match dispatch_result {
      Result::Ok(value) => Result::Ok(value),
      Result::Err(Unwind::Signal(Signal::Return(value))) => Result::Ok(value),
      Result::Err(other) => {
        self.symbols.set_config(saved_config);
        self.line_info = saved_line_info;
        return Result::Err(other);
      }
    };

    self.line_info = saved_line_info;
    self.symbols.set_config(saved_config);
    return_value
  }

  fn dispatch_clause(&mut self, clauses: &[Clause], actual_arg: &Term) -> EvalResult<Term> {
    for clause in clauses {
      let unify_attempt = unify(self, actual_arg, &clause.pattern, true);
      match unify_attempt {
        Result::Ok(unifiers) => {
          trace!(3, "clause unified, {} binding(s)", unifiers.len());
          self.declare_formal_args(&unifiers)?;
          self.walk_stmts(&clause.body)?;
          return Result::Ok(Term::None);
        }
        Result::Err(_) => continue,
      }
    }
    Result::Err(EvalError::NoClauseUnified.into())
  }

  fn declare_formal_args(&mut self, unifiers: &[Unifier]) -> EvalResult<()> {
    for (pattern, value) in unifiers {
      let Term::Id(name) = pattern else {
        return Result::Err(EvalError::Message("no pattern match possible in function call".into()).into());
      };
      self.symbols.enter_sym(name.clone(), value.clone());
    }
    Result::Ok(())
  }

  /// Installs a unifier list into the live symbol table (§4.3), the binder: `id` lvals enter a
  /// plain binding, `index` lvals perform an indexed store.
  pub fn bind(&mut self, unifiers: &[Unifier]) -> EvalResult<()> {
    for (lval, value) in unifiers {
      match lval {
        Term::Id(name) => {
          if name.as_ref() != "_" {
            self.symbols.enter_sym(name.clone(), value.clone());
          }
        }
        Term::Index(structure, ix) => {
          self.store_at_ix(structure, ix, value.clone())?;
        }
        other => {
          return Result::Err(EvalError::Message(format!("'{}' is not a valid lval", other.tag_name())).into())
        }
      }
    }
    Result::Ok(())
  }

  // endregion
}

impl UnificationContext for Walker {
  fn eval_guard(&mut self, unifiers: &[Unifier], guard: &Term) -> Result<bool, PatternMatchFailed> {
    self.symbols.push_scope();
    let mut bind_failed = false;
    for (pattern, value) in unifiers {
      if let Term::Id(name) = pattern {
        if name.as_ref() != "_" {
          self.symbols.enter_sym(name.clone(), value.clone());
        }
      } else {
        bind_failed = true;
      }
    }
    let result = if bind_failed {
      Result::Err(PatternMatchFailed::new("non-variable lval in conditional pattern binding"))
    } else {
      match self.walk_expr(guard) {
        Result::Ok(Term::Boolean(b)) => Result::Ok(b),
        Result::Ok(_) => Result::Err(PatternMatchFailed::new("conditional pattern guard did not evaluate to a boolean")),
        Result::Err(_) => Result::Err(PatternMatchFailed::new("conditional pattern guard raised an error")),
      }
    };
    self.symbols.pop_scope();
    result
  }

  fn lookup(&self, name: &IString) -> Option<Term> {
    self.symbols.lookup_sym(name).cloned()
  }
}

// region Built-in operators (§4.6)

fn is_builtin_operator(name: &IString) -> bool {
  is_binary_operator(name.as_ref()) || is_unary_operator(name.as_ref())
}

fn is_binary_operator(name: &str) -> bool {
  matches!(
    name,
    "__plus__"
      | "__minus__"
      | "__times__"
      | "__divide__"
      | "__or__"
      | "__and__"
      | "__eq__"
      | "__ne__"
      | "__le__"
      | "__lt__"
      | "__ge__"
      | "__gt__"
  )
}

fn is_unary_operator(name: &str) -> bool {
  matches!(name, "__not__" | "__uminus__")
}

/// `integer`/`real` promote to `real`; otherwise both operands must already share a tag.
fn promote(a: &str, b: &str) -> Option<&'static str> {
  match (a, b) {
    ("integer", "integer") => Option::Some("integer"),
    ("real", "real") => Option::Some("real"),
    ("integer", "real") | ("real", "integer") => Option::Some("real"),
    (x, y) if x == y => match x {
      "integer" => Option::Some("integer"),
      "real" => Option::Some("real"),
      "list" => Option::Some("list"),
      "boolean" => Option::Some("boolean"),
      "string" => Option::Some("string"),
      _ => Option::None,
    },
    _ => Option::None,
  }
}

fn as_f64(term: &Term) -> Option<f64> {
  match term {
    Term::Integer(v) => Option::Some(*v as f64),
    Term::Real(v) => Option::Some(v.0),
    _ => Option::None,
  }
}

fn map_to_boolean(term: &Term) -> Option<bool> {
  match term {
    Term::Boolean(b) => Option::Some(*b),
    _ => Option::None,
  }
}

fn term_display(term: &Term) -> String {
  term.to_string()
}

fn eval_binary_operator(opname: &str, a: Term, b: Term) -> EvalResult<Term> {
  let unsupported = |op: &'static str, a: &Term, b: &Term| -> Unwind {
    EvalError::UnsupportedOperator { operator: op, operand_types: format!("{}, {}", a.tag_name(), b.tag_name()) }.into()
  };

  match opname {
    "__plus__" => match (&a, &b) {
      (Term::List(x), Term::List(y)) => {
        let mut out = x.clone();
        out.extend(y.clone());
        Result::Ok(Term::List(out))
      }
      (Term::Str(_), _) | (_, Term::Str(_)) => Result::Ok(Term::str(format!("{}{}", term_display(&a), term_display(&b)))),
      _ => match promote(a.tag_name(), b.tag_name()) {
        Option::Some("integer") => {
          let (Term::Integer(x), Term::Integer(y)) = (&a, &b) else { unreachable!() };
          Result::Ok(Term::Integer(x + y))
        }
        Option::Some("real") => Result::Ok(Term::real(as_f64(&a).unwrap() + as_f64(&b).unwrap())),
        Option::Some("boolean") => Result::Err(unsupported("+", &a, &b)),
        _ => Result::Err(unsupported("+", &a, &b)),
      },
    },
    "__minus__" => arithmetic(&a, &b, "-", |x, y| x - y, |x, y| x - y),
    "__times__" => arithmetic(&a, &b, "*", |x, y| x * y, |x, y| x * y),
    "__divide__" => match promote(a.tag_name(), b.tag_name()) {
      Option::Some("integer") => {
        let (Term::Integer(x), Term::Integer(y)) = (&a, &b) else { unreachable!() };
        if *y == 0 {
          return Result::Err(EvalError::Message("division by zero".into()).into());
        }
        Result::Ok(Term::Integer(x / y))
      }
      Option::Some("real") => Result::Ok(Term::real(as_f64(&a).unwrap() / as_f64(&b).unwrap())),
      _ => Result::Err(unsupported("/", &a, &b)),
    },
    "__or__" => match (map_to_boolean(&a), map_to_boolean(&b)) {
      (Option::Some(x), Option::Some(y)) => Result::Ok(Term::Boolean(x || y)),
      _ => Result::Err(unsupported("or", &a, &b)),
    },
    "__and__" => match (map_to_boolean(&a), map_to_boolean(&b)) {
      (Option::Some(x), Option::Some(y)) => Result::Ok(Term::Boolean(x && y)),
      _ => Result::Err(unsupported("and", &a, &b)),
    },
    "__eq__" => Result::Ok(Term::Boolean(a == b)),
    "__ne__" => Result::Ok(Term::Boolean(a != b)),
    "__le__" | "__lt__" | "__ge__" | "__gt__" => match promote(a.tag_name(), b.tag_name()) {
      Option::Some("integer") | Option::Some("real") => {
        let x = as_f64(&a).unwrap();
        let y = as_f64(&b).unwrap();
        let result = match opname {
          "__le__" => x <= y,
          "__lt__" => x < y,
          "__ge__" => x >= y,
          _ => x > y,
        };
        Result::Ok(Term::Boolean(result))
      }
      _ => Result::Err(unsupported(opname, &a, &b)),
    },
    _ => Result::Err(EvalError::Message(format!("unknown builtin binary opname {opname}")).into()),
  }
}

fn arithmetic(
  a: &Term,
  b: &Term,
  op: &'static str,
  int_op: fn(i64, i64) -> i64,
  real_op: fn(f64, f64) -> f64,
) -> EvalResult<Term> {
  match promote(a.tag_name(), b.tag_name()) {
    Option::Some("integer") => {
      let (Term::Integer(x), Term::Integer(y)) = (a, b) else { unreachable!() };
      Result::Ok(Term::Integer(int_op(*x, *y)))
    }
    Option::Some("real") => Result::Ok(Term::real(real_op(as_f64(a).unwrap(), as_f64(b).unwrap()))),
    _ => Result::Err(
      EvalError::UnsupportedOperator { operator: op, operand_types: format!("{}, {}", a.tag_name(), b.tag_name()) }.into(),
    ),
  }
}

fn eval_unary_operator(opname: &str, value: Term) -> EvalResult<Term> {
  match opname {
    "__not__" => match map_to_boolean(&value) {
      Option::Some(b) => Result::Ok(Term::Boolean(!b)),
      Option::None => Result::Err(EvalError::Message("not a boolean value in not".into()).into()),
    },
    "__uminus__" => match value {
      Term::Integer(v) => Result::Ok(Term::Integer(-v)),
      Term::Real(v) => Result::Ok(Term::real(-v.0)),
      other => {
        Result::Err(EvalError::UnsupportedOperator { operator: "unary -", operand_types: other.tag_name().to_string() }.into())
      }
    },
    _ => Result::Err(EvalError::Message(format!("unknown builtin unary opname {opname}")).into()),
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;

  fn int(v: i64) -> Term {
    Term::Integer(v)
  }

  #[test]
  fn unify_statement_binds_the_pattern_variable() {
    let mut walker = Walker::new();
    walker.walk_stmt(&Term::Unify(Box::new(Term::Id("x".into())), Box::new(int(5)))).unwrap();
    assert_eq!(walker.symbols().lookup_sym(&"x".into()), Option::Some(&int(5)));
  }

  #[test]
  fn if_statement_runs_only_the_first_truthy_clause() {
    let mut walker = Walker::new();
    let clauses = vec![
      IfClause { condition: Term::Boolean(false), body: Rc::new(vec![Term::Unify(Box::new(Term::Id("x".into())), Box::new(int(1)))]) },
      IfClause { condition: Term::Boolean(true), body: Rc::new(vec![Term::Unify(Box::new(Term::Id("x".into())), Box::new(int(2)))]) },
      IfClause { condition: Term::Boolean(true), body: Rc::new(vec![Term::Unify(Box::new(Term::Id("x".into())), Box::new(int(3)))]) },
    ];
    walker.walk_stmt(&Term::If(clauses)).unwrap();
    assert_eq!(walker.symbols().lookup_sym(&"x".into()), Option::Some(&int(2)));
  }

  #[test]
  fn for_loop_filters_by_pattern_unification() {
    let mut walker = Walker::new();
    let pattern = Term::Tuple(vec![int(2), Term::Id("y".into())]);
    let list = Term::List(vec![
      Term::Tuple(vec![int(1), int(11)]),
      Term::Tuple(vec![int(2), int(21)]),
      Term::Tuple(vec![int(2), int(22)]),
    ]);
    let body = vec![Term::Unify(Box::new(Term::Id("last".into())), Box::new(Term::Id("y".into())))];
    walker.walk_stmt(&Term::For(Box::new(pattern), Box::new(list), Rc::new(body))).unwrap();
    assert_eq!(walker.symbols().lookup_sym(&"last".into()), Option::Some(&int(22)));
  }

  #[test]
  fn return_signal_unwinds_a_function_call_and_produces_its_payload() {
    let mut walker = Walker::new();
    let clause = Clause { pattern: Term::Id("n".into()), body: Rc::new(vec![Term::Return(Box::new(Term::Id("n".into())))]) };
    let function = FunctionValue { body: Rc::new(vec![clause]), closure: walker.symbols().get_config() };
    let result = walker.handle_call(&function, int(41)).unwrap();
    assert_eq!(result, int(41));
  }

  #[test]
  fn no_clause_unifies_is_an_error() {
    let mut walker = Walker::new();
    let clause = Clause { pattern: int(1), body: Rc::new(vec![]) };
    let function = FunctionValue { body: Rc::new(vec![clause]), closure: walker.symbols().get_config() };
    assert!(walker.handle_call(&function, int(2)).is_err());
  }

  #[test]
  fn closure_does_not_observe_mutations_after_capture() {
    let mut walker = Walker::new();
    walker.walk_stmt(&Term::Unify(Box::new(Term::Id("x".into())), Box::new(int(1)))).unwrap();
    let captured = walker.walk_expr(&Term::FunctionExp(Rc::new(vec![Clause {
      pattern: Term::Id("_".into()),
      body: Rc::new(vec![Term::Return(Box::new(Term::Id("x".into())))]),
    }]))).unwrap();
    walker.walk_stmt(&Term::Unify(Box::new(Term::Id("x".into())), Box::new(int(2)))).unwrap();

    let Term::FunctionVal(fval) = captured else { panic!("expected a function value") };
    let result = walker.handle_call(&fval, Term::None).unwrap();
    assert_eq!(result, int(1));
  }

  #[test]
  fn recursion_limit_is_enforced() {
    let mut walker = Walker::new().with_limits(WalkerLimits { max_call_depth: 2 });
    let clause = Clause { pattern: Term::Id("n".into()), body: Rc::new(vec![]) };
    let function = Rc::new(FunctionValue { body: Rc::new(vec![clause]), closure: walker.symbols().get_config() });
    walker.call_depth = 2;
    assert!(matches!(
      walker.handle_call(&function, int(1)),
      Result::Err(Unwind::Eval(EvalError::RecursionLimitExceeded(2)))
    ));
  }

  #[test]
  fn indexed_store_into_a_bound_list_rebinds_the_mutated_list() {
    let mut walker = Walker::new();
    walker
      .walk_stmt(&Term::Unify(
        Box::new(Term::Id("a".into())),
        Box::new(Term::List(vec![int(1), int(2), int(3)])),
      ))
      .unwrap();
    walker
      .walk_stmt(&Term::Unify(
        Box::new(Term::Index(Box::new(Term::Id("a".into())), Box::new(int(0)))),
        Box::new(int(99)),
      ))
      .unwrap();
    assert_eq!(
      walker.symbols().lookup_sym(&"a".into()),
      Option::Some(&Term::List(vec![int(99), int(2), int(3)]))
    );
  }

  #[test]
  fn eq_and_ne_compare_by_value() {
    assert_eq!(eval_binary_operator("__eq__", int(1), int(1)).unwrap(), Term::Boolean(true));
    assert_eq!(eval_binary_operator("__ne__", int(1), int(2)).unwrap(), Term::Boolean(true));
  }

  #[test]
  fn plus_concatenates_lists_and_adds_numbers() {
    assert_eq!(eval_binary_operator("__plus__", int(1), int(2)).unwrap(), int(3));
    assert_eq!(
      eval_binary_operator("__plus__", Term::List(vec![int(1)]), Term::List(vec![int(2)])).unwrap(),
      Term::List(vec![int(1), int(2)])
    );
  }

  #[test]
  fn divide_truncates_toward_zero_for_integers() {
    assert_eq!(eval_binary_operator("__divide__", int(7), int(2)).unwrap(), int(3));
    assert_eq!(eval_binary_operator("__divide__", int(-7), int(2)).unwrap(), int(-3));
  }
}
