/*!

A small wrapper around `Rc<RefCell<T>>` (and its weak counterpart) with names that read better at
call sites than the standard library's. Used wherever the original implementation relies on a
Python dict or list being a shared, mutable reference: object memory, struct memory, and
symbol-table scope frames that are aliased rather than copied.

*/

use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};

pub struct RcCell<T>(Rc<RefCell<T>>);

impl<T> RcCell<T> {
  pub fn new(value: T) -> Self {
    RcCell(Rc::new(RefCell::new(value)))
  }

  pub fn borrow(&self) -> Ref<'_, T> {
    self.0.borrow()
  }

  pub fn borrow_mut(&self) -> RefMut<'_, T> {
    self.0.borrow_mut()
  }

  pub fn downgrade(&self) -> WeakCell<T> {
    WeakCell(Rc::downgrade(&self.0))
  }

  /// Pointer identity, not value equality. Two distinct objects that happen to hold equal data
  /// are not the same `RcCell`.
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }

  pub fn strong_count(&self) -> usize {
    Rc::strong_count(&self.0)
  }
}

impl<T> Clone for RcCell<T> {
  fn clone(&self) -> Self {
    RcCell(Rc::clone(&self.0))
  }
}

impl<T: Debug> Debug for RcCell<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "RcCell({:?})", self.0.borrow())
  }
}

/// Value equality (by borrowed contents), not pointer identity. Objects compare equal when their
/// memories hold equal values, matching the term model's `Term: PartialEq` derive on `ObjectValue`.
impl<T: PartialEq> PartialEq for RcCell<T> {
  fn eq(&self, other: &Self) -> bool {
    *self.0.borrow() == *other.0.borrow()
  }
}

pub struct WeakCell<T>(Weak<RefCell<T>>);

impl<T> WeakCell<T> {
  pub fn upgrade(&self) -> Option<RcCell<T>> {
    self.0.upgrade().map(RcCell)
  }
}

impl<T> Clone for WeakCell<T> {
  fn clone(&self) -> Self {
    WeakCell(self.0.clone())
  }
}
