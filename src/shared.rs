//! Copy-on-write cell.
//!
//! Cloning a `Shared` only bumps a reference count. `write` copies the payload
//! first when anyone else still holds it, so a write is never visible to
//! other holders. The cell always holds a value.

use std::fmt;
use std::rc::Rc;

pub struct Shared<T> {
    data: Rc<T>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            data: Rc::new(value),
        }
    }

    pub fn read(&self) -> &T {
        &self.data
    }

    /// True when a `write` would copy.
    pub fn needs_copy(&self) -> bool {
        Rc::strong_count(&self.data) > 1
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.data, &b.data)
    }
}

impl<T: Clone> Shared<T> {
    pub fn write(&mut self) -> &mut T {
        Rc::make_mut(&mut self.data)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            data: Rc::clone(&self.data),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.data.fmt(f)
    }
}
