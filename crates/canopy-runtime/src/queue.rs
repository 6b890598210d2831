#![forbid(unsafe_code)]

//! Explicit message queue.
//!
//! Listeners never call back into the program. The root event scope's sink
//! pushes onto a [`MessageQueue`] and the program drains it on its next
//! step, so an event delivered mid-apply cannot start a nested render.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Cloneable handle onto one FIFO of pending messages.
pub struct MessageQueue<M> {
    inner: Rc<RefCell<VecDeque<M>>>,
}

impl<M> Clone for MessageQueue<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M> Default for MessageQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for MessageQueue<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("pending", &self.len())
            .finish()
    }
}

impl<M> MessageQueue<M> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn push(&self, msg: M) {
        self.inner.borrow_mut().push_back(msg);
    }

    pub fn pop(&self) -> Option<M> {
        self.inner.borrow_mut().pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl<M: 'static> MessageQueue<M> {
    /// Closure pushing onto this queue, suitable as a root event sink.
    pub fn sink(&self) -> impl Fn(M) + 'static {
        let queue = self.clone();
        move |msg| queue.push(msg)
    }
}
