//! Deferred Task Queue
//!
//! Work scheduled with [`Scope::eval_async`](super::Scope::eval_async) waits
//! here until the digest drains it. The digest drains the whole queue at the
//! top of every iteration, including tasks queued by tasks that ran earlier
//! in the same drain, and keeps iterating while anything is left. A task
//! scheduled during a digest therefore always runs before that digest
//! returns.
//!
//! Each task targets the scope that owns the queue.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::Scope;

pub(crate) type DeferredTask = Box<dyn FnOnce(&Scope)>;

#[derive(Default)]
pub(crate) struct DeferredQueue {
    tasks: RefCell<VecDeque<DeferredTask>>,
}

impl DeferredQueue {
    pub(crate) fn push(&self, task: DeferredTask) {
        self.tasks.borrow_mut().push_back(task);
    }

    /// Take the oldest task. The queue is not borrowed while it runs, so the
    /// task may schedule more.
    pub(crate) fn pop(&self) -> Option<DeferredTask> {
        self.tasks.borrow_mut().pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.borrow().len()
    }
}
