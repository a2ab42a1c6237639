//! Wait queue primitive for blocking and waking kernel tasks.
//!
//! A fixed-capacity queue of opaque task handles, protected by an
//! [`IrqMutex`] and integrated with the scheduler through the
//! `driver_runtime` service table. This is the building block for every
//! blocking network syscall: `netopen` waits here for ARP resolution,
//! `netread` for buffered bytes.
//!
//! # Usage
//!
//! ```rust,ignore
//! static CHANNEL: WaitQueue = WaitQueue::new();
//!
//! // Waiting side:
//! CHANNEL.wait_event(|| has_data());
//!
//! // Waking side:
//! CHANNEL.wake_all();
//! ```
//!
//! Wakeups may be spurious; `wait_event` re-checks its predicate on every
//! iteration, so callers only ever observe the predicate holding.

use crate::IrqMutex;
use crate::kernel_services::driver_runtime::{
    self, DriverTaskHandle, block_current_task, current_task, unblock_task,
};

/// Maximum number of tasks that can wait on a single `WaitQueue`.
const WAITQUEUE_CAPACITY: usize = 16;

const NULL_HANDLE: DriverTaskHandle = core::ptr::null_mut();

struct WaitQueueInner {
    /// Waiting task handles. Null entries are empty slots.
    waiters: [DriverTaskHandle; WAITQUEUE_CAPACITY],
    count: usize,
}

impl WaitQueueInner {
    const fn new() -> Self {
        Self {
            waiters: [NULL_HANDLE; WAITQUEUE_CAPACITY],
            count: 0,
        }
    }

    /// Add `task` to the queue. Returns `false` if the queue is full.
    fn enqueue(&mut self, task: DriverTaskHandle) -> bool {
        if task.is_null() {
            return false;
        }
        for slot in self.waiters.iter_mut() {
            if slot.is_null() {
                *slot = task;
                self.count += 1;
                return true;
            }
        }
        false
    }

    fn dequeue_one(&mut self) -> Option<DriverTaskHandle> {
        for slot in self.waiters.iter_mut() {
            if !slot.is_null() {
                let task = *slot;
                *slot = NULL_HANDLE;
                self.count -= 1;
                return Some(task);
            }
        }
        None
    }

    fn remove_task(&mut self, task: DriverTaskHandle) {
        for slot in self.waiters.iter_mut() {
            if *slot == task {
                *slot = NULL_HANDLE;
                self.count -= 1;
                return;
            }
        }
    }
}

// SAFETY: `DriverTaskHandle` is an opaque pointer managed by the
// scheduler; access is synchronised through the `IrqMutex`.
unsafe impl Send for WaitQueueInner {}

/// A wait queue for blocking and waking kernel tasks.
pub struct WaitQueue {
    inner: IrqMutex<WaitQueueInner>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            inner: IrqMutex::new(WaitQueueInner::new()),
        }
    }

    /// Block the current task until `condition()` returns `true`.
    ///
    /// The condition is checked before sleeping and re-checked under the
    /// queue lock to close the race against a concurrent wake, then again
    /// after every wakeup. Returns `false` if blocking is impossible
    /// (no scheduler runtime installed, no current task, or queue full) —
    /// the condition may still be false in that case.
    ///
    /// # Lost-wakeup safety
    ///
    /// The scheduler's pending-wakeup contract covers the window between
    /// enqueue and `block_current_task()`: an `unblock_task` landing in
    /// that window makes the block a no-op.
    pub fn wait_event<F: Fn() -> bool>(&self, condition: F) -> bool {
        loop {
            if condition() {
                return true;
            }

            if !driver_runtime::is_driver_runtime_initialized() {
                return false;
            }

            let task = current_task();
            if task.is_null() {
                return false;
            }

            {
                let mut inner = self.inner.lock();
                if condition() {
                    return true;
                }
                if !inner.enqueue(task) {
                    return false;
                }
            }

            block_current_task();

            // Woken (possibly spuriously) — loop and re-check. The
            // scheduler may leave us enqueued on a spurious path, so
            // drop any stale entry before retrying.
            let mut inner = self.inner.lock();
            inner.remove_task(task);
        }
    }

    /// Wake one waiting task. Returns `true` if a task was woken.
    pub fn wake_one(&self) -> bool {
        let task = {
            let mut inner = self.inner.lock();
            inner.dequeue_one()
        };

        match task {
            Some(task) => {
                let _ = unblock_task(task);
                true
            }
            None => false,
        }
    }

    /// Wake all waiting tasks. Returns the number woken.
    pub fn wake_all(&self) -> usize {
        // Collect under the lock, unblock outside it so the scheduler is
        // never entered with the queue lock held.
        let mut tasks = [NULL_HANDLE; WAITQUEUE_CAPACITY];
        let mut count = 0;
        {
            let mut inner = self.inner.lock();
            while let Some(task) = inner.dequeue_one() {
                tasks[count] = task;
                count += 1;
            }
        }

        for task in &tasks[..count] {
            let _ = unblock_task(*task);
        }
        count
    }

    pub fn has_waiters(&self) -> bool {
        self.inner.lock().count > 0
    }

    pub fn waiter_count(&self) -> usize {
        self.inner.lock().count
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}
