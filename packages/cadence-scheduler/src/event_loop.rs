use crate::clock::{Clock, ManualClock, MonotonicClock, Time, WallClock};
use crate::error::SchedulerError;
use crate::host::{Host, HostCapabilities, HostTask, TimerId};
use slotmap::SlotMap;
use std::cell::{Cell, RefCell};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;

struct TimerEntry {
    due: Time,
    seq: u64,
    id: TimerId,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .total_cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimerEntry {}

#[derive(Default)]
struct Queues {
    seq: u64,
    messages: VecDeque<HostTask>,
    timers: SlotMap<TimerId, HostTask>,
    timer_order: BinaryHeap<Reverse<TimerEntry>>,
}

impl Queues {
    fn next_seq(&mut self) -> u64 {
        let current = self.seq;
        self.seq += 1;
        current
    }

    /// Move every timer due at `now` onto the back of the message queue.
    fn enqueue_due_timers(&mut self, now: Time) {
        while let Some(Reverse(entry)) = self.timer_order.peek() {
            if entry.due > now {
                break;
            }
            let id = entry.id;
            self.timer_order.pop();
            // cleared timers leave a stale heap entry behind
            if let Some(task) = self.timers.remove(id) {
                self.messages.push_back(task);
            }
        }
    }

    fn next_timer_due(&mut self) -> Option<Time> {
        while let Some(Reverse(entry)) = self.timer_order.peek() {
            if self.timers.contains_key(entry.id) {
                return Some(entry.due);
            }
            self.timer_order.pop();
        }
        None
    }
}

/// A single-threaded host: one FIFO message queue plus timers.
///
/// Each [`turn`](EventLoop::turn) runs exactly one task. Errors returned by a
/// task are handed back to the caller of `turn`; the `run_*` helpers log them
/// and keep them as unhandled errors.
pub struct EventLoop {
    capabilities: HostCapabilities,
    clock: Rc<dyn Clock>,
    virtual_time: bool,
    queues: RefCell<Queues>,
    input_pending: Cell<bool>,
    unhandled: RefCell<Vec<SchedulerError>>,
}

impl EventLoop {
    /// A host whose clock only moves through `advance` or while idling
    /// towards the next timer.
    pub fn virtual_time(capabilities: HostCapabilities) -> Self {
        Self::with_clock(capabilities, Rc::new(ManualClock::new()), true)
    }

    /// A host on the real monotonic clock. Idling sleeps the thread.
    pub fn real_time(capabilities: HostCapabilities) -> Self {
        Self::with_clock(capabilities, Rc::new(MonotonicClock::new()), false)
    }

    fn with_clock(capabilities: HostCapabilities, clock: Rc<dyn Clock>, virtual_time: bool) -> Self {
        Self {
            capabilities,
            clock,
            virtual_time,
            queues: RefCell::new(Queues::default()),
            input_pending: Cell::new(false),
            unhandled: RefCell::new(Vec::new()),
        }
    }

    pub fn now(&self) -> Time {
        self.clock.now()
    }

    /// Let `ms` pass. Virtual clocks jump; the real clock sleeps.
    pub fn advance(&self, ms: Time) {
        if !self.clock.wait_until(self.clock.now() + ms) {
            tracing::warn!(ms, "cannot advance that far");
        }
    }

    /// What the input-pending query reports from now on.
    pub fn set_input_pending(&self, pending: bool) {
        self.input_pending.set(pending);
    }

    pub fn pending_messages(&self) -> usize {
        self.queues.borrow().messages.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.queues.borrow().timers.len()
    }

    pub fn is_idle(&self) -> bool {
        let queues = self.queues.borrow();
        queues.messages.is_empty() && queues.timers.is_empty()
    }

    /// Run one task. `Ok(false)` when nothing is runnable right now.
    pub fn turn(&self) -> Result<bool, SchedulerError> {
        let task = {
            let mut queues = self.queues.borrow_mut();
            queues.enqueue_due_timers(self.clock.now());
            queues.messages.pop_front()
        };
        match task {
            Some(task) => task().map(|()| true),
            None => Ok(false),
        }
    }

    /// Run up to `max_turns` tasks, waiting for timers when the queue is
    /// empty. Returns the number of tasks run.
    pub fn run_turns(&self, max_turns: usize) -> usize {
        let mut ran = 0;
        while ran < max_turns {
            match self.turn() {
                Ok(true) => ran += 1,
                Ok(false) => {
                    let next_due = self.queues.borrow_mut().next_timer_due();
                    match next_due {
                        Some(due) if self.clock.wait_until(due) => {}
                        Some(due) => {
                            tracing::warn!(due, "next timer is out of reach; stopping");
                            break;
                        }
                        None => break,
                    }
                }
                Err(err) => {
                    ran += 1;
                    self.report_unhandled(err);
                }
            }
        }
        ran
    }

    /// Run until no message or timer is left.
    pub fn run_until_idle(&self) -> usize {
        self.run_turns(usize::MAX)
    }

    /// Run whatever is runnable before `now + ms`, then leave the clock there.
    pub fn run_for(&self, ms: Time) -> usize {
        let until = self.clock.now() + ms;
        let mut ran = 0;
        loop {
            match self.turn() {
                Ok(true) => ran += 1,
                Ok(false) => {
                    let next_due = self.queues.borrow_mut().next_timer_due();
                    match next_due {
                        Some(due) if due <= until && self.clock.wait_until(due) => {}
                        _ => break,
                    }
                }
                Err(err) => {
                    ran += 1;
                    self.report_unhandled(err);
                }
            }
        }
        self.clock.wait_until(until);
        ran
    }

    pub fn take_unhandled_errors(&self) -> Vec<SchedulerError> {
        std::mem::take(&mut *self.unhandled.borrow_mut())
    }

    fn report_unhandled(&self, err: SchedulerError) {
        tracing::error!(%err, "unhandled error from host task");
        self.unhandled.borrow_mut().push(err);
    }
}

impl Host for EventLoop {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn high_resolution_clock(&self) -> Option<Rc<dyn Clock>> {
        self.capabilities
            .high_resolution_clock
            .then(|| self.clock.clone())
    }

    fn wall_clock(&self) -> Rc<dyn Clock> {
        // keep simulated runs deterministic
        if self.virtual_time {
            self.clock.clone()
        } else {
            Rc::new(WallClock::new())
        }
    }

    fn post_message(&self, task: HostTask) {
        if !self.capabilities.message_channel {
            self.set_timeout(task, 0.0);
            return;
        }
        self.queues.borrow_mut().messages.push_back(task);
    }

    fn set_timeout(&self, task: HostTask, delay_ms: Time) -> TimerId {
        // NaN and negative delays are due now; infinite ones saturate
        let due = self.clock.now() + delay_ms.clamp(0.0, Time::MAX).max(0.0);
        let mut queues = self.queues.borrow_mut();
        let id = queues.timers.insert(task);
        let seq = queues.next_seq();
        queues.timer_order.push(Reverse(TimerEntry { due, seq, id }));
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.queues.borrow_mut().timers.remove(id);
    }

    fn is_input_pending(&self) -> bool {
        self.capabilities.input_pending && self.input_pending.get()
    }
}
