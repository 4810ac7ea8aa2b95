use std::{
    any::Any,
    collections::VecDeque,
    mem,
    num::NonZeroUsize,
    sync::{Condvar, Mutex, MutexGuard},
    task::Waker,
};

use crate::{generator::TaskState, Interrupted, StartError};

pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// How items are handed from the generator thread to the consumer.
///
/// [`Handoff::Rendezvous`] keeps a single slot: the generator blocks in `emit` until the consumer
/// has taken the previous item, so the two sides run in lock-step and nothing is produced ahead
/// of demand.
///
/// [`Handoff::Bounded`] keeps a queue of up to N items, letting the generator run ahead of the
/// consumer. This pays off when producing an item is expensive and takes roughly the same time
/// for every item. A capacity of one behaves like [`Handoff::Rendezvous`] through a queue; a
/// large capacity maximizes throughput, but items produced ahead are thrown away if the consumer
/// closes the iterator early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handoff {
    #[default]
    Rendezvous,
    Bounded(NonZeroUsize),
}

pub(crate) enum Entry<T, E> {
    Item(T),
    Stop,
    Failed(E),
    Panicked(PanicPayload),
}

/// What the consumer would get next, without taking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Front {
    Item,
    Stop,
    Error,
}

enum Buffer<T, E> {
    Slot(Option<Entry<T, E>>),
    Queue {
        entries: VecDeque<Entry<T, E>>,
        capacity: usize,
    },
}

impl<T, E> Buffer<T, E> {
    fn new(handoff: Handoff) -> Self {
        match handoff {
            Handoff::Rendezvous => Buffer::Slot(None),
            Handoff::Bounded(capacity) => Buffer::Queue {
                entries: VecDeque::new(),
                capacity: capacity.get(),
            },
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Buffer::Slot(slot) => slot.is_none(),
            Buffer::Queue { entries, .. } => entries.is_empty(),
        }
    }

    fn is_full(&self) -> bool {
        match self {
            Buffer::Slot(slot) => slot.is_some(),
            Buffer::Queue { entries, capacity } => entries.len() >= *capacity,
        }
    }

    fn front(&self) -> Option<&Entry<T, E>> {
        match self {
            Buffer::Slot(slot) => slot.as_ref(),
            Buffer::Queue { entries, .. } => entries.front(),
        }
    }

    fn front_mut(&mut self) -> Option<&mut Entry<T, E>> {
        match self {
            Buffer::Slot(slot) => slot.as_mut(),
            Buffer::Queue { entries, .. } => entries.front_mut(),
        }
    }

    fn push(&mut self, entry: Entry<T, E>) {
        debug_assert!(!self.is_full());
        match self {
            Buffer::Slot(slot) => *slot = Some(entry),
            Buffer::Queue { entries, .. } => entries.push_back(entry),
        }
    }

    fn pop(&mut self) -> Option<Entry<T, E>> {
        match self {
            Buffer::Slot(slot) => slot.take(),
            Buffer::Queue { entries, .. } => entries.pop_front(),
        }
    }

    fn clear(&mut self) {
        match self {
            Buffer::Slot(slot) => *slot = None,
            Buffer::Queue { entries, .. } => entries.clear(),
        }
    }

    /// Takes the front entry. The terminal marker is never removed: an error is handed out once
    /// and replaced by a plain stop.
    fn take_front(&mut self) -> Option<Entry<T, E>> {
        if matches!(self.front()?, Entry::Item(_)) {
            return self.pop();
        }
        let front = self.front_mut()?;
        Some(match front {
            Entry::Stop => Entry::Stop,
            terminal => mem::replace(terminal, Entry::Stop),
        })
    }
}

struct State<T, E> {
    buffer: Buffer<T, E>,
    task: TaskState,
    sealed: bool,
    cancelled: bool,
    interrupt_observed: bool,
    waker: Option<Waker>,
}

/// Bounded buffer between the generator thread and its consumer.
///
/// Everything shared between the two sides lives under one mutex, so a consumer woken by an
/// entry also sees the task state and cancellation flag that were published with it.
pub(crate) struct HandoffChannel<T, E> {
    state: Mutex<State<T, E>>,
    readable: Condvar,
    writable: Condvar,
}

impl<T, E> HandoffChannel<T, E> {
    pub(crate) fn new(handoff: Handoff) -> Self {
        Self {
            state: Mutex::new(State {
                buffer: Buffer::new(handoff),
                task: TaskState::Created,
                sealed: false,
                cancelled: false,
                interrupt_observed: false,
                waker: None,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().expect("Mutex was poisoned")
    }

    /// Wakes blocked consumers and hands back the registered async waker.
    ///
    /// The caller wakes it after releasing the lock.
    fn wake_consumers(&self, state: &mut State<T, E>) -> Option<Waker> {
        self.readable.notify_all();
        state.waker.take()
    }

    /// Blocks while the buffer is full. Fails once the consumer has cancelled.
    pub(crate) fn put(&self, item: T) -> Result<(), Interrupted> {
        let mut state = self
            .writable
            .wait_while(self.lock(), |s| {
                s.buffer.is_full() && !s.cancelled && !s.sealed
            })
            .expect("Mutex was poisoned");
        if state.cancelled || state.sealed {
            state.interrupt_observed = true;
            return Err(Interrupted);
        }
        state.buffer.push(Entry::Item(item));
        let waker = self.wake_consumers(&mut state);
        drop(state);
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        let mut state = self.lock();
        if state.cancelled {
            state.interrupt_observed = true;
        }
        state.cancelled
    }

    /// Whether the generator body has been told to stop, by `put` or `is_cancelled`.
    pub(crate) fn interrupt_observed(&self) -> bool {
        self.lock().interrupt_observed
    }

    /// Blocks until an entry is available and reports its kind without removing it.
    pub(crate) fn peek(&self) -> Front {
        let state = self
            .readable
            .wait_while(self.lock(), |s| s.buffer.is_empty())
            .expect("Mutex was poisoned");
        match state.buffer.front() {
            Some(Entry::Item(_)) => Front::Item,
            Some(Entry::Failed(_) | Entry::Panicked(_)) => Front::Error,
            Some(Entry::Stop) | None => Front::Stop,
        }
    }

    /// Blocks until an entry is available and takes it.
    pub(crate) fn take(&self) -> Entry<T, E> {
        let mut state = self
            .readable
            .wait_while(self.lock(), |s| s.buffer.is_empty())
            .expect("Mutex was poisoned");
        self.take_locked(&mut state).unwrap_or(Entry::Stop)
    }

    /// Takes an entry if one is available, otherwise registers `waker` to be woken when one is.
    pub(crate) fn poll_take(&self, waker: &Waker) -> Option<Entry<T, E>> {
        let mut state = self.lock();
        if state.buffer.is_empty() {
            state.waker = Some(waker.clone());
            return None;
        }
        self.take_locked(&mut state)
    }

    fn take_locked(&self, state: &mut State<T, E>) -> Option<Entry<T, E>> {
        let entry = state.buffer.take_front()?;
        if matches!(entry, Entry::Item(_)) {
            self.writable.notify_all();
        }
        Some(entry)
    }

    /// `Created -> Running`.
    pub(crate) fn begin(&self) -> Result<(), StartError> {
        let mut state = self.lock();
        match state.task {
            TaskState::Created => {
                state.task = TaskState::Running;
                Ok(())
            }
            _ if state.cancelled => Err(StartError::Closed),
            _ => Err(StartError::AlreadyStarted),
        }
    }

    /// Records the terminal state and deposits the terminal marker.
    ///
    /// Waits for room in the buffer unless the consumer has cancelled; cancelling empties the
    /// buffer, so the marker always fits once the wait is over.
    ///
    /// # Panics
    /// If called twice.
    pub(crate) fn seal(&self, task: TaskState, entry: Entry<T, E>) {
        debug_assert!(task.is_terminal());
        debug_assert!(!matches!(entry, Entry::Item(_)));
        let mut state = self.lock();
        assert!(!state.sealed, "terminal marker deposited twice");
        state.task = task;
        let mut state = self
            .writable
            .wait_while(state, |s| s.buffer.is_full() && !s.cancelled)
            .expect("Mutex was poisoned");
        state.buffer.push(entry);
        state.sealed = true;
        let waker = self.wake_consumers(&mut state);
        drop(state);
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Requests a cooperative stop. Items produced but not yet consumed are dropped.
    ///
    /// Returns `false` if the generator had already been cancelled or had already deposited its
    /// terminal marker.
    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.lock();
        if state.cancelled || state.sealed {
            return false;
        }
        state.cancelled = true;
        state.buffer.clear();
        if state.task == TaskState::Created {
            state.task = TaskState::Cancelled;
            state.buffer.push(Entry::Stop);
            state.sealed = true;
        }
        self.writable.notify_all();
        let waker = self.wake_consumers(&mut state);
        drop(state);
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    pub(crate) fn task_state(&self) -> TaskState {
        self.lock().task
    }

    /// Blocks until the terminal marker has been deposited.
    pub(crate) fn wait_sealed(&self) -> TaskState {
        self.readable
            .wait_while(self.lock(), |s| !s.sealed)
            .expect("Mutex was poisoned")
            .task
    }
}
