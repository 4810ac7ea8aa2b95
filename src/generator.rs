use std::{
    panic,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
};

use crate::{
    channel::{Entry, Front, Handoff, HandoffChannel},
    worker::GeneratorWorker,
    NextError, StartError,
};

/// Lifecycle of the generator task behind an iterator.
///
/// `Created -> Running -> Completed | Failed | Cancelled`. A generator closed before it was
/// started goes straight from `Created` to `Cancelled`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Built, thread not launched yet.
    Created,
    /// Thread launched, body not finished yet.
    Running,
    /// The body returned normally.
    Completed,
    /// The body returned an error, panicked, or its thread could not be spawned.
    Failed,
    /// The body stopped because the consumer closed the iterator.
    Cancelled,
}

impl TaskState {
    /// Whether the generator has finished, one way or another.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// Pull side and lifecycle of one generator task. Shared by [`FnIter`](crate::FnIter) and
/// [`TryFnIter`](crate::TryFnIter).
pub(crate) struct Generator<T, E> {
    channel: Arc<HandoffChannel<T, E>>,
    pending: Mutex<Option<GeneratorWorker<T, E>>>,
}

impl<T, E> Generator<T, E> {
    fn lock_pending(&self) -> MutexGuard<'_, Option<GeneratorWorker<T, E>>> {
        self.pending.lock().expect("Mutex was poisoned")
    }

    /// Idempotent. Never waits for the worker thread.
    pub(crate) fn close(&self) {
        let mut pending = self.lock_pending();
        let body = pending.take();
        let cancelled = self.channel.cancel();
        drop(pending);
        drop(body);
        if cancelled {
            log::debug!("generator closed by its consumer");
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        self.channel.task_state()
    }
}

impl<T: Send + 'static, E: Send + 'static> Generator<T, E> {
    pub(crate) fn new(worker: GeneratorWorker<T, E>, handoff: Handoff) -> Self {
        Self {
            channel: Arc::new(HandoffChannel::new(handoff)),
            pending: Mutex::new(Some(worker)),
        }
    }

    pub(crate) fn start(&self) -> Result<(), StartError> {
        let mut pending = self.lock_pending();
        self.channel.begin()?;
        let worker = pending.take().ok_or(StartError::AlreadyStarted)?;
        if let Err(e) = worker.spawn(self.channel.clone()) {
            log::debug!("failed to spawn generator thread: {e}");
            self.channel.seal(TaskState::Failed, Entry::Stop);
            return Err(StartError::Spawn(e));
        }
        Ok(())
    }

    /// Pulling from a generator nobody started launches it.
    fn ensure_started(&self) {
        if self.channel.task_state() != TaskState::Created {
            return;
        }
        match self.start() {
            Ok(()) | Err(StartError::AlreadyStarted | StartError::Closed) => {}
            Err(StartError::Spawn(e)) => {
                log::warn!("generator could not be started, ending the sequence: {e}");
            }
        }
    }

    pub(crate) fn wait_for_exit(&self) -> TaskState {
        self.ensure_started();
        self.channel.wait_sealed()
    }

    pub(crate) fn has_next(&self) -> bool {
        self.ensure_started();
        self.channel.peek() != Front::Stop
    }

    pub(crate) fn try_next(&self) -> Result<T, NextError<E>> {
        self.ensure_started();
        deliver(self.channel.take())
    }

    pub(crate) fn poll_next(&self, cx: &mut Context<'_>) -> Poll<Result<T, NextError<E>>> {
        self.ensure_started();
        match self.channel.poll_take(cx.waker()) {
            None => Poll::Pending,
            Some(entry) => Poll::Ready(deliver(entry)),
        }
    }
}

fn deliver<T, E>(entry: Entry<T, E>) -> Result<T, NextError<E>> {
    match entry {
        Entry::Item(value) => Ok(value),
        Entry::Stop => Err(NextError::NoMoreElements),
        Entry::Failed(e) => Err(NextError::Failed(e)),
        Entry::Panicked(payload) => panic::resume_unwind(payload),
    }
}

impl<T, E> Drop for Generator<T, E> {
    fn drop(&mut self) {
        self.close();
    }
}
