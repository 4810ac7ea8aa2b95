use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

use crate::{
    channel::{Entry, HandoffChannel},
    generator::TaskState,
    Interrupted,
};

/// An intermediary that transfers values from the generator body to its consumer.
///
/// Passed by value to the closure given to [`fn_iter`](crate::fn_iter) or
/// [`try_fn_iter`](crate::try_fn_iter).
pub struct Emitter<T> {
    sink: Arc<dyn Sink<T>>,
}

trait Sink<T>: Send + Sync {
    fn put(&self, value: T) -> Result<(), Interrupted>;
    fn is_cancelled(&self) -> bool;
}

impl<T: Send, E: Send> Sink<T> for HandoffChannel<T, E> {
    fn put(&self, value: T) -> Result<(), Interrupted> {
        HandoffChannel::put(self, value)
    }

    fn is_cancelled(&self) -> bool {
        HandoffChannel::is_cancelled(self)
    }
}

impl<T> Emitter<T> {
    /// Hand `value` to the consumer.
    ///
    /// Blocks while the handoff buffer is full: with [`Handoff::Rendezvous`](crate::Handoff)
    /// that means until the consumer has taken the previous value.
    ///
    /// Returns [`Interrupted`] once the consumer has closed the iterator. The value is dropped
    /// and the body should return, usually by propagating the error with `?`.
    pub fn emit(&self, value: T) -> Result<(), Interrupted> {
        self.sink.put(value)
    }

    /// Whether the consumer has closed the iterator.
    ///
    /// Lets a body doing long stretches of work between `emit` calls stop early. A `true` here
    /// counts as a request to stop, same as an `Err` from [`Emitter::emit`].
    pub fn is_cancelled(&self) -> bool {
        self.sink.is_cancelled()
    }
}

pub(crate) type Body<T, E> = Box<dyn FnOnce(Emitter<T>) -> Result<(), E> + Send + 'static>;

/// Runs a generator body on a dedicated thread and turns its outcome into the terminal marker.
pub(crate) struct GeneratorWorker<T, E> {
    body: Body<T, E>,
    name: Option<String>,
    stack_size: Option<usize>,
}

impl<T: Send + 'static, E: Send + 'static> GeneratorWorker<T, E> {
    pub(crate) fn new(body: Body<T, E>, name: Option<String>, stack_size: Option<usize>) -> Self {
        Self {
            body,
            name,
            stack_size,
        }
    }

    /// Spawns the thread. It is detached: nothing joins it and it does not keep the process
    /// alive.
    pub(crate) fn spawn(self, channel: Arc<HandoffChannel<T, E>>) -> io::Result<()> {
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name.clone() {
            builder = builder.name(name);
        }
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let label = self.name.unwrap_or_else(|| "<unnamed>".to_owned());
        let body = self.body;
        builder.spawn(move || run(&label, body, channel))?;
        Ok(())
    }
}

fn run<T: Send + 'static, E: Send + 'static>(
    label: &str,
    body: Body<T, E>,
    channel: Arc<HandoffChannel<T, E>>,
) {
    log::trace!("generator '{label}' starting");
    let emitter = Emitter {
        sink: channel.clone(),
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || body(emitter)));

    // Once the body has been told to stop, whatever it returns is the stop propagating.
    let interrupted = channel.interrupt_observed();
    let (task, entry) = match outcome {
        Ok(Ok(())) if interrupted => (TaskState::Cancelled, Entry::Stop),
        Ok(Ok(())) => (TaskState::Completed, Entry::Stop),
        Ok(Err(_)) if interrupted => {
            log::debug!("generator '{label}' returned an error after being interrupted, dropping it");
            (TaskState::Cancelled, Entry::Stop)
        }
        Ok(Err(e)) => (TaskState::Failed, Entry::Failed(e)),
        Err(_) if interrupted => {
            log::debug!("generator '{label}' panicked after being interrupted");
            (TaskState::Cancelled, Entry::Stop)
        }
        Err(payload) => (TaskState::Failed, Entry::Panicked(payload)),
    };
    log::debug!("generator '{label}' finished: {task:?}");
    channel.seal(task, entry);
    log::trace!("generator '{label}' exiting");
}
