use std::num::NonZeroUsize;

use crate::{
    generator::Generator, worker::GeneratorWorker, Emitter, FnIter, Handoff, Interrupted,
    TryFnIter,
};

/// Configures the generator thread and the handoff between it and the consumer.
///
/// ```rust
/// use thread_fn_iter::Builder;
///
/// let numbers = Builder::new()
///     .name("numbers")
///     .capacity(16)
///     .fn_iter(|emitter| {
///         for i in 0..100 {
///             emitter.emit(i)?;
///         }
///         Ok(())
///     });
/// assert_eq!(numbers.sum::<i32>(), 4950);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
    handoff: Handoff,
}

impl Builder {
    /// A builder for an unnamed thread with the default stack size and a
    /// [`Handoff::Rendezvous`] handoff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name of the generator thread.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the stack size of the generator thread, in bytes.
    pub fn stack_size(self, stack_size: usize) -> Self {
        Self {
            stack_size: Some(stack_size),
            ..self
        }
    }

    /// Sets how items are handed from the generator thread to the consumer.
    pub fn handoff(self, handoff: Handoff) -> Self {
        Self { handoff, ..self }
    }

    /// Use [`Handoff::Rendezvous`]: `emit` blocks until the consumer has taken the previous item.
    pub fn rendezvous(self) -> Self {
        self.handoff(Handoff::Rendezvous)
    }

    /// Let the generator run up to `capacity` items ahead of the consumer.
    ///
    /// A capacity of 0 selects [`Handoff::Rendezvous`].
    pub fn capacity(self, capacity: usize) -> Self {
        match NonZeroUsize::new(capacity) {
            Some(capacity) => self.handoff(Handoff::Bounded(capacity)),
            None => self.rendezvous(),
        }
    }

    /// Builds an infallible iterator driven by `func`. See [`fn_iter`](crate::fn_iter).
    ///
    /// The thread is launched by [`FnIter::start`] or by the first pull.
    pub fn fn_iter<T, F>(self, func: F) -> FnIter<T>
    where
        T: Send + 'static,
        F: FnOnce(Emitter<T>) -> Result<(), Interrupted> + Send + 'static,
    {
        FnIter {
            inner: self.generator(Box::new(func)),
        }
    }

    /// Builds a fallible iterator driven by `func`. See [`try_fn_iter`](crate::try_fn_iter).
    ///
    /// The thread is launched by [`TryFnIter::start`] or by the first pull.
    pub fn try_fn_iter<T, E, F>(self, func: F) -> TryFnIter<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(Emitter<T>) -> Result<(), E> + Send + 'static,
    {
        TryFnIter {
            inner: self.generator(Box::new(func)),
        }
    }

    fn generator<T, E>(self, body: crate::worker::Body<T, E>) -> Generator<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let worker = GeneratorWorker::new(body, self.name, self.stack_size);
        Generator::new(worker, self.handoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_selects_handoff() {
        assert_eq!(Builder::new().handoff, Handoff::Rendezvous);
        assert_eq!(Builder::new().capacity(0).handoff, Handoff::Rendezvous);
        assert_eq!(
            Builder::new().capacity(3).handoff,
            Handoff::Bounded(NonZeroUsize::new(3).unwrap())
        );
        assert_eq!(
            Builder::new().capacity(3).rendezvous().handoff,
            Handoff::Rendezvous
        );
    }

    #[test]
    fn named_thread() {
        let names = Builder::new()
            .name("named-generator")
            .stack_size(256 * 1024)
            .fn_iter(|emitter| {
                let name = std::thread::current().name().map(str::to_owned);
                emitter.emit(name)?;
                Ok(())
            });
        assert_eq!(
            names.collect::<Vec<_>>(),
            vec![Some("named-generator".to_owned())]
        );
    }
}
