use std::io;

use thiserror::Error;

/// Returned from [`Emitter::emit`](crate::Emitter::emit) once the consumer has closed the iterator.
///
/// The generator body should stop producing when it sees this, usually by propagating it with `?`.
/// A body that stops this way ends quietly: the consumer never sees the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("generator was interrupted by its consumer")]
pub struct Interrupted;

impl From<Interrupted> for io::Error {
    fn from(e: Interrupted) -> Self {
        io::Error::new(io::ErrorKind::Interrupted, e)
    }
}

/// Error returned by [`TryFnIter::try_next`](crate::TryFnIter::try_next).
#[derive(Debug, PartialEq, Eq, Error)]
pub enum NextError<E> {
    /// The generator has finished and every item has been consumed.
    #[error("no more elements")]
    NoMoreElements,
    /// The generator body returned this error. Delivered exactly once.
    #[error("{0}")]
    Failed(E),
}

impl<E> NextError<E> {
    /// Returns the generator's error, if this is one.
    pub fn into_failed(self) -> Option<E> {
        match self {
            NextError::NoMoreElements => None,
            NextError::Failed(e) => Some(e),
        }
    }
}

/// Error returned when launching the generator thread.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("generator was already started")]
    AlreadyStarted,
    #[error("generator was closed before it was started")]
    Closed,
    #[error("failed to spawn generator thread")]
    Spawn(#[from] io::Error),
}
