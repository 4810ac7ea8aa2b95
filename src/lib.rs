//! Iterators backed by a closure that emits values from its own thread.
//!
//! Some sequences are easiest to write as a procedure that pushes values out one at a time:
//! walking a tree, reading records from a file, paging through an API. This crate runs such a
//! procedure on a dedicated thread and lets the caller pull the values as an ordinary
//! [`Iterator`] (or as a [`Stream`](futures_util::Stream)).
//!
//! Two functions are provided - [`fn_iter`] and [`try_fn_iter`].
//!
//! # Usage
//!
//! If the generator may fail, use [`try_fn_iter`], otherwise use [`fn_iter`].
//!
//! 1.  Invoke [`fn_iter`] or [`try_fn_iter`], passing a closure.
//! 2.  The closure accepts an [`Emitter`].
//!     To hand a value to the consumer, call `.emit(value)?` on it.
//!     `emit` blocks while the handoff buffer is full, and fails with [`Interrupted`] once the
//!     consumer has closed the iterator; `?` then stops the closure.
//! 3.  (for [`try_fn_iter`] only) Return errors from the closure via `return Err(...)` or `?`.
//!     The consumer gets the error once, after every item emitted before it.
//!
//! The thread starts on the first pull, or earlier through `start()`. Dropping the iterator (or
//! calling `close()`) asks the closure to stop at its next `emit`; the thread is never joined and
//! never keeps the process alive.
//!
//! Producing values on another thread costs a synchronization per item, so this pays off when
//! producing an item is expensive (I/O, heavy computation) compared to consuming it.
//! [`Builder::capacity`] lets the generator run ahead of the consumer.
//!
//! # Examples
//!
//! Finite sequence of numbers
//!
//! ```rust
//! use thread_fn_iter::fn_iter;
//!
//! let numbers = fn_iter(|emitter| {
//!     for i in 0..3 {
//!         // hand elements to the consumer via `emitter`
//!         emitter.emit(i)?;
//!     }
//!     Ok(())
//! });
//! assert_eq!(numbers.collect::<Vec<_>>(), vec![0, 1, 2]);
//! ```
//!
//! Read numbers from text file, with error handling
//!
//! ```rust
//! use std::{
//!     fs::File,
//!     io::{BufRead, BufReader},
//! };
//!
//! use anyhow::Context;
//! use thread_fn_iter::{try_fn_iter, TryFnIter};
//!
//! fn read_numbers(file_name: String) -> TryFnIter<i32, anyhow::Error> {
//!     try_fn_iter(|emitter| {
//!         // Return errors via `?` operator.
//!         let file = BufReader::new(File::open(file_name).context("Failed to open file")?);
//!         for line in file.lines() {
//!             let line = line.context("Failed to read line")?;
//!             for token in line.split_ascii_whitespace() {
//!                 let number: i32 = token
//!                     .parse()
//!                     .with_context(|| format!("Failed to convert string \"{token}\" to number"))?;
//!                 emitter.emit(number)?;
//!             }
//!         }
//!         Ok(())
//!     })
//! }
//! ```
//!
//! # Concurrent consumers
//!
//! `has_next` and `try_next` take `&self` and may be called from several threads, but they are
//! two separate operations: a `has_next() == true` seen by one thread does not reserve the item,
//! and another thread's `try_next` may take it first.

use std::iter::FusedIterator;

mod builder;
mod channel;
mod error;
mod generator;
mod stream;
mod worker;

pub use builder::Builder;
pub use channel::Handoff;
pub use error::{Interrupted, NextError, StartError};
pub use generator::TaskState;
pub use worker::Emitter;

use generator::Generator;

/// Iterator created by [`fn_iter`].
pub struct FnIter<T> {
    inner: Generator<T, Interrupted>,
}

/// Create a new infallible iterator whose items are produced by `func` on its own thread.
///
/// `func` hands successive items to the consumer via [`Emitter::emit`] and stops when `emit`
/// returns [`Interrupted`]. The thread is launched on the first pull or by [`FnIter::start`].
///
/// # Example
///
/// ```rust
/// use thread_fn_iter::{fn_iter, FnIter};
///
/// fn squares(limit: u64) -> FnIter<u64> {
///     fn_iter(move |emitter| {
///         for i in 0..limit {
///             emitter.emit(i * i)?;
///         }
///         Ok(())
///     })
/// }
///
/// assert_eq!(squares(4).collect::<Vec<_>>(), vec![0, 1, 4, 9]);
/// ```
pub fn fn_iter<T, F>(func: F) -> FnIter<T>
where
    T: Send + 'static,
    F: FnOnce(Emitter<T>) -> Result<(), Interrupted> + Send + 'static,
{
    Builder::new().fn_iter(func)
}

impl<T: Send + 'static> FnIter<T> {
    /// Launch the generator thread now instead of on the first pull.
    pub fn start(&self) -> Result<(), StartError> {
        self.inner.start()
    }

    /// Whether another item is available. Blocks until the generator has produced one or
    /// finished. Does not consume anything.
    pub fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    /// Like [`Iterator::next`], but through a shared reference, so several threads can pull
    /// from one iterator.
    ///
    /// # Panics
    /// Resumes the generator's panic, once, if it panicked.
    pub fn try_next(&self) -> Option<T> {
        match self.inner.try_next() {
            Ok(value) => Some(value),
            Err(NextError::NoMoreElements) => None,
            Err(NextError::Failed(e)) => {
                log::debug!("generator returned `{e}` without being closed, ending the sequence");
                None
            }
        }
    }

    /// Blocks until the generator thread has finished and returns how it ended.
    pub fn wait_for_exit(&self) -> TaskState {
        self.inner.wait_for_exit()
    }
}

impl<T> FnIter<T> {
    /// Ask the generator to stop and drop items it produced that were not consumed yet.
    ///
    /// Returns immediately. The generator stops at its next [`Emitter::emit`]; code between two
    /// `emit` calls is not interrupted. Calling `close` again, or after the generator finished,
    /// does nothing. Dropping the iterator closes it.
    pub fn close(&self) {
        self.inner.close()
    }

    /// Current lifecycle state of the generator thread.
    pub fn state(&self) -> TaskState {
        self.inner.state()
    }
}

impl<T: Send + 'static> Iterator for FnIter<T> {
    type Item = T;

    /// Blocks until the generator produces an item or finishes.
    ///
    /// # Panics
    /// Resumes the generator's panic, once, if it panicked.
    fn next(&mut self) -> Option<T> {
        self.try_next()
    }
}

impl<T: Send + 'static> FusedIterator for FnIter<T> {}

/// Iterator created by [`try_fn_iter`].
pub struct TryFnIter<T, E> {
    inner: Generator<T, E>,
}

/// Create a new fallible iterator whose items are produced by `func` on its own thread.
///
/// `func` hands successive items to the consumer via [`Emitter::emit`] and returns errors as
/// [`Result::Err`]. The consumer receives every item emitted before the error, then the error
/// once, then the end of the sequence.
///
/// `func` should stop when `emit` returns [`Interrupted`]; an error returned after that is not
/// reported to the consumer, who asked for the stop.
///
/// # Example
///
/// ```rust
/// use thread_fn_iter::{try_fn_iter, TryFnIter};
///
/// fn build_iter() -> TryFnIter<i32, anyhow::Error> {
///     try_fn_iter(|emitter| {
///         for i in 0..3 {
///             emitter.emit(i)?;
///         }
///
///         // return errors as `Result::Err`
///         Err(anyhow::anyhow!("An error happened"))
///     })
/// }
///
/// let mut iter = build_iter();
/// assert_eq!(iter.try_next().unwrap(), 0);
/// assert_eq!(iter.try_next().unwrap(), 1);
/// assert_eq!(iter.try_next().unwrap(), 2);
/// let error = iter.try_next().unwrap_err().into_failed().unwrap();
/// assert_eq!(error.to_string(), "An error happened");
/// assert!(iter.next().is_none());
/// ```
pub fn try_fn_iter<T, E, F>(func: F) -> TryFnIter<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce(Emitter<T>) -> Result<(), E> + Send + 'static,
{
    Builder::new().try_fn_iter(func)
}

impl<T: Send + 'static, E: Send + 'static> TryFnIter<T, E> {
    /// Launch the generator thread now instead of on the first pull.
    pub fn start(&self) -> Result<(), StartError> {
        self.inner.start()
    }

    /// Whether another item, or the generator's error, is available. Blocks until the generator
    /// has produced one or finished. Does not consume anything and never returns the error.
    pub fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    /// Blocks until the generator produces an item or finishes.
    ///
    /// Fails with [`NextError::Failed`] exactly once if the generator returned an error, and with
    /// [`NextError::NoMoreElements`] on every call after the end of the sequence.
    ///
    /// # Panics
    /// Resumes the generator's panic, once, if it panicked.
    pub fn try_next(&self) -> Result<T, NextError<E>> {
        self.inner.try_next()
    }

    /// Blocks until the generator thread has finished and returns how it ended.
    pub fn wait_for_exit(&self) -> TaskState {
        self.inner.wait_for_exit()
    }
}

impl<T, E> TryFnIter<T, E> {
    /// Ask the generator to stop and drop items it produced that were not consumed yet.
    ///
    /// See [`FnIter::close`].
    pub fn close(&self) {
        self.inner.close()
    }

    /// Current lifecycle state of the generator thread.
    pub fn state(&self) -> TaskState {
        self.inner.state()
    }
}

impl<T: Send + 'static, E: Send + 'static> Iterator for TryFnIter<T, E> {
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.try_next() {
            Ok(value) => Some(Ok(value)),
            Err(NextError::Failed(e)) => Some(Err(e)),
            Err(NextError::NoMoreElements) => None,
        }
    }
}

impl<T: Send + 'static, E: Send + 'static> FusedIterator for TryFnIter<T, E> {}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, ErrorKind},
        panic::{catch_unwind, AssertUnwindSafe},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    use super::*;

    fn counting(n: i32) -> impl FnOnce(Emitter<i32>) -> Result<(), Interrupted> + Send + 'static {
        move |emitter| {
            eprintln!("generator start");
            for i in 0..n {
                emitter.emit(i)?;
            }
            eprintln!("generator end");
            Ok(())
        }
    }

    fn boom() -> io::Error {
        io::Error::new(ErrorKind::Other, "Ups, some trouble happened.")
    }

    #[test]
    fn infallible_works() {
        let iter = fn_iter(counting(10));
        let mut actual = Vec::new();
        while iter.has_next() {
            actual.push(iter.try_next().unwrap());
        }
        assert_eq!(actual, (0..10).collect::<Vec<_>>());
        assert!(!iter.has_next());
    }

    #[test]
    fn bounded_keeps_order() {
        for capacity in [1, 2, 7, 64] {
            let iter = Builder::new().capacity(capacity).fn_iter(counting(100));
            assert_eq!(iter.collect::<Vec<_>>(), (0..100).collect::<Vec<_>>());
        }
    }

    #[test]
    fn has_next_is_idempotent() {
        let mut iter = fn_iter(counting(3));
        assert!(iter.has_next());
        assert!(iter.has_next());
        assert_eq!(iter.next(), Some(0));
        assert!(iter.has_next());
        assert!(iter.has_next());
        assert_eq!(iter.by_ref().collect::<Vec<_>>(), vec![1, 2]);
        assert!(!iter.has_next());
        assert!(!iter.has_next());
    }

    #[test]
    fn next_without_has_next() {
        let mut iter = fn_iter(counting(3));
        assert_eq!(iter.next(), Some(0));
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), Some(2));
        assert!(!iter.has_next());
    }

    #[test]
    fn exhausted_is_repeatable() {
        let iter = try_fn_iter(|emitter| {
            emitter.emit(1)?;
            Ok::<_, io::Error>(())
        });
        assert_eq!(iter.try_next().unwrap(), 1);
        for _ in 0..3 {
            assert!(matches!(iter.try_next(), Err(NextError::NoMoreElements)));
            assert!(!iter.has_next());
        }
    }

    #[test]
    fn fallible_works() {
        let mut iter = try_fn_iter(|emitter| {
            emitter.emit(1)?;
            emitter.emit(2)?;
            Err(boom())
        });
        assert!(iter.has_next());
        assert_eq!(iter.try_next().unwrap(), 1);
        assert!(iter.has_next());
        assert_eq!(iter.try_next().unwrap(), 2);
        assert!(iter.has_next());
        let error = iter.try_next().unwrap_err().into_failed().unwrap();
        assert_eq!(error.to_string(), "Ups, some trouble happened.");
        assert!(!iter.has_next());
        assert!(matches!(iter.try_next(), Err(NextError::NoMoreElements)));
        assert!(iter.next().is_none());
        assert_eq!(iter.wait_for_exit(), TaskState::Failed);
    }

    #[test]
    fn bounded_error_after_items() {
        let iter = Builder::new().capacity(2).try_fn_iter(|emitter| {
            emitter.emit(1)?;
            emitter.emit(2)?;
            Err(boom())
        });
        assert!(iter.has_next());
        assert_eq!(iter.try_next().unwrap(), 1);
        assert!(iter.has_next());
        assert_eq!(iter.try_next().unwrap(), 2);
        assert!(iter.has_next());
        assert!(iter.has_next());
        let error = iter.try_next().unwrap_err().into_failed().unwrap();
        assert_eq!(error.kind(), ErrorKind::Other);
        assert!(!iter.has_next());
        assert!(matches!(iter.try_next(), Err(NextError::NoMoreElements)));
        assert_eq!(iter.wait_for_exit(), TaskState::Failed);
    }

    #[test]
    fn bounded_error_is_delivered_once() {
        let iter = Builder::new().capacity(4).try_fn_iter(|emitter| {
            for i in 0..3 {
                emitter.emit(i)?;
            }
            Err(boom())
        });
        assert_eq!(iter.wait_for_exit(), TaskState::Failed);
        let items: Vec<_> = iter.map(|r| r.map_err(|e| e.to_string())).collect();
        assert_eq!(
            items,
            vec![
                Ok(0),
                Ok(1),
                Ok(2),
                Err("Ups, some trouble happened.".to_owned())
            ]
        );
    }

    #[test]
    fn huge_capacity_is_a_bound_not_an_allocation() {
        for capacity in [usize::MAX, usize::MAX / 2] {
            let iter = Builder::new().capacity(capacity).fn_iter(|emitter| {
                emitter.emit(1u8)?;
                Ok(())
            });
            assert_eq!(iter.collect::<Vec<_>>(), vec![1]);
        }
    }

    #[test]
    fn fallible_iterator_items() {
        let iter = try_fn_iter(|emitter| {
            emitter.emit(1)?;
            emitter.emit(2)?;
            Err(boom())
        });
        let items: Vec<_> = iter.map(|r| r.map_err(|e| e.kind())).collect();
        assert_eq!(items, vec![Ok(1), Ok(2), Err(ErrorKind::Other)]);
    }

    #[test]
    fn error_without_items() {
        let iter = try_fn_iter(|_: Emitter<i32>| Err(boom()));
        assert!(iter.has_next());
        assert!(iter.has_next());
        assert!(matches!(iter.try_next(), Err(NextError::Failed(_))));
        assert!(!iter.has_next());
        assert!(matches!(iter.try_next(), Err(NextError::NoMoreElements)));
    }

    #[test]
    fn anyhow_error_message_is_preserved() {
        let iter = try_fn_iter(|emitter| -> anyhow::Result<()> {
            emitter.emit("a")?;
            anyhow::bail!("failed after {}", 1)
        });
        assert_eq!(iter.try_next().unwrap(), "a");
        match iter.try_next() {
            Err(NextError::Failed(e)) => assert_eq!(e.to_string(), "failed after 1"),
            _ => panic!("expected the generator error"),
        }
    }

    #[test]
    fn empty_sequence() {
        let mut iter = fn_iter(counting(0));
        assert!(!iter.has_next());
        assert_eq!(iter.next(), None);
        assert!(!iter.has_next());
        assert_eq!(iter.wait_for_exit(), TaskState::Completed);
    }

    #[test]
    fn panic_is_resumed_once() {
        let mut iter = fn_iter(|emitter| {
            emitter.emit(1)?;
            panic!("generator panic");
        });
        assert_eq!(iter.next(), Some(1));
        assert!(iter.has_next());
        let payload = catch_unwind(AssertUnwindSafe(|| iter.next())).unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"generator panic"));
        assert!(!iter.has_next());
        assert_eq!(iter.next(), None);
        assert_eq!(iter.state(), TaskState::Failed);
    }

    #[test]
    fn close_with_items_pending() {
        let produced = Arc::new(AtomicUsize::new(0));
        let mut iter = {
            let produced = produced.clone();
            Builder::new().capacity(4).fn_iter(move |emitter| {
                for i in 0.. {
                    emitter.emit(i)?;
                    produced.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            })
        };
        assert_eq!(iter.next(), Some(0));
        iter.close();
        assert_eq!(iter.wait_for_exit(), TaskState::Cancelled);
        assert!(!iter.has_next());
        assert_eq!(iter.next(), None);

        let after_close = produced.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(produced.load(Ordering::SeqCst), after_close);
    }

    #[test]
    fn close_twice_is_close_once() {
        let iter = fn_iter(counting(1_000));
        assert!(iter.has_next());
        iter.close();
        let state = iter.wait_for_exit();
        iter.close();
        assert_eq!(iter.state(), state);
        assert_eq!(state, TaskState::Cancelled);
        assert!(!iter.has_next());
    }

    #[test]
    fn closing_is_quiet_for_fallible_bodies() {
        let iter = try_fn_iter(|emitter| {
            for i in 0.. {
                emitter.emit(i)?;
            }
            Ok::<_, anyhow::Error>(())
        });
        assert_eq!(iter.try_next().unwrap(), 0);
        iter.close();
        assert_eq!(iter.wait_for_exit(), TaskState::Cancelled);
        assert!(matches!(iter.try_next(), Err(NextError::NoMoreElements)));
    }

    #[test]
    fn is_cancelled_stops_long_work() {
        let iter = fn_iter(|emitter: Emitter<i32>| {
            while !emitter.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        });
        iter.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        iter.close();
        assert_eq!(iter.wait_for_exit(), TaskState::Cancelled);
    }

    #[test]
    fn explicit_start() {
        let iter = fn_iter(counting(2));
        assert_eq!(iter.state(), TaskState::Created);
        iter.start().unwrap();
        assert!(matches!(iter.start(), Err(StartError::AlreadyStarted)));
        assert_eq!(iter.collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn bounded_generator_runs_ahead() {
        let iter = Builder::new().capacity(6).fn_iter(counting(5));
        iter.start().unwrap();
        // Five items and the end marker fit, so the body finishes before anything is consumed.
        assert_eq!(iter.wait_for_exit(), TaskState::Completed);
        assert_eq!(iter.collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn rendezvous_waits_for_consumer() {
        let iter = fn_iter(counting(2));
        iter.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(iter.state(), TaskState::Running);
        assert_eq!(iter.collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn concurrent_consumers_share_items() {
        let iter = Builder::new().capacity(8).fn_iter(counting(1_000));
        let mut all = thread::scope(|scope| {
            let consumers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut got = Vec::new();
                        while let Some(v) = iter.try_next() {
                            got.push(v);
                        }
                        got
                    })
                })
                .collect();
            consumers
                .into_iter()
                .flat_map(|c| c.join().unwrap())
                .collect::<Vec<_>>()
        });
        all.sort_unstable();
        assert_eq!(all, (0..1_000).collect::<Vec<_>>());
    }

    #[test]
    fn borrowed_state_through_arc() {
        struct Source {
            words: Vec<String>,
        }

        let source = Arc::new(Source {
            words: vec!["qwe".to_owned(), "asd".to_owned()],
        });
        let iter = {
            let source = source.clone();
            fn_iter(move |emitter| {
                for word in &source.words {
                    emitter.emit(word.len())?;
                }
                Ok(())
            })
        };
        assert_eq!(iter.collect::<Vec<_>>(), vec![3, 3]);
        assert_eq!(source.words.len(), 2);
    }

    #[test]
    fn iterators_are_send_and_sync() {
        fn assert_send_sync<X: Send + Sync>() {}
        assert_send_sync::<FnIter<String>>();
        assert_send_sync::<TryFnIter<String, anyhow::Error>>();
    }
}
