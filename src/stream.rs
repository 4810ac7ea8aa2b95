use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::Stream;

use crate::{FnIter, NextError, TryFnIter};

/// Never blocks: the task is woken when the generator emits or finishes.
impl<T: Send + 'static> Stream for FnIter<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next(cx).map(|next| match next {
            Ok(value) => Some(value),
            Err(NextError::NoMoreElements) => None,
            Err(NextError::Failed(e)) => {
                log::debug!("generator returned `{e}` without being closed, ending the stream");
                None
            }
        })
    }
}

impl<T: Send + 'static, E: Send + 'static> Stream for TryFnIter<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next(cx).map(|next| match next {
            Ok(value) => Some(Ok(value)),
            Err(NextError::Failed(e)) => Some(Err(e)),
            Err(NextError::NoMoreElements) => None,
        })
    }
}
