//! Stream plumbing shared by stores, instances and registries
//!
//! Every observable view in this crate is an [`ActionStream`]: a boxed,
//! `Send` stream that can be handed to any task. The helpers here cover the
//! handful of operators the views need:
//!
//! - [`distinct`] / [`distinct_by`]: drop items equal to the previous one
//! - [`switch_map`]: follow the latest inner stream produced by an outer one
//! - [`empty`]: a stream that never yields (used while no store is present)

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio_stream::{Stream, StreamExt};

/// Boxed stream type returned by every observable view.
pub type ActionStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

/// Box any sendable stream into an [`ActionStream`].
pub fn boxed<S>(stream: S) -> ActionStream<S::Item>
where
    S: Stream + Send + 'static,
{
    Box::pin(stream)
}

/// A stream that stays pending forever.
pub fn empty<T: Send + 'static>() -> ActionStream<T> {
    Box::pin(tokio_stream::pending())
}

/// Drop items equal to the previously yielded item.
pub fn distinct<S>(stream: S) -> ActionStream<S::Item>
where
    S: Stream + Send + 'static,
    S::Item: PartialEq + Clone + Send + 'static,
{
    distinct_by(stream, |item| item.clone())
}

/// Drop items whose key equals the key of the previously yielded item.
pub fn distinct_by<S, K, F>(stream: S, key: F) -> ActionStream<S::Item>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
    K: PartialEq + Send + 'static,
    F: FnMut(&S::Item) -> K + Send + 'static,
{
    distinct_by_from(stream, None, key)
}

/// Like [`distinct_by`], but treats `seed` as the key of an item that was
/// already yielded before the stream started.
pub fn distinct_by_from<S, K, F>(stream: S, seed: Option<K>, mut key: F) -> ActionStream<S::Item>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
    K: PartialEq + Send + 'static,
    F: FnMut(&S::Item) -> K + Send + 'static,
{
    let mut last = seed;
    Box::pin(stream.filter_map(move |item| {
        let next = key(&item);
        if last.as_ref() == Some(&next) {
            return None;
        }
        last = Some(next);
        Some(item)
    }))
}

/// Project each outer item into an inner stream and yield from the most
/// recent inner stream only.
///
/// `initial` is an inner stream that is already live before the outer stream
/// yields anything, which lets callers subscribe eagerly.
///
/// The combined stream ends once the outer stream has ended and the current
/// inner stream has ended.
pub fn switch_map<A, B, F>(
    outer: ActionStream<A>,
    initial: Option<ActionStream<B>>,
    project: F,
) -> ActionStream<B>
where
    A: Send + 'static,
    B: Send + 'static,
    F: FnMut(A) -> ActionStream<B> + Send + Unpin + 'static,
{
    Box::pin(Switch {
        outer: Some(outer),
        inner: initial,
        project,
    })
}

struct Switch<A, B, F> {
    outer: Option<ActionStream<A>>,
    inner: Option<ActionStream<B>>,
    project: F,
}

impl<A, B, F> Stream for Switch<A, B, F>
where
    F: FnMut(A) -> ActionStream<B> + Unpin,
{
    type Item = B;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<B>> {
        let this = self.get_mut();

        // Catch up to the latest outer item before reading the inner stream
        while let Some(outer) = this.outer.as_mut() {
            match outer.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => this.inner = Some((this.project)(item)),
                Poll::Ready(None) => this.outer = None,
                Poll::Pending => break,
            }
        }

        match this.inner.as_mut() {
            Some(inner) => match inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
                Poll::Ready(None) => {
                    this.inner = None;
                    if this.outer.is_none() {
                        Poll::Ready(None)
                    } else {
                        Poll::Pending
                    }
                }
                Poll::Pending => Poll::Pending,
            },
            None if this.outer.is_none() => Poll::Ready(None),
            None => Poll::Pending,
        }
    }
}
