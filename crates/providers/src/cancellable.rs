//! Wraps a provider's token stream so it stops yielding once a
//! [`CancelToken`] is flipped, instead of running to completion.
//!
//! The underlying HTTP body is dropped at that point (not aborted on the
//! server), which is the same caller-visible effect Anthropic/OpenAI-compat
//! streaming cancellation has in practice — no more tokens arrive.

use dr_domain::cancel::CancelToken;
use dr_domain::error::Result;
use dr_domain::stream::{BoxStream, StreamEvent};
use futures_util::StreamExt;

pub(crate) fn take_until_cancelled(
    inner: BoxStream<'static, Result<StreamEvent>>,
    cancel: Option<CancelToken>,
) -> BoxStream<'static, Result<StreamEvent>> {
    let Some(cancel) = cancel else { return inner };

    let stream = async_stream::stream! {
        tokio::pin!(inner);
        while let Some(item) = inner.next().await {
            if cancel.is_cancelled() {
                break;
            }
            yield item;
        }
    };

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn passes_through_when_not_cancelled() {
        let items: Vec<Result<StreamEvent>> = vec![
            Ok(StreamEvent::Token { text: "a".into() }),
            Ok(StreamEvent::Token { text: "b".into() }),
        ];
        let s: BoxStream<'static, Result<StreamEvent>> = Box::pin(stream::iter(items));
        let wrapped = take_until_cancelled(s, None);
        let collected: Vec<_> = wrapped.collect().await;
        assert_eq!(collected.len(), 2);
    }

    #[tokio::test]
    async fn stops_once_cancelled() {
        let cancel = CancelToken::new();
        let cancel_clone = cancel.clone();
        let items: Vec<Result<StreamEvent>> = vec![
            Ok(StreamEvent::Token { text: "a".into() }),
            Ok(StreamEvent::Token { text: "b".into() }),
            Ok(StreamEvent::Token { text: "c".into() }),
        ];
        // Cancel after the first item is produced by marking it eagerly —
        // this test only exercises the already-cancelled case since the
        // stream is synchronous and has no await point between items.
        cancel_clone.cancel();
        let s: BoxStream<'static, Result<StreamEvent>> = Box::pin(stream::iter(items));
        let wrapped = take_until_cancelled(s, Some(cancel));
        let collected: Vec<_> = wrapped.collect().await;
        assert!(collected.is_empty());
    }
}
