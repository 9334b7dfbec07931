//! Background card lookups.
//!
//! One tokio task owns the [`LookupCache`] and answers requests in arrival
//! order. The UI loop drains results between frames and is the only writer
//! of what is displayed.

use cardpick_catalog::{CardSource, ImageResolution, LookupCache};
use cardpick_shared::CardIdentity;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LookupRequest {
    Price(CardIdentity),
    Image(CardIdentity),
}

/// Answers keyed by [`CardIdentity::cache_key`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LookupResult {
    Price { key: String, price: Option<f64> },
    Image { key: String, image: ImageResolution },
}

/// The UI side of the worker's channels.
pub(crate) struct LookupHandle {
    requests: UnboundedSender<LookupRequest>,
    results: UnboundedReceiver<LookupResult>,
}

impl LookupHandle {
    pub(crate) fn spawn<S>(runtime: &Handle, cache: LookupCache<S>) -> Self
    where
        S: CardSource + Send + Sync + 'static,
    {
        let (requests, inbox) = mpsc::unbounded_channel();
        let (outbox, results) = mpsc::unbounded_channel();
        runtime.spawn(serve(cache, inbox, outbox));
        Self { requests, results }
    }

    /// `false` once the worker has stopped.
    pub(crate) fn send(&self, request: LookupRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    /// A finished lookup, without blocking.
    pub(crate) fn try_next(&mut self) -> Option<LookupResult> {
        self.results.try_recv().ok()
    }

    #[cfg(test)]
    pub(crate) async fn next(&mut self) -> Option<LookupResult> {
        self.results.recv().await
    }
}

async fn serve<S: CardSource>(
    mut cache: LookupCache<S>,
    mut inbox: UnboundedReceiver<LookupRequest>,
    outbox: UnboundedSender<LookupResult>,
) {
    while let Some(request) = inbox.recv().await {
        let result = match request {
            LookupRequest::Price(id) => LookupResult::Price {
                price: cache.resolve_price(&id).await,
                key: id.cache_key(),
            },
            LookupRequest::Image(id) => LookupResult::Image {
                image: cache.resolve_image(&id).await,
                key: id.cache_key(),
            },
        };
        if outbox.send(result).is_err() {
            break;
        }
    }
    debug!("lookup worker stopped");
}
