//! Queue workers.

use super::GatewayCore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Serve the priority lanes until `cancel_token` fires.
///
/// Each pass takes the oldest item of the highest non-empty lane. When every
/// lane is empty the worker sleeps until an enqueue, the poll interval or
/// cancellation, whichever comes first.
pub(crate) async fn run_worker(id: usize, core: Arc<GatewayCore>, cancel_token: CancellationToken) {
    let poll_interval = core.config.gateway.queue_poll_interval();
    tracing::debug!(worker_id = id, "Worker started");

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        if let Some(item) = core.queues.try_dequeue().await {
            let request_id = item.request.request_id.clone();
            let queued_ms = item.enqueued_at.elapsed().as_millis() as u64;
            tracing::trace!(
                worker_id = id,
                request_id = %request_id,
                priority = %item.request.priority,
                queued_ms,
                "Dequeued request"
            );

            let outcome = core.dispatch(item.request).await;
            if item.response_tx.send(outcome).is_err() {
                tracing::debug!(
                    worker_id = id,
                    request_id = %request_id,
                    "Caller went away before the response was ready"
                );
            }
            continue;
        }

        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = core.queues.wait_for_work(poll_interval) => {}
        }
    }

    tracing::debug!(worker_id = id, "Worker stopped");
}
