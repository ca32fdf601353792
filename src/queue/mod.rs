//! Priority dispatch lanes.
//!
//! Three FIFO lanes (high, normal, low) backed by tokio channels. Workers scan
//! the lanes in priority order and always restart the scan at `high`, so
//! sustained high-priority load holds back the lower lanes.

use crate::gateway::{GatewayError, GatewayRequest, GatewayResponse};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex, Notify};

/// Priority level for gateway requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    /// Executed inline on the caller's task, never queued
    High,
}

impl Priority {
    /// Lanes in the order workers scan them.
    pub const SCAN_ORDER: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    fn lane_index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Priority {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(GatewayError::Validation(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}

/// Outcome delivered back to the waiting caller
pub type DispatchResult = Result<GatewayResponse, GatewayError>;

/// A request waiting in a lane
pub struct QueuedDispatch {
    pub request: GatewayRequest,
    /// Channel to send the outcome back to the waiting caller
    pub response_tx: oneshot::Sender<DispatchResult>,
    /// When the request was enqueued
    pub enqueued_at: Instant,
}

impl QueuedDispatch {
    pub fn new(request: GatewayRequest) -> (Self, oneshot::Receiver<DispatchResult>) {
        let (response_tx, response_rx) = oneshot::channel();
        (
            Self {
                request,
                response_tx,
                enqueued_at: Instant::now(),
            },
            response_rx,
        )
    }
}

impl std::fmt::Debug for QueuedDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedDispatch")
            .field("request_id", &self.request.request_id)
            .field("priority", &self.request.priority)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}

struct Lane {
    tx: mpsc::UnboundedSender<QueuedDispatch>,
    rx: Mutex<mpsc::UnboundedReceiver<QueuedDispatch>>,
    depth: AtomicUsize,
}

impl Lane {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            depth: AtomicUsize::new(0),
        }
    }
}

/// Per-lane queue depths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LaneDepths {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl LaneDepths {
    pub fn total(&self) -> usize {
        self.high + self.normal + self.low
    }
}

/// Three FIFO lanes plus a wake-up signal for idle workers.
pub struct DispatchQueues {
    lanes: [Lane; 3],
    notify: Notify,
}

impl Default for DispatchQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchQueues {
    pub fn new() -> Self {
        Self {
            lanes: [Lane::new(), Lane::new(), Lane::new()],
            notify: Notify::new(),
        }
    }

    /// Append a request to the lane matching its priority.
    pub fn enqueue(&self, item: QueuedDispatch) {
        let lane = &self.lanes[item.request.priority.lane_index()];
        let priority = item.request.priority;
        lane.depth.fetch_add(1, Ordering::SeqCst);

        // The receivers live as long as `self`, so the send cannot fail.
        if lane.tx.send(item).is_err() {
            lane.depth.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        metrics::gauge!("analytics_gateway_queue_depth", "lane" => priority.to_string())
            .set(lane.depth.load(Ordering::SeqCst) as f64);
        self.notify.notify_one();
    }

    /// Take the oldest request from the highest non-empty lane.
    pub async fn try_dequeue(&self) -> Option<QueuedDispatch> {
        for priority in Priority::SCAN_ORDER {
            let lane = &self.lanes[priority.lane_index()];
            let mut rx = lane.rx.lock().await;
            if let Ok(item) = rx.try_recv() {
                lane.depth.fetch_sub(1, Ordering::SeqCst);
                metrics::gauge!("analytics_gateway_queue_depth", "lane" => priority.to_string())
                    .set(lane.depth.load(Ordering::SeqCst) as f64);
                return Some(item);
            }
        }
        None
    }

    /// Wait until something is enqueued or `max_wait` elapses.
    pub async fn wait_for_work(&self, max_wait: Duration) {
        let _ = tokio::time::timeout(max_wait, self.notify.notified()).await;
    }

    pub fn depths(&self) -> LaneDepths {
        LaneDepths {
            high: self.lanes[0].depth.load(Ordering::SeqCst),
            normal: self.lanes[1].depth.load(Ordering::SeqCst),
            low: self.lanes[2].depth.load(Ordering::SeqCst),
        }
    }

    /// Current total depth across all lanes
    pub fn depth(&self) -> usize {
        self.depths().total()
    }

    /// Resolve every queued request with `ShuttingDown`. Returns how many were drained.
    pub async fn drain(&self) -> usize {
        let mut drained = 0;
        while let Some(item) = self.try_dequeue().await {
            let _ = item.response_tx.send(Err(GatewayError::ShuttingDown));
            drained += 1;
        }
        drained
    }
}
