//! Fan-out of [`PipelineEvent`]s from the chat pipeline to any number of
//! renderers (terminal, SSE, tests).

use std::collections::VecDeque;
use std::sync::Arc;

use drekee_protocol::{PipelineEvent, RequestId};
use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, trace};

pub const DEFAULT_STREAM_BUFFER: usize = 256;
pub const DEFAULT_RECENT_EVENTS: usize = 128;

/// One item of a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(PipelineEvent),
    /// The subscriber fell behind and this many events were dropped.
    Lagged(u64),
}

/// Broadcast hub plus a bounded replay buffer of the latest events.
///
/// Publishing never blocks and never fails: with no subscribers the event
/// only lands in the replay buffer. Lagging subscribers drop the oldest
/// events they missed.
#[derive(Clone, Debug)]
pub struct EventStreamHub {
    sender: broadcast::Sender<PipelineEvent>,
    recent: Arc<Mutex<VecDeque<PipelineEvent>>>,
    recent_capacity: usize,
}

impl Default for EventStreamHub {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_BUFFER)
    }
}

impl EventStreamHub {
    pub fn new(buffer: usize) -> Self {
        Self::with_recent_capacity(buffer, DEFAULT_RECENT_EVENTS)
    }

    pub fn with_recent_capacity(buffer: usize, recent_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self {
            sender,
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(recent_capacity))),
            recent_capacity,
        }
    }

    pub fn publish(&self, event: PipelineEvent) {
        trace!(request_id = %event.request_id(), "publishing pipeline event");
        {
            let mut recent = self.recent.lock();
            if self.recent_capacity > 0 {
                if recent.len() == self.recent_capacity {
                    recent.pop_front();
                }
                recent.push_back(event.clone());
            }
        }
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    fn subscribe_stream(&self) -> BroadcastStream<PipelineEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Live events, optionally narrowed to one send. Lag is reported as an
    /// item rather than swallowed.
    pub fn subscribe_filtered(
        &self,
        request_id: Option<RequestId>,
    ) -> impl Stream<Item = StreamItem> + Send + 'static + use<> {
        self.subscribe_stream().filter_map(move |item| {
            let item = match item {
                Ok(event) => request_id
                    .as_ref()
                    .is_none_or(|wanted| event.request_id() == wanted)
                    .then_some(StreamItem::Event(event)),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    debug!(skipped, "event subscriber lagged");
                    Some(StreamItem::Lagged(skipped))
                }
            };
            std::future::ready(item)
        })
    }

    /// Latest `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<PipelineEvent> {
        let recent = self.recent.lock();
        let skip = recent.len().saturating_sub(limit);
        recent.iter().skip(skip).cloned().collect()
    }
}
