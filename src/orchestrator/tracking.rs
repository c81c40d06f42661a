// ABOUTME: Invocation tracking: forwards every InvocationResult to an external recorder.
// ABOUTME: Recording never blocks the response and a lost record never fails the request.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::mpsc;

use super::types::InvocationResult;

/// Sink for invocation records. `record` must return promptly.
pub trait InvocationRecorder: Send + Sync {
    fn record(&self, result: &InvocationResult);
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NoopRecorder;

impl InvocationRecorder for NoopRecorder {
    fn record(&self, _result: &InvocationResult) {}
}

// =============================================================================
// Channel Recorder
// =============================================================================

/// Buffered recorder that hands records to a consumer task over a bounded
/// channel. When the buffer is full or the consumer is gone the record is
/// dropped with a warning.
pub struct ChannelRecorder {
    tx: mpsc::Sender<InvocationResult>,
}

impl ChannelRecorder {
    /// Create the recorder and the receiving end for the consumer.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<InvocationResult>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl InvocationRecorder for ChannelRecorder {
    fn record(&self, result: &InvocationResult) {
        if let Err(e) = self.tx.try_send(result.clone()) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "buffer full",
                mpsc::error::TrySendError::Closed(_) => "consumer closed",
            };
            log::warn!(
                "[Tracking] Dropped invocation record for {} ({})",
                result.identity,
                reason
            );
        }
    }
}

// =============================================================================
// Memory Recorder
// =============================================================================

const DEFAULT_MEMORY_CAPACITY: usize = 1024;

/// Keeps the most recent records in memory, evicting the oldest.
pub struct MemoryRecorder {
    records: Mutex<VecDeque<InvocationResult>>,
    capacity: usize,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of stored records, oldest first.
    pub fn records(&self) -> Vec<InvocationResult> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationRecorder for MemoryRecorder {
    fn record(&self, result: &InvocationResult) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(result.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_result(id: &str, success: bool) -> InvocationResult {
        if success {
            InvocationResult::succeeded(id, "q", "ok".to_string(), Duration::from_millis(5))
        } else {
            InvocationResult::failed(id, "q", "boom".to_string(), Duration::from_millis(5))
        }
    }

    #[tokio::test]
    async fn channel_recorder_forwards_records() {
        let (recorder, mut rx) = ChannelRecorder::new(8);
        recorder.record(&make_result("a", true));
        recorder.record(&make_result("b", false));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.identity, "a");
        assert!(first.success);
        assert_eq!(second.identity, "b");
        assert_eq!(second.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn channel_recorder_drops_when_full() {
        let (recorder, mut rx) = ChannelRecorder::new(1);
        recorder.record(&make_result("a", true));
        recorder.record(&make_result("b", true));

        assert_eq!(rx.recv().await.unwrap().identity, "a");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_recorder_survives_closed_consumer() {
        let (recorder, rx) = ChannelRecorder::new(4);
        drop(rx);
        recorder.record(&make_result("a", true));
    }

    #[test]
    fn memory_recorder_evicts_oldest() {
        let recorder = MemoryRecorder::with_capacity(2);
        recorder.record(&make_result("a", true));
        recorder.record(&make_result("b", true));
        recorder.record(&make_result("c", false));

        let ids: Vec<String> = recorder.records().into_iter().map(|r| r.identity).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn noop_recorder_accepts_anything() {
        NoopRecorder.record(&make_result("a", true));
    }
}
