//! The channel pair between an [`super::AgentExecutor`] worker and the UI
//! thread consuming its output — grounded in the `tokio::spawn` +
//! channel/`Arc<RwLock<_>>` shape used for background progress reporting
//! elsewhere in the corpus, adapted to two parallel queues per the executor
//! contract: one for streamed chat content, one for tool lifecycle events.

use tokio::sync::mpsc;

use crate::llm::ToolCall;

/// One incremental piece of an agent's output.
#[derive(Debug, Clone, Default)]
pub struct ProgressChunk {
    pub thinking: Option<String>,
    pub content: Option<String>,
    pub done: bool,
}

/// A tool lifecycle event, rendered by the UI as a distinct visual element
/// rather than interleaved into the chat transcript.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Start { name: String },
    Complete {
        name: String,
        success: bool,
        elapsed_ms: u64,
        args: serde_json::Value,
        result: String,
        size_bytes: usize,
    },
}

/// Bounded capacity for both queues. Generous enough that a worker never
/// blocks on a UI thread that's merely behind by a render frame.
pub const CHANNEL_CAPACITY: usize = 256;

/// Sending half, held by the executor's worker task.
pub struct StreamSender {
    pub chunks: mpsc::Sender<ProgressChunk>,
    pub tool_events: mpsc::Sender<ToolEvent>,
}

/// Receiving half, held by the UI thread.
pub struct StreamReceiver {
    pub chunks: mpsc::Receiver<ProgressChunk>,
    pub tool_events: mpsc::Receiver<ToolEvent>,
}

/// Construct one paired channel for a single agent invocation.
pub fn channel() -> (StreamSender, StreamReceiver) {
    let (chunk_tx, chunk_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        StreamSender { chunks: chunk_tx, tool_events: event_tx },
        StreamReceiver { chunks: chunk_rx, tool_events: event_rx },
    )
}

impl StreamSender {
    pub async fn send_chunk(&self, chunk: ProgressChunk) {
        let _ = self.chunks.send(chunk).await;
    }

    pub async fn send_done(&self) {
        let _ = self.chunks.send(ProgressChunk { done: true, ..Default::default() }).await;
    }

    pub async fn send_tool_start(&self, name: &str) {
        let _ = self.tool_events.send(ToolEvent::Start { name: name.to_string() }).await;
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn send_tool_complete(
        &self,
        name: &str,
        success: bool,
        elapsed_ms: u64,
        args: serde_json::Value,
        result: String,
        size_bytes: usize,
    ) {
        let _ = self
            .tool_events
            .send(ToolEvent::Complete {
                name: name.to_string(),
                success,
                elapsed_ms,
                args,
                result,
                size_bytes,
            })
            .await;
    }
}

/// A tool call the model wants executed, paired with its call id for the
/// eventual tool-result message.
pub type PendingToolCall = ToolCall;
