//! Transport boundary.
//!
//! The protocol layer never establishes connections itself. It consumes a
//! [`StreamOpener`] that produces a [`BidiStream`]: an ordered outbound
//! [`MessageSink`] with explicit half-close, and an ordered inbound
//! [`MessageSource`].
//!
//! Object-safety note:
//! - Traits use `async-trait` for async dyn-dispatch.
//! - Streaming uses boxed trait objects (`ChunkStream`).

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use genai_proto::SessionMessage;

use crate::content::Chunk;
use crate::error::GenaiResult;

pub type ChunkStream<'a> = BoxStream<'a, GenaiResult<Chunk>>;

/// Request metadata attached when a stream is opened, e.g. an API key header.
pub type AuthMetadata = Vec<(String, String)>;

#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: SessionMessage) -> GenaiResult<()>;
    /// Half-closes the outbound direction.
    async fn done_writing(&mut self) -> GenaiResult<()>;
}

#[async_trait]
pub trait MessageSource: Send {
    /// Next inbound message, or `None` once the remote side finished.
    async fn recv(&mut self) -> GenaiResult<Option<SessionMessage>>;
}

/// Both directions of one live stream.
pub struct BidiStream {
    pub sink: Box<dyn MessageSink>,
    pub source: Box<dyn MessageSource>,
}

impl BidiStream {
    pub fn new(sink: impl MessageSink + 'static, source: impl MessageSource + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            source: Box::new(source),
        }
    }
}

impl std::fmt::Debug for BidiStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BidiStream").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait StreamOpener: Send + Sync {
    async fn open_stream(
        &self,
        address: &str,
        method: &str,
        metadata: &AuthMetadata,
    ) -> GenaiResult<BidiStream>;
}
