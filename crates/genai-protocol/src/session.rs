//! Sessions: one live bidirectional stream, ordered writes, streamed reads.
//!
//! A [`Session`] can be driven as a whole, or [`Session::split`] into a
//! [`SessionWriter`] and a [`SessionReader`] owned by independent tasks.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::stream::BoxStream;
use genai_proto::{Action as ActionProto, NodeFragment, SessionMessage};
use prost::bytes::Bytes;
use tracing::{debug, instrument};

use crate::codec::{self, Assembled, TreeAssembler};
use crate::content::{Chunk, ChunkValue, Content};
use crate::error::{GenaiError, GenaiResult};
use crate::ids::{ContentId, IdGenerator, default_ids};
use crate::ports::{BidiStream, ChunkStream, MessageSink, MessageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting writes.
    Open,
    /// End of input signalled; responses may still arrive.
    WriteClosed,
    /// The inbound stream ended or failed.
    Closed,
}

/// Anything a session can put on the wire.
#[derive(Debug, Clone)]
pub enum Writable {
    /// A fully addressed wire message, sent as-is.
    Message(SessionMessage),
    /// A single fragment.
    Fragment(NodeFragment),
    /// An action descriptor.
    Action(ActionProto),
    /// Content, flattened into a fragment tree.
    Content(Content),
    /// Chunk-convertible values, gathered into one content.
    Values(Vec<ChunkValue>),
}

impl From<SessionMessage> for Writable {
    fn from(message: SessionMessage) -> Self {
        Self::Message(message)
    }
}

impl From<NodeFragment> for Writable {
    fn from(fragment: NodeFragment) -> Self {
        Self::Fragment(fragment)
    }
}

impl From<ActionProto> for Writable {
    fn from(action: ActionProto) -> Self {
        Self::Action(action)
    }
}

impl From<Content> for Writable {
    fn from(content: Content) -> Self {
        Self::Content(content)
    }
}

impl From<Chunk> for Writable {
    fn from(chunk: Chunk) -> Self {
        Self::Content(Content::from(chunk))
    }
}

impl From<Vec<Chunk>> for Writable {
    fn from(chunks: Vec<Chunk>) -> Self {
        Self::Content(Content::from(chunks))
    }
}

impl From<&str> for Writable {
    fn from(text: &str) -> Self {
        Self::Content(Content::from(text))
    }
}

impl From<String> for Writable {
    fn from(text: String) -> Self {
        Self::Content(Content::from(text))
    }
}

impl From<Vec<u8>> for Writable {
    fn from(data: Vec<u8>) -> Self {
        Self::Values(vec![ChunkValue::from(data)])
    }
}

impl From<Bytes> for Writable {
    fn from(data: Bytes) -> Self {
        Self::Values(vec![ChunkValue::from(data)])
    }
}

impl From<ChunkValue> for Writable {
    fn from(value: ChunkValue) -> Self {
        Self::Values(vec![value])
    }
}

impl From<Vec<ChunkValue>> for Writable {
    fn from(values: Vec<ChunkValue>) -> Self {
        Self::Values(values)
    }
}

/// Write half of a session.
pub struct SessionWriter {
    sink: Box<dyn MessageSink>,
    ids: Arc<dyn IdGenerator>,
    closed: bool,
}

impl SessionWriter {
    /// Writes one message.
    ///
    /// `id` renames a fragment or becomes the id of written content. It is
    /// rejected for raw messages and action descriptors, which are already
    /// fully addressed. Conversion errors surface before anything is sent.
    #[instrument(skip(self, value, id), fields(id = id.as_ref().map(ContentId::as_str)))]
    pub async fn write(
        &mut self,
        value: impl Into<Writable>,
        id: Option<ContentId>,
    ) -> GenaiResult<()> {
        if self.closed {
            return Err(GenaiError::SessionClosedForWriting);
        }
        let message = self.encode(value.into(), id)?;
        debug!(
            fragments = message.node_fragments.len(),
            actions = message.actions.len(),
            "writing session message"
        );
        self.sink.send(message).await
    }

    fn encode(&self, value: Writable, id: Option<ContentId>) -> GenaiResult<SessionMessage> {
        match value {
            Writable::Message(message) => {
                if id.is_some() {
                    return Err(GenaiError::ConflictingId);
                }
                Ok(message)
            }
            Writable::Fragment(mut fragment) => {
                if let Some(id) = id {
                    fragment.id = id.into_string();
                }
                Ok(SessionMessage::fragments(vec![fragment]))
            }
            Writable::Action(action) => {
                if id.is_some() {
                    return Err(GenaiError::ConflictingId);
                }
                Ok(SessionMessage::action(action))
            }
            Writable::Content(content) => Ok(self.content_message(content, id)),
            Writable::Values(values) => {
                let content = Content::try_from_values(values)?;
                Ok(self.content_message(content, id))
            }
        }
    }

    fn content_message(&self, content: Content, id: Option<ContentId>) -> SessionMessage {
        let content = match id {
            Some(id) => content.with_id(id),
            None => content,
        };
        SessionMessage::fragments(codec::flatten(&content, self.ids.as_ref()))
    }

    /// Signals end of input. Idempotent; later writes fail.
    #[instrument(skip(self))]
    pub async fn close_writes(&mut self) -> GenaiResult<()> {
        if self.closed {
            return Ok(());
        }
        self.sink.done_writing().await?;
        self.closed = true;
        debug!("session closed for writing");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }
}

/// Read half of a session.
pub struct SessionReader {
    source: Box<dyn MessageSource>,
    finished: bool,
}

impl SessionReader {
    async fn next_message(&mut self) -> GenaiResult<Option<SessionMessage>> {
        if self.finished {
            return Ok(None);
        }
        match self.source.recv().await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => {
                self.finished = true;
                debug!("inbound stream finished");
                Ok(None)
            }
            Err(error) => {
                self.finished = true;
                Err(error)
            }
        }
    }

    /// Chunks from every inbound chunk fragment; root fragments are skipped.
    pub fn chunks(&mut self) -> ChunkStream<'_> {
        Box::pin(try_stream! {
            while let Some(message) = self.next_message().await? {
                for chunk in codec::unflatten(message.node_fragments) {
                    yield chunk;
                }
            }
        })
    }

    /// Like [`Self::chunks`], but validates every root against the chunks
    /// observed before it and also yields each completed content. Chunk
    /// fragments still unclaimed when the stream ends are an error.
    pub fn assembled(&mut self) -> BoxStream<'_, GenaiResult<Assembled>> {
        Box::pin(try_stream! {
            let mut assembler = TreeAssembler::new();
            while let Some(message) = self.next_message().await? {
                for fragment in message.node_fragments {
                    yield assembler.push(fragment)?;
                }
            }
            assembler.finish()?;
        })
    }

    pub fn into_chunks(mut self) -> ChunkStream<'static> {
        Box::pin(try_stream! {
            while let Some(message) = self.next_message().await? {
                for chunk in codec::unflatten(message.node_fragments) {
                    yield chunk;
                }
            }
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Owner of one bidirectional stream of session messages.
pub struct Session {
    writer: SessionWriter,
    reader: SessionReader,
}

impl Session {
    pub fn new(stream: BidiStream) -> Self {
        Self::with_ids(stream, default_ids())
    }

    /// Uses `ids` for every fragment id this session generates.
    pub fn with_ids(stream: BidiStream, ids: Arc<dyn IdGenerator>) -> Self {
        let BidiStream { sink, source } = stream;
        Self {
            writer: SessionWriter {
                sink,
                ids,
                closed: false,
            },
            reader: SessionReader {
                source,
                finished: false,
            },
        }
    }

    pub fn state(&self) -> SessionState {
        if self.reader.finished {
            SessionState::Closed
        } else if self.writer.closed {
            SessionState::WriteClosed
        } else {
            SessionState::Open
        }
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        self.writer.ids()
    }

    pub async fn write(
        &mut self,
        value: impl Into<Writable>,
        id: Option<ContentId>,
    ) -> GenaiResult<()> {
        self.writer.write(value, id).await
    }

    pub async fn close_writes(&mut self) -> GenaiResult<()> {
        self.writer.close_writes().await
    }

    pub fn read(&mut self) -> ChunkStream<'_> {
        self.reader.chunks()
    }

    pub fn read_strict(&mut self) -> BoxStream<'_, GenaiResult<Assembled>> {
        self.reader.assembled()
    }

    /// Consumes the session into its response chunks.
    pub fn into_read(self) -> ChunkStream<'static> {
        self.reader.into_chunks()
    }

    pub fn split(self) -> (SessionWriter, SessionReader) {
        (self.writer, self.reader)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("ids", &self.writer.ids)
            .finish_non_exhaustive()
    }
}
