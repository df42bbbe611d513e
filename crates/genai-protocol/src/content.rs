//! Chunks and content: the payload model applications manipulate.
//!
//! A [`Chunk`] is one atomic payload (text, bytes, or an encoded protobuf
//! message) plus its metadata. A [`Content`] is an ordered, addressable
//! sequence of chunks; order is significant and defines reconstructed text
//! and conversation order.

use std::ops::{Add, AddAssign};

use genai_proto::{Chunk as ChunkProto, ChunkMetadata, NodeFragment};
use prost::bytes::Bytes;
use prost::{Message, Name};

use crate::codec;
use crate::error::{GenaiError, GenaiResult};
use crate::ids::{ChunkId, ContentId, IdGenerator};

pub const TEXT_PLAIN: &str = "text/plain";

/// Conversational roles understood by the service.
pub mod role {
    pub const USER: &str = "USER";
    pub const ASSISTANT: &str = "ASSISTANT";
    pub const SYSTEM: &str = "SYSTEM";
}

/// Mimetype under which messages of type `M` are carried.
pub fn message_mimetype<M: Name>() -> String {
    format!("application/x-protobuf; type={}", M::full_name())
}

fn is_text_mimetype(mimetype: &str) -> bool {
    mimetype.starts_with("text/") || mimetype.ends_with("/url")
}

/// Everything a chunk can be built from.
#[derive(Debug, Clone)]
pub enum ChunkValue {
    /// UTF-8 text; always carried as `text/plain`.
    Text(String),
    /// Raw bytes; a mimetype must come with the metadata.
    Bytes(Bytes),
    /// An already-encoded protobuf message and its derived mimetype.
    Message { mimetype: String, data: Bytes },
    /// A wire chunk, as received.
    Proto(ChunkProto),
    /// Another chunk; its id carries over unless one is supplied.
    Chunk(Chunk),
}

impl ChunkValue {
    pub fn message<M: Message + Name>(message: &M) -> Self {
        Self::Message {
            mimetype: message_mimetype::<M>(),
            data: Bytes::from(message.encode_to_vec()),
        }
    }
}

impl From<&str> for ChunkValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for ChunkValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for ChunkValue {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(data))
    }
}

impl From<Bytes> for ChunkValue {
    fn from(data: Bytes) -> Self {
        Self::Bytes(data)
    }
}

impl From<ChunkProto> for ChunkValue {
    fn from(proto: ChunkProto) -> Self {
        Self::Proto(proto)
    }
}

impl From<Chunk> for ChunkValue {
    fn from(chunk: Chunk) -> Self {
        Self::Chunk(chunk)
    }
}

/// An atomic, addressable unit of payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    id: ChunkId,
    proto: ChunkProto,
}

impl Chunk {
    /// Builds a chunk from any [`ChunkValue`], merging `metadata` on top of
    /// whatever metadata the value implies.
    pub fn from_value(
        value: impl Into<ChunkValue>,
        metadata: Option<ChunkMetadata>,
        id: Option<ChunkId>,
    ) -> GenaiResult<Self> {
        let (mut proto, inherited_id) = match value.into() {
            ChunkValue::Text(text) => (
                ChunkProto {
                    metadata: Some(ChunkMetadata::default().with_mimetype(TEXT_PLAIN)),
                    data: Bytes::from(text),
                },
                None,
            ),
            ChunkValue::Bytes(data) => {
                if metadata.as_ref().is_none_or(|m| m.mimetype.is_empty()) {
                    return Err(GenaiError::MissingMimetype);
                }
                (
                    ChunkProto {
                        metadata: None,
                        data,
                    },
                    None,
                )
            }
            ChunkValue::Message { mimetype, data } => (
                ChunkProto {
                    metadata: Some(ChunkMetadata::default().with_mimetype(mimetype)),
                    data,
                },
                None,
            ),
            ChunkValue::Proto(proto) => (proto, None),
            ChunkValue::Chunk(chunk) => (chunk.proto, Some(chunk.id)),
        };

        if let Some(metadata) = metadata {
            proto
                .metadata
                .get_or_insert_with(ChunkMetadata::default)
                .merge_from(&metadata);
        }

        Ok(Self {
            id: id.or(inherited_id).unwrap_or_default(),
            proto,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            id: ChunkId::default(),
            proto: ChunkProto {
                metadata: Some(ChunkMetadata::default().with_mimetype(TEXT_PLAIN)),
                data: Bytes::from(text.into()),
            },
        }
    }

    pub fn bytes(data: impl Into<Bytes>, mimetype: impl Into<String>) -> GenaiResult<Self> {
        Self::from_value(
            ChunkValue::Bytes(data.into()),
            Some(ChunkMetadata::default().with_mimetype(mimetype)),
            None,
        )
    }

    pub fn message<M: Message + Name>(message: &M) -> Self {
        Self {
            id: ChunkId::default(),
            proto: ChunkProto {
                metadata: Some(ChunkMetadata::default().with_mimetype(message_mimetype::<M>())),
                data: Bytes::from(message.encode_to_vec()),
            },
        }
    }

    /// Wraps a wire chunk under a fresh id.
    pub fn from_proto(proto: ChunkProto) -> Self {
        Self {
            id: ChunkId::default(),
            proto,
        }
    }

    pub fn with_id(mut self, id: impl Into<ChunkId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.proto
            .metadata
            .get_or_insert_with(ChunkMetadata::default)
            .role = role.into();
        self
    }

    pub fn id(&self) -> &ChunkId {
        &self.id
    }

    pub fn metadata(&self) -> ChunkMetadata {
        self.proto.metadata.clone().unwrap_or_default()
    }

    pub fn mimetype(&self) -> &str {
        self.proto.mimetype()
    }

    pub fn role(&self) -> &str {
        self.proto.role()
    }

    pub fn data(&self) -> &Bytes {
        &self.proto.data
    }

    pub fn proto(&self) -> &ChunkProto {
        &self.proto
    }

    pub fn into_proto(self) -> ChunkProto {
        self.proto
    }

    /// Returns the payload as text.
    ///
    /// Empty chunks are always `""`. A non-text mimetype is an error when
    /// `strict`, and `""` otherwise.
    pub fn as_text(&self, strict: bool) -> GenaiResult<&str> {
        if self.proto.data.is_empty() {
            return Ok("");
        }
        let mimetype = self.mimetype();
        if !is_text_mimetype(mimetype) {
            if strict {
                return Err(GenaiError::NotTextContent {
                    mimetype: mimetype.to_owned(),
                });
            }
            return Ok("");
        }
        std::str::from_utf8(&self.proto.data).map_err(|e| GenaiError::Decode(e.to_string()))
    }

    /// Decodes the payload as protobuf message `M`.
    pub fn as_message<M: Message + Name + Default>(&self) -> GenaiResult<M> {
        let expected = message_mimetype::<M>();
        if self.mimetype() != expected {
            return Err(GenaiError::MimetypeMismatch {
                expected,
                actual: self.mimetype().to_owned(),
            });
        }
        Ok(M::decode(self.proto.data.clone())?)
    }
}

impl TryFrom<NodeFragment> for Chunk {
    type Error = GenaiError;

    fn try_from(fragment: NodeFragment) -> GenaiResult<Self> {
        match fragment.chunk_fragment {
            Some(proto) => Ok(Self::from_proto(proto)),
            None => Err(GenaiError::UnsupportedChunkValue(format!(
                "fragment {} carries no chunk payload",
                fragment.id
            ))),
        }
    }
}

fn chunk_with_role(
    value: impl Into<ChunkValue>,
    role: &str,
    metadata: Option<ChunkMetadata>,
) -> GenaiResult<Chunk> {
    let metadata = metadata.unwrap_or_default().with_role(role);
    Chunk::from_value(value, Some(metadata), None)
}

pub fn user_chunk(
    value: impl Into<ChunkValue>,
    metadata: Option<ChunkMetadata>,
) -> GenaiResult<Chunk> {
    chunk_with_role(value, role::USER, metadata)
}

pub fn assistant_chunk(
    value: impl Into<ChunkValue>,
    metadata: Option<ChunkMetadata>,
) -> GenaiResult<Chunk> {
    chunk_with_role(value, role::ASSISTANT, metadata)
}

pub fn system_chunk(
    value: impl Into<ChunkValue>,
    metadata: Option<ChunkMetadata>,
) -> GenaiResult<Chunk> {
    chunk_with_role(value, role::SYSTEM, metadata)
}

/// An ordered, addressable sequence of chunks.
///
/// Equality is structural: same id and pairwise-equal chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    id: ContentId,
    chunks: Vec<Chunk>,
}

impl Default for Content {
    fn default() -> Self {
        Self::new()
    }
}

impl Content {
    pub fn new() -> Self {
        Self {
            id: ContentId::default(),
            chunks: Vec::new(),
        }
    }

    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        Self {
            id: ContentId::default(),
            chunks: chunks.into_iter().collect(),
        }
    }

    /// Builds content from chunk-convertible values, in order.
    pub fn try_from_values<V: Into<ChunkValue>>(
        values: impl IntoIterator<Item = V>,
    ) -> GenaiResult<Self> {
        let mut content = Self::new();
        content.extend_values(values)?;
        Ok(content)
    }

    pub fn with_id(mut self, id: impl Into<ContentId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &ContentId {
        &self.id
    }

    pub fn reset_id(&mut self, id: impl Into<ContentId>) {
        self.id = id.into();
    }

    pub fn push(&mut self, value: impl Into<ChunkValue>) -> GenaiResult<()> {
        self.chunks.push(Chunk::from_value(value, None, None)?);
        Ok(())
    }

    pub fn push_chunk(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    pub fn extend_values<V: Into<ChunkValue>>(
        &mut self,
        values: impl IntoIterator<Item = V>,
    ) -> GenaiResult<()> {
        for value in values {
            self.push(value)?;
        }
        Ok(())
    }

    /// Appends every chunk of `other`, keeping this content's id.
    pub fn append(&mut self, other: &Content) {
        self.chunks.extend(other.chunks.iter().cloned());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenated text of every chunk, in order.
    pub fn as_text(&self, strict: bool) -> GenaiResult<String> {
        let mut text = String::new();
        for chunk in &self.chunks {
            text.push_str(chunk.as_text(strict)?);
        }
        Ok(text)
    }

    /// Flattens this content into wire fragments, children first.
    pub fn node_fragments(&self, ids: &dyn IdGenerator) -> Vec<NodeFragment> {
        codec::flatten(self, ids)
    }
}

impl Add for Content {
    type Output = Content;

    fn add(mut self, rhs: Content) -> Content {
        self.chunks.extend(rhs.chunks);
        self
    }
}

impl Add<&Content> for &Content {
    type Output = Content;

    fn add(self, rhs: &Content) -> Content {
        let mut result = self.clone();
        result.append(rhs);
        result
    }
}

impl AddAssign<Content> for Content {
    fn add_assign(&mut self, rhs: Content) {
        self.chunks.extend(rhs.chunks);
    }
}

impl AddAssign<Chunk> for Content {
    fn add_assign(&mut self, rhs: Chunk) {
        self.chunks.push(rhs);
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::from_chunks([Chunk::text(text)])
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::from_chunks([Chunk::text(text)])
    }
}

impl From<Chunk> for Content {
    fn from(chunk: Chunk) -> Self {
        Self::from_chunks([chunk])
    }
}

impl From<Vec<Chunk>> for Content {
    fn from(chunks: Vec<Chunk>) -> Self {
        Self::from_chunks(chunks)
    }
}

impl FromIterator<Chunk> for Content {
    fn from_iter<I: IntoIterator<Item = Chunk>>(iter: I) -> Self {
        Self::from_chunks(iter)
    }
}

impl Extend<Chunk> for Content {
    fn extend<I: IntoIterator<Item = Chunk>>(&mut self, iter: I) {
        self.chunks.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Content {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

impl IntoIterator for Content {
    type Item = Chunk;
    type IntoIter = std::vec::IntoIter<Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}
