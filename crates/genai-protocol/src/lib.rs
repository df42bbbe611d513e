//! # genai-protocol: content model and session protocol
//!
//! Client-side protocol layer for the `evergreen.v2` action-streaming
//! service. Applications build [`Content`] from text, bytes and protobuf
//! messages; sessions flatten it into fragment trees on the way out and
//! turn inbound fragments back into chunks as they arrive.
//!
//! The crate never opens a network connection. Transports plug in through
//! the [`ports`] traits; [`loopback`] provides an in-memory one.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers and injectable fragment id generation
//! - [`content`]: Chunk, ChunkValue, Content, mimetype and role helpers
//! - [`codec`]: Flatten/unflatten between Content and NodeFragment trees
//! - [`session`]: Session, SessionWriter, SessionReader
//! - [`ports`]: Transport boundary (sink, source, stream opener)
//! - [`loopback`]: In-memory echo and scripted transports
//! - [`error`]: GenaiError, GenaiResult

pub mod codec;
pub mod content;
pub mod error;
pub mod ids;
pub mod loopback;
pub mod ports;
pub mod session;

// Re-export the most commonly used types at the crate root.
pub use codec::{Assembled, TreeAssembler, flatten, reassemble, unflatten};
pub use content::{
    Chunk, ChunkValue, Content, TEXT_PLAIN, assistant_chunk, message_mimetype, role, system_chunk,
    user_chunk,
};
pub use error::{GenaiError, GenaiResult};
pub use ids::{
    ChunkId, ContentId, IdGenerator, ParameterId, SequentialIds, UuidIds, default_ids, unique_id,
};
pub use ports::{AuthMetadata, BidiStream, ChunkStream, MessageSink, MessageSource, StreamOpener};
pub use session::{Session, SessionReader, SessionState, SessionWriter, Writable};
