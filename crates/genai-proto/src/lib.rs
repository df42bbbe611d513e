//! # genai-proto: evergreen.v2 wire messages
//!
//! Message definitions for the bidirectional `StartSession` stream. The
//! structs are declared with `prost` derives, so no `protoc` is needed at
//! build time. Field numbers are part of the wire format; never renumber a
//! field once it has shipped.
//!
//! - [`SessionMessage`]: one frame on the stream (fragments and/or actions)
//! - [`NodeFragment`]: one node of a flattened content tree
//! - [`Chunk`] / [`ChunkMetadata`]: an atomic payload and its mimetype/role
//! - [`Action`] / [`TargetSpec`] / [`NamedParameter`]: an action descriptor

use prost::bytes::Bytes;

/// Protobuf package every message in this crate belongs to.
pub const PACKAGE: &str = "evergreen.v2";

/// One frame exchanged on a session stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SessionMessage {
    #[prost(message, repeated, tag = "1")]
    pub node_fragments: Vec<NodeFragment>,
    #[prost(message, repeated, tag = "2")]
    pub actions: Vec<Action>,
}

impl SessionMessage {
    pub fn fragments(node_fragments: Vec<NodeFragment>) -> Self {
        Self {
            node_fragments,
            actions: Vec::new(),
        }
    }

    pub fn action(action: Action) -> Self {
        Self {
            node_fragments: Vec::new(),
            actions: vec![action],
        }
    }
}

/// A node of a flattened content tree.
///
/// A root fragment has `child_ids` and no `chunk_fragment`. A chunk fragment
/// carries the serialized chunk and no children.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeFragment {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, repeated, tag = "2")]
    pub child_ids: Vec<String>,
    #[prost(message, optional, tag = "3")]
    pub chunk_fragment: Option<Chunk>,
}

impl NodeFragment {
    pub fn root(id: impl Into<String>, child_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            child_ids,
            chunk_fragment: None,
        }
    }

    pub fn chunk(id: impl Into<String>, chunk: Chunk) -> Self {
        Self {
            id: id.into(),
            child_ids: Vec::new(),
            chunk_fragment: Some(chunk),
        }
    }

    pub fn is_root(&self) -> bool {
        self.chunk_fragment.is_none()
    }
}

#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct ChunkMetadata {
    #[prost(string, tag = "1")]
    pub mimetype: String,
    #[prost(string, tag = "2")]
    pub role: String,
}

impl ChunkMetadata {
    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = mimetype.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Overwrites every field that is set (non-empty) in `other`.
    pub fn merge_from(&mut self, other: &ChunkMetadata) {
        if !other.mimetype.is_empty() {
            self.mimetype.clone_from(&other.mimetype);
        }
        if !other.role.is_empty() {
            self.role.clone_from(&other.role);
        }
    }
}

/// An atomic payload. The chunk's identity is not part of the wire form.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Chunk {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<ChunkMetadata>,
    #[prost(bytes = "bytes", tag = "2")]
    pub data: Bytes,
}

impl Chunk {
    pub fn mimetype(&self) -> &str {
        self.metadata.as_ref().map_or("", |m| m.mimetype.as_str())
    }

    pub fn role(&self) -> &str {
        self.metadata.as_ref().map_or("", |m| m.role.as_str())
    }
}

#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct TargetSpec {
    #[prost(string, tag = "1")]
    pub id: String,
}

/// Binds a parameter name to the wire id its payload is written under.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct NamedParameter {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub id: String,
}

impl NamedParameter {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Action {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub target_spec: Option<TargetSpec>,
    #[prost(message, repeated, tag = "3")]
    pub inputs: Vec<NamedParameter>,
    #[prost(message, repeated, tag = "4")]
    pub outputs: Vec<NamedParameter>,
}

macro_rules! named {
    ($($name:ident),* $(,)?) => {
        $(
            impl ::prost::Name for $name {
                const NAME: &'static str = stringify!($name);
                const PACKAGE: &'static str = PACKAGE;
            }
        )*
    };
}

named!(
    SessionMessage,
    NodeFragment,
    ChunkMetadata,
    Chunk,
    TargetSpec,
    NamedParameter,
    Action,
);

#[cfg(test)]
mod tests {
    use super::*;
    use prost::{Message, Name};

    #[test]
    fn full_names_are_package_qualified() {
        assert_eq!(Chunk::full_name(), "evergreen.v2.Chunk");
        assert_eq!(TargetSpec::full_name(), "evergreen.v2.TargetSpec");
        assert_eq!(SessionMessage::full_name(), "evergreen.v2.SessionMessage");
    }

    #[test]
    fn root_and_chunk_fragments_are_distinguishable() {
        let root = NodeFragment::root("root", vec!["a".into(), "b".into()]);
        let chunk = NodeFragment::chunk("a", Chunk::default());
        assert!(root.is_root());
        assert!(!chunk.is_root());
        assert_eq!(root.child_ids, vec!["a", "b"]);
    }

    #[test]
    fn metadata_merge_keeps_unset_fields() {
        let mut metadata = ChunkMetadata::default().with_mimetype("text/plain");
        metadata.merge_from(&ChunkMetadata::default().with_role("USER"));
        assert_eq!(metadata.mimetype, "text/plain");
        assert_eq!(metadata.role, "USER");

        metadata.merge_from(&ChunkMetadata::default().with_mimetype("image/png"));
        assert_eq!(metadata.mimetype, "image/png");
        assert_eq!(metadata.role, "USER");
    }

    #[test]
    fn session_message_survives_the_wire() {
        let message = SessionMessage {
            node_fragments: vec![
                NodeFragment::chunk(
                    "f1",
                    Chunk {
                        metadata: Some(ChunkMetadata::default().with_mimetype("text/plain")),
                        data: Bytes::from_static(b"hi"),
                    },
                ),
                NodeFragment::root("c1", vec!["f1".into()]),
            ],
            actions: vec![Action {
                name: "GENERATE".into(),
                target_spec: Some(TargetSpec { id: "model".into() }),
                inputs: vec![NamedParameter::new("prompt", "p1")],
                outputs: vec![NamedParameter::new("response", "r1")],
            }],
        };

        let encoded = message.encode_to_vec();
        let decoded = SessionMessage::decode(encoded.as_slice()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.node_fragments[0].chunk_fragment.as_ref().unwrap().mimetype(), "text/plain");
    }
}
