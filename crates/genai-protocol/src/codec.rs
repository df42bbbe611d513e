//! Fragment tree codec.
//!
//! A [`Content`] goes on the wire as one chunk fragment per chunk, in order,
//! followed by a root fragment that carries the content id and the ordered
//! fragment ids of its children. Children always precede their root so a
//! streaming reader can act on chunks as soon as they arrive.

use std::collections::HashSet;

use genai_proto::NodeFragment;
use indexmap::IndexMap;

use crate::content::{Chunk, Content};
use crate::error::{GenaiError, GenaiResult};
use crate::ids::IdGenerator;

/// Flattens `content` into fragments: children in content order, root last.
///
/// Every chunk fragment gets a fresh id from `ids`, unrelated to the chunk's
/// own id.
pub fn flatten(content: &Content, ids: &dyn IdGenerator) -> Vec<NodeFragment> {
    let mut fragments = Vec::with_capacity(content.len() + 1);
    let mut child_ids = Vec::with_capacity(content.len());
    for chunk in content {
        let fragment_id = ids.unique_id();
        child_ids.push(fragment_id.clone());
        fragments.push(NodeFragment::chunk(fragment_id, chunk.proto().clone()));
    }
    fragments.push(NodeFragment::root(content.id().as_str(), child_ids));
    fragments
}

/// Lazily rebuilds chunks from a fragment sequence, skipping root fragments.
pub fn unflatten<I>(fragments: I) -> impl Iterator<Item = Chunk>
where
    I: IntoIterator<Item = NodeFragment>,
{
    fragments
        .into_iter()
        .filter_map(|fragment| fragment.chunk_fragment.map(Chunk::from_proto))
}

/// One step of strict reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// A chunk fragment arrived.
    Chunk(Chunk),
    /// A root fragment arrived and every child it names was observed.
    Content(Content),
}

/// Strict reconstruction of fragment trees.
///
/// Chunk fragments are buffered by fragment id, in arrival order, until a
/// root claims them. A root naming a child that was never observed, or
/// naming one child twice, is an integrity failure. So is a stream that
/// ends with chunk fragments no root claimed.
#[derive(Debug, Default)]
pub struct TreeAssembler {
    pending: IndexMap<String, Chunk>,
}

impl TreeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: NodeFragment) -> GenaiResult<Assembled> {
        let NodeFragment {
            id,
            child_ids,
            chunk_fragment,
        } = fragment;

        if let Some(proto) = chunk_fragment {
            if self.pending.contains_key(&id) {
                return Err(GenaiError::DuplicateFragment(id));
            }
            let chunk = Chunk::from_proto(proto);
            self.pending.insert(id, chunk.clone());
            return Ok(Assembled::Chunk(chunk));
        }

        let mut seen = HashSet::with_capacity(child_ids.len());
        if let Some(repeated) = child_ids.iter().find(|child| !seen.insert(child.as_str())) {
            return Err(GenaiError::DuplicateFragment(repeated.clone()));
        }

        let missing: Vec<String> = child_ids
            .iter()
            .filter(|child| !self.pending.contains_key(child.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(GenaiError::IncompleteTree {
                root_id: id,
                missing,
            });
        }

        let mut chunks = Vec::with_capacity(child_ids.len());
        for child in &child_ids {
            match self.pending.shift_remove(child.as_str()) {
                Some(chunk) => chunks.push(chunk),
                None => {
                    return Err(GenaiError::IncompleteTree {
                        root_id: id,
                        missing: vec![child.clone()],
                    });
                }
            }
        }
        Ok(Assembled::Content(Content::from_chunks(chunks).with_id(id)))
    }

    /// Chunk fragments not yet claimed by any root.
    pub fn unclaimed(&self) -> usize {
        self.pending.len()
    }

    /// Ends reconstruction; fails if any chunk fragment was never claimed.
    pub fn finish(self) -> GenaiResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        Err(GenaiError::UnclaimedFragments(
            self.pending.into_keys().collect(),
        ))
    }
}

/// Strictly reassembles every tree in `fragments`, in root order.
pub fn reassemble<I>(fragments: I) -> GenaiResult<Vec<Content>>
where
    I: IntoIterator<Item = NodeFragment>,
{
    let mut assembler = TreeAssembler::new();
    let mut contents = Vec::new();
    for fragment in fragments {
        if let Assembled::Content(content) = assembler.push(fragment)? {
            contents.push(content);
        }
    }
    assembler.finish()?;
    Ok(contents)
}
