//! Serialized program form.
//!
//! A document lists the scripts in order and every persistent block.
//! Ephemeral (flyout/preview) blocks are session-only and never written.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::DocumentError;
use crate::graph::ProgramGraph;
use crate::id::BlockId;

/// Serialized form of a [`ProgramGraph`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDocument {
    /// Top-level blocks, in script order.
    pub scripts: Vec<BlockId>,
    /// Every persistent block.
    pub blocks: Vec<Block>,
}

impl ProgramDocument {
    /// Parse a document from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] for malformed JSON.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the document as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ProgramGraph {
    /// Snapshot the persistent part of the graph.
    #[must_use]
    pub fn to_document(&self) -> ProgramDocument {
        let ephemeral = self.ephemeral_ids();
        let mut scripts: Vec<BlockId> = self.scripts().cloned().collect();
        let mut blocks = Vec::new();

        for block in self.blocks() {
            if ephemeral.contains(&block.id) {
                continue;
            }
            let mut block = block.clone();
            let ephemeral_children: Vec<BlockId> = block
                .children()
                .filter(|child| ephemeral.contains(*child))
                .cloned()
                .collect();
            for child in &ephemeral_children {
                block.unlink_child(child);
            }
            if block.parent.as_ref().is_some_and(|p| ephemeral.contains(p)) {
                block.parent = None;
                block.top_level = true;
                scripts.push(block.id.clone());
            }
            blocks.push(block);
        }

        ProgramDocument { scripts, blocks }
    }

    /// Rebuild a graph from a document, checking every structural invariant.
    ///
    /// # Errors
    ///
    /// Fails on duplicate ids, dangling references, or an inconsistent script
    /// list.
    pub fn from_document(document: ProgramDocument) -> Result<Self, DocumentError> {
        let mut blocks = BTreeMap::new();
        for block in document.blocks {
            if blocks.contains_key(&block.id) {
                return Err(DocumentError::DuplicateBlock(block.id));
            }
            blocks.insert(block.id.clone(), block);
        }

        let mut scripts = IndexSet::new();
        for script in document.scripts {
            if !blocks.contains_key(&script) {
                return Err(DocumentError::NotTopLevel(script));
            }
            scripts.insert(script);
        }

        let graph = Self::from_parts(blocks, scripts);
        graph.validate()?;
        Ok(graph)
    }

    /// Serialize the persistent part of the graph to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        self.to_document().to_json()
    }

    /// Parse and validate a graph from JSON.
    ///
    /// # Errors
    ///
    /// Fails for malformed JSON or an inconsistent document.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Self::from_document(ProgramDocument::from_json(text)?)
    }
}
