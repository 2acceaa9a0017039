//! Rich-text document tree
//!
//! Terms may carry rich-text variants of their word and definition. The
//! document is a recursive tree of structural nodes with text leaves, as
//! produced by the web editor. This module models just enough of that
//! shape to transform leaf text while passing everything else through
//! untouched: marks, attrs and any unknown fields survive a
//! deserialize/serialize round trip verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node in a rich-text document
///
/// Leaves are nodes of type `"text"`; everything else is structural and
/// may carry child content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RichNode {
    Text(TextNode),
    Element(ElementNode),
}

/// Marker for the `"type": "text"` discriminant of leaf nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextTag {
    #[serde(rename = "text")]
    Text,
}

/// A text leaf. `extra` holds marks and any other fields untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    #[serde(rename = "type")]
    pub tag: TextTag,
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A structural node. `extra` holds attrs and any other fields untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<RichNode>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RichNode {
    /// Parse a document from its stored JSON text
    pub fn from_json(raw: &str) -> serde_json::Result<RichNode> {
        serde_json::from_str(raw)
    }

    /// Serialize the document back to JSON text
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Apply `f` to every text leaf, leaving structure untouched
    pub fn map_text<F>(self, f: &F) -> RichNode
    where
        F: Fn(&str) -> String,
    {
        match self {
            RichNode::Text(mut leaf) => {
                leaf.text = f(&leaf.text);
                RichNode::Text(leaf)
            }
            RichNode::Element(mut node) => {
                node.content = node
                    .content
                    .map(|children| children.into_iter().map(|c| c.map_text(f)).collect());
                RichNode::Element(node)
            }
        }
    }
}
