//! Block-tree rich-text document.
//!
//! The content store's rich-text field expects a Lexical editor state:
//! a root node holding heading/paragraph elements, each holding plain text
//! runs. Nodes carry a direction flag for right-to-left languages.

use serde::{Deserialize, Serialize};

use crate::article::{BlockKind, BodyBlock};

/// Languages rendered right-to-left.
const RTL_LANGUAGES: &[&str] = &["ar", "fa", "he", "iw", "ku", "ps", "sd", "ug", "ur", "yi"];

/// Text direction of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    /// Direction for a language code such as `ar`, `en` or `fa-IR`.
    pub fn for_language(language: &str) -> Self {
        let primary = language
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if RTL_LANGUAGES.contains(&primary.as_str()) {
            Direction::Rtl
        } else {
            Direction::Ltr
        }
    }
}

/// Top-level editor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub root: RootNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub children: Vec<BlockNode>,
    pub direction: Direction,
    pub format: String,
    pub indent: u32,
    pub version: u32,
}

/// Block-level element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockNode {
    Heading(HeadingNode),
    Paragraph(ParagraphNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingNode {
    pub tag: String,
    pub children: Vec<TextNode>,
    pub direction: Direction,
    pub format: String,
    pub indent: u32,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphNode {
    pub children: Vec<TextNode>,
    pub direction: Direction,
    pub format: String,
    pub indent: u32,
    pub version: u32,
    pub text_format: u32,
    pub text_style: String,
}

/// Plain run of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub format: u32,
    pub detail: u32,
    pub mode: String,
    pub style: String,
    pub version: u32,
}

impl TextNode {
    fn plain(text: &str) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.to_string(),
            format: 0,
            detail: 0,
            mode: "normal".to_string(),
            style: String::new(),
            version: 1,
        }
    }
}

impl BlockNode {
    /// Concatenated text of the block.
    pub fn text(&self) -> String {
        let children = match self {
            BlockNode::Heading(h) => &h.children,
            BlockNode::Paragraph(p) => &p.children,
        };
        children.iter().map(|c| c.text.as_str()).collect()
    }
}

fn text_children(text: &str) -> Vec<TextNode> {
    let text = text.trim();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![TextNode::plain(text)]
    }
}

/// Convert generated body blocks into the store's document format.
///
/// Pure and deterministic: the same blocks and direction always yield an
/// identical tree, with block order preserved.
pub fn convert_to_document(blocks: &[BodyBlock], direction: Direction) -> Document {
    let children = blocks
        .iter()
        .map(|block| match block.kind {
            BlockKind::Heading => BlockNode::Heading(HeadingNode {
                tag: "h2".to_string(),
                children: text_children(&block.text),
                direction,
                format: String::new(),
                indent: 0,
                version: 1,
            }),
            BlockKind::Paragraph => BlockNode::Paragraph(ParagraphNode {
                children: text_children(&block.text),
                direction,
                format: String::new(),
                indent: 0,
                version: 1,
                text_format: 0,
                text_style: String::new(),
            }),
        })
        .collect();

    Document {
        root: RootNode {
            kind: "root".to_string(),
            children,
            direction,
            format: String::new(),
            indent: 0,
            version: 1,
        },
    }
}
