use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute key to optional value. `None` means the key was given without `=`.
pub type AttributeMap = BTreeMap<String, Option<String>>;

/// Document tree in mdast shape.
///
/// Every node owns its children. Cross references between nodes go through
/// string identifiers (`definition`, `footnoteDefinition`), never pointers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Node {
    Root {
        #[serde(default)]
        children: Vec<Node>,
    },
    Text {
        value: String,
    },
    Paragraph {
        #[serde(default)]
        children: Vec<Node>,
    },
    Heading {
        depth: u8,
        #[serde(default)]
        children: Vec<Node>,
    },
    Emphasis {
        #[serde(default)]
        children: Vec<Node>,
    },
    Strong {
        #[serde(default)]
        children: Vec<Node>,
    },
    Delete {
        #[serde(default)]
        children: Vec<Node>,
    },
    Blockquote {
        #[serde(default)]
        children: Vec<Node>,
    },
    Code {
        lang: Option<String>,
        meta: Option<String>,
        value: String,
    },
    InlineCode {
        value: String,
    },
    List {
        #[serde(default)]
        ordered: bool,
        start: Option<u32>,
        spread: Option<bool>,
        #[serde(default)]
        children: Vec<Node>,
    },
    ListItem {
        checked: Option<bool>,
        spread: Option<bool>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Link {
        url: String,
        title: Option<String>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Image {
        url: String,
        alt: Option<String>,
        title: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: AttributeMap,
    },
    Math {
        value: String,
    },
    InlineMath {
        value: String,
    },
    Table {
        #[serde(default)]
        align: Vec<Option<AlignKind>>,
        #[serde(default)]
        children: Vec<Node>,
    },
    TableRow {
        #[serde(default)]
        children: Vec<Node>,
    },
    TableCell {
        #[serde(default, skip_serializing_if = "CellSpan::is_default")]
        span: CellSpan,
        #[serde(default)]
        children: Vec<Node>,
    },
    ThematicBreak {},
    Break {},
    Definition {
        identifier: String,
        label: Option<String>,
        url: String,
        title: Option<String>,
    },
    FootnoteDefinition {
        identifier: String,
        label: Option<String>,
        #[serde(default)]
        children: Vec<Node>,
    },
    LinkReference {
        identifier: String,
        label: Option<String>,
        reference_type: ReferenceKind,
        #[serde(default)]
        children: Vec<Node>,
    },
    ImageReference {
        identifier: String,
        label: Option<String>,
        reference_type: ReferenceKind,
        alt: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: AttributeMap,
    },
    FootnoteReference {
        identifier: String,
        label: Option<String>,
    },
    Html {
        value: String,
    },
    Yaml {
        value: String,
    },
    Toml {
        value: String,
    },
    TextDirective {
        name: String,
        #[serde(default)]
        attributes: AttributeMap,
        #[serde(default)]
        children: Vec<Node>,
    },
    LeafDirective {
        name: String,
        #[serde(default)]
        attributes: AttributeMap,
        #[serde(default)]
        children: Vec<Node>,
    },
    ContainerDirective {
        name: String,
        #[serde(default)]
        attributes: AttributeMap,
        #[serde(default)]
        children: Vec<Node>,
    },
    /// Container for Typst spliced in by upstream transforms.
    Markup {
        #[serde(default)]
        children: Vec<Node>,
    },
    /// Typst source emitted verbatim.
    MarkupLiteral {
        value: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignKind {
    Left,
    Right,
    Center,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Shortcut,
    Collapsed,
    Full,
}

/// Span annotation written by the table span merger.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellSpan {
    #[serde(default)]
    pub colspan: Option<u32>,
    #[serde(default)]
    pub rowspan: Option<u32>,
    // Absorbed into a neighbor; never emitted.
    #[serde(default)]
    pub suppressed: bool,
}

impl CellSpan {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Node {
    /// The mdast `type` tag of this node.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Root { .. } => "root",
            Node::Text { .. } => "text",
            Node::Paragraph { .. } => "paragraph",
            Node::Heading { .. } => "heading",
            Node::Emphasis { .. } => "emphasis",
            Node::Strong { .. } => "strong",
            Node::Delete { .. } => "delete",
            Node::Blockquote { .. } => "blockquote",
            Node::Code { .. } => "code",
            Node::InlineCode { .. } => "inlineCode",
            Node::List { .. } => "list",
            Node::ListItem { .. } => "listItem",
            Node::Link { .. } => "link",
            Node::Image { .. } => "image",
            Node::Math { .. } => "math",
            Node::InlineMath { .. } => "inlineMath",
            Node::Table { .. } => "table",
            Node::TableRow { .. } => "tableRow",
            Node::TableCell { .. } => "tableCell",
            Node::ThematicBreak {} => "thematicBreak",
            Node::Break {} => "break",
            Node::Definition { .. } => "definition",
            Node::FootnoteDefinition { .. } => "footnoteDefinition",
            Node::LinkReference { .. } => "linkReference",
            Node::ImageReference { .. } => "imageReference",
            Node::FootnoteReference { .. } => "footnoteReference",
            Node::Html { .. } => "html",
            Node::Yaml { .. } => "yaml",
            Node::Toml { .. } => "toml",
            Node::TextDirective { .. } => "textDirective",
            Node::LeafDirective { .. } => "leafDirective",
            Node::ContainerDirective { .. } => "containerDirective",
            Node::Markup { .. } => "markup",
            Node::MarkupLiteral { .. } => "markupLiteral",
        }
    }

    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Root { children }
            | Node::Paragraph { children }
            | Node::Heading { children, .. }
            | Node::Emphasis { children }
            | Node::Strong { children }
            | Node::Delete { children }
            | Node::Blockquote { children }
            | Node::List { children, .. }
            | Node::ListItem { children, .. }
            | Node::Link { children, .. }
            | Node::Table { children, .. }
            | Node::TableRow { children }
            | Node::TableCell { children, .. }
            | Node::FootnoteDefinition { children, .. }
            | Node::LinkReference { children, .. }
            | Node::TextDirective { children, .. }
            | Node::LeafDirective { children, .. }
            | Node::ContainerDirective { children, .. }
            | Node::Markup { children } => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Root { children }
            | Node::Paragraph { children }
            | Node::Heading { children, .. }
            | Node::Emphasis { children }
            | Node::Strong { children }
            | Node::Delete { children }
            | Node::Blockquote { children }
            | Node::List { children, .. }
            | Node::ListItem { children, .. }
            | Node::Link { children, .. }
            | Node::Table { children, .. }
            | Node::TableRow { children }
            | Node::TableCell { children, .. }
            | Node::FootnoteDefinition { children, .. }
            | Node::LinkReference { children, .. }
            | Node::TextDirective { children, .. }
            | Node::LeafDirective { children, .. }
            | Node::ContainerDirective { children, .. }
            | Node::Markup { children } => Some(children),
            _ => None,
        }
    }

    /// Trimmed value of the first child when that child is a text node.
    pub(crate) fn leading_text(&self) -> Option<&str> {
        match self.children()?.first()? {
            Node::Text { value } => Some(value.trim()),
            _ => None,
        }
    }
}
