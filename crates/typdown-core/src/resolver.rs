use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::Node;

/// Target of a `definition` node.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LinkTarget<'a> {
    pub url: &'a str,
}

#[derive(Debug)]
pub(crate) struct FootnoteSlot<'a> {
    pub children: &'a [Node],
    pub visited: bool,
    pub emitted: bool,
}

/// Definitions and footnote definitions of one document, keyed by identifier.
///
/// Filled once before emission so that references may precede their
/// definitions. The first definition of an identifier wins.
#[derive(Debug, Default)]
pub(crate) struct Definitions<'a> {
    links: HashMap<&'a str, LinkTarget<'a>>,
    footnotes: IndexMap<&'a str, FootnoteSlot<'a>>,
}

impl<'a> Definitions<'a> {
    pub fn collect(root: &'a Node) -> Self {
        let mut definitions = Self::default();
        definitions.visit(root);
        tracing::trace!(
            links = definitions.links.len(),
            footnotes = definitions.footnotes.len(),
            "collected definitions"
        );
        definitions
    }

    fn visit(&mut self, node: &'a Node) {
        match node {
            Node::Definition {
                identifier, url, ..
            } => {
                self.links
                    .entry(identifier.as_str())
                    .or_insert(LinkTarget { url: url.as_str() });
            }
            Node::FootnoteDefinition {
                identifier,
                children,
                ..
            } => {
                self.footnotes
                    .entry(identifier.as_str())
                    .or_insert(FootnoteSlot {
                        children,
                        visited: false,
                        emitted: false,
                    });
            }
            _ => {}
        }

        if let Some(children) = node.children() {
            for child in children {
                self.visit(child);
            }
        }
    }

    pub fn link(&self, identifier: &str) -> Option<LinkTarget<'a>> {
        self.links.get(identifier).copied()
    }

    /// Marks a footnote as referenced. Returns `false` for unknown identifiers.
    pub fn mark_visited(&mut self, identifier: &str) -> bool {
        match self.footnotes.get_mut(identifier) {
            Some(slot) => {
                slot.visited = true;
                true
            }
            None => false,
        }
    }

    /// Takes the first referenced footnote (in definition order) whose body
    /// has not been handed out yet.
    ///
    /// Bodies may reference further footnotes, so callers loop until `None`.
    pub fn next_visited_footnote(&mut self) -> Option<(&'a str, &'a [Node])> {
        let (identifier, slot) = self
            .footnotes
            .iter_mut()
            .find(|(_, slot)| slot.visited && !slot.emitted)?;
        slot.emitted = true;
        Some((*identifier, slot.children))
    }
}

#[cfg(test)]
mod tests {
    use super::Definitions;
    use crate::ast::Node;

    fn definition(identifier: &str, url: &str) -> Node {
        Node::Definition {
            identifier: identifier.to_string(),
            label: None,
            url: url.to_string(),
            title: None,
        }
    }

    fn footnote(identifier: &str, body: &str) -> Node {
        Node::FootnoteDefinition {
            identifier: identifier.to_string(),
            label: None,
            children: vec![Node::Paragraph {
                children: vec![Node::Text {
                    value: body.to_string(),
                }],
            }],
        }
    }

    #[test]
    fn first_definition_wins() {
        let root = Node::Root {
            children: vec![
                definition("a", "first"),
                Node::Blockquote {
                    children: vec![definition("a", "second"), definition("A", "upper")],
                },
            ],
        };
        let definitions = Definitions::collect(&root);
        assert_eq!(definitions.link("a").map(|target| target.url), Some("first"));
        assert_eq!(definitions.link("A").map(|target| target.url), Some("upper"));
        assert!(definitions.link("b").is_none());
    }

    #[test]
    fn visited_footnotes_keep_definition_order() {
        let root = Node::Root {
            children: vec![
                footnote("one", "1"),
                footnote("two", "2"),
                footnote("three", "3"),
                footnote("two", "duplicate"),
            ],
        };
        let mut definitions = Definitions::collect(&root);
        assert!(definitions.mark_visited("three"));
        assert!(definitions.mark_visited("one"));
        assert!(definitions.mark_visited("three"));
        assert!(!definitions.mark_visited("missing"));

        let mut visited = Vec::new();
        while let Some((identifier, _)) = definitions.next_visited_footnote() {
            visited.push(identifier);
            if identifier == "three" {
                // Referenced from inside another footnote body.
                definitions.mark_visited("two");
            }
        }
        assert_eq!(visited, ["one", "three", "two"]);
    }
}
