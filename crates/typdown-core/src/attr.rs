use crate::ast::{AttributeMap, Node};

enum State {
    // Directly after the opening brace.
    Open,
    // After a separating comma.
    Between,
    Key(String),
    AwaitValue { key: String },
    Unquoted { key: String, value: String },
    Quoted { key: String, quote: char, value: String },
    AfterQuote { key: String, value: String },
}

/// Parses an inline `{key=value, flag, ...}` block at the very start of `input`.
///
/// Returns the attributes and the unconsumed text after the closing brace, or
/// `None` when no well-formed block starts at position 0. A single left to
/// right scan, no backtracking.
pub fn parse_attribute_block(input: &str) -> Option<(AttributeMap, &str)> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, '{')) => {}
        _ => return None,
    }

    let mut attrs = AttributeMap::new();
    let mut state = State::Open;
    for (idx, ch) in chars {
        if matches!(ch, '\n' | '\r' | '\t') {
            return None;
        }
        state = match state {
            State::Open | State::Between => match ch {
                ' ' => state,
                '}' if matches!(state, State::Between) => return Some((attrs, &input[idx + 1..])),
                '=' | ',' | '}' => return None,
                _ => State::Key(ch.to_string()),
            },
            State::Key(mut key) => match ch {
                '=' => State::AwaitValue {
                    key: trimmed_key(&key)?,
                },
                ',' => {
                    attrs.insert(trimmed_key(&key)?, None);
                    State::Between
                }
                '}' => {
                    attrs.insert(trimmed_key(&key)?, None);
                    return Some((attrs, &input[idx + 1..]));
                }
                _ => {
                    key.push(ch);
                    State::Key(key)
                }
            },
            State::AwaitValue { key } => match ch {
                ' ' => State::AwaitValue { key },
                '\'' | '"' => State::Quoted {
                    key,
                    quote: ch,
                    value: String::new(),
                },
                ',' => {
                    attrs.insert(key, Some(String::new()));
                    State::Between
                }
                '}' => {
                    attrs.insert(key, Some(String::new()));
                    return Some((attrs, &input[idx + 1..]));
                }
                '=' => return None,
                _ => State::Unquoted {
                    key,
                    value: ch.to_string(),
                },
            },
            State::Unquoted { key, mut value } => match ch {
                ',' => {
                    attrs.insert(key, Some(value.trim().to_string()));
                    State::Between
                }
                '}' => {
                    attrs.insert(key, Some(value.trim().to_string()));
                    return Some((attrs, &input[idx + 1..]));
                }
                '=' => return None,
                _ => {
                    value.push(ch);
                    State::Unquoted { key, value }
                }
            },
            State::Quoted {
                key,
                quote,
                mut value,
            } => {
                if ch == quote {
                    State::AfterQuote { key, value }
                } else {
                    value.push(ch);
                    State::Quoted { key, quote, value }
                }
            }
            State::AfterQuote { key, value } => match ch {
                ' ' => State::AfterQuote { key, value },
                ',' => {
                    attrs.insert(key, Some(value));
                    State::Between
                }
                '}' => {
                    attrs.insert(key, Some(value));
                    return Some((attrs, &input[idx + 1..]));
                }
                _ => return None,
            },
        };
    }

    // Input ran out before the closing brace.
    None
}

fn trimmed_key(raw: &str) -> Option<String> {
    let key = raw.trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Moves `{...}` blocks that directly follow an image into the image's attributes.
///
/// The text node keeps whatever follows the block and is dropped once empty.
/// Text that does not start with a well-formed block is left alone.
pub fn apply_image_attributes(node: &mut Node) {
    let Some(children) = node.children_mut() else {
        return;
    };

    let mut idx = 0;
    while idx < children.len() {
        apply_image_attributes(&mut children[idx]);

        let is_image = matches!(
            children[idx],
            Node::Image { .. } | Node::ImageReference { .. }
        );
        if is_image && idx + 1 < children.len() {
            let parsed = match &children[idx + 1] {
                Node::Text { value } => parse_attribute_block(value)
                    .map(|(attrs, rest)| (attrs, rest.to_string())),
                _ => None,
            };
            match parsed {
                Some((attrs, rest)) => {
                    if let Node::Image { attributes, .. } | Node::ImageReference { attributes, .. } =
                        &mut children[idx]
                    {
                        attributes.extend(attrs);
                    }
                    if rest.is_empty() {
                        children.remove(idx + 1);
                    } else {
                        children[idx + 1] = Node::Text { value: rest };
                    }
                }
                None => {
                    tracing::trace!(index = idx, "text after image is not an attribute block");
                }
            }
        }
        idx += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_image_attributes, parse_attribute_block};
    use crate::ast::{AttributeMap, Node};

    fn map(entries: &[(&str, Option<&str>)]) -> AttributeMap {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.map(str::to_string)))
            .collect()
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        assert_eq!(
            parse_attribute_block("{a=1,a=2}"),
            Some((map(&[("a", Some("2"))]), ""))
        );
    }

    #[test]
    fn quoted_values_hide_delimiters() {
        assert_eq!(
            parse_attribute_block("{a='1,2=3'}"),
            Some((map(&[("a", Some("1,2=3"))]), ""))
        );
        assert_eq!(
            parse_attribute_block("{a=\"x}y\"} tail"),
            Some((map(&[("a", Some("x}y"))]), " tail"))
        );
    }

    #[test]
    fn bare_keys_and_empty_values() {
        assert_eq!(
            parse_attribute_block("{ wide, width = 10pt , alt='', height=}rest"),
            Some((
                map(&[
                    ("wide", None),
                    ("width", Some("10pt")),
                    ("alt", Some("")),
                    ("height", Some("")),
                ]),
                "rest"
            ))
        );
    }

    #[test]
    fn trailing_comma_is_accepted() {
        assert_eq!(
            parse_attribute_block("{a=1, }x"),
            Some((map(&[("a", Some("1"))]), "x"))
        );
    }

    #[test]
    fn keys_are_case_sensitive() {
        let (attrs, _) = parse_attribute_block("{Width=1,width=2}").expect("parses");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["Width"], Some("1".to_string()));
    }

    #[test]
    fn rejects_malformed_blocks() {
        for input in [
            "",
            "text {a=1}",
            " {a=1}",
            "{a=1",
            "{a=b=c}",
            "{a='x'y}",
            "{a='unterminated}",
            "{a=1\n}",
            "{a=\t1}",
            "{=1}",
            "{a,,b}",
            "{}",
            "{ }",
            "{a==1}",
        ] {
            assert_eq!(parse_attribute_block(input), None, "input {:?}", input);
        }
    }

    #[test]
    fn remainder_is_exact_suffix() {
        let input = "{width=50%} and more {b=2}";
        let (_, rest) = parse_attribute_block(input).expect("parses");
        assert_eq!(rest, " and more {b=2}");
        assert!(input.ends_with(rest));
    }

    fn image() -> Node {
        Node::Image {
            url: "a.png".to_string(),
            alt: None,
            title: None,
            attributes: AttributeMap::new(),
        }
    }

    fn text(value: &str) -> Node {
        Node::Text {
            value: value.to_string(),
        }
    }

    #[test]
    fn tree_pass_moves_attributes_onto_image() {
        let mut root = Node::Root {
            children: vec![Node::Paragraph {
                children: vec![image(), text("{width=2cm} caption"), image(), text("{height=1in}")],
            }],
        };
        apply_image_attributes(&mut root);

        let Node::Root { children } = &root else {
            unreachable!()
        };
        let Node::Paragraph { children } = &children[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(children.len(), 3);
        assert!(matches!(
            &children[0],
            Node::Image { attributes, .. } if attributes == &map(&[("width", Some("2cm"))])
        ));
        assert_eq!(children[1], text(" caption"));
        assert!(matches!(
            &children[2],
            Node::Image { attributes, .. } if attributes == &map(&[("height", Some("1in"))])
        ));
    }

    #[test]
    fn tree_pass_merges_with_existing_attributes() {
        let mut root = Node::Root {
            children: vec![Node::Image {
                url: "a.png".to_string(),
                alt: None,
                title: None,
                attributes: map(&[("width", Some("1pt")), ("height", Some("2pt"))]),
            }, text("{width=3pt}")],
        };
        apply_image_attributes(&mut root);
        let Node::Root { children } = &root else {
            unreachable!()
        };
        assert_eq!(children.len(), 1);
        assert!(matches!(
            &children[0],
            Node::Image { attributes, .. }
                if attributes == &map(&[("width", Some("3pt")), ("height", Some("2pt"))])
        ));
    }

    #[test]
    fn tree_pass_leaves_malformed_text_untouched() {
        let original = Node::Root {
            children: vec![image(), text("{width=1pt")],
        };
        let mut root = original.clone();
        apply_image_attributes(&mut root);
        assert_eq!(root, original);
    }
}
