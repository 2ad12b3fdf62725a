use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::ast::{AlignKind, AttributeMap, CellSpan, Node, ReferenceKind};
use crate::diagnostic::{Diagnostic, W_ATTR_INVALID, W_FOOTNOTE_MISSING, W_REF_MISSING};
use crate::error::{Error, Result};
use crate::resolver::Definitions;
use crate::table::check_span;

const ASSET_ID_SEED: u64 = 0x5459_5044_4f57_4e21;
const FOOTNOTE_LABEL_PREFIX: &str = "fn-";
const IMAGE_ATTRIBUTES: [&str; 2] = ["width", "height"];
const MITEX_IMPORT: &str = "#import \"@preview/mitex:0.2.5\": mitex, mi\n";

// `<number><unit>` terms joined by `+`/`-`.
static LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:\d+(?:\.\d+)?|\.\d+)(?:pt|mm|cm|in|em|%)(?:\s*[+-]\s*(?:\d+(?:\.\d+)?|\.\d+)(?:pt|mm|cm|in|em|%))*\s*$",
    )
    .expect("length pattern is valid")
});

/// How `math` and `inlineMath` bodies are interpreted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathSyntax {
    /// Bodies are Typst math, evaluated in math mode.
    #[default]
    Typst,
    /// Bodies are LaTeX, rendered through the mitex package.
    Latex,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    pub math: MathSyntax,
    /// Typst source placed verbatim before the document.
    pub preamble: Option<String>,
}

/// An external file the Typst source refers to by `asset_id`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub source_url: String,
    pub asset_id: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Compiled {
    pub source: String,
    pub assets: Vec<Asset>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles a document tree to Typst source with default options.
pub fn compile(root: &Node) -> Result<Compiled> {
    compile_with_options(root, &CompileOptions::default())
}

/// Compiles a document tree to Typst source.
///
/// Definitions and footnote definitions are collected up front, so references
/// may precede them. Referenced footnote bodies follow the main content.
pub fn compile_with_options(root: &Node, options: &CompileOptions) -> Result<Compiled> {
    let Node::Root { children } = root else {
        return Err(Error::NotRoot {
            found: root.kind_name(),
        });
    };

    let mut compiler = Compiler::new(options, Definitions::collect(root));
    compiler.nodes(children)?;
    compiler.footnotes()?;
    let compiled = compiler.finish();

    tracing::debug!(
        bytes = compiled.source.len(),
        assets = compiled.assets.len(),
        diagnostics = compiled.diagnostics.len(),
        "compiled document"
    );
    Ok(compiled)
}

/// Deterministic file name for an image URL: `img-` and 16 hex digits of XxHash64.
pub fn asset_id(source_url: &str) -> String {
    format!(
        "img-{:016x}",
        XxHash64::oneshot(ASSET_ID_SEED, source_url.as_bytes())
    )
}

/// Escapes text for a double-quoted Typst string literal.
pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

struct Compiler<'a> {
    options: &'a CompileOptions,
    definitions: Definitions<'a>,
    out: String,
    assets: Vec<Asset>,
    seen_urls: HashSet<&'a str>,
    diagnostics: Vec<Diagnostic>,
    math_used: bool,
    // Output length right after the last markup literal.
    literal_end: usize,
}

impl<'a> Compiler<'a> {
    fn new(options: &'a CompileOptions, definitions: Definitions<'a>) -> Self {
        Self {
            options,
            definitions,
            out: String::new(),
            assets: Vec::new(),
            seen_urls: HashSet::new(),
            diagnostics: Vec::new(),
            math_used: false,
            literal_end: 0,
        }
    }

    fn finish(self) -> Compiled {
        let mut source = String::new();
        if let Some(preamble) = &self.options.preamble {
            source.push_str(preamble);
            if !preamble.ends_with('\n') {
                source.push('\n');
            }
        }
        if self.math_used && self.options.math == MathSyntax::Latex {
            source.push_str(MITEX_IMPORT);
        }
        source.push_str(&self.out);
        Compiled {
            source,
            assets: self.assets,
            diagnostics: self.diagnostics,
        }
    }

    fn nodes(&mut self, nodes: &'a [Node]) -> Result<()> {
        for node in nodes {
            self.node(node)?;
        }
        Ok(())
    }

    fn wrapped(&mut self, open: &str, children: &'a [Node], close: &str) -> Result<()> {
        self.out.push_str(open);
        self.nodes(children)?;
        self.out.push_str(close);
        Ok(())
    }

    fn node(&mut self, node: &'a Node) -> Result<()> {
        match node {
            Node::Root { .. } => return Err(Error::NestedRoot),
            Node::Text { value } => self.string_literal(value),
            Node::Paragraph { children } => self.wrapped("#par[", children, "]\n")?,
            Node::Heading { depth, children } => {
                let open = format!("#heading(level: {})[", depth);
                self.wrapped(&open, children, "]\n")?;
            }
            Node::Emphasis { children } => self.wrapped("#emph[", children, "]")?,
            Node::Strong { children } => self.wrapped("#strong[", children, "]")?,
            Node::Delete { children } => self.wrapped("#strike[", children, "]")?,
            Node::Blockquote { children } => {
                self.wrapped("#quote(block: true)[", children, "]\n")?;
            }
            Node::Code { lang, value, .. } => {
                self.out.push_str(&format!(
                    "#raw(block: true, lang: \"{}\", \"{}\")\n",
                    escape_string(code_lang(lang.as_deref())),
                    escape_string(value)
                ));
            }
            Node::InlineCode { value } => {
                self.out.push_str(&format!(
                    "#raw(lang: \"{}\", \"{}\")",
                    code_lang(None),
                    escape_string(value)
                ));
            }
            Node::List {
                ordered,
                start,
                spread,
                children,
            } => self.list(*ordered, *start, spread.unwrap_or(false), children)?,
            Node::ListItem { .. } => return Err(Error::OutsideList),
            Node::Link { url, children, .. } => self.link(url, children)?,
            Node::Image {
                url,
                alt,
                attributes,
                ..
            } => self.image(url, alt.as_deref(), attributes),
            Node::Math { value } => self.math(value, true),
            Node::InlineMath { value } => self.math(value, false),
            Node::Table { align, children } => self.table(align, children)?,
            Node::TableRow { .. } | Node::TableCell { .. } => {
                return Err(Error::OutsideTable {
                    kind: node.kind_name(),
                });
            }
            Node::ThematicBreak {} => self.out.push_str("#line(length: 100%)\n"),
            Node::Break {} => self.out.push_str("#linebreak()"),
            Node::LinkReference {
                identifier,
                reference_type,
                children,
                ..
            } => match self.definitions.link(identifier) {
                Some(target) => self.link(target.url, children)?,
                None => {
                    self.missing_reference("link", identifier);
                    self.string_literal("[");
                    self.nodes(children)?;
                    let close = format!("]{}", reference_suffix(*reference_type, identifier));
                    self.string_literal(&close);
                }
            },
            Node::ImageReference {
                identifier,
                reference_type,
                alt,
                attributes,
                ..
            } => match self.definitions.link(identifier) {
                Some(target) => self.image(target.url, alt.as_deref(), attributes),
                None => {
                    self.missing_reference("image", identifier);
                    let literal = format!(
                        "![{}]{}",
                        alt.as_deref().unwrap_or_default(),
                        reference_suffix(*reference_type, identifier)
                    );
                    self.string_literal(&literal);
                }
            },
            Node::FootnoteReference { identifier, .. } => {
                if self.definitions.mark_visited(identifier) {
                    self.out
                        .push_str(&format!("#footnote({})", footnote_label(identifier)));
                } else {
                    self.diagnostics.push(Diagnostic::warning(
                        W_FOOTNOTE_MISSING,
                        format!("footnote `{}` is not defined", identifier),
                    ));
                    self.string_literal(&format!("[^{}]", identifier));
                }
            }
            Node::Html { value } => {
                self.out.push_str(&format!(
                    "#raw(block: true, lang: \"html\", \"{}\")\n",
                    escape_string(value)
                ));
            }
            // Directives carry no Typst meaning of their own; their content stays.
            Node::TextDirective { children, .. }
            | Node::LeafDirective { children, .. }
            | Node::ContainerDirective { children, .. }
            | Node::Markup { children } => self.nodes(children)?,
            Node::MarkupLiteral { value } => self.markup_literal(value),
            Node::Definition { .. }
            | Node::FootnoteDefinition { .. }
            | Node::Yaml { .. }
            | Node::Toml { .. } => {}
        }
        Ok(())
    }

    fn string_literal(&mut self, text: &str) {
        self.out.push_str("#\"");
        self.out.push_str(&escape_string(text));
        self.out.push('"');
    }

    // A literal opening with `(`, `[` or `.` would otherwise continue the
    // embedded expression before it; `;` ends that expression and is not shown.
    fn markup_literal(&mut self, value: &str) {
        let after_expression =
            self.out.len() != self.literal_end && self.out.ends_with(['"', ']', ')']);
        if after_expression && !value.is_empty() {
            self.out.push(';');
        }
        self.out.push_str(value);
        self.literal_end = self.out.len();
    }

    fn link(&mut self, url: &str, children: &'a [Node]) -> Result<()> {
        let open = format!("#link(\"{}\")[", escape_string(url));
        self.wrapped(&open, children, "]")
    }

    fn list(
        &mut self,
        ordered: bool,
        start: Option<u32>,
        spread: bool,
        items: &'a [Node],
    ) -> Result<()> {
        if ordered {
            self.out.push_str("#enum(");
            if let Some(start) = start {
                self.out.push_str(&format!("start: {}, ", start));
            }
        } else {
            self.out.push_str("#list(");
        }
        self.out.push_str(&format!("tight: {}", !spread));

        for item in items {
            let Node::ListItem {
                checked,
                spread: item_spread,
                children,
            } = item
            else {
                return Err(Error::UnexpectedChild {
                    parent: "list",
                    expected: "listItem",
                    found: item.kind_name(),
                });
            };
            self.out.push_str(", [");
            match checked {
                Some(true) => self.string_literal("☑ "),
                Some(false) => self.string_literal("☐ "),
                None => {}
            }
            let tight = !spread && !item_spread.unwrap_or(false);
            for child in children {
                match child {
                    // Tight items hold their text directly, without paragraph spacing.
                    Node::Paragraph { children } if tight => self.nodes(children)?,
                    _ => self.node(child)?,
                }
            }
            self.out.push(']');
        }
        self.out.push_str(")\n");
        Ok(())
    }

    fn image(&mut self, url: &'a str, alt: Option<&str>, attributes: &AttributeMap) {
        let id = asset_id(url);
        if self.seen_urls.insert(url) {
            self.assets.push(Asset {
                source_url: url.to_string(),
                asset_id: id.clone(),
            });
        }

        self.out.push_str(&format!("#box(image(\"{}\"", id));
        for key in IMAGE_ATTRIBUTES {
            match attributes.get(key) {
                Some(Some(value)) if LENGTH.is_match(value) => {
                    self.out.push_str(&format!(", {}: {}", key, value.trim()));
                }
                Some(value) => {
                    self.diagnostics.push(Diagnostic::warning(
                        W_ATTR_INVALID,
                        format!(
                            "ignored image attribute `{}` with value `{}`",
                            key,
                            value.as_deref().unwrap_or_default()
                        ),
                    ));
                }
                None => {}
            }
        }
        if let Some(alt) = alt.filter(|alt| !alt.is_empty()) {
            self.out
                .push_str(&format!(", alt: \"{}\"", escape_string(alt)));
        }
        self.out.push_str("))");
    }

    fn math(&mut self, value: &str, block: bool) {
        self.math_used = true;
        let value = escape_string(value);
        let call = match (self.options.math, block) {
            (MathSyntax::Typst, _) => format!(
                "#math.equation(block: {}, eval(\"{}\", mode: \"math\"))",
                block, value
            ),
            (MathSyntax::Latex, true) => format!("#mitex(\"{}\")", value),
            (MathSyntax::Latex, false) => format!("#mi(\"{}\")", value),
        };
        self.out.push_str(&call);
        if block {
            self.out.push('\n');
        }
    }

    fn table(&mut self, align: &[Option<AlignKind>], rows: &'a [Node]) -> Result<()> {
        let columns = if !align.is_empty() {
            align.len()
        } else {
            match rows.first() {
                Some(Node::TableRow { children }) => children.len(),
                Some(other) => {
                    return Err(Error::UnexpectedChild {
                        parent: "table",
                        expected: "tableRow",
                        found: other.kind_name(),
                    });
                }
                None => 0,
            }
        };
        if columns == 0 {
            tracing::trace!("skipping table without columns");
            return Ok(());
        }

        let aligns: Vec<&str> = (0..columns)
            .map(|idx| align_name(align.get(idx).copied().flatten()))
            .collect();
        self.out.push_str(&format!(
            "#table(\n  columns: {},\n  align: ({},),\n",
            columns,
            aligns.join(", ")
        ));

        for row in rows {
            let Node::TableRow { children: cells } = row else {
                return Err(Error::UnexpectedChild {
                    parent: "table",
                    expected: "tableRow",
                    found: row.kind_name(),
                });
            };
            let mut first = true;
            for cell in cells {
                let Node::TableCell { span, children } = cell else {
                    return Err(Error::UnexpectedChild {
                        parent: "tableRow",
                        expected: "tableCell",
                        found: cell.kind_name(),
                    });
                };
                if span.suppressed {
                    continue;
                }
                self.out.push_str(if first { "  " } else { ", " });
                first = false;
                self.table_cell(span, children)?;
            }
            for _ in cells.len()..columns {
                self.out.push_str(if first { "  []" } else { ", []" });
                first = false;
            }
            if !first {
                self.out.push_str(",\n");
            }
        }
        self.out.push_str(")\n");
        Ok(())
    }

    fn table_cell(&mut self, span: &CellSpan, children: &'a [Node]) -> Result<()> {
        check_span(span)?;
        let mut args = Vec::new();
        if let Some(colspan) = span.colspan {
            args.push(format!("colspan: {}", colspan));
        }
        if let Some(rowspan) = span.rowspan {
            args.push(format!("rowspan: {}", rowspan));
        }
        if args.is_empty() {
            self.wrapped("[", children, "]")
        } else {
            let open = format!("table.cell({})[", args.join(", "));
            self.wrapped(&open, children, "]")
        }
    }

    fn footnotes(&mut self) -> Result<()> {
        while let Some((identifier, children)) = self.definitions.next_visited_footnote() {
            self.wrapped("#footnote[", children, "] ")?;
            self.out.push_str(&footnote_label(identifier));
            self.out.push('\n');
        }
        Ok(())
    }

    fn missing_reference(&mut self, kind: &str, identifier: &str) {
        tracing::trace!(kind, identifier, "undefined reference");
        self.diagnostics.push(Diagnostic::warning(
            W_REF_MISSING,
            format!("{} reference `{}` has no definition", kind, identifier),
        ));
    }
}

fn code_lang(lang: Option<&str>) -> &str {
    match lang {
        None | Some("plain") => "txt",
        Some("markdown") => "md",
        Some(other) => other,
    }
}

fn align_name(align: Option<AlignKind>) -> &'static str {
    match align {
        Some(AlignKind::Left) => "left",
        Some(AlignKind::Right) => "right",
        Some(AlignKind::Center) => "center",
        None => "auto",
    }
}

fn reference_suffix(kind: ReferenceKind, identifier: &str) -> String {
    match kind {
        ReferenceKind::Shortcut => String::new(),
        ReferenceKind::Collapsed => "[]".to_string(),
        ReferenceKind::Full => format!("[{}]", identifier),
    }
}

/// `<fn-…>` with every character outside `[A-Za-z0-9-]` written as `_<hex>_`.
fn footnote_label(identifier: &str) -> String {
    let mut out = String::from("<");
    out.push_str(FOOTNOTE_LABEL_PREFIX);
    for ch in identifier.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else {
            out.push_str(&format!("_{:x}_", ch as u32));
        }
    }
    out.push('>');
    out
}
