//! Compiles Markdown document trees (mdast) to Typst source.
//!
//! Two tree passes run before compilation: [`apply_image_attributes`] lifts
//! `{width=…}` blocks onto images and [`merge_table_spans`] folds `<`/`^`
//! marker cells into colspans and rowspans. [`compile`] then emits the
//! source text together with the images it refers to.

mod ast;
mod attr;
mod diagnostic;
mod emit;
mod error;
mod resolver;
mod table;

pub use ast::{AlignKind, AttributeMap, CellSpan, Node, ReferenceKind};
pub use attr::{apply_image_attributes, parse_attribute_block};
pub use diagnostic::{
    Diagnostic, DiagnosticSeverity, W_ATTR_INVALID, W_FOOTNOTE_MISSING, W_REF_MISSING,
};
pub use emit::{
    Asset, CompileOptions, Compiled, MathSyntax, asset_id, compile, compile_with_options,
    escape_string,
};
pub use error::{Error, Result};
pub use table::merge_table_spans;

/// Runs both tree passes in place.
pub fn apply_transforms(root: &mut Node) -> Result<()> {
    merge_table_spans(root)?;
    apply_image_attributes(root);
    Ok(())
}
