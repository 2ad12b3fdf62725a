use crate::ast::{CellSpan, Node};
use crate::error::{Error, Result};

const COLUMN_MARKER: &str = "<";
const ROW_MARKER: &str = "^";

/// Folds `<` and `^` marker cells of every table in the document into
/// colspan/rowspan on their neighbors.
pub fn merge_table_spans(root: &mut Node) -> Result<()> {
    if !matches!(root, Node::Root { .. }) {
        return Err(Error::NotRoot {
            found: root.kind_name(),
        });
    }
    visit(root)
}

fn visit(node: &mut Node) -> Result<()> {
    if let Node::Table { children, .. } = node {
        merge_spans(children)?;
    }
    if let Some(children) = node.children_mut() {
        for child in children {
            visit(child)?;
        }
    }
    Ok(())
}

fn merge_spans(rows: &mut [Node]) -> Result<()> {
    for row in rows.iter() {
        if let Node::TableRow { children: cells } = row {
            for cell in cells {
                if let Node::TableCell { span, .. } = cell {
                    check_span(span)?;
                }
            }
        }
    }
    merge_columns(rows)?;
    merge_rows(rows)
}

/// Rejects explicit spans of zero; an absent span counts as 1.
pub(crate) fn check_span(span: &CellSpan) -> Result<()> {
    if span.colspan == Some(0) {
        return Err(Error::ZeroSpan { axis: "colspan" });
    }
    if span.rowspan == Some(0) {
        return Err(Error::ZeroSpan { axis: "rowspan" });
    }
    Ok(())
}

fn add_span(prev: Option<u32>, marker: Option<u32>, axis: &'static str) -> Result<Option<u32>> {
    prev.unwrap_or(1)
        .checked_add(marker.unwrap_or(1))
        .map(Some)
        .ok_or(Error::SpanOverflow { axis })
}

// Right to left, so a run of `<` accumulates onto the leftmost real cell.
fn merge_columns(rows: &mut [Node]) -> Result<()> {
    for row in rows.iter_mut() {
        let Node::TableRow { children: cells } = row else {
            continue;
        };
        for idx in (1..cells.len()).rev() {
            if !is_marker(&cells[idx], COLUMN_MARKER) {
                continue;
            }
            let (before, after) = cells.split_at_mut(idx);
            let (Some(prev), Some(marker)) = (cell_span(&mut before[idx - 1]), cell_span(&mut after[0]))
            else {
                continue;
            };
            if prev.suppressed || marker.suppressed {
                continue;
            }
            prev.colspan = add_span(prev.colspan, marker.colspan, "colspan")?;
            marker.suppressed = true;
            tracing::trace!(column = idx, colspan = prev.colspan, "merged column marker");
        }
    }
    Ok(())
}

// Column positions are compared by index, not by visual position after colspans.
fn merge_rows(rows: &mut [Node]) -> Result<()> {
    for row_idx in 1..rows.len() {
        let (above, below) = rows.split_at_mut(row_idx);
        let (Node::TableRow { children: prev_cells }, Node::TableRow { children: cells }) =
            (&mut above[row_idx - 1], &mut below[0])
        else {
            continue;
        };
        for (idx, cell) in cells.iter_mut().enumerate() {
            if !is_marker(cell, ROW_MARKER) {
                continue;
            }
            let Some(marker) = cell_span(cell) else {
                continue;
            };
            if marker.suppressed {
                continue;
            }
            let Some(prev) = prev_cells.get_mut(idx).and_then(cell_span) else {
                continue;
            };
            if prev.suppressed {
                continue;
            }
            prev.rowspan = add_span(prev.rowspan, marker.rowspan, "rowspan")?;
            marker.suppressed = true;
            tracing::trace!(row = row_idx, column = idx, rowspan = prev.rowspan, "merged row marker");
        }
    }
    Ok(())
}

fn is_marker(cell: &Node, marker: &str) -> bool {
    matches!(cell, Node::TableCell { .. }) && cell.leading_text() == Some(marker)
}

fn cell_span(node: &mut Node) -> Option<&mut CellSpan> {
    match node {
        Node::TableCell { span, .. } => Some(span),
        _ => None,
    }
}
