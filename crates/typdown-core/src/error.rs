use thiserror::Error;

/// Contract violations by whatever produced the tree.
///
/// These abort the whole call. Everything a document author can cause
/// (dangling references, malformed attribute blocks) degrades to output
/// plus a [`Diagnostic`](crate::Diagnostic) instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("expected a `root` node, found `{found}`")]
    NotRoot { found: &'static str },

    #[error("`root` node nested inside the document")]
    NestedRoot,

    #[error("`{kind}` node outside of a table")]
    OutsideTable { kind: &'static str },

    #[error("`listItem` node outside of a list")]
    OutsideList,

    #[error("`tableCell` has a {axis} of zero")]
    ZeroSpan { axis: &'static str },

    #[error("{axis} overflows while merging table cells")]
    SpanOverflow { axis: &'static str },

    #[error("`{parent}` node contains `{found}`, expected `{expected}`")]
    UnexpectedChild {
        parent: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
