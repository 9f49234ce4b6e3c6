use std::fmt;

use crate::value::Key;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Object => "object",
            NodeKind::Array => "array",
        })
    }
}

/// Failure of an underlying read/write/delete. A failed operation leaves the
/// node untouched and sends no change notification.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("cannot modify a frozen {0}")]
    Frozen(NodeKind),
    #[error("key `{key}` cannot address an {kind}")]
    KeyKind { key: Key, kind: NodeKind },
    #[error("`{key}` does not hold an object or array")]
    NotANode { key: Key },
    #[error("operation requires an array, found an {0}")]
    NotAnArray(NodeKind),
    #[error("requested array length {requested} exceeds the limit of {max}")]
    ArrayLimit { requested: usize, max: usize },
    #[error("empty property path")]
    EmptyPath,
}
