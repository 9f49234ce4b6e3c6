use std::fmt;

use crate::error::{NodeKind, StateError};
use crate::sink::ChangeSink;
use crate::value::{Array, Key, Node, Value};

/// Change-intercepting view over an object or array node.
///
/// Reads behave like reads of the node. Writes that change a stored value,
/// and every successful delete, send one notification on the shared sink.
/// Nested nodes are wrapped on access with [`Observed::child`]; each call
/// returns a new view bound to the same node and sink.
#[derive(Clone)]
pub struct Observed {
    node: Node,
    sink: ChangeSink,
}

impl Observed {
    pub(crate) fn new(node: Node, sink: ChangeSink) -> Self {
        Self { node, sink }
    }

    /// Read-only handle to the underlying node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        match (&self.node, key.into()) {
            (Node::Object(o), Key::Field(name)) => o.get(&name),
            (Node::Array(a), Key::Index(i)) => a.get(i),
            _ => None,
        }
    }

    /// Wraps a nested object or array. `None` for absent keys and primitives.
    pub fn child(&self, key: impl Into<Key>) -> Option<Observed> {
        let node = Node::from_value(self.get(key)?)?;
        Some(Observed::new(node, self.sink.clone()))
    }

    pub fn child_path<K: Into<Key>>(&self, path: impl IntoIterator<Item = K>) -> Option<Observed> {
        path.into_iter()
            .try_fold(self.clone(), |view, key| view.child(key))
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        match (&self.node, key.into()) {
            (Node::Object(o), Key::Field(name)) => o.contains_key(&name),
            (Node::Array(a), Key::Index(i)) => a.contains(i),
            _ => false,
        }
    }

    /// Field names for objects, indices holding a value for arrays.
    pub fn keys(&self) -> Vec<Key> {
        match &self.node {
            Node::Object(o) => o.keys().into_iter().map(Key::Field).collect(),
            Node::Array(a) => a.indices().into_iter().map(Key::Index).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.node {
            Node::Object(o) => o.len(),
            Node::Array(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assigns `value`, notifying if it differs from the stored value.
    ///
    /// Differences use [`Value`]'s identity equality: re-assigning the same
    /// primitive or the same node is silent, a structurally equal but distinct
    /// node is a change. Writing past the end of an array grows it.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), StateError> {
        let value = value.into();
        let previous = match (&self.node, key.into()) {
            (Node::Object(o), Key::Field(name)) => o.insert(name, value.clone())?,
            (Node::Array(a), Key::Index(i)) => a.set(i, value.clone())?,
            (node, key) => {
                return Err(StateError::KeyKind {
                    key,
                    kind: node.kind(),
                });
            }
        };
        if previous.as_ref() != Some(&value) {
            self.sink.notify();
        }
        Ok(())
    }

    /// Removes `key` and always notifies, whether or not it existed.
    /// Returns whether it existed. On arrays the position becomes a hole and
    /// the length is kept.
    pub fn delete(&self, key: impl Into<Key>) -> Result<bool, StateError> {
        let existed = match (&self.node, key.into()) {
            (Node::Object(o), Key::Field(name)) => o.remove(&name)?.is_some(),
            (Node::Array(a), Key::Index(i)) => a.remove(i)?.is_some(),
            (node, key) => {
                return Err(StateError::KeyKind {
                    key,
                    kind: node.kind(),
                });
            }
        };
        self.sink.notify();
        Ok(existed)
    }

    /// `state.a.b = value`: walks to the parent of the last key and sets it.
    pub fn set_path<K: Into<Key>>(
        &self,
        path: impl IntoIterator<Item = K>,
        value: impl Into<Value>,
    ) -> Result<(), StateError> {
        let mut keys: Vec<Key> = path.into_iter().map(Into::into).collect();
        let last = keys.pop().ok_or(StateError::EmptyPath)?;
        let mut parent = self.clone();
        for key in keys {
            parent = parent
                .child(key.clone())
                .ok_or(StateError::NotANode { key })?;
        }
        parent.set(last, value)
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<(), StateError> {
        self.array()?.push(value.into())?;
        self.sink.notify();
        Ok(())
    }

    /// Notifies only when the array shrank. Popping a trailing hole shrinks
    /// the array but yields `None`.
    pub fn pop(&self) -> Result<Option<Value>, StateError> {
        let popped = self.array()?.pop()?;
        if popped.is_some() {
            self.sink.notify();
        }
        Ok(popped.flatten())
    }

    /// Truncates, or grows with holes. Notifies if the length changed.
    pub fn set_len(&self, len: usize) -> Result<(), StateError> {
        let old = self.array()?.resize(len)?;
        if old != len {
            self.sink.notify();
        }
        Ok(())
    }

    /// Identity of this view, not of the node behind it.
    pub fn ptr_eq(&self, other: &Observed) -> bool {
        std::ptr::eq(self, other)
    }

    pub fn same_node(&self, other: &Observed) -> bool {
        self.node == other.node
    }

    fn array(&self) -> Result<&Array, StateError> {
        match &self.node {
            Node::Array(a) => Ok(a),
            node => Err(StateError::NotAnArray(node.kind())),
        }
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observed").field(&self.node).finish()
    }
}
