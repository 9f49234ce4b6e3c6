use std::cell::{RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::error::{NodeKind, StateError};

thread_local! {
    // Nodes currently being formatted; lets `Debug` print cycles as `[Circular]`.
    static FORMATTING: RefCell<Vec<*const ()>> = const { RefCell::new(Vec::new()) };
}

/// Address of a property: a field name on objects, a position on arrays.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Field(String),
    Index(usize),
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Field(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Field(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Field(s.clone())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Plain state data.
///
/// `PartialEq` is the identity comparison used for change detection:
/// primitives compare by value, `Object` and `Array` compare by node identity.
/// Use [`Value::deep_eq`] for structural comparison.
#[derive(Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(Object),
    Array(Array),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Structural equality. Cyclic graphs are compared coinductively.
    pub fn deep_eq(&self, other: &Value) -> bool {
        deep_eq_inner(self, other, &mut HashSet::new())
    }
}

fn deep_eq_inner(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.addr(), y.addr())) {
                return true;
            }
            let xs = x.entries();
            let ys = y.entries();
            xs.len() == ys.len()
                && xs.iter().zip(ys.iter()).all(|((kx, vx), (ky, vy))| {
                    kx == ky && deep_eq_inner(vx, vy, seen)
                })
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.addr(), y.addr())) {
                return true;
            }
            let xs = x.items();
            let ys = y.items();
            xs.len() == ys.len()
                && xs.iter().zip(ys.iter()).all(|pair| match pair {
                    (Some(vx), Some(vy)) => deep_eq_inner(vx, vy, seen),
                    (None, None) => true,
                    _ => false,
                })
        }
        _ => a == b,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(o) => o.fmt(f),
            Value::Array(a) => a.fmt(f),
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Node> for Value {
    fn from(n: Node) -> Self {
        match n {
            Node::Object(o) => Value::Object(o),
            Node::Array(a) => Value::Array(a),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(Array::from(v))
    }
}

fn with_cycle_guard(
    ptr: *const (),
    f: &mut fmt::Formatter<'_>,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    if FORMATTING.with(|s| s.borrow().contains(&ptr)) {
        return f.write_str("[Circular]");
    }
    FORMATTING.with(|s| s.borrow_mut().push(ptr));
    let res = body(f);
    FORMATTING.with(|s| {
        s.borrow_mut().pop();
    });
    res
}

#[derive(Default)]
struct ObjectData {
    // insertion order is enumeration order
    fields: Vec<(String, Value)>,
    frozen: bool,
}

impl ObjectData {
    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(k, _)| k == name)
    }
}

/// Shared handle to a string-keyed map node.
///
/// Cloning aliases the node. Outside this crate a node can only be built and
/// read; writes go through [`crate::Observed`].
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let data = self.0.borrow();
        data.position(name).map(|i| data.fields[i].1.clone())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.borrow().position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().fields.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of the fields in enumeration order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.borrow().fields.clone()
    }

    /// Shallow freeze: later writes and deletes on this node fail.
    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Returns the previous value, `None` if the field was absent.
    pub(crate) fn insert(&self, name: String, value: Value) -> Result<Option<Value>, StateError> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(StateError::Frozen(NodeKind::Object));
        }
        match data.position(&name) {
            Some(i) => Ok(Some(std::mem::replace(&mut data.fields[i].1, value))),
            None => {
                data.fields.push((name, value));
                Ok(None)
            }
        }
    }

    pub(crate) fn remove(&self, name: &str) -> Result<Option<Value>, StateError> {
        let mut data = self.0.borrow_mut();
        if data.frozen {
            return Err(StateError::Frozen(NodeKind::Object));
        }
        Ok(data.position(name).map(|i| data.fields.remove(i).1))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = ObjectData::default();
        for (k, v) in iter {
            let k = k.into();
            let v = v.into();
            match data.position(&k) {
                Some(i) => data.fields[i].1 = v,
                None => data.fields.push((k, v)),
            }
        }
        Object(Rc::new(RefCell::new(data)))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_cycle_guard(self.addr() as *const (), f, |f| {
            let data = self.0.borrow();
            f.debug_map()
                .entries(data.fields.iter().map(|(k, v)| (k, v)))
                .finish()
        })
    }
}

/// Longest array a write may produce. Growth is eager, so the bound is kept
/// well below what an allocation could serve.
pub const MAX_ARRAY_LEN: usize = 1 << 20;

#[derive(Default)]
struct ArrayData {
    // `None` is a hole: counted in the length, absent as a property
    slots: Vec<Option<Value>>,
    frozen: bool,
}

/// Shared handle to an ordered sequence node.
///
/// Deleting an element, or writing past the end, leaves holes: positions
/// that count towards `len` but hold no value.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<ArrayData>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` past the end and for holes.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().slots.get(index).cloned().flatten()
    }

    pub fn contains(&self, index: usize) -> bool {
        matches!(self.0.borrow().slots.get(index), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices that hold a value, in order.
    pub fn indices(&self) -> Vec<usize> {
        self.0
            .borrow()
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
            .collect()
    }

    /// Snapshot of the positions; holes are `None`.
    pub fn items(&self) -> Vec<Option<Value>> {
        self.0.borrow().slots.clone()
    }

    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    fn writable(&self) -> Result<RefMut<'_, ArrayData>, StateError> {
        let data = self.0.borrow_mut();
        if data.frozen {
            return Err(StateError::Frozen(NodeKind::Array));
        }
        Ok(data)
    }

    fn check_len(requested: usize) -> Result<(), StateError> {
        if requested > MAX_ARRAY_LEN {
            return Err(StateError::ArrayLimit {
                requested,
                max: MAX_ARRAY_LEN,
            });
        }
        Ok(())
    }

    /// Returns the previous value, `None` if the position was a hole or past
    /// the end. Writing past the end grows the array with holes.
    pub(crate) fn set(&self, index: usize, value: Value) -> Result<Option<Value>, StateError> {
        let mut data = self.writable()?;
        if index < data.slots.len() {
            return Ok(data.slots[index].replace(value));
        }
        Self::check_len(index.saturating_add(1))?;
        data.slots.resize(index, None);
        data.slots.push(Some(value));
        Ok(None)
    }

    /// Turns the position into a hole; the length never changes.
    pub(crate) fn remove(&self, index: usize) -> Result<Option<Value>, StateError> {
        let mut data = self.writable()?;
        Ok(data.slots.get_mut(index).and_then(Option::take))
    }

    pub(crate) fn push(&self, value: Value) -> Result<(), StateError> {
        let mut data = self.writable()?;
        Self::check_len(data.slots.len().saturating_add(1))?;
        data.slots.push(Some(value));
        Ok(())
    }

    /// Outer `None` when empty; inner `None` when the last position was a hole.
    pub(crate) fn pop(&self) -> Result<Option<Option<Value>>, StateError> {
        Ok(self.writable()?.slots.pop())
    }

    /// Truncates, or grows with holes. Returns the previous length.
    pub(crate) fn resize(&self, len: usize) -> Result<usize, StateError> {
        let mut data = self.writable()?;
        Self::check_len(len)?;
        let old = data.slots.len();
        data.slots.resize(len, None);
        Ok(old)
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Array {
    fn from(v: Vec<T>) -> Self {
        v.into_iter().collect()
    }
}

impl<T: Into<Value>> FromIterator<T> for Array {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Array(Rc::new(RefCell::new(ArrayData {
            slots: iter.into_iter().map(|v| Some(v.into())).collect(),
            frozen: false,
        })))
    }
}

struct Hole;

impl fmt::Debug for Hole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<empty>")
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_cycle_guard(self.addr() as *const (), f, |f| {
            let data = self.0.borrow();
            let mut list = f.debug_list();
            for slot in &data.slots {
                match slot {
                    Some(v) => list.entry(v),
                    None => list.entry(&Hole),
                };
            }
            list.finish()
        })
    }
}

/// A value that can own properties: the root of a model, or any nested
/// object or array reached through it.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Object(Object),
    Array(Array),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Object(_) => NodeKind::Object,
            Node::Array(_) => NodeKind::Array,
        }
    }

    /// `None` for primitives.
    pub fn from_value(value: Value) -> Option<Node> {
        match value {
            Value::Object(o) => Some(Node::Object(o)),
            Value::Array(a) => Some(Node::Array(a)),
            _ => None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        match self {
            Node::Object(o) => o.is_frozen(),
            Node::Array(a) => a.is_frozen(),
        }
    }

    pub fn freeze(&self) {
        match self {
            Node::Object(o) => o.freeze(),
            Node::Array(a) => a.freeze(),
        }
    }
}

impl From<Object> for Node {
    fn from(o: Object) -> Self {
        Node::Object(o)
    }
}

impl From<Array> for Node {
    fn from(a: Array) -> Self {
        Node::Array(a)
    }
}

/// Builds an [`Object`] from `key => value` pairs.
///
/// ```
/// use stateman_core::{object, array};
///
/// let state = object! {
///     "count" => 0,
///     "user" => object! { "name" => "Ada" },
///     "tags" => array!["a", "b"],
/// };
/// assert_eq!(state.len(), 3);
/// ```
#[macro_export]
macro_rules! object {
    () => {
        $crate::Object::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        <$crate::Object as ::core::iter::FromIterator<(::std::string::String, $crate::Value)>>::from_iter([
            $((::std::string::String::from($key), $crate::Value::from($value))),+
        ])
    };
}

/// Builds an [`Array`] from values.
#[macro_export]
macro_rules! array {
    () => {
        $crate::Array::new()
    };
    ($($value:expr),+ $(,)?) => {
        <$crate::Array as ::core::iter::FromIterator<$crate::Value>>::from_iter([
            $($crate::Value::from($value)),+
        ])
    };
}
