use std::cell::Cell;
use std::fmt;

use crate::observe::Observed;
use crate::sink::{ChangeSink, PanicPolicy, Subscription};
use crate::value::Node;

thread_local! {
    static NEXT_MODEL: Cell<u64> = const { Cell::new(1) };
}

/// Per-thread unique identity of a [`Model`], used in log output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

impl ModelId {
    fn next() -> Self {
        NEXT_MODEL.with(|n| {
            let id = n.get();
            n.set(id + 1);
            ModelId(id)
        })
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Observable container owning one state tree.
///
/// Mutate through [`Model::state`]; every change reaches the listeners
/// registered with [`Model::subscribe`].
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use stateman_core::{Model, object};
///
/// let model = Model::new(object! { "count" => 0 });
/// let hits = Rc::new(Cell::new(0));
/// let sub = model.subscribe({
///     let hits = hits.clone();
///     move || hits.set(hits.get() + 1)
/// });
///
/// model.state().set("count", 1).unwrap();
/// model.state().set("count", 1).unwrap(); // unchanged: silent
/// assert_eq!(hits.get(), 1);
///
/// sub.unsubscribe();
/// model.state().set("count", 2).unwrap();
/// assert_eq!(hits.get(), 1);
/// ```
pub struct Model {
    id: ModelId,
    sink: ChangeSink,
    state: Observed,
}

impl Model {
    pub fn new(initial: impl Into<Node>) -> Self {
        Self::with_policy(initial, PanicPolicy::default())
    }

    pub fn with_policy(initial: impl Into<Node>, policy: PanicPolicy) -> Self {
        let id = ModelId::next();
        let sink = ChangeSink::new(id, policy);
        let state = Observed::new(initial.into(), sink.clone());
        log::debug!("{id}: created ({} root, {policy:?})", state.kind());
        Self { id, sink, state }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    /// The root view; the same instance for the life of the model.
    pub fn state(&self) -> &Observed {
        &self.state
    }

    pub fn subscribe(&self, f: impl Fn() + 'static) -> Subscription {
        self.sink.subscribe(f)
    }

    pub fn listener_count(&self) -> usize {
        self.sink.listener_count()
    }

    pub fn policy(&self) -> PanicPolicy {
        self.sink.policy()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("listeners", &self.listener_count())
            .field("state", &self.state)
            .finish()
    }
}

/// Anything that owns a [`Model`]. Application controllers hold a model and
/// add methods that mutate `self.model().state()`.
pub trait Controller: 'static {
    fn model(&self) -> &Model;
}

impl Controller for Model {
    fn model(&self) -> &Model {
        self
    }
}
