use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::model::ModelId;

new_key_type! {
    pub struct ListenerKey;
}

/// What a notification does when a listener panics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Log the panic and keep delivering to the remaining listeners.
    #[default]
    Isolate,
    /// Let the panic unwind out of the mutating call; later listeners miss
    /// this notification.
    Propagate,
}

type Listener = Rc<dyn Fn()>;

struct SinkInner {
    owner: ModelId,
    policy: PanicPolicy,
    listeners: RefCell<SlotMap<ListenerKey, Listener>>,
}

/// Per-model registry that fans a payload-free "changed" event out to
/// listeners.
#[derive(Clone)]
pub struct ChangeSink {
    inner: Rc<SinkInner>,
}

impl ChangeSink {
    pub fn new(owner: ModelId, policy: PanicPolicy) -> Self {
        Self {
            inner: Rc::new(SinkInner {
                owner,
                policy,
                listeners: RefCell::new(SlotMap::with_key()),
            }),
        }
    }

    /// Every call is an independent registration, even for the same
    /// callback; the returned handle removes only its own.
    pub fn subscribe(&self, f: impl Fn() + 'static) -> Subscription {
        let key = self.inner.listeners.borrow_mut().insert(Rc::new(f));
        log::debug!("{}: listener {:?} subscribed", self.inner.owner, key);
        Subscription {
            sink: Rc::downgrade(&self.inner),
            key,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    pub fn policy(&self) -> PanicPolicy {
        self.inner.policy
    }

    /// Delivers one change event to every listener registered at call time.
    pub fn notify(&self) {
        // Snapshot so listeners may (un)subscribe or mutate while we iterate.
        let snapshot: SmallVec<[Listener; 4]> =
            self.inner.listeners.borrow().values().cloned().collect();
        log::trace!(
            "{}: change -> {} listener(s)",
            self.inner.owner,
            snapshot.len()
        );

        for listener in snapshot {
            match self.inner.policy {
                PanicPolicy::Propagate => listener(),
                PanicPolicy::Isolate => {
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener())) {
                        log::error!(
                            "{}: listener panicked: {}",
                            self.inner.owner,
                            panic_message(payload.as_ref())
                        );
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping it keeps the listener registered; call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    sink: Weak<SinkInner>,
    key: ListenerKey,
}

impl Subscription {
    /// Removes this registration. Safe to call any number of times, and after
    /// the owning model is gone.
    pub fn unsubscribe(&self) {
        let Some(inner) = self.sink.upgrade() else {
            return;
        };
        let removed = inner.listeners.borrow_mut().remove(self.key);
        if removed.is_some() {
            log::debug!("{}: listener {:?} unsubscribed", inner.owner, self.key);
        }
    }

    pub fn is_active(&self) -> bool {
        let Some(inner) = self.sink.upgrade() else {
            return false;
        };
        inner.listeners.borrow().contains_key(self.key)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish()
    }
}
