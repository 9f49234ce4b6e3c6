use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::scope::Scope;

thread_local! {
    pub(crate) static COMPOSER: RefCell<Composer> = RefCell::new(Composer::default());
    static CURRENT_TRIGGER: RefCell<Option<Rc<dyn RenderTrigger>>> = const { RefCell::new(None) };
}

/// Host hook that schedules one future render pass of a component.
pub trait RenderTrigger: 'static {
    fn request_render(&self);
}

impl<F: Fn() + 'static> RenderTrigger for F {
    fn request_render(&self) {
        self()
    }
}

/// Counting trigger for hosts that poll: each request adds one pending render.
#[derive(Clone, Default)]
pub struct RenderQueue(Rc<Cell<usize>>);

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.0.get()
    }

    /// Returns and clears the pending count.
    pub fn take(&self) -> usize {
        self.0.replace(0)
    }
}

impl RenderTrigger for RenderQueue {
    fn request_render(&self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Slot table of one component instance.
#[derive(Default)]
pub(crate) struct Composer {
    pub(crate) slots: Vec<Box<dyn Any>>,
    pub(crate) cursor: usize,
    pub(crate) keyed_slots: HashMap<String, Box<dyn Any>>,
}

/// One mounted component: its persistent slots, its unmount scope and the
/// trigger that re-renders it.
pub struct Component {
    composer: RefCell<Composer>,
    scope: Scope,
    trigger: Rc<dyn RenderTrigger>,
    renders: Cell<u64>,
}

impl Component {
    pub fn new(trigger: impl RenderTrigger) -> Self {
        Self {
            composer: RefCell::new(Composer::default()),
            scope: Scope::new(),
            trigger: Rc::new(trigger),
            renders: Cell::new(0),
        }
    }

    /// Runs one render pass of `body` with this component's slots, scope
    /// and trigger installed. Nested renders restore the outer component.
    pub fn render<R>(&self, body: impl FnOnce() -> R) -> R {
        let _guard = ComposeGuard::begin(self);
        self.renders.set(self.renders.get() + 1);
        self.scope.run(body)
    }

    pub fn render_count(&self) -> u64 {
        self.renders.get()
    }

    pub fn slot_count(&self) -> usize {
        self.composer.borrow().slots.len()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Runs every cleanup registered while rendering.
    pub fn unmount(self) {
        log::debug!("component unmounted after {} render(s)", self.renders.get());
        self.scope.dispose();
    }
}

struct ComposeGuard<'a> {
    component: &'a Component,
    outer: Option<Composer>,
    outer_trigger: Option<Rc<dyn RenderTrigger>>,
}

impl<'a> ComposeGuard<'a> {
    fn begin(component: &'a Component) -> Self {
        let mut mine = component.composer.take();
        mine.cursor = 0;
        let outer = COMPOSER.with(|c| std::mem::replace(&mut *c.borrow_mut(), mine));
        let outer_trigger =
            CURRENT_TRIGGER.with(|t| t.replace(Some(component.trigger.clone())));
        ComposeGuard {
            component,
            outer: Some(outer),
            outer_trigger,
        }
    }
}

impl Drop for ComposeGuard<'_> {
    fn drop(&mut self) {
        let outer = self.outer.take().unwrap_or_default();
        let mine = COMPOSER.with(|c| std::mem::replace(&mut *c.borrow_mut(), outer));
        *self.component.composer.borrow_mut() = mine;
        let outer_trigger = self.outer_trigger.take();
        CURRENT_TRIGGER.with(|t| *t.borrow_mut() = outer_trigger);
    }
}

/// Trigger of the component currently rendering, if any.
pub fn current_trigger() -> Option<Rc<dyn RenderTrigger>> {
    CURRENT_TRIGGER.with(|t| t.borrow().clone())
}

/// Slot-based remember: the Nth call in a render gets the Nth slot.
pub fn remember<T: 'static>(init: impl FnOnce() -> T) -> Rc<T> {
    let cursor = COMPOSER.with(|c| {
        let mut c = c.borrow_mut();
        let cursor = c.cursor;
        c.cursor += 1;
        cursor
    });

    let existing = COMPOSER.with(|c| {
        c.borrow()
            .slots
            .get(cursor)
            .map(|slot| slot.downcast_ref::<Rc<T>>().cloned())
    });
    match existing {
        Some(Some(rc)) => return rc,
        Some(None) => log::warn!(
            "remember: slot {} type changed; replacing. \
             If this is due to conditional composition, prefer remember_with_key.",
            cursor
        ),
        None => {}
    }

    // init may itself render; keep the table unborrowed while it runs
    let rc: Rc<T> = Rc::new(init());
    COMPOSER.with(|c| {
        let mut c = c.borrow_mut();
        if cursor < c.slots.len() {
            c.slots[cursor] = Box::new(rc.clone());
        } else {
            c.slots.push(Box::new(rc.clone()));
        }
    });
    rc
}

/// Key-based remember
pub fn remember_with_key<T: 'static>(key: impl Into<String>, init: impl FnOnce() -> T) -> Rc<T> {
    let key = key.into();
    let existing = COMPOSER.with(|c| {
        c.borrow()
            .keyed_slots
            .get(&key)
            .map(|slot| slot.downcast_ref::<Rc<T>>().cloned())
    });
    match existing {
        Some(Some(rc)) => return rc,
        Some(None) => log::warn!(
            "remember_with_key: key '{}' reused with a different type; replacing.",
            key
        ),
        None => {}
    }

    let rc: Rc<T> = Rc::new(init());
    COMPOSER.with(|c| {
        c.borrow_mut().keyed_slots.insert(key, Box::new(rc.clone()));
    });
    rc
}

pub fn remember_state<T: 'static>(init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
    remember(|| RefCell::new(init()))
}
