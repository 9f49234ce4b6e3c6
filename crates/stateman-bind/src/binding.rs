use std::cell::RefCell;
use std::rc::Rc;

use stateman_core::Controller;

use crate::{current_trigger, disposable_effect, on_unmount, remember};

// Effect key: controllers compare by allocation, not by state.
struct Bound<C>(Rc<C>);

impl<C> Clone for Bound<C> {
    fn clone(&self) -> Self {
        Bound(self.0.clone())
    }
}

impl<C> PartialEq for Bound<C> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Binds `controller` to the component currently rendering.
///
/// Returns the bound controller: the same `Rc` on every render that passes
/// the same controller. While bound, every change notification from the
/// controller's model requests exactly one re-render. Passing a different
/// controller releases the old subscription before subscribing to the new
/// one; unmounting releases the last.
///
/// Outside a component render there is nothing to re-render: the controller
/// is returned unbound.
pub fn use_controller<C: Controller>(controller: &Rc<C>) -> Rc<C> {
    let Some(trigger) = current_trigger() else {
        log::warn!(
            "use_controller: {} used outside a component render; it will not trigger re-renders",
            controller.model().id()
        );
        return controller.clone();
    };

    let slot = remember(|| RefCell::new(controller.clone()));
    let same = Rc::ptr_eq(&slot.borrow(), controller);
    if !same {
        log::debug!(
            "use_controller: rebinding {} -> {}",
            slot.borrow().model().id(),
            controller.model().id()
        );
        *slot.borrow_mut() = controller.clone();
    }
    let bound = slot.borrow().clone();

    disposable_effect(Bound(bound.clone()), {
        let bound = bound.clone();
        move || {
            let id = bound.model().id();
            let sub = bound.model().subscribe(move || trigger.request_render());
            log::debug!("use_controller: {id} bound");
            on_unmount(move || {
                sub.unsubscribe();
                log::debug!("use_controller: {id} released");
            })
        }
    });

    bound
}
