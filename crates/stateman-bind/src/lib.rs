//! # Binding Models to Components
//!
//! A rendering layer needs two things from its host to re-render a component
//! when a model changes: a slot that survives re-renders of the same
//! component instance, and a way to ask for another render. This crate
//! provides both as a small composition runtime:
//!
//! - `Component` — one mounted component: slots, unmount scope, trigger.
//! - `remember*` — persistent per-component slots.
//! - `disposable_effect` — keyed effects with cleanup.
//! - `use_controller` — ties a `Controller` to the rendering component.
//!
//! ```rust
//! use std::rc::Rc;
//! use stateman_bind::*;
//! use stateman_core::{Model, object};
//!
//! let queue = RenderQueue::new();
//! let component = Component::new(queue.clone());
//! let model = Rc::new(Model::new(object! { "count" => 0 }));
//!
//! let render = || {
//!     let model = use_controller(&model);
//!     model.state().get("count")
//! };
//!
//! component.render(render);
//! model.state().set("count", 1).unwrap();
//! assert_eq!(queue.take(), 1);
//!
//! component.render(render);
//! assert_eq!(model.listener_count(), 1);
//!
//! component.unmount();
//! assert_eq!(model.listener_count(), 0);
//! ```

pub mod binding;
pub mod effects;
pub mod runtime;
pub mod scope;


pub use binding::*;
pub use effects::*;
pub use runtime::*;
pub use scope::*;
