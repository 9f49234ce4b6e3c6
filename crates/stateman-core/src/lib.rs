//! # Models, Observed State, and Subscriptions
//!
//! Stateman keeps application state in a plain data tree and tells
//! interested parties when it changes. There are three main pieces:
//!
//! - `Value` / `Object` / `Array` — the plain data tree.
//! - `Observed` — a view over an object or array that intercepts writes.
//! - `Model` — owns one state tree plus the listeners interested in it.
//!
//! ## Mutating state
//!
//! State is mutated in place through the model's root view. A write notifies
//! only when the stored value actually changes; a delete always notifies:
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use stateman_core::*;
//!
//! let model = Model::new(object! { "count" => 0 });
//! let calls = Rc::new(Cell::new(0));
//! let _sub = model.subscribe({
//!     let calls = calls.clone();
//!     move || calls.set(calls.get() + 1)
//! });
//!
//! model.state().set("count", 1)?;   // changed: 1 call
//! model.state().set("count", 1)?;   // same value: silent
//! model.state().delete("count")?;   // deletes always notify
//! assert_eq!(calls.get(), 2);
//! # Ok::<(), StateError>(())
//! ```
//!
//! ## Nested data
//!
//! Nested objects and arrays are wrapped on access with `child`. The child
//! view shares the model's listeners, so a nested write is one notification,
//! same as a top-level one:
//!
//! ```rust
//! use stateman_core::*;
//!
//! let model = Model::new(object! {
//!     "user" => object! { "name" => "Ada" },
//!     "todos" => array![],
//! });
//!
//! model.state().child("user").unwrap().set("name", "Grace")?;
//! model.state().child("todos").unwrap().push("write docs")?;
//! model.state().set_path(["user", "name"], "Barbara")?;
//! # Ok::<(), StateError>(())
//! ```
//!
//! Equality is by identity: primitives compare by value, objects and arrays by
//! node. Assigning a fresh-but-identical object is a change.
//!
//! ## Controllers
//!
//! Application logic lives in types that own a `Model` and implement
//! [`Controller`]; `stateman-bind` uses that trait to tie a controller to a
//! component's re-render.

pub mod async_result;
pub mod error;
pub mod model;
pub mod observe;
pub mod sink;
pub mod value;

mod tests;

pub use async_result::*;
pub use error::*;
pub use model::*;
pub use observe::*;
pub use sink::*;
pub use value::*;
