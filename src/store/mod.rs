//! Global application store.
//!
//! A pure [`reduce`] function over [`AppState`], driven by a single actor
//! task ([`Store`]) so concurrent writers can never lose each other's updates.

pub mod accessors;
pub mod actor;
pub mod state;

pub use accessors::{all_tire_data, selected_vehicle, tire_data, vehicle};
pub use actor::{Store, StoreHandle};
pub use state::{reduce, Action, AppState};
