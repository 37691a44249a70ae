//! Protocol module for decoding sensor payloads.
//!
//! Tire sensors notify a compact binary reading. The layout is described by
//! a versioned [`PayloadSchema`] rather than inline offsets.

pub mod reading;

pub use reading::{ClampRange, FieldKind, FieldSpec, PayloadSchema, TireReading};
