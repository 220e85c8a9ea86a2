//! # System Module
//!
//! The review ladder: stage names, successor table and dwell times.
//!
//! Everything here is pure data and pure functions; the scheduler and the
//! progression service build on top of it.

mod stage;

pub use stage::*;
