//! Veritas — doctrinal audit of agent outcomes.
//!
//! The library crates do the work; this package loads case seeds and hosts
//! the `veritas` binary.

pub mod seeds;
