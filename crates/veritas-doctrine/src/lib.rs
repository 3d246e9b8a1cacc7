//! Veritas Doctrine — books, invariants, and the Mirror Clause.
//!
//! Doctrine content is supplied by the integrator as `Invariant`s. This crate
//! owns the checking protocol: evaluate an outcome against an immutable
//! doctrine snapshot, stop at the first failing invariant, and turn the
//! failure into a `Contradiction`.

pub mod invariant;
pub mod library;
pub mod mirror;

pub use invariant::{default_invariants, FnInvariant, Invariant, Verdict};
pub use library::{standard_books, Book, BookStatus, DoctrineLibrary, DoctrineSnapshot, DoctrineSource};
pub use mirror::{check, enforce, ClauseRecord, ClauseResult};
