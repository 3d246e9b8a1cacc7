//! Built-in agents.
//!
//! Each agent is a self-contained module implementing the `Agent` trait.
//! To add one: create the file, add `pub mod <name>;` here, and register it
//! in `standard_registry()`.

pub mod aegis;
pub mod juno;
pub mod lyra;
pub mod mirra;

pub use aegis::Aegis;
pub use juno::Juno;
pub use lyra::Lyra;
pub use mirra::Mirra;
