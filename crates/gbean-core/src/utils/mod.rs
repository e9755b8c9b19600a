//! # GBean Core Utilities
//!
//! Small helpers shared by the kernel subsystems.
//!
//! - **[`sync`]**: lock acquisition that recovers from poisoning. Every
//!   guarded structure in this crate only commits its changes at the end of
//!   an operation, so the data behind a poisoned lock is still consistent.
pub mod sync;

pub use sync::{lock, read, write};
