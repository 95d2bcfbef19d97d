//! Application layer
//!
//! Wires storage, stores and services into a running memory system.

mod memory;

pub use memory::MemorySystem;
