//! Repository pattern implementation for data access.
//!
//! This module provides a clean abstraction layer over the database,
//! implementing the Repository pattern to separate scheduling logic from
//! persistence concerns. [`PacketStore`] is the "PacketStore (interface)"
//! collaborator the specification treats as external; two implementations
//! are provided here — a real `sqlx` one and an in-memory one for tests,
//! both enforcing the same uniqueness constraints.

pub mod memory;
pub mod sqlite;
mod traits;

pub use memory::InMemoryPacketStore;
pub use sqlite::SqlitePacketStore;
pub use traits::{NewPacket, PacketOrder, PacketStore};
