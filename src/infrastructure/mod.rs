//! Adapters behind the domain ports.

pub mod argon2_pin;
pub mod in_memory;
pub mod notifications;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
