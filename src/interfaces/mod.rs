//! Outer adapters: CSV payment batches and JSON fixtures.

pub mod csv;
pub mod seed;
