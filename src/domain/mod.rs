//! Domain types and the storage ports the application layer depends on.

pub mod account;
pub mod device;
pub mod fraud;
pub mod geo;
pub mod money;
pub mod notification;
pub mod ports;
pub mod route;
pub mod transaction;
