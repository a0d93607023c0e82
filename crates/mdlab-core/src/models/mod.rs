//! Domain models for the MDLAB system.

mod appointment;
mod service;
mod user;

pub use appointment::*;
pub use service::*;
pub use user::*;
