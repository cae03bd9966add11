//! Server-side models that are not part of the public domain crate.

pub mod session;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
