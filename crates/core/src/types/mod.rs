//! Core types for Taiwanese House.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coins;
pub mod email;
pub mod id;
pub mod identifier;
pub mod phone;
pub mod price;
pub mod status;

pub use coins::Coins;
pub use email::{Email, EmailError};
pub use id::*;
pub use identifier::{Identifier, IdentifierError};
pub use phone::{PhoneError, PhoneNumber};
pub use price::Price;
pub use status::*;
