//! Core domain entities
//!
//! Pure data structures with validation logic - no I/O.

mod user;
pub mod result;

pub use user::{NewUser, User, UserPatch};
