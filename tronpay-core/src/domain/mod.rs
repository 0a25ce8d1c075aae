//! Core domain entities
//!
//! Pure data structures with validation logic - no I/O or external dependencies.

mod credential;
pub mod result;
pub mod transaction;

pub use credential::{Credential, AUTH_HEADER};
pub use transaction::{
    Asset, MovementForm, MovementRequest, TransactionId, TransactionKind, TransactionStatus,
};
