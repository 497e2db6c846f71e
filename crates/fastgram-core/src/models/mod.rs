//! Data models for FastGram accounts.
//!
//! Only the identity shapes the session layer needs are modeled here:
//!
//! - `User`: the signed-in account
//! - `PublicUser`: another account's public profile
//! - `ProfileUpdate`: partial profile edits

pub mod user;

pub use user::{ProfileUpdate, PublicUser, User};
