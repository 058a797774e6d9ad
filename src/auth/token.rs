//! Token values and the unverified payload codec.

pub mod claims;
pub mod credential;
pub mod secret;
