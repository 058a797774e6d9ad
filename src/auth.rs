//! Bearer-token domain types: redacted secrets, stored credentials, and decoded claims.

pub mod token;

pub use token::{claims::*, credential::*, secret::*};
