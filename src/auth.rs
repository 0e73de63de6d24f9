//! Bearer credentials, secret redaction, and the single-flight credential manager.

mod credential;
mod manager;
mod secret;

pub use credential::*;
pub use manager::*;
pub use secret::*;
