mod authenticator;
mod client;
pub mod models;

pub use authenticator::PasswordAuthenticator;
pub use client::{ActaClient, Error, Result};
