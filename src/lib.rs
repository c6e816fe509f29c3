pub mod api;
pub mod attachment;
pub mod config;
pub mod error;
pub mod macros;
pub mod model;
pub mod resolver;
pub mod sale;
pub mod search;
pub mod session;
pub mod slot;
pub mod status;

pub use error::{Error, ResolutionError, Result, ValidationError};
