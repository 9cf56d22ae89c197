//! Data transfer objects for the HTTP surface.

mod error;

pub use error::ErrorResponse;
