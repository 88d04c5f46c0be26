//! HTTP request handlers.

pub mod fronts;
pub mod groups;
pub mod health;

use std::str::FromStr;

use crate::error::ApiError;

/// Parse a path segment, turning failures into `400 Bad Request`.
fn parse_path<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid {what} '{raw}': {e}")))
}
