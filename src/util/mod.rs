//! Shared helpers.
//!
//! - **URL validation**: the backend URL must be https except on loopback
//! - **Text processing**: unicode-aware width/truncation and label sanitizing
//! - **Relative time**: compact "3h ago" style timestamps for list rows

mod text;
mod time;
mod url_validator;

pub use text::{display_width, sanitize_label, strip_control_chars, truncate_to_width};
pub use time::format_relative_time;
pub use url_validator::{validate_backend_url, validate_redirect_url, UrlValidationError};
