//! Socialite Common Library
//!
//! Shared identifiers, the opaque payload type, and the error type used by the
//! graph, content and feed services.

pub mod error;
pub mod models;
pub mod telemetry;

pub use error::{Result, SocialError};
pub use models::{ContentId, Payload, UserId};
