//! hostforge-core: shared building blocks
//!
//! Retry policy, the operator session context, and resource naming rules
//! used by the other hostforge crates.

pub mod error;
pub mod naming;
pub mod retry;
pub mod session;

pub use error::CoreError;
pub use naming::{derive_resource_name, is_valid_server_name, validate_server_name};
pub use retry::RetryPolicy;
pub use session::ApiSession;
