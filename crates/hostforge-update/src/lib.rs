//! hostforge-update: self-update transaction
//!
//! Version check, artifact download and verification, and the two-process
//! swap: the running binary stages the new artifact and spawns the update
//! agent, which performs the actual file replacement after the parent has
//! exited and relaunches the program.

pub mod agent;
pub mod digest;
pub mod download;
pub mod error;
pub mod transaction;
pub mod version;

pub use agent::{SwapPlan, run_agent};
pub use digest::file_digest;
pub use error::UpdateError;
pub use transaction::{
    NO_UPDATE_FLAG, UPDATE_AGENT_SUBCOMMAND, UpdateConfig, UpdateOutcome, UpdateState,
    UpdateTransaction, run_update_check,
};
pub use version::VersionDescriptor;
