//! hostforge-exec: remote execution over SSH
//!
//! One authenticated session per logical operation: connect (with bounded
//! retries while the host boots), run a command or transfer a file, close.
//! Host-key trust is handled separately by [`hostkeys::HostKeyStore`].

pub mod error;
pub mod hostkeys;
pub mod keys;
pub mod result;
pub mod session;
pub mod traits;

pub use error::ExecError;
pub use hostkeys::{HostKeyStore, SystemKnownHosts};
pub use result::{CommandResult, ConnectionInfo};
pub use session::{RemoteSession, SessionState};
pub use traits::RemoteExecutor;
