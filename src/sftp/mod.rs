pub mod handlers;
pub mod session;
pub mod session_state;

pub use session::SftpSession;
pub use session_state::*;

/// Nome con cui il client richiede il sottosistema.
pub const SFTP_SUBSYSTEM: &str = "sftp";
