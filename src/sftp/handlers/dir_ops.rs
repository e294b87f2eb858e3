use log::{debug, warn};
use russh_sftp::protocol::{Name, StatusCode};

use crate::backend::{BackendDir, FileBackend};
use crate::sftp::SftpSession;

/// Voci restituite per ogni risposta READDIR.
pub const READDIR_BATCH: usize = 10;

pub async fn handle_readdir<B: FileBackend>(
    session: &mut SftpSession<B>,
    id: u32,
    handle: String,
) -> Result<Name, StatusCode> {
    debug!("readdir handle: {}", handle);

    let Some(dir) = session.state.open_dirs.get_mut(&handle) else {
        warn!("Invalid directory handle: {}", handle);
        return Err(StatusCode::BadMessage);
    };

    let files = dir.next_batch(READDIR_BATCH).await.map_err(|e| {
        warn!("Failed to read directory {}: {}", handle, e);
        StatusCode::from(e)
    })?;

    if files.is_empty() {
        return Err(StatusCode::Eof);
    }
    Ok(Name { id, files })
}
