use log::{debug, warn};
use russh_sftp::protocol::{Data, Status, StatusCode};

use crate::backend::{BackendFile, FileBackend};
use crate::sftp::{SftpSession, session::ok_status};

pub async fn handle_read<B: FileBackend>(
    session: &mut SftpSession<B>,
    id: u32,
    handle: String,
    offset: u64,
    len: u32,
) -> Result<Data, StatusCode> {
    debug!(
        "read handle: {}, offset: {}, requested len: {}",
        handle, offset, len
    );

    let Some(open_file) = session.state.open_files.get_mut(&handle) else {
        warn!("Invalid file handle for read: {}", handle);
        return Err(StatusCode::BadMessage);
    };

    let data = open_file.read(offset, len).await.map_err(|e| {
        warn!("Failed to read from handle {}: {}", handle, e);
        StatusCode::from(e)
    })?;

    if data.is_empty() {
        debug!("End of file reached for handle: {}", handle);
        return Err(StatusCode::Eof);
    }

    Ok(Data { id, data })
}

pub async fn handle_write<B: FileBackend>(
    session: &mut SftpSession<B>,
    id: u32,
    handle: String,
    offset: u64,
    data: Vec<u8>,
) -> Result<Status, StatusCode> {
    debug!(
        "write handle: {}, offset: {}, data len: {}",
        handle,
        offset,
        data.len()
    );

    let Some(open_file) = session.state.open_files.get_mut(&handle) else {
        warn!("Invalid file handle for write: {}", handle);
        return Err(StatusCode::BadMessage);
    };

    open_file.write(offset, &data).await.map_err(|e| {
        warn!("Failed to write to handle {}: {}", handle, e);
        StatusCode::from(e)
    })?;

    Ok(ok_status(id))
}
