use std::collections::HashMap;
use std::net::SocketAddr;

use log::{debug, error, info, warn};
use russh_sftp::protocol::{
    Attrs, Data, File, FileAttributes, Handle, Name, OpenFlags, Status, StatusCode, Version,
};

use crate::backend::{BackendFile, FileBackend};

use super::{SessionState, handlers};

/// Sottosistema SFTP di una sessione, legato a un solo backend per tutta la sua durata.
pub struct SftpSession<B: FileBackend> {
    pub(crate) state: SessionState<B::File, B::Dir>,
    pub(crate) backend: B,
    peer: SocketAddr,
}

impl<B: FileBackend> SftpSession<B> {
    pub fn new(backend: B, peer: SocketAddr) -> Self {
        Self {
            state: SessionState::new(),
            backend,
            peer,
        }
    }
}

pub(crate) fn ok_status(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".to_string(),
        language_tag: "en-US".to_string(),
    }
}

impl<B: FileBackend> russh_sftp::server::Handler for SftpSession<B> {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    async fn init(
        &mut self,
        version: u32,
        extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        if self.state.version.is_some() {
            error!("{}: duplicate SSH_FXP_INIT packet", self.peer);
            return Err(StatusCode::ConnectionLost);
        }

        self.state.version = Some(version);
        info!(
            "{}: sftp version: {}, extensions: {:?}",
            self.peer, version, extensions
        );
        Ok(Version::new())
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        debug!("close handle: {}", handle);

        if self.state.open_files.remove(&handle).is_none()
            && self.state.open_dirs.remove(&handle).is_none()
        {
            warn!("Close of unknown handle: {}", handle);
            return Err(StatusCode::BadMessage);
        }

        Ok(ok_status(id))
    }

    async fn opendir(&mut self, id: u32, path: String) -> Result<Handle, Self::Error> {
        debug!("opendir: {}", path);

        let dir = self.backend.open_dir(&path).await.map_err(|e| {
            warn!("Failed to open directory {}: {}", path, e);
            StatusCode::from(e)
        })?;

        let handle = self.state.next_handle();
        self.state.open_dirs.insert(handle.clone(), dir);
        Ok(Handle { id, handle })
    }

    async fn readdir(&mut self, id: u32, handle: String) -> Result<Name, Self::Error> {
        handlers::dir_ops::handle_readdir(self, id, handle).await
    }

    async fn realpath(&mut self, id: u32, path: String) -> Result<Name, Self::Error> {
        debug!("realpath: {}", path);

        let resolved = self.backend.realpath(&path).await?;
        Ok(Name {
            id,
            files: vec![File::dummy(&resolved)],
        })
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        attrs: FileAttributes,
    ) -> Result<Handle, Self::Error> {
        debug!("open file: {} with flags: {:?}", filename, pflags);

        let file = self
            .backend
            .open(&filename, pflags, attrs)
            .await
            .map_err(|e| {
                warn!("Failed to open {}: {}", filename, e);
                StatusCode::from(e)
            })?;

        let handle = self.state.next_handle();
        self.state.open_files.insert(handle.clone(), file);
        Ok(Handle { id, handle })
    }

    async fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> Result<Data, Self::Error> {
        handlers::file_ops::handle_read(self, id, handle, offset, len).await
    }

    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        handlers::file_ops::handle_write(self, id, handle, offset, data).await
    }

    async fn stat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        debug!("stat: {}", path);
        let attrs = self.backend.stat(&path).await?;
        Ok(Attrs { id, attrs })
    }

    async fn lstat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        debug!("lstat: {}", path);
        let attrs = self.backend.lstat(&path).await?;
        Ok(Attrs { id, attrs })
    }

    async fn fstat(&mut self, id: u32, handle: String) -> Result<Attrs, Self::Error> {
        debug!("fstat handle: {}", handle);

        let Some(open_file) = self.state.open_files.get_mut(&handle) else {
            warn!("Invalid file handle for fstat: {}", handle);
            return Err(StatusCode::BadMessage);
        };

        let attrs = open_file.stat().await?;
        Ok(Attrs { id, attrs })
    }

    async fn setstat(
        &mut self,
        id: u32,
        path: String,
        attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        debug!("setstat: {}", path);
        self.backend.setstat(&path, attrs).await?;
        Ok(ok_status(id))
    }

    async fn remove(&mut self, id: u32, filename: String) -> Result<Status, Self::Error> {
        self.backend.remove(&filename).await?;
        Ok(ok_status(id))
    }

    async fn mkdir(
        &mut self,
        id: u32,
        path: String,
        attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        self.backend.mkdir(&path, attrs).await?;
        Ok(ok_status(id))
    }

    async fn rmdir(&mut self, id: u32, path: String) -> Result<Status, Self::Error> {
        self.backend.rmdir(&path).await?;
        Ok(ok_status(id))
    }

    async fn rename(
        &mut self,
        id: u32,
        oldpath: String,
        newpath: String,
    ) -> Result<Status, Self::Error> {
        self.backend.rename(&oldpath, &newpath).await?;
        Ok(ok_status(id))
    }

    async fn readlink(&mut self, id: u32, path: String) -> Result<Name, Self::Error> {
        let target = self.backend.readlink(&path).await?;
        Ok(Name {
            id,
            files: vec![File::dummy(&target)],
        })
    }

    async fn symlink(
        &mut self,
        id: u32,
        linkpath: String,
        targetpath: String,
    ) -> Result<Status, Self::Error> {
        self.backend.symlink(&linkpath, &targetpath).await?;
        Ok(ok_status(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendFactory, LocalDirFactory};
    use russh_sftp::server::Handler;

    fn session() -> (tempfile::TempDir, SftpSession<crate::backend::LocalDirBackend>) {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..15 {
            std::fs::write(dir.path().join(format!("f{:02}", i)), b"x").unwrap();
        }
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let backend = LocalDirFactory::new(dir.path(), 1024)
            .unwrap()
            .create(peer)
            .unwrap();
        (dir, SftpSession::new(backend, peer))
    }

    #[tokio::test]
    async fn second_init_is_rejected() {
        let (_dir, mut sftp) = session();
        assert!(sftp.init(3, HashMap::new()).await.is_ok());
        assert!(matches!(
            sftp.init(3, HashMap::new()).await,
            Err(StatusCode::ConnectionLost)
        ));
    }

    #[tokio::test]
    async fn readdir_pages_then_reports_eof() {
        let (_dir, mut sftp) = session();
        let handle = sftp.opendir(1, "/".into()).await.unwrap().handle;

        let first = sftp.readdir(2, handle.clone()).await.unwrap();
        assert_eq!(first.files.len(), 10);
        let second = sftp.readdir(3, handle.clone()).await.unwrap();
        assert_eq!(second.files.len(), 5);
        assert!(matches!(
            sftp.readdir(4, handle.clone()).await,
            Err(StatusCode::Eof)
        ));

        assert_eq!(sftp.close(5, handle.clone()).await.unwrap().id, 5);
        assert!(matches!(
            sftp.close(6, handle).await,
            Err(StatusCode::BadMessage)
        ));
    }

    #[tokio::test]
    async fn read_until_eof_through_handles() {
        let (_dir, mut sftp) = session();
        let handle = sftp
            .open(1, "/f00".into(), OpenFlags::READ, FileAttributes::default())
            .await
            .unwrap()
            .handle;

        let data = sftp.read(2, handle.clone(), 0, 64).await.unwrap();
        assert_eq!(data.data, b"x");
        assert!(matches!(
            sftp.read(3, handle.clone(), 1, 64).await,
            Err(StatusCode::Eof)
        ));
        assert_eq!(sftp.fstat(4, handle).await.unwrap().attrs.size, Some(1));
    }

    #[tokio::test]
    async fn unknown_handles_are_bad_messages() {
        let (_dir, mut sftp) = session();
        assert!(matches!(
            sftp.read(1, "handle_99".into(), 0, 1).await,
            Err(StatusCode::BadMessage)
        ));
        assert!(matches!(
            sftp.write(2, "handle_99".into(), 0, vec![1]).await,
            Err(StatusCode::BadMessage)
        ));
    }

    #[tokio::test]
    async fn missing_files_map_to_no_such_file() {
        let (_dir, mut sftp) = session();
        assert!(matches!(
            sftp.stat(1, "/missing".into()).await,
            Err(StatusCode::NoSuchFile)
        ));
        assert!(matches!(
            sftp.opendir(2, "/missing".into()).await,
            Err(StatusCode::NoSuchFile)
        ));
    }

    #[tokio::test]
    async fn realpath_returns_virtual_path() {
        let (_dir, mut sftp) = session();
        let name = sftp.realpath(1, "a/b/..".into()).await.unwrap();
        assert_eq!(name.files[0].filename, "/a");
    }
}
