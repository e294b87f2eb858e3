//! Backend delle operazioni sui file servite dal sottosistema SFTP.
//!
//! Il server non interpreta le operazioni: per ogni sessione chiede a un
//! [`BackendFactory`] una nuova istanza di [`FileBackend`] e la lega al
//! canale `sftp` per tutta la durata della sessione.

use std::future::Future;
use std::net::SocketAddr;

use russh_sftp::protocol::{File, FileAttributes, OpenFlags, StatusCode};
use thiserror::Error;

pub mod local;
mod metadata;
mod path_resolver;

pub use local::{LocalDir, LocalDirBackend, LocalDirFactory, LocalFile};

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no such file: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<BackendError> for StatusCode {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(_) => StatusCode::NoSuchFile,
            BackendError::PermissionDenied(_) => StatusCode::PermissionDenied,
            BackendError::Unsupported(_) => StatusCode::OpUnsupported,
            BackendError::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => StatusCode::NoSuchFile,
                std::io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
                _ => StatusCode::Failure,
            },
        }
    }
}

/// File aperto da un backend. Le letture restituiscono un vettore vuoto a fine file.
pub trait BackendFile: Send + 'static {
    fn read(
        &mut self,
        offset: u64,
        len: u32,
    ) -> impl Future<Output = BackendResult<Vec<u8>>> + Send;

    fn write(&mut self, offset: u64, data: &[u8]) -> impl Future<Output = BackendResult<()>> + Send;

    fn stat(&mut self) -> impl Future<Output = BackendResult<FileAttributes>> + Send;
}

/// Directory aperta da un backend, letta a blocchi.
pub trait BackendDir: Send + 'static {
    /// Al piu' `max` voci; un vettore vuoto indica che la directory e' esaurita.
    fn next_batch(&mut self, max: usize) -> impl Future<Output = BackendResult<Vec<File>>> + Send;
}

/// Insieme minimo di operazioni che il sottosistema SFTP invoca.
///
/// I percorsi sono quelli ricevuti dal client; la loro interpretazione
/// (radice, normalizzazione, controlli di accesso) spetta al backend.
pub trait FileBackend: Send + 'static {
    type File: BackendFile;
    type Dir: BackendDir;

    fn open_dir(&mut self, path: &str) -> impl Future<Output = BackendResult<Self::Dir>> + Send;

    fn stat(&mut self, path: &str) -> impl Future<Output = BackendResult<FileAttributes>> + Send;

    /// Come [`FileBackend::stat`] ma senza seguire i link simbolici.
    fn lstat(&mut self, path: &str) -> impl Future<Output = BackendResult<FileAttributes>> + Send;

    fn open(
        &mut self,
        path: &str,
        flags: OpenFlags,
        attrs: FileAttributes,
    ) -> impl Future<Output = BackendResult<Self::File>> + Send;

    fn mkdir(
        &mut self,
        path: &str,
        attrs: FileAttributes,
    ) -> impl Future<Output = BackendResult<()>> + Send;

    fn rmdir(&mut self, path: &str) -> impl Future<Output = BackendResult<()>> + Send;

    fn remove(&mut self, path: &str) -> impl Future<Output = BackendResult<()>> + Send;

    fn rename(&mut self, from: &str, to: &str) -> impl Future<Output = BackendResult<()>> + Send;

    fn realpath(&mut self, path: &str) -> impl Future<Output = BackendResult<String>> + Send;

    fn setstat(
        &mut self,
        _path: &str,
        _attrs: FileAttributes,
    ) -> impl Future<Output = BackendResult<()>> + Send {
        async { Err(BackendError::Unsupported("setstat")) }
    }

    fn readlink(&mut self, _path: &str) -> impl Future<Output = BackendResult<String>> + Send {
        async { Err(BackendError::Unsupported("readlink")) }
    }

    fn symlink(
        &mut self,
        _link: &str,
        _target: &str,
    ) -> impl Future<Output = BackendResult<()>> + Send {
        async { Err(BackendError::Unsupported("symlink")) }
    }
}

/// Crea un backend nuovo per ogni sessione, cosi' le sessioni non condividono stato.
pub trait BackendFactory: Send + Sync + 'static {
    type Backend: FileBackend;

    fn create(&self, peer: SocketAddr) -> BackendResult<Self::Backend>;
}
