use std::io::{self, SeekFrom};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use russh_sftp::protocol::{File, FileAttributes, OpenFlags};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::metadata::MetadataConverter;
use super::path_resolver::{PathResolver, lexical_join, normalize};
use super::{
    BackendDir, BackendError, BackendFactory, BackendFile, BackendResult, FileBackend,
};

/// Crea un [`LocalDirBackend`] per sessione sulla stessa directory radice.
#[derive(Debug, Clone)]
pub struct LocalDirFactory {
    root_dir: PathBuf,
    max_read_size: u32,
}

impl LocalDirFactory {
    /// Canonicalizza la radice; fallisce se non esiste o non e' una directory.
    pub fn new(root_dir: &Path, max_read_size: u32) -> io::Result<Self> {
        let root_dir = root_dir.canonicalize()?;
        if !root_dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root_dir.display()),
            ));
        }

        Ok(Self {
            root_dir,
            max_read_size,
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

impl BackendFactory for LocalDirFactory {
    type Backend = LocalDirBackend;

    fn create(&self, peer: SocketAddr) -> BackendResult<LocalDirBackend> {
        debug!("{}: serving {:?}", peer, self.root_dir);
        Ok(LocalDirBackend {
            resolver: PathResolver::new(self.root_dir.clone()),
            max_read_size: self.max_read_size,
        })
    }
}

/// Backend di prova: espone una directory locale come `/`.
#[derive(Debug)]
pub struct LocalDirBackend {
    resolver: PathResolver,
    max_read_size: u32,
}

#[derive(Debug)]
pub struct LocalFile {
    file: fs::File,
    path: PathBuf,
    max_read_size: u32,
}

impl BackendFile for LocalFile {
    async fn read(&mut self, offset: u64, len: u32) -> BackendResult<Vec<u8>> {
        // Limita la dimensione della lettura al massimo configurato
        let len = len.min(self.max_read_size) as usize;

        self.file.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = vec![0u8; len];
        let bytes_read = self.file.read(&mut buffer).await?;
        buffer.truncate(bytes_read);

        debug!(
            "read {} bytes from {:?} at offset {}",
            bytes_read, self.path, offset
        );
        Ok(buffer)
    }

    async fn write(&mut self, offset: u64, data: &[u8]) -> BackendResult<()> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(data).await?;
        if let Err(e) = self.file.flush().await {
            warn!("Failed to flush {:?}: {}", self.path, e);
        }

        debug!(
            "wrote {} bytes to {:?} at offset {}",
            data.len(),
            self.path,
            offset
        );
        Ok(())
    }

    async fn stat(&mut self) -> BackendResult<FileAttributes> {
        let metadata = self.file.metadata().await?;
        Ok(MetadataConverter::to_file_attributes(&metadata))
    }
}

/// Directory aperta: le voci si leggono dal sistema solo quando richieste.
#[derive(Debug)]
pub struct LocalDir {
    read_dir: fs::ReadDir,
    path: PathBuf,
}

impl LocalDir {
    async fn describe(entry: fs::DirEntry) -> File {
        let filename = entry.file_name().to_string_lossy().into_owned();
        match entry.metadata().await {
            Ok(metadata) => File {
                longname: MetadataConverter::format_longname(&filename, &metadata),
                attrs: MetadataConverter::to_file_attributes(&metadata),
                filename,
            },
            Err(e) => {
                warn!("Failed to get metadata for {}: {}", filename, e);
                // Attributi di default per file regolare rw-r--r--
                let mut attrs = FileAttributes::default();
                attrs.permissions = Some(0o100644);
                File {
                    longname: format!(
                        "-rw-r--r--   1 root  root         0 Jan  1 00:00 {}",
                        filename
                    ),
                    filename,
                    attrs,
                }
            }
        }
    }
}

impl BackendDir for LocalDir {
    async fn next_batch(&mut self, max: usize) -> BackendResult<Vec<File>> {
        let mut files = Vec::new();
        while files.len() < max {
            match self.read_dir.next_entry().await? {
                Some(entry) => files.push(Self::describe(entry).await),
                None => break,
            }
        }

        debug!("read {} entries from {:?}", files.len(), self.path);
        Ok(files)
    }
}

impl FileBackend for LocalDirBackend {
    type File = LocalFile;
    type Dir = LocalDir;

    async fn open_dir(&mut self, path: &str) -> BackendResult<LocalDir> {
        let dir = self.resolver.resolve(path)?;
        let read_dir = fs::read_dir(&dir).await?;
        debug!("opened directory {:?}", dir);
        Ok(LocalDir { read_dir, path: dir })
    }

    async fn stat(&mut self, path: &str) -> BackendResult<FileAttributes> {
        let resolved = self.resolver.resolve(path)?;
        let metadata = fs::metadata(&resolved).await?;
        Ok(MetadataConverter::to_file_attributes(&metadata))
    }

    async fn lstat(&mut self, path: &str) -> BackendResult<FileAttributes> {
        let resolved = self.resolver.resolve_entry(path)?;
        let metadata = fs::symlink_metadata(&resolved).await?;
        Ok(MetadataConverter::to_file_attributes(&metadata))
    }

    async fn open(
        &mut self,
        path: &str,
        flags: OpenFlags,
        attrs: FileAttributes,
    ) -> BackendResult<LocalFile> {
        let resolved = self.resolver.resolve(path)?;

        let is_write = flags.intersects(
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::APPEND,
        );

        let mut options = fs::OpenOptions::new();
        if is_write {
            options
                .read(flags.contains(OpenFlags::READ))
                .write(flags.contains(OpenFlags::WRITE) || flags.contains(OpenFlags::APPEND))
                .append(flags.contains(OpenFlags::APPEND))
                .truncate(flags.contains(OpenFlags::TRUNCATE));

            if flags.contains(OpenFlags::EXCLUDE) {
                options.create_new(true);
            } else if flags.contains(OpenFlags::CREATE) {
                options.create(true);
            }

            #[cfg(unix)]
            if let Some(mode) = attrs.permissions {
                options.mode(mode & 0o7777);
            }
        } else {
            // Per operazioni di lettura il file deve essere regolare
            if fs::metadata(&resolved).await?.is_dir() {
                warn!("Path is not a regular file: {:?}", resolved);
                return Err(BackendError::Io(io::Error::new(
                    io::ErrorKind::IsADirectory,
                    "is a directory",
                )));
            }
            options.read(true);
        }

        #[cfg(not(unix))]
        let _ = attrs;

        let file = options.open(&resolved).await?;
        info!("Opened {:?} (write: {})", resolved, is_write);

        Ok(LocalFile {
            file,
            path: resolved,
            max_read_size: self.max_read_size,
        })
    }

    async fn mkdir(&mut self, path: &str, attrs: FileAttributes) -> BackendResult<()> {
        let resolved = self.resolver.resolve(path)?;
        fs::create_dir(&resolved).await?;

        #[cfg(unix)]
        if let Some(mode) = attrs.permissions {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&resolved, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
        }
        #[cfg(not(unix))]
        let _ = attrs;

        info!("Created directory {:?}", resolved);
        Ok(())
    }

    async fn rmdir(&mut self, path: &str) -> BackendResult<()> {
        let resolved = self.resolver.resolve_entry(path)?;
        fs::remove_dir(&resolved).await?;
        info!("Removed directory {:?}", resolved);
        Ok(())
    }

    async fn remove(&mut self, path: &str) -> BackendResult<()> {
        let resolved = self.resolver.resolve_entry(path)?;
        fs::remove_file(&resolved).await?;
        info!("Removed {:?}", resolved);
        Ok(())
    }

    async fn rename(&mut self, from: &str, to: &str) -> BackendResult<()> {
        let source = self.resolver.resolve_entry(from)?;
        let target = self.resolver.resolve_entry(to)?;
        fs::rename(&source, &target).await?;
        info!("Renamed {:?} to {:?}", source, target);
        Ok(())
    }

    async fn realpath(&mut self, path: &str) -> BackendResult<String> {
        Ok(normalize(path))
    }

    async fn setstat(&mut self, path: &str, attrs: FileAttributes) -> BackendResult<()> {
        let resolved = self.resolver.resolve(path)?;

        if let Some(size) = attrs.size {
            let file = fs::OpenOptions::new().write(true).open(&resolved).await?;
            file.set_len(size).await?;
            debug!("Set size {} on {:?}", size, resolved);
        }

        #[cfg(unix)]
        if let Some(mode) = attrs.permissions {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&resolved, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
            debug!("Set permissions {:o} on {:?}", mode & 0o7777, resolved);
        }

        Ok(())
    }

    async fn readlink(&mut self, path: &str) -> BackendResult<String> {
        let resolved = self.resolver.resolve_entry(path)?;
        let target = fs::read_link(&resolved).await?;

        if !target.is_absolute() {
            return Ok(target.to_string_lossy().into_owned());
        }

        self.resolver.to_virtual(&target).ok_or_else(|| {
            warn!("Symlink {:?} points outside the root directory", resolved);
            BackendError::PermissionDenied(path.to_string())
        })
    }

    #[cfg(unix)]
    async fn symlink(&mut self, link: &str, target: &str) -> BackendResult<()> {
        let link_path = self.resolver.resolve_entry(link)?;
        // i target assoluti sono relativi alla radice servita
        let target_path = if target.starts_with('/') {
            self.resolver.to_real(target)
        } else {
            let base = link_path.parent().unwrap_or(self.resolver.root_dir());
            if self
                .resolver
                .to_virtual(&lexical_join(base, Path::new(target)))
                .is_none()
            {
                warn!("Refusing symlink {:?} -> {} outside the root", link_path, target);
                return Err(BackendError::PermissionDenied(target.to_string()));
            }
            PathBuf::from(target)
        };

        fs::symlink(&target_path, &link_path).await?;
        info!("Created symlink {:?} -> {:?}", link_path, target_path);
        Ok(())
    }
}
