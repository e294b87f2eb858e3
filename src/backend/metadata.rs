use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

use russh_sftp::protocol::FileAttributes;

pub struct MetadataConverter;

impl MetadataConverter {
    pub fn to_file_attributes(metadata: &Metadata) -> FileAttributes {
        let mut attrs = FileAttributes::default();
        attrs.size = Some(metadata.len());

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            attrs.uid = Some(metadata.uid());
            attrs.gid = Some(metadata.gid());
            // mode() include gia' i bit del tipo (S_IFREG, S_IFDIR, S_IFLNK)
            attrs.permissions = Some(metadata.mode());
        }

        #[cfg(not(unix))]
        {
            attrs.permissions = Some(if metadata.is_dir() {
                0o040755
            } else if metadata.file_type().is_symlink() {
                0o120777
            } else {
                0o100644
            });
        }

        attrs.mtime = metadata.modified().ok().and_then(epoch_secs);
        attrs.atime = metadata.accessed().ok().and_then(epoch_secs);

        attrs
    }

    /// Riga in stile `ls -l` usata come longname nelle risposte READDIR.
    pub fn format_longname(filename: &str, metadata: &Metadata) -> String {
        let file_type = if metadata.file_type().is_symlink() {
            'l'
        } else if metadata.is_dir() {
            'd'
        } else {
            '-'
        };

        let mtime = match metadata.modified() {
            Ok(modified) => chrono::DateTime::<chrono::Utc>::from(modified)
                .format("%b %d %H:%M")
                .to_string(),
            Err(_) => "Jan  1 00:00".to_string(),
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let mode = metadata.mode();
            format!(
                "{}{} {:3} {:5} {:5} {:8} {} {}",
                file_type,
                permission_string(mode),
                metadata.nlink(),
                metadata.uid(),
                metadata.gid(),
                metadata.len(),
                mtime,
                filename
            )
        }

        #[cfg(not(unix))]
        {
            let mode = if metadata.is_dir() { 0o755 } else { 0o644 };
            format!(
                "{}{}   1 root  root  {:8} {} {}",
                file_type,
                permission_string(mode),
                metadata.len(),
                mtime,
                filename
            )
        }
    }
}

fn epoch_secs(time: SystemTime) -> Option<u32> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|duration| duration.as_secs() as u32)
}

fn permission_string(mode: u32) -> String {
    const BITS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    BITS.iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_string_matches_ls() {
        assert_eq!(permission_string(0o755), "rwxr-xr-x");
        assert_eq!(permission_string(0o640), "rw-r-----");
        assert_eq!(permission_string(0o100600), "rw-------");
    }

    #[test]
    fn attributes_of_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [0u8; 42]).unwrap();

        let metadata = std::fs::metadata(&path).unwrap();
        let attrs = MetadataConverter::to_file_attributes(&metadata);
        assert_eq!(attrs.size, Some(42));
        assert!(attrs.mtime.is_some());
        assert_eq!(attrs.permissions.unwrap() & 0o170000, 0o100000);

        let longname = MetadataConverter::format_longname("data.bin", &metadata);
        assert!(longname.starts_with('-'));
        assert!(longname.ends_with(" data.bin"));
    }

    #[test]
    fn longname_of_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = std::fs::metadata(dir.path()).unwrap();
        assert!(MetadataConverter::format_longname("sub", &metadata).starts_with('d'));
    }
}
