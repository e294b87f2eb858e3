use std::io;
use std::path::{Component, Path, PathBuf};

use log::warn;

use super::{BackendError, BackendResult};

/// Link simbolici seguiti al massimo per un singolo percorso, come `SYMLOOP_MAX`.
const MAX_LINK_DEPTH: usize = 40;

/// Normalizza un percorso virtuale: risolve `.` e `..` senza mai salire oltre
/// `/`. I percorsi relativi sono relativi alla radice.
pub(crate) fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Unisce `target` a `base` risolvendo `.` e `..` senza toccare il filesystem.
/// Un `target` assoluto sostituisce `base`.
pub(crate) fn lexical_join(base: &Path, target: &Path) -> PathBuf {
    let mut joined = base.to_path_buf();
    for component in target.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                joined = PathBuf::from(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                joined.pop();
            }
            Component::Normal(name) => joined.push(name),
        }
    }
    joined
}

/// Traduce i percorsi del client in percorsi reali confinati sotto `root_dir`.
///
/// `root_dir` deve essere gia' canonicalizzata.
#[derive(Debug, Clone)]
pub(crate) struct PathResolver {
    root_dir: PathBuf,
}

impl PathResolver {
    pub(crate) fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }

    pub(crate) fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Traduzione puramente lessicale, senza accesso al filesystem.
    pub(crate) fn to_real(&self, path: &str) -> PathBuf {
        let virtual_path = normalize(path);
        let relative = virtual_path.trim_start_matches('/');
        if relative.is_empty() {
            self.root_dir.clone()
        } else {
            self.root_dir.join(relative)
        }
    }

    /// Percorso reale con i link simbolici seguiti; il risultato deve restare
    /// dentro la radice. Se il percorso non esiste ancora si controlla il parent.
    pub(crate) fn resolve(&self, path: &str) -> BackendResult<PathBuf> {
        self.resolve_at_depth(path, 0)
    }

    fn resolve_at_depth(&self, path: &str, depth: usize) -> BackendResult<PathBuf> {
        let real = self.to_real(path);
        match real.canonicalize() {
            Ok(canonical) if canonical.starts_with(&self.root_dir) => Ok(canonical),
            Ok(canonical) => {
                warn!("Attempt to leave the root directory: {:?}", canonical);
                Err(BackendError::PermissionDenied(path.to_string()))
            }
            Err(_) => match real.symlink_metadata() {
                Ok(metadata) if metadata.file_type().is_symlink() => {
                    self.resolve_dangling_link(path, depth)
                }
                _ => self.resolve_entry(path),
            },
        }
    }

    /// Un link il cui target non esiste ancora: `open` con CREATE lo seguirebbe,
    /// quindi il target viene risolto a sua volta e deve restare nella radice.
    fn resolve_dangling_link(&self, path: &str, depth: usize) -> BackendResult<PathBuf> {
        if depth >= MAX_LINK_DEPTH {
            return Err(BackendError::Io(io::Error::other(
                "too many levels of symbolic links",
            )));
        }

        let link = self.resolve_entry(path)?;
        let target = std::fs::read_link(&link)?;
        let base = link.parent().unwrap_or(&self.root_dir);

        match self.to_virtual(&lexical_join(base, &target)) {
            Some(virtual_target) => self.resolve_at_depth(&virtual_target, depth + 1),
            None => {
                warn!("Symlink {:?} points outside the root directory", link);
                Err(BackendError::PermissionDenied(path.to_string()))
            }
        }
    }

    /// Percorso reale dell'ultima componente senza seguirla (lstat, readlink,
    /// remove, rename). Solo la directory che la contiene deve stare nella radice.
    pub(crate) fn resolve_entry(&self, path: &str) -> BackendResult<PathBuf> {
        let real = self.to_real(path);
        if real == self.root_dir {
            return Ok(real);
        }

        let Some(parent) = real.parent() else {
            return Err(BackendError::NotFound(path.to_string()));
        };

        match parent.canonicalize() {
            Ok(canonical_parent) if canonical_parent.starts_with(&self.root_dir) => {
                match real.file_name() {
                    Some(name) => Ok(canonical_parent.join(name)),
                    None => Ok(canonical_parent),
                }
            }
            Ok(canonical_parent) => {
                warn!(
                    "Attempt to leave the root directory: {:?}",
                    canonical_parent
                );
                Err(BackendError::PermissionDenied(path.to_string()))
            }
            Err(_) => Err(BackendError::NotFound(path.to_string())),
        }
    }

    /// Percorso virtuale di un percorso reale, se sta dentro la radice.
    pub(crate) fn to_virtual(&self, real: &Path) -> Option<String> {
        real.strip_prefix(&self.root_dir)
            .ok()
            .map(|relative| format!("/{}", relative.to_string_lossy()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> (tempfile::TempDir, PathResolver) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/readme.txt"), b"hi").unwrap();
        (dir, PathResolver::new(root))
    }

    #[test]
    fn normalize_never_climbs_above_root() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("."), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/a/./b/"), "/a/b");
        assert_eq!(normalize("a/../b"), "/b");
        assert_eq!(normalize("../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize("//a//b"), "/a/b");
    }

    #[test]
    fn resolves_existing_and_new_paths_inside_root() {
        let (_dir, resolver) = resolver();
        let root = resolver.root_dir().to_path_buf();

        assert_eq!(resolver.resolve("/").unwrap(), root);
        assert_eq!(
            resolver.resolve("docs/readme.txt").unwrap(),
            root.join("docs/readme.txt")
        );
        assert_eq!(
            resolver.resolve("/docs/new.txt").unwrap(),
            root.join("docs/new.txt")
        );
        assert_eq!(resolver.resolve("/../docs").unwrap(), root.join("docs"));
    }

    #[test]
    fn missing_parent_is_not_found() {
        let (_dir, resolver) = resolver();
        assert!(matches!(
            resolver.resolve("/nope/file.txt"),
            Err(BackendError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_cannot_escape_root() {
        let (_dir, resolver) = resolver();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"x").unwrap();
        std::os::unix::fs::symlink(outside.path(), resolver.root_dir().join("escape")).unwrap();

        assert!(matches!(
            resolver.resolve("/escape"),
            Err(BackendError::PermissionDenied(_))
        ));
        assert!(matches!(
            resolver.resolve("/escape/secret"),
            Err(BackendError::PermissionDenied(_))
        ));
        // il link stesso resta raggiungibile senza seguirlo
        assert_eq!(
            resolver.resolve_entry("/escape").unwrap(),
            resolver.root_dir().join("escape")
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_cannot_point_outside_root() {
        let (_dir, resolver) = resolver();
        let root = resolver.root_dir().to_path_buf();
        std::os::unix::fs::symlink("../escaped.txt", root.join("link")).unwrap();
        std::os::unix::fs::symlink("/tmp/escaped.txt", root.join("abs")).unwrap();

        assert!(matches!(
            resolver.resolve("/link"),
            Err(BackendError::PermissionDenied(_))
        ));
        assert!(matches!(
            resolver.resolve("/abs"),
            Err(BackendError::PermissionDenied(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_inside_root_resolves_to_its_target() {
        let (_dir, resolver) = resolver();
        let root = resolver.root_dir().to_path_buf();
        std::os::unix::fs::symlink("docs/new.txt", root.join("link")).unwrap();
        std::os::unix::fs::symlink("link", root.join("chain")).unwrap();

        assert_eq!(resolver.resolve("/link").unwrap(), root.join("docs/new.txt"));
        assert_eq!(resolver.resolve("/chain").unwrap(), root.join("docs/new.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_an_error() {
        let (_dir, resolver) = resolver();
        std::os::unix::fs::symlink("loop", resolver.root_dir().join("loop")).unwrap();
        assert!(matches!(resolver.resolve("/loop"), Err(BackendError::Io(_))));
    }

    #[test]
    fn lexical_join_resolves_dots() {
        let base = Path::new("/srv/root/docs");
        assert_eq!(
            lexical_join(base, Path::new("../a/./b")),
            Path::new("/srv/root/a/b")
        );
        assert_eq!(lexical_join(base, Path::new("../../x")), Path::new("/srv/x"));
        assert_eq!(lexical_join(base, Path::new("/etc/passwd")), Path::new("/etc/passwd"));
    }

    #[test]
    fn maps_real_paths_back_to_virtual() {
        let (_dir, resolver) = resolver();
        let root = resolver.root_dir().to_path_buf();
        assert_eq!(resolver.to_virtual(&root).as_deref(), Some("/"));
        assert_eq!(
            resolver.to_virtual(&root.join("docs/readme.txt")).as_deref(),
            Some("/docs/readme.txt")
        );
        assert_eq!(resolver.to_virtual(Path::new("/etc/passwd")), None);
    }
}
