use std::path::Path;

use anyhow::Context;
use log::info;
use russh::keys::PrivateKey;
use russh::keys::ssh_key::HashAlg;

/// Identita' dell'host: la chiave privata presentata a ogni client durante
/// l'handshake. Viene caricata una sola volta e condivisa in sola lettura.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    key: PrivateKey,
}

impl HostIdentity {
    /// Carica la chiave da un file OpenSSH/PEM non cifrato.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let key = russh::keys::load_secret_key(path, None)
            .with_context(|| format!("failed to load host key from {}", path.display()))?;

        let identity = Self { key };
        info!("Loaded host key {:?} ({})", path, identity.fingerprint());
        Ok(identity)
    }

    pub fn from_key(key: PrivateKey) -> Self {
        Self { key }
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn fingerprint(&self) -> String {
        self.key.public_key().fingerprint(HashAlg::Sha256).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::keys::ssh_key::LineEnding;
    use russh::keys::ssh_key::rand_core::OsRng;

    #[test]
    fn loads_openssh_key_from_disk() {
        let key = PrivateKey::random(&mut OsRng, russh::keys::Algorithm::Ed25519).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host_ed25519");
        std::fs::write(&path, key.to_openssh(LineEnding::LF).unwrap().as_bytes()).unwrap();

        let identity = HostIdentity::load(&path).unwrap();
        assert_eq!(identity.private_key().public_key(), key.public_key());
        assert!(identity.fingerprint().starts_with("SHA256:"));
    }

    #[test]
    fn missing_key_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HostIdentity::load(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("failed to load host key"));
    }

    #[test]
    fn malformed_key_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.key");
        std::fs::write(&path, "not a key").unwrap();
        assert!(HostIdentity::load(&path).is_err());
    }
}
