use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use russh::keys::PrivateKey;
use russh::keys::ssh_key::rand_core::OsRng;

use crate::auth::AllowAll;
use crate::backend::LocalDirFactory;
use crate::host_key::HostIdentity;
use crate::server::{ServerConfig, SessionContext};

pub fn ephemeral_host_key() -> HostIdentity {
    HostIdentity::from_key(
        PrivateKey::random(&mut OsRng, russh::keys::Algorithm::Ed25519).unwrap(),
    )
}

pub fn test_context(root: &Path) -> Arc<SessionContext<LocalDirFactory>> {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        poll_interval: Duration::from_millis(50),
        ..Default::default()
    };
    Arc::new(SessionContext::new(
        config,
        ephemeral_host_key(),
        Arc::new(AllowAll),
        LocalDirFactory::new(root, 32768).unwrap(),
    ))
}
