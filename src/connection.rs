use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::backend::BackendFactory;
use crate::liveness::wait_until_inactive;
use crate::server::SessionContext;
use crate::ssh_session::SshSession;

/// Gestisce una connessione accettata dall'handshake fino alla chiusura.
///
/// La chiave dell'host, l'authorizer e il factory del backend arrivano da
/// `ctx`; la connessione appartiene solo a questa sessione. Ritorna quando il
/// trasporto non e' piu' attivo.
pub async fn handle_connection<S, F>(
    stream: S,
    peer: SocketAddr,
    ctx: Arc<SessionContext<F>>,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: BackendFactory,
{
    let handler = SshSession::new(peer, ctx.authorizer.clone(), ctx.backends.clone());

    let running = russh::server::run_stream(ctx.transport.clone(), stream, handler)
        .await
        .context("SSH handshake failed")?;
    debug!("{}: transport started", peer);

    let transport = tokio::spawn(running);
    wait_until_inactive(&transport, ctx.config.poll_interval).await;
    debug!("{}: transport no longer active", peer);

    match transport.await {
        Ok(result) => result.context("transport closed with error"),
        Err(e) => Err(anyhow!(e).context("transport task failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const PEER: &str = "127.0.0.1:50010";

    #[tokio::test]
    async fn session_ends_soon_after_client_closes() {
        let root = tempfile::tempdir().unwrap();
        let ctx = test_context(root.path());
        let (mut client, server) = tokio::io::duplex(4096);

        let session = tokio::spawn(handle_connection(server, PEER.parse().unwrap(), ctx.clone()));

        client
            .write_all(b"SSH-2.0-OpenSSH_9.6\r\n")
            .await
            .unwrap();
        let mut banner = [0u8; 8];
        client.read_exact(&mut banner).await.unwrap();
        assert_eq!(&banner, b"SSH-2.0-");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!session.is_finished());

        let closed_at = Instant::now();
        drop(client);
        tokio::time::timeout(Duration::from_secs(3), session)
            .await
            .expect("session outlived its connection")
            .unwrap()
            .ok();
        assert!(closed_at.elapsed() <= ctx.config.poll_interval + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn garbage_instead_of_ssh_fails_only_this_session() {
        let root = tempfile::tempdir().unwrap();
        let ctx = test_context(root.path());
        let (mut client, server) = tokio::io::duplex(4096);

        let session = tokio::spawn(handle_connection(server, PEER.parse().unwrap(), ctx));
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: example\r\n\r\n")
            .await
            .unwrap();
        drop(client);

        let result = tokio::time::timeout(Duration::from_secs(3), session)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_err());
    }
}
