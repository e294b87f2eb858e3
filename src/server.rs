use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::auth::Authorizer;
use crate::backend::BackendFactory;
use crate::connection;
use crate::host_key::HostIdentity;
use crate::liveness::POLL_INTERVAL;

/// Connessioni in attesa di accept accodate dal sistema operativo.
pub const BACKLOG: u32 = 10;

/// Pausa dopo un accept fallito, per non girare a vuoto (es. EMFILE).
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub backlog: u32,
    pub poll_interval: Duration,
    pub auth_rejection_time: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3373,
            backlog: BACKLOG,
            poll_interval: POLL_INTERVAL,
            auth_rejection_time: Duration::from_secs(3),
        }
    }
}

/// Tutto cio' che le sessioni condividono, in sola lettura.
pub struct SessionContext<F> {
    pub config: ServerConfig,
    pub host_key: HostIdentity,
    pub authorizer: Arc<dyn Authorizer>,
    pub backends: Arc<F>,
    pub(crate) transport: Arc<russh::server::Config>,
}

impl<F: BackendFactory> SessionContext<F> {
    pub fn new(
        config: ServerConfig,
        host_key: HostIdentity,
        authorizer: Arc<dyn Authorizer>,
        backends: F,
    ) -> Self {
        let transport = russh::server::Config {
            auth_rejection_time: config.auth_rejection_time,
            auth_rejection_time_initial: Some(Duration::from_secs(0)),
            // nessuno sfratto delle sessioni inattive
            inactivity_timeout: None,
            keys: vec![host_key.private_key().clone()],
            ..Default::default()
        };

        Self {
            config,
            host_key,
            authorizer,
            backends: Arc::new(backends),
            transport: Arc::new(transport),
        }
    }
}

/// Sorgente di connessioni per [`accept_loop`].
pub trait Listener: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Listener for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(&*self).await
    }
}

/// Socket TCP in ascolto con `SO_REUSEADDR`. Tra gli indirizzi risolti si
/// preferisce IPv4.
pub async fn bind_listener(host: &str, port: u16, backlog: u32) -> io::Result<TcpListener> {
    let mut addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port)).await?.collect();
    addrs.sort_by_key(|addr| !addr.is_ipv4());

    let addr = addrs.into_iter().next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{} did not resolve to any address", host),
        )
    })?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// Apre il socket e accetta connessioni per sempre. Ritorna solo se il bind fallisce.
pub async fn run<F: BackendFactory>(ctx: Arc<SessionContext<F>>) -> anyhow::Result<()> {
    let listener = bind_listener(&ctx.config.host, ctx.config.port, ctx.config.backlog)
        .await
        .with_context(|| format!("failed to listen on {}:{}", ctx.config.host, ctx.config.port))?;

    info!("Listening on {}", listener.local_addr()?);
    accept_loop(listener, ctx).await;
    Ok(())
}

/// Ciclo di accept: un task staccato per connessione; gli errori di accept
/// non interrompono il ciclo.
pub async fn accept_loop<L, F>(mut listener: L, ctx: Arc<SessionContext<F>>)
where
    L: Listener,
    F: BackendFactory,
{
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("Accepted connection from {}", peer);
                spawn_session(stream, peer, ctx.clone());
            }
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// La sessione gira in un task interno di cui si attende il `JoinHandle`:
/// errori e panic restano confinati e finiscono nel log.
fn spawn_session<S, F>(stream: S, peer: SocketAddr, ctx: Arc<SessionContext<F>>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: BackendFactory,
{
    tokio::spawn(async move {
        let session = tokio::spawn(connection::handle_connection(stream, peer, ctx));
        match session.await {
            Ok(Ok(())) => info!("{}: session closed", peer),
            Ok(Err(e)) => warn!("{}: session ended: {:#}", peer, e),
            Err(e) if e.is_panic() => error!("{}: session panicked", peer),
            Err(e) => error!("{}: session task failed: {}", peer, e),
        }
    });
}
