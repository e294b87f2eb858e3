use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use sftpserver::args::Args;
use sftpserver::auth::{AllowAll, Authorizer, StaticCredentials};
use sftpserver::backend::LocalDirFactory;
use sftpserver::host_key::HostIdentity;
use sftpserver::server::{self, ServerConfig, SessionContext};

#[tokio::main]
async fn main() {
    // Senza --keyfile clap stampa l'uso ed esce prima di aprire qualsiasi socket
    let args = Args::parse();

    env_logger::builder()
        .filter_level(args.level.into())
        .init();

    let host_key = match HostIdentity::load(&args.keyfile) {
        Ok(key) => key,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    // Verifica che la directory radice esista
    let backends = match LocalDirFactory::new(&args.root_dir, args.max_read_size) {
        Ok(factory) => factory,
        Err(e) => {
            error!("Invalid root directory {:?}: {}", args.root_dir, e);
            std::process::exit(1);
        }
    };

    info!("SFTP root directory: {:?}", backends.root_dir());
    info!("Max read buffer size: {} bytes", args.max_read_size);

    let authorizer: Arc<dyn Authorizer> = match (args.username, args.password) {
        (Some(username), Some(password)) => {
            info!("Password authentication enabled for user '{}'", username);
            Arc::new(StaticCredentials { username, password })
        }
        _ => {
            warn!("No credentials configured: every client is accepted");
            Arc::new(AllowAll)
        }
    };

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..Default::default()
    };

    info!("Starting SFTP server on {}:{}", config.host, config.port);
    let ctx = Arc::new(SessionContext::new(config, host_key, authorizer, backends));

    if let Err(e) = server::run(ctx).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
