use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};
use russh::server::{Auth, Msg, Session};
use russh::{Channel, ChannelId};

use crate::auth::Authorizer;
use crate::backend::BackendFactory;
use crate::sftp::{SFTP_SUBSYSTEM, SftpSession};

/// Handler SSH di una singola connessione: delega l'autenticazione
/// all'[`Authorizer`] e lega il sottosistema `sftp` a un backend nuovo.
pub struct SshSession<F: BackendFactory> {
    peer: SocketAddr,
    authorizer: Arc<dyn Authorizer>,
    backends: Arc<F>,
    channels: HashMap<ChannelId, Channel<Msg>>,
    user: Option<String>,
    sftp_bound: bool,
}

impl<F: BackendFactory> SshSession<F> {
    pub fn new(peer: SocketAddr, authorizer: Arc<dyn Authorizer>, backends: Arc<F>) -> Self {
        Self {
            peer,
            authorizer,
            backends,
            channels: HashMap::new(),
            user: None,
            sftp_bound: false,
        }
    }

    fn decide(&mut self, user: &str, accepted: bool, method: &str) -> Auth {
        if accepted {
            info!("{}: {} authentication accepted for '{}'", self.peer, method, user);
            self.user = Some(user.to_string());
            Auth::Accept
        } else {
            warn!("{}: {} authentication rejected for '{}'", self.peer, method, user);
            Auth::Reject {
                proceed_with_methods: None,
                partial_success: false,
            }
        }
    }
}

impl<F: BackendFactory> russh::server::Handler for SshSession<F> {
    type Error = anyhow::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        let accepted = self.authorizer.check_password(user, password);
        Ok(self.decide(user, accepted, "password"))
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &russh::keys::PublicKey,
    ) -> Result<Auth, Self::Error> {
        let accepted = self.authorizer.check_publickey(user, public_key);
        Ok(self.decide(user, accepted, "publickey"))
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        // Solo il primo canale: il sottosistema si lega una volta per connessione
        if self.sftp_bound || !self.channels.is_empty() {
            warn!("{}: refusing extra session channel {:?}", self.peer, channel.id());
            return Ok(false);
        }

        debug!("{}: session channel {:?} opened", self.peer, channel.id());
        self.channels.insert(channel.id(), channel);
        Ok(true)
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.close(channel)?;
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.channels.remove(&channel);
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel_id: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        info!("{}: subsystem request: {}", self.peer, name);

        let user = self.user.as_deref().unwrap_or_default();
        if name != SFTP_SUBSYSTEM
            || self.sftp_bound
            || !self.authorizer.allows_subsystem(user, name)
        {
            warn!("{}: subsystem {} refused", self.peer, name);
            session.channel_failure(channel_id)?;
            return Ok(());
        }

        let Some(channel) = self.channels.remove(&channel_id) else {
            warn!("{}: subsystem request on unknown channel {:?}", self.peer, channel_id);
            session.channel_failure(channel_id)?;
            return Ok(());
        };

        let backend = self
            .backends
            .create(self.peer)
            .context("failed to create file backend")?;

        self.sftp_bound = true;
        session.channel_success(channel_id)?;
        russh_sftp::server::run(channel.into_stream(), SftpSession::new(backend, self.peer)).await;
        info!("{}: sftp subsystem bound for '{}'", self.peer, user);

        Ok(())
    }
}
