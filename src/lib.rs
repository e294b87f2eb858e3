//! Server SFTP autonomo: accetta connessioni TCP, esegue l'handshake SSH con
//! `russh` e lega il sottosistema `sftp` a un backend di file intercambiabile.

pub mod args;
pub mod auth;
pub mod backend;
pub mod connection;
pub mod host_key;
pub mod liveness;
pub mod server;
pub mod sftp;
pub mod ssh_session;

#[cfg(test)]
mod testing;
