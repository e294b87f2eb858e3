use russh::keys::PublicKey;

use crate::sftp::SFTP_SUBSYSTEM;

/// Decide se accettare un tentativo di autenticazione e quali sottosistemi
/// un utente autenticato puo' aprire.
pub trait Authorizer: Send + Sync + 'static {
    fn check_password(&self, user: &str, password: &str) -> bool;

    fn check_publickey(&self, user: &str, key: &PublicKey) -> bool;

    fn allows_subsystem(&self, _user: &str, name: &str) -> bool {
        name == SFTP_SUBSYSTEM
    }
}

/// Accetta qualunque client. Comportamento di default del server di test.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn check_password(&self, _user: &str, _password: &str) -> bool {
        true
    }

    fn check_publickey(&self, _user: &str, _key: &PublicKey) -> bool {
        true
    }
}

/// Una sola coppia username/password; le chiavi pubbliche sono rifiutate.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub username: String,
    pub password: String,
}

impl Authorizer for StaticCredentials {
    fn check_password(&self, user: &str, password: &str) -> bool {
        user == self.username && password == self.password
    }

    fn check_publickey(&self, _user: &str, _key: &PublicKey) -> bool {
        false
    }
}
