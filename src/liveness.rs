use std::time::Duration;

use tokio::task::JoinHandle;

/// Intervallo tra due controlli di vita del trasporto.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub trait Liveness {
    fn is_active(&self) -> bool;
}

/// Il trasporto russh gira in un proprio task: e' attivo finche' il task non termina.
impl<T> Liveness for JoinHandle<T> {
    fn is_active(&self) -> bool {
        !self.is_finished()
    }
}

/// Blocca finche' il trasporto risulta attivo, controllando ogni `interval`.
pub async fn wait_until_inactive<L: Liveness + ?Sized>(transport: &L, interval: Duration) {
    while transport.is_active() {
        tokio::time::sleep(interval).await;
    }
}
