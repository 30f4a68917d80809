use crate::IdentityProvider;
use core_types::Identity;
use log::info;
use tokio::sync::watch;

/// In-process wallet whose account can be switched at runtime.
pub struct MemoryWallet {
    tx: watch::Sender<Identity>,
}

impl MemoryWallet {
    pub fn new(initial: Identity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Simulates the wallet's "accounts changed" notification.
    pub fn switch_to(&self, identity: Identity) {
        info!("wallet account switched to {}", identity.short());
        self.tx.send_replace(identity);
    }

    pub fn disconnect(&self) {
        self.switch_to(Identity::sentinel());
    }
}

impl IdentityProvider for MemoryWallet {
    fn current(&self) -> Identity {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Identity> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_switches() {
        let wallet = MemoryWallet::new(Identity::new("0xa1"));
        let mut rx = wallet.subscribe();
        wallet.switch_to(Identity::new("0xB2"));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Identity::new("0xb2"));
        wallet.disconnect();
        assert!(wallet.current().is_sentinel());
    }
}
