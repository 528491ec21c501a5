use futures_util::stream::StreamExt;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Process-wide shutdown flag, flipped by SIGINT/SIGTERM or [`Shutdown::trigger`]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    signals: Option<Handle>,
}

impl Shutdown {
    /// Start listening for SIGINT and SIGTERM
    pub fn listen() -> std::io::Result<Self> {
        let signals = Signals::new([SIGTERM, SIGINT])?;
        let handle = signals.handle();
        let shutdown = Self::manual();
        let tx = shutdown.tx.clone();

        tokio::spawn(async move {
            let mut signals = signals;
            if let Some(signal) = signals.next().await {
                info!(signal, "Received shutdown signal");
                tx.send_replace(true);
            }
        });

        Ok(Self {
            signals: Some(handle),
            ..shutdown
        })
    }

    /// A flag that only flips through [`Shutdown::trigger`]
    pub fn manual() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            signals: None,
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolves once shutdown was requested
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so `changed` only fails after drop
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Stop listening for signals
    pub fn close(&self) {
        if let Some(handle) = &self.signals {
            handle.close();
        }
    }
}
