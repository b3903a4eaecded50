use std::sync::Arc;
use tokio::sync::watch;

/// The single transient banner message shown to the user.
#[derive(Clone)]
pub struct Notices {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Notices {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn show(&self, message: impl Into<String>) {
        self.tx.send_replace(Some(message.into()));
    }

    pub fn hide(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new()
    }
}
