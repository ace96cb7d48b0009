use log::{debug, info};
use tokio::sync::broadcast;

/// Request to drop and rebuild caches derived from the semantic model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelsReload;

/// Broadcasts [`ModelsReload`] to every subscriber
#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    sender: broadcast::Sender<ModelsReload>,
}

impl Default for ReloadNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ReloadNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelsReload> {
        self.sender.subscribe()
    }

    /// Fire the signal, returning how many subscribers received it
    pub fn fire(&self) -> usize {
        match self.sender.send(ModelsReload) {
            Ok(receivers) => {
                info!("Models reload requested ({} subscribers)", receivers);
                receivers
            }
            Err(_) => {
                debug!("Models reload requested with no subscribers");
                0
            }
        }
    }
}
