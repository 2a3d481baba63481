//! Transport abstraction for relay connections.
//!
//! A relay connection carries text frames in both directions. Implementations
//! may use WebSockets or anything else that preserves frame boundaries.

use async_trait::async_trait;

use crate::error::Result;

/// Transport trait for exchanging text frames with one relay.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Send one frame.
    async fn send_text(&self, text: String) -> Result<()>;

    /// Receive the next frame.
    ///
    /// Returns `None` once the other side has closed the connection.
    async fn recv_text(&self) -> Result<Option<String>>;

    /// Close the sending half. Pending frames are still delivered.
    async fn close(&self) -> Result<()>;
}

/// A simple in-memory transport for testing.
///
/// Uses channels to connect a client half to a relay half.
pub mod memory {
    use super::*;
    use crate::error::RelayError;
    use tokio::sync::{mpsc, Mutex};

    /// Frames buffered per direction.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// One end of an in-memory connection.
    pub struct MemoryTransport {
        sender: Mutex<Option<mpsc::Sender<String>>>,
        receiver: Mutex<mpsc::Receiver<String>>,
    }

    /// Create two connected ends. Frames sent on one are received on the other.
    pub fn duplex(capacity: usize) -> (MemoryTransport, MemoryTransport) {
        let (a_tx, a_rx) = mpsc::channel(capacity.max(1));
        let (b_tx, b_rx) = mpsc::channel(capacity.max(1));
        (
            MemoryTransport {
                sender: Mutex::new(Some(a_tx)),
                receiver: Mutex::new(b_rx),
            },
            MemoryTransport {
                sender: Mutex::new(Some(b_tx)),
                receiver: Mutex::new(a_rx),
            },
        )
    }

    #[async_trait]
    impl RelayTransport for MemoryTransport {
        async fn send_text(&self, text: String) -> Result<()> {
            let sender = self.sender.lock().await;
            match sender.as_ref() {
                Some(tx) => tx
                    .send(text)
                    .await
                    .map_err(|_| RelayError::Transport("peer disconnected".into())),
                None => Err(RelayError::Closed),
            }
        }

        async fn recv_text(&self) -> Result<Option<String>> {
            let mut rx = self.receiver.lock().await;
            Ok(rx.recv().await)
        }

        async fn close(&self) -> Result<()> {
            self.sender.lock().await.take();
            Ok(())
        }
    }

}
