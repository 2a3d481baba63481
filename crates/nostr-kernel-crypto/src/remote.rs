//! Remote signer: forwards requests to another task and awaits the answer.
//!
//! The client half ([`RemoteSigner`]) implements [`NostrSigner`] by sending a
//! [`RemoteRequest`] over an mpsc channel and waiting on a oneshot reply. The
//! endpoint half can be anything that drains the channel; [`serve_remote_signer`]
//! answers requests with any local signer, the way an external signer app
//! would.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use nostr_kernel_core::{validate_event, Event, EventTemplate, PublicKey, Rumor};

use crate::error::SignerError;
use crate::signer::{NostrSigner, SignerResult};

/// Configuration for the remote signer channel.
#[derive(Debug, Clone)]
pub struct RemoteSignerConfig {
    /// Queued requests before senders wait.
    pub capacity: usize,
    /// Per-request deadline. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for RemoteSignerConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// What the client asks the endpoint to do.
#[derive(Debug, Clone)]
pub enum RemoteMethod {
    SignEvent(Rumor),
    Nip04Encrypt { peer: PublicKey, plaintext: String },
    Nip04Decrypt { peer: PublicKey, ciphertext: String },
    Nip44Encrypt { peer: PublicKey, plaintext: String },
    Nip44Decrypt { peer: PublicKey, ciphertext: String },
}

impl RemoteMethod {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteMethod::SignEvent(_) => "sign_event",
            RemoteMethod::Nip04Encrypt { .. } => "nip04_encrypt",
            RemoteMethod::Nip04Decrypt { .. } => "nip04_decrypt",
            RemoteMethod::Nip44Encrypt { .. } => "nip44_encrypt",
            RemoteMethod::Nip44Decrypt { .. } => "nip44_decrypt",
        }
    }
}

/// Endpoint answer.
#[derive(Debug, Clone)]
pub enum RemoteResponse {
    Signed(Event),
    Text(String),
}

/// The endpoint's verdict: a response, or a rejection reason.
pub type RemoteReply = std::result::Result<RemoteResponse, String>;

/// A request in flight.
#[derive(Debug)]
pub struct RemoteRequest {
    pub method: RemoteMethod,
    pub reply: oneshot::Sender<RemoteReply>,
}

/// Client half of a remote signer.
#[derive(Debug, Clone)]
pub struct RemoteSigner {
    pubkey: PublicKey,
    requests: mpsc::Sender<RemoteRequest>,
    timeout: Option<Duration>,
}

impl RemoteSigner {
    /// Create a client and the receiver the endpoint should drain.
    pub fn channel(
        pubkey: PublicKey,
        config: RemoteSignerConfig,
    ) -> (Self, mpsc::Receiver<RemoteRequest>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        (
            Self {
                pubkey,
                requests: tx,
                timeout: config.timeout,
            },
            rx,
        )
    }

    async fn call(&self, method: RemoteMethod) -> SignerResult<RemoteResponse> {
        let name = method.name();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.requests
            .send(RemoteRequest {
                method,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SignerError::Remote("signer endpoint is gone".into()))?;

        let reply = match self.timeout {
            Some(deadline) => tokio::time::timeout(deadline, reply_rx).await.map_err(|_| {
                tracing::warn!(method = name, ?deadline, "remote signer timed out");
                SignerError::Timeout(deadline)
            })?,
            None => reply_rx.await,
        };

        reply
            .map_err(|_| SignerError::Remote("reply channel dropped".into()))?
            .map_err(SignerError::Rejected)
    }

    async fn call_text(&self, method: RemoteMethod) -> SignerResult<String> {
        match self.call(method).await? {
            RemoteResponse::Text(text) => Ok(text),
            RemoteResponse::Signed(_) => Err(SignerError::Remote(
                "expected text, got an event".into(),
            )),
        }
    }
}

#[async_trait]
impl NostrSigner for RemoteSigner {
    fn pubkey(&self) -> PublicKey {
        self.pubkey
    }

    fn is_writeable(&self) -> bool {
        !self.requests.is_closed()
    }

    async fn sign(&self, template: &EventTemplate) -> SignerResult<Event> {
        let rumor = template.to_unsigned(self.pubkey);
        let expected = *rumor.id();

        let event = match self.call(RemoteMethod::SignEvent(rumor)).await? {
            RemoteResponse::Signed(event) => event,
            RemoteResponse::Text(_) => {
                return Err(SignerError::Remote("expected an event, got text".into()))
            }
        };

        // The endpoint must sign exactly what was asked.
        if *event.id() != expected || validate_event(&event).is_err() {
            tracing::warn!(expected = %expected, got = %event.id(), "remote signer returned an invalid event");
            return Err(SignerError::Remote("returned event does not verify".into()));
        }
        Ok(event)
    }

    async fn nip44_encrypt(&self, plaintext: &str, peer: &PublicKey) -> SignerResult<String> {
        self.call_text(RemoteMethod::Nip44Encrypt {
            peer: *peer,
            plaintext: plaintext.to_string(),
        })
        .await
    }

    async fn nip44_decrypt(&self, payload: &str, peer: &PublicKey) -> SignerResult<String> {
        self.call_text(RemoteMethod::Nip44Decrypt {
            peer: *peer,
            ciphertext: payload.to_string(),
        })
        .await
    }

    async fn nip04_encrypt(&self, plaintext: &str, peer: &PublicKey) -> SignerResult<String> {
        self.call_text(RemoteMethod::Nip04Encrypt {
            peer: *peer,
            plaintext: plaintext.to_string(),
        })
        .await
    }

    async fn nip04_decrypt(&self, content: &str, peer: &PublicKey) -> SignerResult<String> {
        self.call_text(RemoteMethod::Nip04Decrypt {
            peer: *peer,
            ciphertext: content.to_string(),
        })
        .await
    }
}

/// Answer one request with a local signer.
pub async fn handle_remote_method<S>(signer: &S, method: RemoteMethod) -> RemoteReply
where
    S: NostrSigner + ?Sized,
{
    let result = match method {
        RemoteMethod::SignEvent(rumor) => {
            if *rumor.pubkey() != signer.pubkey() {
                return Err(format!("cannot sign for {}", rumor.pubkey()));
            }
            signer
                .sign(&rumor.to_template())
                .await
                .map(RemoteResponse::Signed)
        }
        RemoteMethod::Nip04Encrypt { peer, plaintext } => signer
            .nip04_encrypt(&plaintext, &peer)
            .await
            .map(RemoteResponse::Text),
        RemoteMethod::Nip04Decrypt { peer, ciphertext } => signer
            .nip04_decrypt(&ciphertext, &peer)
            .await
            .map(RemoteResponse::Text),
        RemoteMethod::Nip44Encrypt { peer, plaintext } => signer
            .nip44_encrypt(&plaintext, &peer)
            .await
            .map(RemoteResponse::Text),
        RemoteMethod::Nip44Decrypt { peer, ciphertext } => signer
            .nip44_decrypt(&ciphertext, &peer)
            .await
            .map(RemoteResponse::Text),
    };
    result.map_err(|e| e.to_string())
}

/// Drain `requests` until every client is dropped, answering with `signer`.
pub async fn serve_remote_signer<S>(signer: &S, mut requests: mpsc::Receiver<RemoteRequest>)
where
    S: NostrSigner + ?Sized,
{
    while let Some(request) = requests.recv().await {
        let name = request.method.name();
        let reply = handle_remote_method(signer, request.method).await;
        if let Err(reason) = &reply {
            tracing::debug!(method = name, %reason, "remote signer rejected request");
        }
        // The client may have timed out and gone away.
        let _ = request.reply.send(reply);
    }
    tracing::debug!("remote signer endpoint stopped");
}
