//! A client session with one relay.
//!
//! [`RelaySession`] frames commands onto a [`RelayTransport`], keeps the
//! [`SubscriptionAssembler`] in step with EOSE/CLOSED replies, answers AUTH
//! challenges with the configured signer and drops events that do not verify.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use nostr_kernel_core::{
    unix_now, validate_event, Event, EventId, EventTemplate, Filter, Kind, Tag,
};
use nostr_kernel_crypto::{NostrSigner, SignerError};
use nostr_kernel_store::{EventStore, InsertResult, StoreError};

use crate::error::{RelayError, Result};
use crate::messages::{new_subscription_id, ClientCommand, RelayMessage};
use crate::subscription::SubscriptionAssembler;
use crate::transport::RelayTransport;

/// CLOSED/OK prefix a relay uses when it wants the client to authenticate.
pub const AUTH_REQUIRED_PREFIX: &str = "auth-required:";

/// Configuration for a relay session.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Most filters sent in one REQ.
    pub max_filters_per_req: usize,
    /// Whether to check id and signature of incoming events.
    pub verify_events: bool,
    /// Timeout for waiting on the next relay frame.
    pub message_timeout: Duration,
    /// Whether to answer AUTH challenges automatically.
    pub auto_auth: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_filters_per_req: 10,
            verify_events: true,
            message_timeout: Duration::from_secs(30),
            auto_auth: true,
        }
    }
}

/// What the relay told us, after the session has done its own bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayNotification {
    Event {
        subscription_id: String,
        event: Event,
    },
    Eose(String),
    Ok {
        event_id: EventId,
        accepted: bool,
        message: String,
    },
    Closed {
        subscription_id: String,
        message: String,
    },
    Notice(String),
    AuthChallenge {
        challenge: String,
        answered: bool,
    },
    Count {
        subscription_id: String,
        count: u64,
        approximate: bool,
    },
}

/// The relay's verdict on a published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkReply {
    pub accepted: bool,
    pub message: String,
}

/// Result of [`RelaySession::fetch_into`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Verified events received for the fetch.
    pub received: usize,
    /// Events newly stored.
    pub inserted: usize,
    /// Events the store already had.
    pub duplicates: usize,
    /// Events the store refused (ephemeral, expired).
    pub rejected: usize,
    /// Frames dropped while fetching (unparseable or failed verification).
    pub invalid: usize,
    /// The relay closed the subscription before the pass finished.
    pub closed_early: bool,
}

/// Build the kind 22242 event that answers an AUTH challenge.
pub fn auth_template(relay_url: &str, challenge: &str) -> EventTemplate {
    EventTemplate::new(Kind::CLIENT_AUTH, "")
        .tag(Tag::from_parts(["relay", relay_url]))
        .tag(Tag::from_parts(["challenge", challenge]))
}

/// Session state for one relay connection.
pub struct RelaySession<T: RelayTransport> {
    url: String,
    transport: T,
    config: RelayConfig,
    assembler: SubscriptionAssembler,
    signer: Option<Arc<dyn NostrSigner>>,
    ok_replies: HashMap<EventId, OkReply>,
    challenge: Option<String>,
    auth_event: Option<EventId>,
    auth_blocked: HashSet<String>,
    one_shot: HashSet<String>,
    dropped: usize,
}

impl<T: RelayTransport> RelaySession<T> {
    /// Create a session over an already connected transport.
    pub fn new(url: impl Into<String>, transport: T, config: RelayConfig) -> Self {
        let assembler = SubscriptionAssembler::new(config.max_filters_per_req);
        Self {
            url: url.into(),
            transport,
            config,
            assembler,
            signer: None,
            ok_replies: HashMap::new(),
            challenge: None,
            auth_event: None,
            auth_blocked: HashSet::new(),
            one_shot: HashSet::new(),
            dropped: 0,
        }
    }

    /// Use `signer` to answer AUTH challenges.
    pub fn with_signer(mut self, signer: Arc<dyn NostrSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn assembler(&self) -> &SubscriptionAssembler {
        &self.assembler
    }

    /// The relay's OK reply for a published event, once it arrived.
    pub fn ok_reply(&self, event_id: &EventId) -> Option<&OkReply> {
        self.ok_replies.get(event_id)
    }

    /// Remove and return the OK reply for a published event.
    pub fn take_ok_reply(&mut self, event_id: &EventId) -> Option<OkReply> {
        self.ok_replies.remove(event_id)
    }

    /// The most recent AUTH challenge.
    pub fn challenge(&self) -> Option<&str> {
        self.challenge.as_deref()
    }

    /// Frames and events dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outgoing
    // ─────────────────────────────────────────────────────────────────────────

    async fn send(&self, command: ClientCommand) -> Result<()> {
        tracing::trace!(relay = %self.url, verb = command.verb(), "sending");
        self.transport.send_text(command.to_json()).await
    }

    async fn send_opt(&self, command: Option<ClientCommand>) -> Result<()> {
        match command {
            Some(command) => self.send(command).await,
            None => Ok(()),
        }
    }

    /// Publish a signed event. The verdict arrives later as an OK.
    pub async fn publish(&mut self, event: &Event) -> Result<()> {
        self.ok_replies.remove(event.id());
        self.send(ClientCommand::Event(event.clone())).await
    }

    /// Set the filters of a subscription.
    pub async fn subscribe(&mut self, subscription_id: &str, filters: Vec<Filter>) -> Result<()> {
        let command = self.assembler.subscribe(subscription_id, filters);
        self.send_opt(command).await
    }

    /// Drop a subscription.
    pub async fn unsubscribe(&mut self, subscription_id: &str) -> Result<()> {
        self.auth_blocked.remove(subscription_id);
        self.one_shot.remove(subscription_id);
        let command = self.assembler.unsubscribe(subscription_id);
        self.send_opt(command).await
    }

    /// Ask for a count. The answer arrives as [`RelayNotification::Count`].
    pub async fn count(&self, subscription_id: &str, filters: Vec<Filter>) -> Result<()> {
        self.send(ClientCommand::count(subscription_id, filters))
            .await
    }

    /// Sign and send the answer to `challenge`.
    pub async fn authenticate(&mut self, challenge: &str) -> Result<EventId> {
        let signer = self
            .signer
            .clone()
            .ok_or(RelayError::Signer(SignerError::ReadOnly))?;
        let event = signer.sign(&auth_template(&self.url, challenge)).await?;
        let id = *event.id();
        self.auth_event = Some(id);
        self.send(ClientCommand::Auth(event)).await?;
        tracing::debug!(relay = %self.url, "answered auth challenge");
        Ok(id)
    }

    /// Re-send every subscription after the transport reconnected.
    pub async fn resync(&mut self) -> Result<()> {
        for command in self.assembler.resync() {
            self.send(command).await?;
        }
        Ok(())
    }

    /// Close all subscriptions and the transport.
    pub async fn close(&mut self) -> Result<()> {
        self.one_shot.clear();
        self.auth_blocked.clear();
        self.ok_replies.clear();
        for command in self.assembler.unsubscribe_all() {
            self.send(command).await?;
        }
        self.transport.close().await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Incoming
    // ─────────────────────────────────────────────────────────────────────────

    /// Wait for the next notification.
    ///
    /// Returns `None` when the relay closed the connection. Unparseable frames
    /// and events that fail verification are dropped and counted.
    pub async fn next_notification(&mut self) -> Result<Option<RelayNotification>> {
        loop {
            let timeout = self.config.message_timeout;
            let text = tokio::time::timeout(timeout, self.transport.recv_text())
                .await
                .map_err(|_| RelayError::Timeout(timeout))??;

            let Some(text) = text else {
                tracing::debug!(relay = %self.url, "relay closed the connection");
                self.assembler.on_disconnected();
                return Ok(None);
            };

            let message = match RelayMessage::parse(&text) {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(relay = %self.url, %err, "dropping malformed frame");
                    self.dropped += 1;
                    continue;
                }
            };

            if let Some(notification) = self.handle(message).await? {
                return Ok(Some(notification));
            }
        }
    }

    async fn handle(&mut self, message: RelayMessage) -> Result<Option<RelayNotification>> {
        match message {
            RelayMessage::Event {
                subscription_id,
                event,
            } => {
                if self.config.verify_events {
                    if let Err(err) = validate_event(&event) {
                        tracing::warn!(relay = %self.url, id = %event.id(), %err, "dropping invalid event");
                        self.dropped += 1;
                        return Ok(None);
                    }
                }
                if !self.assembler.on_event(&subscription_id) {
                    tracing::trace!(subscription = %subscription_id, "event for unknown subscription");
                }
                Ok(Some(RelayNotification::Event {
                    subscription_id,
                    event,
                }))
            }

            RelayMessage::Eose(subscription_id) => {
                let command = if self.one_shot.contains(&subscription_id)
                    && self.assembler.is_final_window(&subscription_id)
                {
                    self.one_shot.remove(&subscription_id);
                    self.assembler.unsubscribe(&subscription_id)
                } else {
                    self.assembler.on_eose(&subscription_id, unix_now())
                };
                self.send_opt(command).await?;
                Ok(Some(RelayNotification::Eose(subscription_id)))
            }

            RelayMessage::Ok {
                event_id,
                accepted,
                message,
            } => {
                if self.auth_event == Some(event_id) && accepted {
                    self.auth_event = None;
                    let blocked: Vec<String> = self.auth_blocked.drain().collect();
                    for id in blocked {
                        let command = self.assembler.reopen(&id);
                        self.send_opt(command).await?;
                    }
                }
                self.ok_replies.insert(
                    event_id,
                    OkReply {
                        accepted,
                        message: message.clone(),
                    },
                );
                Ok(Some(RelayNotification::Ok {
                    event_id,
                    accepted,
                    message,
                }))
            }

            RelayMessage::Closed {
                subscription_id,
                message,
            } => {
                tracing::debug!(relay = %self.url, subscription = %subscription_id, %message, "subscription closed by relay");
                if message.starts_with(AUTH_REQUIRED_PREFIX) {
                    self.auth_blocked.insert(subscription_id.clone());
                }
                let command = self.assembler.on_closed(&subscription_id);
                self.send_opt(command).await?;
                Ok(Some(RelayNotification::Closed {
                    subscription_id,
                    message,
                }))
            }

            RelayMessage::Notice(message) => {
                tracing::debug!(relay = %self.url, %message, "notice");
                Ok(Some(RelayNotification::Notice(message)))
            }

            RelayMessage::Auth(challenge) => {
                self.challenge = Some(challenge.clone());
                let can_sign = self
                    .signer
                    .as_ref()
                    .map_or(false, |signer| signer.is_writeable());
                let answered = if self.config.auto_auth && can_sign {
                    self.authenticate(&challenge).await?;
                    true
                } else {
                    false
                };
                Ok(Some(RelayNotification::AuthChallenge {
                    challenge,
                    answered,
                }))
            }

            RelayMessage::Count {
                subscription_id,
                count,
                approximate,
            } => Ok(Some(RelayNotification::Count {
                subscription_id,
                count,
                approximate,
            })),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // One-shot fetch
    // ─────────────────────────────────────────────────────────────────────────

    /// Run `filters` once through every window, store what arrives and close
    /// the subscription after the last EOSE.
    pub async fn fetch_into<S>(&mut self, store: &S, filters: Vec<Filter>) -> Result<FetchReport>
    where
        S: EventStore + ?Sized,
    {
        let mut report = FetchReport::default();
        if filters.is_empty() {
            return Ok(report);
        }

        let subscription_id = new_subscription_id();
        let dropped_before = self.dropped;
        self.one_shot.insert(subscription_id.clone());
        self.subscribe(&subscription_id, filters).await?;

        loop {
            let notification = match self.next_notification().await? {
                Some(notification) => notification,
                None => return Err(RelayError::Closed),
            };

            match notification {
                RelayNotification::Event {
                    subscription_id: sub,
                    event,
                } if sub == subscription_id => {
                    report.received += 1;
                    match store.insert(&event).await {
                        Ok(InsertResult::Inserted) => report.inserted += 1,
                        Ok(InsertResult::AlreadyExists) => report.duplicates += 1,
                        Err(StoreError::Rejected(_)) => report.rejected += 1,
                        Err(err) => return Err(err.into()),
                    }
                }
                RelayNotification::Eose(sub) if sub == subscription_id => {
                    if !self.assembler.contains(&subscription_id) {
                        break;
                    }
                }
                RelayNotification::Closed {
                    subscription_id: sub,
                    ..
                } if sub == subscription_id => {
                    if !self.auth_blocked.contains(&subscription_id) {
                        report.closed_early = true;
                        self.unsubscribe(&subscription_id).await?;
                        break;
                    }
                }
                _ => {}
            }
        }

        report.invalid = self.dropped - dropped_before;
        tracing::debug!(relay = %self.url, ?report, "fetch finished");
        Ok(report)
    }
}
