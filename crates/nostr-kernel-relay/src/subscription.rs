//! EOSE-driven subscription assembly for one relay.
//!
//! Callers say which filters each subscription should have. The assembler
//! decides which REQ/CLOSE frames to send so that:
//!
//! - a REQ never carries more than `max_filters_per_req` filters; longer
//!   lists are walked in windows, advancing each time the relay reports EOSE
//! - once every window has been through EOSE the walk starts over, and each
//!   filter is re-issued with `since` set to the last EOSE that covered it
//! - a subscription waiting for EOSE is never re-sent (two REQs in flight
//!   under one id make the EOSEs ambiguous); changes are applied after it

use std::collections::BTreeMap;

use nostr_kernel_core::{Filter, Timestamp};

use crate::messages::ClientCommand;

/// Where a subscription stands with the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubStatus {
    /// Not sent on the current connection.
    Idle,
    /// REQ sent, stored events still arriving.
    Sent,
    /// EOSE received, only new events arrive.
    Live,
    /// The relay closed it.
    Closed,
}

#[derive(Debug)]
struct SubState {
    desired: Vec<Filter>,
    cursor: usize,
    last_eose: Vec<Option<Timestamp>>,
    status: SubStatus,
    sent: Option<Vec<Filter>>,
    pending: Option<Vec<Filter>>,
    events: usize,
}

impl SubState {
    fn new(desired: Vec<Filter>) -> Self {
        let len = desired.len();
        Self {
            desired,
            cursor: 0,
            last_eose: vec![None; len],
            status: SubStatus::Idle,
            sent: None,
            pending: None,
            events: 0,
        }
    }

    /// Swap in filters staged while a REQ was in flight. The walk restarts.
    fn apply_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(filters) => {
                self.last_eose = vec![None; filters.len()];
                self.desired = filters;
                self.cursor = 0;
                true
            }
            None => false,
        }
    }

    fn window(&self, max: usize) -> std::ops::Range<usize> {
        let end = (self.cursor + max).min(self.desired.len());
        self.cursor..end
    }
}

/// Per-relay subscription bookkeeping.
#[derive(Debug)]
pub struct SubscriptionAssembler {
    max_filters_per_req: usize,
    subs: BTreeMap<String, SubState>,
}

impl SubscriptionAssembler {
    /// `max_filters_per_req` is clamped to at least one.
    pub fn new(max_filters_per_req: usize) -> Self {
        Self {
            max_filters_per_req: max_filters_per_req.max(1),
            subs: BTreeMap::new(),
        }
    }

    pub fn max_filters_per_req(&self) -> usize {
        self.max_filters_per_req
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub fn contains(&self, subscription_id: &str) -> bool {
        self.subs.contains_key(subscription_id)
    }

    pub fn status(&self, subscription_id: &str) -> Option<SubStatus> {
        self.subs.get(subscription_id).map(|s| s.status)
    }

    /// Filters of the last REQ sent for this subscription.
    pub fn active_filters(&self, subscription_id: &str) -> Option<&[Filter]> {
        self.subs
            .get(subscription_id)
            .and_then(|s| s.sent.as_deref())
    }

    /// Events seen for this subscription on the current connection.
    pub fn event_count(&self, subscription_id: &str) -> usize {
        self.subs.get(subscription_id).map_or(0, |s| s.events)
    }

    /// Whether the window in flight is the last one of the current pass.
    pub fn is_final_window(&self, subscription_id: &str) -> bool {
        self.subs.get(subscription_id).map_or(false, |s| {
            s.cursor + self.max_filters_per_req >= s.desired.len()
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Caller intent
    // ─────────────────────────────────────────────────────────────────────────

    /// Set the filters of a subscription. An empty list unsubscribes.
    pub fn subscribe(
        &mut self,
        subscription_id: &str,
        filters: Vec<Filter>,
    ) -> Option<ClientCommand> {
        if filters.is_empty() {
            return self.unsubscribe(subscription_id);
        }

        let status = match self.subs.get_mut(subscription_id) {
            Some(state) if state.status == SubStatus::Sent => {
                // The open REQ stays as it is until its EOSE or CLOSED.
                state.pending = (state.desired != filters).then_some(filters);
                return None;
            }
            Some(state) if state.desired == filters => return None,
            Some(state) => state.status,
            None => SubStatus::Idle,
        };

        let mut state = SubState::new(filters);
        state.status = status;
        self.subs.insert(subscription_id.to_string(), state);
        self.issue(subscription_id)
    }

    /// Forget a subscription, closing it if the relay knows about it.
    pub fn unsubscribe(&mut self, subscription_id: &str) -> Option<ClientCommand> {
        let state = self.subs.remove(subscription_id)?;
        match state.status {
            SubStatus::Sent | SubStatus::Live => {
                Some(ClientCommand::Close(subscription_id.to_string()))
            }
            SubStatus::Idle | SubStatus::Closed => None,
        }
    }

    /// Forget every subscription, returning a CLOSE for each one the relay
    /// knows about.
    pub fn unsubscribe_all(&mut self) -> Vec<ClientCommand> {
        let ids: Vec<String> = self.subs.keys().cloned().collect();
        ids.iter().filter_map(|id| self.unsubscribe(id)).collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relay feedback
    // ─────────────────────────────────────────────────────────────────────────

    /// Count an event. Returns false for unknown subscriptions.
    pub fn on_event(&mut self, subscription_id: &str) -> bool {
        match self.subs.get_mut(subscription_id) {
            Some(state) => {
                state.events += 1;
                true
            }
            None => false,
        }
    }

    /// Handle EOSE received at `now`, returning the next REQ if one is due.
    pub fn on_eose(&mut self, subscription_id: &str, now: Timestamp) -> Option<ClientCommand> {
        let max = self.max_filters_per_req;
        let state = self.subs.get_mut(subscription_id)?;
        if state.status != SubStatus::Sent {
            state.status = SubStatus::Live;
            return None;
        }
        state.status = SubStatus::Live;

        if state.apply_pending() {
            return self.issue(subscription_id);
        }

        for i in state.window(max) {
            state.last_eose[i] = Some(now);
        }
        if state.desired.len() <= max {
            return None;
        }

        state.cursor += max;
        if state.cursor >= state.desired.len() {
            state.cursor = 0;
        }
        tracing::debug!(
            subscription = subscription_id,
            cursor = state.cursor,
            total = state.desired.len(),
            "rotating filter window"
        );
        self.issue(subscription_id)
    }

    /// Handle CLOSED. If the caller changed the filters meanwhile, the new
    /// version is sent.
    pub fn on_closed(&mut self, subscription_id: &str) -> Option<ClientCommand> {
        let state = self.subs.get_mut(subscription_id)?;
        state.status = SubStatus::Closed;
        state.sent = None;
        if state.apply_pending() {
            return self.issue(subscription_id);
        }
        None
    }

    /// Send the current window again, for example after authenticating.
    pub fn reopen(&mut self, subscription_id: &str) -> Option<ClientCommand> {
        match self.status(subscription_id)? {
            SubStatus::Sent => None,
            _ => self.issue(subscription_id),
        }
    }

    /// The connection dropped; nothing is open on the relay any more.
    pub fn on_disconnected(&mut self) {
        for state in self.subs.values_mut() {
            state.status = SubStatus::Idle;
            state.sent = None;
            state.apply_pending();
            state.events = 0;
        }
    }

    /// REQs for every subscription not currently open, e.g. after reconnecting.
    pub fn resync(&mut self) -> Vec<ClientCommand> {
        let idle: Vec<String> = self
            .subs
            .iter()
            .filter(|(_, s)| s.status == SubStatus::Idle)
            .map(|(id, _)| id.clone())
            .collect();
        idle.iter().filter_map(|id| self.issue(id)).collect()
    }

    fn issue(&mut self, subscription_id: &str) -> Option<ClientCommand> {
        let max = self.max_filters_per_req;
        let state = self.subs.get_mut(subscription_id)?;

        let filters: Vec<Filter> = state
            .window(max)
            .map(|i| {
                let mut filter = state.desired[i].clone();
                if let Some(eose) = state.last_eose[i] {
                    filter.since = Some(filter.since.map_or(eose, |s| s.max(eose)));
                }
                filter
            })
            .collect();

        state.status = SubStatus::Sent;
        state.sent = Some(filters.clone());
        Some(ClientCommand::req(subscription_id, filters))
    }
}
