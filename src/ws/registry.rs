//! Connection registry: a three-level scope/subscope/participant directory
//! of live WebSocket senders. Call signaling keys it by project/channel/user;
//! chat uses its own separate instance with the same keyspace shape.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::ConnectionSender;

/// participant id -> connection sender
type ParticipantMap = HashMap<String, ConnectionSender>;
/// subscope id -> participants
type SubscopeMap = HashMap<String, ParticipantMap>;

/// In-memory registry of live connections.
///
/// A (scope, subscope, participant) triple maps to at most one connection;
/// registering the same triple again replaces the entry (last writer wins)
/// and hands the superseded sender back to the caller, which is responsible
/// for closing it. Empty subscope and scope levels are pruned eagerly so the
/// table stays bounded by the number of live connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    scopes: Arc<DashMap<String, SubscopeMap>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            scopes: Arc::new(DashMap::new()),
        }
    }

    /// Insert or overwrite the mapping for a triple, creating intermediate
    /// levels as needed. Returns the superseded sender if one was present.
    pub fn register(
        &self,
        scope: &str,
        subscope: &str,
        participant: &str,
        conn: ConnectionSender,
    ) -> Option<ConnectionSender> {
        let mut entry = self.scopes.entry(scope.to_string()).or_default();
        let superseded = entry
            .entry(subscope.to_string())
            .or_default()
            .insert(participant.to_string(), conn);

        tracing::debug!(
            scope = %scope,
            subscope = %subscope,
            participant = %participant,
            replaced = superseded.is_some(),
            "connection registered"
        );
        superseded
    }

    /// Remove the mapping for a triple if present; no-op if absent.
    /// Empty subscope maps are deleted after the last participant leaves,
    /// and the scope entry after the last subscope is removed.
    pub fn unregister(&self, scope: &str, subscope: &str, participant: &str) {
        let mut prune_scope = false;
        if let Some(mut entry) = self.scopes.get_mut(scope) {
            if let Some(participants) = entry.get_mut(subscope) {
                participants.remove(participant);
                if participants.is_empty() {
                    entry.remove(subscope);
                }
            }
            prune_scope = entry.is_empty();
        }
        if prune_scope {
            self.scopes.remove_if(scope, |_, subscopes| subscopes.is_empty());
        }
    }

    /// Remove the mapping for a triple only if it still holds `conn`.
    ///
    /// A connection tearing down after being superseded by a reconnect must
    /// not evict its successor's registration; sessions use this instead of
    /// `unregister`. Returns true if the entry was removed.
    pub fn unregister_conn(
        &self,
        scope: &str,
        subscope: &str,
        participant: &str,
        conn: &ConnectionSender,
    ) -> bool {
        let mut removed = false;
        let mut prune_scope = false;
        if let Some(mut entry) = self.scopes.get_mut(scope) {
            if let Some(participants) = entry.get_mut(subscope) {
                if participants
                    .get(participant)
                    .is_some_and(|current| current.same_channel(conn))
                {
                    participants.remove(participant);
                    removed = true;
                }
                if participants.is_empty() {
                    entry.remove(subscope);
                }
            }
            prune_scope = entry.is_empty();
        }
        if prune_scope {
            self.scopes.remove_if(scope, |_, subscopes| subscopes.is_empty());
        }

        tracing::debug!(
            scope = %scope,
            subscope = %subscope,
            participant = %participant,
            removed,
            "connection unregistered"
        );
        removed
    }

    /// Non-mutating lookup of one participant's sender.
    pub fn lookup(
        &self,
        scope: &str,
        subscope: &str,
        participant: &str,
    ) -> Option<ConnectionSender> {
        self.scopes
            .get(scope)?
            .get(subscope)?
            .get(participant)
            .cloned()
    }

    /// Snapshot of every participant currently registered under
    /// (scope, subscope); empty if either level is absent. Broadcasts iterate
    /// this snapshot so the set cannot mutate mid-iteration.
    pub fn list(&self, scope: &str, subscope: &str) -> Vec<(String, ConnectionSender)> {
        self.scopes
            .get(scope)
            .and_then(|subscopes| {
                subscopes.get(subscope).map(|participants| {
                    participants
                        .iter()
                        .map(|(id, conn)| (id.clone(), conn.clone()))
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    /// True when no scope entries remain.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
