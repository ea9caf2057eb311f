//! Membership delegate — the payload and contract a gossip transport would
//! drive, plus a small in-process `Cluster` used to exercise that contract
//! without a real network.
//!
//! The real transport (anything implementing hashicorp/memberlist-style
//! eventual broadcast) is external to this crate; what lives here is only
//! the data a node publishes about itself and the no-op hooks the transport
//! would call into (`notify_msg`, `get_broadcasts`, `local_state`,
//! `merge_remote_state`), mirrored from the shape of a memberlist
//! `Delegate` implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{Result, StoreError};

/// What kind of node this delegate represents on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum NodeType {
    Store = 1,
    Metadata = 2,
}

/// The struct published to the gossip transport as JSON:
/// `{"node_type": <int>, "readonly": <bool>}`.
///
/// `readonly` is a shared [`AtomicBool`] so the container can flip it with
/// release semantics at the same moment it rewrites the on-disk flag, and any
/// thread reading `node_meta` concurrently observes the update with acquire
/// semantics — no separate lock is needed just to publish this one bit.
pub struct NodeDelegate {
    node_type: NodeType,
    readonly: AtomicBool,
}

#[derive(Serialize)]
struct WirePayload {
    node_type: u8,
    readonly: bool,
}

impl NodeDelegate {
    pub fn new(node_type: NodeType) -> Arc<Self> {
        Arc::new(Self {
            node_type,
            readonly: AtomicBool::new(false),
        })
    }

    pub fn set_readonly(&self, value: bool) {
        self.readonly.store(value, Ordering::Release);
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly.load(Ordering::Acquire)
    }

    /// Encode the current state as gossip `node_meta`. Exceeding `limit` is a
    /// fatal configuration error — in practice this payload is a handful of
    /// bytes and can only overflow a limit that was misconfigured.
    pub fn node_meta(&self, limit: usize) -> Result<Vec<u8>> {
        let payload = WirePayload {
            node_type: self.node_type as u8,
            readonly: self.is_readonly(),
        };
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| StoreError::ConfigError(format!("node_meta encode failed: {e}")))?;
        if bytes.len() > limit {
            return Err(StoreError::ConfigError(format!(
                "node_meta payload ({} B) exceeds gossip limit ({limit} B)",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Reserved for future use; the transport may deliver arbitrary
    /// user messages alongside membership updates. Must never panic.
    pub fn notify_msg(&self, _msg: &[u8]) {}

    /// Reserved for future use: additional broadcasts this node wants
    /// piggybacked on the next gossip round.
    pub fn get_broadcasts(&self, _overhead: usize, _limit: usize) -> Vec<Vec<u8>> {
        Vec::new()
    }

    /// Reserved for future use: full local state sent to a newly joining peer.
    pub fn local_state(&self, _join: bool) -> Vec<u8> {
        Vec::new()
    }

    /// Reserved for future use: a peer's full state received on join.
    pub fn merge_remote_state(&self, _buf: &[u8], _join: bool) {}
}

/// An in-process stand-in for the external gossip transport. Not a real
/// gossip protocol — no anti-entropy, no suspicion mechanism, no network —
/// just enough of a publish/subscribe surface to let tests and a local
/// single-process demo observe that a promoted node's `readonly` bit becomes
/// visible to its peers.
#[derive(Default)]
pub struct Cluster {
    members: Mutex<HashMap<String, Arc<NodeDelegate>>>,
    views: Mutex<HashMap<String, HashMap<String, bool>>>,
}

impl Cluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn join(&self, node_id: impl Into<String>, delegate: Arc<NodeDelegate>) {
        let node_id = node_id.into();
        self.members.lock().unwrap().insert(node_id.clone(), delegate);
        self.views.lock().unwrap().entry(node_id).or_default();
    }

    /// Copy `node_id`'s current `readonly` bit into every other member's view
    /// of it, synchronously — standing in for "reliable eventual broadcast"
    /// since there is no network latency to simulate locally.
    pub fn broadcast(&self, node_id: &str) {
        let readonly = {
            let members = self.members.lock().unwrap();
            match members.get(node_id) {
                Some(d) => d.is_readonly(),
                None => return,
            }
        };
        let mut views = self.views.lock().unwrap();
        for (id, view) in views.iter_mut() {
            if id != node_id {
                view.insert(node_id.to_string(), readonly);
            }
        }
    }

    /// What `observer` currently believes about `node_id`'s read-only state.
    pub fn view(&self, observer: &str, node_id: &str) -> Option<bool> {
        self.views
            .lock()
            .unwrap()
            .get(observer)
            .and_then(|v| v.get(node_id))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_meta_round_trips_through_json() {
        let d = NodeDelegate::new(NodeType::Store);
        let bytes = d.node_meta(1024).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["node_type"], 1);
        assert_eq!(parsed["readonly"], false);

        d.set_readonly(true);
        let bytes = d.node_meta(1024).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["readonly"], true);
    }

    #[test]
    fn node_meta_over_limit_is_fatal() {
        let d = NodeDelegate::new(NodeType::Store);
        let err = d.node_meta(1).unwrap_err();
        assert!(matches!(err, StoreError::ConfigError(_)));
    }

    #[test]
    fn reserved_hooks_never_panic() {
        let d = NodeDelegate::new(NodeType::Store);
        d.notify_msg(b"anything");
        assert!(d.get_broadcasts(0, 100).is_empty());
        assert!(d.local_state(true).is_empty());
        d.merge_remote_state(b"garbage", false);
    }

    #[test]
    fn cluster_propagates_readonly_on_broadcast() {
        let cluster = Cluster::new();
        let a = NodeDelegate::new(NodeType::Store);
        let b = NodeDelegate::new(NodeType::Store);
        let c = NodeDelegate::new(NodeType::Store);
        cluster.join("a", a.clone());
        cluster.join("b", b.clone());
        cluster.join("c", c.clone());

        assert_eq!(cluster.view("b", "a"), Some(false));

        a.set_readonly(true);
        cluster.broadcast("a");

        assert_eq!(cluster.view("b", "a"), Some(true));
        assert_eq!(cluster.view("c", "a"), Some(true));
    }
}
