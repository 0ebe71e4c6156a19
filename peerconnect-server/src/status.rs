use peerconnect_common::{Connection, ConnectionRequest, ConnectionStatus, RecordStatus, Relation, UserId};
use serde::{Deserialize, Serialize};

/// The three collections the connection store keeps in memory.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collections {
    pub connections: Vec<Connection>,
    pub sent_requests: Vec<ConnectionRequest>,
    pub received_requests: Vec<ConnectionRequest>,
}

impl Collections {
    /// Accepted connection wins over a pending sent request, which wins over a
    /// pending received one. An empty viewer id always sees `None`.
    pub fn relation(&self, target: &UserId, current: &UserId) -> Relation {
        if current.is_empty() {
            return Relation::None;
        }
        if self.is_connected(target, current) {
            Relation::Accepted
        } else if self.sent_requests.iter().any(|req| req.is_pending_between(current, target)) {
            Relation::PendingSent
        } else if self.received_requests.iter().any(|req| req.is_pending_between(target, current)) {
            Relation::PendingReceived
        } else {
            Relation::None
        }
    }

    pub fn status(&self, target: &UserId, current: &UserId) -> ConnectionStatus {
        self.relation(target, current).into()
    }

    pub fn is_connected(&self, a: &UserId, b: &UserId) -> bool {
        self.connections
            .iter()
            .any(|conn| conn.status == RecordStatus::Accepted && conn.links(a, b))
    }

    pub fn connections_for_user(&self, user: &UserId) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|conn| conn.status == RecordStatus::Accepted && conn.involves(user))
            .cloned()
            .collect()
    }

    pub fn pending_sent_count(&self) -> usize {
        self.sent_requests
            .iter()
            .filter(|req| req.status == RecordStatus::Pending)
            .count()
    }
}
