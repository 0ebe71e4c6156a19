//! Connection requests and established connections for the current user.
//!
//! State machine per unordered pair of users:
//!
//! ```text
//! NONE             --send-->    PENDING_SENT --(accept | auto-accept)--> ACCEPTED
//! PENDING_RECEIVED --accept-->  ACCEPTED
//! PENDING_RECEIVED --decline--> NONE
//! PENDING_SENT     --cancel-->  NONE
//! ACCEPTED         --remove-->  NONE
//! ```
//!
//! Declined and cancelled requests are deleted, so the same pair can start
//! over immediately.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use peerconnect_common::{
    Connection, ConnectionId, ConnectionRequest, ConnectionStatus, RecordStatus, Relation, RequestId,
    SendOutcome, UserId,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{AcceptPolicy, StoreConfig};
use crate::status::Collections;
use crate::storage::{Storage, StorageKey};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("user not identified, cannot send connection request")]
    NoCurrentUser,
    #[error("no target user given for the connection request")]
    NoTargetUser,
    #[error("connection request is addressed to {0}, not the current user")]
    WrongReceiver(UserId),
    #[error("a user cannot connect with themselves")]
    SelfConnection,
    #[error("already connected with user {0}")]
    AlreadyConnected(UserId),
    #[error("a connection request with user {0} is already pending")]
    AlreadyPending(UserId),
    #[error("connection request {0} not found")]
    RequestNotFound(RequestId),
    #[error("message is {len} characters long, the limit is {max}")]
    MessageTooLong { len: usize, max: usize },
    #[error("connection limit of {0} reached")]
    ConnectionLimitReached(usize),
    #[error("pending request limit of {0} reached")]
    PendingLimitReached(usize),
    #[error("failed to persist {0}")]
    Persist(&'static str),
}

struct Loading<'a>(&'a AtomicUsize);

impl<'a> Loading<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ConnectionStore {
    storage: Storage,
    config: StoreConfig,
    state: RwLock<Collections>,
    in_flight: AtomicUsize,
}

impl ConnectionStore {
    pub fn open(storage: Storage, config: StoreConfig) -> Self {
        let collections = hydrate(&storage);
        info!(
            connections = collections.connections.len(),
            sent = collections.sent_requests.len(),
            received = collections.received_requests.len(),
            policy = ?config.policy,
            "connection store hydrated"
        );
        Self {
            storage,
            config,
            state: RwLock::new(collections),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.read().connections.clone()
    }

    pub fn sent_requests(&self) -> Vec<ConnectionRequest> {
        self.read().sent_requests.clone()
    }

    pub fn received_requests(&self) -> Vec<ConnectionRequest> {
        self.read().received_requests.clone()
    }

    pub fn snapshot(&self) -> Collections {
        self.read().clone()
    }

    pub fn get_connection_status(&self, target: &UserId, current: &UserId) -> ConnectionStatus {
        self.read().status(target, current)
    }

    pub fn relation(&self, target: &UserId, current: &UserId) -> Relation {
        self.read().relation(target, current)
    }

    pub fn connections_for_user(&self, user: &UserId) -> Vec<Connection> {
        self.read().connections_for_user(user)
    }

    /// Re-reads every collection from storage, e.g. after an import.
    pub fn reload(&self) {
        *self.write() = hydrate(&self.storage);
    }

    /// Forgets in-memory state. Storage is left alone.
    pub fn reset(&self) {
        *self.write() = Collections::default();
    }

    pub async fn send_connection_request(
        &self,
        target: &UserId,
        current: &UserId,
        message: Option<String>,
    ) -> Result<SendOutcome, StoreError> {
        let _loading = Loading::start(&self.in_flight);
        if current.is_empty() {
            warn!("connection request without a current user");
            return Err(StoreError::NoCurrentUser);
        }
        if target.is_empty() {
            return Err(StoreError::NoTargetUser);
        }
        if target == current {
            return Err(StoreError::SelfConnection);
        }
        let limits = self.config.limits;
        if let Some(message) = &message {
            let len = message.chars().count();
            if len > limits.message_max_len {
                return Err(StoreError::MessageTooLong {
                    len,
                    max: limits.message_max_len,
                });
            }
        }

        let request = {
            let mut state = self.write();
            match state.relation(target, current) {
                Relation::None => {}
                Relation::Accepted => {
                    info!(%target, %current, "already connected");
                    return Err(StoreError::AlreadyConnected(target.clone()));
                }
                Relation::PendingSent | Relation::PendingReceived => {
                    info!(%target, %current, "request already pending");
                    return Err(StoreError::AlreadyPending(target.clone()));
                }
            }
            if state.connections_for_user(current).len() >= limits.max_connections {
                return Err(StoreError::ConnectionLimitReached(limits.max_connections));
            }
            if state.pending_sent_count() >= limits.max_pending_requests {
                return Err(StoreError::PendingLimitReached(limits.max_pending_requests));
            }

            let request = ConnectionRequest {
                id: RequestId(Uuid::new_v4().to_string()),
                sender_id: current.clone(),
                receiver_id: target.clone(),
                message,
                status: RecordStatus::Pending,
                created_at: Utc::now(),
            };
            let mut sent = state.sent_requests.clone();
            sent.push(request.clone());
            self.commit_sent(&mut state, sent)?;
            request
        };
        self.sync().await;
        debug!(request = %request.id.0, %target, "connection request stored");

        match self.config.policy {
            AcceptPolicy::Manual => Ok(SendOutcome::Pending(request)),
            AcceptPolicy::AutoAccept => {
                let connection = self.settle_sent(&request.id)?;
                self.sync().await;
                info!(connection = %connection.id.0, %target, "connection request auto-accepted");
                Ok(SendOutcome::Connected(connection))
            }
        }
    }

    pub async fn accept_connection_request(&self, request_id: &RequestId) -> Result<Connection, StoreError> {
        let _loading = Loading::start(&self.in_flight);
        let connection = {
            let mut state = self.write();
            let Some(request) = state.received_requests.iter().find(|req| &req.id == request_id).cloned() else {
                warn!(request = %request_id.0, "accept of unknown request");
                return Err(StoreError::RequestNotFound(request_id.clone()));
            };
            let (connection, connections) = link(&state, &request);
            let received = without_request(&state.received_requests, request_id);
            self.commit_link(&mut state, connections, Side::Received, received)?;
            connection
        };
        self.sync().await;
        info!(request = %request_id.0, connection = %connection.id.0, "connection request accepted");
        Ok(connection)
    }

    pub async fn decline_connection_request(&self, request_id: &RequestId) -> Result<(), StoreError> {
        let _loading = Loading::start(&self.in_flight);
        {
            let mut state = self.write();
            let received = without_request(&state.received_requests, request_id);
            if received.len() == state.received_requests.len() {
                debug!(request = %request_id.0, "declined request was not stored");
            }
            self.commit_received(&mut state, received)?;
        }
        self.sync().await;
        info!(request = %request_id.0, "connection request declined");
        Ok(())
    }

    pub async fn cancel_sent_request(&self, request_id: &RequestId) -> Result<(), StoreError> {
        let _loading = Loading::start(&self.in_flight);
        self.drop_sent(request_id)?;
        self.sync().await;
        info!(request = %request_id.0, "connection request cancelled");
        Ok(())
    }

    /// The receiver accepted a request the current user sent.
    pub async fn confirm_sent_request(&self, request_id: &RequestId) -> Result<Connection, StoreError> {
        let _loading = Loading::start(&self.in_flight);
        let connection = self.settle_sent(request_id)?;
        self.sync().await;
        info!(request = %request_id.0, connection = %connection.id.0, "sent request accepted by receiver");
        Ok(connection)
    }

    /// The receiver declined a request the current user sent.
    pub async fn sent_request_declined(&self, request_id: &RequestId) -> Result<(), StoreError> {
        let _loading = Loading::start(&self.in_flight);
        self.drop_sent(request_id)?;
        self.sync().await;
        info!(request = %request_id.0, "sent request declined by receiver");
        Ok(())
    }

    pub async fn remove_connection(&self, connection_id: &ConnectionId) -> Result<(), StoreError> {
        let _loading = Loading::start(&self.in_flight);
        {
            let mut state = self.write();
            let connections: Vec<_> = state
                .connections
                .iter()
                .filter(|conn| &conn.id != connection_id)
                .cloned()
                .collect();
            if connections.len() == state.connections.len() {
                debug!(connection = %connection_id.0, "removed connection was not stored");
            }
            self.commit_connections(&mut state, connections)?;
        }
        self.sync().await;
        info!(connection = %connection_id.0, "connection removed");
        Ok(())
    }

    /// Stores a request addressed to `current` by someone else.
    pub async fn receive_connection_request(
        &self,
        mut request: ConnectionRequest,
        current: &UserId,
    ) -> Result<ConnectionRequest, StoreError> {
        let _loading = Loading::start(&self.in_flight);
        if current.is_empty() {
            return Err(StoreError::NoCurrentUser);
        }
        if &request.receiver_id != current {
            warn!(receiver = %request.receiver_id, %current, "request for another user");
            return Err(StoreError::WrongReceiver(request.receiver_id.clone()));
        }
        if request.sender_id.is_empty() {
            return Err(StoreError::NoTargetUser);
        }
        if request.sender_id == request.receiver_id {
            return Err(StoreError::SelfConnection);
        }
        request.status = RecordStatus::Pending;
        {
            let mut state = self.write();
            if state.is_connected(&request.sender_id, &request.receiver_id) {
                return Err(StoreError::AlreadyConnected(request.sender_id.clone()));
            }
            let duplicate = state.received_requests.iter().any(|req| {
                req.id == request.id || req.is_pending_between(&request.sender_id, &request.receiver_id)
            });
            if duplicate {
                return Err(StoreError::AlreadyPending(request.sender_id.clone()));
            }
            let mut received = state.received_requests.clone();
            received.push(request.clone());
            self.commit_received(&mut state, received)?;
        }
        self.sync().await;
        info!(request = %request.id.0, sender = %request.sender_id, "connection request received");
        Ok(request)
    }

    /// Turns a stored sent request into a connection and drops the request.
    fn settle_sent(&self, request_id: &RequestId) -> Result<Connection, StoreError> {
        let mut state = self.write();
        let Some(request) = state.sent_requests.iter().find(|req| &req.id == request_id).cloned() else {
            // cancelled while the write was being flushed, or never sent
            warn!(request = %request_id.0, "settle of unknown sent request");
            return Err(StoreError::RequestNotFound(request_id.clone()));
        };
        let (connection, connections) = link(&state, &request);
        let sent = without_request(&state.sent_requests, request_id);
        self.commit_link(&mut state, connections, Side::Sent, sent)?;
        Ok(connection)
    }

    fn drop_sent(&self, request_id: &RequestId) -> Result<(), StoreError> {
        let mut state = self.write();
        let sent = without_request(&state.sent_requests, request_id);
        if sent.len() == state.sent_requests.len() {
            debug!(request = %request_id.0, "sent request was not stored");
        }
        self.commit_sent(&mut state, sent)
    }

    /// Persists the request list and, when given, the grown connection list
    /// in one batch. Memory is only touched once the batch is written.
    fn commit_link(
        &self,
        state: &mut Collections,
        connections: Option<Vec<Connection>>,
        side: Side,
        requests: Vec<ConnectionRequest>,
    ) -> Result<(), StoreError> {
        let written = match &connections {
            Some(connections) => self
                .storage
                .try_set_both((StorageKey::Connections, connections), (side.key(), &requests)),
            None => self.storage.try_set(side.key(), &requests),
        };
        if let Err(err) = written {
            error!(error = %err, "failed to persist accepted connection");
            return Err(StoreError::Persist("accepted connection"));
        }
        if let Some(connections) = connections {
            state.connections = connections;
        }
        match side {
            Side::Sent => state.sent_requests = requests,
            Side::Received => state.received_requests = requests,
        }
        Ok(())
    }

    fn commit_connections(&self, state: &mut Collections, connections: Vec<Connection>) -> Result<(), StoreError> {
        if !self.storage.set_connections(&connections) {
            return Err(StoreError::Persist("connections"));
        }
        state.connections = connections;
        Ok(())
    }

    fn commit_sent(&self, state: &mut Collections, requests: Vec<ConnectionRequest>) -> Result<(), StoreError> {
        if !self.storage.set_sent_requests(&requests) {
            return Err(StoreError::Persist("sent requests"));
        }
        state.sent_requests = requests;
        Ok(())
    }

    fn commit_received(&self, state: &mut Collections, requests: Vec<ConnectionRequest>) -> Result<(), StoreError> {
        if !self.storage.set_received_requests(&requests) {
            return Err(StoreError::Persist("received requests"));
        }
        state.received_requests = requests;
        Ok(())
    }

    async fn sync(&self) {
        if let Err(err) = self.storage.flush().await {
            error!(error = %err, "failed to flush storage");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Copy)]
enum Side {
    Sent,
    Received,
}

impl Side {
    fn key(self) -> StorageKey {
        match self {
            Side::Sent => StorageKey::SentRequests,
            Side::Received => StorageKey::ReceivedRequests,
        }
    }
}

/// The accepted connection for the request's pair. The second value is the
/// connection list to persist, `None` when the pair was already connected.
fn link(state: &Collections, request: &ConnectionRequest) -> (Connection, Option<Vec<Connection>>) {
    let existing = state.connections.iter().find(|conn| {
        conn.status == RecordStatus::Accepted && conn.links(&request.sender_id, &request.receiver_id)
    });
    if let Some(existing) = existing {
        debug!(connection = %existing.id.0, "pair already connected");
        return (existing.clone(), None);
    }
    let connection = Connection {
        id: ConnectionId(Uuid::new_v4().to_string()),
        user_id1: request.sender_id.clone(),
        user_id2: request.receiver_id.clone(),
        status: RecordStatus::Accepted,
        created_at: Utc::now(),
        message: request.message.clone(),
    };
    let mut connections = state.connections.clone();
    connections.push(connection.clone());
    (connection, Some(connections))
}

fn without_request(requests: &[ConnectionRequest], id: &RequestId) -> Vec<ConnectionRequest> {
    requests.iter().filter(|req| &req.id != id).cloned().collect()
}

fn hydrate(storage: &Storage) -> Collections {
    let mut collections = Collections {
        connections: storage.connections(),
        sent_requests: storage.sent_requests(),
        received_requests: storage.received_requests(),
    };
    let mut seen = HashSet::new();
    let before = collections.connections.len();
    collections
        .connections
        .retain(|conn| conn.status != RecordStatus::Accepted || seen.insert(conn.pair_key()));
    let dropped = before - collections.connections.len();
    if dropped > 0 {
        warn!(dropped, "dropped duplicate connections for the same pair");
        storage.set_connections(&collections.connections);
    }
    collections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::testing::{connection, request};

    fn id(s: &str) -> UserId {
        UserId::from(s)
    }

    fn manual() -> ConnectionStore {
        ConnectionStore::open(Storage::temporary().unwrap(), StoreConfig::default())
    }

    fn auto_accept() -> ConnectionStore {
        ConnectionStore::open(
            Storage::temporary().unwrap(),
            StoreConfig {
                policy: AcceptPolicy::AutoAccept,
                ..Default::default()
            },
        )
    }

    fn with_received(requests: Vec<ConnectionRequest>) -> ConnectionStore {
        let storage = Storage::temporary().unwrap();
        storage.set_received_requests(&requests);
        ConnectionStore::open(storage, StoreConfig::default())
    }

    fn lengths(store: &ConnectionStore) -> (usize, usize, usize) {
        let snapshot = store.snapshot();
        (
            snapshot.connections.len(),
            snapshot.sent_requests.len(),
            snapshot.received_requests.len(),
        )
    }

    #[tokio::test]
    async fn send_leaves_request_pending() {
        let store = manual();
        let outcome = store
            .send_connection_request(&id("B"), &id("A"), Some("Hi!".into()))
            .await
            .unwrap();
        let SendOutcome::Pending(request) = outcome else {
            panic!("expected a pending request");
        };
        assert_eq!(request.sender_id, id("A"));
        assert_eq!(request.receiver_id, id("B"));
        assert_eq!(request.message.as_deref(), Some("Hi!"));
        assert_eq!(store.sent_requests(), vec![request]);
        assert!(store.connections().is_empty());
        assert_eq!(store.get_connection_status(&id("B"), &id("A")), ConnectionStatus::Pending);
        assert_eq!(store.relation(&id("B"), &id("A")), Relation::PendingSent);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn send_with_auto_accept_connects() {
        let store = auto_accept();
        let outcome = store.send_connection_request(&id("B"), &id("A"), None).await.unwrap();
        let SendOutcome::Connected(connection) = outcome else {
            panic!("expected a connection");
        };
        assert_eq!(connection.pair_key(), (id("A"), id("B")));
        assert_eq!(connection.status, RecordStatus::Accepted);
        assert_eq!(store.connections(), vec![connection]);
        assert!(store.sent_requests().is_empty());
        assert!(store.received_requests().is_empty());
        assert_eq!(store.get_connection_status(&id("B"), &id("A")), ConnectionStatus::Accepted);
    }

    #[tokio::test]
    async fn duplicate_sends_change_nothing() {
        let store = manual();
        store.send_connection_request(&id("B"), &id("A"), None).await.unwrap();
        let before = store.snapshot();
        let err = store.send_connection_request(&id("B"), &id("A"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyPending(ref user) if user == &id("B")));
        assert_eq!(store.snapshot(), before);

        let store = auto_accept();
        store.send_connection_request(&id("B"), &id("A"), None).await.unwrap();
        let before = store.snapshot();
        let err = store.send_connection_request(&id("B"), &id("A"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyConnected(_)));
        // the reverse direction is the same pair
        let err = store.send_connection_request(&id("A"), &id("B"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyConnected(_)));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn send_is_blocked_by_a_received_request() {
        let store = with_received(vec![request("r1", "B", "A")]);
        let err = store.send_connection_request(&id("B"), &id("A"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyPending(_)));
        assert_eq!(lengths(&store), (0, 0, 1));
    }

    #[tokio::test]
    async fn send_rejects_bad_input() {
        let store = manual();
        assert!(matches!(
            store.send_connection_request(&id("B"), &id(""), None).await,
            Err(StoreError::NoCurrentUser)
        ));
        assert!(matches!(
            store.send_connection_request(&id(" "), &id("A"), None).await,
            Err(StoreError::NoTargetUser)
        ));
        assert!(matches!(
            store.send_connection_request(&id("A"), &id("A"), None).await,
            Err(StoreError::SelfConnection)
        ));
        assert!(matches!(
            store.send_connection_request(&id("B"), &id("A"), Some("x".repeat(201))).await,
            Err(StoreError::MessageTooLong { len: 201, max: 200 })
        ));
        assert_eq!(lengths(&store), (0, 0, 0));
    }

    #[tokio::test]
    async fn send_respects_limits() {
        let store = ConnectionStore::open(
            Storage::temporary().unwrap(),
            StoreConfig {
                policy: AcceptPolicy::Manual,
                limits: Limits {
                    max_pending_requests: 2,
                    ..Default::default()
                },
            },
        );
        store.send_connection_request(&id("B"), &id("A"), None).await.unwrap();
        store.send_connection_request(&id("C"), &id("A"), None).await.unwrap();
        assert!(matches!(
            store.send_connection_request(&id("D"), &id("A"), None).await,
            Err(StoreError::PendingLimitReached(2))
        ));

        let store = ConnectionStore::open(
            Storage::temporary().unwrap(),
            StoreConfig {
                policy: AcceptPolicy::AutoAccept,
                limits: Limits {
                    max_connections: 1,
                    ..Default::default()
                },
            },
        );
        store.send_connection_request(&id("B"), &id("A"), None).await.unwrap();
        assert!(matches!(
            store.send_connection_request(&id("C"), &id("A"), None).await,
            Err(StoreError::ConnectionLimitReached(1))
        ));
        assert_eq!(store.connections().len(), 1);
    }

    #[tokio::test]
    async fn accept_creates_one_connection() {
        let store = with_received(vec![request("r1", "S", "T"), request("r2", "X", "T")]);
        store.send_connection_request(&id("Y"), &id("T"), None).await.unwrap();
        let sent_before = store.sent_requests();

        let connection = store.accept_connection_request(&RequestId("r1".into())).await.unwrap();
        assert_eq!(connection.pair_key(), (id("S"), id("T")));
        assert_eq!(connection.status, RecordStatus::Accepted);
        assert_eq!(store.connections(), vec![connection]);
        let remaining: Vec<_> = store.received_requests().into_iter().map(|req| req.id.0).collect();
        assert_eq!(remaining, vec!["r2".to_string()]);
        assert_eq!(store.sent_requests(), sent_before);
        assert_eq!(store.get_connection_status(&id("S"), &id("T")), ConnectionStatus::Accepted);
    }

    #[tokio::test]
    async fn accepting_twice_reports_not_found() {
        let store = with_received(vec![request("r1", "S", "T")]);
        store.accept_connection_request(&RequestId("r1".into())).await.unwrap();
        let before = store.snapshot();
        let err = store.accept_connection_request(&RequestId("r1".into())).await.unwrap_err();
        assert!(matches!(err, StoreError::RequestNotFound(ref req) if req.0 == "r1"));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn accept_never_duplicates_a_pair() {
        let storage = Storage::temporary().unwrap();
        storage.set_connections(&[connection("c1", "T", "S")]);
        storage.set_received_requests(&[request("r1", "S", "T")]);
        let store = ConnectionStore::open(storage, StoreConfig::default());

        let connection = store.accept_connection_request(&RequestId("r1".into())).await.unwrap();
        assert_eq!(connection.id, ConnectionId("c1".into()));
        assert_eq!(store.connections().len(), 1);
        assert!(store.received_requests().is_empty());
    }

    #[tokio::test]
    async fn decline_and_cancel_produce_no_connection() {
        let store = with_received(vec![request("r1", "B", "A")]);
        let SendOutcome::Pending(sent) = store.send_connection_request(&id("C"), &id("A"), None).await.unwrap() else {
            panic!("manual policy must leave the request pending");
        };

        store.decline_connection_request(&RequestId("r1".into())).await.unwrap();
        store.cancel_sent_request(&sent.id).await.unwrap();
        assert_eq!(lengths(&store), (0, 0, 0));
        assert_eq!(store.get_connection_status(&id("B"), &id("A")), ConnectionStatus::None);
        assert_eq!(store.get_connection_status(&id("C"), &id("A")), ConnectionStatus::None);

        // declined users can ask again right away
        store.send_connection_request(&id("B"), &id("A"), None).await.unwrap();
        assert_eq!(store.get_connection_status(&id("B"), &id("A")), ConnectionStatus::Pending);
    }

    #[tokio::test]
    async fn decline_of_unknown_request_succeeds() {
        let store = with_received(vec![request("r1", "B", "A")]);
        store.decline_connection_request(&RequestId("nope".into())).await.unwrap();
        assert_eq!(lengths(&store), (0, 0, 1));
    }

    #[tokio::test]
    async fn remove_connection_touches_only_that_record() {
        let storage = Storage::temporary().unwrap();
        storage.set_connections(&[connection("c1", "A", "B"), connection("c2", "A", "C")]);
        storage.set_sent_requests(&[request("r1", "A", "D")]);
        storage.set_received_requests(&[request("r2", "E", "A")]);
        let store = ConnectionStore::open(storage, StoreConfig::default());

        store.remove_connection(&ConnectionId("c1".into())).await.unwrap();
        let ids: Vec<_> = store.connections().into_iter().map(|conn| conn.id.0).collect();
        assert_eq!(ids, vec!["c2".to_string()]);
        assert_eq!(store.sent_requests().len(), 1);
        assert_eq!(store.received_requests().len(), 1);
        assert_eq!(store.get_connection_status(&id("B"), &id("A")), ConnectionStatus::None);
    }

    #[tokio::test]
    async fn mutations_are_written_through() {
        let storage = Storage::temporary().unwrap();
        let store = ConnectionStore::open(storage.clone(), StoreConfig::default());
        store.send_connection_request(&id("B"), &id("A"), None).await.unwrap();
        store
            .receive_connection_request(request("r9", "C", "A"), &id("A"))
            .await
            .unwrap();
        store.accept_connection_request(&RequestId("r9".into())).await.unwrap();

        let reopened = ConnectionStore::open(storage, StoreConfig::default());
        assert_eq!(reopened.snapshot(), store.snapshot());
        assert_eq!(reopened.get_connection_status(&id("C"), &id("A")), ConnectionStatus::Accepted);
    }

    #[tokio::test]
    async fn receive_rejects_duplicates() {
        let store = manual();
        let mut incoming = request("r1", "B", "A");
        incoming.status = RecordStatus::Accepted;
        let stored = store.receive_connection_request(incoming, &id("A")).await.unwrap();
        assert_eq!(stored.status, RecordStatus::Pending);
        assert_eq!(store.relation(&id("B"), &id("A")), Relation::PendingReceived);

        assert!(matches!(
            store.receive_connection_request(request("r2", "B", "A"), &id("A")).await,
            Err(StoreError::AlreadyPending(_))
        ));
        assert!(matches!(
            store.receive_connection_request(request("r3", "A", "A"), &id("A")).await,
            Err(StoreError::SelfConnection)
        ));
        assert_eq!(store.received_requests().len(), 1);
    }

    #[tokio::test]
    async fn receive_only_accepts_requests_for_the_current_user() {
        let store = manual();
        assert!(matches!(
            store.receive_connection_request(request("r1", "A", "C"), &id("B")).await,
            Err(StoreError::WrongReceiver(ref user)) if user == &id("C")
        ));
        assert!(matches!(
            store.receive_connection_request(request("r1", "A", "B"), &id("")).await,
            Err(StoreError::NoCurrentUser)
        ));
        assert_eq!(lengths(&store), (0, 0, 0));
        assert!(store.accept_connection_request(&RequestId("r1".into())).await.is_err());
    }

    #[tokio::test]
    async fn receiver_acceptance_connects_the_sender() {
        let store = manual();
        let SendOutcome::Pending(sent) = store.send_connection_request(&id("B"), &id("A"), None).await.unwrap() else {
            panic!("manual policy must leave the request pending");
        };
        let connection = store.confirm_sent_request(&sent.id).await.unwrap();
        assert_eq!(connection.pair_key(), (id("A"), id("B")));
        assert_eq!(lengths(&store), (1, 0, 0));
        assert_eq!(store.relation(&id("B"), &id("A")), Relation::Accepted);

        // already consumed
        assert!(matches!(
            store.confirm_sent_request(&sent.id).await,
            Err(StoreError::RequestNotFound(_))
        ));
        assert_eq!(lengths(&store), (1, 0, 0));
    }

    #[tokio::test]
    async fn receiver_decline_clears_the_sent_request() {
        let store = manual();
        let SendOutcome::Pending(sent) = store.send_connection_request(&id("B"), &id("A"), None).await.unwrap() else {
            panic!("manual policy must leave the request pending");
        };
        store.sent_request_declined(&sent.id).await.unwrap();
        assert_eq!(lengths(&store), (0, 0, 0));
        assert_eq!(store.relation(&id("B"), &id("A")), Relation::None);
    }

    #[tokio::test]
    async fn failed_accept_changes_nothing() {
        let storage = Storage::temporary().unwrap();
        storage.set_received_requests(&[request("r1", "S", "T")]);
        let store = ConnectionStore::open(storage.clone(), StoreConfig::default());
        let before = store.snapshot();

        storage.set_read_only(true);
        let err = store.accept_connection_request(&RequestId("r1".into())).await.unwrap_err();
        assert!(matches!(err, StoreError::Persist(_)));
        assert_eq!(store.snapshot(), before);
        storage.set_read_only(false);

        let reopened = ConnectionStore::open(storage, StoreConfig::default());
        assert_eq!(reopened.snapshot(), before);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn failed_auto_accept_send_stores_nothing() {
        let storage = Storage::temporary().unwrap();
        let store = ConnectionStore::open(
            storage.clone(),
            StoreConfig {
                policy: AcceptPolicy::AutoAccept,
                ..Default::default()
            },
        );
        storage.set_read_only(true);
        assert!(matches!(
            store.send_connection_request(&id("B"), &id("A"), None).await,
            Err(StoreError::Persist(_))
        ));
        assert_eq!(lengths(&store), (0, 0, 0));
        storage.set_read_only(false);
        assert!(storage.connections().is_empty());
    }

    #[test]
    fn hydration_drops_duplicate_pairs() {
        let storage = Storage::temporary().unwrap();
        storage.set_connections(&[connection("c1", "A", "B"), connection("c2", "B", "A"), connection("c3", "A", "C")]);
        let store = ConnectionStore::open(storage.clone(), StoreConfig::default());
        let ids: Vec<_> = store.connections().into_iter().map(|conn| conn.id.0).collect();
        assert_eq!(ids, vec!["c1".to_string(), "c3".to_string()]);
        assert_eq!(storage.connections().len(), 2);
    }

    #[test]
    fn store_works_without_a_profile() {
        let store = manual();
        assert!(store.storage().user_profile().is_none());
        assert_eq!(store.get_connection_status(&id("B"), &id("")), ConnectionStatus::None);
        assert!(store.connections_for_user(&id("")).is_empty());
    }

    #[tokio::test]
    async fn reset_and_reload() {
        let storage = Storage::temporary().unwrap();
        let store = ConnectionStore::open(storage.clone(), StoreConfig::default());
        store.send_connection_request(&id("B"), &id("A"), None).await.unwrap();

        store.reset();
        assert_eq!(lengths(&store), (0, 0, 0));
        store.reload();
        assert_eq!(lengths(&store), (0, 1, 0));

        storage.clear_all();
        store.reload();
        assert_eq!(lengths(&store), (0, 0, 0));
    }
}
