//! Mock transports for testing.
//!
//! Both mocks capture outbound traffic for verification and let tests raise
//! inbound events through the registered observer.

use super::{
    CompanionEvent, CompanionTransport, MeshEvent, MeshTransport, Observer, Reply, TransportError,
};
use async_trait::async_trait;
use deckrocket_types::PeerId;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Mock mesh transport.
///
/// Clones share state, so a test can keep a handle while the controller owns
/// another.
#[derive(Debug)]
pub struct MockMeshTransport {
    inner: Arc<Mutex<MockMeshInner>>,
}

#[derive(Debug)]
struct MockMeshInner {
    local: PeerId,
    started: bool,
    observer: Observer,
    connected: Vec<PeerId>,
    sent_messages: Vec<Vec<u8>>,
    invitations: Vec<(PeerId, Duration)>,
    fail_next_start: Option<String>,
    fail_next_send: Option<String>,
}

impl MockMeshTransport {
    /// Create a new mock mesh transport with a random identity.
    pub fn new() -> Self {
        Self::with_local_peer(PeerId::random())
    }

    /// Create a new mock mesh transport with a fixed identity.
    pub fn with_local_peer(local: PeerId) -> Self {
        let inner = MockMeshInner {
            local,
            started: false,
            observer: Observer::Unregistered,
            connected: Vec::new(),
            sent_messages: Vec::new(),
            invitations: Vec::new(),
            fail_next_start: None,
            fail_next_send: None,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Mark peers as in session with us.
    pub fn set_connected(&self, peers: &[PeerId]) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = peers.to_vec();
    }

    /// Get all payloads that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Get the last payload that was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.last().cloned()
    }

    /// Get every invitation issued, in order.
    pub fn invitations(&self) -> Vec<(PeerId, Duration)> {
        let inner = self.inner.lock().unwrap();
        inner.invitations.clone()
    }

    /// Check if `start()` succeeded.
    pub fn is_started(&self) -> bool {
        self.inner.lock().unwrap().started
    }

    /// Raise an event through the registered observer.
    pub fn emit(&self, event: MeshEvent) {
        let observer = self.inner.lock().unwrap().observer.clone();
        observer.mesh(event);
    }

    /// Cause the next start() to fail with the given error.
    pub fn fail_next_start(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_start = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Forget captured traffic, keeping identity and observer.
    pub fn clear_history(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.sent_messages.clear();
        inner.invitations.clear();
    }
}

impl Default for MockMeshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockMeshTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl MeshTransport for MockMeshTransport {
    fn local_peer(&self) -> PeerId {
        self.inner.lock().unwrap().local
    }

    async fn start(&self, observer: Observer) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_start.take() {
            return Err(TransportError::Bind(error));
        }
        if inner.started {
            return Err(TransportError::AlreadyStarted);
        }

        inner.started = true;
        inner.observer = observer;
        Ok(())
    }

    fn invite(&self, peer: PeerId, timeout: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.invitations.push((peer, timeout));
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        self.inner.lock().unwrap().connected.clone()
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.connected.is_empty() {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_messages.push(payload.to_vec());
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.started = false;
        inner.connected.clear();
        inner.observer = Observer::Unregistered;
        Ok(())
    }
}

/// Mock companion transport.
///
/// Starts unreachable. Clones share state.
#[derive(Debug, Default)]
pub struct MockCompanionTransport {
    inner: Arc<Mutex<MockCompanionInner>>,
}

#[derive(Debug, Default)]
struct MockCompanionInner {
    started: bool,
    reachable: bool,
    observer: Observer,
    sent_messages: Vec<Vec<u8>>,
    requests: Vec<Vec<u8>>,
    reply_queue: VecDeque<Vec<u8>>,
}

impl MockCompanionTransport {
    /// Create a new, unreachable mock companion transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set reachability without raising an event.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.lock().unwrap().reachable = reachable;
    }

    /// Get all payloads sent with `send_message_data`.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Get all payloads sent with `request`.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.requests.clone()
    }

    /// Queue the answer for the next `request()` call.
    pub fn queue_reply(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.reply_queue.push_back(data);
    }

    /// Check if `start()` succeeded.
    pub fn is_started(&self) -> bool {
        self.inner.lock().unwrap().started
    }

    /// Raise an event through the registered observer.
    pub fn emit(&self, event: CompanionEvent) {
        let observer = self.inner.lock().unwrap().observer.clone();
        observer.companion(event);
    }

    /// Deliver a message from the companion that expects an answer.
    ///
    /// Returns the receiver the answer will arrive on.
    pub fn deliver_request(&self, payload: Vec<u8>) -> oneshot::Receiver<Vec<u8>> {
        let (reply, rx) = Reply::channel();
        self.emit(CompanionEvent::Message { payload, reply });
        rx
    }

    /// Change reachability and raise the matching event.
    pub fn change_reachability(&self, reachable: bool) {
        self.set_reachable(reachable);
        self.emit(CompanionEvent::ReachabilityChanged { reachable });
    }
}

impl Clone for MockCompanionTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl CompanionTransport for MockCompanionTransport {
    async fn start(&self, observer: Observer) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.started {
            return Err(TransportError::AlreadyStarted);
        }
        inner.started = true;
        inner.observer = observer;
        Ok(())
    }

    fn is_reachable(&self) -> bool {
        self.inner.lock().unwrap().reachable
    }

    fn send_message_data(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.reachable {
            return Err(TransportError::NotConnected);
        }
        inner.sent_messages.push(payload.to_vec());
        Ok(())
    }

    async fn request(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.reachable {
            return Err(TransportError::NotConnected);
        }
        inner.requests.push(payload.to_vec());
        inner.reply_queue.pop_front().ok_or(TransportError::Timeout)
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.started = false;
        inner.reachable = false;
        inner.observer = Observer::Unregistered;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Dispatcher, Inbound};
    use deckrocket_core::ConnectionState;

    // ===========================================
    // MockMeshTransport Tests
    // ===========================================

    #[tokio::test]
    async fn mesh_send_requires_a_session() {
        let transport = MockMeshTransport::new();
        assert!(!transport.is_reachable());

        let result = transport.send(b"1");
        assert!(matches!(result, Err(TransportError::NotConnected)));
        assert!(transport.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn mesh_records_sent_payloads() {
        let transport = MockMeshTransport::new();
        transport.set_connected(&[PeerId::random()]);

        transport.send(b"1").unwrap();
        transport.send(b"2").unwrap();

        assert_eq!(transport.sent_messages(), vec![b"1".to_vec(), b"2".to_vec()]);
        assert_eq!(transport.last_sent(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn mesh_records_invitations() {
        let transport = MockMeshTransport::new();
        let peer = PeerId::random();

        transport.invite(peer, Duration::from_secs(30));

        assert_eq!(transport.invitations(), vec![(peer, Duration::from_secs(30))]);
    }

    #[tokio::test]
    async fn mesh_start_twice_fails() {
        let transport = MockMeshTransport::new();
        transport.start(Observer::Unregistered).await.unwrap();

        let result = transport.start(Observer::Unregistered).await;
        assert!(matches!(result, Err(TransportError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn mesh_forced_start_failure() {
        let transport = MockMeshTransport::new();
        transport.fail_next_start("port in use");

        let result = transport.start(Observer::Unregistered).await;
        assert!(matches!(result, Err(TransportError::Bind(_))));
        assert!(!transport.is_started());
    }

    #[tokio::test]
    async fn mesh_forced_send_failure() {
        let transport = MockMeshTransport::new();
        transport.set_connected(&[PeerId::random()]);
        transport.fail_next_send("radio off");

        assert!(transport.send(b"1").is_err());
        assert!(transport.send(b"1").is_ok());
    }

    #[tokio::test]
    async fn mesh_emit_reaches_observer() {
        let transport = MockMeshTransport::new();
        let (dispatcher, mut inbox) = Dispatcher::channel();
        transport
            .start(Observer::Dispatch(dispatcher))
            .await
            .unwrap();
        let peer = PeerId::random();

        transport.emit(MeshEvent::StateChanged {
            peer,
            state: ConnectionState::Connected,
        });

        assert!(matches!(
            inbox.try_recv().unwrap(),
            Inbound::Mesh(MeshEvent::StateChanged { state: ConnectionState::Connected, .. })
        ));
    }

    #[tokio::test]
    async fn mesh_clone_shares_state() {
        let transport = MockMeshTransport::new();
        let handle = transport.clone();
        transport.set_connected(&[PeerId::random()]);

        handle.send(b"7").unwrap();

        assert_eq!(transport.local_peer(), handle.local_peer());
        assert_eq!(transport.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn mesh_shutdown_drops_sessions() {
        let transport = MockMeshTransport::new();
        transport.start(Observer::Unregistered).await.unwrap();
        transport.set_connected(&[PeerId::random()]);

        transport.shutdown().await.unwrap();

        assert!(!transport.is_started());
        assert!(!transport.is_reachable());
    }

    // ===========================================
    // MockCompanionTransport Tests
    // ===========================================

    #[tokio::test]
    async fn companion_starts_unreachable() {
        let transport = MockCompanionTransport::new();
        assert!(!transport.is_reachable());

        let result = transport.send_message_data(b"deck");
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn companion_records_sent_payloads() {
        let transport = MockCompanionTransport::new();
        transport.set_reachable(true);

        transport.send_message_data(b"deck").unwrap();

        assert_eq!(transport.sent_messages(), vec![b"deck".to_vec()]);
    }

    #[tokio::test]
    async fn companion_request_returns_queued_reply() {
        let transport = MockCompanionTransport::new();
        transport.set_reachable(true);
        transport.queue_reply(b"pong".to_vec());

        let reply = transport.request(b"ping").await.unwrap();

        assert_eq!(reply, b"pong");
        assert_eq!(transport.requests(), vec![b"ping".to_vec()]);
    }

    #[tokio::test]
    async fn companion_request_without_reply_times_out() {
        let transport = MockCompanionTransport::new();
        transport.set_reachable(true);

        let result = transport.request(b"ping").await;
        assert!(matches!(result, Err(TransportError::Timeout)));
    }

    #[tokio::test]
    async fn companion_change_reachability_emits_event() {
        let transport = MockCompanionTransport::new();
        let (dispatcher, mut inbox) = Dispatcher::channel();
        transport
            .start(Observer::Dispatch(dispatcher))
            .await
            .unwrap();

        transport.change_reachability(true);

        assert!(transport.is_reachable());
        assert!(matches!(
            inbox.try_recv().unwrap(),
            Inbound::Companion(CompanionEvent::ReachabilityChanged { reachable: true })
        ));
    }

    #[tokio::test]
    async fn companion_deliver_request_carries_reply_slot() {
        let transport = MockCompanionTransport::new();
        let (dispatcher, mut inbox) = Dispatcher::channel();
        transport
            .start(Observer::Dispatch(dispatcher))
            .await
            .unwrap();

        let mut answer = transport.deliver_request(b"hello".to_vec());

        match inbox.try_recv().unwrap() {
            Inbound::Companion(CompanionEvent::Message { payload, reply }) => {
                assert_eq!(payload, b"hello");
                assert!(reply.send(payload));
            }
            other => panic!("unexpected inbound: {other:?}"),
        }
        assert_eq!(answer.try_recv().unwrap(), b"hello");
    }
}
