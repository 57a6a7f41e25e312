//! Offer glare, trickle ICE and messages that must be ignored

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use parking_lot::Mutex;
use peercall_session_core::prelude::*;
use peercall_session_core::{ConnectionEvents, MediaConnection, MediaTransportEngine, SdpType, TransportConfig};

#[tokio::test]
async fn simultaneous_offers_resolve_to_one_call() {
    let network = LoopbackNetwork::new();
    let relay = MemoryRelay::new();
    let alice = peer(&network, &relay, config("alice")).await;
    let bob = peer(&network, &relay, config("bob")).await;

    alice.orchestrator.start_call("bob").await.unwrap();
    bob.orchestrator.start_call("alice").await.unwrap();

    wait_for_state(&alice, "bob", ConnectionState::Connected).await;
    wait_for_state(&bob, "alice", ConnectionState::Connected).await;

    // The lower identity yields and answers
    let alice_side = alice.orchestrator.session_snapshot(&"bob".into()).unwrap();
    let bob_side = bob.orchestrator.session_snapshot(&"alice".into()).unwrap();
    assert_eq!(alice_side.role, Role::Answerer);
    assert_eq!(bob_side.role, Role::Offerer);

    let answers: Vec<_> = relay
        .history()
        .into_iter()
        .filter(|e| e.kind() == "answer")
        .collect();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].sender().as_str(), "alice");

    // Media flows over the surviving connection
    alice.devices.capture(&"bob".into()).push(&[7; 160]);
    let speaker = bob.devices.sink(&"alice".into());
    wait_until(|| speaker.chunk_count() == 1, "bob to play alice's chunk").await;
}

#[tokio::test]
async fn trickle_candidates_follow_the_description() {
    let network = LoopbackNetwork::new();
    let relay = MemoryRelay::new();
    let alice = peer(&network, &relay, config("alice").with_trickle_ice(true)).await;
    let bob = peer(&network, &relay, config("bob").with_trickle_ice(true)).await;

    alice.orchestrator.start_call("bob").await.unwrap();
    wait_for_state(&alice, "bob", ConnectionState::Connected).await;
    wait_for_state(&bob, "alice", ConnectionState::Connected).await;

    let history = relay.history();
    for sender in ["alice", "bob"] {
        let kinds: Vec<_> = history
            .iter()
            .filter(|e| e.sender().as_str() == sender)
            .map(|e| e.kind())
            .collect();
        let description = kinds.iter().position(|k| *k == "offer" || *k == "answer").unwrap();
        let candidate = kinds.iter().position(|k| *k == "candidate").unwrap();
        assert!(description < candidate, "{} sent {:?}", sender, kinds);
    }

    wait_until(
        || network.remote_candidates(&"bob".into(), &"alice".into()).len() == 1,
        "bob to apply alice's candidate",
    )
    .await;
    assert!(network.remote_candidates(&"bob".into(), &"alice".into())[0].contains("typ host"));
}

#[tokio::test]
async fn full_descriptions_send_no_candidates() {
    let network = LoopbackNetwork::new();
    let relay = MemoryRelay::new();
    let alice = peer(&network, &relay, config("alice")).await;
    let _bob = peer(&network, &relay, config("bob")).await;

    alice.orchestrator.start_call("bob").await.unwrap();
    wait_for_state(&alice, "bob", ConnectionState::Connected).await;

    assert!(relay.history().iter().all(|e| e.kind() != "candidate"));
}

#[tokio::test]
async fn stray_and_malformed_messages_are_ignored() {
    let network = LoopbackNetwork::new();
    let relay = MemoryRelay::new();
    let alice = peer(&network, &relay, config("alice")).await;
    let _bob = peer(&network, &relay, config("bob")).await;
    let alice_id = PeerIdentity::from("alice");

    assert!(relay.inject(&alice_id, "definitely not json"));
    assert!(relay.inject(&alice_id, r#"{"type":"hangup","MyId":"bob"}"#));
    let stray_answer = SignalingEnvelope::answer("mallory".into(), alice_id.clone(), "v=0\r\n");
    assert!(relay.inject(&alice_id, stray_answer.to_json().unwrap()));
    let misrouted = SignalingEnvelope::offer("carol".into(), "dave".into(), "v=0\r\n");
    assert!(relay.inject(&alice_id, misrouted.to_json().unwrap()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(alice.orchestrator.active_sessions().is_empty());

    // The reader is still alive and the call still works
    alice.orchestrator.start_call("bob").await.unwrap();
    wait_for_state(&alice, "bob", ConnectionState::Connected).await;

    // A late answer for an established call changes nothing
    let late = SignalingEnvelope::answer("bob".into(), alice_id.clone(), "v=0\r\n");
    relay.inject(&alice_id, late.to_json().unwrap());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        alice.orchestrator.session_state(&"bob".into()),
        Some(ConnectionState::Connected)
    );
}

#[tokio::test]
async fn offer_for_live_session_is_discarded() {
    let network = LoopbackNetwork::new();
    let relay = MemoryRelay::new();
    let alice = peer(&network, &relay, config("alice")).await;
    let bob = peer(&network, &relay, config("bob")).await;

    alice.orchestrator.start_call("bob").await.unwrap();
    wait_for_state(&bob, "alice", ConnectionState::Connected).await;
    let before = bob.orchestrator.session_snapshot(&"alice".into()).unwrap();

    let repeat = SignalingEnvelope::offer("alice".into(), "bob".into(), "v=0\r\n");
    relay.inject(&"bob".into(), repeat.to_json().unwrap());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = bob.orchestrator.session_snapshot(&"alice".into()).unwrap();
    assert_eq!(after.session_id, before.session_id);
    assert_eq!(after.state, ConnectionState::Connected);
}

#[tokio::test]
async fn calling_yourself_is_rejected() {
    let network = LoopbackNetwork::new();
    let relay = MemoryRelay::new();
    let alice = peer(&network, &relay, config("alice")).await;

    assert!(matches!(
        alice.orchestrator.start_call("alice").await,
        Err(SessionError::Protocol(_))
    ));
    assert!(alice.orchestrator.active_sessions().is_empty());
}

/// Accepts registration, refuses everything else
struct RefusingChannel;

#[async_trait]
impl SignalingChannel for RefusingChannel {
    async fn send(&self, message: String) -> Result<()> {
        if message.contains(r#""type":"register""#) {
            Ok(())
        } else {
            Err(SessionError::signaling("relay unreachable"))
        }
    }
}

#[tokio::test]
async fn failed_description_send_fails_the_session() {
    let network = LoopbackNetwork::new();
    let devices = Arc::new(MemoryDevices::new());
    let orchestrator = SignalingOrchestrator::new(
        config("alice"),
        Arc::new(network.engine("alice")),
        Arc::new(RefusingChannel),
        devices,
    )
    .unwrap();
    orchestrator.register().await.unwrap();
    let mut events = orchestrator.subscribe();

    orchestrator.start_call("bob").await.unwrap();

    let ended = tokio::time::timeout(WAIT, async {
        loop {
            if let Ok(CallEvent::CallEnded { state, reason, .. }) = events.recv().await {
                return (state, reason);
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(ended.0, ConnectionState::Failed);
    assert!(ended.1.contains("offer"));
    assert_eq!(orchestrator.session_state(&"bob".into()), None);
}

#[tokio::test]
async fn candidate_without_session_is_discarded() {
    let network = LoopbackNetwork::new();
    let relay = MemoryRelay::new();
    let alice = peer(&network, &relay, config("alice")).await;
    let _bob = peer(&network, &relay, config("bob")).await;
    let alice_id = PeerIdentity::from("alice");

    let orphan = SignalingEnvelope::candidate("mallory".into(), alice_id.clone(), "a=candidate:9 1 UDP 1 10.0.0.9 9 typ host", "0");
    relay.inject(&alice_id, orphan.to_json().unwrap());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(alice.orchestrator.active_sessions().is_empty());

    alice.orchestrator.start_call("bob").await.unwrap();
    wait_for_state(&alice, "bob", ConnectionState::Connected).await;
    let before = alice.orchestrator.session_snapshot(&"bob".into()).unwrap();
    let applied = network.remote_candidates(&alice_id, &"bob".into());

    // A candidate from an identity with no session touches nothing
    relay.inject(&alice_id, orphan.to_json().unwrap());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(alice.orchestrator.active_sessions(), vec![PeerIdentity::from("bob")]);
    let after = alice.orchestrator.session_snapshot(&"bob".into()).unwrap();
    assert_eq!(after.session_id, before.session_id);
    assert_eq!(after.state, ConnectionState::Connected);
    assert_eq!(network.remote_candidates(&alice_id, &"bob".into()), applied);
}

/// Connection that accepts every call and never reports progress
#[derive(Default)]
struct StalledConnection {
    remote_descriptions: Mutex<Vec<String>>,
}

impl MediaConnection for StalledConnection {
    fn set_local_description(&self, _kind: SdpType) -> Result<()> {
        Ok(())
    }

    fn set_remote_description(&self, sdp: &str, _kind: SdpType) -> Result<()> {
        self.remote_descriptions.lock().push(sdp.to_string());
        Ok(())
    }

    fn add_remote_candidate(&self, _candidate: &str, _mid: &str) -> Result<()> {
        Ok(())
    }

    fn send(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}
}

#[derive(Default)]
struct StalledEngine {
    connections: Mutex<Vec<Arc<StalledConnection>>>,
}

impl MediaTransportEngine for StalledEngine {
    fn create_connection(
        &self,
        _remote: &PeerIdentity,
        _config: &TransportConfig,
        _events: ConnectionEvents,
    ) -> Result<Arc<dyn MediaConnection>> {
        let connection = Arc::new(StalledConnection::default());
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

#[tokio::test]
async fn answer_while_still_gathering_is_discarded() {
    let relay = MemoryRelay::new();
    let engine = Arc::new(StalledEngine::default());
    let (channel, inbound) = relay.connect();
    let alice = SignalingOrchestrator::new(
        config("alice"),
        engine.clone(),
        Arc::new(channel),
        Arc::new(MemoryDevices::new()),
    )
    .unwrap();
    alice.spawn_signaling_reader(inbound);
    alice.register().await.unwrap();

    alice.start_call("bob").await.unwrap();
    let bob_id = PeerIdentity::from("bob");
    let before = alice.session_snapshot(&bob_id).unwrap();
    assert_eq!(before.state, ConnectionState::GatheringLocalDescription);

    let early = SignalingEnvelope::answer(bob_id.clone(), "alice".into(), "v=0\r\n");
    relay.inject(&"alice".into(), early.to_json().unwrap());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(alice.active_sessions(), vec![bob_id.clone()]);
    let after = alice.session_snapshot(&bob_id).unwrap();
    assert_eq!(after.session_id, before.session_id);
    assert_eq!(after.state, ConnectionState::GatheringLocalDescription);
    assert!(engine.connections.lock()[0].remote_descriptions.lock().is_empty());
}
