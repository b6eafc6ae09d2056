//! Relay engine tests
//!
//! Drives the relay through its event entry points with a recording
//! transport sender, so every delivery decision is observable without
//! sockets.

use async_trait::async_trait;
use beacon_relay::{Connection, Relay, RelayConfig};
use beacon_transport::{Result as TransportResult, TransportError, TransportSender};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct RecordingSender {
    connected: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl RecordingSender {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn received(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).expect("relay emitted invalid JSON"))
            .collect()
    }

    fn received_of_type(&self, message_type: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|msg| msg["type"] == message_type)
            .collect()
    }
}

#[async_trait]
impl TransportSender for RecordingSender {
    async fn send(&self, text: String) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push(text);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> TransportResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

async fn connect(relay: &Relay) -> (Arc<Connection>, Arc<RecordingSender>) {
    let sender = RecordingSender::new();
    let connection = relay.on_connect(sender.clone()).await;
    (connection, sender)
}

async fn identify(relay: &Relay, connection: &Arc<Connection>, name: &str) {
    let frame = format!(r#"{{"type":"identification","sender":"{}"}}"#, name);
    relay.on_message(connection, &frame).await;
}

#[tokio::test]
async fn test_welcome_is_private() {
    let relay = Relay::default();
    let (_alice, alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;

    // Each peer sees exactly its own welcome, nothing from the other
    assert_eq!(alice_tx.received().len(), 1);
    assert_eq!(bob_tx.received().len(), 1);

    let welcome = &alice_tx.received()[0];
    assert_eq!(welcome["type"], "system");
    assert_eq!(welcome["sender"], "server");
    assert!(welcome["content"]
        .as_str()
        .unwrap()
        .contains("pending_1"));
}

#[tokio::test]
async fn test_identification_broadcasts_join() {
    let relay = Relay::default();
    let (alice, alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;

    identify(&relay, &alice, "Alice").await;

    assert!(alice.is_identified());
    assert_eq!(alice.identity(), "Alice");

    // Joined goes to everyone, the new peer included
    for tx in [&alice_tx, &bob_tx] {
        let systems = tx.received_of_type("system");
        let joined = systems.last().unwrap();
        assert_eq!(joined["content"], "Alice has connected.");
        assert_eq!(joined["sender"], "server");
        assert!(joined["timestamp"].is_u64());
    }
}

#[tokio::test]
async fn test_identification_is_never_rebroadcast() {
    let relay = Relay::default();
    let (alice, _alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;

    identify(&relay, &alice, "Alice").await;

    assert!(bob_tx.received_of_type("identification").is_empty());
}

#[tokio::test]
async fn test_broadcast_reaches_everyone_including_sender() {
    let relay = Relay::default();
    let (alice, alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;

    relay
        .on_message(
            &alice,
            r#"{"type":"action","action":"GOTO","data":{"x":1,"y":2,"z":3}}"#,
        )
        .await;

    for tx in [&alice_tx, &bob_tx] {
        let actions = tx.received_of_type("action");
        assert_eq!(actions.len(), 1, "exactly once per open connection");
        let action = &actions[0];
        assert_eq!(action["action"], "GOTO");
        assert_eq!(action["sender"], "Alice");
        assert_eq!(action["data"]["z"], 3);
        assert!(action["timestamp"].is_u64());
    }
}

#[tokio::test]
async fn test_declared_sender_is_kept() {
    let relay = Relay::default();
    let (alice, _alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;

    relay
        .on_message(&alice, r#"{"type":"chat","sender":"ChatTriggers","content":"hi"}"#)
        .await;

    let chat = &bob_tx.received_of_type("chat")[0];
    assert_eq!(chat["sender"], "ChatTriggers");
}

#[tokio::test]
async fn test_unidentified_traffic_is_dropped_silently() {
    let relay = Relay::default();
    let (alice, alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;

    let before = alice_tx.received().len();
    relay
        .on_message(&alice, r#"{"type":"chat","content":"hi"}"#)
        .await;

    // No broadcast, no error reply
    assert_eq!(alice_tx.received().len(), before);
    assert!(bob_tx.received_of_type("chat").is_empty());
    assert_eq!(relay.connection_count(), 2);
}

#[tokio::test]
async fn test_malformed_frame_gets_error_reply_and_connection_survives() {
    let relay = Relay::default();
    let (alice, alice_tx) = connect(&relay).await;
    let (bob, bob_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;
    identify(&relay, &bob, "Bob").await;

    relay.on_message(&alice, "not-json").await;

    let errors = alice_tx.received_of_type("error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["sender"], "server");
    assert!(bob_tx.received_of_type("error").is_empty(), "reply is private");
    assert_eq!(relay.connection_count(), 2);

    // A bad frame from one peer never blocks traffic from another
    relay
        .on_message(&bob, r#"{"type":"chat","content":"still here"}"#)
        .await;
    assert_eq!(alice_tx.received_of_type("chat").len(), 1);
}

#[tokio::test]
async fn test_non_object_json_is_malformed() {
    let relay = Relay::default();
    let (alice, alice_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;

    relay.on_message(&alice, "[1,2,3]").await;

    assert_eq!(alice_tx.received_of_type("error").len(), 1);
}

#[tokio::test]
async fn test_malformed_reply_can_be_disabled() {
    let relay = Relay::new(RelayConfig {
        reply_on_malformed: false,
        ..Default::default()
    });
    let (alice, alice_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;

    relay.on_message(&alice, "not-json").await;

    assert!(alice_tx.received_of_type("error").is_empty());
    assert_eq!(relay.connection_count(), 1);
}

#[tokio::test]
async fn test_identification_without_sender_is_rejected() {
    let relay = Relay::default();
    let (alice, alice_tx) = connect(&relay).await;

    relay.on_message(&alice, r#"{"type":"identification"}"#).await;
    relay
        .on_message(&alice, r#"{"type":"identification","sender":""}"#)
        .await;

    assert!(!alice.is_identified());
    assert_eq!(alice.identity(), "pending_1");
    assert_eq!(alice_tx.received_of_type("error").len(), 2);
}

#[tokio::test]
async fn test_reidentification_overwrites_and_reannounces() {
    let relay = Relay::default();
    let (alice, _alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;

    identify(&relay, &alice, "Alice").await;
    identify(&relay, &alice, "Alicia").await;

    assert_eq!(alice.identity(), "Alicia");
    assert!(alice.is_identified());

    let contents: Vec<String> = bob_tx
        .received_of_type("system")
        .iter()
        .filter_map(|msg| msg["content"].as_str().map(str::to_owned))
        .collect();
    assert!(contents.contains(&"Alice has connected.".to_string()));
    assert!(contents.contains(&"Alicia has connected.".to_string()));
}

#[tokio::test]
async fn test_identified_departure_is_announced_once() {
    let relay = Relay::default();
    let (alice, _alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;

    relay.on_close(&alice).await;
    // Close and error can both fire for one connection; removal is
    // idempotent so the announcement must not repeat
    relay.on_error(&alice, "broken pipe").await;

    let departures: Vec<Value> = bob_tx
        .received_of_type("system")
        .into_iter()
        .filter(|msg| msg["content"] == "Alice has disconnected.")
        .collect();
    assert_eq!(departures.len(), 1);
    assert_eq!(relay.connection_count(), 1);
}

#[tokio::test]
async fn test_unidentified_departure_is_silent() {
    let relay = Relay::default();
    let (_alice, alice_tx) = connect(&relay).await;
    let (carol, _carol_tx) = connect(&relay).await;

    relay.on_close(&carol).await;

    let departures: Vec<Value> = alice_tx
        .received_of_type("system")
        .into_iter()
        .filter(|msg| msg["content"].as_str().unwrap_or("").contains("disconnected"))
        .collect();
    assert!(departures.is_empty());
    assert_eq!(relay.connection_count(), 1);
}

#[tokio::test]
async fn test_departed_peer_receives_nothing_further() {
    let relay = Relay::default();
    let (alice, _alice_tx) = connect(&relay).await;
    let (bob, bob_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;
    identify(&relay, &bob, "Bob").await;

    bob_tx.close().await.unwrap();
    relay.on_close(&bob).await;
    let after_close = bob_tx.received().len();

    relay
        .on_message(&alice, r#"{"type":"chat","content":"anyone?"}"#)
        .await;

    assert_eq!(bob_tx.received().len(), after_close);
}

#[tokio::test]
async fn test_timestamps_never_decrease() {
    let relay = Relay::default();
    let (alice, alice_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;

    for i in 0..20 {
        let frame = format!(r#"{{"type":"chat","content":"msg {}"}}"#, i);
        relay.on_message(&alice, &frame).await;
    }

    let timestamps: Vec<u64> = alice_tx
        .received_of_type("chat")
        .iter()
        .map(|msg| msg["timestamp"].as_u64().unwrap())
        .collect();
    assert_eq!(timestamps.len(), 20);
    assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn test_every_broadcast_carries_sender_and_timestamp() {
    let relay = Relay::default();
    let (alice, _alice_tx) = connect(&relay).await;
    let (_bob, bob_tx) = connect(&relay).await;
    identify(&relay, &alice, "Alice").await;

    relay.on_message(&alice, r#"{"type":"doorLocations","doors":[{"x":0,"y":64,"z":0}]}"#).await;
    relay.on_message(&alice, r#"{"type":"action_response","action":"look","status":"ok"}"#).await;
    relay.on_message(&alice, r#"{"type":"whatever"}"#).await;

    for msg in bob_tx.received() {
        let sender = msg["sender"].as_str().unwrap();
        assert!(!sender.is_empty());
        assert!(msg["timestamp"].is_u64());
    }
}
