//! End-to-end signaling tests over real sockets.
//!
//! Each test spins the router up on an ephemeral port and drives it with
//! plain tokio-tungstenite clients, the same way a browser client would.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use moot_api::{create_router, AppState};
use moot_core::{Config, RoomRegistry};
use moot_sfu::{IceConfig, SfuEngine};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let state = AppState {
        registry: Arc::new(RoomRegistry::new()),
        sfu: Arc::new(SfuEngine::new(IceConfig::default())),
        config: Arc::new(Config::default()),
    };
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, query: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws?{query}"))
        .await
        .unwrap();
    client
}

/// Next JSON frame, skipping transport chatter.
async fn recv(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended while waiting for frame")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

async fn expect_silence(client: &mut Client) {
    let outcome = tokio::time::timeout(Duration::from_millis(300), client.next()).await;
    assert!(outcome.is_err(), "expected no frame, got {outcome:?}");
}

/// The server hung up: nothing but close handshake remains on the stream.
async fn expect_closed(client: &mut Client) {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for close")
        {
            None | Some(Err(_)) => return,
            Some(Ok(Message::Close(_))) => {}
            Some(Ok(Message::Text(text))) => panic!("unexpected frame before close: {text}"),
            Some(Ok(_)) => {}
        }
    }
}

fn participant_ids(room_info: &Value) -> Vec<String> {
    room_info["data"]["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_one_to_one_capacity() {
    let addr = spawn_server().await;

    let mut a = connect(addr, "roomId=r1&type=one_to_one&username=a").await;
    let info_a = recv(&mut a).await;
    assert_eq!(info_a["type"], "room_info");
    assert_eq!(info_a["data"]["roomId"], "r1");
    assert_eq!(info_a["data"]["roomType"], "one_to_one");
    assert_eq!(participant_ids(&info_a).len(), 1);

    let mut b = connect(addr, "roomId=r1&type=one_to_one&username=b").await;
    let info_b = recv(&mut b).await;
    assert_eq!(participant_ids(&info_b).len(), 2);

    let joined = recv(&mut a).await;
    assert_eq!(joined["type"], "participant_joined");
    assert_eq!(joined["data"]["username"], "b");

    // Third caller bounces off the full room.
    let mut c = connect(addr, "roomId=r1&type=one_to_one&username=c").await;
    let rejection = recv(&mut c).await;
    assert_eq!(rejection["type"], "error");
    assert_eq!(rejection["data"], "room is full");
    expect_closed(&mut c).await;

    // Nobody inside the room heard about the rejected caller.
    expect_silence(&mut a).await;
    expect_silence(&mut b).await;
}

#[tokio::test]
async fn test_unknown_mode_coerces_to_one_to_one() {
    let addr = spawn_server().await;
    let mut client = connect(addr, "roomId=r1&type=banquet").await;
    let info = recv(&mut client).await;
    assert_eq!(info["data"]["roomType"], "one_to_one");
}

#[tokio::test]
async fn test_missing_room_id_rejected_before_upgrade() {
    let addr = spawn_server().await;
    let outcome = connect_async(format!("ws://{addr}/ws")).await;
    assert!(outcome.is_err());
}

#[tokio::test]
async fn test_broadcaster_uniqueness() {
    let addr = spawn_server().await;

    let mut host = connect(addr, "roomId=r2&type=broadcasting&username=host&broadcaster=true").await;
    let info = recv(&mut host).await;
    assert_eq!(info["type"], "room_info");

    let mut rival =
        connect(addr, "roomId=r2&type=broadcasting&username=rival&broadcaster=true").await;
    let rejection = recv(&mut rival).await;
    assert_eq!(rejection["type"], "error");
    assert_eq!(rejection["data"], "broadcaster already exists in this room");
    expect_closed(&mut rival).await;

    // A plain viewer still gets in.
    let mut viewer = connect(addr, "roomId=r2&type=broadcasting&username=viewer").await;
    let info = recv(&mut viewer).await;
    assert_eq!(participant_ids(&info).len(), 2);

    let joined = recv(&mut host).await;
    assert_eq!(joined["type"], "participant_joined");
    assert_eq!(joined["data"]["username"], "viewer");
    expect_silence(&mut host).await;
}

#[tokio::test]
async fn test_chat_fanout_and_history() {
    let addr = spawn_server().await;

    let mut a = connect(addr, "roomId=r3&type=screen_sharing&username=a").await;
    let info_a = recv(&mut a).await;
    let a_id = participant_ids(&info_a)[0].clone();

    let mut b = connect(addr, "roomId=r3&type=screen_sharing&username=b").await;
    let _info_b = recv(&mut b).await;
    let _joined_b = recv(&mut a).await;

    let mut c = connect(addr, "roomId=r3&type=screen_sharing&username=c").await;
    let _info_c = recv(&mut c).await;
    let _joined_c_at_a = recv(&mut a).await;
    let _joined_c_at_b = recv(&mut b).await;

    send(&mut a, json!({"type": "chat", "data": "hi"})).await;

    // Everyone hears the chat, including the sender.
    for client in [&mut a, &mut b, &mut c] {
        let frame = recv(client).await;
        assert_eq!(frame["type"], "chat");
        assert_eq!(frame["senderId"], a_id.as_str());
        assert_eq!(frame["data"]["sender_id"], a_id.as_str());
        assert_eq!(frame["data"]["sender_name"], "a");
        assert_eq!(frame["data"]["content"], "hi");
        assert!(frame["data"]["timestamp"].as_i64().unwrap() > 0);
    }

    // A late joiner replays it from history.
    let mut d = connect(addr, "roomId=r3&type=screen_sharing&username=d").await;
    let info_d = recv(&mut d).await;
    let history = info_d["data"]["chatHistory"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["content"], "hi");
}

#[tokio::test]
async fn test_departure_notifies_remaining_once() {
    let addr = spawn_server().await;

    let mut a = connect(addr, "roomId=r5&type=screen_sharing&username=a").await;
    let info_a = recv(&mut a).await;
    let a_ids = participant_ids(&info_a);

    let mut b = connect(addr, "roomId=r5&type=screen_sharing&username=b").await;
    let info_b = recv(&mut b).await;
    let b_id = participant_ids(&info_b)
        .into_iter()
        .find(|id| !a_ids.contains(id))
        .unwrap();
    let _joined_b = recv(&mut a).await;

    let mut c = connect(addr, "roomId=r5&type=screen_sharing&username=c").await;
    let _info_c = recv(&mut c).await;
    let _joined_c_at_a = recv(&mut a).await;
    let _joined_c_at_b = recv(&mut b).await;

    b.close(None).await.unwrap();

    for client in [&mut a, &mut c] {
        let frame = recv(client).await;
        assert_eq!(frame["type"], "participant_left");
        assert_eq!(frame["senderId"], b_id.as_str());
        expect_silence(client).await;
    }

    // The departed participant is gone from later snapshots.
    let mut d = connect(addr, "roomId=r5&type=screen_sharing&username=d").await;
    let info_d = recv(&mut d).await;
    assert!(!participant_ids(&info_d).contains(&b_id));
    assert_eq!(participant_ids(&info_d).len(), 3);
}

#[tokio::test]
async fn test_offer_relays_with_server_identity() {
    let addr = spawn_server().await;

    let mut a = connect(addr, "roomId=r6&type=one_to_one&username=a").await;
    let info_a = recv(&mut a).await;
    let a_id = participant_ids(&info_a)[0].clone();

    let mut b = connect(addr, "roomId=r6&type=one_to_one&username=b").await;
    let _info_b = recv(&mut b).await;
    let _joined = recv(&mut a).await;

    // The client-supplied identity is forged; the server overwrites it.
    send(
        &mut a,
        json!({
            "type": "offer",
            "roomId": "spoofed",
            "senderId": "spoofed",
            "data": {"sdp": "v=0 fake"}
        }),
    )
    .await;

    let frame = recv(&mut b).await;
    assert_eq!(frame["type"], "offer");
    assert_eq!(frame["roomId"], "r6");
    assert_eq!(frame["senderId"], a_id.as_str());
    assert_eq!(frame["data"]["sdp"], "v=0 fake");

    // The sender does not hear its own offer back.
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn test_undecodable_frame_closes_session() {
    let addr = spawn_server().await;

    let mut a = connect(addr, "roomId=r7&type=screen_sharing&username=a").await;
    let _info_a = recv(&mut a).await;

    let mut b = connect(addr, "roomId=r7&type=screen_sharing&username=b").await;
    let _info_b = recv(&mut b).await;
    let joined = recv(&mut a).await;
    let b_id = joined["senderId"].as_str().unwrap().to_string();

    b.send(Message::Text("this is not json".to_string()))
        .await
        .unwrap();

    // The broken session is torn down and its departure announced.
    let frame = recv(&mut a).await;
    assert_eq!(frame["type"], "participant_left");
    assert_eq!(frame["senderId"], b_id.as_str());
    expect_closed(&mut b).await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_server().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""status":"ok""#));
}
