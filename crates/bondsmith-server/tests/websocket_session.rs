//! Facilitator and player talking to a live server over real sockets.

#![allow(clippy::unwrap_used)]

use bondsmith_core::wire::{decode_server_message, encode_client_message};
use bondsmith_core::{CharacterId, ClientMessage, ServerMessage};
use bondsmith_server::server::serve;
use bondsmith_server::{CharacterSeed, GrantServer, ServerConfig};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> SocketAddr {
    let config = ServerConfig {
        characters: vec![CharacterSeed {
            character_id: CharacterId::new("kaladin"),
            level: 5,
        }],
        ..ServerConfig::default()
    };
    let state = GrantServer::from_config(config).state().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state, std::future::pending()));
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, message: ClientMessage) {
    let frame = encode_client_message(&message).unwrap();
    socket.send(Message::Text(frame)).await.unwrap();
}

async fn recv(socket: &mut Socket) -> ServerMessage {
    loop {
        let next = timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = next {
            return decode_server_message(&text).unwrap();
        }
    }
}

fn join(level: u32) -> ClientMessage {
    ClientMessage::Join {
        character_id: CharacterId::new("kaladin"),
        current_level: level,
    }
}

#[tokio::test]
async fn unacked_level_up_is_redelivered_after_reconnect() {
    let addr = start().await;

    let mut gm = connect(addr).await;
    let facilitate = ClientMessage::Facilitate {
        facilitator: "Teft".to_string(),
    };
    send(&mut gm, facilitate).await;

    let mut player = connect(addr).await;
    send(&mut player, join(5)).await;
    assert!(matches!(recv(&mut player).await, ServerMessage::Joined { pending: 0, .. }));

    let grant = ClientMessage::GrantLevelUp {
        character_id: CharacterId::new("kaladin"),
    };
    send(&mut gm, grant).await;
    assert!(matches!(recv(&mut gm).await, ServerMessage::Issued { .. }));

    let first = recv(&mut player).await;
    assert!(matches!(first, ServerMessage::LevelUpDelivered { new_level: 6, .. }));

    player.close(None).await.unwrap();
    drop(player);

    let mut again = connect(addr).await;
    send(&mut again, join(5)).await;

    let redelivered = recv(&mut again).await;
    assert_eq!(redelivered, first);
    assert!(matches!(recv(&mut again).await, ServerMessage::Joined { pending: 1, .. }));

    let ack = ClientMessage::LevelUpAck {
        character_id: CharacterId::new("kaladin"),
        new_level: 6,
    };
    send(&mut again, ack).await;
    send(&mut again, join(6)).await;
    assert!(matches!(recv(&mut again).await, ServerMessage::Joined { pending: 0, .. }));
}

#[tokio::test]
async fn malformed_frame_is_rejected_and_connection_survives() {
    let addr = start().await;
    let mut player = connect(addr).await;

    player
        .send(Message::Text(r#"{"schema_version":1,"message":{"type":"bond_ack"}}"#.to_string()))
        .await
        .unwrap();
    assert!(matches!(recv(&mut player).await, ServerMessage::Rejected { .. }));

    send(&mut player, join(5)).await;
    assert!(matches!(recv(&mut player).await, ServerMessage::Joined { .. }));
}
