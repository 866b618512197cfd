use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use edgewise_core::board::{Variant, Vertex};
use edgewise_core::net::messages::{
    ClientMessage, JoinRoomMsg, JoinRoomResponseMsg, MakeMoveMsg, ServerMessage,
};
use edgewise_core::net::protocol::{PROTOCOL_VERSION, decode_server_message, encode_client_message};
use edgewise_core::player::{PlayerColor, PlayerId};
use edgewise_core::room::RoomSnapshot;

use edgewise_server::config::ServerConfig;
use edgewise_server::{build_app, spawn_room_janitor};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default settings.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);
        spawn_room_janitor(state);

        let handle = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub fn join_msg(room_code: &str, name: &str, symbol: &str, variant: Option<Variant>) -> JoinRoomMsg {
    JoinRoomMsg {
        room_code: room_code.to_string(),
        player_name: name.to_string(),
        symbol: symbol.to_string(),
        color: PlayerColor::default(),
        variant,
        protocol_version: PROTOCOL_VERSION,
        session_token: None,
    }
}

/// Send a JoinRoom and return the JoinRoomResponse (success or error).
pub async fn ws_send_join(stream: &mut WsStream, join: JoinRoomMsg) -> JoinRoomResponseMsg {
    ws_send_client_msg(stream, &ClientMessage::JoinRoom(join)).await;
    match ws_read_server_msg(stream).await {
        ServerMessage::JoinRoomResponse(resp) => resp,
        other => panic!("Expected JoinRoomResponse, got: {other:?}"),
    }
}

/// A seated test client.
pub struct TestPlayer {
    pub stream: WsStream,
    pub player_id: PlayerId,
    pub room_code: String,
    pub session_token: String,
    /// Snapshot from the RoomInit that followed the join.
    pub init: RoomSnapshot,
}

/// Connect, join `room_code` (empty creates a room), and read RoomInit.
pub async fn join_player(
    server: &TestServer,
    room_code: &str,
    name: &str,
    symbol: &str,
    variant: Option<Variant>,
) -> TestPlayer {
    let mut stream = ws_connect(&server.ws_url()).await;
    let resp = ws_send_join(&mut stream, join_msg(room_code, name, symbol, variant)).await;
    assert!(resp.success, "Expected successful join: {resp:?}");
    let init = ws_read_init(&mut stream).await;
    TestPlayer {
        stream,
        player_id: resp.player_id.unwrap(),
        room_code: resp.room_code.unwrap(),
        session_token: resp.session_token.unwrap(),
        init,
    }
}

impl TestPlayer {
    pub async fn make_move(&mut self, start: Vertex, end: Vertex) {
        let msg = ClientMessage::MakeMove(MakeMoveMsg {
            room_code: self.room_code.clone(),
            start,
            end,
            player_id: self.player_id,
            symbol: String::new(),
            color: PlayerColor::default(),
        });
        ws_send_client_msg(&mut self.stream, &msg).await;
    }

    pub async fn read_state(&mut self) -> RoomSnapshot {
        ws_read_state(&mut self.stream).await
    }

    pub async fn read_msg(&mut self) -> ServerMessage {
        ws_read_server_msg(&mut self.stream).await
    }
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

pub async fn ws_read_init(stream: &mut WsStream) -> RoomSnapshot {
    match ws_read_server_msg(stream).await {
        ServerMessage::RoomInit(init) => init.snapshot,
        other => panic!("Expected RoomInit, got: {other:?}"),
    }
}

pub async fn ws_read_state(stream: &mut WsStream) -> RoomSnapshot {
    match ws_read_server_msg(stream).await {
        ServerMessage::RoomState(state) => state.snapshot,
        other => panic!("Expected RoomState, got: {other:?}"),
    }
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Send raw bytes as a binary frame.
pub async fn ws_send_raw(stream: &mut WsStream, data: Vec<u8>) {
    stream.send(Message::Binary(data.into())).await.unwrap();
}
