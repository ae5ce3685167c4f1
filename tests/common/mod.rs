//! Fake kernel for channel tests: the server half of an in-memory
//! WebSocket.

#![allow(dead_code)]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use kernelwire_client::codec::JsonCodec;
use kernelwire_client::protocol::{msg_type, Channel, Envelope, MessageHeader};
use kernelwire_client::{ChannelConfig, KernelChannel};
use serde_json::{json, Value};
use tokio::io::DuplexStream;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub struct FakeKernel {
    ws: WebSocketStream<DuplexStream>,
}

/// A channel wired to a fake kernel.
pub async fn pair() -> (KernelChannel, FakeKernel) {
    pair_with(ChannelConfig::default()).await
}

pub async fn pair_with(config: ChannelConfig) -> (KernelChannel, FakeKernel) {
    let (client_io, server_io) = tokio::io::duplex(256 * 1024);
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    (KernelChannel::spawn(client, config), FakeKernel { ws: server })
}

impl FakeKernel {
    /// Next request sent by the client.
    pub async fn recv_request(&mut self) -> Envelope {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return JsonCodec::decode(text.as_str()).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("expected a request, got {:?}", other),
            }
        }
    }

    /// Next request, or `None` if the client closed the socket.
    pub async fn try_recv_request(&mut self, wait: Duration) -> Option<Envelope> {
        match tokio::time::timeout(wait, self.ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => JsonCodec::decode(text.as_str()).ok(),
            _ => None,
        }
    }

    pub async fn send(&mut self, envelope: &Envelope) {
        let text = JsonCodec::encode(envelope).unwrap();
        self.ws.send(Message::text(text)).await.unwrap();
    }

    pub async fn send_raw(&mut self, message: Message) {
        self.ws.send(message).await.unwrap();
    }

    pub async fn status(&mut self, parent: &MessageHeader, state: &str) {
        self.iopub(parent, msg_type::STATUS, json!({ "execution_state": state }))
            .await;
    }

    pub async fn stream(&mut self, parent: &MessageHeader, text: &str) {
        self.iopub(parent, msg_type::STREAM, json!({ "name": "stdout", "text": text }))
            .await;
    }

    pub async fn iopub(&mut self, parent: &MessageHeader, kind: &str, content: Value) {
        let envelope = Envelope::reply_to(parent, Channel::Iopub, kind, content);
        self.send(&envelope).await;
    }

    pub async fn shell_reply(&mut self, parent: &MessageHeader) {
        let envelope = Envelope::reply_to(
            parent,
            Channel::Shell,
            msg_type::EXECUTE_REPLY,
            json!({ "status": "ok", "execution_count": 1 }),
        );
        self.send(&envelope).await;
    }

    /// Answer a request the way a kernel runs `print(...)`.
    pub async fn run_print(&mut self, request: &Envelope, text: &str) {
        let parent = &request.header;
        self.status(parent, "busy").await;
        self.iopub(
            parent,
            msg_type::EXECUTE_INPUT,
            json!({ "code": request.content["code"], "execution_count": 1 }),
        )
        .await;
        self.stream(parent, text).await;
        self.shell_reply(parent).await;
        self.status(parent, "idle").await;
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
