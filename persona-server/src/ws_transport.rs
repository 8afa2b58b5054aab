//! WebSocket implementations of the `TransportReceiver`/`TransportSender`
//! seam, wrapping `tokio_tungstenite`'s split sink/stream and draining
//! buffered messages non-blockingly via `now_or_never` so barge-in
//! detection never has to wait on the next full frame.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use persona_core::transport::{Inbound, TransportReceiver, TransportSender};
use persona_protocol::{ClientEnvelope, ServerEnvelope};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::warn;

pub struct WsReceiver {
    stream: SplitStream<WebSocketStream<TcpStream>>,
}

impl WsReceiver {
    pub fn new(stream: SplitStream<WebSocketStream<TcpStream>>) -> Self {
        Self { stream }
    }

    fn parse(msg: Message) -> Option<Inbound> {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEnvelope>(&text) {
                Ok(envelope) => Some(Inbound::Envelope(envelope)),
                Err(e) => {
                    warn!("dropping unparseable client message: {e}");
                    None
                }
            },
            Message::Close(_) => Some(Inbound::Closed),
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_) => None,
        }
    }
}

#[async_trait]
impl TransportReceiver for WsReceiver {
    async fn recv(&mut self) -> Inbound {
        loop {
            match self.stream.next().await {
                Some(Ok(msg)) => {
                    if let Some(inbound) = Self::parse(msg) {
                        return inbound;
                    }
                    // ping/pong/binary frames: keep waiting for the next message
                }
                Some(Err(e)) => {
                    warn!("websocket read error: {e}");
                    return Inbound::Closed;
                }
                None => return Inbound::Closed,
            }
        }
    }

    fn try_recv(&mut self) -> Option<Inbound> {
        loop {
            match self.stream.next().now_or_never() {
                Some(Some(Ok(msg))) => {
                    if let Some(inbound) = Self::parse(msg) {
                        return Some(inbound);
                    }
                    // another message may already be buffered; keep draining
                }
                Some(Some(Err(e))) => {
                    warn!("websocket read error during drain: {e}");
                    return Some(Inbound::Closed);
                }
                Some(None) => return Some(Inbound::Closed),
                None => return None, // nothing buffered right now
            }
        }
    }
}

pub struct WsSender {
    sink: SplitSink<WebSocketStream<TcpStream>, Message>,
}

impl WsSender {
    pub fn new(sink: SplitSink<WebSocketStream<TcpStream>, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl TransportSender for WsSender {
    async fn send(&mut self, envelope: ServerEnvelope) -> Result<(), ()> {
        let json = serde_json::to_string(&envelope).map_err(|_| ())?;
        self.sink.send(Message::Text(json.into())).await.map_err(|_| ())
    }
}
