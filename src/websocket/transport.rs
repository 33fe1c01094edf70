//! Transport connection: one duplex socket's open/send/close lifecycle.
//!
//! The [`Connector`] trait is the seam between the reconnection controller and
//! the network. [`WebsocketConnector`] is the production implementation on top
//! of `tokio-tungstenite`; tests plug in an in-memory connector instead.

use crate::error::{RealtimeError, Result};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use log::*;
use std::borrow::Cow;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use url::Url;

/// Something that happened on an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(String),
    Closed { code: Option<u16>, reason: String },
    Error(String),
}

/// A request for the writer side of a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Pong(Vec<u8>),
    Close,
}

/// Write half of an open link. Sending on a link whose socket is gone is a no-op.
#[derive(Debug, Clone)]
pub struct LinkSender {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl LinkSender {
    pub fn send_text(&self, text: String) {
        if self.outbound.send(Outbound::Text(text)).is_err() {
            debug!("Dropping outbound frame: socket writer is gone.");
        }
    }

    /// Requests a clean shutdown of the socket.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// An open socket as seen by the controller.
#[derive(Debug)]
pub struct TransportLink {
    pub sender: LinkSender,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportLink {
    pub fn new(
        outbound: mpsc::UnboundedSender<Outbound>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            sender: LinkSender { outbound },
            events,
        }
    }
}

/// Opens sockets. The returned future resolves once the socket is open.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<TransportLink>>;
}

/// `tokio-tungstenite` backed connector with a reader and a writer task per socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebsocketConnector;

impl Connector for WebsocketConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<TransportLink>> {
        let url = url.clone();
        async move {
            info!("Connecting to WebSocket: {}", url);
            let (ws_stream, response) = connect_async(url.as_str()).await.map_err(|e| {
                RealtimeError::TransportError(format!("WebSocket connection failed: {}", e))
            })?;
            info!(
                "WebSocket connected successfully. Response: {:?}",
                response.status()
            );

            let (mut write, mut read) = ws_stream.split();
            let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
            let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();
            let pong_tx = outbound_tx.clone();

            // --- Writer Task ---
            tokio::spawn(async move {
                while let Some(outbound) = outbound_rx.recv().await {
                    let (message, closing) = match outbound {
                        Outbound::Text(text) => (Message::Text(text), false),
                        Outbound::Pong(data) => (Message::Pong(data), false),
                        Outbound::Close => (
                            Message::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: Cow::Borrowed("client disconnect"),
                            })),
                            true,
                        ),
                    };
                    trace!("Sending WS message: {:?}", message);
                    if let Err(e) = write.send(message).await {
                        error!("WebSocket send error: {}. Stopping writer task.", e);
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                let _ = write.close().await;
                debug!("WebSocket writer task finished.");
            });

            // --- Reader Task ---
            tokio::spawn(async move {
                let last = loop {
                    match read.next().await {
                        Some(Ok(Message::Text(text))) => {
                            trace!("Received WS Text: {}", text);
                            if event_tx.send(TransportEvent::Message(text)).is_err() {
                                break None; // Nobody listening any more
                            }
                        }
                        Some(Ok(Message::Binary(bin))) => {
                            trace!("Ignoring WS Binary frame ({} bytes)", bin.len());
                        }
                        Some(Ok(Message::Ping(data))) => {
                            trace!("Received WS Ping, sending Pong via channel");
                            if pong_tx.send(Outbound::Pong(data)).is_err() {
                                break Some(TransportEvent::Error(
                                    "writer channel closed".to_string(),
                                ));
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            trace!("Received WS Pong");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            warn!("Received WS Close frame: {:?}", frame);
                            break Some(match frame {
                                Some(frame) => TransportEvent::Closed {
                                    code: Some(u16::from(frame.code)),
                                    reason: frame.reason.into_owned(),
                                },
                                None => TransportEvent::Closed {
                                    code: None,
                                    reason: String::new(),
                                },
                            });
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            error!("WebSocket read error: {}", e);
                            break Some(TransportEvent::Error(e.to_string()));
                        }
                        None => {
                            info!("WebSocket stream ended (read None).");
                            break Some(TransportEvent::Closed {
                                code: None,
                                reason: "stream ended".to_string(),
                            });
                        }
                    }
                };
                if let Some(event) = last {
                    let _ = event_tx.send(event);
                }
                debug!("WebSocket reader task finished.");
            });

            Ok(TransportLink::new(outbound_tx, event_rx))
        }
        .boxed()
    }
}
