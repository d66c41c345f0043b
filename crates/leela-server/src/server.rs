//! WebSocket server and connection handling.
//!
//! Transport adapter over the event processor: clients submit game events as
//! JSON and subscribe to per-player state updates. The durable-queue
//! collaborator could replace this layer without touching the processor.

use crate::notifier::BroadcastNotifier;
use crate::processor::EventProcessor;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::store::MemoryStore;
use dashmap::{DashMap, DashSet};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// The shared event processor
    pub processor: EventProcessor<MemoryStore, BroadcastNotifier>,
    /// Notifier the processor publishes through; connections subscribe here
    pub notifier: Arc<BroadcastNotifier>,
    /// Mapping from connection ID to its message sender
    pub connection_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new(
        processor: EventProcessor<MemoryStore, BroadcastNotifier>,
        notifier: Arc<BroadcastNotifier>,
    ) -> Self {
        Self {
            processor,
            notifier,
            connection_senders: DashMap::new(),
        }
    }

    /// Send a message to a specific connection.
    pub fn send_to_connection(&self, connection_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.connection_senders.get(&connection_id) {
            let _ = sender.send(msg);
        }
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Leela server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = Uuid::new_v4();

    // Channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.connection_senders.insert(connection_id, tx.clone());

    // Send welcome message
    let welcome = ServerMessage::Welcome { connection_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text.into())).await?;

    // Forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Forward published state changes for subscribed players
    let subscriptions: Arc<DashSet<String>> = Arc::new(DashSet::new());
    let notify_task = {
        let subscriptions = Arc::clone(&subscriptions);
        let mut receiver = state.notifier.subscribe();
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Ok(notification) = receiver.recv().await {
                if subscriptions.contains(&notification.player_id) {
                    let msg = ServerMessage::StateChanged {
                        user_id: notification.player_id,
                        state: notification.state,
                        effects: notification.effects,
                    };
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
            }
        })
    };

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_message(connection_id, client_msg, &state, &subscriptions).await;
                } else {
                    warn!("Invalid message from {}: {}", connection_id, text);
                    state.send_to_connection(
                        connection_id,
                        ServerMessage::Error {
                            message: "unrecognized message".to_string(),
                        },
                    );
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", connection_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_connection(connection_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", connection_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect
    state.connection_senders.remove(&connection_id);
    send_task.abort();
    notify_task.abort();

    info!("Connection closed for {}", connection_id);
    Ok(())
}

/// Handle a client message.
async fn handle_message(
    connection_id: Uuid,
    msg: ClientMessage,
    state: &Arc<ServerState>,
    subscriptions: &Arc<DashSet<String>>,
) {
    match msg {
        ClientMessage::SubmitEvent { event } => {
            let event_id = event.event_id;
            info!(user_id = event.user_id(), %event_id, "processing event");
            match state.processor.process(&event).await {
                Ok(outcome) => {
                    state.send_to_connection(
                        connection_id,
                        ServerMessage::EventProcessed {
                            event_id,
                            state: outcome.state,
                            effects: outcome.effects,
                            rejection: outcome.rejection,
                        },
                    );
                }
                Err(e) => {
                    state.send_to_connection(
                        connection_id,
                        ServerMessage::EventFailed {
                            event_id,
                            reason: e.to_string(),
                            retryable: e.is_retryable(),
                        },
                    );
                }
            }
        }

        ClientMessage::Subscribe { user_id } => {
            subscriptions.insert(user_id.clone());
            state.send_to_connection(connection_id, ServerMessage::Subscribed { user_id });
        }

        ClientMessage::Ping => {
            state.send_to_connection(connection_id, ServerMessage::Pong);
        }
    }
}
