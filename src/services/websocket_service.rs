use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ClientCommand, ServerMessage},
    services::{connection_service, race_service},
    state::{
        SharedState,
        connections::{ClientConnection, Identity},
    },
};

/// Command name echoed when a frame cannot be parsed at all.
const UNKNOWN_COMMAND: &str = "unknown";

/// Writer channel closed; the connection should be torn down.
#[derive(Debug, Error)]
#[error("connection closed")]
pub(crate) struct ConnectionClosed;

/// Handle the full lifecycle of one authenticated client connection.
pub async fn handle_socket(state: SharedState, identity: Identity, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps broadcasts flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let connection = ClientConnection::new(identity.clone(), outbound_tx.clone());
    let connection_id = connection.id;
    connection_service::connect(&state, connection).await;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(user = %identity.name, payload = %text, "received client message");
                if process_frame(&state, &identity, &outbound_tx, text.as_str())
                    .await
                    .is_err()
                {
                    info!(user = %identity.name, "connection closed while replying, terminating");
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(user = %identity.name, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user = %identity.name, error = %err, "websocket error");
                break;
            }
        }
    }

    connection_service::disconnect(&state, &identity, connection_id).await;
    finalize(writer_task, outbound_tx).await;
}

/// Parse and execute one text frame, then reply to the sender with `success` or `error`.
///
/// Broadcasts caused by the command are queued before the reply.
pub(crate) async fn process_frame(
    state: &SharedState,
    identity: &Identity,
    tx: &mpsc::UnboundedSender<Message>,
    text: &str,
) -> Result<(), ConnectionClosed> {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(err) => {
            warn!(user = %identity.name, error = %err, "failed to parse client command");
            let reply = ServerMessage::error(UNKNOWN_COMMAND, format!("invalid command: {err}"));
            return send_message_to_websocket(tx, &reply);
        }
    };

    let name = command.name();
    let target = command.race_id();
    let reply = match race_service::execute(state, identity, command).await {
        Ok(id) => ServerMessage::success(name, id),
        Err(err) => {
            debug!(user = %identity.name, command = name, race_id = ?target, error = %err, "command rejected");
            ServerMessage::error(name, err.client_message())
        }
    };
    send_message_to_websocket(tx, &reply)
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is reported.
pub(crate) fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
