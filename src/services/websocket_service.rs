use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{SaveInboundMessage, UpdateAck, UpdateRejected},
    error::ServiceError,
    state::SharedState,
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for an individual game-client WebSocket
/// connection.
///
/// The first frame must identify the session (save id plus claimed owner);
/// the connection is bound to that save for its whole lifetime and every
/// update lands on it. Each update snapshots the cache toggle when the frame
/// arrives, so one frame never splits across the cache and store paths.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let inbound = match SaveInboundMessage::from_json_str(&initial_message) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "failed to parse or validate client message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let SaveInboundMessage::Identification {
        game_save_id,
        user_email,
    } = inbound
    else {
        warn!("first message was not identification");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    if let Err(err) = state.ownership().check(game_save_id, &user_email).await {
        warn!(save_id = %game_save_id, error = %err, "websocket identification rejected");
        send_json(&outbound_tx, &UpdateRejected::new(err.to_string()));
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    info!(save_id = %game_save_id, user = %user_email, "game client connected");
    send_json(&outbound_tx, &UpdateAck::accepted("identification"));

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match SaveInboundMessage::from_json_str(&text) {
                Ok(msg) => {
                    handle_update(&state, game_save_id, &user_email, msg, &outbound_tx).await;
                }
                Err(err) => {
                    warn!(save_id = %game_save_id, error = %err, "failed to parse or validate client message");
                    send_json(&outbound_tx, &UpdateRejected::new(err));
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(save_id = %game_save_id, "game client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(save_id = %game_save_id, error = %err, "websocket error");
                break;
            }
        }
    }

    info!(save_id = %game_save_id, "game client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Route one identified update frame to the matching sub-entity service.
async fn handle_update(
    state: &SharedState,
    game_save_id: Uuid,
    user_email: &str,
    message: SaveInboundMessage,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) {
    // Snapshot at command construction: a toggle flip mid-flight cannot
    // split this frame across both write paths.
    let to_cache = state.cache_manager().is_enabled();

    let (entity, result): (&str, Result<(), ServiceError>) = match message {
        SaveInboundMessage::CharacteristicsUpdate { data } => (
            "characteristics",
            state
                .characteristics()
                .save(game_save_id, data.into(), to_cache, user_email)
                .await,
        ),
        SaveInboundMessage::CurrencyUpdate { data } => (
            "currency",
            state
                .currency()
                .save(game_save_id, data.into(), to_cache, user_email)
                .await,
        ),
        SaveInboundMessage::StageUpdate { data } => (
            "stage",
            state
                .stage()
                .save(game_save_id, data.into(), to_cache, user_email)
                .await,
        ),
        SaveInboundMessage::Identification { .. } => {
            warn!(save_id = %game_save_id, "ignoring duplicate identification message");
            return;
        }
        SaveInboundMessage::Unknown => {
            send_json(outbound_tx, &UpdateRejected::new("unknown message type"));
            return;
        }
    };

    match result {
        Ok(()) => send_json(outbound_tx, &UpdateAck::accepted(entity)),
        Err(err) => {
            warn!(save_id = %game_save_id, entity, error = %err, "update rejected");
            send_json(outbound_tx, &UpdateRejected::new(err.to_string()));
        }
    }
}

/// Serialize a payload and push it onto the writer channel. Failures are
/// logged; a closed writer surfaces on the next receive anyway.
fn send_json<T>(tx: &mpsc::UnboundedSender<Message>, value: &T)
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    match serde_json::to_string(value) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
