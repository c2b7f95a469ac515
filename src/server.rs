//! WebSocket transport
//!
//! Exposes the game over a single WebSocket endpoint carrying JSON text
//! frames, plus a liveness probe. Each socket is split into a reader that
//! forwards parsed commands to the event loop and a writer task that drains
//! the connection's outbound channel.

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::{
    game::IncomingMessage,
    runtime::{GameHandle, Outbound},
};

/// Builds the HTTP routes
pub fn router(handle: GameHandle) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(upgrade))
        .with_state(handle)
}

/// Serves `handle` on `listener` until `shutdown` resolves
///
/// # Errors
///
/// Returns any I/O error raised by the listener.
pub async fn serve<S>(listener: TcpListener, handle: GameHandle, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(address) = listener.local_addr() {
        info!(%address, "listening");
    }

    axum::serve(listener, router(handle))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn healthz() -> &'static str {
    "ok"
}

async fn upgrade(ws: WebSocketUpgrade, State(handle): State<GameHandle>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, handle))
}

async fn handle_socket(socket: WebSocket, handle: GameHandle) {
    let (mut sink, mut stream) = socket.split();
    let (id, mut outbound) = handle.connect();

    debug!(%id, "socket opened");

    let mut writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            match event {
                Outbound::Message(message) => {
                    if sink
                        .send(Message::Text(message.to_message().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match IncomingMessage::parse(text.as_str()) {
                    Ok(message) => handle.send(id, message),
                    Err(error) => warn!(%id, %error, "ignoring inbound frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    debug!(%id, %error, "socket error");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    writer.abort();
    handle.disconnect(id);

    debug!(%id, "socket closed");
}
