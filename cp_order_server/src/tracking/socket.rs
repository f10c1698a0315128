use std::{net::SocketAddr, sync::Arc};

use cp_order_engine::{
    tracking_protocol::{ClientMessage, NotificationRef, OrderRef, ServerMessage},
    NotificationApi,
    OrderFlowApi,
    SqliteDatabase,
};
use futures::{SinkExt, StreamExt};
use log::*;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        Message,
    },
};

use super::{ConnectionId, TrackingHub};
use crate::{
    auth::{JwtClaims, TokenValidator},
    errors::ServerError,
    helpers::{bearer_token, token_from_query},
};

const OUTBOUND_BUFFER: usize = 64;

/// Everything a tracking connection needs to serve its client.
pub struct TrackingContext {
    pub hub: TrackingHub,
    pub validator: TokenValidator,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub notifications: NotificationApi<SqliteDatabase>,
}

/// Accepts tracking connections on `addr` until the process exits.
pub async fn run_tracking_listener(addr: String, ctx: Arc<TrackingContext>) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&addr).await?;
    info!("📡️ Tracking hub listening on ws://{addr}");
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move { handle_connection(stream, peer, ctx).await });
            },
            Err(e) => warn!("📡️ Could not accept a tracking connection. {e}"),
        }
    }
}

/// The access token presented during the handshake, if any. The `Authorization` header wins over `?token=`.
pub fn handshake_token(req: &Request) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(String::from)
        .or_else(|| req.uri().query().and_then(token_from_query))
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<TrackingContext>) {
    let mut token = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        token = handshake_token(req);
        Ok(resp)
    };
    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("📡️ WebSocket handshake with {peer} failed. {e}");
            return;
        },
    };
    let (mut ws_sender, mut ws_receiver) = ws.split();

    let claims = match token.as_deref().map(|t| ctx.validator.validate(t)).transpose() {
        Ok(claims) => claims,
        Err(e) => {
            info!("📡️ Rejecting tracking connection from {peer}. {e}");
            let frame = ServerMessage::error(e.to_string()).to_json();
            let _ = ws_sender.send(Message::text(frame)).await;
            let _ = ws_sender.close().await;
            return;
        },
    };

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let conn_id = ctx.hub.register(claims.as_ref().map(|c| c.sub.clone()), tx.clone());
    info!("📡️ Tracking connection #{conn_id} opened from {peer}");

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::text(frame)).await.is_err() {
                break;
            }
        }
    });

    // Frames from one client are handled strictly in order
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(reply) = handle_client_frame(&ctx, conn_id, claims.as_ref(), text.as_str()).await {
                    if tx.send(reply.to_json()).await.is_err() {
                        break;
                    }
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(e) => {
                debug!("📡️ Connection #{conn_id} errored. {e}");
                break;
            },
        }
    }

    ctx.hub.remove(conn_id);
    sender_task.abort();
    info!("📡️ Tracking connection #{conn_id} closed");
}

/// Applies one client frame. The return value, if any, is sent back to that client only.
async fn handle_client_frame(
    ctx: &TrackingContext,
    conn_id: ConnectionId,
    claims: Option<&JwtClaims>,
    text: &str,
) -> Option<ServerMessage> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("📡️ Connection #{conn_id} sent an unrecognised frame. {e}");
            return Some(ServerMessage::error(format!("Unrecognised message. {e}")));
        },
    };
    trace!("📡️ Connection #{conn_id} sent {}", message.event_name());
    match message {
        ClientMessage::Subscribe(OrderRef { order_id }) => match ctx.orders.fetch_order(&order_id).await {
            Ok(Some(order)) if claims.map_or(true, |c| c.is_staff() || order.is_owned_by(c.user_id())) => {
                ctx.hub.subscribe(conn_id, order_id);
                None
            },
            // Anonymous clients get the same silence whether or not the order exists
            Ok(_) if claims.is_none() => {
                debug!("📡️ Connection #{conn_id} asked for unknown order {order_id}");
                None
            },
            Ok(_) => Some(ServerMessage::error(format!("Order {order_id} does not exist"))),
            Err(e) => Some(ServerMessage::error(e.to_string())),
        },
        ClientMessage::Unsubscribe(OrderRef { order_id }) => {
            ctx.hub.unsubscribe(conn_id, &order_id);
            None
        },
        ClientMessage::NotificationRead(NotificationRef { id }) => {
            let Some(claims) = claims else {
                return Some(ServerMessage::error("Sign in to manage notifications"));
            };
            ctx.notifications.mark_read(claims.user_id(), id).await.err().map(|e| ServerMessage::error(e.to_string()))
        },
        ClientMessage::NotificationReadAll => {
            let Some(claims) = claims else {
                return Some(ServerMessage::error("Sign in to manage notifications"));
            };
            ctx.notifications.mark_all_read(claims.user_id()).await.err().map(|e| ServerMessage::error(e.to_string()))
        },
    }
}
