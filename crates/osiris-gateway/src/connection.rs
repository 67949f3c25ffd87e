use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{error, info, warn};
use uuid::Uuid;

use osiris_types::api::Claims;
use osiris_types::events::{ClientCommand, ServerEvent};

use crate::dispatcher::Dispatcher;

/// Server sends a Ping every 15 seconds. Two missed Pongs drop the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long an unauthenticated socket may take to send `identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Subscriptions = Arc<RwLock<HashSet<Uuid>>>;

/// Handle a connection whose token was already checked at upgrade time.
pub async fn handle_connection_authenticated(
    socket: WebSocket,
    dispatcher: Dispatcher,
    user_id: Uuid,
    username: String,
) {
    let (sender, receiver) = socket.split();
    info!("{} ({}) connected to gateway", username, user_id);
    run_connection_loop(sender, receiver, dispatcher, user_id, username).await;
}

/// Handle a connection that must authenticate with an `identify` command first.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (sender, mut receiver) = socket.split();

    let Some((user_id, username)) = wait_for_identify(&mut receiver, &jwt_secret).await else {
        warn!("WebSocket client failed to identify, closing");
        return;
    };

    info!("{} ({}) identified on gateway", username, user_id);
    run_connection_loop(sender, receiver, dispatcher, user_id, username).await;
}

/// Validate a gateway token. Shared by the upgrade handler and `identify`.
pub fn verify_token(token: &str, jwt_secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Community-scoped events reach only sockets subscribed to that community.
/// Unscoped events reach everyone.
fn should_deliver(event: &ServerEvent, subscriptions: &HashSet<Uuid>) -> bool {
    match event.community_id() {
        Some(community_id) => subscriptions.contains(&community_id),
        None => true,
    }
}

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            error!("Failed to encode gateway event: {}", e);
            None
        }
    }
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    user_id: Uuid,
    username: String,
) {
    let ready = ServerEvent::Ready {
        user_id,
        username: username.clone(),
    };
    let Some(ready) = encode(&ready) else { return };
    if sender.send(ready).await.is_err() {
        return;
    }

    // Subscribe before registering so our own presence broadcast is not lost
    let mut broadcast_rx = dispatcher.subscribe();
    let (conn_id, mut user_rx) = dispatcher.register(user_id, &username).await;

    // Tell the newcomer who is already here
    for (uid, uname) in dispatcher.online_users().await {
        if uid == user_id {
            continue;
        }
        let event = ServerEvent::PresenceUpdate {
            user_id: uid,
            username: uname,
            online: true,
        };
        let Some(msg) = encode(&event) else { continue };
        if sender.send(msg).await.is_err() {
            dispatcher.unregister(user_id, conn_id).await;
            return;
        }
    }

    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward broadcasts + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let deliver = send_subscriptions
                        .read()
                        .map(|subs| should_deliver(&event, &subs))
                        .unwrap_or(false);
                    if !deliver {
                        continue;
                    }

                    let Some(msg) = encode(&event) else { continue };
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let Some(event) = result else { break };
                    let Some(msg) = encode(&event) else { continue };
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let dispatcher_recv = dispatcher.clone();
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(text.as_str()) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_recv, user_id, &username_recv, cmd, &subscriptions).await;
                    }
                    Err(e) => {
                        let raw: String = text.as_str().chars().take(200).collect();
                        warn!("{} ({}) bad command: {} -- raw: {}", username_recv, user_id, e, raw);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(user_id, conn_id).await;
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, jwt_secret: &str) -> Option<(Uuid, String)> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(ClientCommand::Identify { token }) = serde_json::from_str::<ClientCommand>(text.as_str()) {
                    let claims = verify_token(&token, jwt_secret)?;
                    return Some((claims.sub, claims.username));
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

async fn handle_command(
    dispatcher: &Dispatcher,
    user_id: Uuid,
    username: &str,
    cmd: ClientCommand,
    subscriptions: &Subscriptions,
) {
    match cmd {
        ClientCommand::Identify { .. } => {} // Already authenticated

        ClientCommand::Subscribe { community_ids } => {
            info!(
                "{} ({}) subscribing to {} communities",
                username,
                user_id,
                community_ids.len()
            );
            match subscriptions.write() {
                Ok(mut subs) => *subs = community_ids.into_iter().collect(),
                Err(e) => error!("subscription lock poisoned: {}", e),
            }
        }

        ClientCommand::Typing { recipient_id } => {
            if recipient_id == user_id {
                return;
            }
            dispatcher
                .send_to_user(
                    recipient_id,
                    ServerEvent::Typing {
                        user_id,
                        username: username.to_string(),
                    },
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode as encode_jwt};

    fn token(secret: &str, exp: usize) -> (Uuid, String) {
        let sub = Uuid::new_v4();
        let claims = Claims {
            sub,
            username: "ada".into(),
            exp,
        };
        let token = encode_jwt(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
        (sub, token)
    }

    #[test]
    fn verifies_tokens_signed_with_the_same_secret() {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize;
        let (sub, token) = token("secret", exp);

        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, sub);
        assert!(verify_token(&token, "other").is_none());
    }

    #[test]
    fn rejects_expired_tokens() {
        let exp = (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as usize;
        let (_, token) = token("secret", exp);
        assert!(verify_token(&token, "secret").is_none());
    }

    #[test]
    fn scoped_events_need_a_subscription() {
        let community = Uuid::new_v4();
        let subscribed = HashSet::from([community]);
        let deleted = |community_id| ServerEvent::PostDeleted {
            post_id: Uuid::new_v4(),
            community_id,
        };

        assert!(should_deliver(&deleted(Some(community)), &subscribed));
        assert!(!should_deliver(&deleted(Some(Uuid::new_v4())), &subscribed));
        assert!(!should_deliver(&deleted(Some(community)), &HashSet::new()));
        assert!(should_deliver(&deleted(None), &HashSet::new()));

        let presence = ServerEvent::PresenceUpdate {
            user_id: Uuid::new_v4(),
            username: "ada".into(),
            online: true,
        };
        assert!(should_deliver(&presence, &HashSet::new()));
    }

    #[tokio::test]
    async fn typing_is_forwarded_to_the_recipient_only() {
        let dispatcher = Dispatcher::new();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let (_, mut recipient_rx) = dispatcher.register(recipient, "bob").await;
        let (_, mut sender_rx) = dispatcher.register(sender, "ada").await;
        let subs: Subscriptions = Arc::new(RwLock::new(HashSet::new()));

        handle_command(&dispatcher, sender, "ada", ClientCommand::Typing { recipient_id: recipient }, &subs).await;

        match recipient_rx.recv().await {
            Some(ServerEvent::Typing { user_id, username }) => {
                assert_eq!(user_id, sender);
                assert_eq!(username, "ada");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(sender_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_replaces_the_set() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let subs: Subscriptions = Arc::new(RwLock::new(HashSet::from([Uuid::new_v4()])));
        let community = Uuid::new_v4();

        handle_command(
            &dispatcher,
            user,
            "ada",
            ClientCommand::Subscribe { community_ids: vec![community] },
            &subs,
        )
        .await;

        let subs = subs.read().unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs.contains(&community));
    }
}
