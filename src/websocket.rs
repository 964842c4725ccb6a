use crate::error::{AppError, AppResult};
use crate::models::Notification;
use crate::repositories::RoomMemberRepository;
use crate::services::AuthService;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// WebSocket message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Authenticate {
        token: String,
    },
    Subscribe {
        channel: String, // "room:{id}" or "user:{id}"
    },
    Unsubscribe {
        channel: String,
    },
    Notification {
        notification: Notification,
    },
    RoomUpdated {
        room_id: Uuid,
        entity: String,
        action: String,
    },
    Error {
        message: String,
    },
}

/// A channel a client may listen on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Room(Uuid),
    User(Uuid),
}

impl Channel {
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, id) = raw.split_once(':')?;
        let id = Uuid::parse_str(id).ok()?;
        match kind {
            "room" => Some(Channel::Room(id)),
            "user" => Some(Channel::User(id)),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Channel::Room(id) => format!("room:{}", id),
            Channel::User(id) => format!("user:{}", id),
        }
    }
}

/// A message addressed to one channel
#[derive(Debug, Clone)]
struct Envelope {
    channel: String,
    message: WsMessage,
}

/// WebSocket server pushing notifications and room updates to subscribers
#[derive(Clone)]
pub struct WebSocketServer {
    tx: broadcast::Sender<Envelope>,
    /// channel -> subscribed client ids
    subscriptions: Arc<RwLock<HashMap<String, HashSet<Uuid>>>>,
    /// client id -> channels
    client_channels: Arc<RwLock<HashMap<Uuid, HashSet<String>>>>,
    /// client id -> authenticated user
    client_users: Arc<RwLock<HashMap<Uuid, Uuid>>>,
    auth: Arc<AuthService>,
    members: Arc<RoomMemberRepository>,
}

impl WebSocketServer {
    pub fn new(auth: Arc<AuthService>, members: Arc<RoomMemberRepository>) -> Self {
        let (tx, _) = broadcast::channel(1000); // Buffer up to 1000 messages

        Self {
            tx,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
            client_users: Arc::new(RwLock::new(HashMap::new())),
            auth,
            members,
        }
    }

    /// Send a message to all subscribers of a channel; returns how many there were
    pub async fn broadcast_to_channel(&self, channel: &str, message: WsMessage) -> usize {
        let count = self
            .subscriptions
            .read()
            .await
            .get(channel)
            .map(HashSet::len)
            .unwrap_or(0);

        if count > 0 {
            debug!("Pushing to {} subscribers on {}", count, channel);
            if let Err(e) = self.tx.send(Envelope {
                channel: channel.to_string(),
                message,
            }) {
                warn!("Failed to broadcast message: {}", e);
            }
        }
        count
    }

    pub async fn push_notification(&self, notification: &Notification) -> usize {
        let channel = Channel::User(notification.user_id).name();
        self.broadcast_to_channel(
            &channel,
            WsMessage::Notification {
                notification: notification.clone(),
            },
        )
        .await
    }

    /// Tell room subscribers that something changed (e.g. "meal", "updated")
    pub async fn push_room_update(&self, room_id: Uuid, entity: &str, action: &str) -> usize {
        self.broadcast_to_channel(
            &Channel::Room(room_id).name(),
            WsMessage::RoomUpdated {
                room_id,
                entity: entity.to_string(),
                action: action.to_string(),
            },
        )
        .await
    }

    pub async fn subscribe(&self, client_id: Uuid, channel: String) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        subscriptions
            .entry(channel.clone())
            .or_default()
            .insert(client_id);
        client_channels
            .entry(client_id)
            .or_default()
            .insert(channel.clone());

        debug!("Client {} subscribed to {}", client_id, channel);
    }

    pub async fn unsubscribe(&self, client_id: Uuid, channel: &str) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        if let Some(subscribers) = subscriptions.get_mut(channel) {
            subscribers.remove(&client_id);
            if subscribers.is_empty() {
                subscriptions.remove(channel);
            }
        }
        if let Some(channels) = client_channels.get_mut(&client_id) {
            channels.remove(channel);
        }

        debug!("Client {} unsubscribed from {}", client_id, channel);
    }

    /// Record who a client authenticated as. A client switching users
    /// loses the previous user's subscriptions.
    async fn bind_user(&self, client_id: Uuid, user_id: Uuid) {
        let previous = self.client_users.write().await.insert(client_id, user_id);
        if previous.is_some_and(|p| p != user_id) {
            self.drop_subscriptions(client_id).await;
        }
    }

    /// Unsubscribe every client of `user_id` from the room channel; returns how many
    pub async fn revoke_room(&self, room_id: Uuid, user_id: Uuid) -> usize {
        let channel = Channel::Room(room_id).name();
        let clients: Vec<Uuid> = self
            .client_users
            .read()
            .await
            .iter()
            .filter(|(_, u)| **u == user_id)
            .map(|(c, _)| *c)
            .collect();

        let mut revoked = 0;
        for client_id in clients {
            if self.is_client_subscribed(client_id, &channel).await {
                self.unsubscribe(client_id, &channel).await;
                revoked += 1;
            }
        }
        if revoked > 0 {
            info!("Revoked {} subscription(s) of {} to {}", revoked, user_id, channel);
        }
        revoked
    }

    /// Forget every subscription of a disconnected client
    pub async fn disconnect(&self, client_id: Uuid) {
        self.client_users.write().await.remove(&client_id);
        self.drop_subscriptions(client_id).await;
    }

    async fn drop_subscriptions(&self, client_id: Uuid) {
        let channels = self
            .client_channels
            .write()
            .await
            .remove(&client_id)
            .unwrap_or_default();

        let mut subscriptions = self.subscriptions.write().await;
        for channel in channels {
            if let Some(subscribers) = subscriptions.get_mut(&channel) {
                subscribers.remove(&client_id);
                if subscribers.is_empty() {
                    subscriptions.remove(&channel);
                }
            }
        }
    }

    async fn is_client_subscribed(&self, client_id: Uuid, channel: &str) -> bool {
        self.subscriptions
            .read()
            .await
            .get(channel)
            .map(|subscribers| subscribers.contains(&client_id))
            .unwrap_or(false)
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(channel)
            .map(HashSet::len)
            .unwrap_or(0)
    }

    /// Whether `user_id` may listen on `channel`
    async fn authorize(&self, user_id: Uuid, channel: Channel) -> AppResult<bool> {
        match channel {
            Channel::User(id) => Ok(id == user_id),
            Channel::Room(room_id) => Ok(self.members.find(room_id, user_id).await?.is_some()),
        }
    }

    /// Process one client frame; returns the reply to send back
    async fn handle_client_message(
        &self,
        client_id: Uuid,
        user: &mut Option<Uuid>,
        text: &str,
    ) -> serde_json::Value {
        let error = |message: &str| serde_json::json!({ "type": "error", "message": message });

        let Ok(message) = serde_json::from_str::<WsMessage>(text) else {
            warn!("Failed to parse message from client {}", client_id);
            return error("Invalid message format");
        };

        match message {
            WsMessage::Authenticate { token } => match self.auth.authenticate(&token).await {
                Ok(found) => {
                    self.bind_user(client_id, found.id).await;
                    *user = Some(found.id);
                    info!("WebSocket client {} authenticated as {}", client_id, found.id);
                    serde_json::json!({ "type": "authenticated", "user_id": found.id })
                }
                Err(_) => error("Invalid or expired session"),
            },
            WsMessage::Subscribe { channel } => {
                let Some(user_id) = *user else {
                    return error("Authenticate first");
                };
                let Some(parsed) = Channel::parse(&channel) else {
                    return error("Unknown channel");
                };
                match self.authorize(user_id, parsed).await {
                    Ok(true) => {
                        self.subscribe(client_id, parsed.name()).await;
                        serde_json::json!({ "type": "subscribed", "channel": parsed.name() })
                    }
                    Ok(false) => error("Not allowed to subscribe to this channel"),
                    Err(e) => {
                        error!("Channel authorization failed: {}", e);
                        error("Subscription failed")
                    }
                }
            }
            WsMessage::Unsubscribe { channel } => {
                self.unsubscribe(client_id, &channel).await;
                serde_json::json!({ "type": "unsubscribed", "channel": channel })
            }
            _ => {
                warn!("Unexpected message type from client {}", client_id);
                error("Unexpected message type")
            }
        }
    }

    /// Handle a new WebSocket connection until it closes
    pub async fn handle_connection(&self, stream: tokio::net::TcpStream) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut rx = self.tx.subscribe();
        let client_id = Uuid::new_v4();
        let mut user: Option<Uuid> = None;

        info!("New WebSocket connection: {}", client_id);

        let welcome = serde_json::json!({
            "type": "connected",
            "client_id": client_id,
            "message": "Connected to Messmate. Send an authenticate message to continue."
        });
        if let Err(e) = ws_sender.send(Message::Text(welcome.to_string())).await {
            warn!("Failed to send welcome message: {}", e);
        }

        loop {
            tokio::select! {
                incoming = ws_receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = self.handle_client_message(client_id, &mut user, &text).await;
                        if let Err(e) = ws_sender.send(Message::Text(reply.to_string())).await {
                            warn!("Failed to reply to client {}: {}", client_id, e);
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = ws_sender.send(Message::Pong(payload)).await {
                            debug!("Failed to answer ping from client {}: {}", client_id, e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket connection closed: {}", client_id);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                },
                outgoing = rx.recv() => match outgoing {
                    Ok(envelope) => {
                        if !self.is_client_subscribed(client_id, &envelope.channel).await {
                            continue;
                        }
                        let json = match serde_json::to_string(&envelope.message) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to serialize message: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            error!("Failed to send message to client {}: {}", client_id, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, {} messages dropped", client_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        self.disconnect(client_id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::create_lazy_pool;
    use crate::repositories::{SessionRepository, UserRepository};
    use chrono::Utc;

    fn server() -> WebSocketServer {
        let pool = create_lazy_pool(&DatabaseConfig::default()).unwrap();
        let auth = Arc::new(AuthService::new(
            Arc::new(UserRepository::new(pool.clone())),
            Arc::new(SessionRepository::new(pool.clone())),
            24,
        ));
        WebSocketServer::new(auth, Arc::new(RoomMemberRepository::new(pool)))
    }

    fn notification(user_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            room_id: None,
            kind: "payment_recorded".to_string(),
            title: "Payment recorded".to_string(),
            message: "500.00 received".to_string(),
            read: false,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_channel_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(Channel::parse(&format!("room:{}", id)), Some(Channel::Room(id)));
        assert_eq!(Channel::parse(&format!("user:{}", id)), Some(Channel::User(id)));
        assert_eq!(Channel::parse("event:1"), None);
        assert_eq!(Channel::parse("room:not-a-uuid"), None);
        assert_eq!(Channel::Room(id).name(), format!("room:{}", id));
    }

    #[test]
    fn test_notification_message_shape() {
        let user = Uuid::new_v4();
        let json = serde_json::to_value(WsMessage::Notification {
            notification: notification(user),
        })
        .unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["notification"]["user_id"], user.to_string());

        let parsed: WsMessage =
            serde_json::from_str(r#"{"type":"subscribe","channel":"room:x"}"#).unwrap();
        assert!(matches!(parsed, WsMessage::Subscribe { .. }));
    }

    #[tokio::test]
    async fn test_push_reaches_only_subscribed_channels() {
        let ws = server();
        let user = Uuid::new_v4();
        let client = Uuid::new_v4();
        let mut rx = ws.tx.subscribe();

        // Nobody listening yet
        assert_eq!(ws.push_notification(&notification(user)).await, 0);

        ws.subscribe(client, Channel::User(user).name()).await;
        assert_eq!(ws.push_notification(&notification(user)).await, 1);
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.channel, Channel::User(user).name());

        assert_eq!(ws.push_room_update(Uuid::new_v4(), "meal", "updated").await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_clears_subscriptions() {
        let ws = server();
        let client = Uuid::new_v4();
        let room = Channel::Room(Uuid::new_v4()).name();

        ws.subscribe(client, room.clone()).await;
        ws.subscribe(client, Channel::User(Uuid::new_v4()).name()).await;
        assert_eq!(ws.subscriber_count(&room).await, 1);

        ws.disconnect(client).await;
        assert_eq!(ws.subscriber_count(&room).await, 0);
        assert!(!ws.is_client_subscribed(client, &room).await);
    }

    #[tokio::test]
    async fn test_revoke_room_stops_room_updates() {
        let ws = server();
        let (member, other) = (Uuid::new_v4(), Uuid::new_v4());
        let (phone, laptop, bystander) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let room_id = Uuid::new_v4();
        let room = Channel::Room(room_id).name();

        ws.bind_user(phone, member).await;
        ws.bind_user(laptop, member).await;
        ws.bind_user(bystander, other).await;
        for client in [phone, laptop, bystander] {
            ws.subscribe(client, room.clone()).await;
        }
        ws.subscribe(phone, Channel::User(member).name()).await;

        assert_eq!(ws.revoke_room(room_id, member).await, 2);
        assert!(!ws.is_client_subscribed(phone, &room).await);
        assert!(!ws.is_client_subscribed(laptop, &room).await);
        assert!(ws.is_client_subscribed(bystander, &room).await);
        // personal notifications keep flowing
        assert!(ws.is_client_subscribed(phone, &Channel::User(member).name()).await);
        assert_eq!(ws.push_room_update(room_id, "meal", "updated").await, 1);

        assert_eq!(ws.revoke_room(room_id, member).await, 0);
    }

    #[tokio::test]
    async fn test_switching_user_drops_old_subscriptions() {
        let ws = server();
        let client = Uuid::new_v4();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let channel = Channel::User(first).name();

        ws.bind_user(client, first).await;
        ws.subscribe(client, channel.clone()).await;
        ws.bind_user(client, first).await;
        assert!(ws.is_client_subscribed(client, &channel).await);

        ws.bind_user(client, second).await;
        assert!(!ws.is_client_subscribed(client, &channel).await);
    }

    #[tokio::test]
    async fn test_connection_answers_ping_and_ends_on_close() {
        let ws = server();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            ws.handle_connection(stream).await
        });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        let welcome = client.next().await.unwrap().unwrap();
        assert!(welcome.into_text().unwrap().contains("connected"));

        client.send(Message::Ping(b"still there".to_vec())).await.unwrap();
        let pong = client.next().await.unwrap().unwrap();
        assert_eq!(pong, Message::Pong(b"still there".to_vec()));

        client.close(None).await.unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_requires_authentication() {
        let ws = server();
        let mut user = None;
        let reply = ws
            .handle_client_message(
                Uuid::new_v4(),
                &mut user,
                &format!(r#"{{"type":"subscribe","channel":"user:{}"}}"#, Uuid::new_v4()),
            )
            .await;
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["message"], "Authenticate first");
    }

    #[tokio::test]
    async fn test_users_cannot_listen_to_each_other() {
        let ws = server();
        let me = Uuid::new_v4();
        let mut user = Some(me);

        let other = ws
            .handle_client_message(
                Uuid::new_v4(),
                &mut user,
                &format!(r#"{{"type":"subscribe","channel":"user:{}"}}"#, Uuid::new_v4()),
            )
            .await;
        assert_eq!(other["type"], "error");

        let own = ws
            .handle_client_message(
                Uuid::new_v4(),
                &mut user,
                &format!(r#"{{"type":"subscribe","channel":"user:{}"}}"#, me),
            )
            .await;
        assert_eq!(own["type"], "subscribed");
    }
}
