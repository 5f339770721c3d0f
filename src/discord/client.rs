//! Discord connection management.
//!
//! `ConnectionManager` owns the serenity client lifecycle end to end:
//! nothing outside this module constructs or disposes the live client
//! handle. The operator-visible connection status is published through a
//! watch channel, and message-created events fan out through an observer
//! registry so the relay can wire and unwire itself without touching
//! serenity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serenity::async_trait;
use serenity::cache::Cache;
use serenity::gateway::ShardManager;
use serenity::http::{Http, HttpBuilder};
use serenity::model::channel::Message;
use serenity::model::event::ResumedEvent;
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::*;
use serenity::Client;

use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::common::error::{ClientError, ClientResult};
use crate::common::messages::{MentionSet, RemoteMessageEvent};
use crate::common::types::SubscriptionId;
use crate::config::store::ConfigStore;
use crate::discord::commands::{parse_snowflake, SendOutcome};

/// How long to wait for the gateway to become ready after starting.
const CONNECT_WAIT: Duration = Duration::from_secs(15);

/// Credential substituted for an empty/whitespace token. Whitespace isn't
/// allowed by the client constructor, and this triggers an obvious
/// authentication error rather than crashing.
const FALLBACK_INVALID_TOKEN: &str = "ThisTokenWillNeverWork";

pub const STATUS_IDLE: &str = "No Connection Attempt Made";
pub const STATUS_SETTING_UP: &str = "Setting up client";
pub const STATUS_CONNECTING: &str = "Attempting connection...";
pub const STATUS_CONNECTED: &str = "Connection successful";
pub const STATUS_FAILED: &str = "Connection failed";

/// Lifecycle state of the Discord connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Connected,
    Failed,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Resolve the token the client will actually be built with.
pub(crate) fn effective_token(configured: &str) -> &str {
    if configured.trim().is_empty() {
        FALLBACK_INVALID_TOKEN
    } else {
        configured
    }
}

/// Callback invoked for every message-created event.
pub type RemoteCallback = Box<dyn Fn(RemoteMessageEvent) + Send + Sync>;

/// Observer registry for Discord message-created events.
///
/// Mirrors the local bus: subscriptions are identified by handle, and
/// deregistration is keyed by handle identity.
#[derive(Default)]
pub struct RemoteEventRegistry {
    next_subscription: AtomicU64,
    observers: Mutex<Vec<(SubscriptionId, RemoteCallback)>>,
}

impl RemoteEventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, callback: RemoteCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().await.push((id, callback));
        id
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) {
        self.observers
            .lock()
            .await
            .retain(|(existing, _)| *existing != id);
    }

    #[allow(dead_code)]
    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }

    pub async fn dispatch(&self, event: RemoteMessageEvent) {
        let observers = self.observers.lock().await;
        for (_, callback) in observers.iter() {
            callback(event.clone());
        }
    }
}

/// Serenity event handler: logs lifecycle events, signals readiness, and
/// reduces message events to plain data before fanning them out.
struct GatewayEvents {
    ready_tx: Mutex<Option<oneshot::Sender<()>>>,
    observers: Arc<RemoteEventRegistry>,
}

#[async_trait]
impl EventHandler for GatewayEvents {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Connected and ready as {}", ready.user.name);
        if let Some(ready_tx) = self.ready_tx.lock().await.take() {
            let _ = ready_tx.send(());
        }
    }

    async fn resume(&self, _ctx: Context, _event: ResumedEvent) {
        info!("Resumed connection");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Some(event) = extract_message_event(&ctx, &msg).await {
            self.observers.dispatch(event).await;
        }
    }
}

/// Reduce a serenity message to the data the relay needs.
///
/// Member and mention resolution happens here, against the guild's current
/// state; anything unresolvable degrades (author falls back to the base
/// username, unresolved mention ids are simply absent from the set).
async fn extract_message_event(ctx: &Context, msg: &Message) -> Option<RemoteMessageEvent> {
    let guild_id = msg.guild_id?;
    let author_is_self = msg.author.id == ctx.cache.current_user().id;

    let author_display = msg
        .member(ctx)
        .await
        .ok()
        .map(|member| member.display_name().to_string());

    let mut mentions = MentionSet::default();
    let mut channel_name = String::new();
    if let Some(guild) = ctx.cache.guild(guild_id) {
        if let Some(channel) = guild.channels.get(&msg.channel_id) {
            channel_name = channel.name.to_string();
        }
        for user in &msg.mentions {
            if let Some(member) = guild.members.get(&user.id) {
                mentions
                    .users
                    .push((user.id.get(), member.display_name().to_string()));
            }
        }
        for role_id in &msg.mention_roles {
            if let Some(role) = guild.roles.get(role_id) {
                mentions.roles.push((role_id.get(), role.name.to_string()));
            }
        }
    }
    for mention in &msg.mention_channels {
        mentions.channels.push((mention.id.get(), mention.name.clone()));
    }

    Some(RemoteMessageEvent {
        author_id: msg.author.id.get(),
        author_name: msg.author.name.to_string(),
        author_display,
        author_is_self,
        guild_id: guild_id.get(),
        channel_id: msg.channel_id.get(),
        channel_name,
        content: msg.content.to_string(),
        mentions,
    })
}

/// The live client and its extracted parts.
struct ClientHandle {
    http: Arc<Http>,
    cache: Arc<Cache>,
    shard_manager: Arc<ShardManager>,
    /// Present until the gateway is started.
    client: Option<Client>,
    gateway: Option<JoinHandle<()>>,
    ready_rx: Option<oneshot::Receiver<()>>,
}

impl ClientHandle {
    async fn dispose(mut self) {
        self.shard_manager.shutdown_all().await;
        if let Some(gateway) = self.gateway.take() {
            gateway.abort();
        }
    }
}

struct ClientSlot {
    state: ConnectionState,
    handle: Option<ClientHandle>,
    built_with_token: Option<String>,
}

/// Owner of the Discord client lifecycle.
pub struct ConnectionManager {
    store: Arc<ConfigStore>,
    slot: Mutex<ClientSlot>,
    status_tx: watch::Sender<String>,
    status_rx: watch::Receiver<String>,
    observers: Arc<RemoteEventRegistry>,
}

impl ConnectionManager {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let (status_tx, status_rx) = watch::channel(STATUS_IDLE.to_string());
        Self {
            store,
            slot: Mutex::new(ClientSlot {
                state: ConnectionState::Uninitialized,
                handle: None,
                built_with_token: None,
            }),
            status_tx,
            status_rx,
            observers: Arc::new(RemoteEventRegistry::new()),
        }
    }

    /// The message-created observer registry.
    pub fn remote_events(&self) -> Arc<RemoteEventRegistry> {
        Arc::clone(&self.observers)
    }

    /// Observable connection status.
    pub fn status(&self) -> watch::Receiver<String> {
        self.status_rx.clone()
    }

    /// Current status text.
    #[allow(dead_code)]
    pub fn status_text(&self) -> String {
        self.status_rx.borrow().clone()
    }

    #[allow(dead_code)]
    pub async fn state(&self) -> ConnectionState {
        self.slot.lock().await.state
    }

    /// Credential the live client was built with, if any.
    pub async fn built_with_token(&self) -> Option<String> {
        self.slot.lock().await.built_with_token.clone()
    }

    fn set_status(&self, status: &str) {
        self.status_tx.send_replace(status.to_string());
    }

    /// Build the client if needed and attempt the gateway handshake.
    pub async fn connect(&self) -> ClientResult<()> {
        let mut slot = self.slot.lock().await;

        if slot.handle.is_none() {
            self.set_status(STATUS_SETTING_UP);
            let configured = self.store.bot_token().await;
            let token = effective_token(&configured).to_string();
            match build_client(&token, Arc::clone(&self.observers)).await {
                Ok(handle) => {
                    slot.handle = Some(handle);
                    slot.built_with_token = Some(configured);
                }
                Err(e) => {
                    error!("{e}");
                    slot.state = ConnectionState::Failed;
                    self.set_status(STATUS_FAILED);
                    return Err(e);
                }
            }
        }

        slot.state = ConnectionState::Connecting;
        self.set_status(STATUS_CONNECTING);

        let (client, ready_rx) = match slot.handle.as_mut() {
            Some(handle) => (handle.client.take(), handle.ready_rx.take()),
            None => (None, None),
        };
        let (Some(mut client), Some(ready_rx)) = (client, ready_rx) else {
            // A client that already attempted a handshake cannot be restarted
            // in place; the operator path for that is rebuild().
            slot.state = ConnectionState::Failed;
            self.set_status(STATUS_FAILED);
            return Err(ClientError::ConnectFailed {
                message: "client already started; rebuild required".to_string(),
            });
        };

        if let Some(handle) = slot.handle.as_mut() {
            handle.gateway = Some(tokio::spawn(async move {
                if let Err(e) = client.start().await {
                    error!("Discord client error: {e}");
                }
                debug!("Discord gateway task ended");
            }));
        }
        drop(slot);

        match tokio::time::timeout(CONNECT_WAIT, ready_rx).await {
            Ok(Ok(())) => {
                let mut slot = self.slot.lock().await;
                slot.state = ConnectionState::Connected;
                self.set_status(STATUS_CONNECTED);
                info!("Connected to Discord");
                Ok(())
            }
            _ => {
                // Ready never fired: auth failure or gateway unreachable.
                // Dispose the dead client so a later connect starts clean.
                let mut slot = self.slot.lock().await;
                if let Some(handle) = slot.handle.take() {
                    handle.dispose().await;
                }
                slot.state = ConnectionState::Failed;
                self.set_status(STATUS_FAILED);
                let error = ClientError::ConnectFailed {
                    message: "gateway did not become ready".to_string(),
                };
                error!("{error}");
                Err(error)
            }
        }
    }

    /// Shut the gateway down. Safe to call in any state.
    pub async fn disconnect(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.handle.as_ref() {
            handle.shard_manager.shutdown_all().await;
            info!("Disconnected from Discord");
        }
        slot.state = ConnectionState::Disconnected;
    }

    /// Dispose any existing client and construct a fresh one with the
    /// currently stored credential. Idempotent: safe when no client exists.
    pub async fn rebuild(&self) -> ClientResult<()> {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.handle.take() {
            handle.dispose().await;
        }
        slot.state = ConnectionState::Uninitialized;
        slot.built_with_token = None;
        self.set_status(STATUS_SETTING_UP);

        let configured = self.store.bot_token().await;
        let token = effective_token(&configured).to_string();
        match build_client(&token, Arc::clone(&self.observers)).await {
            Ok(handle) => {
                slot.handle = Some(handle);
                slot.built_with_token = Some(configured);
                Ok(())
            }
            Err(e) => {
                error!("{e}");
                Err(e)
            }
        }
    }

    /// `rebuild()` followed by `connect()`. Used when the credential changes.
    pub async fn restart(&self) -> ClientResult<()> {
        self.rebuild().await?;
        self.connect().await
    }

    /// Send a message to a channel addressed by guild and channel reference
    /// (name or snowflake id).
    pub async fn send_to_channel(
        &self,
        guild_ref: &str,
        channel_ref: &str,
        content: &str,
    ) -> SendOutcome {
        let slot = self.slot.lock().await;
        if slot.state != ConnectionState::Connected {
            return SendOutcome::NoClient;
        }
        let Some(handle) = slot.handle.as_ref() else {
            return SendOutcome::NoClient;
        };
        let Some(guild_id) = find_guild(&handle.cache, guild_ref) else {
            return SendOutcome::NoGuild;
        };
        let Some(channel_id) = find_channel(&handle.cache, guild_id, channel_ref) else {
            return SendOutcome::NoChannel;
        };
        let http = Arc::clone(&handle.http);
        drop(slot);

        match channel_id.say(&http, content).await {
            Ok(_) => SendOutcome::Sent,
            Err(e) => {
                error!("Failed to send to Discord channel {channel_ref}: {e}");
                SendOutcome::SendFailed
            }
        }
    }

    /// Names of every guild the client can see.
    #[allow(dead_code)]
    pub async fn guild_names(&self) -> Vec<String> {
        let slot = self.slot.lock().await;
        let Some(handle) = slot.handle.as_ref() else {
            return Vec::new();
        };
        handle
            .cache
            .guilds()
            .into_iter()
            .filter_map(|guild_id| handle.cache.guild(guild_id).map(|g| g.name.to_string()))
            .collect()
    }

    /// Resolve a guild reference (name or id) and a channel name within it.
    pub async fn resolve_channel(
        &self,
        guild_ref: &str,
        channel_name: &str,
    ) -> Option<(GuildId, ChannelId)> {
        let slot = self.slot.lock().await;
        let handle = slot.handle.as_ref()?;
        let guild_id = find_guild(&handle.cache, guild_ref)?;
        let guild = handle.cache.guild(guild_id)?;
        let channel_id = guild
            .channels
            .values()
            .find(|channel| channel.name.as_str() == channel_name)
            .map(|channel| channel.id)?;
        Some((guild_id, channel_id))
    }
}

fn find_guild(cache: &Cache, reference: &str) -> Option<GuildId> {
    if let Some(id) = parse_snowflake(reference) {
        let guild_id = GuildId::new(id);
        return cache.guild(guild_id).map(|guild| guild.id);
    }
    cache.guilds().into_iter().find(|guild_id| {
        cache
            .guild(*guild_id)
            .map(|guild| guild.name.as_str() == reference)
            .unwrap_or(false)
    })
}

fn find_channel(cache: &Cache, guild_id: GuildId, reference: &str) -> Option<ChannelId> {
    let guild = cache.guild(guild_id)?;
    if let Some(id) = parse_snowflake(reference) {
        let channel_id = ChannelId::new(id);
        return guild.channels.contains_key(&channel_id).then_some(channel_id);
    }
    guild
        .channels
        .values()
        .find(|channel| channel.name.as_str() == reference)
        .map(|channel| channel.id)
}

async fn build_client(
    token: &str,
    observers: Arc<RemoteEventRegistry>,
) -> ClientResult<ClientHandle> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS;

    // Custom reqwest client so HTTP calls carry explicit timeouts.
    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ClientError::BuildFailed {
            message: e.to_string(),
        })?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let (ready_tx, ready_rx) = oneshot::channel();
    let events = GatewayEvents {
        ready_tx: Mutex::new(Some(ready_tx)),
        observers,
    };

    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .await
        .map_err(|e| ClientError::BuildFailed {
            message: e.to_string(),
        })?;

    Ok(ClientHandle {
        http: Arc::clone(&client.http),
        cache: Arc::clone(&client.cache),
        shard_manager: Arc::clone(&client.shard_manager),
        client: Some(client),
        gateway: None,
        ready_rx: Some(ready_rx),
    })
}
