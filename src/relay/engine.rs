//! The message relay engine.
//!
//! Consumes events from both chat systems, routes them through the channel
//! link registry, rewrites content through the mention resolver, and
//! forwards. The engine is stateless per message: loop prevention is an
//! author-identity comparison at the top of each path, never deduplication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::common::messages::{LocalChatMessage, RemoteMessageEvent};
use crate::common::types::SubscriptionId;
use crate::discord::client::ConnectionManager;
use crate::discord::commands::SendOutcome;
use crate::discord::resolver::MentionResolver;
use crate::local::bus::{LocalChatBus, LocalIdentity};
use crate::relay::registry::LinkRegistry;

/// Messages starting with this character are bot commands and are never
/// relayed.
pub const COMMAND_PREFIX: char = '?';

/// Stable key of the synthetic identity that posts relayed content.
pub const RELAY_IDENTITY_KEY: &str = "discord-relay";

/// Display name of the relay identity. Outbound messages from this sender
/// are self-originated loopback and are dropped.
pub const RELAY_IDENTITY_NAME: &str = "Discord";

/// Per-reason counters over relay decisions.
///
/// "No link configured" and "loop guard" drops are both silent by design;
/// the counters keep them distinguishable.
#[derive(Debug, Default)]
pub struct RelayCounters {
    pub dropped_loop_guard: AtomicU64,
    pub dropped_no_link: AtomicU64,
    pub forwarded_outbound: AtomicU64,
    pub forwarded_inbound: AtomicU64,
}

/// A prepared Local → Remote forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundSend {
    pub guild: String,
    pub channel: String,
    pub content: String,
}

#[derive(Default)]
struct Registration {
    active: bool,
    local_subscription: Option<SubscriptionId>,
    remote_subscription: Option<SubscriptionId>,
    tasks: Vec<JoinHandle<()>>,
}

/// The relay engine. Holds references to its collaborators, never copies,
/// so configuration edits are visible immediately.
pub struct RelayEngine {
    bus: Arc<LocalChatBus>,
    manager: Arc<ConnectionManager>,
    links: Arc<LinkRegistry>,
    resolver: MentionResolver,
    registration: Mutex<Registration>,
    counters: RelayCounters,
    relay_identity: OnceLock<LocalIdentity>,
}

impl RelayEngine {
    pub fn new(
        bus: Arc<LocalChatBus>,
        manager: Arc<ConnectionManager>,
        links: Arc<LinkRegistry>,
    ) -> Self {
        Self {
            bus,
            manager,
            links,
            resolver: MentionResolver::new(),
            registration: Mutex::new(Registration::default()),
            counters: RelayCounters::default(),
            relay_identity: OnceLock::new(),
        }
    }

    #[allow(dead_code)]
    pub fn counters(&self) -> &RelayCounters {
        &self.counters
    }

    /// The synthetic identity used to post relayed content, created lazily
    /// once and cached.
    async fn relay_identity(&self) -> LocalIdentity {
        if let Some(identity) = self.relay_identity.get() {
            return identity.clone();
        }
        let identity = self
            .bus
            .get_or_create_identity(RELAY_IDENTITY_KEY, RELAY_IDENTITY_NAME)
            .await;
        self.relay_identity.get_or_init(|| identity).clone()
    }

    /// Wire up both subscriptions. Idempotent: a second call while active
    /// is a no-op, so reconnects never double-subscribe.
    pub async fn begin_relaying(self: &Arc<Self>) {
        let mut registration = self.registration.lock().await;
        if registration.active {
            return;
        }

        let (local_tx, mut local_rx) = mpsc::unbounded_channel::<LocalChatMessage>();
        let local_subscription = self
            .bus
            .subscribe(Box::new(move |message| {
                let _ = local_tx.send(message.clone());
            }))
            .await;

        let (remote_tx, mut remote_rx) = mpsc::unbounded_channel::<RemoteMessageEvent>();
        let remote_subscription = self
            .manager
            .remote_events()
            .subscribe(Box::new(move |event| {
                let _ = remote_tx.send(event);
            }))
            .await;

        let outbound_task = {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(message) = local_rx.recv().await {
                    engine.handle_local_message(message).await;
                }
            })
        };
        let inbound_task = {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(event) = remote_rx.recv().await {
                    engine.handle_remote_message(event).await;
                }
            })
        };

        registration.local_subscription = Some(local_subscription);
        registration.remote_subscription = Some(remote_subscription);
        registration.tasks = vec![outbound_task, inbound_task];
        registration.active = true;
        debug!("Relay wiring established");
    }

    /// Tear down both subscriptions. Safe to call when not relaying.
    pub async fn stop_relaying(&self) {
        let mut registration = self.registration.lock().await;
        if !registration.active {
            return;
        }

        if let Some(id) = registration.local_subscription.take() {
            self.bus.unsubscribe(id).await;
        }
        if let Some(id) = registration.remote_subscription.take() {
            self.manager.remote_events().unsubscribe(id).await;
        }
        for task in registration.tasks.drain(..) {
            task.abort();
        }
        registration.active = false;
        debug!("Relay wiring torn down");
    }

    #[allow(dead_code)]
    pub async fn is_relaying(&self) -> bool {
        self.registration.lock().await.active
    }

    /// Outbound path: a local chat message toward Discord.
    pub(crate) async fn handle_local_message(&self, message: LocalChatMessage) {
        debug!(
            sender = %message.sender,
            tag = %message.tag,
            category = ?message.category,
            temporary = message.temporary,
            "Local message: {}",
            message.text
        );

        let Some(send) = self.prepare_outbound(&message).await else {
            return;
        };

        match self
            .manager
            .send_to_channel(&send.guild, &send.channel, &send.content)
            .await
        {
            SendOutcome::Sent => {
                self.counters.forwarded_outbound.fetch_add(1, Ordering::Relaxed);
            }
            outcome => warn!("Outbound relay not delivered: {outcome}"),
        }
    }

    /// Decide and format an outbound forward. `None` means drop.
    pub(crate) async fn prepare_outbound(
        &self,
        message: &LocalChatMessage,
    ) -> Option<OutboundSend> {
        let relay_identity = self.relay_identity().await;
        if message.sender == relay_identity.name {
            self.counters.dropped_loop_guard.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        if message.sender.trim().is_empty() {
            return None;
        }

        // The tag carries the channel name behind its `#` marker.
        let local_channel = message.tag.strip_prefix('#').unwrap_or(&message.tag);
        let Some(link) = self.links.find_by_local_channel(local_channel).await else {
            // Absence of a link is a valid configuration state, not an error.
            self.counters.dropped_no_link.fetch_add(1, Ordering::Relaxed);
            debug!(channel = local_channel, "No channel link for local message");
            return None;
        };
        if link.remote_guild.trim().is_empty() || link.remote_channel.trim().is_empty() {
            self.counters.dropped_no_link.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        debug!("Relaying local message to Discord");
        Some(OutboundSend {
            content: self
                .resolver
                .format_from_user(&message.text, &message.sender),
            guild: link.remote_guild,
            channel: link.remote_channel,
        })
    }

    /// Inbound path: a Discord message toward local chat.
    pub(crate) async fn handle_remote_message(&self, event: RemoteMessageEvent) {
        debug!(
            guild = event.guild_id,
            channel = %event.channel_name,
            author = event.author_id,
            "Message received from Discord"
        );

        let Some(text) = self.prepare_inbound(&event).await else {
            return;
        };

        let identity = self.relay_identity().await;
        self.bus.post(&text, &identity);
        self.counters.forwarded_inbound.fetch_add(1, Ordering::Relaxed);
    }

    /// Decide and compose an inbound post. `None` means drop.
    pub(crate) async fn prepare_inbound(&self, event: &RemoteMessageEvent) -> Option<String> {
        if event.author_is_self {
            self.counters.dropped_loop_guard.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        if event.content.starts_with(COMMAND_PREFIX) {
            return None;
        }

        // Channel name first, snowflake id as fallback.
        let link = match self.links.find_by_remote_channel(&event.channel_name).await {
            Some(link) => Some(link),
            None => {
                self.links
                    .find_by_remote_channel(&event.channel_id.to_string())
                    .await
            }
        };
        let Some(link) = link else {
            self.counters.dropped_no_link.fetch_add(1, Ordering::Relaxed);
            debug!(channel = %event.channel_name, "No channel link for Discord message");
            return None;
        };
        if link.local_channel.trim().is_empty() {
            self.counters.dropped_no_link.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let nametag = self
            .resolver
            .nametag(event.author_display.as_deref(), &event.author_name);
        let content = self.resolver.rewrite_mentions(&event.content, &event.mentions);

        debug!(channel = %link.local_channel, "Relaying Discord message to local chat");
        Some(format!("#{} {}: {}", link.local_channel, nametag, content))
    }
}
