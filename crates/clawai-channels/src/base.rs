//! Channel trait — the abstract interface every chat channel must implement.
//!
//! Each channel (Telegram, Discord, etc.) implements this trait to:
//! - `start()` — begin listening for incoming messages (long-running)
//! - `stop()` — graceful shutdown
//! - `send()` — deliver an outbound message to the channel
//! - `name()` — channel identifier matching config keys

use std::sync::Arc;

use async_trait::async_trait;
use clawai_core::bus::queue::MessageBus;
use clawai_core::bus::types::{InboundMessage, OutboundMessage};

/// Every chat channel implements this trait.
///
/// The `ChannelManager` holds `Box<dyn Channel>` and orchestrates
/// start/stop/send across all enabled channels.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name (e.g. "telegram", "discord", "slack").
    ///
    /// Must match the key used in config and in `OutboundMessage.channel`.
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    ///
    /// This should be a long-running task that publishes `InboundMessage`s
    /// to the message bus. It runs until `stop()` is called or the
    /// shutdown signal is received.
    async fn start(&self) -> anyhow::Result<()>;

    /// Graceful shutdown — stop listening and clean up resources.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Send an outbound message to this channel.
    ///
    /// Called by the `ChannelManager`'s outbound dispatcher when
    /// it receives a message targeted at this channel.
    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()>;
}

// ─────────────────────────────────────────────
// Ingress allow-list + handle_message pipeline
// ─────────────────────────────────────────────

/// Per-adapter sender allow-list.
///
/// An empty list allows everyone. Otherwise a sender is allowed if its
/// `sender_id`, or any of its `|`-separated components, appears in the
/// list — this accommodates adapters whose sender_id is itself a
/// composite key (e.g. `"user_id|username"`).
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    /// Build an allow-list from config entries.
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// Empty allow-list: allow every sender.
    pub fn allow_all() -> Self {
        Self { entries: Vec::new() }
    }

    /// Whether `sender_id` passes the gate.
    pub fn allows(&self, sender_id: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        sender_id
            .split('|')
            .any(|part| self.entries.iter().any(|e| e == part))
            || self.entries.iter().any(|e| e == sender_id)
    }
}

/// Shared ingress pipeline every channel adapter calls for each platform
/// event. Consults the adapter's allow-list, constructs a tagged
/// `InboundMessage`, and publishes it to the bus.
///
/// Returns `Ok(true)` if the message was published, `Ok(false)` if the
/// sender was rejected by the allow-list.
pub async fn handle_message(
    bus: &Arc<MessageBus>,
    channel: &str,
    allow_list: &AllowList,
    sender_id: impl Into<String>,
    chat_id: impl Into<String>,
    content: impl Into<String>,
) -> anyhow::Result<bool> {
    let sender_id = sender_id.into();
    if !allow_list.allows(&sender_id) {
        return Ok(false);
    }

    let msg = InboundMessage::new(channel, sender_id, chat_id, content);
    bus.publish_inbound(msg).await?;
    Ok(true)
}
