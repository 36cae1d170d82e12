//! Async message bus — the central nervous system of ClawAI.
//!
//! Uses tokio::sync::mpsc bounded channels for the inbound/outbound
//! queues and a per-channel subscriber fanout for outbound delivery.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{debug, warn};

use super::types::{InboundMessage, OutboundMessage};

/// A subscriber callback invoked for each outbound message on its channel.
pub type SubscriberFn =
    Arc<dyn Fn(OutboundMessage) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// The message bus connecting channels ↔ agent loop.
///
/// - Channels publish to `inbound` (user messages arriving)
/// - Agent loop consumes from `inbound`, processes, publishes to `outbound`
/// - Subscribers registered via `subscribe` receive outbound deliveries
///   for their channel, fanned out by the background dispatcher.
pub struct MessageBus {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: tokio::sync::Mutex<mpsc::Receiver<OutboundMessage>>,
    subscribers: RwLock<HashMap<String, Vec<SubscriberFn>>>,
    running: AtomicBool,
    shutdown: Arc<Notify>,
}

impl MessageBus {
    /// Create a new message bus with the given buffer capacity.
    pub fn new(buffer_size: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer_size);
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer_size);

        MessageBus {
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            subscribers: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Publish a message from a channel to the agent (inbound).
    pub async fn publish_inbound(&self, msg: InboundMessage) -> Result<(), mpsc::error::SendError<InboundMessage>> {
        self.inbound_tx.send(msg).await
    }

    /// Consume the next inbound message (blocks until available).
    /// Returns None if all senders are dropped.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await
    }

    /// Publish a response from the agent to a channel (outbound).
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> Result<(), mpsc::error::SendError<OutboundMessage>> {
        self.outbound_tx.send(msg).await
    }

    /// Consume the next outbound message (blocks until available).
    /// Returns None if all senders are dropped.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        let mut rx = self.outbound_rx.lock().await;
        rx.recv().await
    }

    /// Get a clone of the inbound sender (for channels to use).
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundMessage> {
        self.inbound_tx.clone()
    }

    /// Get a clone of the outbound sender (for the agent loop to use).
    pub fn outbound_sender(&self) -> mpsc::Sender<OutboundMessage> {
        self.outbound_tx.clone()
    }

    /// Register an async callback for outbound delivery on `channel`.
    ///
    /// Multiple subscribers may register for the same channel; all are
    /// invoked for each matching outbound message.
    pub async fn subscribe(&self, channel: impl Into<String>, callback: SubscriberFn) {
        let channel = channel.into();
        let mut subs = self.subscribers.write().await;
        subs.entry(channel).or_default().push(callback);
    }

    /// Remove all subscribers for a channel.
    pub async fn unsubscribe_all(&self, channel: &str) {
        let mut subs = self.subscribers.write().await;
        subs.remove(channel);
    }

    /// Start the background outbound dispatcher. Idempotent: calling
    /// `start` while already running has no effect.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("bus dispatcher already running, start() is a no-op");
            return;
        }

        let bus = self.clone();
        tokio::spawn(async move {
            bus.dispatch_loop().await;
        });
    }

    /// Stop the dispatcher. The dispatcher exits on its next iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Drains the outbound queue and fans each message out to its
    /// channel's subscribers. A failing subscriber is logged and does
    /// not prevent its siblings from running.
    async fn dispatch_loop(self: Arc<Self>) {
        debug!("bus dispatcher started");

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                msg = self.consume_outbound() => {
                    match msg {
                        Some(outbound) => self.fan_out(outbound).await,
                        None => {
                            debug!("outbound queue closed, dispatcher exiting");
                            break;
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    debug!("bus dispatcher received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("bus dispatcher stopped");
    }

    async fn fan_out(&self, msg: OutboundMessage) {
        let callbacks = {
            let subs = self.subscribers.read().await;
            subs.get(&msg.channel).cloned()
        };

        let callbacks = match callbacks {
            Some(c) if !c.is_empty() => c,
            _ => {
                warn!(channel = %msg.channel, "no subscriber registered for outbound channel, dropping message");
                return;
            }
        };

        let mut handles = Vec::with_capacity(callbacks.len());
        for cb in callbacks {
            let msg = msg.clone();
            handles.push(tokio::spawn(async move { cb(msg).await }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "outbound subscriber callback failed"),
                Err(e) => warn!(error = %e, "outbound subscriber task panicked"),
            }
        }
    }
}
