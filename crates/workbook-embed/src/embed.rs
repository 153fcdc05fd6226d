//! Host-facing facade for one embedded workbook.
//!
//! Each [`WorkbookEmbed`] owns its own frame, channel, registry and mirror;
//! nothing is shared between instances. The mirror is fed by a set of default
//! handlers subscribed through the same registry host code uses.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::{info, warn};
use url::Url;
use uuid::Uuid;
use workbook_protocol::{BookmarkSpec, EventPayload, EventType, NodeType};

use crate::channel::{InboundEvent, Inbox, MessageChannel};
use crate::commands::CommandDispatcher;
use crate::config::EmbedConfig;
use crate::dump::MessageDump;
use crate::error::Result;
use crate::frame::{origin_of, FrameHandle, FrameHost};
use crate::lock;
use crate::mirror::{StateMirror, WorkbookState};
use crate::registry::{EventRegistry, Subscription};

pub struct WorkbookEmbed {
    label: String,
    config: EmbedConfig,
    frame: Arc<Mutex<FrameHandle>>,
    channel: Arc<MessageChannel>,
    registry: EventRegistry,
    mirror: Arc<StateMirror>,
    commands: CommandDispatcher,
    defaults: Mutex<Vec<Subscription>>,
    inbox: Mutex<Option<Inbox>>,
}

impl WorkbookEmbed {
    pub fn new(host: Box<dyn FrameHost>, config: EmbedConfig) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let label = format!("embed {}", &id[..8]);

        let dump = config.dump_path.as_ref().and_then(|path| {
            MessageDump::create(path)
                .map_err(|e| warn!("[{}] Cannot open dump {}: {}", label, path.display(), e))
                .ok()
                .map(Arc::new)
        });

        let frame = Arc::new(Mutex::new(FrameHandle::new(host)));
        let channel = Arc::new(MessageChannel::new(&label, frame.clone(), dump));
        let embed = Self {
            commands: CommandDispatcher::new(channel.clone()),
            label,
            config,
            frame,
            channel,
            registry: EventRegistry::new(),
            mirror: Arc::new(StateMirror::new()),
            defaults: Mutex::new(Vec::new()),
            inbox: Mutex::new(None),
        };
        embed.install_default_handlers();
        embed
    }

    fn install_default_handlers(&self) {
        let mut defaults = lock(&self.defaults);
        if defaults.first().is_some_and(Subscription::is_active) {
            return;
        }
        defaults.clear();

        for event_type in EventType::ALL {
            let mirror = self.mirror.clone();
            let label = self.label.clone();
            let sub = self.registry.subscribe(event_type, move |event: &InboundEvent| {
                match event.payload() {
                    EventPayload::ActionOutbound(action) => {
                        info!("[{}] Workbook action {}", label, action.name);
                    }
                    EventPayload::Error(error) => {
                        warn!("[{}] Workbook reported an error: {}", label, error);
                        mirror.apply(event.payload());
                    }
                    payload => mirror.apply(payload),
                }
                Ok(())
            });
            defaults.push(sub);
        }
    }

    /// Point the frame at `source_url` and start listening for its postings.
    ///
    /// Starts a new document lifecycle: the mirror is reset and any earlier
    /// inbox goes stale. An invalid URL fails before anything changes.
    pub fn initialize(&self, source_url: &str) -> Result<()> {
        let source = lock(&self.frame).attach(source_url)?;
        let expected_origin = self
            .config
            .expected_origin
            .clone()
            .unwrap_or_else(|| origin_of(&source));

        self.mirror.reset();
        self.install_default_handlers();
        let inbox = self
            .channel
            .on_message(&expected_origin, self.registry.clone())?;
        *lock(&self.inbox) = Some(inbox);

        info!(
            "[{}] Initialized {} (expecting postings from {})",
            self.label, source, expected_origin
        );
        Ok(())
    }

    /// Platform callback: the frame finished navigating.
    pub fn frame_loaded(&self) {
        lock(&self.frame).mark_loaded();
    }

    /// Reload the current source. The mirror keeps its state until the
    /// workbook reports again.
    pub fn refresh(&self) -> Result<()> {
        lock(&self.frame).refresh()?;
        info!("[{}] Refreshing frame", self.label);
        Ok(())
    }

    /// Tear down listeners and release the frame. Idempotent.
    ///
    /// The mirror keeps its last snapshot; use [`reset`](Self::reset) to
    /// clear it as well.
    pub fn detach(&self) {
        let removed = self.registry.clear();
        lock(&self.defaults).clear();
        self.channel.close();
        *lock(&self.inbox) = None;
        if lock(&self.frame).detach() {
            info!(
                "[{}] Detached frame ({} subscriptions removed)",
                self.label, removed
            );
        }
    }

    /// Detach and restore the mirror to its defaults.
    pub fn reset(&self) {
        self.detach();
        self.mirror.reset();
    }

    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(&InboundEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.subscribe(event_type, handler)
    }

    /// Active subscriptions, default mirror handlers included.
    pub fn subscriptions(&self) -> usize {
        self.registry.len()
    }

    pub fn state(&self) -> WorkbookState {
        self.mirror.snapshot()
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.frame).is_ready()
    }

    pub fn source(&self) -> Option<Url> {
        lock(&self.frame).source().cloned()
    }

    /// The current low-level listener, for platforms that deliver postings
    /// themselves rather than through [`FrameElement::listen`](crate::FrameElement::listen).
    pub fn inbox(&self) -> Option<Inbox> {
        lock(&self.inbox).clone()
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn commands(&self) -> &CommandDispatcher {
        &self.commands
    }

    pub async fn update_variables(&self, variables: BTreeMap<String, String>) -> Result<()> {
        self.commands.update_variables(variables).await
    }

    pub async fn create_bookmark(&self, spec: BookmarkSpec) -> Result<()> {
        self.commands.create_bookmark(spec).await
    }

    pub async fn update_bookmark(&self) -> Result<()> {
        self.commands.update_bookmark().await
    }

    pub async fn delete_bookmark(&self, bookmark_id: &str) -> Result<()> {
        self.commands.delete_bookmark(bookmark_id).await
    }

    pub async fn select_bookmark(&self, bookmark_id: Option<&str>) -> Result<()> {
        self.commands.select_bookmark(bookmark_id).await
    }

    pub async fn set_fullscreen(&self, node_id: Option<&str>) -> Result<()> {
        self.commands.set_fullscreen(node_id).await
    }

    pub async fn select_node(&self, node_id: &str, node_type: NodeType) -> Result<()> {
        self.commands.select_node(node_id, node_type).await
    }

    pub async fn update_sharing_link(
        &self,
        sharing_link: &str,
        exploration_link: Option<&str>,
    ) -> Result<()> {
        self.commands
            .update_sharing_link(sharing_link, exploration_link)
            .await
    }
}

impl Drop for WorkbookEmbed {
    fn drop(&mut self) {
        self.detach();
    }
}
