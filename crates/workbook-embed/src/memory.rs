//! In-process [`FrameHost`] that records traffic instead of driving a browser.
//!
//! Used by the tests and by `wbembed replay`. The host keeps the last inbox
//! it was given even after the element is dropped, so late postings can be
//! pushed through a detached channel.

use std::sync::{Arc, Mutex};

use anyhow::bail;
use serde_json::Value;
use url::Url;
use workbook_protocol::OutboundCommand;

use crate::channel::{Delivery, Inbox};
use crate::frame::{FrameElement, FrameHost};
use crate::lock;

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub target_origin: String,
    pub message: Value,
}

#[derive(Default)]
struct HostState {
    mounts: usize,
    mounted: bool,
    navigations: Vec<Url>,
    posted: Vec<PostedMessage>,
    inbox: Option<Inbox>,
    fail_posts: bool,
}

#[derive(Clone, Default)]
pub struct MemoryFrameHost {
    state: Arc<Mutex<HostState>>,
}

impl MemoryFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many elements were created.
    pub fn mounts(&self) -> usize {
        lock(&self.state).mounts
    }

    /// Every source the element was pointed at, in order.
    pub fn navigations(&self) -> Vec<Url> {
        lock(&self.state).navigations.clone()
    }

    pub fn is_mounted(&self) -> bool {
        lock(&self.state).mounted
    }

    pub fn posted(&self) -> Vec<PostedMessage> {
        lock(&self.state).posted.clone()
    }

    /// Posted messages decoded back into commands. Undecodable ones are skipped.
    pub fn posted_commands(&self) -> Vec<OutboundCommand> {
        lock(&self.state)
            .posted
            .iter()
            .filter_map(|p| serde_json::from_value(p.message.clone()).ok())
            .collect()
    }

    /// Make subsequent posts fail, as a torn-down content window would.
    pub fn fail_posts(&self, fail: bool) {
        lock(&self.state).fail_posts = fail;
    }

    /// Push a posting into the last installed inbox.
    ///
    /// Returns whether the posting was dispatched to the registry.
    pub fn deliver(&self, origin: &str, data: Value) -> bool {
        matches!(self.deliver_raw(origin, data), Some(Delivery::Dispatched { .. }))
    }

    /// Like [`deliver`](Self::deliver), returning the full outcome. `None`
    /// when no inbox was ever installed.
    pub fn deliver_raw(&self, origin: &str, data: Value) -> Option<Delivery> {
        // The inbox runs handlers, which may call back into this host.
        let inbox = lock(&self.state).inbox.clone()?;
        Some(inbox.receive(origin, data))
    }
}

impl FrameHost for MemoryFrameHost {
    fn mount(&mut self, source: &Url) -> anyhow::Result<Box<dyn FrameElement>> {
        let mut state = lock(&self.state);
        state.mounts += 1;
        state.mounted = true;
        state.navigations.push(source.clone());
        Ok(Box::new(MemoryFrame {
            state: self.state.clone(),
        }))
    }
}

struct MemoryFrame {
    state: Arc<Mutex<HostState>>,
}

impl FrameElement for MemoryFrame {
    fn set_source(&mut self, source: &Url) -> anyhow::Result<()> {
        lock(&self.state).navigations.push(source.clone());
        Ok(())
    }

    fn post_message(&mut self, message: &Value, target_origin: &str) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        if state.fail_posts {
            bail!("content window is gone");
        }
        state.posted.push(PostedMessage {
            target_origin: target_origin.to_string(),
            message: message.clone(),
        });
        Ok(())
    }

    fn listen(&mut self, inbox: Inbox) {
        lock(&self.state).inbox = Some(inbox);
    }
}

impl Drop for MemoryFrame {
    fn drop(&mut self) {
        lock(&self.state).mounted = false;
    }
}
