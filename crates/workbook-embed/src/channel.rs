//! Message channel between the host and one frame.
//!
//! Outbound: [`MessageChannel::send`] serializes a command into its wire
//! envelope and posts it to the frame's content window.
//!
//! Inbound: [`MessageChannel::on_message`] installs the frame's single
//! low-level listener, an [`Inbox`]. The inbox validates origin and envelope
//! shape before anything reaches the registry. Every inbox carries the epoch
//! it was created in; once the channel closes or a newer inbox replaces it,
//! late postings through the old one are ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde_json::Value;
use workbook_protocol::{EventPayload, EventType, MalformedMessage, OutboundCommand};

use crate::dump::{Direction, DumpEntry, MessageDump};
use crate::error::{EmbedError, Result};
use crate::frame::FrameHandle;
use crate::lock;
use crate::registry::{DispatchReport, EventRegistry};

/// A validated notification from the embedded workbook.
///
/// Only the channel constructs these; the host receives them through
/// registry handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    payload: EventPayload,
    origin: String,
    received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub(crate) fn new(payload: EventPayload, origin: String) -> Self {
        Self {
            payload,
            origin,
            received_at: Utc::now(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// What happened to one raw posting.
#[derive(Debug)]
pub enum Delivery {
    Dispatched {
        event_type: EventType,
        report: DispatchReport,
    },
    /// The inbox was closed or replaced before the posting arrived.
    Stale,
    Dropped(MalformedMessage),
}

/// The channel's low-level listener for one frame.
#[derive(Clone)]
pub struct Inbox {
    label: Arc<str>,
    epoch: u64,
    current: Arc<AtomicU64>,
    expected_origin: Arc<str>,
    registry: EventRegistry,
    dump: Option<Arc<MessageDump>>,
}

impl Inbox {
    /// Whether this inbox is still the active listener for its channel.
    pub fn is_active(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }

    pub fn expected_origin(&self) -> &str {
        &self.expected_origin
    }

    /// Validate a raw posting without dispatching it.
    pub fn accept(
        &self,
        origin: &str,
        data: Value,
    ) -> std::result::Result<InboundEvent, MalformedMessage> {
        if origin != &*self.expected_origin {
            return Err(MalformedMessage::OriginMismatch {
                expected: self.expected_origin.to_string(),
                actual: origin.to_string(),
            });
        }
        let payload = EventPayload::from_posting(data)?;
        Ok(InboundEvent::new(payload, origin.to_string()))
    }

    /// Handle a raw posting from the platform.
    ///
    /// Never fails: stale and malformed postings are logged and dropped.
    pub fn receive(&self, origin: &str, data: Value) -> Delivery {
        if !self.is_active() {
            debug!("[{}] Ignoring posting on a closed channel", self.label);
            return Delivery::Stale;
        }

        if let Some(dump) = &self.dump {
            dump.record(&DumpEntry::new(Direction::In, Some(origin), data.clone()));
        }

        match self.accept(origin, data) {
            Ok(event) => {
                let event_type = event.event_type();
                debug!("[{}] Received {}", self.label, event_type);
                let report = self.registry.dispatch(&event);
                Delivery::Dispatched { event_type, report }
            }
            Err(e) => {
                warn!("[{}] Dropping malformed message: {}", self.label, e);
                Delivery::Dropped(e)
            }
        }
    }
}

pub struct MessageChannel {
    label: Arc<str>,
    frame: Arc<Mutex<FrameHandle>>,
    current: Arc<AtomicU64>,
    target_origin: Mutex<Option<String>>,
    dump: Option<Arc<MessageDump>>,
}

impl MessageChannel {
    pub fn new(
        label: &str,
        frame: Arc<Mutex<FrameHandle>>,
        dump: Option<Arc<MessageDump>>,
    ) -> Self {
        Self {
            label: label.into(),
            frame,
            current: Arc::new(AtomicU64::new(0)),
            target_origin: Mutex::new(None),
            dump,
        }
    }

    /// Install a fresh listener on the attached frame.
    ///
    /// Any inbox handed out earlier becomes stale. Outbound posts target
    /// `expected_origin` from now on.
    pub fn on_message(&self, expected_origin: &str, registry: EventRegistry) -> Result<Inbox> {
        let mut frame = lock(&self.frame);
        let Some(element) = frame.element_mut() else {
            return Err(EmbedError::ChannelNotReady("frame is not attached"));
        };

        let epoch = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let inbox = Inbox {
            label: self.label.clone(),
            epoch,
            current: self.current.clone(),
            expected_origin: expected_origin.into(),
            registry,
            dump: self.dump.clone(),
        };
        element.listen(inbox.clone());
        *lock(&self.target_origin) = Some(expected_origin.to_string());
        Ok(inbox)
    }

    /// Invalidate the current inbox. Idempotent.
    pub fn close(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
        *lock(&self.target_origin) = None;
    }

    /// Serialize `command` and post it to the frame's content window.
    pub fn send(&self, command: &OutboundCommand) -> Result<()> {
        let Some(target_origin) = lock(&self.target_origin).clone() else {
            return Err(EmbedError::ChannelNotReady("no listener installed"));
        };

        let mut frame = lock(&self.frame);
        if !frame.is_ready() {
            return Err(EmbedError::ChannelNotReady("frame has not finished loading"));
        }
        let Some(element) = frame.element_mut() else {
            return Err(EmbedError::ChannelNotReady("frame is not attached"));
        };

        let message = serde_json::to_value(command)?;
        element
            .post_message(&message, &target_origin)
            .map_err(|e| {
                error!("[{}] Failed to post {}: {:#}", self.label, command.command_type(), e);
                EmbedError::Transport(e)
            })?;
        debug!("[{}] Sent {}", self.label, command.command_type());

        if let Some(dump) = &self.dump {
            dump.record(&DumpEntry::new(Direction::Out, None, message));
        }
        Ok(())
    }
}
