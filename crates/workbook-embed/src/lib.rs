//! Host-side integration layer for an embedded workbook frame.
//!
//! One [`WorkbookEmbed`] owns one frame: it mounts the frame through a
//! platform [`FrameHost`], validates every posting the frame sends back,
//! fans inbound events out through an [`EventRegistry`], and keeps a
//! [`WorkbookState`] mirror that only inbound events may change. Outbound
//! commands are validated before anything is posted.

pub mod channel;
pub mod commands;
pub mod config;
pub mod dump;
pub mod embed;
pub mod error;
pub mod frame;
pub mod memory;
pub mod mirror;
pub mod registry;
pub mod shell;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use channel::{Delivery, Inbox, InboundEvent, MessageChannel};
pub use commands::CommandDispatcher;
pub use config::{EmbedConfig, ShellOptions};
pub use embed::WorkbookEmbed;
pub use error::{EmbedError, Result};
pub use frame::{FrameElement, FrameHandle, FrameHost};
pub use memory::MemoryFrameHost;
pub use mirror::{StateMirror, WorkbookState, WorkbookStatus};
pub use registry::{DispatchReport, EventRegistry, Subscription};
pub use shell::{PresentationShell, ShellAction, ShellView};

pub use workbook_protocol as protocol;

/// Lock a mutex, recovering the data if a handler panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
