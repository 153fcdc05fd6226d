//! Wire message types for embedded workbook frames.
//!
//! This crate provides the envelopes exchanged between a host page and the
//! workbook document running inside its frame.
//!
//! # Features
//!
//! - Closed tag enums for inbound events and outbound commands
//! - Intermediate envelope struct for incoming postings
//! - Typed payloads with a distinct error per rejection reason
//! - Serializable outbound commands in the `{ type, payload }` wire shape

mod command;
mod event;
mod tags;

pub use command::{BookmarkSpec, OutboundCommand};
pub use event::{
    ActionOutbound, Bookmark, BookmarkRef, DataLoaded, EventPayload, FullscreenChange, Loaded,
    MalformedMessage, PageHeight, RawInboundEnvelope, RemoteError, SelectionInfo,
    VariableChange, WorkbookInfo,
};
pub use tags::{CommandType, EventType, NodeType, UnknownTag};
