//! Closed tag vocabularies for both directions of frame traffic.
//!
//! Every dispatch key is one of these enums rather than a free-form string,
//! so an unknown tag is rejected at parse time instead of silently missing
//! a handler.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A tag string that is not part of a closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} tag {tag:?}")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub tag: String,
}

/// Inbound event types announced by the embedded workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum EventType {
    #[serde(rename = "workbook:loaded")]
    Loaded,
    #[serde(rename = "workbook:error")]
    Error,
    #[serde(rename = "workbook:data:loaded")]
    DataLoaded,
    #[serde(rename = "workbook:variable:change")]
    VariableChange,
    #[serde(rename = "workbook:element:select")]
    ElementSelect,
    #[serde(rename = "workbook:action:outbound")]
    ActionOutbound,
    #[serde(rename = "workbook:fullscreen")]
    Fullscreen,
    #[serde(rename = "workbook:page:height")]
    PageHeight,
    #[serde(rename = "workbook:bookmark:create")]
    BookmarkCreate,
    #[serde(rename = "workbook:bookmark:change")]
    BookmarkChange,
    #[serde(rename = "workbook:bookmark:update")]
    BookmarkUpdate,
    #[serde(rename = "workbook:bookmark:delete")]
    BookmarkDelete,
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        EventType::Loaded,
        EventType::Error,
        EventType::DataLoaded,
        EventType::VariableChange,
        EventType::ElementSelect,
        EventType::ActionOutbound,
        EventType::Fullscreen,
        EventType::PageHeight,
        EventType::BookmarkCreate,
        EventType::BookmarkChange,
        EventType::BookmarkUpdate,
        EventType::BookmarkDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Loaded => "workbook:loaded",
            EventType::Error => "workbook:error",
            EventType::DataLoaded => "workbook:data:loaded",
            EventType::VariableChange => "workbook:variable:change",
            EventType::ElementSelect => "workbook:element:select",
            EventType::ActionOutbound => "workbook:action:outbound",
            EventType::Fullscreen => "workbook:fullscreen",
            EventType::PageHeight => "workbook:page:height",
            EventType::BookmarkCreate => "workbook:bookmark:create",
            EventType::BookmarkChange => "workbook:bookmark:change",
            EventType::BookmarkUpdate => "workbook:bookmark:update",
            EventType::BookmarkDelete => "workbook:bookmark:delete",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTag {
                kind: "event",
                tag: s.to_string(),
            })
    }
}

/// Outbound command types understood by the embedded workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum CommandType {
    #[serde(rename = "variables:update")]
    UpdateVariables,
    #[serde(rename = "bookmark:create")]
    CreateBookmark,
    #[serde(rename = "bookmark:update")]
    UpdateBookmark,
    #[serde(rename = "bookmark:delete")]
    DeleteBookmark,
    #[serde(rename = "bookmark:select")]
    SelectBookmark,
    #[serde(rename = "fullscreen:set")]
    SetFullscreen,
    #[serde(rename = "node:select")]
    SelectNode,
    #[serde(rename = "sharing-link:update")]
    UpdateSharingLink,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::UpdateVariables => "variables:update",
            CommandType::CreateBookmark => "bookmark:create",
            CommandType::UpdateBookmark => "bookmark:update",
            CommandType::DeleteBookmark => "bookmark:delete",
            CommandType::SelectBookmark => "bookmark:select",
            CommandType::SetFullscreen => "fullscreen:set",
            CommandType::SelectNode => "node:select",
            CommandType::UpdateSharingLink => "sharing-link:update",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of workbook node a selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Element,
    Page,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Element => write!(f, "element"),
            NodeType::Page => write!(f, "page"),
        }
    }
}

impl std::str::FromStr for NodeType {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "element" => Ok(NodeType::Element),
            "page" => Ok(NodeType::Page),
            _ => Err(UnknownTag {
                kind: "node type",
                tag: s.to_string(),
            }),
        }
    }
}
