//! Outbound commands posted from the host into the embedded workbook.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tags::{CommandType, NodeType};

/// Arguments for creating a bookmark from the workbook's current state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkSpec {
    pub name: String,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub is_default: bool,
}

/// Typed outbound command.
///
/// Serializes to the wire envelope `{ "type": ..., "payload": ... }`;
/// `bookmark:update` carries no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum OutboundCommand {
    #[serde(rename = "variables:update")]
    UpdateVariables {
        variables: BTreeMap<String, String>,
    },

    #[serde(rename = "bookmark:create")]
    CreateBookmark(BookmarkSpec),

    /// Save the workbook's current state into the selected bookmark.
    #[serde(rename = "bookmark:update")]
    UpdateBookmark,

    #[serde(rename = "bookmark:delete")]
    DeleteBookmark {
        #[serde(rename = "bookmarkId")]
        bookmark_id: String,
    },

    /// Select a bookmark, or return to the unbookmarked view with `None`.
    #[serde(rename = "bookmark:select")]
    SelectBookmark {
        #[serde(rename = "bookmarkId")]
        bookmark_id: Option<String>,
    },

    /// Show a node fullscreen, or exit fullscreen with `None`.
    #[serde(rename = "fullscreen:set")]
    SetFullscreen {
        #[serde(rename = "nodeId")]
        node_id: Option<String>,
    },

    #[serde(rename = "node:select")]
    SelectNode {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "nodeType")]
        node_type: NodeType,
    },

    #[serde(rename = "sharing-link:update")]
    UpdateSharingLink {
        #[serde(rename = "sharingLink")]
        sharing_link: String,
        #[serde(rename = "sharingExplorationLink")]
        sharing_exploration_link: Option<String>,
    },
}

impl OutboundCommand {
    pub fn command_type(&self) -> CommandType {
        match self {
            OutboundCommand::UpdateVariables { .. } => CommandType::UpdateVariables,
            OutboundCommand::CreateBookmark(_) => CommandType::CreateBookmark,
            OutboundCommand::UpdateBookmark => CommandType::UpdateBookmark,
            OutboundCommand::DeleteBookmark { .. } => CommandType::DeleteBookmark,
            OutboundCommand::SelectBookmark { .. } => CommandType::SelectBookmark,
            OutboundCommand::SetFullscreen { .. } => CommandType::SetFullscreen,
            OutboundCommand::SelectNode { .. } => CommandType::SelectNode,
            OutboundCommand::UpdateSharingLink { .. } => CommandType::UpdateSharingLink,
        }
    }
}
