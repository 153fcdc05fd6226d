//! Typed, validated outbound commands.
//!
//! Every method validates its arguments before touching the channel, so a
//! rejected command never produces a partial send. Sending is fire-and-forget:
//! the state mirror only changes when the workbook answers with an event.

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;
use workbook_protocol::{BookmarkSpec, CommandType, NodeType, OutboundCommand};

use crate::channel::MessageChannel;
use crate::error::{EmbedError, Result};

pub struct CommandDispatcher {
    channel: Arc<MessageChannel>,
}

impl CommandDispatcher {
    pub fn new(channel: Arc<MessageChannel>) -> Self {
        Self { channel }
    }

    /// Check a command's arguments without sending it.
    pub fn validate(command: &OutboundCommand) -> Result<()> {
        let kind = command.command_type();
        match command {
            OutboundCommand::UpdateVariables { variables } => {
                if variables.is_empty() {
                    return Err(EmbedError::validation(kind, "no variables given"));
                }
                if variables.keys().any(|name| name.trim().is_empty()) {
                    return Err(EmbedError::validation(kind, "variable name is empty"));
                }
            }
            OutboundCommand::CreateBookmark(spec) => {
                if spec.name.trim().is_empty() {
                    return Err(EmbedError::validation(kind, "bookmark name is empty"));
                }
            }
            OutboundCommand::UpdateBookmark => {}
            OutboundCommand::DeleteBookmark { bookmark_id } => {
                non_empty(kind, "bookmark id", bookmark_id)?;
            }
            OutboundCommand::SelectBookmark { bookmark_id } => {
                if let Some(id) = bookmark_id {
                    non_empty(kind, "bookmark id", id)?;
                }
            }
            OutboundCommand::SetFullscreen { node_id } => {
                if let Some(id) = node_id {
                    non_empty(kind, "node id", id)?;
                }
            }
            OutboundCommand::SelectNode { node_id, .. } => {
                non_empty(kind, "node id", node_id)?;
            }
            OutboundCommand::UpdateSharingLink {
                sharing_link,
                sharing_exploration_link,
            } => {
                check_link(kind, "sharing link", sharing_link)?;
                if let Some(link) = sharing_exploration_link {
                    check_link(kind, "exploration link", link)?;
                }
            }
        }
        Ok(())
    }

    /// Validate and post any command.
    pub async fn dispatch(&self, command: OutboundCommand) -> Result<()> {
        Self::validate(&command)?;
        self.channel.send(&command)
    }

    pub async fn update_variables(&self, variables: BTreeMap<String, String>) -> Result<()> {
        self.dispatch(OutboundCommand::UpdateVariables { variables })
            .await
    }

    pub async fn create_bookmark(&self, spec: BookmarkSpec) -> Result<()> {
        self.dispatch(OutboundCommand::CreateBookmark(spec)).await
    }

    pub async fn update_bookmark(&self) -> Result<()> {
        self.dispatch(OutboundCommand::UpdateBookmark).await
    }

    pub async fn delete_bookmark(&self, bookmark_id: &str) -> Result<()> {
        self.dispatch(OutboundCommand::DeleteBookmark {
            bookmark_id: bookmark_id.to_string(),
        })
        .await
    }

    pub async fn select_bookmark(&self, bookmark_id: Option<&str>) -> Result<()> {
        self.dispatch(OutboundCommand::SelectBookmark {
            bookmark_id: bookmark_id.map(str::to_string),
        })
        .await
    }

    pub async fn set_fullscreen(&self, node_id: Option<&str>) -> Result<()> {
        self.dispatch(OutboundCommand::SetFullscreen {
            node_id: node_id.map(str::to_string),
        })
        .await
    }

    pub async fn select_node(&self, node_id: &str, node_type: NodeType) -> Result<()> {
        self.dispatch(OutboundCommand::SelectNode {
            node_id: node_id.to_string(),
            node_type,
        })
        .await
    }

    pub async fn update_sharing_link(
        &self,
        sharing_link: &str,
        exploration_link: Option<&str>,
    ) -> Result<()> {
        self.dispatch(OutboundCommand::UpdateSharingLink {
            sharing_link: sharing_link.to_string(),
            sharing_exploration_link: exploration_link.map(str::to_string),
        })
        .await
    }
}

fn non_empty(kind: CommandType, what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EmbedError::validation(kind, format!("{what} is empty")));
    }
    Ok(())
}

fn check_link(kind: CommandType, what: &str, link: &str) -> Result<()> {
    let url = Url::parse(link).map_err(|e| EmbedError::validation(kind, format!("{what}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(EmbedError::validation(
            kind,
            format!("{what} has unsupported scheme {scheme:?}"),
        )),
    }
}
