//! View model for the container drawn around the frame.
//!
//! The shell only reads [`WorkbookState`] snapshots and turns user actions
//! into commands; it never writes the mirror.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ShellOptions;
use crate::embed::WorkbookEmbed;
use crate::error::Result;
use crate::mirror::WorkbookState;

/// Node id the workbook understands as "whatever is on screen now".
const CURRENT_NODE: &str = "current";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ShellView {
    Loading {
        title: String,
    },
    /// The workbook reported an error; the view offers a retry that refreshes.
    Failed {
        title: String,
        message: String,
    },
    Ready(ReadyView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadyView {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls: Option<Controls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<VariablePanel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bookmarks: Vec<BookmarkChip>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_height: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub fullscreen: bool,
    pub data_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariablePanel {
    pub open: bool,
    pub entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkChip {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellAction {
    Refresh,
    ToggleFullscreen,
    EditVariable { name: String, value: String },
    SelectBookmark(Option<String>),
    DeleteBookmark(String),
    ToggleVariableEditor,
}

#[derive(Debug, Clone, Default)]
pub struct PresentationShell {
    options: ShellOptions,
    variables_open: bool,
}

impl PresentationShell {
    pub fn new(options: ShellOptions) -> Self {
        Self {
            options,
            variables_open: false,
        }
    }

    pub fn view(&self, state: &WorkbookState, frame_ready: bool) -> ShellView {
        let title = self.options.title.clone();

        if let Some(error) = state.error() {
            return ShellView::Failed {
                title,
                message: error.to_string(),
            };
        }
        if !frame_ready || !state.is_workbook_loaded() {
            return ShellView::Loading { title };
        }

        let controls = self.options.show_controls.then(|| Controls {
            fullscreen: state.is_fullscreen(),
            data_loaded: state.is_data_loaded(),
        });
        let variables = self.options.show_variables.then(|| VariablePanel {
            open: self.variables_open,
            entries: state.current_variables().clone(),
        });
        let bookmarks = if self.options.show_bookmarks {
            state
                .bookmarks
                .iter()
                .map(|b| BookmarkChip {
                    id: b.id.clone(),
                    name: b.name.clone(),
                    selected: state.selected_bookmark_id.as_deref() == Some(b.id.as_str()),
                })
                .collect()
        } else {
            Vec::new()
        };

        ShellView::Ready(ReadyView {
            title,
            controls,
            variables,
            bookmarks,
            page_height: state.page_height,
        })
    }

    /// Current view of `embed`.
    pub fn render(&self, embed: &WorkbookEmbed) -> ShellView {
        self.view(&embed.state(), embed.is_ready())
    }

    pub async fn handle(&mut self, action: ShellAction, embed: &WorkbookEmbed) -> Result<()> {
        match action {
            ShellAction::Refresh => embed.refresh(),
            ShellAction::ToggleFullscreen => {
                let target = if embed.state().is_fullscreen() {
                    None
                } else {
                    Some(CURRENT_NODE)
                };
                embed.set_fullscreen(target).await
            }
            ShellAction::EditVariable { name, value } => {
                embed
                    .update_variables(BTreeMap::from([(name, value)]))
                    .await
            }
            ShellAction::SelectBookmark(id) => embed.select_bookmark(id.as_deref()).await,
            ShellAction::DeleteBookmark(id) => embed.delete_bookmark(&id).await,
            ShellAction::ToggleVariableEditor => {
                self.variables_open = !self.variables_open;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedConfig;
    use crate::memory::MemoryFrameHost;
    use serde_json::{json, Value};
    use workbook_protocol::{
        Bookmark, EventPayload, Loaded, OutboundCommand, RemoteError, WorkbookInfo,
    };

    const ORIGIN: &str = "https://app.example.com";

    fn loaded_state() -> WorkbookState {
        let mut state = WorkbookState::default();
        state.apply(&EventPayload::Loaded(Loaded {
            workbook: WorkbookInfo {
                variables: Some(BTreeMap::from([("region".into(), "EMEA".into())])),
                ..Default::default()
            },
        }));
        for id in ["a", "b"] {
            state.apply(&EventPayload::BookmarkCreate(Bookmark {
                id: id.into(),
                name: id.to_uppercase(),
                state: Value::Null,
            }));
        }
        state.apply(&EventPayload::BookmarkChange(Bookmark {
            id: "b".into(),
            name: "B".into(),
            state: Value::Null,
        }));
        state
    }

    #[test]
    fn test_loading_until_frame_and_workbook_are_up() {
        let shell = PresentationShell::default();
        assert!(matches!(
            shell.view(&WorkbookState::default(), true),
            ShellView::Loading { .. }
        ));
        assert!(matches!(
            shell.view(&loaded_state(), false),
            ShellView::Loading { .. }
        ));
    }

    #[test]
    fn test_failed_view_shows_remote_error() {
        let shell = PresentationShell::new(ShellOptions::default());
        let mut state = loaded_state();
        state.apply(&EventPayload::Error(RemoteError {
            code: Some("401".into()),
            message: "Session expired".into(),
        }));

        assert_eq!(
            shell.view(&state, true),
            ShellView::Failed {
                title: "Workbook".into(),
                message: "Session expired (401)".into(),
            }
        );
    }

    #[test]
    fn test_ready_view_marks_selected_bookmark() {
        let shell = PresentationShell::new(ShellOptions::default());
        let ShellView::Ready(view) = shell.view(&loaded_state(), true) else {
            panic!("expected ready view");
        };
        let selected: Vec<_> = view.bookmarks.iter().map(|b| b.selected).collect();
        assert_eq!(selected, [false, true]);
        assert_eq!(view.variables.unwrap().entries["region"], "EMEA");
        assert!(!view.controls.unwrap().fullscreen);
    }

    #[test]
    fn test_options_hide_sections() {
        let shell = PresentationShell::new(ShellOptions {
            title: "Sales".into(),
            show_controls: false,
            show_variables: false,
            show_bookmarks: false,
        });
        let view = serde_json::to_value(shell.view(&loaded_state(), true)).unwrap();
        assert_eq!(view, json!({"status": "ready", "title": "Sales"}));
    }

    #[tokio::test]
    async fn test_actions_become_commands() {
        let host = MemoryFrameHost::new();
        let embed = WorkbookEmbed::new(Box::new(host.clone()), EmbedConfig::default());
        embed.initialize("https://app.example.com/workbook/1").unwrap();
        embed.frame_loaded();
        let mut shell = PresentationShell::default();

        shell.handle(ShellAction::ToggleFullscreen, &embed).await.unwrap();
        host.deliver(
            ORIGIN,
            json!({"type": "workbook:fullscreen", "payload": {"nodeId": "current"}}),
        );
        shell.handle(ShellAction::ToggleFullscreen, &embed).await.unwrap();
        shell
            .handle(
                ShellAction::EditVariable {
                    name: "region".into(),
                    value: "APAC".into(),
                },
                &embed,
            )
            .await
            .unwrap();
        shell
            .handle(ShellAction::DeleteBookmark("a".into()), &embed)
            .await
            .unwrap();

        assert_eq!(
            host.posted_commands(),
            vec![
                OutboundCommand::SetFullscreen {
                    node_id: Some("current".into())
                },
                OutboundCommand::SetFullscreen { node_id: None },
                OutboundCommand::UpdateVariables {
                    variables: BTreeMap::from([("region".into(), "APAC".into())])
                },
                OutboundCommand::DeleteBookmark {
                    bookmark_id: "a".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_toggle_variable_editor_is_local() {
        let host = MemoryFrameHost::new();
        let embed = WorkbookEmbed::new(Box::new(host.clone()), EmbedConfig::default());
        let mut shell = PresentationShell::default();

        shell
            .handle(ShellAction::ToggleVariableEditor, &embed)
            .await
            .unwrap();
        let ShellView::Ready(view) = shell.view(&loaded_state(), true) else {
            panic!("expected ready view");
        };
        assert!(view.variables.unwrap().open);
        assert!(host.posted().is_empty());
    }
}
