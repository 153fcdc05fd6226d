//! End-to-end behaviour of the embed facade over an in-process frame host.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use workbook_embed::dump::{read_dump, Direction};
use workbook_embed::protocol::{BookmarkSpec, EventType, NodeType, OutboundCommand};
use workbook_embed::{
    Delivery, EmbedConfig, EmbedError, MemoryFrameHost, WorkbookEmbed, WorkbookStatus,
};

const SOURCE: &str = "https://app.example.com/workbook/42?embed=true";
const ORIGIN: &str = "https://app.example.com";

fn ready_embed() -> (MemoryFrameHost, WorkbookEmbed) {
    let host = MemoryFrameHost::new();
    let embed = WorkbookEmbed::new(Box::new(host.clone()), EmbedConfig::default());
    embed.initialize(SOURCE).unwrap();
    embed.frame_loaded();
    (host, embed)
}

#[tokio::test]
async fn commands_do_not_touch_the_mirror() {
    let (host, embed) = ready_embed();
    host.deliver(ORIGIN, json!({"type": "workbook:loaded"}));
    let before = embed.state();

    embed
        .update_variables(BTreeMap::from([("k".to_string(), "1".to_string())]))
        .await
        .unwrap();
    embed
        .create_bookmark(BookmarkSpec {
            name: "Q3".into(),
            is_shared: true,
            is_default: false,
        })
        .await
        .unwrap();
    embed.update_bookmark().await.unwrap();
    embed.delete_bookmark("a").await.unwrap();
    embed.select_bookmark(Some("a")).await.unwrap();
    embed.set_fullscreen(Some("chart-1")).await.unwrap();
    embed.select_node("chart-1", NodeType::Element).await.unwrap();
    embed
        .update_sharing_link("https://share.example.com/wb/42", None)
        .await
        .unwrap();

    assert_eq!(host.posted().len(), 8);
    assert_eq!(embed.state(), before);

    host.deliver(
        ORIGIN,
        json!({"type": "workbook:variable:change", "payload": {"name": "k", "value": "1"}}),
    );
    assert_eq!(embed.state().variables["k"], "1");
}

#[test]
fn detach_twice_leaves_no_subscriptions() {
    let (host, embed) = ready_embed();
    embed.subscribe(EventType::Loaded, |_| Ok(()));
    assert!(embed.subscriptions() > 0);

    embed.detach();
    embed.detach();

    assert_eq!(embed.subscriptions(), 0);
    assert!(!embed.is_ready());
    assert!(!host.is_mounted());
}

#[test]
fn failing_handler_does_not_block_the_next_one() {
    let (host, embed) = ready_embed();
    let received = Arc::new(AtomicUsize::new(0));

    embed.subscribe(EventType::VariableChange, |_| panic!("first handler blew up"));
    let received_clone = received.clone();
    embed.subscribe(EventType::VariableChange, move |event| {
        assert_eq!(event.origin(), ORIGIN);
        received_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let delivery = host.deliver_raw(
        ORIGIN,
        json!({"type": "workbook:variable:change", "payload": {"name": "k", "value": "v"}}),
    );
    let Some(Delivery::Dispatched { report, .. }) = delivery else {
        panic!("expected dispatch, got {delivery:?}");
    };
    assert_eq!(report.failed, 1);
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert_eq!(embed.state().variables["k"], "v");
}

#[test]
fn bookmarks_upsert_and_delete_by_id() {
    let (host, embed) = ready_embed();
    host.deliver(
        ORIGIN,
        json!({"type": "workbook:bookmark:create", "payload": {"id": "a", "name": "first"}}),
    );
    host.deliver(
        ORIGIN,
        json!({"type": "workbook:bookmark:update", "payload": {"id": "a", "name": "x"}}),
    );

    let bookmarks = embed.state().bookmarks;
    assert_eq!(bookmarks.len(), 1);
    assert_eq!(bookmarks[0].id, "a");
    assert_eq!(bookmarks[0].name, "x");

    assert!(host.deliver(
        ORIGIN,
        json!({"type": "workbook:bookmark:delete", "payload": {"id": "missing"}}),
    ));
    assert_eq!(embed.state().bookmarks, bookmarks);
}

#[test]
fn change_to_unknown_bookmark_is_ignored() {
    let (host, embed) = ready_embed();
    let before = embed.state();

    assert!(host.deliver(
        ORIGIN,
        json!({"type": "workbook:bookmark:change", "payload": {"id": "ghost"}}),
    ));
    let state = embed.state();
    assert_eq!(state, before);
    assert_eq!(state.selected_bookmark_id, None);
}

#[test]
fn data_loaded_accepts_any_payload() {
    for payload in [json!(true), json!([1, 2]), json!("rows"), json!(5)] {
        let (host, embed) = ready_embed();
        assert!(host.deliver(
            ORIGIN,
            json!({"type": "workbook:data:loaded", "payload": payload}),
        ));
        assert!(embed.state().is_data_loaded());
    }
}

#[test]
fn error_then_loaded_recovers() {
    let (host, embed) = ready_embed();
    host.deliver(
        ORIGIN,
        json!({"type": "workbook:error", "payload": {"code": "504", "message": "timeout"}}),
    );
    let state = embed.state();
    assert_eq!(state.status(), WorkbookStatus::Errored);
    assert!(!state.loaded);

    host.deliver(
        ORIGIN,
        json!({"type": "workbook:loaded", "payload": {"workbook": {"id": "42"}}}),
    );
    let state = embed.state();
    assert_eq!(state.error, None);
    assert!(state.loaded);
    assert_eq!(state.workbook_metadata().unwrap()["id"], "42");
}

#[test]
fn postings_after_detach_are_ignored() {
    let (host, embed) = ready_embed();
    host.deliver(ORIGIN, json!({"type": "workbook:loaded"}));
    embed.detach();
    let before = embed.state();

    let delivery = host.deliver_raw(
        ORIGIN,
        json!({"type": "workbook:variable:change", "payload": {"name": "late", "value": "1"}}),
    );
    assert!(matches!(delivery, Some(Delivery::Stale)));
    assert_eq!(embed.state(), before);
}

#[test]
fn detach_inside_a_handler_stops_the_dispatch() {
    let (host, embed) = ready_embed();
    let embed = Arc::new(embed);
    let later = Arc::new(AtomicUsize::new(0));

    let weak = Arc::downgrade(&embed);
    embed.subscribe(EventType::Loaded, move |_| {
        if let Some(embed) = weak.upgrade() {
            embed.detach();
        }
        Ok(())
    });
    let later_clone = later.clone();
    embed.subscribe(EventType::Loaded, move |_| {
        later_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    host.deliver(ORIGIN, json!({"type": "workbook:loaded"}));
    assert_eq!(later.load(Ordering::SeqCst), 0);
    assert_eq!(embed.subscriptions(), 0);
}

#[test]
fn postings_from_stale_source_are_ignored_after_reinitialize() {
    let (host, embed) = ready_embed();
    let stale = embed.inbox().unwrap();
    embed.initialize("https://app.example.com/workbook/43").unwrap();

    let delivery = stale.receive(ORIGIN, json!({"type": "workbook:loaded"}));
    assert!(matches!(delivery, Delivery::Stale));
    assert!(!embed.state().loaded);

    assert!(host.deliver(ORIGIN, json!({"type": "workbook:loaded"})));
    assert!(embed.state().loaded);
}

#[test]
fn spoofed_origin_reaches_no_handler() {
    let (host, embed) = ready_embed();
    let fired = Arc::new(AtomicUsize::new(0));
    for event_type in EventType::ALL {
        let fired = fired.clone();
        embed.subscribe(event_type, move |_| {
            fired.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    let before = embed.state();

    for posting in [
        json!({"type": "workbook:loaded"}),
        json!({"type": "workbook:error", "payload": {"message": "spoofed"}}),
    ] {
        assert!(!host.deliver("https://evil.example.com", posting));
    }
    // Right origin, bad shapes
    for posting in [
        json!("not json at all"),
        json!({"kind": "workbook:loaded"}),
        json!({"type": "workbook:unknown"}),
        json!({"type": "workbook:page:height", "payload": {"height": "tall"}}),
    ] {
        assert!(!host.deliver(ORIGIN, posting));
    }

    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(embed.state(), before);
}

#[test]
fn variable_changes_are_last_write_wins() {
    let (host, embed) = ready_embed();
    for value in ["1", "2"] {
        host.deliver(
            ORIGIN,
            json!({"type": "workbook:variable:change", "payload": {"name": "k", "value": value}}),
        );
    }
    assert_eq!(embed.state().variables["k"], "2");
}

#[test]
fn embeds_do_not_share_state() {
    let (host_a, embed_a) = ready_embed();
    let (_host_b, embed_b) = ready_embed();

    host_a.deliver(
        ORIGIN,
        json!({"type": "workbook:variable:change", "payload": {"name": "k", "value": "a"}}),
    );
    assert_eq!(embed_a.state().variables["k"], "a");
    assert!(embed_b.state().variables.is_empty());
    assert_ne!(embed_a.label(), embed_b.label());
}

#[tokio::test]
async fn traffic_is_dumped_in_both_directions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("traffic.jsonl");
    let host = MemoryFrameHost::new();
    let embed = WorkbookEmbed::new(
        Box::new(host.clone()),
        EmbedConfig {
            dump_path: Some(path.clone()),
            ..Default::default()
        },
    );
    embed.initialize(SOURCE).unwrap();
    embed.frame_loaded();

    host.deliver(ORIGIN, json!({"type": "workbook:data:loaded"}));
    embed.set_fullscreen(None).await.unwrap();

    let entries = read_dump(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].dir, Direction::In);
    assert_eq!(entries[0].origin.as_deref(), Some(ORIGIN));
    assert_eq!(entries[1].dir, Direction::Out);
    assert_eq!(
        serde_json::from_value::<OutboundCommand>(entries[1].msg.clone()).unwrap(),
        OutboundCommand::SetFullscreen { node_id: None }
    );
}

#[tokio::test]
async fn commands_after_detach_are_rejected() {
    let (host, embed) = ready_embed();
    embed.detach();
    assert!(matches!(
        embed.update_bookmark().await,
        Err(EmbedError::ChannelNotReady(_))
    ));
    assert!(host.posted().is_empty());
}
