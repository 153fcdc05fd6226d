//! Inbound event types posted by the embedded workbook.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::tags::{EventType, NodeType, UnknownTag};

/// Reasons an inbound posting is rejected before it reaches any handler.
#[derive(Debug, thiserror::Error)]
pub enum MalformedMessage {
    #[error("origin {actual:?} does not match expected origin {expected:?}")]
    OriginMismatch { expected: String, actual: String },

    #[error("posting is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("posting is not an envelope: {0}")]
    NotAnEnvelope(#[source] serde_json::Error),

    #[error(transparent)]
    UnknownEventType(#[from] UnknownTag),

    #[error("invalid {event_type} payload: {source}")]
    Payload {
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {event_type} payload: {reason}")]
    Invalid {
        event_type: EventType,
        reason: &'static str,
    },
}

/// Intermediate struct for the `{ type, payload }` envelope.
///
/// `payload` stays raw JSON until the tag has been checked against
/// [`EventType`]; a missing payload is treated as `{}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInboundEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub payload: Value,
}

/// Metadata carried by `workbook:loaded`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbookInfo {
    /// Variable values at load time; `None` when the workbook sent none.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_variable_map"
    )]
    pub variables: Option<BTreeMap<String, String>>,

    /// Everything else the workbook reports about itself (id, name, pages...).
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Loaded {
    #[serde(default)]
    pub workbook: WorkbookInfo,
}

/// Error reported by the remote document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_scalar"
    )]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Data-ready notification. The payload is kept as posted, whatever its shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataLoaded {
    pub data: Value,
}

/// A single variable changed inside the workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableChange {
    pub name: String,
    #[serde(deserialize_with = "deserialize_scalar")]
    pub value: String,
}

/// What the user selected inside the workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    /// Cell/value detail; opaque to the host.
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

/// A workbook action addressed to the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutbound {
    pub name: String,
    #[serde(default)]
    pub values: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullscreenChange {
    /// Node shown fullscreen, `None` when fullscreen was exited.
    #[serde(default)]
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageHeight {
    pub height: f64,
}

/// A named, remotely-defined state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Opaque exploration state; only the remote side interprets it.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub state: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRef {
    pub id: String,
}

/// Typed payload of an inbound posting, tagged by [`EventType`].
///
/// Serializes to the wire envelope `{ "type": ..., "payload": ... }`.
/// Deserialization goes through [`RawInboundEnvelope`] so unknown tags and bad
/// payloads are reported as distinct [`MalformedMessage`] variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "workbook:loaded")]
    Loaded(Loaded),
    #[serde(rename = "workbook:error")]
    Error(RemoteError),
    #[serde(rename = "workbook:data:loaded")]
    DataLoaded(DataLoaded),
    #[serde(rename = "workbook:variable:change")]
    VariableChange(VariableChange),
    #[serde(rename = "workbook:element:select")]
    ElementSelect(SelectionInfo),
    #[serde(rename = "workbook:action:outbound")]
    ActionOutbound(ActionOutbound),
    #[serde(rename = "workbook:fullscreen")]
    Fullscreen(FullscreenChange),
    #[serde(rename = "workbook:page:height")]
    PageHeight(PageHeight),
    #[serde(rename = "workbook:bookmark:create")]
    BookmarkCreate(Bookmark),
    #[serde(rename = "workbook:bookmark:change")]
    BookmarkChange(Bookmark),
    #[serde(rename = "workbook:bookmark:update")]
    BookmarkUpdate(Bookmark),
    #[serde(rename = "workbook:bookmark:delete")]
    BookmarkDelete(BookmarkRef),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Loaded(_) => EventType::Loaded,
            EventPayload::Error(_) => EventType::Error,
            EventPayload::DataLoaded(_) => EventType::DataLoaded,
            EventPayload::VariableChange(_) => EventType::VariableChange,
            EventPayload::ElementSelect(_) => EventType::ElementSelect,
            EventPayload::ActionOutbound(_) => EventType::ActionOutbound,
            EventPayload::Fullscreen(_) => EventType::Fullscreen,
            EventPayload::PageHeight(_) => EventType::PageHeight,
            EventPayload::BookmarkCreate(_) => EventType::BookmarkCreate,
            EventPayload::BookmarkChange(_) => EventType::BookmarkChange,
            EventPayload::BookmarkUpdate(_) => EventType::BookmarkUpdate,
            EventPayload::BookmarkDelete(_) => EventType::BookmarkDelete,
        }
    }

    /// Parse a payload whose tag has already been resolved.
    pub fn from_type_and_payload(
        event_type: EventType,
        payload: Value,
    ) -> Result<Self, MalformedMessage> {
        let event = match event_type {
            EventType::Loaded => EventPayload::Loaded(parse(event_type, payload)?),
            EventType::Error => EventPayload::Error(parse(event_type, payload)?),
            EventType::DataLoaded => EventPayload::DataLoaded(DataLoaded { data: payload }),
            EventType::VariableChange => {
                let change: VariableChange = parse(event_type, payload)?;
                if change.name.is_empty() {
                    return Err(MalformedMessage::Invalid {
                        event_type,
                        reason: "variable name is empty",
                    });
                }
                EventPayload::VariableChange(change)
            }
            EventType::ElementSelect => EventPayload::ElementSelect(parse(event_type, payload)?),
            EventType::ActionOutbound => {
                EventPayload::ActionOutbound(parse(event_type, payload)?)
            }
            EventType::Fullscreen => EventPayload::Fullscreen(parse(event_type, payload)?),
            EventType::PageHeight => EventPayload::PageHeight(parse(event_type, payload)?),
            EventType::BookmarkCreate => {
                EventPayload::BookmarkCreate(parse_bookmark(event_type, payload)?)
            }
            EventType::BookmarkChange => {
                EventPayload::BookmarkChange(parse_bookmark(event_type, payload)?)
            }
            EventType::BookmarkUpdate => {
                EventPayload::BookmarkUpdate(parse_bookmark(event_type, payload)?)
            }
            EventType::BookmarkDelete => {
                let bookmark: BookmarkRef = parse(event_type, payload)?;
                if bookmark.id.is_empty() {
                    return Err(MalformedMessage::Invalid {
                        event_type,
                        reason: "bookmark id is empty",
                    });
                }
                EventPayload::BookmarkDelete(bookmark)
            }
        };
        Ok(event)
    }

    /// Parse the data of a raw posting.
    ///
    /// Frames post either a structured object or its JSON text; both are
    /// accepted.
    pub fn from_posting(data: Value) -> Result<Self, MalformedMessage> {
        let data = match data {
            Value::String(text) => serde_json::from_str(&text)?,
            other => other,
        };
        let raw: RawInboundEnvelope =
            serde_json::from_value(data).map_err(MalformedMessage::NotAnEnvelope)?;
        raw.try_into()
    }
}

impl TryFrom<RawInboundEnvelope> for EventPayload {
    type Error = MalformedMessage;

    fn try_from(raw: RawInboundEnvelope) -> Result<Self, MalformedMessage> {
        let event_type: EventType = raw.event_type.parse()?;
        EventPayload::from_type_and_payload(event_type, raw.payload)
    }
}

/// Custom Deserialize implementation that uses RawInboundEnvelope internally.
impl<'de> Deserialize<'de> for EventPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawInboundEnvelope::deserialize(deserializer)?;
        raw.try_into().map_err(serde::de::Error::custom)
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    event_type: EventType,
    payload: Value,
) -> Result<T, MalformedMessage> {
    // An absent payload reads as `{}`
    let payload = match payload {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(payload).map_err(|source| MalformedMessage::Payload { event_type, source })
}

fn parse_bookmark(event_type: EventType, payload: Value) -> Result<Bookmark, MalformedMessage> {
    let bookmark: Bookmark = parse(event_type, payload)?;
    if bookmark.id.is_empty() {
        return Err(MalformedMessage::Invalid {
            event_type,
            reason: "bookmark id is empty",
        });
    }
    Ok(bookmark)
}

/// Variable values are strings on the host side, but workbooks post numbers
/// and booleans as JSON scalars. Accept any scalar and keep its text form.
struct ScalarVisitor;

impl<'de> serde::de::Visitor<'de> for ScalarVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a string, number or boolean")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<String, E> {
        Ok(v.to_string())
    }
}

fn deserialize_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(ScalarVisitor)
}

#[derive(Deserialize)]
struct Scalar(#[serde(deserialize_with = "deserialize_scalar")] String);

fn deserialize_optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| s.0))
}

fn deserialize_variable_map<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Scalar>>::deserialize(deserializer)?;
    Ok(raw.map(|map| map.into_iter().map(|(k, v)| (k, v.0)).collect()))
}
