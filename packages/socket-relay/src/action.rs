//! Action envelope exchanged between client and server relays
//!
//! An [`Action`] is a JSON object with a `type` string, arbitrary payload
//! fields and an optional `meta` object. The relays only ever look at two
//! `meta` keys:
//!
//! - `dispatchedBy`: which side last forwarded the envelope
//! - `emit`: whether a locally dispatched action should go over the wire
//!
//! Anything else in `meta` is carried along untouched.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::action_types::{CLIENT_TAG, SERVER_TAG};

const TYPE_KEY: &str = "type";
const META_KEY: &str = "meta";
const DISPATCHED_BY_KEY: &str = "dispatchedBy";
const EMIT_KEY: &str = "emit";

/// Provenance stamp identifying which relay last forwarded an envelope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DispatchedBy {
    Client,
    Server,
    /// A stamp written by something other than this crate, kept verbatim
    Other(String),
}

impl DispatchedBy {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Client => CLIENT_TAG,
            Self::Server => SERVER_TAG,
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for DispatchedBy {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            CLIENT_TAG => Self::Client,
            SERVER_TAG => Self::Server,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for DispatchedBy {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl fmt::Display for DispatchedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DispatchedBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DispatchedBy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

/// Value of `meta.emit`
///
/// `Channel` is compared against the relay's configured event name, so an
/// action can opt into emission on one specific channel. `Other` holds a
/// present value of any other shape, `null` included; it never emits and is
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Emit {
    Flag(bool),
    Channel(String),
    Other(Value),
}

impl From<bool> for Emit {
    fn from(flag: bool) -> Self {
        Self::Flag(flag)
    }
}

impl From<&str> for Emit {
    fn from(channel: &str) -> Self {
        Self::Channel(channel.to_string())
    }
}

/// Provenance and routing metadata attached to an action
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Meta {
    #[serde(rename = "dispatchedBy", skip_serializing_if = "Option::is_none")]
    pub dispatched_by: Option<DispatchedBy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit: Option<Emit>,

    /// Application-defined meta keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_emit(mut self, emit: impl Into<Emit>) -> Self {
        self.emit = Some(emit.into());
        self
    }

    pub fn with_dispatched_by(mut self, tag: DispatchedBy) -> Self {
        self.set_dispatched_by(tag);
        self
    }

    fn set_dispatched_by(&mut self, tag: DispatchedBy) {
        self.extra.remove(DISPATCHED_BY_KEY);
        self.dispatched_by = Some(tag);
    }

    /// Build meta from a raw JSON object
    ///
    /// A `dispatchedBy` that is not a string stays in `extra` verbatim until
    /// the next stamp replaces it.
    fn from_object(mut object: Map<String, Value>) -> Self {
        let dispatched_by = match object.remove(DISPATCHED_BY_KEY) {
            Some(Value::String(tag)) => Some(DispatchedBy::from(tag)),
            Some(other) => {
                object.insert(DISPATCHED_BY_KEY.to_string(), other);
                None
            }
            None => None,
        };

        let emit = object.remove(EMIT_KEY).map(|value| match value {
            Value::Bool(flag) => Emit::Flag(flag),
            Value::String(channel) => Emit::Channel(channel),
            other => Emit::Other(other),
        });

        Self {
            dispatched_by,
            emit,
            extra: object,
        }
    }
}

impl<'de> Deserialize<'de> for Meta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from_object)
    }
}

/// `meta` that is missing, null or not an object is treated as absent
fn lenient_meta<'de, D>(deserializer: D) -> Result<Option<Meta>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(object)) => Some(Meta::from_object(object)),
        _ => None,
    })
}

/// Tagged message carrying a type, payload fields and provenance metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type", default)]
    pub action_type: String,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_meta"
    )]
    pub meta: Option<Meta>,

    /// Payload fields, flattened next to `type` and `meta`
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            ..Default::default()
        }
    }

    /// Parse an inbound payload
    ///
    /// `null` becomes an empty action; any other non-object value is an error.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other),
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Add a payload field
    ///
    /// `type` and `meta` are reserved and ignored here; set them through
    /// [`Action::action_type`] and [`Action::with_meta`].
    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key == TYPE_KEY || key == META_KEY {
            tracing::warn!(key = %key, "Ignoring reserved payload key");
            return self;
        }
        self.payload.insert(key, value.into());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Set `meta.emit`, keeping any other meta keys
    pub fn with_emit(mut self, emit: impl Into<Emit>) -> Self {
        self.meta.get_or_insert_with(Meta::default).emit = Some(emit.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn dispatched_by(&self) -> Option<&DispatchedBy> {
        self.meta.as_ref().and_then(|meta| meta.dispatched_by.as_ref())
    }

    pub fn emit(&self) -> Option<&Emit> {
        self.meta.as_ref().and_then(|meta| meta.emit.as_ref())
    }

    /// Overwrite `meta.dispatchedBy`
    ///
    /// Each hop replaces the previous stamp; stamps never accumulate.
    pub fn stamp(mut self, tag: DispatchedBy) -> Self {
        self.meta
            .get_or_insert_with(Meta::default)
            .set_dispatched_by(tag);
        self
    }

    /// Shallow clone with `meta.dispatchedBy` overwritten
    pub fn stamped(&self, tag: DispatchedBy) -> Self {
        self.clone().stamp(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_serializes_flat() {
        let action = Action::new("ADD_TODO")
            .with_payload("text", "write tests")
            .with_emit(true);

        let value = action.to_value().unwrap();
        assert_eq!(
            value,
            json!({
                "type": "ADD_TODO",
                "text": "write tests",
                "meta": { "emit": true }
            })
        );
    }

    #[test]
    fn test_action_without_meta_omits_key() {
        let value = Action::new("PING").to_value().unwrap();
        assert_eq!(value, json!({ "type": "PING" }));
    }

    #[test]
    fn test_from_value_null_is_empty_action() {
        let action = Action::from_value(Value::Null).unwrap();
        assert_eq!(action, Action::default());
        assert_eq!(action.action_type, "");
    }

    #[test]
    fn test_from_value_rejects_scalars() {
        assert!(Action::from_value(json!(42)).is_err());
        assert!(Action::from_value(json!("PING")).is_err());
    }

    #[test]
    fn test_missing_type_defaults_to_empty() {
        let action = Action::from_value(json!({ "count": 1 })).unwrap();
        assert_eq!(action.action_type, "");
        assert_eq!(action.get("count"), Some(&json!(1)));
    }

    #[test]
    fn test_malformed_meta_is_tolerated() {
        let action = Action::from_value(json!({ "type": "X", "meta": "oops" })).unwrap();
        assert!(action.meta.is_none());

        let action = Action::from_value(json!({ "type": "X", "meta": null })).unwrap();
        assert!(action.meta.is_none());

        let action =
            Action::from_value(json!({ "type": "X", "meta": { "emit": 3, "dispatchedBy": 7 } }))
                .unwrap();
        let meta = action.meta.unwrap();
        assert_eq!(meta.emit, Some(Emit::Other(json!(3))));
        assert!(meta.dispatched_by.is_none());
    }

    #[test]
    fn test_unrecognized_meta_values_round_trip() {
        let raw = json!({ "type": "X", "meta": { "emit": null, "dispatchedBy": 7 } });
        let action = Action::from_value(raw.clone()).unwrap();

        assert_eq!(action.emit(), Some(&Emit::Other(Value::Null)));
        assert_eq!(action.to_value().unwrap(), raw);
    }

    #[test]
    fn test_stamp_replaces_unrecognized_dispatched_by() {
        let action = Action::from_value(json!({ "type": "X", "meta": { "dispatchedBy": [1] } }))
            .unwrap()
            .stamp(DispatchedBy::Client);

        assert_eq!(
            action.to_value().unwrap(),
            json!({ "type": "X", "meta": { "dispatchedBy": CLIENT_TAG } })
        );
    }

    #[test]
    fn test_meta_parses_known_keys_and_keeps_extra() {
        let action = Action::from_value(json!({
            "type": "X",
            "meta": {
                "dispatchedBy": SERVER_TAG,
                "emit": "room-1",
                "trace": "abc"
            }
        }))
        .unwrap();

        assert_eq!(action.dispatched_by(), Some(&DispatchedBy::Server));
        assert_eq!(action.emit(), Some(&Emit::Channel("room-1".to_string())));
        assert_eq!(
            action.meta.as_ref().unwrap().extra.get("trace"),
            Some(&json!("abc"))
        );
    }

    #[test]
    fn test_unknown_tag_is_preserved() {
        let tag = DispatchedBy::from("someone-else");
        assert_eq!(tag, DispatchedBy::Other("someone-else".to_string()));
        assert_eq!(serde_json::to_value(&tag).unwrap(), json!("someone-else"));
        assert_ne!(tag, DispatchedBy::Server);
    }

    #[test]
    fn test_stamp_overwrites_previous_tag() {
        let action = Action::new("X")
            .stamp(DispatchedBy::Client)
            .stamp(DispatchedBy::Server);

        assert_eq!(action.dispatched_by(), Some(&DispatchedBy::Server));
        assert_eq!(
            action.to_value().unwrap(),
            json!({ "type": "X", "meta": { "dispatchedBy": SERVER_TAG } })
        );
    }

    #[test]
    fn test_stamped_leaves_original_untouched() {
        let original = Action::new("X").with_emit(true);
        let stamped = original.stamped(DispatchedBy::Client);

        assert!(original.dispatched_by().is_none());
        assert_eq!(stamped.dispatched_by(), Some(&DispatchedBy::Client));
        assert_eq!(stamped.emit(), Some(&Emit::Flag(true)));
    }

    #[test]
    fn test_reserved_payload_keys_are_ignored() {
        let action = Action::new("X").with_payload("type", "Y").with_payload("meta", 1);
        assert_eq!(action.action_type, "X");
        assert!(action.payload.is_empty());
        assert!(action.meta.is_none());
    }
}
