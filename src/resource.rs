//! Event and resource-identity types — the data model shared by every
//! component (block codec, writer, reader, cache, query executor).
//!
//! See `format::index_section` for how a resource's last-seen state is
//! tracked across a file's lifetime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discriminates the kind of change an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    Create = 0,
    Update = 1,
    Delete = 2,
}

impl EventType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(EventType::Create),
            1 => Some(EventType::Update),
            2 => Some(EventType::Delete),
            _ => None,
        }
    }
}

/// Identity + coordinates of the Kubernetes-style object an event describes.
///
/// `uid` is stable across the resource's lifetime; the other fields may
/// change (renames, namespace moves) without the resource losing identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub uid:       String,
    pub group:     String,
    pub version:   String,
    pub kind:      String,
    pub namespace: String,
    pub name:      String,
}

/// Composite key used to track the latest-known state of a resource within
/// one file. `uid` is the true identity; the rest of the tuple is carried so
/// the executor can still filter by namespace/kind/name on a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub group:     String,
    pub version:   String,
    pub kind:      String,
    pub namespace: String,
    pub name:      String,
    pub uid:       String,
}

impl ResourceKey {
    pub fn from_meta(m: &ResourceMeta) -> Self {
        Self {
            group:     m.group.clone(),
            version:   m.version.clone(),
            kind:      m.kind.clone(),
            namespace: m.namespace.clone(),
            name:      m.name.clone(),
            uid:       m.uid.clone(),
        }
    }
}

/// One immutable observed change to one resource.
///
/// `data` is never interpreted by the core — it is opaque JSON, passed
/// through unexamined from producer to query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id:           String,
    pub timestamp_ns: i64,
    pub event_type:   EventTypeWire,
    pub resource:     ResourceMeta,
    pub data:         serde_json::Value,
}

/// Serde-friendly mirror of [`EventType`] (serde derives don't like the
/// explicit discriminants we use for the wire encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTypeWire {
    Create,
    Update,
    Delete,
}

impl From<EventType> for EventTypeWire {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Create => EventTypeWire::Create,
            EventType::Update => EventTypeWire::Update,
            EventType::Delete => EventTypeWire::Delete,
        }
    }
}

impl From<EventTypeWire> for EventType {
    fn from(t: EventTypeWire) -> Self {
        match t {
            EventTypeWire::Create => EventType::Create,
            EventTypeWire::Update => EventType::Update,
            EventTypeWire::Delete => EventType::Delete,
        }
    }
}

impl Event {
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type.into()
    }

    /// Synthesize the `"state-" + uid + "-" + hour_start` id used for
    /// pre-existing snapshots (see `query::synthesize_snapshot`).
    pub fn state_id(uid: &str, hour_start: i64) -> String {
        format!("state-{uid}-{hour_start}")
    }

    pub fn is_state_snapshot(&self) -> bool {
        self.id.starts_with("state-")
    }
}

/// Filter conjunction applied by the query executor. An unset field matches
/// everything. Conjunctive: all set fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilters {
    pub namespace: Option<String>,
    pub kind:      Option<String>,
    pub name:      Option<String>,
    pub uid:       Option<String>,
    /// Extra exact-match label/field pairs, for forward compatibility with
    /// the HTTP collaborator's filter shape without changing this type.
    #[serde(default)]
    pub labels:    HashMap<String, String>,
}

impl EventFilters {
    pub fn matches(&self, r: &ResourceMeta) -> bool {
        if let Some(ns) = &self.namespace {
            if ns != &r.namespace { return false; }
        }
        if let Some(k) = &self.kind {
            if k != &r.kind { return false; }
        }
        if let Some(n) = &self.name {
            if n != &r.name { return false; }
        }
        if let Some(u) = &self.uid {
            if u != &r.uid { return false; }
        }
        true
    }
}
