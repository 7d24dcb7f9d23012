//! Turning one exported JSON document into a [`ResourceRecord`].

use serde_json::Value;

use mirror_core::{ResourceKind, ResourceRecord, Uid};

/// One item yielded by a [`crate::SourceProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEntry {
    Record(ResourceRecord),
    /// Unreadable, or without a usable uid. Reported as a failed operation.
    Malformed(MalformedRecord),
}

impl SourceEntry {
    pub fn kind(&self) -> ResourceKind {
        match self {
            SourceEntry::Record(record) => record.kind,
            SourceEntry::Malformed(bad) => bad.kind,
        }
    }
}

/// A source item that could not become a [`ResourceRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub kind: ResourceKind,
    pub origin: String,
    pub reason: String,
}

/// Parse `contents` as a resource of `kind`.
///
/// Dashboards may be stored as the export envelope (`{"dashboard": {..}, "meta": {..}}`)
/// or as the bare dashboard model; the uid and title are read from the model
/// in both cases. The full document is kept as the payload.
pub fn parse_record(kind: ResourceKind, origin: &str, contents: &str) -> SourceEntry {
    let payload: Value = match serde_json::from_str(contents) {
        Ok(value) => value,
        Err(err) => return malformed(kind, origin, format!("invalid JSON: {err}")),
    };
    if !payload.is_object() {
        return malformed(kind, origin, "expected a JSON object".to_string());
    }

    let model = match kind {
        ResourceKind::Dashboard => payload
            .get("dashboard")
            .filter(|inner| inner.is_object())
            .unwrap_or(&payload),
        ResourceKind::Folder => &payload,
    };

    let uid = match model.get("uid") {
        Some(Value::String(uid)) if !uid.trim().is_empty() => Uid::from(uid.trim()),
        Some(Value::String(_)) => return malformed(kind, origin, "uid is empty".to_string()),
        Some(other) => {
            return malformed(kind, origin, format!("uid is not a string: {other}"));
        }
        None => return malformed(kind, origin, "uid is missing".to_string()),
    };
    let title = model
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_owned);

    SourceEntry::Record(ResourceRecord {
        kind,
        uid,
        title,
        origin: origin.to_string(),
        payload,
    })
}

fn malformed(kind: ResourceKind, origin: &str, reason: String) -> SourceEntry {
    SourceEntry::Malformed(MalformedRecord {
        kind,
        origin: origin.to_string(),
        reason,
    })
}
