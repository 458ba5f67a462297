use serde::Deserialize;

use crate::types::ResourceKind;

/// Envelope received on the push channel:
/// `{ "type": "<kind>", "resource": { ... } }`.
///
/// An envelope with an unknown kind tag is not an error; the caller drops
/// it silently per the protocol.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub kind: ResourceKind,
    pub resource: serde_json::Value,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    resource: serde_json::Value,
}

impl PushMessage {
    /// Parse a raw text frame. Returns `None` for anything that is not a
    /// well-formed envelope with a recognized kind tag.
    pub fn parse(text: &str) -> Option<Self> {
        let raw: RawEnvelope = serde_json::from_str(text).ok()?;
        let kind = ResourceKind::from_str(&raw.kind)?;
        Some(Self {
            kind,
            resource: raw.resource,
        })
    }

    /// The `id` field of the wrapped resource, if present.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource.get("id").and_then(|v| v.as_str())
    }
}
