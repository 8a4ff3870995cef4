use serde::Deserialize;
use serde_json::Value;

/// One flow as described by the backend's bulk listing.
///
/// Fields are kept as raw JSON because listings in the wild carry ids that
/// are null, numeric, or missing; those descriptors are skipped rather than
/// failing the whole listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FlowDescriptor {
    /// Canonical ID.
    #[serde(default)]
    pub id: Value,
    /// Human-readable flow name.
    #[serde(default)]
    pub name: Value,
    /// Endpoint alias configured for the flow.
    #[serde(default)]
    pub endpoint_name: Value,
}

fn non_blank(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

impl FlowDescriptor {
    /// Creates a descriptor from string fields.
    pub fn new(id: &str, name: Option<&str>, endpoint_name: Option<&str>) -> Self {
        Self {
            id: Value::from(id),
            name: name.map(Value::from).unwrap_or(Value::Null),
            endpoint_name: endpoint_name.map(Value::from).unwrap_or(Value::Null),
        }
    }

    /// The canonical ID, if it is a usable identifier string.
    pub fn canonical_id(&self) -> Option<&str> {
        non_blank(&self.id)
    }

    /// The endpoint alias, if set.
    pub fn endpoint_alias(&self) -> Option<&str> {
        non_blank(&self.endpoint_name)
    }

    /// The bare name, if set.
    pub fn bare_name(&self) -> Option<&str> {
        non_blank(&self.name)
    }
}

/// A bulk flow listing: a bare array or one wrapped under `records` or `flows`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlowListing {
    /// `[...]`
    Bare(Vec<Value>),
    /// `{"records": [...]}`
    Records {
        /// The wrapped entries.
        records: Vec<Value>,
    },
    /// `{"flows": [...]}`
    Flows {
        /// The wrapped entries.
        flows: Vec<Value>,
    },
}

impl FlowListing {
    /// Unwraps the listing into descriptors, skipping entries that are not objects.
    pub fn into_descriptors(self) -> Vec<FlowDescriptor> {
        let entries = match self {
            FlowListing::Bare(entries) => entries,
            FlowListing::Records { records } => records,
            FlowListing::Flows { flows } => flows,
        };
        entries
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect()
    }
}

impl From<Vec<FlowDescriptor>> for FlowListing {
    fn from(descriptors: Vec<FlowDescriptor>) -> Self {
        FlowListing::Bare(
            descriptors
                .into_iter()
                .map(|d| {
                    serde_json::json!({
                        "id": d.id,
                        "name": d.name,
                        "endpoint_name": d.endpoint_name,
                    })
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_envelopes_are_accepted() {
        let body = r#"{"id":"u1","name":"A"}"#;
        for text in [
            format!("[{body}]"),
            format!(r#"{{"records":[{body}]}}"#),
            format!(r#"{{"flows":[{body}]}}"#),
        ] {
            let listing: FlowListing = serde_json::from_str(&text).unwrap();
            let descriptors = listing.into_descriptors();
            assert_eq!(descriptors.len(), 1, "{text}");
            assert_eq!(descriptors[0].canonical_id(), Some("u1"));
            assert_eq!(descriptors[0].bare_name(), Some("A"));
        }
    }

    #[test]
    fn unusable_ids_are_reported_as_none() {
        let listing: FlowListing = serde_json::from_str(
            r#"[{"name":"missing"},{"id":null,"name":"null"},{"id":7,"name":"number"},{"id":"  "},"junk"]"#,
        )
        .unwrap();
        let descriptors = listing.into_descriptors();
        assert_eq!(descriptors.len(), 4);
        assert!(descriptors.iter().all(|d| d.canonical_id().is_none()));
    }
}
