use serde::{Deserialize, Deserializer, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Deserialize an optional RFC 3339 timestamp, dropping values that do not parse.
///
/// History entries come from the backend's message store, whose timestamp
/// format is not guaranteed; a bad timestamp must not reject the whole entry.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|v| v.as_str()).and_then(parse))
}

/// Serialize an optional OffsetDateTime as an RFC 3339 string.
pub fn serialize_option<S>(datetime: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match datetime {
        Some(datetime) => {
            let s = datetime
                .format(&Rfc3339)
                .map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&s)
        }
        None => serializer.serialize_none(),
    }
}

/// Parse an RFC 3339 timestamp, also accepting the space-separated
/// `YYYY-MM-DD HH:MM:SS` form with an implied UTC offset.
pub fn parse(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if let Ok(datetime) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(datetime);
    }
    let (date, clock) = s.split_once(' ')?;
    OffsetDateTime::parse(&format!("{date}T{clock}Z"), &Rfc3339).ok()
}
