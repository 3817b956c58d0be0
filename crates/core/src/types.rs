/// Backend identifiers (datasets, images, models, annotations) are opaque
/// strings, usually UUIDs.
pub type EntityId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Deserialize an identifier that the backend may emit as either a JSON
/// string or a JSON number.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<EntityId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
    })
}

/// Optional variant of [`deserialize_id`]; use with `#[serde(default)]`.
pub fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<EntityId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_id")] EntityId);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(id)| id))
}
