use serde::{de, Deserialize, Deserializer, Serializer};
use time::format_description::well_known::{Iso8601, Rfc3339};

/// Serializes a timestamp as milliseconds since the Unix epoch.
pub fn serialize_datetime<S>(x: &time::OffsetDateTime, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_i64((x.unix_timestamp_nanos() / 1_000_000) as i64)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// Reads a timestamp written either as epoch milliseconds or as ISO 8601 text.
///
/// Text without a UTC offset, such as `2023-01-19T03:14:18.668140`, is taken as UTC.
pub fn deserialize_datetime<'de, D>(d: D) -> Result<Option<time::OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(d)? {
        Some(RawTimestamp::Millis(x)) => {
            time::OffsetDateTime::from_unix_timestamp_nanos(x as i128 * 1_000_000)
                .map(Some)
                .map_err(de::Error::custom)
        }
        Some(RawTimestamp::Text(text)) => parse_timestamp(&text).map(Some).map_err(|e| {
            de::Error::custom(format!("invalid timestamp '{}': {}", text, e))
        }),
        None => Ok(None),
    }
}

pub fn parse_timestamp(text: &str) -> Result<time::OffsetDateTime, time::error::Parse> {
    let text = text.trim();
    time::OffsetDateTime::parse(text, &Rfc3339).or_else(|_| {
        time::PrimitiveDateTime::parse(text, &Iso8601::DEFAULT).map(|t| t.assume_utc())
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCount {
    Integer(i64),
    Text(String),
}

/// Reads an optional count that may arrive as text. Blank or unparsable text
/// reads as absent.
pub fn deserialize_lenient_count<'de, D>(d: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawCount>::deserialize(d)? {
        Some(RawCount::Integer(n)) => Some(n),
        Some(RawCount::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}
