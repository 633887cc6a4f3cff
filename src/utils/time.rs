use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Deserialize an RFC 3339 formatted string into an OffsetDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

/// Format a datetime as a UTC ISO-8601 string with millisecond precision,
/// e.g. `2024-05-01T10:00:00.000Z`.
pub fn iso8601(datetime: OffsetDateTime) -> String {
    let utc = datetime.to_offset(UtcOffset::UTC);
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    utc.format(format)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// The current time as [`iso8601`].
pub fn now_iso8601() -> String {
    iso8601(OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn iso8601_uses_utc_and_millis() {
        assert_eq!(
            iso8601(datetime!(2024-05-01 12:00:00.123456 +2)),
            "2024-05-01T10:00:00.123Z"
        );
    }
}
