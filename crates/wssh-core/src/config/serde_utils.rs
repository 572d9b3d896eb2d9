//! Shared serde helpers for configuration

/// Duration fields written as whole seconds
///
/// Serializes `std::time::Duration` as a u64 number of seconds. On input it
/// also accepts a string with a unit suffix (`"500ms"`, `"10s"`, `"2m"`) so
/// sub-second timeouts can be expressed in TOML.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "wssh_core::config::serde_utils::duration_secs")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_secs {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds or a suffixed string
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse(&text).map_err(de::Error::custom),
        }
    }

    /// Parse `"<n>ms"`, `"<n>s"`, `"<n>m"` or a bare number of seconds
    pub fn parse(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(split);

        let value: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration '{}'", text))?;

        match unit.trim() {
            "" | "s" => Ok(Duration::from_secs(value)),
            "ms" => Ok(Duration::from_millis(value)),
            "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
            other => Err(format!("unknown duration unit '{}' in '{}'", other, text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration_secs")]
        timeout: Duration,
    }

    #[test]
    fn test_duration_secs_serialize() {
        let config = TestConfig {
            timeout: Duration::from_secs(10),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"timeout":10}"#);
    }

    #[test]
    fn test_duration_from_number() {
        let config: TestConfig = serde_json::from_str(r#"{"timeout":60}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_duration_from_suffixed_string() {
        let config: TestConfig = serde_json::from_str(r#"{"timeout":"750ms"}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(750));

        let config: TestConfig = serde_json::from_str(r#"{"timeout":"2m"}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_duration_rejects_garbage() {
        assert!(serde_json::from_str::<TestConfig>(r#"{"timeout":"soon"}"#).is_err());
        assert!(serde_json::from_str::<TestConfig>(r#"{"timeout":"5h"}"#).is_err());
    }
}
