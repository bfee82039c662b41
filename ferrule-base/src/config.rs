use std::collections::BTreeMap;
use std::path::Path;

use ferrule::StdError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// JSON configuration made of named sections.
///
/// # Examples
///
/// ```rust
/// use ferrule_base::Config;
///
/// let mut config = Config::parse(r#"{"server": {"port": 8080}}"#).unwrap();
/// config.merge_from(Config::parse(r#"{"server": {"host": "0.0.0.0"}}"#).unwrap());
///
/// let server: serde_json::Value = config.get("server").unwrap();
/// assert_eq!(server["port"], 8080);
/// assert_eq!(server["host"], "0.0.0.0");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub(crate) sections: BTreeMap<String, serde_json::Value>,
}

/// A typed configuration section stored under a fixed key.
pub trait ConfigSection: DeserializeOwned {
    fn key() -> &'static str;
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserializes the section `name`; a missing section reads as `null`.
    pub fn get<T>(&self, name: impl AsRef<str>) -> Result<T, StdError>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(
            self.sections
                .get(name.as_ref())
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        )?)
    }

    /// Deserializes a typed section; a missing section reads as an empty object,
    /// so sections with `#[serde(default)]` fall back to their defaults.
    pub fn section<T>(&self) -> Result<T, StdError>
    where
        T: ConfigSection,
    {
        Ok(serde_json::from_value(
            self.sections
                .get(T::key())
                .cloned()
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        )?)
    }

    pub fn set<T>(&mut self, name: impl Into<String>, value: T) -> Result<(), StdError>
    where
        T: Serialize,
    {
        self.sections
            .insert(name.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn with<T>(mut self, name: impl Into<String>, value: T) -> Result<Self, StdError>
    where
        T: Serialize,
    {
        self.set(name, value)?;
        Ok(self)
    }

    /// Merges `other` into `self`: objects merge key by key, arrays are
    /// concatenated and anything else is replaced.
    pub fn merge_from(&mut self, other: Self) {
        for (name, section) in other.sections {
            match self.sections.get_mut(&name) {
                Some(current) => merge_value(current, section),
                None => {
                    self.sections.insert(name, section);
                }
            }
        }
    }

    pub fn parse<T>(text: T) -> Result<Self, StdError>
    where
        T: AsRef<str>,
    {
        Ok(serde_json::from_str(text.as_ref())?)
    }

    pub async fn parse_file(path: impl AsRef<Path>) -> Result<Self, StdError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::parse(text)
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.sections.contains_key(name.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }
}

fn merge_value(target: &mut serde_json::Value, source: serde_json::Value) {
    use serde_json::Value;

    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(current) => merge_value(current, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => target.extend(source),
        (target, source) => *target = source,
    }
}
