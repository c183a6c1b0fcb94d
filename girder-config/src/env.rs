// Environment variable layer

use crate::{ConfigError, Result};
use girder_core::logging::debug;
use serde_json::{Map, Value};
use std::env;
use std::ffi::OsString;
use std::path::Path;

/// Separates nesting levels in a variable name: `GIRDER_LOG__LEVEL`
pub const NESTING_SEPARATOR: &str = "__";

/// Where variables are read from
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The process environment
    #[default]
    Process,
    /// A fixed set of pairs, used instead of the process environment
    Fixed(Vec<(String, String)>),
}

impl EnvSource {
    pub fn vars(&self) -> Vec<(String, String)> {
        match self {
            EnvSource::Process => utf8_pairs(env::vars_os()),
            EnvSource::Fixed(vars) => vars.clone(),
        }
    }
}

/// Keep the pairs whose name and value are both valid UTF-8
fn utf8_pairs(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Vec<(String, String)> {
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!(variable = ?key, "Skipping non UTF-8 environment variable");
                None
            }
        })
        .collect()
}

/// Turns prefixed variables into a nested JSON object
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: String,
    source: EnvSource,
}

impl EnvLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            source: EnvSource::Process,
        }
    }

    pub fn with_source(mut self, source: EnvSource) -> Self {
        self.source = source;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Read a `.env` file without touching the process environment
    pub fn read_dotenv(path: impl AsRef<Path>) -> Result<Vec<(String, String)>> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {e}", path.display())))?;

        let mut vars = Vec::new();
        for item in iter {
            vars.push(item.map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?);
        }
        debug!(path = %path.display(), count = vars.len(), "Loaded .env file");
        Ok(vars)
    }

    /// Collect every variable carrying the prefix.
    ///
    /// `PREFIX_A__B=1` becomes `{"a": {"b": 1}}`. Later pairs override
    /// earlier ones.
    pub fn load(&self) -> Value {
        self.load_pairs(self.source.vars())
    }

    pub fn load_pairs(&self, vars: impl IntoIterator<Item = (String, String)>) -> Value {
        let lead = format!("{}_", self.prefix.to_uppercase());
        let mut root = Map::new();

        for (key, raw) in vars {
            let Some(rest) = key.to_uppercase().strip_prefix(&lead).map(str::to_string) else {
                continue;
            };
            let path: Vec<String> = rest
                .split(NESTING_SEPARATOR)
                .map(|part| part.to_lowercase())
                .collect();
            if path.iter().any(String::is_empty) {
                continue;
            }
            insert_path(&mut root, &path, parse_scalar(&raw));
        }

        Value::Object(root)
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new("GIRDER")
    }
}

/// JSON scalars keep their type, anything else is a string
pub fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value @ (Value::Bool(_) | Value::Number(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

fn insert_path(map: &mut Map<String, Value>, path: &[String], value: Value) {
    match path {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("GIRDER_PORT"), OsString::from("9000")),
            (OsString::from("GIRDER_BLOB"), OsString::from_vec(vec![0x66, 0xff])),
            (OsString::from_vec(vec![0xfe]), OsString::from("x")),
        ];
        assert_eq!(
            utf8_pairs(vars),
            vec![("GIRDER_PORT".to_string(), "9000".to_string())]
        );
    }
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_and_nesting() {
        let loader = EnvLoader::new("GIRDER").with_source(EnvSource::Fixed(pairs(&[
            ("GIRDER_PORT", "9000"),
            ("GIRDER_LOG__LEVEL", "debug"),
            ("GIRDER_HOST", "127.0.0.1"),
            ("OTHER_PORT", "1"),
            ("GIRDER_", "ignored"),
        ])));

        assert_eq!(
            loader.load(),
            json!({"port": 9000, "host": "127.0.0.1", "log": {"level": "debug"}})
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse_scalar("true"), json!(true));
        assert_eq!(parse_scalar("42"), json!(42));
        assert_eq!(parse_scalar("info"), json!("info"));
        assert_eq!(parse_scalar("null"), json!("null"));
        assert_eq!(parse_scalar("[1]"), json!("[1]"));
    }

    #[test]
    fn test_later_pairs_win() {
        let loader = EnvLoader::default();
        let value = loader.load_pairs(pairs(&[("GIRDER_PORT", "1"), ("girder_port", "2")]));
        assert_eq!(value["port"], 2);
    }

    #[test]
    fn test_missing_dotenv_is_an_error() {
        assert!(EnvLoader::read_dotenv("/definitely/not/here/.env").is_err());
    }
}
