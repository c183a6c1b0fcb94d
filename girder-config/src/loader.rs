// Layered configuration loading

use crate::env::{EnvLoader, EnvSource};
use crate::{ConfigError, Result};
use girder_core::logging::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }

    /// Parse a whole document into a JSON value
    pub fn parse(&self, content: &str) -> Result<Value> {
        match self {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {e}"))),
            FileFormat::Toml => {
                let table: toml::Table = toml::from_str(content)
                    .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {e}")))?;
                serde_json::to_value(table)
                    .map_err(|e| ConfigError::ParseError(format!("TOML to JSON conversion error: {e}")))
            }
        }
    }
}

enum Document {
    File(PathBuf),
    Inline(String, FileFormat),
}

/// Builds a configuration value from layers, later layers winning:
/// struct defaults, a file or inline document, a `.env` file, then
/// prefixed environment variables.
///
/// ```
/// use girder_config::{ConfigLoader, EnvSource, ServerConfig};
///
/// let config: ServerConfig = ConfigLoader::new()
///     .toml_str("port = 3000")
///     .env_source(EnvSource::Fixed(vec![("GIRDER_LOG__LEVEL".into(), "debug".into())]))
///     .load()
///     .unwrap();
///
/// assert_eq!(config.port, 3000);
/// assert_eq!(config.log.level, "debug");
/// ```
pub struct ConfigLoader {
    env: EnvLoader,
    source: EnvSource,
    use_env: bool,
    documents: Vec<Document>,
    dotenv: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            env: EnvLoader::default(),
            source: EnvSource::Process,
            use_env: true,
            documents: Vec::new(),
            dotenv: None,
        }
    }

    /// Prefix for environment variables, `GIRDER` unless set
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env = EnvLoader::new(prefix);
        self
    }

    /// A config file; the format comes from the extension
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.documents.push(Document::File(path.into()));
        self
    }

    pub fn toml_str(mut self, content: impl Into<String>) -> Self {
        self.documents.push(Document::Inline(content.into(), FileFormat::Toml));
        self
    }

    pub fn json_str(mut self, content: impl Into<String>) -> Self {
        self.documents.push(Document::Inline(content.into(), FileFormat::Json));
        self
    }

    pub fn dotenv(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv = Some(path.into());
        self
    }

    pub fn env_source(mut self, source: EnvSource) -> Self {
        self.source = source;
        self
    }

    /// Skip the environment layer entirely, `.env` included
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Merge every layer over `T::default()` and deserialize
    pub fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let defaults = serde_json::to_value(T::default())
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        let merged = self.load_over(defaults)?;
        serde_json::from_value(merged).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Merge every layer over `base`
    pub fn load_over(&self, mut base: Value) -> Result<Value> {
        for document in &self.documents {
            let value = match document {
                Document::File(path) => load_file(path)?,
                Document::Inline(content, format) => format.parse(content)?,
            };
            merge(&mut base, value);
        }

        if self.use_env {
            let mut vars = match &self.dotenv {
                Some(path) => EnvLoader::read_dotenv(path)?,
                None => Vec::new(),
            };
            vars.extend(self.source.vars());
            merge(&mut base, self.env.load_pairs(vars));
        }

        Ok(base)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a JSON or TOML file, choosing the parser by extension
pub fn load_file(path: &Path) -> Result<Value> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ConfigError::LoadError(format!("No file extension: {}", path.display())))?;
    let format = FileFormat::from_extension(ext)
        .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {ext}")))?;

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::LoadError(format!("Failed to read {}: {e}", path.display())))?;
    debug!(path = %path.display(), "Loaded configuration file");
    format.parse(&content)
}

/// Deep-merge `overlay` into `base`; objects merge key by key, anything
/// else replaces
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
