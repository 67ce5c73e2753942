//! Content handlers turn raw file bytes into a flat key/value mapping.
//!
//! A handler is any type implementing [`ContentHandler`]. Plain closures with
//! the signature `Fn(&Path, &[u8]) -> Result<ConfigMap, HandlerError>` qualify
//! too, so hosts can plug in their own format without a wrapper type.
//!
//! Built-in handlers:
//! - [`PropertiesHandler`] - `key=value` per line (the default)
//! - [`TomlHandler`] - nested tables flattened to dotted keys
//! - [`JsonHandler`] - nested objects flattened to dotted keys

mod properties;
mod structured;

use std::path::Path;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::types::ConfigMap;

pub use properties::{PropertiesHandler, parse_properties};
pub use structured::{JsonHandler, TomlHandler, flatten_value};

/// Shared, thread-safe handler reference stored per source path.
pub type SharedHandler = Arc<dyn ContentHandler>;

/// Converts file content into a flat configuration mapping.
pub trait ContentHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str {
        "custom"
    }

    /// Parse `content` read from `path`.
    fn parse(&self, path: &Path, content: &[u8]) -> Result<ConfigMap, HandlerError>;
}

impl<F> ContentHandler for F
where
    F: Fn(&Path, &[u8]) -> Result<ConfigMap, HandlerError> + Send + Sync,
{
    fn parse(&self, path: &Path, content: &[u8]) -> Result<ConfigMap, HandlerError> {
        self(path, content)
    }
}

/// The handler used when a source is registered without one.
pub fn default_handler() -> SharedHandler {
    Arc::new(PropertiesHandler)
}

/// Pick a built-in handler from the file extension.
///
/// `.toml` and `.json` get the structured handlers; everything else is
/// parsed as properties.
pub fn handler_for_extension(path: &Path) -> SharedHandler {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Arc::new(TomlHandler),
        Some("json") => Arc::new(JsonHandler),
        _ => default_handler(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closure_is_a_handler() {
        let handler: SharedHandler = Arc::new(|_path: &Path, content: &[u8]| {
            let mut map = ConfigMap::new();
            map.insert("len".to_string(), json!(content.len()));
            Ok(map)
        });

        let map = handler.parse(Path::new("/etc/app.bin"), b"abcd").unwrap();
        assert_eq!(map["len"], json!(4));
        assert_eq!(handler.name(), "custom");
    }

    #[test]
    fn test_handler_for_extension() {
        assert_eq!(handler_for_extension(Path::new("a/b.toml")).name(), "toml");
        assert_eq!(handler_for_extension(Path::new("a/b.json")).name(), "json");
        assert_eq!(
            handler_for_extension(Path::new("a/b.conf")).name(),
            "properties"
        );
        assert_eq!(handler_for_extension(Path::new("a/b")).name(), "properties");
        assert_eq!(default_handler().name(), "properties");
    }
}
