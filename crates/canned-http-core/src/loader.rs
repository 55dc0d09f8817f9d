//! Script file parsing for canned-http
//!
//! Supports two document formats:
//! - JSON (.json)
//! - YAML (.yaml, .yml)
//!
//! A script document is a list of connections, each a list of exchanges.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::script::{BodyType, ConnectionSpec, ExchangeSpec, ExpectedBody, RequestSpec, ResponseSpec, Script};

/// Supported script file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    Json,
    Yaml,
}

impl ScriptFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ScriptFormat::Json),
            "yaml" | "yml" => Some(ScriptFormat::Yaml),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Script document as written on disk
#[derive(Debug, Default)]
pub struct ScriptFile {
    pub connections: Vec<Vec<ExchangeConfig>>,
}

/// Single exchange from a script document
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfig {
    pub request: Option<RequestConfig>,
    pub response: Option<ResponseConfig>,
}

/// Expected request from a script document
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    pub method: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HeaderList,
    pub body: Option<String>,
    pub body_filename: Option<String>,
    pub body_type: Option<BodyType>,
}

/// Canned response from a script document
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseConfig {
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub headers: HeaderList,
    /// Seconds to wait before sending
    pub delay: Option<f64>,
    pub body: Option<String>,
    pub body_filename: Option<String>,
}

/// Header map from a script document, kept in document order.
///
/// Values may be any scalar; numbers and booleans are written as text.
#[derive(Debug, Default)]
pub struct HeaderList(pub Vec<(String, String)>);

impl<'de> Deserialize<'de> for HeaderList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HeaderListVisitor;

        impl<'de> Visitor<'de> for HeaderListVisitor {
            type Value = HeaderList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut headers = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, value)) = map.next_entry::<String, ScalarText>()? {
                    headers.push((name, value.0));
                }
                Ok(HeaderList(headers))
            }
        }

        deserializer.deserialize_map(HeaderListVisitor)
    }
}

/// A scalar document value rendered as text
struct ScalarText(String);

impl<'de> Deserialize<'de> for ScalarText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ScalarTextVisitor;

        impl<'de> Visitor<'de> for ScalarTextVisitor {
            type Value = ScalarText;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                Ok(ScalarText(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Self::Value, E> {
                Ok(ScalarText(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Self::Value, E> {
                Ok(ScalarText(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
                Ok(ScalarText(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
                Ok(ScalarText(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
                Ok(ScalarText(v.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarTextVisitor)
    }
}

/// 1-based position of an exchange, for messages
#[derive(Debug, Clone, Copy)]
struct Position {
    connection: usize,
    exchange: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection {}, exchange {}", self.connection, self.exchange)
    }
}

impl ScriptFile {
    /// Load a script from file, detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ScriptNotFound(path.to_path_buf()));
        }

        let format = ScriptFormat::from_path(path).ok_or_else(|| {
            Error::script(format!(
                "Unsupported script file extension: {}. Expected one of {:?}",
                path.display(),
                SCRIPT_EXTENSIONS
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse script content with specified format
    pub fn parse(content: &str, format: ScriptFormat) -> Result<Self> {
        // An empty document is an empty script
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        match format {
            ScriptFormat::Json => Self::from_json(content),
            ScriptFormat::Yaml => Self::from_yaml(content),
        }
    }

    /// Parse JSON script content
    pub fn from_json(content: &str) -> Result<Self> {
        let connections: Option<Vec<Vec<ExchangeConfig>>> = serde_json::from_str(content)?;
        Ok(Self {
            connections: connections.unwrap_or_default(),
        })
    }

    /// Parse YAML script content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let connections: Option<Vec<Vec<ExchangeConfig>>> = serde_yaml::from_str(content)?;
        Ok(Self {
            connections: connections.unwrap_or_default(),
        })
    }

    /// Validate the document and resolve body files relative to `base_dir`
    pub fn into_script(self, base_dir: &Path) -> Result<Script> {
        let mut connections = Vec::with_capacity(self.connections.len());

        for (i, exchanges) in self.connections.into_iter().enumerate() {
            let mut specs = Vec::with_capacity(exchanges.len());
            let mut closed_at: Option<usize> = None;

            for (j, exchange) in exchanges.into_iter().enumerate() {
                let position = Position {
                    connection: i + 1,
                    exchange: j + 1,
                };
                if let Some(closed_at) = closed_at {
                    warn!(
                        "Unreachable exchange at {}: exchange {} has no response",
                        position, closed_at
                    );
                }

                let spec = exchange.into_spec(base_dir, position)?;
                if spec.response.is_none() && closed_at.is_none() {
                    closed_at = Some(position.exchange);
                }
                specs.push(spec);
            }

            connections.push(ConnectionSpec::new(specs));
        }

        debug!("Loaded script with {} connections", connections.len());
        Ok(Script::new(connections))
    }
}

/// Load and validate a script file in one step
pub fn load_script(path: &Path) -> Result<Script> {
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    ScriptFile::load(path)?.into_script(&base_dir)
}

impl ExchangeConfig {
    fn into_spec(self, base_dir: &Path, position: Position) -> Result<ExchangeSpec> {
        let request = self
            .request
            .ok_or_else(|| Error::script(format!("Missing 'request' key for {}", position)))?
            .into_spec(base_dir, position)?;

        let response = self
            .response
            .map(|r| r.into_spec(base_dir, position))
            .transpose()?;

        Ok(ExchangeSpec::new(request, response))
    }
}

impl RequestConfig {
    fn into_spec(self, base_dir: &Path, position: Position) -> Result<RequestSpec> {
        let method = self
            .method
            .ok_or_else(|| Error::script(format!("Missing 'method' key for request in {}", position)))?;
        let method_upper = method.to_uppercase();
        if !is_supported_method(&method_upper) {
            return Err(Error::script(format!(
                "Invalid method '{}' for request in {}",
                method, position
            )));
        }

        let url = self.url.filter(|u| !u.is_empty()).ok_or_else(|| {
            Error::script(format!("Missing 'url' key for request in {}", position))
        })?;

        let headers = self
            .headers
            .0
            .into_iter()
            .map(|(name, value)| {
                HeaderName::from_bytes(name.as_bytes())
                    .map(|name| (name, value))
                    .map_err(|_| {
                        Error::script(format!(
                            "Invalid header name '{}' for request in {}",
                            name, position
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let content = resolve_body(self.body, self.body_filename, base_dir, "request", position)?;
        let body = match (content, self.body_type) {
            (Some(content), body_type) => Some(ExpectedBody {
                content,
                body_type: body_type.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(Error::script(format!(
                    "Found 'body_type' without 'body' or 'body_filename' for request in {}",
                    position
                )))
            }
            (None, None) => None,
        };

        Ok(RequestSpec {
            method: method_upper,
            url,
            headers,
            body,
        })
    }
}

impl ResponseConfig {
    fn into_spec(self, base_dir: &Path, position: Position) -> Result<ResponseSpec> {
        let code = self.status_code.ok_or_else(|| {
            Error::script(format!("Missing 'status_code' key for response in {}", position))
        })?;
        let status_code = StatusCode::from_u16(code).map_err(|_| {
            Error::script(format!(
                "Invalid 'status_code' value '{}' for response in {}",
                code, position
            ))
        })?;

        let content_type = self.content_type.ok_or_else(|| {
            Error::script(format!("Missing 'content_type' key for response in {}", position))
        })?;
        if HeaderValue::from_str(&content_type).is_err() {
            return Err(Error::script(format!(
                "Invalid 'content_type' value {:?} for response in {}",
                content_type, position
            )));
        }

        // Written to the wire as-is, so they must form valid header lines
        for (name, value) in &self.headers.0 {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(Error::script(format!(
                    "Invalid header name '{}' for response in {}",
                    name, position
                )));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(Error::script(format!(
                    "Invalid header value {:?} for header name '{}' for response in {}",
                    value, name, position
                )));
            }
        }

        let delay = match self.delay {
            None => Duration::ZERO,
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
                Error::script(format!(
                    "Invalid 'delay' value '{}' for response in {}",
                    secs, position
                ))
            })?,
        };

        let body = resolve_body(self.body, self.body_filename, base_dir, "response", position)?
            .ok_or_else(|| {
                Error::script(format!(
                    "Missing both 'body' and 'body_filename' keys for response in {}",
                    position
                ))
            })?;

        Ok(ResponseSpec {
            status_code,
            content_type,
            headers: self.headers.0,
            delay,
            body,
        })
    }
}

/// Resolve the either/or body keys into content, reading files once
fn resolve_body(
    body: Option<String>,
    body_filename: Option<String>,
    base_dir: &Path,
    side: &str,
    position: Position,
) -> Result<Option<Bytes>> {
    match (body, body_filename) {
        (Some(_), Some(_)) => Err(Error::script(format!(
            "Found both 'body' and 'body_filename' keys for {} in {}",
            side, position
        ))),
        (Some(body), None) => Ok(Some(Bytes::from(body))),
        (None, Some(filename)) => {
            let path = if Path::new(&filename).is_absolute() {
                PathBuf::from(&filename)
            } else {
                base_dir.join(&filename)
            };
            let content = std::fs::read(&path)
                .map_err(|source| Error::BodyFileUnreadable { path, source })?;
            Ok(Some(Bytes::from(content)))
        }
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn parse_yaml(content: &str) -> Result<Script> {
        ScriptFile::from_yaml(content)?.into_script(Path::new("."))
    }

    #[test]
    fn test_script_format_detection() {
        assert_eq!(ScriptFormat::from_extension("json"), Some(ScriptFormat::Json));
        assert_eq!(ScriptFormat::from_extension("yaml"), Some(ScriptFormat::Yaml));
        assert_eq!(ScriptFormat::from_extension("YML"), Some(ScriptFormat::Yaml));
        assert_eq!(ScriptFormat::from_extension("toml"), None);
    }

    #[test]
    fn test_parse_yaml_script() {
        let script = parse_yaml(
            r#"
- - request:
      method: get
      url: /foo1.html
      headers:
        Accept: text/html
    response:
      status_code: 200
      content_type: text/html
      delay: 1.5
      headers:
        Cache-Control: no-cache
      body: reply1
  - request:
      method: POST
      url: /foo2.html
      body: '{"a": 1}'
      body_type: JSON
- - request:
      method: DELETE
      url: /foo3.html
    response:
      status_code: 204
      content_type: text/plain
      body: ""
"#,
        )
        .unwrap();

        assert_eq!(script.len(), 2);
        let first = &script.connections[0];
        assert_eq!(first.exchanges.len(), 2);

        let request = &first.exchanges[0].request;
        assert_eq!(request.method, "GET");
        assert_eq!(request.url, "/foo1.html");
        assert_eq!(request.headers[0].0, HeaderName::from_static("accept"));

        let response = first.exchanges[0].response.as_ref().unwrap();
        assert_eq!(response.status_code, StatusCode::OK);
        assert_eq!(response.delay, Duration::from_millis(1500));
        assert_eq!(response.body, Bytes::from_static(b"reply1"));
        assert_eq!(response.headers, vec![("Cache-Control".to_string(), "no-cache".to_string())]);

        let posted = &first.exchanges[1];
        assert!(posted.response.is_none());
        assert_eq!(posted.request.body.as_ref().unwrap().body_type, BodyType::Json);

        let deleted = script.connections[1].exchanges[0].response.as_ref().unwrap();
        assert_eq!(deleted.status_code, StatusCode::NO_CONTENT);
        assert!(deleted.body.is_empty());
    }

    #[test]
    fn test_parse_json_script() {
        let content = r#"
[
    [
        {
            "request": { "method": "GET", "url": "/index.html" },
            "response": { "status_code": 200, "content_type": "text/html", "body": "hi" }
        }
    ]
]
"#;
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let script = load_script(file.path()).unwrap();
        assert_eq!(script.len(), 1);
        assert_eq!(script.connections[0].exchanges[0].request.url, "/index.html");
    }

    #[test]
    fn test_empty_script() {
        assert!(ScriptFile::parse("", ScriptFormat::Yaml).unwrap().connections.is_empty());
        assert!(ScriptFile::parse("null", ScriptFormat::Json).unwrap().connections.is_empty());
        assert!(ScriptFile::parse("[]", ScriptFormat::Yaml).unwrap().connections.is_empty());
    }

    #[test]
    fn test_script_not_found() {
        let result = ScriptFile::load(Path::new("/nonexistent/script.yaml"));
        assert!(matches!(result, Err(Error::ScriptNotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".toml").unwrap();
        let result = ScriptFile::load(file.path());
        assert!(matches!(result, Err(Error::InvalidScript(_))));
    }

    #[test]
    fn test_missing_required_keys() {
        let err = parse_yaml("- - response: { status_code: 200, content_type: a, body: b }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid script: Missing 'request' key for connection 1, exchange 1"
        );

        let err = parse_yaml("- - request: { url: /foo.html }").unwrap_err();
        assert!(err.to_string().contains("Missing 'method' key"));

        let err = parse_yaml("- - request: { method: GET }").unwrap_err();
        assert!(err.to_string().contains("Missing 'url' key"));

        let err = parse_yaml(
            "- - request: { method: GET, url: /a }\n  - request: { method: GET, url: /b }\n    response: { content_type: a, body: b }",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid script: Missing 'status_code' key for response in connection 1, exchange 2"
        );

        let err = parse_yaml("- - request: { method: GET, url: /a }\n    response: { status_code: 200, body: b }")
            .unwrap_err();
        assert!(err.to_string().contains("Missing 'content_type' key"));
    }

    #[test]
    fn test_invalid_method() {
        let err = parse_yaml("- - request: { method: PONY, url: /foo.html }").unwrap_err();
        assert!(err.to_string().contains("Invalid method 'PONY'"));
    }

    #[test]
    fn test_response_body_either_or() {
        let both = "- - request: { method: GET, url: /a }\n    response: { status_code: 200, content_type: a, body: b, body_filename: c }";
        let err = parse_yaml(both).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid script: Found both 'body' and 'body_filename' keys for response in connection 1, exchange 1"
        );

        let neither = "- - request: { method: GET, url: /a }\n    response: { status_code: 200, content_type: a }";
        let err = parse_yaml(neither).unwrap_err();
        assert!(err.to_string().contains("Missing both 'body' and 'body_filename'"));
    }

    #[test]
    fn test_request_body_both_set() {
        let err = parse_yaml("- - request: { method: POST, url: /a, body: x, body_filename: y }").unwrap_err();
        assert!(err.to_string().contains("Found both 'body' and 'body_filename' keys for request"));
    }

    #[test]
    fn test_body_type_without_body() {
        let err = parse_yaml("- - request: { method: POST, url: /a, body_type: JSON }").unwrap_err();
        assert!(err.to_string().contains("Found 'body_type' without"));
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = parse_yaml(
            "- - request: { method: GET, url: /a }\n    response: { status_code: 200, content_type: a, body: b, delay: -1 }",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid 'delay' value"));
    }

    #[test]
    fn test_oversized_delay_rejected() {
        let err = parse_yaml(
            "- - request: { method: GET, url: /a }\n    response: { status_code: 200, content_type: a, body: b, delay: 1e20 }",
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Invalid script: Invalid 'delay' value"));
        assert!(message.ends_with("for response in connection 1, exchange 1"));
    }

    #[test]
    fn test_response_headers_keep_document_order() {
        let script = parse_yaml(
            r#"
- - request: { method: GET, url: /a }
    response:
      status_code: 200
      content_type: text/plain
      headers:
        Zeta: 1
        Alpha: 2
        X-Cached: true
      body: b
"#,
        )
        .unwrap();
        let response = script.connections[0].exchanges[0].response.as_ref().unwrap();
        assert_eq!(
            response.headers,
            vec![
                ("Zeta".to_string(), "1".to_string()),
                ("Alpha".to_string(), "2".to_string()),
                ("X-Cached".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_json_header_values_may_be_numbers() {
        let script = ScriptFile::from_json(
            r#"[[{
                "request": { "method": "GET", "url": "/a", "headers": { "X-Version": 2 } },
                "response": { "status_code": 200, "content_type": "text/plain", "headers": { "X-Ratio": 1.5 }, "body": "" }
            }]]"#,
        )
        .unwrap()
        .into_script(Path::new("."))
        .unwrap();
        let exchange = &script.connections[0].exchanges[0];
        assert_eq!(exchange.request.headers[0].1, "2");
        assert_eq!(exchange.response.as_ref().unwrap().headers[0].1, "1.5");
    }

    #[test]
    fn test_invalid_response_headers_rejected() {
        let err = parse_yaml(
            "- - request: { method: GET, url: /a }\n    response: { status_code: 200, content_type: a, headers: { Bad Name: x }, body: b }",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid script: Invalid header name 'Bad Name' for response in connection 1, exchange 1"
        );

        let err = parse_yaml(
            "- - request: { method: GET, url: /a }\n    response: { status_code: 200, content_type: a, headers: { X-A: \"1\\r\\nX-Injected: 1\" }, body: b }",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid header value"));

        let err = parse_yaml(
            "- - request: { method: GET, url: /a }\n    response: { status_code: 200, content_type: \"text/plain\\r\\nX-Injected: 1\", body: b }",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid 'content_type' value"));
    }

    #[test]
    fn test_body_filename_resolved_against_base_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("favicon.ico"), [0u8, 1, 2, 3]).unwrap();
        std::fs::write(dir.path().join("expected.json"), r#"{"a": 1}"#).unwrap();

        let content = r#"
- - request: { method: POST, url: /submit, body_filename: expected.json, body_type: JSON }
    response: { status_code: 200, content_type: image/x-icon, body_filename: favicon.ico }
"#;
        let script = ScriptFile::from_yaml(content)
            .unwrap()
            .into_script(dir.path())
            .unwrap();

        let exchange = &script.connections[0].exchanges[0];
        assert_eq!(
            exchange.request.body.as_ref().unwrap().content,
            Bytes::from_static(br#"{"a": 1}"#)
        );
        assert_eq!(
            exchange.response.as_ref().unwrap().body,
            Bytes::from_static(&[0, 1, 2, 3])
        );
    }

    #[test]
    fn test_missing_body_file() {
        let dir = tempdir().unwrap();
        let content = "- - request: { method: GET, url: /a }\n    response: { status_code: 200, content_type: a, body_filename: missing.bin }";
        let err = ScriptFile::from_yaml(content)
            .unwrap()
            .into_script(dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::BodyFileUnreadable { .. }));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = ScriptFile::from_yaml("- - request: { method: GET, url: /a }\n    reply: hi");
        assert!(matches!(result, Err(Error::YamlError(_))));
    }

    #[test]
    fn test_demo_scripts_load() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");

        let script = load_script(&demos.join("script.yaml")).unwrap();
        let exchanges = &script.connections[0].exchanges;
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].response.as_ref().unwrap().delay, Duration::from_secs(5));
        assert!(!exchanges[1].response.as_ref().unwrap().body.is_empty());

        let script = load_script(&demos.join("long_poll.json")).unwrap();
        let exchanges = &script.connections[0].exchanges;
        assert_eq!(exchanges[0].request.body.as_ref().unwrap().body_type, BodyType::Json);
        assert!(exchanges[1].response.is_none());
    }

    #[test]
    fn test_unreachable_exchange_allowed() {
        let script = parse_yaml(
            "- - request: { method: GET, url: /poll }\n  - request: { method: GET, url: /later }",
        )
        .unwrap();
        assert_eq!(script.connections[0].exchanges.len(), 2);
    }
}
