//! Request validation
//!
//! Checks an [`ObservedRequest`] against a [`RequestSpec`] in the fixed order
//! method, url, headers, body, and stops at the first field that differs.

use crate::error::BodySide;
use crate::request::ObservedRequest;
use crate::script::{BodyType, ExpectedBody, RequestSpec};

/// Why an observed request did not satisfy its expectation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// A scalar field (method, url, body) differs
    Field {
        field: &'static str,
        expected: String,
        received: String,
    },
    /// An expected header is missing or has another value
    Header {
        name: String,
        expected: String,
        received: Option<String>,
    },
    /// A body declared as JSON could not be parsed
    InvalidJson { side: BodySide, reason: String },
}

impl Mismatch {
    pub fn field(field: &'static str, expected: impl Into<String>, received: impl Into<String>) -> Self {
        Mismatch::Field {
            field,
            expected: expected.into(),
            received: received.into(),
        }
    }
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::Field {
                field,
                expected,
                received,
            } => write!(f, "Expected '{}' value '{}', received '{}'", field, expected, received),
            Mismatch::Header {
                name,
                expected,
                received: Some(received),
            } => write!(
                f,
                "Expected value '{}' for header name '{}', received '{}'",
                expected, name, received
            ),
            Mismatch::Header {
                name,
                expected,
                received: None,
            } => write!(
                f,
                "Expected value '{}' for header name '{}', received no such header",
                expected, name
            ),
            Mismatch::InvalidJson { side, reason } => {
                write!(f, "{} body is not valid JSON: {}", side, reason)
            }
        }
    }
}

/// Comparison strategy for one [`BodyType`]
pub trait BodyComparator: Send + Sync {
    /// Returns whether the bodies are equivalent, or a parse failure
    fn equivalent(&self, expected: &[u8], received: &[u8]) -> Result<bool, Mismatch>;
}

/// Byte-for-byte comparison
pub struct RawComparator;

impl BodyComparator for RawComparator {
    fn equivalent(&self, expected: &[u8], received: &[u8]) -> Result<bool, Mismatch> {
        Ok(expected == received)
    }
}

/// Structural comparison of JSON documents
pub struct JsonComparator;

impl JsonComparator {
    fn parse(side: BodySide, content: &[u8]) -> Result<serde_json::Value, Mismatch> {
        serde_json::from_slice(content).map_err(|e| Mismatch::InvalidJson {
            side,
            reason: e.to_string(),
        })
    }
}

impl BodyComparator for JsonComparator {
    fn equivalent(&self, expected: &[u8], received: &[u8]) -> Result<bool, Mismatch> {
        let expected = Self::parse(BodySide::Expected, expected)?;
        let received = Self::parse(BodySide::Received, received)?;
        Ok(json_equivalent(&expected, &received))
    }
}

/// Deep equality where `1`, `1.0` and `1e0` are the same number
fn json_equivalent(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                x.as_f64() == y.as_f64()
            } else {
                x == y
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equivalent(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).map_or(false, |y| json_equivalent(x, y)))
        }
        _ => a == b,
    }
}

impl BodyType {
    /// Get the comparison strategy for this body type
    pub fn comparator(&self) -> &'static dyn BodyComparator {
        match self {
            BodyType::Raw => &RawComparator,
            BodyType::Json => &JsonComparator,
        }
    }
}

/// Validate an observed request against its expectation
pub fn validate(observed: &ObservedRequest, expected: &RequestSpec) -> Result<(), Mismatch> {
    if observed.method != expected.method {
        return Err(Mismatch::field("method", &expected.method, &observed.method));
    }

    // A script url that pins a query string is compared against the full target
    let url = if expected.url.contains('?') {
        observed.target.as_str()
    } else {
        observed.path()
    };
    if url != expected.url {
        return Err(Mismatch::field("url", &expected.url, url));
    }

    for (name, value) in &expected.headers {
        let received = observed.headers.get(name);
        if received.map(|v| v.as_bytes()) != Some(value.as_bytes()) {
            return Err(Mismatch::Header {
                name: name.to_string(),
                expected: value.clone(),
                received: received.map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
            });
        }
    }

    if let Some(body) = &expected.body {
        validate_body(&observed.body, body)?;
    }

    Ok(())
}

fn validate_body(received: &[u8], expected: &ExpectedBody) -> Result<(), Mismatch> {
    if expected.body_type.comparator().equivalent(&expected.content, received)? {
        Ok(())
    } else {
        Err(Mismatch::field(
            "body",
            String::from_utf8_lossy(&expected.content),
            String::from_utf8_lossy(received),
        ))
    }
}
