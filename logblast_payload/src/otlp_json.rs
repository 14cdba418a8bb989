//! OpenTelemetry-style log batch, JSON encoded.
//!
//! [Specification](https://opentelemetry.io/docs/reference/specification/protocol/otlp/)
//!
//! The batch carries one resource with three string attributes, one scope and
//! a single `LogRecord` whose body is a large random string. Field names follow
//! what collectors accepting OTLP/HTTP JSON tolerate: snake_case for the
//! structural fields, `stringValue` for `AnyValue`. The shape never varies
//! between batches of one generator, only the body does.

use std::io::Write;

use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Generator, strings};

/// Configure the log batch payload.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Size of the log body, see [`strings::CHARS_PER_SIZE_UNIT`].
    pub body_size: u32,
    /// Value of the `service.name` resource attribute
    pub service_name: String,
    /// Value of the `deployment.environment` resource attribute
    pub environment: String,
    /// Value of the `host.name` resource attribute
    pub host_name: String,
    /// Name of the instrumentation scope
    pub scope_name: String,
    /// Name of the log record
    pub record_name: String,
    /// Severity text of the log record
    pub severity_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            body_size: 2,
            service_name: "test-with-curl".to_string(),
            environment: "test".to_string(),
            host_name: "my-test-host".to_string(),
            scope_name: "manual-test".to_string(),
            record_name: "test".to_string(),
            severity_text: "INFO".to_string(),
        }
    }
}

/// A batch of logs, the body of one export request.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct LogBatch {
    /// Logs grouped by the resource that produced them
    pub resource_logs: Vec<ResourceLogs>,
}

/// Logs of a single resource.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct ResourceLogs {
    /// The producing resource
    pub resource: Resource,
    /// Logs grouped by instrumentation scope
    pub scope_logs: Vec<ScopeLogs>,
}

/// Resource description, attributes only.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource attributes, order is preserved on the wire
    pub attributes: Vec<KeyValue>,
}

/// A key and its string value.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// Attribute key
    pub key: String,
    /// Attribute value
    pub value: AnyValue,
}

/// String flavored `AnyValue`.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct AnyValue {
    /// The string payload
    #[serde(rename = "stringValue")]
    pub string_value: String,
}

impl AnyValue {
    fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: value.into(),
        }
    }
}

/// Logs of a single instrumentation scope.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct ScopeLogs {
    /// The instrumentation scope
    pub scope: InstrumentationScope,
    /// The log records
    pub log_records: Vec<LogRecord>,
}

/// Instrumentation scope, name only.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct InstrumentationScope {
    /// Scope name
    pub name: String,
}

/// A single log record.
#[derive(Debug, Deserialize, serde::Serialize, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Record name
    pub name: String,
    /// Severity, as text
    pub severity_text: String,
    /// Record body
    pub body: AnyValue,
}

#[derive(Debug, Clone)]
/// OTLP/JSON log batch payload
pub struct OtlpJsonLogs {
    config: Config,
    body_chars: usize,
}

impl OtlpJsonLogs {
    /// Log records carried by every batch.
    pub const RECORDS_PER_BATCH: u64 = 1;

    /// Construct a new instance of `OtlpJsonLogs`
    #[must_use]
    pub fn new(config: Config) -> Self {
        let body_chars = strings::chars_for_size(config.body_size);
        debug!(
            body_size = config.body_size,
            body_chars, "constructed OTLP/JSON log payload"
        );
        Self { config, body_chars }
    }

    /// Number of characters in every generated body.
    #[must_use]
    pub fn body_chars(&self) -> usize {
        self.body_chars
    }

    fn batch(&self, body: String) -> LogBatch {
        let attribute = |key: &str, value: &str| KeyValue {
            key: key.to_string(),
            value: AnyValue::string(value),
        };

        LogBatch {
            resource_logs: vec![ResourceLogs {
                resource: Resource {
                    attributes: vec![
                        attribute("service.name", &self.config.service_name),
                        attribute("deployment.environment", &self.config.environment),
                        attribute("host.name", &self.config.host_name),
                    ],
                },
                scope_logs: vec![ScopeLogs {
                    scope: InstrumentationScope {
                        name: self.config.scope_name.clone(),
                    },
                    log_records: vec![LogRecord {
                        name: self.config.record_name.clone(),
                        severity_text: self.config.severity_text.clone(),
                        body: AnyValue::string(body),
                    }],
                }],
            }],
        }
    }
}

impl<'a> Generator<'a> for OtlpJsonLogs {
    type Output = LogBatch;
    type Error = Error;

    fn generate<R>(&'a self, rng: &mut R) -> Result<Self::Output, Self::Error>
    where
        R: rand::Rng + ?Sized,
    {
        let body = strings::random_string_big(rng, self.config.body_size);
        Ok(self.batch(body))
    }
}

impl crate::Serialize for OtlpJsonLogs {
    fn to_bytes<W, R>(&mut self, mut rng: R, writer: &mut W) -> Result<(), Error>
    where
        R: Rng + Sized,
        W: Write,
    {
        let batch = self.generate(&mut rng)?;
        serde_json::to_writer(&mut *writer, &batch)?;
        Ok(())
    }

    fn data_points_generated(&self) -> Option<u64> {
        Some(Self::RECORDS_PER_BATCH)
    }
}
