//! The logblast payloads
//!
//! This library supports payload generation for the logblast project. Today
//! that is a single format: OpenTelemetry-style log batches encoded as JSON,
//! each carrying one log record with a large random body.

#![deny(clippy::cargo)]
#![deny(missing_docs)]
#![allow(clippy::multiple_crate_versions)]

use std::io::{self, Write};

use rand::Rng;

pub use otlp_json::{Config, LogBatch, OtlpJsonLogs};

pub mod otlp_json;
pub mod strings;

/// Errors related to serialization
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Json payload could not be encoded
    #[error("Json payload could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
    /// IO operation failed
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
}

/// To serialize into bytes
pub trait Serialize {
    /// Write one freshly generated payload into `writer`.
    ///
    /// # Errors
    ///
    /// Implementations are serializing data in some way. The errors that
    /// result come from serialization crackups or a failing writer.
    fn to_bytes<W, R>(&mut self, rng: R, writer: &mut W) -> Result<(), Error>
    where
        R: Rng + Sized,
        W: Write;

    /// Reports data points count for the most recently generated content.
    ///
    /// If this function returns None the serializer does not support tracking
    /// data points.
    fn data_points_generated(&self) -> Option<u64> {
        None
    }
}

/// Generate instances of `Self::Output` from source of randomness.
pub trait Generator<'a> {
    /// The type produced by the generator.
    type Output: 'a;
    /// The error produced when generation fails.
    type Error: 'a;

    /// Generate a new instance of `Self::Output`.
    ///
    /// # Errors
    ///
    /// See the implementor's `Error` type.
    fn generate<R>(&'a self, rng: &mut R) -> Result<Self::Output, Self::Error>
    where
        R: rand::Rng + ?Sized;
}
