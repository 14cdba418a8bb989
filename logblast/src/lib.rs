//! The logblast OTLP log load generation tool.
//!
//! This library supports the logblast binary found elsewhere in this project.
//! A run builds a synthetic OpenTelemetry log batch per iteration, hands it to
//! a [`transport`] and tallies which deliveries succeeded.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::multiple_crate_versions)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full, combinators::BoxBody};

pub mod config;
pub mod driver;
pub mod transport;

pub(crate) fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}
