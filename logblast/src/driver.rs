//! The logblast driver.
//!
//! Runs a fixed number of iterations, one after the other: build a fresh log
//! batch, serialize it to JSON, hand it to the [`Transport`] and wait for the
//! outcome. Each iteration writes one human readable status line and the run
//! ends with a summary line.
//!
//! ## Metrics
//!
//! `requests_sent`: Total number of batches handed to the transport
//! `request_ok`: Successful sends
//! `request_failure`: Failed sends, labelled by `exit_code`
//! `bytes_written`: Total bytes of successfully sent batches
//! `data_points_transmitted`: Total log records in successfully sent batches
//!

use std::io::{self, Write};

use bytes::{BufMut, BytesMut};
use logblast_payload::{OtlpJsonLogs, Serialize};
use metrics::counter;
use rand::Rng;
use tracing::{debug, info};

use crate::transport::{self, Transport};

/// Line written for a delivered batch.
pub const SENT_LINE: &str = "Data sent successfully.";
/// Line written for a batch that failed to send.
pub const FAILED_LINE: &str = "Failed to send data.";

// Serialized batch size beyond the body, rounded up.
const ENVELOPE_BYTES: usize = 512;

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Driver`].
pub enum Error {
    /// See [`logblast_payload::Error`]
    #[error("Payload error: {0}")]
    Payload(#[from] logblast_payload::Error),
    /// See [`transport::Error`]
    #[error(transparent)]
    Transport(#[from] transport::Error),
    /// Writing a report line failed
    #[error("Io error: {0}")]
    Io(#[from] io::Error),
}

/// Tally of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Batches handed to the transport
    pub attempts: u64,
    /// Batches delivered
    pub successes: u64,
}

impl Report {
    /// Batches that failed to send.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.attempts - self.successes
    }
}

/// Drives batches into a [`Transport`].
#[derive(Debug)]
pub struct Driver<T> {
    payload: OtlpJsonLogs,
    transport: T,
    iterations: u32,
    labels: Vec<(String, String)>,
}

impl<T> Driver<T>
where
    T: Transport,
{
    /// Create a new [`Driver`] instance
    #[must_use]
    pub fn new(payload: OtlpJsonLogs, transport: T, iterations: u32) -> Self {
        Self {
            payload,
            transport,
            iterations,
            labels: vec![("component".to_string(), "driver".to_string())],
        }
    }

    /// Consume the driver, returning its transport.
    #[must_use]
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run every iteration to completion, writing status lines to `report`.
    ///
    /// # Errors
    ///
    /// Function will error if a batch cannot be serialized, the transport
    /// reports an error or `report` cannot be written to. The run stops at
    /// the first error.
    pub async fn run<R, W>(&mut self, rng: &mut R, report: &mut W) -> Result<Report, Error>
    where
        R: Rng + ?Sized,
        W: Write,
    {
        let mut successes: u64 = 0;

        for iteration in 0..self.iterations {
            let mut writer =
                BytesMut::with_capacity(self.payload.body_chars() + ENVELOPE_BYTES).writer();
            self.payload.to_bytes(&mut *rng, &mut writer)?;
            let body = writer.into_inner().freeze();
            let body_length = body.len();

            counter!("requests_sent", &self.labels).increment(1);
            let outcome = self.transport.send(body).await?;
            debug!(
                iteration,
                code = outcome.code(),
                bytes = body_length,
                "batch sent"
            );

            if outcome.is_success() {
                successes += 1;
                counter!("request_ok", &self.labels).increment(1);
                counter!("bytes_written", &self.labels).increment(body_length as u64);
                if let Some(dp) = self.payload.data_points_generated() {
                    counter!("data_points_transmitted", &self.labels).increment(dp);
                }
                writeln!(report, "{SENT_LINE}")?;
            } else {
                let mut failure_labels = self.labels.clone();
                failure_labels.push(("exit_code".to_string(), outcome.code().to_string()));
                counter!("request_failure", &failure_labels).increment(1);
                writeln!(report, "{FAILED_LINE}")?;
            }
        }

        let attempts = u64::from(self.iterations);
        writeln!(
            report,
            "Successfully sent {successes} out of {attempts} messages."
        )?;
        info!(successes, attempts, "run complete");

        Ok(Report {
            attempts,
            successes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use bytes::Bytes;
    use logblast_payload::{Config, LogBatch, OtlpJsonLogs};
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::SmallRng};

    use super::{Driver, Error, FAILED_LINE, Report, SENT_LINE};
    use crate::transport::{self, Outcome, Transport};

    /// Returns exit code 1 on every `fail_every`th call, 0 otherwise, and
    /// keeps every body it was handed.
    #[derive(Debug, Default)]
    struct Scripted {
        fail_every: Option<u64>,
        calls: u64,
        bodies: VecDeque<Bytes>,
    }

    impl Transport for Scripted {
        async fn send(&mut self, body: Bytes) -> Result<Outcome, transport::Error> {
            self.calls += 1;
            self.bodies.push_back(body);
            let fail = self
                .fail_every
                .is_some_and(|every| self.calls % every == 0);
            Ok(Outcome::from_code(i32::from(fail)))
        }
    }

    /// Errors on the second call.
    #[derive(Debug, Default)]
    struct Broken {
        calls: u64,
    }

    impl Transport for Broken {
        async fn send(&mut self, _body: Bytes) -> Result<Outcome, transport::Error> {
            self.calls += 1;
            if self.calls == 2 {
                return Err(transport::Error::Wait(std::io::Error::other("gone")));
            }
            Ok(Outcome::SUCCESS)
        }
    }

    fn small_payload() -> OtlpJsonLogs {
        OtlpJsonLogs::new(Config {
            body_size: 0,
            ..Config::default()
        })
    }

    fn lines(report: &[u8]) -> Vec<&str> {
        std::str::from_utf8(report)
            .expect("report is not utf8")
            .lines()
            .collect()
    }

    #[tokio::test]
    async fn all_sends_succeed() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut driver = Driver::new(small_payload(), Scripted::default(), 1000);
        let mut report = Vec::new();

        let result = driver.run(&mut rng, &mut report).await.expect("run failed");
        assert_eq!(
            result,
            Report {
                attempts: 1000,
                successes: 1000
            }
        );

        let lines = lines(&report);
        assert_eq!(lines.len(), 1001);
        assert!(lines[..1000].iter().all(|l| *l == SENT_LINE));
        assert!(!lines.contains(&FAILED_LINE));
        assert_eq!(lines[1000], "Successfully sent 1000 out of 1000 messages.");
    }

    #[tokio::test]
    async fn every_third_send_fails() {
        let mut rng = SmallRng::seed_from_u64(0);
        let transport = Scripted {
            fail_every: Some(3),
            ..Scripted::default()
        };
        let mut driver = Driver::new(small_payload(), transport, 1000);
        let mut report = Vec::new();

        let result = driver.run(&mut rng, &mut report).await.expect("run failed");
        assert_eq!(result.successes, 1000 - 1000 / 3);
        assert_eq!(result.failures(), 333);

        let lines = lines(&report);
        assert_eq!(lines.iter().filter(|l| **l == FAILED_LINE).count(), 333);
        assert_eq!(lines[2], FAILED_LINE);
        assert_eq!(lines[1000], "Successfully sent 667 out of 1000 messages.");
    }

    #[tokio::test]
    async fn every_send_carries_a_fresh_full_size_batch() {
        let mut rng = SmallRng::seed_from_u64(3);
        let payload = OtlpJsonLogs::new(Config::default());
        let mut driver = Driver::new(payload, Scripted::default(), 3);
        let mut report = Vec::new();
        driver.run(&mut rng, &mut report).await.expect("run failed");

        let transport = driver.into_transport();
        let batches: Vec<LogBatch> = transport
            .bodies
            .iter()
            .map(|b| serde_json::from_slice(b).expect("body is not a log batch"))
            .collect();
        assert_eq!(batches.len(), 3);

        let bodies: Vec<&str> = batches
            .iter()
            .map(|b| {
                b.resource_logs[0].scope_logs[0].log_records[0]
                    .body
                    .string_value
                    .as_str()
            })
            .collect();
        assert!(bodies.iter().all(|b| b.len() == 20_000));
        assert_ne!(bodies[0], bodies[1]);
        assert_ne!(bodies[1], bodies[2]);
    }

    #[tokio::test]
    async fn transport_error_stops_the_run() {
        let mut rng = SmallRng::seed_from_u64(0);
        let mut driver = Driver::new(small_payload(), Broken::default(), 10);
        let mut report = Vec::new();

        let result = driver.run(&mut rng, &mut report).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(lines(&report), [SENT_LINE]);
        assert_eq!(driver.into_transport().calls, 2);
    }

    #[test]
    fn counters_track_outcomes() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("could not build runtime");

        let result = metrics::with_local_recorder(&recorder, || {
            let mut rng = SmallRng::seed_from_u64(0);
            let transport = Scripted {
                fail_every: Some(2),
                ..Scripted::default()
            };
            let mut driver = Driver::new(small_payload(), transport, 10);
            let mut report = Vec::new();
            runtime.block_on(driver.run(&mut rng, &mut report))
        })
        .expect("run failed");
        assert_eq!(result.successes, 5);

        let snapshot = snapshotter.snapshot().into_vec();
        let total = |name: &str| -> u64 {
            snapshot
                .iter()
                .filter(|(key, _, _, _)| key.key().name() == name)
                .map(|(_, _, _, value)| match value {
                    DebugValue::Counter(v) => *v,
                    _ => 0,
                })
                .sum()
        };
        assert_eq!(total("requests_sent"), 10);
        assert_eq!(total("request_ok"), 5);
        assert_eq!(total("request_failure"), 5);
        assert_eq!(total("data_points_transmitted"), 5);
    }

    // The tally and the report lines must agree with the outcomes the
    // transport handed back, whatever the failure pattern.
    proptest! {
        #[test]
        fn tally_matches_outcomes(fail_every in 1u64..8, iterations in 1u32..64, seed in any::<u64>()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("could not build runtime");
            let mut rng = SmallRng::seed_from_u64(seed);
            let transport = Scripted {
                fail_every: Some(fail_every),
                ..Scripted::default()
            };
            let mut driver = Driver::new(small_payload(), transport, iterations);
            let mut report = Vec::new();
            let result = runtime
                .block_on(driver.run(&mut rng, &mut report))
                .expect("run failed");

            let expected = u64::from(iterations) - u64::from(iterations) / fail_every;
            prop_assert_eq!(result.attempts, u64::from(iterations));
            prop_assert_eq!(result.successes, expected);

            let lines = lines(&report);
            prop_assert_eq!(lines.len(), iterations as usize + 1);
            let sent = lines.iter().filter(|l| **l == SENT_LINE).count();
            prop_assert_eq!(sent as u64, expected);
            let summary = format!("Successfully sent {expected} out of {iterations} messages.");
            prop_assert_eq!(lines[iterations as usize], summary.as_str());
        }
    }
}
