// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing setup and in-process metrics.
//!
//! Initialize once at startup:
//!
//! ```rust,ignore
//! use sandpiper::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```
//!
//! Spans and metrics recording are compiled only with the `telemetry`
//! feature. The `release-logs` and `max-perf` features cap log levels at
//! compile time.

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{Histogram, Metrics, MetricsSnapshot, OperationMetrics, ToolMetrics, GLOBAL_METRICS};

/// Bytes of tool output included in debug logs.
pub const LOG_PREVIEW_MAX_BYTES: usize = 200;
