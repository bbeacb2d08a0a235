//! # Audit Shipper Entry Point
//!
//! Reads auditd-format records from stdin, coalesces them per event id, and
//! ships the assembled events to the configured downstream socket with
//! cursor-tracked, at-least-once delivery.
//!
//! ## Pipeline
//! - **Accumulator:** stitches multi-record events (EXECVE fragments included)
//!   before they reach the queue.
//! - **Queue:** bounded staging area addressed by cursors.
//! - **Output:** connection-managed sender with optional per-event
//!   acknowledgements and a persisted resume cursor.
//!
//! ## Shutdown
//! EOF on stdin flushes the half-assembled events and stops the workers in
//! order; the final cursor write happens in the output's stop path.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};

use audit_shipper::collect::{RawEventAccumulator, RawEventRecord};
use audit_shipper::event::EventBuilder;
use audit_shipper::output::Output;
use audit_shipper::queue::{DEFAULT_QUEUE_SIZE, EventQueue, Queue};
use audit_shipper::utils::config::ShipperConfig;
use audit_shipper::utils::metrics::IngestMetrics;
use audit_shipper::utils::worker::{Runnable, Worker, WorkerCtl};

const DEFAULT_CONFIG_PATH: &str = "audit-shipper.toml";
const DEFAULT_CURSOR_PATH: &str = "audit-shipper.cursor";
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 250;
const DEFAULT_FLUSH_IDLE_MS: u64 = 500;
// Roughly every 30 seconds at the default flush interval.
const METRICS_REPORT_TICKS: u64 = 120;

/// Periodic flush of half-assembled events that will never see their EOE.
struct FlushTicker {
    accumulator: Arc<RawEventAccumulator>,
    metrics: Arc<IngestMetrics>,
    interval_ms: u64,
    idle_ms: u64,
}

impl Runnable for FlushTicker {
    fn run(&self, ctl: &WorkerCtl) {
        let mut ticks = 0u64;
        while !ctl.sleep(self.interval_ms) {
            if let Err(e) = self.accumulator.flush(self.idle_ms as i64) {
                error!("flush failed: {e}");
            }
            ticks += 1;
            if ticks % METRICS_REPORT_TICKS == 0 {
                self.metrics.log_totals();
            }
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match ShipperConfig::load(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let queue = Arc::new(Queue::new(config.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE)));
    let cursor_file = config
        .cursor_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CURSOR_PATH));

    let output = Arc::new(Output::new("output", queue.clone(), cursor_file));
    if let Err(e) = output.load(&config.output) {
        error!("Output(output): {e}");
        return ExitCode::FAILURE;
    }
    let output_worker = Worker::new(output.clone());
    output_worker.start();

    let metrics = Arc::new(IngestMetrics::new());
    let builder = EventBuilder::new(Box::new(EventQueue::new(queue.clone())));
    let accumulator = Arc::new(RawEventAccumulator::new(
        builder,
        config.accumulator.limits(),
        metrics.clone(),
    ));

    let flush_worker = Worker::new(Arc::new(FlushTicker {
        accumulator: accumulator.clone(),
        metrics: metrics.clone(),
        interval_ms: config
            .accumulator
            .flush_interval_ms
            .unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
        idle_ms: config
            .accumulator
            .flush_idle_ms
            .unwrap_or(DEFAULT_FLUSH_IDLE_MS),
    }));
    flush_worker.start();

    info!("audit shipper started, reading records from stdin");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("stdin read failed: {e}");
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        match RawEventRecord::parse(&line) {
            Some(record) => {
                if let Err(e) = accumulator.add_record(record) {
                    error!("failed to accumulate record: {e}");
                }
            }
            None => warn!("ignoring unparseable record: {line}"),
        }
    }

    info!("input closed, shutting down");
    if let Err(e) = accumulator.flush(0) {
        error!("final flush failed: {e}");
    }
    flush_worker.stop();
    metrics.log_totals();
    output_worker.stop();
    ExitCode::SUCCESS
}
