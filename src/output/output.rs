//! Delivery orchestrator: drains the queue, writes to the downstream peer,
//! and advances the persisted cursor as acknowledgements land.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::event::Event;
use crate::queue::{GetResult, MAX_ITEM_SIZE, Queue};
use crate::utils::config::OutputConfig;
use crate::utils::worker::{Runnable, Worker, WorkerCtl};

use super::ack_queue::AckQueue;
use super::ack_reader::AckReader;
use super::cursor_writer::CursorWriter;
use super::filter::{EventFilter, create_event_filter};
use super::format::{EventWriter, RawEventWriter, WriteResult, create_event_writer};
use super::writer::UnixDomainWriter;

pub const DEFAULT_ACK_QUEUE_SIZE: u64 = 1000;
pub const MIN_ACK_TIMEOUT: i64 = 1000;
pub const DEFAULT_ACK_TIMEOUT: i64 = 300_000;
// Reconnect back-off bounds, in seconds.
const START_SLEEP_PERIOD: u64 = 1;
const MAX_SLEEP_PERIOD: u64 = 60;
const QUEUE_POLL_MS: u64 = 100;
const FINAL_ACK_WAIT_MS: u64 = 100;

struct OutputState {
    config: OutputConfig,
    socket_path: String,
    event_writer: Arc<dyn EventWriter>,
    event_filter: Option<Arc<dyn EventFilter>>,
    writer: Arc<UnixDomainWriter>,
    ack_queue: Option<Arc<AckQueue>>,
    ack_mode: bool,
    ack_timeout: i64,
}

pub struct Output {
    name: String,
    queue: Arc<Queue>,
    cursor_writer: Arc<CursorWriter>,
    cursor_worker: Worker,
    ack_worker: Mutex<Option<Worker>>,
    state: Mutex<OutputState>,
}

impl Output {
    pub fn new(name: impl Into<String>, queue: Arc<Queue>, cursor_file: impl Into<PathBuf>) -> Output {
        let name = name.into();
        let cursor_writer = Arc::new(CursorWriter::new(name.clone(), cursor_file));
        let cursor_worker = Worker::new(cursor_writer.clone());
        Output {
            name,
            queue,
            cursor_writer,
            cursor_worker,
            ack_worker: Mutex::new(None),
            state: Mutex::new(OutputState {
                config: OutputConfig::default(),
                socket_path: String::new(),
                event_writer: Arc::new(RawEventWriter),
                event_filter: None,
                writer: Arc::new(UnixDomainWriter::new(String::new())),
                ack_queue: None,
                ack_mode: false,
                ack_timeout: DEFAULT_ACK_TIMEOUT,
            }),
        }
    }

    pub fn cursor_writer(&self) -> &Arc<CursorWriter> {
        &self.cursor_writer
    }

    pub fn is_config_different(&self, config: &OutputConfig) -> bool {
        self.state.lock().config != *config
    }

    /// Validate and apply a config snapshot; state is untouched on error.
    pub fn load(&self, config: &OutputConfig) -> Result<(), String> {
        info!("Output({}): loading config", self.name);

        let format = config
            .output_format
            .clone()
            .unwrap_or_else(|| "raw".to_string());

        // Syslog writes straight to syslog(3); every other format needs the
        // downstream socket.
        let socket_path = if format != "syslog" {
            match &config.output_socket {
                Some(path) => path.clone(),
                None => return Err("missing required parameter: output_socket".to_string()),
            }
        } else {
            String::new()
        };

        let event_writer = create_event_writer(&format)
            .ok_or_else(|| format!("unknown output_format: {format}"))?;
        let event_filter = create_event_filter(&config.filter_record_types)?;

        let ack_mode = config.enable_ack_mode.unwrap_or(false);
        let mut ack_timeout = DEFAULT_ACK_TIMEOUT;
        let mut ack_queue_size = DEFAULT_ACK_QUEUE_SIZE;
        if ack_mode {
            ack_queue_size = config.ack_queue_size.unwrap_or(DEFAULT_ACK_QUEUE_SIZE);
            if ack_queue_size < 1 {
                return Err("invalid ack_queue_size parameter value".to_string());
            }
            ack_timeout = config.ack_timeout.unwrap_or(DEFAULT_ACK_TIMEOUT);
            if ack_timeout == 0 || (ack_timeout > 0 && ack_timeout < MIN_ACK_TIMEOUT) {
                warn!(
                    "Output({}): ack_timeout value too small ({}), using {}",
                    self.name, ack_timeout, MIN_ACK_TIMEOUT
                );
                ack_timeout = MIN_ACK_TIMEOUT;
            }
        }

        let mut state = self.state.lock();
        if socket_path != state.socket_path {
            state.socket_path = socket_path.clone();
            state.writer = Arc::new(UnixDomainWriter::new(socket_path));
        }
        state.event_writer = event_writer;
        state.event_filter = event_filter;
        state.ack_mode = ack_mode;
        if ack_mode {
            state.ack_timeout = ack_timeout;
            let resize = state
                .ack_queue
                .as_ref()
                .is_none_or(|queue| queue.max_size() != ack_queue_size as usize);
            if resize {
                state.ack_queue = Some(Arc::new(AckQueue::new(ack_queue_size as usize)));
            }
        } else {
            state.ack_queue = None;
        }
        state.config = config.clone();
        Ok(())
    }

    /// Remove on-disk resources when the output is decommissioned.
    pub fn delete(&self) -> Result<(), String> {
        self.cursor_writer.delete()?;
        info!("Output({}): removed", self.name);
        Ok(())
    }

    /// Connect with exponential back-off. Returns false when cancelled.
    fn check_open(&self, ctl: &WorkerCtl) -> bool {
        let (writer, socket_path) = {
            let state = self.state.lock();
            (state.writer.clone(), state.socket_path.clone())
        };
        let mut sleep_period = START_SLEEP_PERIOD;
        while !ctl.is_stopping() {
            if writer.is_open() {
                return true;
            }
            info!("Output({}): connecting to {}", self.name, socket_path);
            match writer.open() {
                Ok(()) => {
                    if ctl.is_stopping() {
                        writer.close();
                        return false;
                    }
                    info!("Output({}): connected", self.name);
                    return true;
                }
                Err(e) => {
                    warn!(
                        "Output({}): failed to connect to '{}': {e}",
                        self.name, socket_path
                    );
                }
            }
            info!(
                "Output({}): sleeping {} seconds before re-trying connection",
                self.name, sleep_period
            );
            if ctl.sleep(sleep_period * 1000) {
                return false;
            }
            sleep_period = (sleep_period * 2).min(MAX_SLEEP_PERIOD);
        }
        false
    }

    /// Drain the queue into the open connection until it drops or a stop is
    /// requested. Returns false when the whole output should shut down.
    fn handle_events(&self, ctl: &WorkerCtl, check_open: bool) -> bool {
        let (writer, event_writer, event_filter, ack_queue, ack_timeout) = {
            let state = self.state.lock();
            (
                state.writer.clone(),
                state.event_writer.clone(),
                state.event_filter.clone(),
                if state.ack_mode {
                    state.ack_queue.clone()
                } else {
                    None
                },
                state.ack_timeout,
            )
        };

        let mut buf = vec![0u8; MAX_ITEM_SIZE];
        let mut cursor = self.cursor_writer.get_cursor();
        self.cursor_worker.start();

        if let Some(ack_queue) = &ack_queue {
            let reader = AckReader::new(
                event_writer.clone(),
                writer.clone(),
                ack_queue.clone(),
                self.cursor_writer.clone(),
            );
            let worker = Worker::new(Arc::new(reader));
            worker.start();
            ack_queue.reset();
            *self.ack_worker.lock() = Some(worker);
        }

        while !ctl.is_stopping() && (!check_open || writer.is_open()) {
            let mut result;
            loop {
                result = self
                    .queue
                    .get(cursor, &mut buf, Duration::from_millis(QUEUE_POLL_MS));
                if result != GetResult::Timeout || (check_open && !writer.is_open()) {
                    break;
                }
            }

            match result {
                GetResult::Interrupted | GetResult::Timeout => continue,
                GetResult::BufferTooSmall => {
                    error!(
                        "Output({}): encountered possible corruption in queue, resetting queue",
                        self.name
                    );
                    self.queue.reset();
                    break;
                }
                GetResult::Ok { size, next } => {
                    if (check_open && !writer.is_open()) || ctl.is_stopping() {
                        continue;
                    }
                    let event = match Event::from_bytes(&buf[..size]) {
                        Ok(event) => event,
                        Err(e) => {
                            error!(
                                "Output({}): encountered possible corruption in queue ({e}), resetting queue",
                                self.name
                            );
                            self.queue.reset();
                            break;
                        }
                    };
                    let event_id = event.event_id();
                    let filtered = event_filter
                        .as_ref()
                        .is_some_and(|filter| filter.is_event_filtered(&event));
                    if !filtered {
                        if let Some(ack_queue) = &ack_queue {
                            // Register the ack before sending so the reply
                            // cannot race the registration.
                            if !ack_queue.add(event_id, next, ack_timeout) {
                                if writer.is_open() {
                                    error!("Output({}): timeout waiting for Acks", self.name);
                                }
                                break;
                            }
                        }

                        match event_writer.write_event(&event, writer.as_ref()) {
                            WriteResult::Noop => {
                                if let Some(ack_queue) = &ack_queue {
                                    // Not sent after all: cancel the pending
                                    // ack but keep the progress.
                                    ack_queue.remove(&event_id);
                                    ack_queue.set_auto_cursor(next);
                                }
                            }
                            WriteResult::Ok => {}
                            WriteResult::Err(e) => {
                                debug!("Output({}): event write failed: {e}", self.name);
                                break;
                            }
                        }
                        cursor = next;
                        if ack_queue.is_none() {
                            self.cursor_writer.update_cursor(next);
                        }
                    } else {
                        cursor = next;
                        match &ack_queue {
                            Some(ack_queue) => ack_queue.set_auto_cursor(next),
                            None => self.cursor_writer.update_cursor(next),
                        }
                    }
                }
            }
        }

        if let Some(ack_queue) = &ack_queue {
            // Give in-flight acks a short moment to land.
            ack_queue.wait(FINAL_ACK_WAIT_MS);
        }

        // Close before stopping the ack reader, or its blocking read would
        // hang until the peer closes remotely.
        writer.close();

        if let Some(worker) = self.ack_worker.lock().take() {
            worker.stop();
        }

        if !ctl.is_stopping() {
            info!("Output({}): connection lost", self.name);
        }

        self.cursor_worker.stop();

        !ctl.is_stopping()
    }
}

impl Runnable for Output {
    fn run(&self, ctl: &WorkerCtl) {
        info!("Output({}): started", self.name);

        if let Err(e) = self.cursor_writer.read() {
            error!("Output({}): {e}", self.name);
            error!(
                "Output({}): aborting because cursor file is unreadable",
                self.name
            );
            return;
        }

        // Syslog has no socket to connect; everything else gates on one.
        let check_open = self.state.lock().config.output_socket.is_some();

        while !ctl.is_stopping() {
            while !check_open || self.check_open(ctl) {
                if !self.handle_events(ctl, check_open) {
                    return;
                }
            }
        }
    }

    fn on_stopping(&self) {
        info!("Output({}): stopping", self.name);
        self.queue.interrupt();
        let state = self.state.lock();
        state.writer.close_write();
        if let Some(ack_queue) = &state.ack_queue {
            ack_queue.close();
        }
    }

    fn on_stop(&self) {
        if let Some(worker) = self.ack_worker.lock().take() {
            worker.stop();
        }
        let writer = self.state.lock().writer.clone();
        writer.close();
        self.cursor_worker.stop();
        if let Err(e) = self.cursor_writer.write() {
            error!("Output({}): {e}", self.name);
        }
        info!("Output({}): stopped", self.name);
    }
}
