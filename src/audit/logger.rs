/*!
 * Audit Logger
 * Level-filtered event emission, synchronous or through a bounded queue
 * drained by a dedicated worker
 *
 * The interception path never blocks on the queue: when it is full the event
 * is written synchronously instead and counted as dropped-from-queue.
 */

use super::event::{AuditEvent, AuditLevel, AuditOutcome};
use super::metrics::{AuditMetrics, AuditStats};
use crate::core::limits::DEFAULT_AUDIT_BUFFER_SIZE;
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

/// User hook invoked with each event before emission (e.g. SIEM forwarding).
/// Must not block when the logger runs in async mode.
pub type AuditHandler = Arc<dyn Fn(&AuditEvent) + Send + Sync>;

/// Audit pipeline configuration
pub struct AuditConfig {
    pub enabled: bool,
    /// Destination for serialized events; stdout when unset
    pub sink: Option<Box<dyn Write + Send>>,
    pub level: AuditLevel,
    /// Emit through a background worker instead of on the caller's thread
    pub async_mode: bool,
    /// Async queue capacity; events beyond it are written synchronously
    pub buffer_size: usize,
    pub handler: Option<AuditHandler>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sink: None,
            level: AuditLevel::All,
            async_mode: false,
            buffer_size: DEFAULT_AUDIT_BUFFER_SIZE,
            handler: None,
        }
    }
}

impl std::fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditConfig")
            .field("enabled", &self.enabled)
            .field("level", &self.level)
            .field("async_mode", &self.async_mode)
            .field("buffer_size", &self.buffer_size)
            .field("has_sink", &self.sink.is_some())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Accepts audit events, filters them by level, and emits newline-delimited
/// JSON to the configured sink.
pub struct AuditLogger {
    level: AuditLevel,
    sink: SharedSink,
    metrics: Arc<AuditMetrics>,
    handler: Option<AuditHandler>,
    /// Present while the async worker is accepting events
    queue: Mutex<Option<flume::Sender<AuditEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditLogger {
    pub fn new(config: AuditConfig) -> Self {
        let level = if config.enabled {
            config.level
        } else {
            AuditLevel::None
        };

        let sink: SharedSink = Arc::new(Mutex::new(
            config.sink.unwrap_or_else(|| Box::new(std::io::stdout())),
        ));

        let mut logger = Self {
            level,
            sink: Arc::clone(&sink),
            metrics: Arc::new(AuditMetrics::new()),
            handler: config.handler,
            queue: Mutex::new(None),
            worker: Mutex::new(None),
        };

        if config.enabled && config.async_mode {
            let capacity = if config.buffer_size == 0 {
                DEFAULT_AUDIT_BUFFER_SIZE
            } else {
                config.buffer_size
            };
            let (sender, receiver) = flume::bounded::<AuditEvent>(capacity);

            let worker_sink = Arc::clone(&sink);
            let handle = std::thread::Builder::new()
                .name("wardenfs-audit".into())
                .spawn(move || {
                    // Blocks until every sender is gone, draining what remains
                    for event in receiver.iter() {
                        write_event(&worker_sink, &event);
                    }
                    debug!("audit worker drained and stopped");
                })
                .expect("failed to spawn audit worker thread");

            *logger.queue.get_mut() = Some(sender);
            *logger.worker.get_mut() = Some(handle);
        }

        logger
    }

    /// Logger that drops everything (auditing disabled)
    pub fn disabled() -> Self {
        Self::new(AuditConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Accept one event: filter, aggregate, hand to the user handler, emit.
    pub fn log(&self, event: AuditEvent) {
        if self.level == AuditLevel::None {
            return;
        }
        if self.level == AuditLevel::Denied && event.result != AuditOutcome::Denied {
            return;
        }

        self.metrics.record(&event);

        if let Some(handler) = &self.handler {
            // A panicking handler must never take down the check
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!("audit handler panicked; event still emitted");
            }
        }

        let queue = self.queue.lock();
        match queue.as_ref() {
            Some(sender) => match sender.try_send(event) {
                Ok(()) => {}
                Err(flume::TrySendError::Full(event)) => {
                    // Queue saturated: emit on the caller's thread instead
                    write_event(&self.sink, &event);
                    self.metrics.record_dropped();
                }
                Err(flume::TrySendError::Disconnected(event)) => {
                    write_event(&self.sink, &event);
                }
            },
            None => write_event(&self.sink, &event),
        }
    }

    /// Stop the worker, drain the queue, and flush the sink. Idempotent.
    pub fn close(&self) {
        // Dropping the sender lets the worker drain remaining events and exit
        if let Some(sender) = self.queue.lock().take() {
            drop(sender);
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("audit worker terminated abnormally");
            }
        }
        if let Err(err) = self.sink.lock().flush() {
            error!("audit sink flush failed: {err}");
        }
    }

    pub fn metrics(&self) -> &Arc<AuditMetrics> {
        &self.metrics
    }

    pub fn stats(&self) -> AuditStats {
        self.metrics.stats()
    }

    pub fn level(&self) -> AuditLevel {
        self.level
    }
}

impl Drop for AuditLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Serialize and write one event as a JSON line.
///
/// Failures are reported through the log facade and never propagate to the
/// caller; the worker keeps running after a write failure.
fn write_event(sink: &SharedSink, event: &AuditEvent) {
    let line = match serde_json::to_string(event) {
        Ok(line) => line,
        Err(err) => {
            error!("audit event serialization failed: {err}");
            return;
        }
    };

    let mut sink = sink.lock();
    if let Err(err) = sink
        .write_all(line.as_bytes())
        .and_then(|()| sink.write_all(b"\n"))
    {
        error!("audit sink write failed: {err}");
    }
}
