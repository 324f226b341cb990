//! Host log bridge
//!
//! Chat logs are handed to the mobile app through [`LogCallback`] so they
//! land in os_log on iOS and Logcat on Android next to the app's own lines.

use std::sync::{Arc, OnceLock, RwLock};

use log::{Level, Log, Metadata, Record, SetLoggerError};

use super::types::{FfiLogLevel, LogCallback};

static BRIDGE: OnceLock<HostBridge> = OnceLock::new();

/// Where records go and how verbose they may be
struct Sink {
    callback: Option<Arc<dyn LogCallback>>,
    max_level: Level,
}

struct HostBridge {
    sink: RwLock<Sink>,
}

impl HostBridge {
    /// Callback for a record at `level`, if one is set and the level passes
    fn target_for(&self, level: Level) -> Option<Arc<dyn LogCallback>> {
        let sink = self.sink.read().ok()?;
        if level > sink.max_level {
            return None;
        }
        sink.callback.clone()
    }

    fn configure(&self, f: impl FnOnce(&mut Sink)) {
        if let Ok(mut sink) = self.sink.write() {
            f(&mut sink);
        }
    }
}

impl Log for HostBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.target_for(metadata.level()).is_some()
    }

    fn log(&self, record: &Record) {
        // The lock is released before calling out, so the host may
        // reconfigure logging from inside `on_log`
        let Some(callback) = self.target_for(record.level()) else {
            return;
        };
        callback.on_log(
            FfiLogLevel::from(record.level()),
            record.target().to_string(),
            record.args().to_string(),
        );
    }

    fn flush(&self) {}
}

/// Make the host bridge the process-wide `log` backend
///
/// Errors when a logger is already installed, as in the `souk` CLI which
/// uses env_logger. Nothing is forwarded before [`set_log_callback`].
pub fn init_ffi_logger(max_level: Level) -> Result<(), SetLoggerError> {
    let bridge = BRIDGE.get_or_init(|| HostBridge {
        sink: RwLock::new(Sink {
            callback: None,
            max_level,
        }),
    });
    log::set_logger(bridge)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}

/// Point the bridge at a new host callback, or mute it with `None`
pub fn set_log_callback(callback: Option<Arc<dyn LogCallback>>) {
    if let Some(bridge) = BRIDGE.get() {
        bridge.configure(|sink| sink.callback = callback);
    }
}

pub fn set_log_level(level: Level) {
    if let Some(bridge) = BRIDGE.get() {
        bridge.configure(|sink| sink.max_level = level);
        log::set_max_level(level.to_level_filter());
    }
}
