//! Logging facility
//!
//! Routes `log` records to a console sink, normally the firmware's UART.
//! Log levels are configured based on build configuration (debug/release).

use core::fmt::Write;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Console the logger writes to
pub type Sink = &'static mut (dyn Write + Send);

/// Global logger instance
pub static LOGGER: Logger = Logger::new();

/// Logger that serializes output to a single sink
pub struct Logger {
    sink: Mutex<Option<Sink>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub const fn new() -> Logger {
        Logger {
            sink: Mutex::new(None),
        }
    }

    /// Replaces the sink; records logged before a sink is attached are dropped
    pub fn attach(&self, sink: Sink) {
        *self.sink.lock() = Some(sink);
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    /// Formats messages as "[LEVEL] message"
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Some(sink) = self.sink.lock().as_mut() {
                // Nowhere to report a failing console
                let _ = writeln!(sink, "[{}] {}", record.level(), record.args());
            }
        }
    }

    fn flush(&self) {}
}

/// Initializes the logging system with `sink` as console
///
/// Debug builds log at `Debug`, release builds at `Info`.
pub fn init(sink: Sink) -> Result<(), SetLoggerError> {
    LOGGER.attach(sink);
    log::set_logger(&LOGGER).map(|()| {
        log::set_max_level(
            #[cfg(debug_assertions)]
            LevelFilter::Debug,
            #[cfg(not(debug_assertions))]
            LevelFilter::Info,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::boxed::Box;
    use std::string::String;
    use std::sync::Arc;

    struct Capture(Arc<Mutex<String>>);

    impl Write for Capture {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            self.0.lock().push_str(s);
            Ok(())
        }
    }

    #[test]
    fn writes_level_and_message() {
        let out = Arc::new(Mutex::new(String::new()));
        let logger = Logger::new();
        log::set_max_level(LevelFilter::Trace);

        logger.log(&Record::builder().args(format_args!("dropped")).level(Level::Warn).build());

        logger.attach(Box::leak(Box::new(Capture(out.clone()))));
        logger.log(
            &Record::builder()
                .args(format_args!("fat16: cluster {} has invalid link", 7))
                .level(Level::Warn)
                .build(),
        );

        assert_eq!(*out.lock(), "[WARN] fat16: cluster 7 has invalid link\n");
    }
}
