use super::*;
use crate::log::{LogEntry, LogSeverity, Logger};
use serial_test::serial;
use std::sync::{Arc, Mutex};

/// Logger that captures entries into a shared vector for assertions.
struct CaptureLogger {
    entries: Arc<Mutex<Vec<(LogSeverity, String, String)>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push((
            entry.severity,
            entry.source.clone(),
            entry.message.clone(),
        ));
    }
}

// ============================================================================
// Logger replacement
// ============================================================================

#[test]
#[serial]
fn test_set_logger_captures_messages() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: Arc::clone(&entries) });

    Engine::log(LogSeverity::Info, "nova3d::Test", "hello".to_string());

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0, LogSeverity::Info);
    assert_eq!(captured[0].1, "nova3d::Test");
    assert_eq!(captured[0].2, "hello");
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_log_detailed_carries_severity() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: Arc::clone(&entries) });

    Engine::log_detailed(
        LogSeverity::Error,
        "nova3d::Test",
        "boom".to_string(),
        file!(),
        line!(),
    );

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0, LogSeverity::Error);
    drop(captured);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_macros_route_through_engine() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: Arc::clone(&entries) });

    crate::engine_info!("nova3d::Test", "count = {}", 3);
    crate::engine_warn!("nova3d::Test", "slow frame");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].2, "count = 3");
    assert_eq!(captured[1].0, LogSeverity::Warn);
    drop(captured);

    Engine::reset_logger();
}
