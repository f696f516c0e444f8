use log::kv::{self, Key, Value, Visitor};
use log::{Log, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;

// --- Thread-local intent ID storage ---

thread_local! {
    static CURRENT_INTENT_ID: RefCell<Option<String>> = RefCell::new(None);
}

/// Sets the current intent ID for the calling thread. Every log record
/// emitted while an intent runs carries its id.
pub fn set_current_intent_id(intent_id: String) {
    CURRENT_INTENT_ID.with(|id_cell| {
        *id_cell.borrow_mut() = Some(intent_id);
    });
}

/// Clears the current intent ID for the calling thread.
pub fn clear_current_intent_id() {
    CURRENT_INTENT_ID.with(|id_cell| {
        *id_cell.borrow_mut() = None;
    });
}

// --- Log Record Structure for JSON output ---

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLogRecord {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    pub intent_id: Option<String>,
    pub name: String,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

struct JsonLogger;

/// Helper to collect key-value pairs from `log::kv::Source`
struct KeyValueCollector<'a>(&'a mut HashMap<String, serde_json::Value>);

impl<'a> Visitor<'a> for KeyValueCollector<'a> {
    fn visit_pair(&mut self, key: Key<'a>, value: Value<'a>) -> Result<(), kv::Error> {
        self.0
            .insert(key.as_str().to_string(), json!(value.to_string()));
        Ok(())
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let intent_id = CURRENT_INTENT_ID.with(|id_cell| id_cell.borrow().clone());

        let mut extra_fields = HashMap::new();
        let mut collector = KeyValueCollector(&mut extra_fields);
        if let Err(e) = record.key_values().visit(&mut collector) {
            eprintln!("Error visiting key-value pairs: {:?}", e);
        }

        let log_record = JsonLogRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: record.level().to_string(),
            message: format!("{}", record.args()),
            intent_id,
            name: record.target().to_string(),
            module_path: record.module_path().map(|s| s.to_string()),
            file: record.file().map(|s| s.to_string()),
            line: record.line(),
            extra: extra_fields,
        };

        match serde_json::to_string(&log_record) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Failed to serialize log record: {}", e),
        }
    }

    fn flush(&self) {}
}

static LOGGER: JsonLogger = JsonLogger;
static INIT_LOGGER_ONCE: OnceCell<()> = OnceCell::new();

/// Initializes the JSON logger. Call once at process start.
pub fn init_logger() -> Result<(), SetLoggerError> {
    INIT_LOGGER_ONCE
        .get_or_try_init(|| {
            log::set_logger(&LOGGER)?;
            log::set_max_level(log::LevelFilter::Info);
            Ok(())
        })
        .map(|_| ())
}

/// Logs one phase transition of an intent run.
pub fn log_phase(intent_label: &str, phase: &str, detail: &str) {
    log::info!(
        target: "engine",
        intent = intent_label,
        phase = phase;
        "{}",
        detail
    );
}

/// Logs the outcome an intent resolved to.
pub fn log_outcome(intent_label: &str, outcome: &crate::contracts::Outcome) {
    let payload = serde_json::to_string(outcome).unwrap_or_default();
    log::info!(
        target: "engine",
        intent = intent_label,
        outcome = payload.as_str();
        "Intent finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::info;

    #[test]
    fn test_logger_functionality() {
        let _ = init_logger();

        set_current_intent_id("select_variant:color=red#1".to_string());
        info!(target: "engine", "search started");
        log_phase("select_variant:color=red", "overlay", "phase 1 entered");
        clear_current_intent_id();
        info!(target: "engine", "this record has no intent_id");
    }
}
