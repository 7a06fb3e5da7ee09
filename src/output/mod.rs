use serde_json::json;
use std::process::ExitCode;

pub mod record_view;

pub struct OutputMode {
    pub json: bool,
}

/// Print `value` (text mode) or `{"value": ..., "meta": ...}` (`--json`
/// mode), then return success. Callers still decide the process exit code
/// for error paths themselves.
pub fn print_value(value: String, meta: serde_json::Value, output_mode: &OutputMode) -> ExitCode {
    if output_mode.json {
        let payload = json!({
            "value": value,
            "meta": meta,
        });
        println!("{payload}");
    } else {
        println!("{value}");
    }
    ExitCode::SUCCESS
}
