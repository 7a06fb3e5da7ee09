use crate::keybox::Record;
use serde_json::{Value, json};

/// One line per record for `list`/`find`: `index\tsite\tuser\turl\ttags`.
/// Passwords are never shown in a summary row.
pub fn record_summary_text(index: usize, record: &Record) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        index,
        record.get("site"),
        record.get("user"),
        record.get("url"),
        record.get("tags"),
    )
}

pub fn record_summary_json(index: usize, record: &Record) -> Value {
    json!({
        "index": index,
        "site": record.get("site"),
        "user": record.get("user"),
        "url": record.get("url"),
        "tags": record.get("tags"),
        "mtime": record.get("mtime"),
    })
}

/// Full single-record view for `get`. `revealed_password` is `Some` only
/// when the caller decrypted it (i.e. `--reveal` was given).
pub fn record_text(index: usize, record: &Record, revealed_password: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str(&format!("index:\t{index}\n"));
    out.push_str(&format!("site:\t{}\n", record.get("site")));
    out.push_str(&format!("user:\t{}\n", record.get("user")));
    out.push_str(&format!("url:\t{}\n", record.get("url")));
    out.push_str(&format!("tags:\t{}\n", record.get("tags")));
    out.push_str(&format!("note:\t{}\n", record.get("note")));
    out.push_str(&format!(
        "password:\t{}\n",
        revealed_password.unwrap_or("[redacted]")
    ));
    out.push_str(&format!("mtime:\t{}", record.get("mtime")));
    out
}

pub fn record_json(index: usize, record: &Record, revealed_password: Option<&str>) -> Value {
    json!({
        "index": index,
        "site": record.get("site"),
        "user": record.get("user"),
        "url": record.get("url"),
        "tags": record.get("tags"),
        "note": record.get("note"),
        "password": revealed_password,
        "mtime": record.get("mtime"),
    })
}
