use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

static LOG_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Sets the file every line is appended to. Only the first call wins;
/// `None` keeps logging on stdout only. Without a call, `train.log` is used.
pub fn init(path: Option<PathBuf>) {
    LOG_PATH.get_or_init(|| path);
}

fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get_or_init(|| Some(PathBuf::from("train.log"))).as_ref()
}

fn write_line(line: &str) {
    print!("{line}");
    if let Some(path) = log_path() {
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
            // a failed write must not stop training
            let _ = f.write_all(line.as_bytes());
        }
    }
}

fn format_line(level: &str, msg: &str) -> String {
    format!("[{}] {}: {}\n", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"), level, msg)
}

pub fn info(msg: &str) { write_line(&format_line("INFO", msg)); }
pub fn warn(msg: &str) { write_line(&format_line("WARN", msg)); }
pub fn error(msg: &str) { write_line(&format_line("ERROR", msg)); }

/// Metric line: `SCALAR step=<..> name=<..> value=<..>`, easy to grep.
pub fn scalar(step: u64, name: &str, value: f32) {
    write_line(&format_line("SCALAR", &format!("step={} name={} value={:.6}", step, name, value)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let line = format_line("WARN", "replay empty");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] WARN: replay empty\n"));
    }
}
