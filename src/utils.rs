//! Console/file logging and helpers to keep remote-supplied text from
//! reaching a terminal unfiltered.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Datelike, Local, Utc};
use tokio::sync::Mutex;

/// Keeps only printable ASCII and common whitespace.
pub fn filter_printable_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            c.is_ascii_graphic() || c.is_ascii_whitespace() || *c == '\n' || *c == '\r' || *c == '\t'
        })
        .collect()
}

/// Turns non-printable characters into escape sequences.
pub fn safe_log_string(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\0' => result.push_str("\\0"),
            '\x01'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f' | '\x7f' => {
                result.push_str(&format!("\\x{:02x}", c as u32));
            }
            _ if c.is_ascii_graphic() || c.is_ascii_whitespace() || c == '\n' || c == '\r' => {
                result.push(c);
            }
            _ => {
                result.push_str(&format!("\\u{{{:x}}}", c as u32));
            }
        }
    }
    result
}

/// Two independent append-only streams: the application/trace log and the
/// per-message session log. Each has its own lock so concurrent sessions
/// never interleave partial lines. Files are monthly and rolled by year.
pub struct Logger {
    verbose: bool,
    log_dir: Option<PathBuf>,
    app_lock: Mutex<()>,
    sess_lock: Mutex<()>,
}

impl Logger {
    pub fn new(log_dir: Option<PathBuf>, verbose: bool) -> Result<Self> {
        if let Some(dir) = &log_dir {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(Self {
            verbose,
            log_dir,
            app_lock: Mutex::new(()),
            sess_lock: Mutex::new(()),
        })
    }

    /// Writes a message to the console and to the application log file.
    pub async fn message(&self, msg: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        println!("{} {}", timestamp, filter_printable_chars(msg));

        if let Some(dir) = &self.log_dir {
            let _guard = self.app_lock.lock().await;
            let file = dir.join(format!("smtpdecoy-{}.log", Utc::now().format("%m")));
            let line = format!("{} {}", Utc::now().format("%Y-%m-%d %H:%M:%S"), msg);
            let _ = append_line(&file, &line);
        }
    }

    /// Command/response trace, only when verbose logging is enabled.
    pub async fn trace(&self, client_ip: &str, session_id: &str, direction: &str, line: &str) {
        if self.verbose {
            self.message(&format!(
                "{}:{} {}: {}",
                client_ip,
                session_id,
                direction,
                safe_log_string(line)
            ))
            .await;
        }
    }

    /// Appends one pipe-delimited record to the session log file.
    pub async fn session_record(&self, record: &str) {
        if let Some(dir) = &self.log_dir {
            let _guard = self.sess_lock.lock().await;
            let file = dir.join(format!("smtpsess-{}.log", Utc::now().format("%m")));
            let _ = append_line(&file, record);
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    roll_file(path);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.flush()
}

// a monthly file left over from a previous year gets deleted, not appended to
fn roll_file(path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        if let Ok(modified) = meta.modified() {
            let modified: DateTime<Local> = modified.into();
            if modified.year() != Local::now().year() {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_filter_drops_controls() {
        assert_eq!(filter_printable_chars("ab\x01c\td"), "abc\td");
    }

    #[test]
    fn safe_log_escapes_controls() {
        assert_eq!(safe_log_string("a\x01b"), "a\\x01b");
        assert_eq!(safe_log_string("a\0b"), "a\\0b");
        assert_eq!(safe_log_string("plain text"), "plain text");
    }
}
