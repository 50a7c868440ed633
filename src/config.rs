//! Command line options and the validated runtime configuration.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use structopt::StructOpt;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "smtp-decoy",
    about = "A decoy SMTP server for testing mail senders and stalling spambots (nolisting)"
)]
pub struct Opt {
    /// Listening address
    #[structopt(short = "a", long = "address", default_value = "127.0.0.1")]
    pub address: String,

    /// Listening port
    #[structopt(short = "p", long = "port", default_value = "25")]
    pub port: u16,

    /// Host name used in the banner and anti-spoof checks
    #[structopt(long = "hostname", default_value = "smtp.local")]
    pub hostname: String,

    /// Receive timeout in milliseconds (0 = no timeout)
    #[structopt(long = "receive-timeout", default_value = "60000")]
    pub receive_timeout: u64,

    /// Terminate sessions with a 4xx temporary failure on/after DATA
    #[structopt(long = "temp-fail")]
    pub temp_fail: bool,

    /// Store received messages to files
    #[structopt(long = "store-data")]
    pub store_data: bool,

    /// Directory for stored messages (default: system temp dir)
    #[structopt(long = "store-path", parse(from_os_str))]
    pub store_path: Option<PathBuf>,

    /// Maximum size of a single message (DATA) in bytes
    #[structopt(long = "max-data-size", default_value = "2097152")]
    pub max_data_size: u64,

    /// Maximum messages per session
    #[structopt(long = "max-messages", default_value = "10")]
    pub max_messages: u64,

    /// Maximum parallel sessions, further connections are rejected
    #[structopt(long = "max-sessions", default_value = "16")]
    pub max_sessions: u64,

    /// Directory for the application and session log files
    #[structopt(long = "log-dir", parse(from_os_str))]
    pub log_dir: Option<PathBuf>,

    /// Verbose mode - trace SMTP commands and replies
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,

    /// Enable early-talker detection
    #[structopt(long = "early-talkers")]
    pub early_talkers: bool,

    /// DNS allow-list (RWL) provider domain (can be specified multiple times)
    #[structopt(long = "allow-list", number_of_values = 1)]
    pub allow_lists: Vec<String>,

    /// DNS deny-list (RBL) provider domain (can be specified multiple times)
    #[structopt(long = "block-list", number_of_values = 1)]
    pub block_lists: Vec<String>,

    /// Maximum SMTP errors per session
    #[structopt(long = "max-errors", default_value = "5")]
    pub max_errors: u32,

    /// Maximum NOOP commands per session
    #[structopt(long = "max-noop", default_value = "7")]
    pub max_noop: u32,

    /// Maximum VRFY/EXPN commands per session
    #[structopt(long = "max-vrfy", default_value = "10")]
    pub max_vrfy: u32,

    /// Maximum RCPT TO per message
    #[structopt(long = "max-rcpt", default_value = "100")]
    pub max_rcpt: usize,

    /// Delay in milliseconds before emitting the banner
    #[structopt(long = "banner-delay", default_value = "0")]
    pub banner_delay: u64,

    /// Per-error tarpit delay in milliseconds
    #[structopt(long = "error-delay", default_value = "0")]
    pub error_delay: u64,

    /// Relaxed HELO checks (no dot required, no domain cross-check)
    #[structopt(long = "relaxed-helo")]
    pub relaxed_helo: bool,

    /// Locally served domain (can be specified multiple times, empty = all)
    #[structopt(long = "domain", number_of_values = 1)]
    pub domains: Vec<String>,

    /// Locally known mailbox, e.g. user@domain.com (can be specified
    /// multiple times, empty = all)
    #[structopt(long = "mailbox", number_of_values = 1)]
    pub mailboxes: Vec<String>,

    /// File with one locally served domain per line (#-lines are comments)
    #[structopt(long = "domains-file", parse(from_os_str))]
    pub domains_file: Option<PathBuf>,

    /// File with one locally known mailbox per line (#-lines are comments)
    #[structopt(long = "mailboxes-file", parse(from_os_str))]
    pub mailboxes_file: Option<PathBuf>,
}

/// Read-only runtime configuration, shared across all sessions.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_address: String,
    pub listen_port: u16,
    pub host_name: String,
    pub receive_timeout: u64,
    pub do_temp_fail: bool,
    pub store_data: bool,
    pub store_path: PathBuf,
    pub max_data_size: usize,
    pub max_messages: u64,
    pub max_sessions: u64,
    pub log_dir: Option<PathBuf>,
    pub verbose: bool,
    pub early_talkers: bool,
    pub allow_lists: Vec<String>,
    pub block_lists: Vec<String>,
    pub max_errors: u32,
    pub max_noop: u32,
    pub max_vrfy: u32,
    pub max_rcpt: usize,
    pub banner_delay: u64,
    pub error_delay: u64,
    pub relaxed_helo: bool,
    pub local_domains: Vec<String>,
    pub local_mailboxes: Vec<String>,
}

impl Config {
    /// Builds the runtime configuration, clamping out-of-range values to
    /// their defaults and loading the optional domain/mailbox list files.
    pub fn from_opt(opt: Opt) -> Result<Self> {
        let mut local_domains = opt.domains;
        if let Some(path) = &opt.domains_file {
            local_domains.extend(load_list_file(path)?);
        }
        let mut local_mailboxes = opt.mailboxes;
        if let Some(path) = &opt.mailboxes_file {
            local_mailboxes.extend(load_list_file(path)?);
        }

        Ok(Self {
            listen_address: opt.address,
            listen_port: opt.port,
            host_name: opt.hostname.to_lowercase(),
            receive_timeout: opt.receive_timeout,
            do_temp_fail: opt.temp_fail,
            store_data: opt.store_data,
            store_path: opt.store_path.unwrap_or_else(std::env::temp_dir),
            max_data_size: opt.max_data_size as usize,
            max_messages: clamp(opt.max_messages, 10),
            max_sessions: clamp(opt.max_sessions, 16),
            log_dir: opt.log_dir,
            verbose: opt.verbose,
            early_talkers: opt.early_talkers,
            allow_lists: opt.allow_lists,
            block_lists: opt.block_lists,
            max_errors: clamp(opt.max_errors, 5),
            max_noop: clamp(opt.max_noop, 7),
            max_vrfy: clamp(opt.max_vrfy, 10),
            max_rcpt: clamp(opt.max_rcpt, 100),
            banner_delay: opt.banner_delay,
            error_delay: opt.error_delay,
            relaxed_helo: opt.relaxed_helo,
            local_domains,
            local_mailboxes,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            listen_port: 0,
            host_name: "decoy.example.com".to_string(),
            receive_timeout: 5000,
            do_temp_fail: false,
            store_data: false,
            store_path: std::env::temp_dir(),
            max_data_size: 2_097_152,
            max_messages: 10,
            max_sessions: 16,
            log_dir: None,
            verbose: false,
            early_talkers: false,
            allow_lists: Vec::new(),
            block_lists: Vec::new(),
            max_errors: 5,
            max_noop: 7,
            max_vrfy: 10,
            max_rcpt: 100,
            banner_delay: 0,
            error_delay: 0,
            relaxed_helo: false,
            local_domains: Vec::new(),
            local_mailboxes: Vec::new(),
        }
    }
}

fn clamp<T: PartialOrd + From<u8>>(value: T, default: T) -> T {
    if value < T::from(1) {
        default
    } else {
        value
    }
}

/// Loads a text file as a string list, skipping empty and #-comment lines.
fn load_list_file(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open list file: {:?}", path))?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Failed to read list file: {:?}", path))?;
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn clamp_falls_back_to_default() {
        assert_eq!(clamp(0u64, 10), 10);
        assert_eq!(clamp(3u64, 10), 3);
    }

    #[test]
    fn list_file_skips_comments() {
        let path = std::env::temp_dir().join("smtp-decoy-test-domains.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "example.com").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "example.net").unwrap();
        drop(file);

        let lines = load_list_file(&path).unwrap();
        assert_eq!(lines, vec!["example.com", "example.net"]);
        let _ = std::fs::remove_file(&path);
    }
}
