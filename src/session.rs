//! Per-connection session state.

use chrono::{DateTime, Utc};

use crate::abuse::DnsListing;
use crate::commands::CmdId;

pub struct Session {
    // identity
    pub sess_count: u64,
    pub session_id: String,
    pub client_ip: String,
    pub start_date: DateTime<Utc>,

    // protocol state
    pub last_cmd: CmdId,
    pub helo: Option<String>,
    pub mail_from: Option<String>,
    pub rcpt_to: Vec<String>,

    // workareas, populated by the last address validation
    pub mail_box: Option<String>,
    pub mail_dom: Option<String>,

    // counters
    pub msg_count: u64,
    pub noop_count: u32,
    pub err_count: u32,
    pub vrfy_count: u32,

    // abuse detection
    pub dns_listing: Option<DnsListing>,
    pub early_talker: bool,

    // message file reference (set by storage)
    pub msg_file: Option<String>,

    // dedup guard for the session log
    last_logged: Option<u64>,
}

impl Session {
    pub fn new(sess_count: u64, session_id: String, client_ip: String) -> Self {
        Self {
            sess_count,
            session_id,
            client_ip,
            start_date: Utc::now(),
            last_cmd: CmdId::Invalid,
            helo: None,
            mail_from: None,
            rcpt_to: Vec::new(),
            mail_box: None,
            mail_dom: None,
            msg_count: 0,
            noop_count: 0,
            err_count: 0,
            vrfy_count: 0,
            dns_listing: None,
            early_talker: false,
            msg_file: None,
            last_logged: None,
        }
    }

    /// Clears the per-message state; HELO, identity and the cumulative
    /// message count survive a reset.
    pub fn reset(&mut self) {
        self.mail_from = None;
        self.rcpt_to = Vec::new();
        self.msg_file = None;
        self.noop_count = 0;
        self.err_count = 0;
        self.vrfy_count = 0;
    }

    /// True until a record for the current message count has been written.
    pub fn needs_log(&self) -> bool {
        self.last_logged != Some(self.msg_count)
    }

    pub fn mark_logged(&mut self) {
        self.last_logged = Some(self.msg_count);
    }

    /// Builds the pipe-delimited session record; fixed column order.
    pub fn log_record(&self) -> String {
        let mut cols: Vec<String> = Vec::with_capacity(17);

        cols.push(Utc::now().format("%Y-%m-%d %H:%M:%SZ").to_string());
        cols.push(self.start_date.format("%Y-%m-%d %H:%M:%SZ").to_string());
        cols.push(self.session_id.clone());
        cols.push(self.client_ip.clone());
        cols.push(self.helo.clone().unwrap_or_else(|| "-no-helo-".to_string()));
        cols.push(self.mail_from.clone().unwrap_or_else(|| "-no-from-".to_string()));

        if self.rcpt_to.is_empty() {
            cols.push("0".to_string());
            cols.push("-no-rcpt-".to_string());
        } else {
            cols.push(self.rcpt_to.len().to_string());
            cols.push(self.rcpt_to.join(","));
        }

        cols.push(self.msg_count.to_string());
        cols.push(self.msg_file.clone().unwrap_or_else(|| "-no-file-".to_string()));

        match &self.dns_listing {
            Some(listing) => {
                cols.push(listing.list_type.to_string());
                cols.push(listing.list_name.clone());
                cols.push(listing.list_value.clone());
            }
            None => {
                cols.push("-not-listed-".to_string());
                cols.push("-none-".to_string());
                cols.push("0.0.0.0".to_string());
            }
        }

        cols.push(if self.early_talker { "1" } else { "0" }.to_string());
        cols.push(self.noop_count.to_string());
        cols.push(self.vrfy_count.to_string());
        cols.push(self.err_count.to_string());

        cols.join("|")
    }
}
