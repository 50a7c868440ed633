//! Coarse syntactic validation for mail addresses and HELO/EHLO arguments.

use std::net::IpAddr;

use crate::config::Config;

/// Chars allowed in a HELO/EHLO string.
const HELO_CHARS: &str = "[]0123456789.-abcdefghijklmnopqrstuvwxyz_";

/// Trims, maps control chars and tabs to spaces, collapses runs of spaces.
pub fn clean_string(input: &str) -> String {
    let mapped: String = input
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c.is_control() { ' ' } else { c })
        .collect();

    let mut result = String::with_capacity(mapped.len());
    let mut last_was_space = false;
    for c in mapped.chars() {
        if c == ' ' {
            if !last_was_space {
                result.push(c);
            }
            last_was_space = true;
        } else {
            result.push(c);
            last_was_space = false;
        }
    }
    result.trim().to_string()
}

/// Coarse checks on an email address; on success yields (mailbox, domain),
/// both lowercased. Angle brackets are stripped, the domain must be dotted
/// with a TLD of at least two chars and no label starting with a hyphen.
pub fn check_mail_addr(mail_addr: &str) -> Option<(String, String)> {
    let mut email = clean_string(mail_addr).to_lowercase();

    if email.is_empty() || !email.contains('@') || !email.contains('.') {
        return None;
    }

    // if starting with a "<" must end with a ">"
    if email.starts_with('<') {
        if !email.ends_with('>') {
            return None;
        }
        email = clean_string(&email.replace(['<', '>'], " "));
        if email.is_empty() {
            return None;
        }
    }

    if email.contains(' ') {
        return None;
    }

    // the "@" must be unique
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return None;
    }
    let mailbox = clean_string(parts[0]);
    let domain = clean_string(parts[1]);
    if mailbox.is_empty() || domain.is_empty() {
        return None;
    }

    // formally check the domain (and TLD)
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return None;
    }
    for label in &labels {
        if label.is_empty() || label.starts_with('-') {
            return None;
        }
    }
    if labels[labels.len() - 1].len() < 2 {
        return None;
    }

    Some((mailbox, domain))
}

/// Coarse checks on the HELO/EHLO string.
pub fn check_helo(helo: &str, cfg: &Config) -> bool {
    if helo.is_empty() {
        return false;
    }

    let lowered = helo.to_lowercase();

    // can't start with a dot or hyphen
    if lowered.starts_with('.') || lowered.starts_with('-') {
        return false;
    }

    // must contain at least a dot (domain form), unless relaxed
    if !cfg.relaxed_helo && !lowered.contains('.') {
        return false;
    }

    // can only contain valid chars
    if lowered.chars().any(|c| !HELO_CHARS.contains(c)) {
        return false;
    }

    if lowered.starts_with('[') {
        // bracket must match and the enclosed string must be a valid IP literal
        if !lowered.ends_with(']') {
            return false;
        }
        let ip = lowered.trim_start_matches('[').trim_end_matches(']').trim();
        if ip.parse::<IpAddr>().is_err() {
            return false;
        }
    } else if !cfg.relaxed_helo {
        // run the non-bracketed form through the address checks
        if check_mail_addr(&format!("postmaster@{}", lowered)).is_none() {
            return false;
        }
    }

    true
}

/// Rejects trivial self-spoofing: localhost, our own host name, a loopback
/// literal, or our own listen address in bracket form.
pub fn is_spoofed_helo(helo: &str, cfg: &Config) -> bool {
    let lowered = helo.to_lowercase();
    lowered == "localhost"
        || lowered == cfg.host_name
        || lowered.starts_with("[127.")
        || lowered == format!("[{}]", cfg.listen_address)
}
