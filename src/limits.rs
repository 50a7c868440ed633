//! Per-session hard limits. Evaluated after every reply in a fixed priority
//! order; the first tripped condition picks the terminal error message.

use crate::config::Config;
use crate::replies;
use crate::session::Session;

pub fn check_hard_limits(session: &Session, cfg: &Config) -> Option<&'static str> {
    if session.msg_count > cfg.max_messages {
        Some(replies::MSG_451_MAX_MESSAGES)
    } else if session.err_count > cfg.max_errors {
        Some(replies::MSG_550_MAX_ERRORS)
    } else if session.vrfy_count > cfg.max_vrfy {
        Some(replies::MSG_451_MAX_VRFY)
    } else if session.noop_count > cfg.max_noop {
        Some(replies::MSG_451_MAX_NOOP)
    } else if session.rcpt_to.len() > cfg.max_rcpt {
        Some(replies::MSG_452_TOO_MANY_RCPT)
    } else if session.early_talker {
        Some(replies::MSG_554_MISBEHAVED_SESSION)
    } else {
        None
    }
}
