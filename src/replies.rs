//! SMTP reply lines. Fixed replies are consts, parametric ones are helpers.

use chrono::Utc;

pub const MSG_221_CLOSING_CONNECTION: &str = "221 Closing connection, goodbye";
pub const MSG_250_OK: &str = "250 Ok";
pub const MSG_250_RESET_OK: &str = "250 Reset Ok";
pub const MSG_250_QUEUED: &str = "250 Queued mail for delivery";
pub const MSG_252_CANNOT_VRFY: &str = "252 Cannot VRFY user, will attempt delivery anyway";
pub const MSG_354_START_MAIL_INPUT: &str = "354 Start mail input; end with <CRLF>.<CRLF>";
pub const MSG_421_SERVICE_UNAVAILABLE: &str =
    "421 Service temporarily unavailable, closing transmission channel";
pub const MSG_422_MAILBOX_EXCEEDED_QUOTA: &str = "422 Recipient mailbox has exceeded quota";
pub const MSG_442_CONNECTION_TIMED_OUT: &str = "442 Connection timed out";
pub const MSG_451_MAX_MESSAGES: &str = "451 Session messages count exceeded";
pub const MSG_451_MAX_VRFY: &str = "451 Max recipients reached";
pub const MSG_451_MAX_NOOP: &str = "451 Max NOOP count reached";
pub const MSG_452_TOO_MANY_RCPT: &str = "452 Too many recipients";
pub const MSG_471_BAD_OR_MISSING_RCPT: &str = "471 Bad or missing RCPT command";
pub const MSG_500_UNRECOGNIZED: &str = "500 Command unrecognized";
pub const MSG_503_NO_HELO: &str = "503 Polite people say HELO first";
pub const MSG_503_NESTED_MAIL: &str = "503 Nested MAIL command";
pub const MSG_503_NEED_MAIL_FIRST: &str = "503 Need MAIL before RCPT";
pub const MSG_530_RELAYING_NOT_ALLOWED: &str = "530 Relaying not allowed";
pub const MSG_550_MAX_ERRORS: &str = "550 Max errors exceeded";
pub const MSG_554_MISBEHAVED_SESSION: &str = "554 Misbehaved SMTP session";

/// 220 greeting, host name plus the current UTC time in RFC-1123 form.
pub fn banner(host_name: &str) -> String {
    format!(
        "220 {} fake ESMTP server ready, {}",
        host_name,
        Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

pub fn helo_ok(helo: &str, client_ip: &str) -> String {
    format!("250 Hello {} [{}], pleased to meet you", helo, client_ip)
}

pub fn ehlo_ok(helo: &str, client_ip: &str) -> String {
    format!("250 Hello {} [{}], nice to meet you", helo, client_ip)
}

pub fn sender_ok(addr: &str) -> String {
    format!("250 {} sender ok", addr)
}

pub fn recipient_ok(addr: &str) -> String {
    format!("250 {} recipient ok", addr)
}

pub fn expn_ok(addr: &str) -> String {
    format!("250 {}", addr)
}

pub fn ok_with_arg(arg: &str) -> String {
    format!("250 Ok: {}", arg)
}

pub fn needs_argument(cmd: &str) -> String {
    format!("501 {} needs an argument", cmd)
}

pub fn invalid_argument(cmd: &str) -> String {
    format!("501 Invalid {}", cmd)
}

pub fn spoofed_argument(cmd: &str) -> String {
    format!("501 Spoofed {}", cmd)
}

pub fn already_sent(cmd: &str) -> String {
    format!("503 {} already sent", cmd)
}

pub fn invalid_address(addr: &str) -> String {
    format!("553 Invalid address {}", addr)
}

pub fn unknown_address(addr: &str) -> String {
    format!("553 Unknown email address {}", addr)
}

pub fn unrecognized(line: &str) -> String {
    format!("500 Command unrecognized: \"{}\"", line)
}
