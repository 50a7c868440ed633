//! The fixed SMTP verb vocabulary and one handler per verb. Handlers are
//! pure functions of session state and the raw command line; error-counter
//! increments are explicit per branch.

use crate::config::Config;
use crate::replies;
use crate::session::Session;
use crate::validate::{check_helo, check_mail_addr, clean_string, is_spoofed_helo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdId {
    Invalid,
    Helo,
    Ehlo,
    MailFrom,
    RcptTo,
    Data,
    Rset,
    Quit,
    Vrfy,
    Expn,
    Help,
    Noop,
}

/// Verb table; classification is a case-insensitive prefix match in this order.
const CMD_LIST: [(CmdId, &str); 11] = [
    (CmdId::Helo, "HELO"),
    (CmdId::Ehlo, "EHLO"),
    (CmdId::MailFrom, "MAIL FROM:"),
    (CmdId::RcptTo, "RCPT TO:"),
    (CmdId::Data, "DATA"),
    (CmdId::Rset, "RSET"),
    (CmdId::Quit, "QUIT"),
    (CmdId::Vrfy, "VRFY"),
    (CmdId::Expn, "EXPN"),
    (CmdId::Help, "HELP"),
    (CmdId::Noop, "NOOP"),
];

/// Maps a raw command line to its verb; unmatched lines are `Invalid`.
pub fn classify(cmd_line: &str) -> CmdId {
    let upper = cmd_line.to_uppercase();
    for (id, verb) in CMD_LIST {
        if upper.starts_with(verb) {
            return id;
        }
    }
    CmdId::Invalid
}

/// Splits a command line into the uppercased verb part and an optional
/// cleaned argument; verbs carrying a colon split on ':', others on the
/// first space.
pub fn parse_cmd_line(id: CmdId, cmd_line: &str) -> (String, Option<String>) {
    let sep = match id {
        CmdId::MailFrom | CmdId::RcptTo => ':',
        _ => ' ',
    };
    match cmd_line.find(sep) {
        Some(pos) => {
            let cmd = clean_string(&cmd_line[..pos]).to_uppercase();
            let arg = clean_string(&cmd_line[pos + 1..]);
            if arg.is_empty() {
                (cmd, None)
            } else {
                (cmd, Some(arg))
            }
        }
        None => (clean_string(cmd_line).to_uppercase(), None),
    }
}

/// Dispatches a classified command to its handler; returns the reply line.
pub fn dispatch(id: CmdId, session: &mut Session, cfg: &Config, cmd_line: &str) -> String {
    match id {
        CmdId::Helo | CmdId::Ehlo => cmd_helo(id, session, cfg, cmd_line),
        CmdId::MailFrom => cmd_mail(session, cmd_line),
        CmdId::RcptTo => cmd_rcpt(session, cfg, cmd_line),
        CmdId::Data => cmd_data(session),
        CmdId::Rset => cmd_rset(session),
        CmdId::Quit => cmd_quit(session),
        CmdId::Vrfy | CmdId::Expn => cmd_vrfy(id, session, cmd_line),
        CmdId::Help => cmd_help(),
        CmdId::Noop => cmd_noop(session, cmd_line),
        CmdId::Invalid => cmd_unknown(session, cmd_line),
    }
}

/// End-of-DATA marker; always succeeds.
pub fn end_of_data(session: &mut Session) -> String {
    session.last_cmd = CmdId::Noop;
    replies::MSG_250_QUEUED.to_string()
}

fn cmd_helo(id: CmdId, session: &mut Session, cfg: &Config, cmd_line: &str) -> String {
    let (cmd, arg) = parse_cmd_line(id, cmd_line);
    let arg = match arg {
        Some(arg) => arg,
        None => {
            session.err_count += 1;
            return replies::needs_argument(&cmd);
        }
    };
    if session.helo.is_some() {
        session.err_count += 1;
        return replies::already_sent(&cmd);
    }
    if !check_helo(&arg, cfg) {
        session.err_count += 1;
        return replies::invalid_argument(&cmd);
    }
    if is_spoofed_helo(&arg, cfg) {
        session.err_count += 1;
        return replies::spoofed_argument(&cmd);
    }

    let reply = if id == CmdId::Helo {
        replies::helo_ok(&arg, &session.client_ip)
    } else {
        replies::ehlo_ok(&arg, &session.client_ip)
    };
    session.helo = Some(arg);
    session.last_cmd = id;
    reply
}

fn cmd_mail(session: &mut Session, cmd_line: &str) -> String {
    if session.helo.is_none() {
        session.err_count += 1;
        return replies::MSG_503_NO_HELO.to_string();
    }
    if session.mail_from.is_some() {
        session.err_count += 1;
        return replies::MSG_503_NESTED_MAIL.to_string();
    }
    let (cmd, arg) = parse_cmd_line(CmdId::MailFrom, cmd_line);
    let arg = match arg {
        Some(arg) => arg,
        None => {
            session.err_count += 1;
            return replies::needs_argument(&cmd);
        }
    };
    match check_mail_addr(&arg) {
        Some((mailbox, domain)) => {
            session.mail_box = Some(mailbox);
            session.mail_dom = Some(domain);
        }
        None => {
            session.err_count += 1;
            return replies::invalid_address(&arg);
        }
    }

    let reply = replies::sender_ok(&arg);
    session.mail_from = Some(arg);
    session.last_cmd = CmdId::MailFrom;
    reply
}

fn cmd_rcpt(session: &mut Session, cfg: &Config, cmd_line: &str) -> String {
    if session.mail_from.is_none() {
        session.err_count += 1;
        return replies::MSG_503_NEED_MAIL_FIRST.to_string();
    }
    let (cmd, arg) = parse_cmd_line(CmdId::RcptTo, cmd_line);
    let arg = match arg {
        Some(arg) => arg,
        None => {
            session.err_count += 1;
            return replies::needs_argument(&cmd);
        }
    };
    let (mailbox, domain) = match check_mail_addr(&arg) {
        Some(parts) => parts,
        None => {
            session.err_count += 1;
            return replies::invalid_address(&arg);
        }
    };
    session.mail_box = Some(mailbox.clone());
    session.mail_dom = Some(domain.clone());

    if !is_local_domain(cfg, &domain) {
        session.err_count += 1;
        return replies::MSG_530_RELAYING_NOT_ALLOWED.to_string();
    }
    if !is_local_box(cfg, &mailbox, &domain) {
        session.err_count += 1;
        return replies::unknown_address(&arg);
    }

    let reply = replies::recipient_ok(&arg);
    session.rcpt_to.push(arg);
    session.last_cmd = CmdId::RcptTo;
    reply
}

fn cmd_data(session: &mut Session) -> String {
    if session.rcpt_to.is_empty() {
        session.err_count += 1;
        return replies::MSG_471_BAD_OR_MISSING_RCPT.to_string();
    }
    session.last_cmd = CmdId::Data;
    replies::MSG_354_START_MAIL_INPUT.to_string()
}

fn cmd_rset(session: &mut Session) -> String {
    // the engine performs the actual reset (it also writes the session log)
    session.last_cmd = CmdId::Rset;
    replies::MSG_250_RESET_OK.to_string()
}

fn cmd_quit(session: &mut Session) -> String {
    session.last_cmd = CmdId::Quit;
    replies::MSG_221_CLOSING_CONNECTION.to_string()
}

fn cmd_vrfy(id: CmdId, session: &mut Session, cmd_line: &str) -> String {
    session.vrfy_count += 1;
    let (cmd, arg) = parse_cmd_line(id, cmd_line);
    let arg = match arg {
        Some(arg) => arg,
        None => {
            session.err_count += 1;
            return replies::needs_argument(&cmd);
        }
    };
    if check_mail_addr(&arg).is_none() {
        session.err_count += 1;
        return replies::invalid_address(&arg);
    }
    session.last_cmd = id;
    if id == CmdId::Vrfy {
        replies::MSG_252_CANNOT_VRFY.to_string()
    } else {
        replies::expn_ok(&arg)
    }
}

fn cmd_help() -> String {
    // dynamically build the help string from the verb table
    let mut buff = String::from("211");
    for (_, verb) in CMD_LIST {
        let keyword = verb.split(' ').next().unwrap_or(verb);
        buff.push(' ');
        buff.push_str(keyword);
    }
    buff
}

fn cmd_noop(session: &mut Session, cmd_line: &str) -> String {
    session.noop_count += 1;
    let (_, arg) = parse_cmd_line(CmdId::Noop, cmd_line);
    match arg {
        Some(arg) => replies::ok_with_arg(&arg),
        None => replies::MSG_250_OK.to_string(),
    }
}

fn cmd_unknown(session: &mut Session, cmd_line: &str) -> String {
    session.err_count += 1;
    session.last_cmd = CmdId::Invalid;
    let line = clean_string(cmd_line);
    if line.is_empty() {
        replies::MSG_500_UNRECOGNIZED.to_string()
    } else {
        replies::unrecognized(&line)
    }
}

fn is_local_domain(cfg: &Config, domain: &str) -> bool {
    // no configured domains means "all domains are ok"
    cfg.local_domains.is_empty()
        || cfg.local_domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
}

fn is_local_box(cfg: &Config, mailbox: &str, domain: &str) -> bool {
    if cfg.local_mailboxes.is_empty() {
        return true;
    }
    let addr = format!("{}@{}", mailbox, domain);
    cfg.local_mailboxes.iter().any(|b| b.eq_ignore_ascii_case(&addr))
}
