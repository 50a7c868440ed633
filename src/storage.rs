//! Message sink: counts completed messages and, when storage is enabled,
//! writes them to uniquely named files with session annotation headers.

use std::fmt::Write as _;

use crate::config::Config;
use crate::session::Session;

/// Handles a fully collected message. Bumps the session message counter;
/// storage failures never reach the protocol layer, they only leave the
/// `write_error` sentinel as the message-file reference.
pub fn process_mail_msg(session: &mut Session, cfg: &Config, msg_data: &str) {
    session.msg_count += 1;
    if !cfg.store_data {
        return;
    }

    match write_message_file(session, cfg, msg_data) {
        Ok(file_name) => session.msg_file = Some(file_name),
        Err(_) => session.msg_file = Some("write_error".to_string()),
    }
}

fn write_message_file(session: &Session, cfg: &Config, msg_data: &str) -> std::io::Result<String> {
    let file_name = format!(
        "mailmsg-{}-{}.txt",
        session.session_id.to_lowercase(),
        session.msg_count
    );
    let path = cfg.store_path.join(&file_name);

    let mut out = String::new();
    let _ = writeln!(out, "X-Decoy-HostName: {}", cfg.host_name);
    let _ = writeln!(
        out,
        "X-Decoy-Sessions: count={}, id={}",
        session.sess_count, session.session_id
    );
    let _ = writeln!(out, "X-Decoy-MsgCount: {}", session.msg_count);
    let _ = writeln!(
        out,
        "X-Decoy-SessDate: {}",
        session.start_date.format("%Y-%m-%d %H:%M:%SZ")
    );
    let _ = writeln!(out, "X-Decoy-ClientIP: {}", session.client_ip);
    match &session.dns_listing {
        Some(listing) => {
            let _ = writeln!(
                out,
                "X-Decoy-DnsList: type={}, list={}, result={}",
                listing.list_type, listing.list_name, listing.list_value
            );
        }
        None => {
            let _ = writeln!(out, "X-Decoy-DnsList: type=notlisted, list=none, result=0.0.0.0");
        }
    }
    let _ = writeln!(out, "X-Decoy-Helo: {}", session.helo.as_deref().unwrap_or(""));
    let _ = writeln!(out, "X-Decoy-MailFrom: {}", session.mail_from.as_deref().unwrap_or(""));
    let _ = writeln!(out, "X-Decoy-RcptCount: {}", session.rcpt_to.len());
    for (i, rcpt) in session.rcpt_to.iter().enumerate() {
        let _ = writeln!(out, "X-Decoy-RcptTo-{}: {}", i + 1, rcpt);
    }
    let _ = writeln!(
        out,
        "X-Decoy-Counters: noop={}, vrfy={}, err={}",
        session.noop_count, session.vrfy_count, session.err_count
    );
    out.push('\n');
    out.push_str(msg_data);

    std::fs::write(&path, out)?;
    Ok(file_name)
}
