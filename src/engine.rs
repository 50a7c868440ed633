//! The per-connection session engine: admission checks, banner, the command
//! loop, the DATA sub-protocol, tarpitting and hard-limit enforcement.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::sleep;

use crate::abuse;
use crate::commands::{self, CmdId};
use crate::config::Config;
use crate::connection::Connection;
use crate::limits;
use crate::replies;
use crate::server::Shared;
use crate::session::Session;
use crate::storage;
use crate::utils::Logger;

const DIR_TX: &str = "SND";
const DIR_RX: &str = "RCV";

pub struct SessionEngine {
    cfg: Arc<Config>,
    shared: Arc<Shared>,
    logger: Arc<Logger>,
    conn: Connection,
    session: Session,
    closed: bool,
}

impl SessionEngine {
    pub fn new(
        cfg: Arc<Config>,
        shared: Arc<Shared>,
        logger: Arc<Logger>,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Self {
        let sess_count = shared.add_session();
        let session_id = shared.session_id();
        let session = Session::new(sess_count, session_id, peer.ip().to_string());
        let conn = Connection::new(stream, Duration::from_millis(cfg.receive_timeout));
        Self {
            cfg,
            shared,
            logger,
            conn,
            session,
            closed: false,
        }
    }

    /// Runs the session to completion; the connection is released on every
    /// exit path.
    pub async fn run(mut self) {
        self.logger
            .message(&format!(
                "client {} connected, sessions: {}, id: {}",
                self.session.client_ip, self.session.sess_count, self.session.session_id
            ))
            .await;

        // sessions limit reached, reject the session before any protocol I/O
        if self.session.sess_count > self.cfg.max_sessions {
            self.send(replies::MSG_421_SERVICE_UNAVAILABLE).await;
            self.close().await;
            return;
        }

        // DNS list checks, skipped for private/reserved ranges; an
        // allow-list hit short-circuits the deny-list lookups
        if !abuse::is_private_ip(&self.session.client_ip) {
            let ip = self.session.client_ip.clone();
            let mut listing = abuse::check_lists(&ip, &self.cfg.allow_lists, "white").await;
            if listing.is_none() {
                listing = abuse::check_lists(&ip, &self.cfg.block_lists, "black").await;
            }
            let deny_hit = matches!(&listing, Some(l) if l.list_type == "black");
            self.session.dns_listing = listing;
            // when storing messages, a deny-listed sender is kept around so
            // the payload can be captured
            if deny_hit && !self.cfg.store_data {
                self.send(replies::MSG_442_CONNECTION_TIMED_OUT).await;
                self.close().await;
                return;
            }
        }

        // short delay before the banner, then check for an early talker;
        // see http://wiki.asrg.sp.am/wiki/Early_talker_detection
        sleep(Duration::from_millis(self.cfg.banner_delay)).await;
        self.session.early_talker = self.check_early_talker();
        if self.session.early_talker {
            self.send(replies::MSG_554_MISBEHAVED_SESSION).await;
            self.close().await;
            return;
        }

        let mut conn_ok = self.send(&replies::banner(&self.cfg.host_name)).await;
        let mut terminate = false;

        while conn_ok && !terminate {
            let curr: CmdId;
            let response: String;

            if self.session.last_cmd == CmdId::Data {
                curr = CmdId::Data;
                let body = self.recv_data().await;
                if self.conn.timed_out {
                    // got a receive timeout during the DATA phase
                    self.send(replies::MSG_442_CONNECTION_TIMED_OUT).await;
                    break;
                }
                response = match body {
                    None => {
                        // body went over the size cap and was discarded
                        self.session.last_cmd = CmdId::Noop;
                        replies::MSG_422_MAILBOX_EXCEEDED_QUOTA.to_string()
                    }
                    Some(msg) => {
                        let reply = commands::end_of_data(&mut self.session);
                        storage::process_mail_msg(&mut self.session, &self.cfg, &msg);
                        if self.cfg.do_temp_fail {
                            // emit the tempfail AFTER storing the mail data
                            self.send(replies::MSG_421_SERVICE_UNAVAILABLE).await;
                            break;
                        }
                        reply
                    }
                };
                self.log_and_reset().await;
            } else {
                match self.conn.read_line().await {
                    Some(line) => {
                        self.logger
                            .trace(&self.session.client_ip, &self.session.session_id, DIR_RX, &line)
                            .await;
                        let id = commands::classify(&line);
                        if id == CmdId::Data && self.cfg.do_temp_fail && !self.cfg.store_data {
                            // emit the tempfail upon receiving the DATA command
                            self.session.last_cmd = CmdId::Quit;
                            curr = CmdId::Quit;
                            terminate = true;
                            response = replies::MSG_421_SERVICE_UNAVAILABLE.to_string();
                        } else {
                            response = commands::dispatch(id, &mut self.session, &self.cfg, &line);
                            curr = id;
                            if id == CmdId::Quit {
                                terminate = true;
                            }
                            if id == CmdId::Rset {
                                self.log_and_reset().await;
                            }
                        }
                    }
                    None => {
                        // the read timed out or the client went away
                        if self.conn.timed_out {
                            self.session.err_count += 1;
                        }
                        curr = CmdId::Quit;
                        terminate = true;
                        response = replies::MSG_442_CONNECTION_TIMED_OUT.to_string();
                    }
                }
            }

            // tarpit a bad client, time increases with the error count
            if self.session.err_count > 0 && curr != CmdId::Quit {
                sleep(Duration::from_millis(
                    self.cfg.error_delay * u64::from(self.session.err_count),
                ))
                .await;
            } else {
                sleep(Duration::from_millis(25)).await;
            }

            // clients may also start talking early mid-session
            self.session.early_talker = self.check_early_talker();

            conn_ok = self.send(&response).await;

            // check/enforce the hard limits (errors, vrfy ...)
            if curr != CmdId::Quit && conn_ok {
                if let Some(err_msg) = limits::check_hard_limits(&self.session, &self.cfg) {
                    conn_ok = self.send(err_msg).await;
                    terminate = true;
                }
            }
        }

        self.close().await;
    }

    // receive body lines until the terminating dot; None = over the size cap
    async fn recv_data(&mut self) -> Option<String> {
        let mut buff = String::new();
        let mut above_max = false;

        loop {
            match self.conn.read_line().await {
                None => {
                    if self.conn.timed_out {
                        self.session.err_count += 1;
                    }
                    // a clean EOF completes the collection
                    break;
                }
                Some(line) => {
                    if self.cfg.store_data && !above_max {
                        if buff.len() < self.cfg.max_data_size {
                            buff.push_str(&line);
                            buff.push_str("\r\n");
                        } else {
                            above_max = true;
                        }
                    }
                    if line.eq_ignore_ascii_case(".") {
                        break;
                    }
                }
            }
        }

        if above_max {
            return None;
        }
        if !self.cfg.store_data {
            // sentinel so downstream treats the message as received
            buff.push_str(".\r\n");
        }
        Some(buff)
    }

    fn check_early_talker(&mut self) -> bool {
        if !self.cfg.early_talkers {
            return false;
        }
        if self.conn.input_pending() {
            self.session.err_count += 1;
            true
        } else {
            false
        }
    }

    async fn send(&mut self, line: &str) -> bool {
        self.logger
            .trace(&self.session.client_ip, &self.session.session_id, DIR_TX, line)
            .await;
        self.conn.send_line(line).await
    }

    async fn log_and_reset(&mut self) {
        if self.session.needs_log() {
            self.logger.session_record(&self.session.log_record()).await;
            self.session.mark_logged();
        }
        self.session.reset();
    }

    // termination is idempotent: one close, one counter decrement
    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        sleep(Duration::from_millis(25)).await;
        self.conn.shutdown().await;
        let remaining = self.shared.remove_session();
        self.logger
            .message(&format!(
                "client {} disconnected, sessions: {}, id: {}",
                self.session.client_ip, remaining, self.session.session_id
            ))
            .await;
        self.log_and_reset().await;
    }
}
