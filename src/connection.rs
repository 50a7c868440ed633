//! Line-oriented CRLF transport over a `TcpStream`, with the readiness
//! probe used for early-talker detection.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

pub struct Connection {
    stream: TcpStream,
    buf: Vec<u8>,
    recv_timeout: Duration,
    /// Set when a read failed or timed out (as opposed to a clean EOF).
    pub timed_out: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, recv_timeout: Duration) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            recv_timeout,
            timed_out: false,
        }
    }

    /// Reads one line, blocking up to the receive timeout. Returns `None` on
    /// EOF, timeout or read error; `timed_out` tells the cases apart.
    pub async fn read_line(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Some(String::from_utf8_lossy(&line).into_owned());
            }

            let mut chunk = [0u8; 1024];
            let read = if self.recv_timeout.is_zero() {
                self.stream.read(&mut chunk).await
            } else {
                match time::timeout(self.recv_timeout, self.stream.read(&mut chunk)).await {
                    Ok(read) => read,
                    Err(_) => {
                        self.timed_out = true;
                        return None;
                    }
                }
            };
            match read {
                Ok(0) => return None, // clean EOF
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(_) => {
                    self.timed_out = true;
                    return None;
                }
            }
        }
    }

    /// True when client input is already queued at a point where none should
    /// be; pulls whatever is readable right now into the line buffer.
    pub fn input_pending(&mut self) -> bool {
        if !self.buf.is_empty() {
            return true;
        }
        let mut chunk = [0u8; 1024];
        match self.stream.try_read(&mut chunk) {
            Ok(n) if n > 0 => {
                self.buf.extend_from_slice(&chunk[..n]);
                true
            }
            _ => false,
        }
    }

    /// Sends one reply line, CRLF terminated. False means the peer is gone.
    pub async fn send_line(&mut self, line: &str) -> bool {
        let mut out = Vec::with_capacity(line.len() + 2);
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
        if self.stream.write_all(&out).await.is_err() {
            return false;
        }
        self.stream.flush().await.is_ok()
    }

    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
