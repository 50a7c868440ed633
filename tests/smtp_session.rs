//! End-to-end tests: a real server on a loopback listener, driven by a
//! scripted client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use smtp_decoy::config::Config;
use smtp_decoy::server::Server;

fn test_config() -> Config {
    Config {
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

async fn start_server(cfg: Config) -> SocketAddr {
    let server = Arc::new(Server::new(cfg).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
    }

    /// Reads one reply line; empty string means the server closed on us.
    async fn read_reply(&mut self) -> String {
        let mut line = String::new();
        let _ = self.reader.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    async fn expect(&mut self, prefix: &str) -> String {
        let reply = self.read_reply().await;
        assert!(
            reply.starts_with(prefix),
            "expected reply starting with {:?}, got {:?}",
            prefix,
            reply
        );
        reply
    }
}

#[tokio::test]
async fn accepts_a_full_session() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.expect("220 decoy.example.com").await;
    client.send("EHLO client.example.com").await;
    client.expect("250").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.expect("250").await;
    client.send("RCPT TO:<rcpt@example.com>").await;
    client.expect("250").await;
    client.send("DATA").await;
    client.expect("354").await;
    client.send("Subject: hello").await;
    client.send("").await;
    client.send("a short body").await;
    client.send(".").await;
    client.expect("250 Queued mail for delivery").await;
    client.send("QUIT").await;
    client.expect("221").await;
    assert_eq!(client.read_reply().await, "");
}

#[tokio::test]
async fn enforces_command_sequencing() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.expect("503").await;
    client.send("RCPT TO:<rcpt@example.com>").await;
    client.expect("503").await;
    client.send("EHLO client.example.com").await;
    client.expect("250").await;
    client.send("RCPT TO:<rcpt@example.com>").await;
    client.expect("503").await;
}

#[tokio::test]
async fn rset_preserves_helo_and_clears_envelope() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.send("EHLO client.example.com").await;
    client.expect("250").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.expect("250").await;
    client.send("RSET").await;
    client.expect("250 Reset Ok").await;
    // HELO survives the reset, the envelope does not
    client.send("EHLO client.example.com").await;
    client.expect("503").await;
    client.send("RCPT TO:<rcpt@example.com>").await;
    client.expect("503").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.expect("250").await;
}

#[tokio::test]
async fn rejects_early_talker_before_banner() {
    let mut cfg = test_config();
    cfg.early_talkers = true;
    cfg.banner_delay = 250;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    // speak before the banner: the primary nolisting defense fires
    client.send("EHLO eager.example.com").await;
    client.expect("554").await;
    assert_eq!(client.read_reply().await, "");
}

#[tokio::test]
async fn tolerates_early_talker_when_disabled() {
    let mut cfg = test_config();
    cfg.banner_delay = 100;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    client.send("EHLO eager.example.com").await;
    client.expect("220").await;
    client.expect("250").await;
}

#[tokio::test]
async fn discards_oversized_message() {
    let mut cfg = test_config();
    cfg.store_data = true;
    cfg.max_data_size = 10;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.send("EHLO client.example.com").await;
    client.expect("250").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.expect("250").await;
    client.send("RCPT TO:<rcpt@example.com>").await;
    client.expect("250").await;
    client.send("DATA").await;
    client.expect("354").await;
    client.send("this body is well beyond ten bytes").await;
    client.send("and it keeps going").await;
    client.send(".").await;
    client.expect("422").await;
    // the protocol stream stays in sync
    client.send("NOOP").await;
    client.expect("250").await;
}

#[tokio::test]
async fn tarpit_delay_scales_with_errors() {
    let mut cfg = test_config();
    cfg.error_delay = 100;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    for _ in 0..3 {
        client.send("BOGUS").await;
        client.expect("500").await;
    }
    // three recorded errors: the next reply is delayed by at least 300 ms
    let before = Instant::now();
    client.send("NOOP").await;
    client.expect("250").await;
    let elapsed = before.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3000), "{:?}", elapsed);
}

#[tokio::test]
async fn closes_after_too_many_errors() {
    let mut cfg = test_config();
    cfg.max_errors = 2;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.send("BOGUS").await;
    client.expect("500").await;
    client.send("BOGUS").await;
    client.expect("500").await;
    client.send("BOGUS").await;
    client.expect("500").await;
    client.expect("550 Max errors exceeded").await;
    assert_eq!(client.read_reply().await, "");
}

#[tokio::test]
async fn temp_fails_on_data_when_not_storing() {
    let mut cfg = test_config();
    cfg.do_temp_fail = true;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.send("EHLO client.example.com").await;
    client.expect("250").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.expect("250").await;
    client.send("RCPT TO:<rcpt@example.com>").await;
    client.expect("250").await;
    client.send("DATA").await;
    client.expect("421").await;
    assert_eq!(client.read_reply().await, "");
}

#[tokio::test]
async fn temp_fails_after_storing_message() {
    let mut cfg = test_config();
    cfg.do_temp_fail = true;
    cfg.store_data = true;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.send("EHLO client.example.com").await;
    client.expect("250").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.expect("250").await;
    client.send("RCPT TO:<rcpt@example.com>").await;
    client.expect("250").await;
    client.send("DATA").await;
    client.expect("354").await;
    client.send("captured payload").await;
    client.send(".").await;
    // the message is taken first, then the session is deferred
    client.expect("421").await;
    assert_eq!(client.read_reply().await, "");
}

#[tokio::test]
async fn rejects_session_over_the_concurrency_cap() {
    let mut cfg = test_config();
    cfg.max_sessions = 0;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    client.expect("421").await;
    assert_eq!(client.read_reply().await, "");
}

#[tokio::test]
async fn enforces_message_count_limit() {
    let mut cfg = test_config();
    cfg.max_messages = 1;
    let addr = start_server(cfg).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.send("EHLO client.example.com").await;
    client.expect("250").await;

    for _ in 0..2 {
        client.send("MAIL FROM:<sender@example.com>").await;
        client.expect("250").await;
        client.send("RCPT TO:<rcpt@example.com>").await;
        client.expect("250").await;
        client.send("DATA").await;
        client.expect("354").await;
        client.send("body").await;
        client.send(".").await;
        client.expect("250 Queued mail for delivery").await;
    }

    // the second completed message pushes the session over the cap
    client.expect("451 Session messages count exceeded").await;
    assert_eq!(client.read_reply().await, "");
}

#[tokio::test]
async fn rejects_spoofed_helo() {
    let addr = start_server(test_config()).await;
    let mut client = Client::connect(addr).await;

    client.expect("220").await;
    client.send("HELO [127.0.0.1]").await;
    client.expect("501 Spoofed").await;
    client.send("HELO DECOY.EXAMPLE.COM").await;
    client.expect("501 Spoofed").await;
    client.send("HELO client.example.com").await;
    client.expect("250").await;
}
