use std::sync::Arc;

use anyhow::Result;
use structopt::StructOpt;

use smtp_decoy::config::{Config, Opt};
use smtp_decoy::server::Server;
use smtp_decoy::utils::Logger;

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::from_args();
    let cfg = Config::from_opt(opt)?;

    println!("==========================================");
    println!("SMTP Decoy v{}", env!("CARGO_PKG_VERSION"));
    println!("==========================================");

    let server = Arc::new(Server::new(cfg.clone())?);

    server
        .logger()
        .message(&format!("smtp-decoy {} starting up", env!("CARGO_PKG_VERSION")))
        .await;
    if cfg.verbose {
        dump_settings(server.logger(), &cfg).await;
    }

    println!("[INFO] PID: {}", std::process::id());
    println!("[INFO] Press Ctrl+C to stop");

    server.run().await
}

// dump the current settings, one aligned line per value
async fn dump_settings(logger: &Logger, cfg: &Config) {
    logger.message(&format!("Host name..................: {}", cfg.host_name)).await;
    logger.message(&format!("Listen IP..................: {}", cfg.listen_address)).await;
    logger.message(&format!("Listen port................: {}", cfg.listen_port)).await;
    logger.message(&format!("Receive timeout............: {}", cfg.receive_timeout)).await;
    logger.message(&format!("Max errors.................: {}", cfg.max_errors)).await;
    logger.message(&format!("Max NOOP...................: {}", cfg.max_noop)).await;
    logger.message(&format!("Max VRFY/EXPN..............: {}", cfg.max_vrfy)).await;
    logger.message(&format!("Max RCPT TO................: {}", cfg.max_rcpt)).await;
    logger.message(&format!("Max messages per session...: {}", cfg.max_messages)).await;
    logger.message(&format!("Max parallel sessions......: {}", cfg.max_sessions)).await;
    logger.message(&format!("Store message data.........: {}", cfg.store_data)).await;
    logger.message(&format!("Storage path...............: {:?}", cfg.store_path)).await;
    logger.message(&format!("Max message size...........: {}", cfg.max_data_size)).await;
    logger.message(&format!("Logfiles path..............: {:?}", cfg.log_dir)).await;
    logger.message(&format!("Verbose logging............: {}", cfg.verbose)).await;
    logger.message(&format!("Initial banner delay.......: {}", cfg.banner_delay)).await;
    logger.message(&format!("Error delay................: {}", cfg.error_delay)).await;
    logger.message(&format!("Do tempfail (4xx) on DATA..: {}", cfg.do_temp_fail)).await;
    logger.message(&format!("Check for early talkers....: {}", cfg.early_talkers)).await;
    logger.message(&format!("DNS allow-lists............: {}", cfg.allow_lists.len())).await;
    logger.message(&format!("DNS deny-lists.............: {}", cfg.block_lists.len())).await;
    logger.message(&format!("Local domains..............: {}", cfg.local_domains.len())).await;
    logger.message(&format!("Local mailboxes............: {}", cfg.local_mailboxes.len())).await;
}
