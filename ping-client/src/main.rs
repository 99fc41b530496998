// Console ping client: discover a SimpleService group on the bus, join it, call Ping.

mod config;
mod logging;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ping_core::loopback::{LoopbackBus, SimpleService};
use ping_core::{Client, ClientConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    let mut config_path: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("ping-client {}", VERSION);
                return Ok(());
            }
            "--config" | "-c" => {
                let p = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(p));
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }

    let cfg = config::load(config_path.as_deref())?;
    logging::init(&cfg.log_level, &cfg.log_format);
    tracing::info!(version = VERSION, prefix = %cfg.client.group_prefix, "starting");

    let bus = LoopbackBus::new();
    let (client, outcomes) = Client::spawn(bus.attach(), cfg.client.clone())?;
    client.connect()?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        if cfg.demo_service {
            let delay = Duration::from_millis(cfg.demo_delay_ms);
            tokio::spawn(host_demo_service(bus.clone(), cfg.client.clone(), delay));
        }
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        ui::run(client, outcomes, stdin, shutdown_signal()).await
    });
    // The stdin reader may still be parked in a blocking read.
    rt.shutdown_background();
    bus.close();
    result
}

/// Advertise a SimpleService group after `delay`, as a remote service would.
async fn host_demo_service(bus: LoopbackBus, client: ClientConfig, delay: Duration) {
    tokio::time::sleep(delay).await;
    let group = format!("{}.demo", client.group_prefix);
    match bus.advertise(&group, &client.object_path, Arc::new(SimpleService::new())) {
        Ok(host) => tracing::info!(group = %group, %host, "demo service advertised"),
        Err(e) => tracing::error!(group = %group, error = %e, "demo service not advertised"),
    }
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
