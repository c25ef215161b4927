use std::time::Duration;

use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Interval;
use tracing::{info, warn};

use activity_relay::client::{ConnectionManager, Snapshot};
use activity_relay::config::DashboardArgs;
use activity_relay::feed::{render_counters, render_line, status_badge};
use activity_relay::models::{ConnectionState, CounterState};
use activity_relay::telemetry::init_logging;

/// Prints only what changed since the previous snapshot
#[derive(Default)]
struct FeedPrinter {
    seen: u64,
    state: Option<ConnectionState>,
    counters: Option<CounterState>,
}

impl FeedPrinter {
    fn print(&mut self, snapshot: &Snapshot) {
        if self.state != Some(snapshot.state) {
            println!("== {} ==", status_badge(snapshot.state));
            self.state = Some(snapshot.state);
        }

        let fresh = snapshot.appended.saturating_sub(self.seen);
        let fresh = usize::try_from(fresh).unwrap_or(usize::MAX).min(snapshot.logs.len());
        for event in &snapshot.logs[snapshot.logs.len() - fresh..] {
            println!("{}", render_line(event));
        }
        self.seen = snapshot.appended;

        if self.counters.as_ref() != Some(&snapshot.counters) {
            println!("-- {}", render_counters(&snapshot.counters));
            self.counters = Some(snapshot.counters.clone());
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("warn");
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = DashboardArgs::parse();
    let config = args.client_config()?;
    info!(url = %config.url, max_logs = config.max_logs, "starting dashboard");

    let manager = ConnectionManager::spawn(config)?;
    let handle = manager.handle();
    let mut snapshots = handle.watch();
    let mut printer = FeedPrinter::default();
    let mut ping = args
        .ping_interval_secs
        .map(|secs| tokio::time::interval(Duration::from_secs(secs.max(1))));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    println!("commands: p = ping, c = clear, q = quit");
    printer.print(&snapshots.borrow_and_update().clone());

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                printer.print(&snapshot);
            }
            _ = tick(&mut ping) => {
                if handle.state().is_open() {
                    if let Err(e) = handle.send(json!({ "type": "ping" })).await {
                        warn!(error = %e, "ping failed");
                    }
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "p" | "ping" => {
                        if let Err(e) = handle.send(json!({ "type": "ping" })).await {
                            warn!(error = %e, "ping failed");
                        }
                    }
                    "c" | "clear" => handle.clear().await?,
                    "q" | "quit" => break,
                    "" => {}
                    other => eprintln!("unknown command: {other}"),
                },
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    }

    manager.dispose().await;
    Ok(())
}
