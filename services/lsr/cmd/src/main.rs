//! Link-state routing simulator.
//!
//! Loads a network description, runs every router and client as its own
//! task, then prints each router's LSDB and forwarding table along with the
//! packets each client received.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;
mod sim;

use config::SimConfig;
use logging::LsrLogFormatter;

/// Link-state routing simulator
#[derive(Parser, Debug)]
#[command(name = "lsr", version, about = "Simulate a network of link-state routers")]
struct Args {
    /// Path to the YAML network description
    #[arg(long, default_value = "lsr.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Virtual time to stop at, e.g. 30s (overrides the config file)
    #[arg(long)]
    end_time: Option<humantime::Duration>,

    /// Virtual time per simulation step, e.g. 100ms (overrides the config file)
    #[arg(long)]
    tick: Option<humantime::Duration>,

    /// Write the final report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("lsr={}", args.log_level).parse()?)
        .add_directive(format!("lsr_node={}", args.log_level).parse()?)
        .add_directive(format!("lsr_routing={}", args.log_level).parse()?)
        .add_directive(format!("lsr_topology={}", args.log_level).parse()?)
        .add_directive(format!("lsr_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .event_format(LsrLogFormatter::new("lsr".to_string()))
        .init();

    info!("Starting lsr simulator v{}", env!("CARGO_PKG_VERSION"));

    let mut sim_config = SimConfig::load_from_file(&args.config)?;
    if let Some(end_time) = args.end_time {
        sim_config.end_time_ms = duration_ms(end_time);
    }
    if let Some(tick) = args.tick {
        sim_config.tick_interval_ms = duration_ms(tick);
    }

    let report = match sim::run(&sim_config).await {
        Ok(report) => report,
        Err(e) => {
            component_error!("sim", "simulation failed: {:#}", e);
            return Err(e);
        }
    };

    for router in &report.routers {
        println!("{}", router.debug);
    }
    for client in &report.clients {
        println!("client {}: sent {}, received {}", client.node_id, client.sent, client.delivered.len());
        for packet in &client.delivered {
            let trace: Vec<&str> = packet.trace.iter().map(|n| n.as_str()).collect();
            println!("  from {} at {}ms via [{}]", packet.src, packet.received_ms, trace.join(", "));
        }
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
        component_info!("sim", "report written to {}", path.display());
    }

    let delivery = report.delivery();
    component_info!(
        "sim",
        "client probes: {} sent, {} received",
        delivery.client_sent,
        delivery.client_received
    );
    if delivery.router_dropped > 0 {
        component_warn!(
            "sim",
            "routers dropped {} data packets with no route or a routing loop",
            delivery.router_dropped
        );
    }

    Ok(())
}

fn duration_ms(duration: humantime::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
