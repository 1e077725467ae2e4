use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;

use hopcast::cli::Args;
use hopcast::config::Config;
use hopcast::event::TraceEvent;
use hopcast::lookup::GeoLookup;
use hopcast::state::Hop;
use hopcast::trace::TraceSession;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = Config::from(&args);

    // Simulated routes carry their own locations; only real traces need
    // the geolocation service
    let geo = if config.geo_enabled && !config.simulate {
        Some(Arc::new(GeoLookup::new()))
    } else {
        None
    };

    let session = if config.simulate {
        TraceSession::simulated(&args.target)
    } else {
        TraceSession::new(&args.target, geo)
    };

    emit(&TraceEvent::started(&session), config.json);

    let (tx, mut rx) = mpsc::unbounded_channel();

    let hop_tx = tx.clone();
    let hop_id = session.id().to_string();
    let done_tx = tx.clone();
    let done_id = session.id().to_string();
    let err_tx = tx;
    let err_id = session.id().to_string();

    session.start(
        move |hop| {
            let _ = hop_tx.send(TraceEvent::hop(&hop_id, hop));
        },
        move |total| {
            let _ = done_tx.send(TraceEvent::completed(&done_id, total));
        },
        move |error| {
            let _ = err_tx.send(TraceEvent::error(&err_id, error));
        },
    );

    let deadline = tokio::time::sleep(config.timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let terminal = matches!(
                    event,
                    TraceEvent::Completed { .. } | TraceEvent::Error { .. }
                );
                emit(&event, config.json);
                if terminal {
                    break;
                }
            }
            _ = &mut deadline => {
                session.cancel();
                emit(&TraceEvent::cancelled(session.id()), config.json);
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                emit(&TraceEvent::cancelled(session.id()), config.json);
                break;
            }
        }
    }

    Ok(())
}

/// Print one event, as a JSON line or readable text
fn emit(event: &TraceEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    match event {
        TraceEvent::Started { target, .. } => println!("tracing route to {target}"),
        TraceEvent::Hop { hop, .. } => println!("{}", format_hop(hop)),
        TraceEvent::Completed { total_hops, .. } => {
            println!("trace complete: {total_hops} hops");
        }
        TraceEvent::Cancelled { .. } => println!("trace cancelled"),
        TraceEvent::Error { error, .. } => eprintln!("trace failed: {error}"),
    }
}

fn format_hop(hop: &Hop) -> String {
    if hop.is_timeout {
        return format!("{:>3}  *", hop.hop_number);
    }

    let mut line = format!(
        "{:>3}  {:<15}  {:>8.3} ms",
        hop.hop_number, hop.ip_address, hop.avg_rtt
    );
    if let Some(location) = &hop.location {
        if let Some(city) = &location.city {
            line.push_str(&format!("  {city}"));
            if let Some(code) = &location.country_code {
                line.push_str(&format!(", {code}"));
            }
        }
    }
    if let Some(provider) = &hop.provider {
        line.push_str(&format!("  [{}]", provider.provider));
    }
    line
}
