//! Minimal host for the detector.
//! Reads method names from stdin (one per line), prints JSON replies on stdout,
//! and logs every non-zero detection score as it is published.
//!
//! Usage: `shooter-mic [config.json]`

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use shooter_mic::commands::dispatch;
use shooter_mic::{init_tracing, CpalBackend, MicConfig, MicService};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let loaded = std::env::args()
        .nth(1)
        .map(|path| MicConfig::load_from_file(Path::new(&path)));
    let config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => MicConfig::default(),
    };

    init_tracing(&config.logging);
    if let Some(Err(e)) = &loaded {
        warn!(error = %e, "config load failed, using defaults");
    }

    let backend = CpalBackend::new(config.audio.device_name.clone());
    let service = match MicService::new(backend, config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!(error = %e, "service init failed");
            std::process::exit(2);
        }
    };

    info!(
        devices = ?shooter_mic::audio::device::list_input_devices(),
        "shooter-mic ready; methods: startAudioMonitoring, stopAudioMonitoring, getAudioLevel, quit"
    );

    let mut level_rx = service.subscribe_level();
    tokio::spawn(async move {
        while level_rx.changed().await.is_ok() {
            let score = *level_rx.borrow_and_update();
            if score > 0.0 {
                info!(score, "impulse");
            }
        }
    });

    // Plain thread: a blocked stdin read must not hold up runtime shutdown.
    let (done_tx, done_rx) = oneshot::channel::<()>();
    let svc = Arc::clone(&service);
    std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let method = line.trim();
                if method.is_empty() {
                    continue;
                }
                if method == "quit" {
                    break;
                }
                let reply = dispatch(&svc, method);
                match serde_json::to_string(&reply) {
                    Ok(json) => println!("{json}"),
                    Err(e) => warn!(error = %e, "reply serialization failed"),
                }
            }
            let _ = done_tx.send(());
        })
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to spawn stdin thread");
            std::process::exit(2);
        });

    tokio::select! {
        _ = done_rx => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    if let Err(e) = service.stop_session() {
        warn!(error = %e, "stop on exit failed");
    }

    match serde_json::to_string_pretty(&service.metrics_summary()) {
        Ok(summary) => eprintln!("{summary}"),
        Err(e) => warn!(error = %e, "metrics summary serialization failed"),
    }
}
