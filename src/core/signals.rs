/// Termination signals that cancel a run

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Resolve with the signal name on Ctrl-C, SIGTERM or SIGHUP
///
/// Signals whose handler cannot be installed are simply not watched.
pub async fn shutdown_signal() -> &'static str {
    let mut term = install(SignalKind::terminate(), "SIGTERM");
    let mut hup = install(SignalKind::hangup(), "SIGHUP");

    tokio::select! {
        _ = interrupt() => "SIGINT",
        _ = recv(&mut term) => "SIGTERM",
        _ = recv(&mut hup) => "SIGHUP",
    }
}

fn install(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::warn!(signal = name, error = %e, "cannot watch signal");
            None
        }
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot watch Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn recv(stream: &mut Option<Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
