/// Resolves once the process is asked to stop, by SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }

    Ok(())
}

#[cfg(not(unix))]
pub async fn shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
