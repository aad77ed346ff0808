use tokio_util::sync::CancellationToken;

/// Install a handler that cancels the returned token on SIGINT or SIGTERM.
///
/// Delivery stops issuing new sends once the token is cancelled; a message
/// already being sent is finished first.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl-C only");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, stopping after the current message");
        }
        _ = wait_for_ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received SIGINT, stopping after the current message"),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            // Never resolve, so a broken listener does not look like a shutdown request.
            std::future::pending::<()>().await;
        }
    }
}
