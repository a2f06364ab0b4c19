use colored::Colorize;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    // Ctrl-C cancels the running action; streams and poll loops wind down
    // on their own and keep whatever partial result they have.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        eprintln!("\nReceived shutdown signal, stopping...");
        trigger.cancel();
    });

    match codetutor::cli::run(cancel).await {
        Ok(()) => ExitCode::from(codetutor::errors::EXIT_SUCCESS),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if codetutor::errors::is_auth_error(&e) {
                eprintln!("{}", "Run `codetutor signin` to start a new session.".dimmed());
            }
            ExitCode::from(codetutor::errors::get_exit_code(&e))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
