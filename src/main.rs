use capstan::utils::logging::init_tracing;
use capstan::{CapstanError, Config, Deployment, ShellRunner};
use mimalloc::MiMalloc;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("capstan: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    init_tracing(&cfg.basic.loglevel);

    info!(
        config_path = %Config::config_path().display(),
        working_dir = %cfg.basic.working_dir.as_ref().map_or_else(|| ".".into(), |p| p.display().to_string()),
        loglevel = %cfg.basic.loglevel,
        apply_command = %cfg.tool.apply_command,
        initial_wait_secs = cfg.retry.initial_wait_secs,
        max_wait_secs = cfg.retry.max_wait_secs,
        backoff_factor = cfg.retry.backoff_factor,
        rate_limit_fixed_delay_secs = cfg.retry.rate_limit_fixed_delay_secs,
        max_attempts = ?cfg.retry.max_attempts,
        max_elapsed_secs = ?cfg.retry.max_elapsed_secs,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let runner = Arc::new(ShellRunner::new(cfg.basic.working_dir.clone()));
    let deployment = Deployment::from_config(&cfg, runner, cancel);

    match deployment.run().await {
        Ok(report) => {
            if let Some(outputs) = report.outputs.as_deref() {
                println!("{}", outputs.trim_end());
            }
            info!(
                run_id = %report.run_id,
                attempts = report.attempts,
                elapsed_secs = report.elapsed().num_seconds(),
                "Deployment complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_failure(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn report_failure(err: &CapstanError) {
    error!(error = %err, "Deployment failed");
    if let Some(output) = err.diagnostics() {
        if !output.stdout.is_empty() {
            eprintln!("{}", output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            eprintln!("{}", output.stderr.trim_end());
        }
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("Shutdown requested; stopping after the current command finishes");
    cancel.cancel();
}
