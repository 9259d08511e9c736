use anyhow::Result;
use keyrelay_dispatcher::analysis;
use keyrelay_dispatcher::app;
use keyrelay_dispatcher::logging;
use keyrelay_dispatcher::{Config, ShutdownTrigger};

// Every stage but the pool's blocking slots shares one thread
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    if let Some(path) = &config.analyze {
        let report = analysis::analyze_file(path)?;
        println!("{report}");
        return Ok(());
    }

    logging::init(&config.log_level, config.log_file.as_deref())?;

    let (trigger, shutdown) = ShutdownTrigger::new();
    let duration = config.duration;

    tokio::spawn(async move {
        match duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
                    _ = tokio::time::sleep(duration) => tracing::info!("Run time of {:?} elapsed", duration),
                }
            }
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    // Nothing else can stop an unbounded run; keep going
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
                tracing::info!("Interrupted, shutting down");
            }
        }
        trigger.trigger();
    });

    app::run(config, shutdown).await?;
    Ok(())
}
