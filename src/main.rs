#![deny(unsafe_code)]

use std::sync::Arc;

mod arbitration;
mod charset;
mod cli;
mod client;
mod config;
mod content;
mod control;
mod error;
mod listener;
mod logging;
mod output;
mod persistence;
mod protocol;
mod resolver;
mod scheduler;
mod store;
mod systemd;

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    setup_panic();
    color_eyre::install().map_err(crate::error::Error::InstallingColorEyre)?;
    let cli = <crate::cli::Cli as clap::Parser>::parse();
    crate::logging::setup(cli.verbosity)?;

    match cli.command {
        cli::Command::Run { selftest } => {
            let cfg = load_config(cli.config.as_deref()).await?;
            let process_state = systemd::ProcessState {
                span: tracing::info_span!("ibisd"),
            };
            process_state.set_starting();

            match run(cfg, selftest, &process_state).await {
                Ok(()) => process_state.set_finished(),
                Err(error) => {
                    process_state.set_failed();
                    return Err(error.into());
                }
            }
        }
        cli::Command::VerifyConfig => {
            let cfg = load_config(cli.config.as_deref()).await?;
            tracing::info!(?cfg, "Configuration verified");
        }
        cli::Command::Client(command) => {
            client::run(command).await.map_err(crate::error::Error::Client)?;
        }
    }

    Ok(())
}

async fn load_config(
    path: Option<&camino::Utf8Path>,
) -> Result<crate::config::Config, crate::error::Error> {
    let path = path.ok_or(crate::error::Error::NoConfig)?;
    Ok(crate::config::Config::load(path).await?)
}

fn setup_panic() {
    human_panic::setup_panic!(human_panic::Metadata::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
    .authors(env!("CARGO_PKG_AUTHORS")));
}

async fn run(
    config: crate::config::Config,
    selftest: bool,
    process_state: &systemd::ProcessState,
) -> Result<(), crate::error::Error> {
    let store = Arc::new(store::ChannelStore::new(config.display.channels));
    let state_file = persistence::StateFile::new(config.state.path.clone());
    match state_file.load().await {
        Ok(snapshot) => {
            tracing::info!(path = %state_file.path(), "Restoring display state");
            store.restore(snapshot).await;
        }
        Err(error) => {
            tracing::warn!(?error, "No usable saved state, starting empty");
        }
    }

    let (wake_sender, wake_receiver) = tokio::sync::mpsc::unbounded_channel();
    let controller = Arc::new(control::Controller::new(
        store.clone(),
        state_file,
        wake_sender,
    ));

    let driver = output::open(&config.output).await?;
    let mut scheduler = scheduler::Scheduler::new(
        store,
        driver,
        (&config.display).into(),
        wake_receiver,
    );
    if selftest {
        scheduler
            .selftest(config.display.selftest_pause, &config.display.selftest_banner)
            .await;
    }

    let cancellation_token = tokio_util::sync::CancellationToken::new();
    let scheduler_task = tokio::task::spawn(scheduler.run(cancellation_token.clone()));
    let mut listener_task = tokio::task::spawn(listener::run(
        config.listener.clone(),
        controller.clone(),
        cancellation_token.clone(),
    ));

    process_state.set_running();

    let listener_result = tokio::select! {
        _ctrl_c = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl-C received, shutting down");
            cancellation_token.cancel();
            (&mut listener_task).await
        }

        result = &mut listener_task => {
            tracing::error!("Listener stopped, shutting down");
            cancellation_token.cancel();
            result
        }
    };

    scheduler_task.await?;
    controller.persist().await;
    listener_result??;
    Ok(())
}
