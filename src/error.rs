#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Setting up error reporting failed")]
    InstallingColorEyre(#[source] color_eyre::Report),

    #[error("Setting up logging failed")]
    SettingUpLogging(#[source] tracing::subscriber::SetGlobalDefaultError),

    #[error("No configuration file given, pass --config")]
    NoConfig,

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Client(#[from] crate::client::ClientError),

    #[error("Failed to open display output")]
    Driver(#[from] crate::output::DriverError),

    #[error("Request listener failed")]
    Listener(#[from] ListenerError),

    #[error("Background task failed")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to bind to {addr}")]
    Binding {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
