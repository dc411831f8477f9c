use clap::Parser;

#[derive(Debug, Parser)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Path of the configuration file, needed by `run` and `verify-config`
    #[clap(long, short, global = true)]
    pub config: Option<camino::Utf8PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Drive the displays and accept requests
    Run {
        /// Cycle every display through a test pattern before starting
        #[clap(long)]
        selftest: bool,
    },

    VerifyConfig,

    #[command(flatten)]
    Client(ClientCommand),
}

/// Talk to a running daemon.
#[derive(Debug, clap::Subcommand)]
pub enum ClientCommand {
    /// Put something on a display, or blank it when no value is given
    Send {
        #[command(flatten)]
        server: Server,

        #[clap(long, short)]
        display: u8,

        #[clap(long = "type", short = 't', value_enum, default_value_t = MessageKind::Text)]
        kind: MessageKind,

        /// Text, strftime pattern, or `item~secs|item|...` for a sequence
        value: Option<String>,

        /// Seconds per sequence item without its own duration
        #[clap(long, short, default_value_t = 5.0)]
        interval: f64,

        #[clap(long, short, default_value_t = 0, allow_negative_numbers = true)]
        priority: i64,

        /// Owner name, the daemon uses our address when left out
        #[clap(long)]
        client: Option<String>,
    },

    /// Switch the displays on or off
    State {
        #[command(flatten)]
        server: Server,

        #[clap(value_enum)]
        state: PowerState,
    },

    /// Ask the daemon what it shows, what it holds, or whether it is on
    Query {
        #[command(flatten)]
        server: Server,

        #[clap(value_enum)]
        query: crate::protocol::QueryKind,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct Server {
    #[clap(long, default_value = "localhost")]
    pub host: String,

    #[clap(long, default_value_t = 4242)]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MessageKind {
    Text,
    Time,
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PowerState {
    On,
    Off,
    Toggle,
}
