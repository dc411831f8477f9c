//! The `send`, `state` and `query` subcommands: build one request, send it to
//! a running daemon, print the reply.

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;

use crate::cli::ClientCommand;
use crate::cli::MessageKind;
use crate::cli::PowerState;
use crate::cli::Server;
use crate::content::Clock;
use crate::content::Content;
use crate::content::ContentError;
use crate::content::Frame;
use crate::content::Rotation;
use crate::content::Seconds;
use crate::content::Text;
use crate::protocol::EnableRequest;
use crate::protocol::Request;
use crate::protocol::Toggle;

pub async fn run(command: ClientCommand) -> Result<(), ClientError> {
    let expects_status = !matches!(command, ClientCommand::Query { .. });
    let (server, request) = request(command)?;
    tracing::debug!(host = %server.host, port = server.port, ?request, "Sending request");

    let reply = exchange(&server, &request).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&reply).map_err(ClientError::Reply)?
    );

    if expects_status && reply.get("success") != Some(&serde_json::Value::Bool(true)) {
        return Err(ClientError::Refused);
    }
    Ok(())
}

pub fn request(command: ClientCommand) -> Result<(Server, Request), ClientError> {
    let request = match command {
        ClientCommand::Send {
            server,
            display,
            kind,
            value,
            interval,
            priority,
            client,
        } => {
            let message = value
                .map(|value| message(kind, &value, interval))
                .transpose()?;
            let request = Request::Assign {
                address: display,
                message,
                priority,
                client,
            };
            (server, request)
        }

        ClientCommand::State { server, state } => {
            let enable = match state {
                PowerState::On => EnableRequest::Set(true),
                PowerState::Off => EnableRequest::Set(false),
                PowerState::Toggle => EnableRequest::Toggle(Toggle::Toggle),
            };
            (server, Request::Enable { enable })
        }

        ClientCommand::Query { server, query } => (server, Request::Query { query }),
    };

    Ok(request)
}

pub fn message(kind: MessageKind, value: &str, interval: f64) -> Result<Content, ContentError> {
    let content = match kind {
        MessageKind::Text => Content::Text(Text {
            text: value.to_string(),
            duration: None,
        }),
        MessageKind::Time => Content::Clock(Clock {
            format: value.to_string(),
            duration: None,
        }),
        MessageKind::Sequence => Content::Rotation(sequence(value, interval)?),
    };
    Ok(content)
}

/// `item~secs|item|...`. An item with a `%x` directive is a clock, anything
/// else is text. A trailing `~` part that is not a number stays in the text.
pub fn sequence(value: &str, interval: f64) -> Result<Rotation, ContentError> {
    let items = value
        .split('|')
        .map(|item| {
            let (item, duration) = match item.rsplit_once('~') {
                Some((head, secs)) => match secs.trim().parse::<f64>() {
                    Ok(secs) => (head, Some(Seconds::try_from(secs)?)),
                    Err(_) => (item, None),
                },
                None => (item, None),
            };

            let frame = if has_time_directive(item) {
                Frame::Clock(Clock {
                    format: item.to_string(),
                    duration,
                })
            } else {
                Frame::Text(Text {
                    text: item.to_string(),
                    duration,
                })
            };
            Ok(frame)
        })
        .collect::<Result<Vec<_>, ContentError>>()?;

    Ok(Rotation {
        items,
        default_duration: Seconds::try_from(interval)?,
    })
}

fn has_time_directive(item: &str) -> bool {
    item.as_bytes()
        .windows(2)
        .any(|pair| pair[0] == b'%' && pair[1].is_ascii_alphabetic())
}

async fn exchange(server: &Server, request: &Request) -> Result<serde_json::Value, ClientError> {
    let mut stream = tokio::net::TcpStream::connect((server.host.as_str(), server.port))
        .await
        .map_err(|source| ClientError::Connecting {
            host: server.host.clone(),
            port: server.port,
            source,
        })?;

    let json = serde_json::to_vec(request).map_err(ClientError::Reply)?;
    stream.write_all(&json).await.map_err(ClientError::Io)?;
    stream.shutdown().await.map_err(ClientError::Io)?;

    let mut reply = Vec::new();
    stream
        .read_to_end(&mut reply)
        .await
        .map_err(ClientError::Io)?;
    serde_json::from_slice(&reply).map_err(ClientError::Reply)
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("Failed to connect to {host}:{port}")]
    Connecting {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to the daemon failed")]
    Io(#[source] std::io::Error),

    #[error("Daemon reply is not valid JSON")]
    Reply(#[source] serde_json::Error),

    #[error("The daemon refused the request")]
    Refused,
}
