use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::ListenerConfig;
use crate::control::Controller;
use crate::error::ListenerError;
use crate::protocol::Request;
use crate::protocol::Response;

/// Accept connections until cancelled. Each connection carries exactly one
/// request and gets exactly one response.
pub async fn run(
    config: ListenerConfig,
    controller: Arc<Controller>,
    cancellation_token: CancellationToken,
) -> Result<(), ListenerError> {
    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Binding { addr, source })?;
    tracing::info!(%addr, "Listening for requests");

    let config = Arc::new(config);
    loop {
        let Some(accepted) = cancellation_token
            .run_until_cancelled(listener.accept())
            .await
        else {
            tracing::info!("Cancelled, no longer accepting requests");
            break;
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(error) => {
                let pause = accept_backoff(&error);
                tracing::warn!(?error, ?pause, "Failed to accept connection");
                tokio::time::sleep(pause).await;
                continue;
            }
        };
        tracing::debug!(%peer, "Accepted connection");

        tokio::task::spawn({
            let config = config.clone();
            let controller = controller.clone();
            async move {
                if let Err(error) = handle_connection(stream, peer.ip(), &config, &controller).await
                {
                    tracing::warn!(%peer, ?error, "Failed to answer request");
                }
            }
        });
    }

    Ok(())
}

/// Errors about a single connection are retried right away. Anything else,
/// like running out of file descriptors, gets a pause first.
fn accept_backoff(error: &std::io::Error) -> Duration {
    match error.kind() {
        std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::Interrupted => Duration::ZERO,
        _ => Duration::from_millis(100),
    }
}

pub async fn handle_connection<S>(
    mut stream: S,
    origin: IpAddr,
    config: &ListenerConfig,
    controller: &Controller,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let read = read_request(&mut stream, config.max_request_size);
    let response = match tokio::time::timeout(config.read_timeout, read).await {
        Ok(Ok(Some(request))) => {
            tracing::debug!(%origin, ?request, "Received request");
            controller.handle(request, origin).await
        }
        Ok(Ok(None)) => Response::failure(),
        Ok(Err(error)) => return Err(error),
        Err(_elapsed) => {
            tracing::debug!(%origin, "Client did not finish its request in time");
            Response::failure()
        }
    };

    let mut json = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
    json.push(b'\n');
    stream.write_all(&json).await?;
    stream.shutdown().await
}

/// Read until the bytes form one complete JSON value. `None` means the
/// request was malformed, too large, or the client hung up early.
async fn read_request<S>(stream: &mut S, max_size: usize) -> std::io::Result<Option<Request>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            tracing::debug!(len = buf.len(), "Client closed before sending a complete request");
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);

        if buf.len() > max_size {
            tracing::debug!(len = buf.len(), max_size, "Request too large");
            return Ok(None);
        }

        match serde_json::from_slice::<serde_json::Value>(&buf) {
            Ok(value) => {
                return Ok(serde_json::from_value(value)
                    .inspect_err(|error| tracing::debug!(?error, "Request has the wrong shape"))
                    .ok());
            }
            Err(error) if error.is_eof() => continue,
            Err(error) => {
                tracing::debug!(?error, "Request is not valid JSON");
                return Ok(None);
            }
        }
    }
}
