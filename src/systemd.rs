//! sd_notify over the datagram socket named in `NOTIFY_SOCKET`. Without that
//! variable every notification is a no-op.

#[derive(Debug)]
pub struct ProcessState {
    pub span: tracing::Span,
}

impl ProcessState {
    pub fn set_starting(&self) {
        self.report("starting", &[NotifyState::Status("starting")]);
    }

    pub fn set_running(&self) {
        self.report("ready", &[NotifyState::Ready, NotifyState::Status("running")]);
    }

    pub fn set_failed(&self) {
        self.report(
            "failed,stopping",
            &[NotifyState::Status("failed"), NotifyState::Stopping],
        );
    }

    pub fn set_finished(&self) {
        self.report("stopping", &[NotifyState::Stopping]);
    }

    fn report(&self, status: &str, states: &[NotifyState<'_>]) {
        tracing::debug!(parent: &self.span, status, "Setting service status");
        match notify(states) {
            Err(error) => {
                tracing::error!(parent: &self.span, ?error, "Failed to notify systemd of state change");
            }
            Ok(false) => {}
            Ok(true) => {
                tracing::info!(
                    parent: &self.span,
                    status,
                    "Successfully notified systemd of service status"
                );
            }
        }
    }
}

#[derive(Clone, Debug)]
enum NotifyState<'a> {
    /// Service startup is finished.
    Ready,

    Stopping,

    /// Free-form status message for the service manager.
    Status(&'a str),
}

impl std::fmt::Display for NotifyState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyState::Ready => write!(f, "READY=1"),
            NotifyState::Stopping => write!(f, "STOPPING=1"),
            NotifyState::Status(msg) => write!(f, "STATUS={msg}"),
        }
    }
}

fn connect_notify_socket() -> std::io::Result<Option<std::os::unix::net::UnixDatagram>> {
    let Some(socket_path) = std::env::var_os("NOTIFY_SOCKET") else {
        return Ok(None);
    };

    let sock = std::os::unix::net::UnixDatagram::unbound()?;
    sock.connect(socket_path)?;
    Ok(Some(sock))
}

/// Returns whether a service manager was there to be told.
fn notify(states: &[NotifyState<'_>]) -> std::io::Result<bool> {
    let Some(sock) = connect_notify_socket()? else {
        return Ok(false);
    };

    send(&sock, states)?;
    Ok(true)
}

fn send(sock: &std::os::unix::net::UnixDatagram, states: &[NotifyState<'_>]) -> std::io::Result<()> {
    let msg = message(states);
    let len = sock.send(msg.as_bytes())?;

    if len != msg.len() {
        Err(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "incomplete write",
        ))
    } else {
        Ok(())
    }
}

fn message(states: &[NotifyState<'_>]) -> String {
    use std::fmt::Write;

    let mut msg = String::new();
    for s in states {
        let _ = writeln!(msg, "{s}");
    }
    msg
}
