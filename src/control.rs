use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::arbitration::Decision;
use crate::content::Content;
use crate::persistence::StateFile;
use crate::protocol::EnableRequest;
use crate::protocol::QueryKind;
use crate::protocol::Request;
use crate::protocol::Response;
use crate::store::Address;
use crate::store::Assignment;
use crate::store::ChannelStore;

/// What the listener talks to. Writes go through arbitration, are saved right
/// away and wake the scheduler for the affected channels.
#[derive(Debug)]
pub struct Controller {
    store: Arc<ChannelStore>,

    /// Serializes saves so an older snapshot never overwrites a newer one.
    state_file: Mutex<StateFile>,

    wake_sender: mpsc::UnboundedSender<Address>,
}

impl Controller {
    pub fn new(
        store: Arc<ChannelStore>,
        state_file: StateFile,
        wake_sender: mpsc::UnboundedSender<Address>,
    ) -> Self {
        Self {
            store,
            state_file: Mutex::new(state_file),
            wake_sender,
        }
    }

    /// Answer one request. Never fails, problems are reported as
    /// `{"success": false}`.
    pub async fn handle(&self, request: Request, origin: IpAddr) -> Response {
        match request {
            Request::Enable { enable } => {
                self.enable(enable).await;
                Response::success(true)
            }

            Request::Query { query } => match query {
                QueryKind::Current => Response::Current(self.query_current().await),
                QueryKind::Buffer => Response::Buffer(self.query_assignments().await),
                QueryKind::Enabled => Response::Enabled(self.query_enabled()),
            },

            Request::Assign {
                address,
                message,
                priority,
                client,
            } => {
                let owner = client.unwrap_or_else(|| origin.to_string());
                match self.assign(address, message, priority, owner).await {
                    Ok(accepted) => Response::success(accepted),
                    Err(error) => {
                        tracing::warn!(address, %error, "Refusing assign request");
                        Response::failure()
                    }
                }
            }
        }
    }

    /// Returns whether displays are enabled afterwards.
    pub async fn enable(&self, request: EnableRequest) -> bool {
        let enabled = match request {
            EnableRequest::Set(enabled) => {
                self.store.set_enabled(enabled);
                enabled
            }
            EnableRequest::Toggle(_) => self.store.toggle_enabled(),
        };
        tracing::info!(enabled, "Display power state changed");

        for address in self.store.addresses() {
            self.wake(address);
        }
        self.persist().await;

        enabled
    }

    /// Put `content` on a display, or blank it with `None`, if arbitration
    /// allows it. A rejection is `Ok(false)`.
    pub async fn assign(
        &self,
        address: Address,
        content: Option<Content>,
        priority: i64,
        owner: String,
    ) -> Result<bool, ControlError> {
        let content = match content {
            Some(content) => {
                content.validate()?;
                Some(content.sanitized())
            }
            None => None,
        };

        tracing::debug!(address, %owner, priority, ?content, "Arbitrating assignment");
        let decision = self
            .store
            .try_assign(address, content, priority, owner.clone())
            .await?;

        match decision {
            Decision::Accept => {
                tracing::info!(address, %owner, priority, "Set display content");
                self.wake(address);
                self.persist().await;
                Ok(true)
            }
            Decision::Reject { held_priority } => {
                tracing::info!(
                    address,
                    %owner,
                    priority,
                    held_priority,
                    "Discarded request, display is held at a higher priority"
                );
                Ok(false)
            }
        }
    }

    pub async fn query_current(&self) -> BTreeMap<Address, Option<String>> {
        let mut current = BTreeMap::new();
        for address in self.store.addresses() {
            if let Ok(channel) = self.store.get(address).await {
                current.insert(address, channel.last_rendered);
            }
        }
        current
    }

    pub async fn query_assignments(&self) -> BTreeMap<Address, Option<Assignment>> {
        self.store.snapshot().await.channels
    }

    pub fn query_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    /// Save the current state. Failures are logged, memory stays
    /// authoritative.
    pub async fn persist(&self) {
        let state_file = self.state_file.lock().await;
        let snapshot = self.store.snapshot().await;
        if let Err(error) = state_file.save(&snapshot).await {
            tracing::error!(?error, "Failed to save display state");
        }
    }

    fn wake(&self, address: Address) {
        if self.wake_sender.send(address).is_err() {
            tracing::debug!(address, "Scheduler not running, not waking channel");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error("Invalid content")]
    Content(#[from] crate::content::ContentError),
}
