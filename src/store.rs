use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tokio::time::Instant;

use crate::arbitration::Decision;
use crate::content::Content;

pub type Address = u8;

/// Content assigned to a channel, together with who assigned it and how
/// important it is.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Assignment {
    #[serde(rename = "message")]
    pub content: Content,

    pub priority: i64,

    #[serde(rename = "client")]
    pub owner: String,
}

#[derive(Debug, Default, Clone)]
pub struct Channel {
    pub assignment: Option<Assignment>,

    /// Active rotation item, `None` until the scheduler starts the rotation.
    pub rotation_index: Option<usize>,
    pub last_transmit: Option<Instant>,
    pub last_change: Option<Instant>,

    /// What the display shows right now, `None` when blank.
    pub last_rendered: Option<String>,

    /// Bumped by every assignment. Lets the scheduler notice a write that
    /// landed while it was transmitting without the lock.
    pub generation: u64,
}

impl Channel {
    /// Priority of the current assignment, `None` when the channel is empty.
    pub fn priority(&self) -> Option<i64> {
        self.assignment.as_ref().map(|a| a.priority)
    }

    pub fn owner(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.owner.as_str())
    }

    /// Replace the assignment and restart rotation and refresh bookkeeping.
    ///
    /// `last_rendered` is left alone, it tracks the physical display.
    pub fn assign(&mut self, assignment: Option<Assignment>) {
        self.assignment = assignment;
        self.generation = self.generation.wrapping_add(1);
        self.rotation_index = None;
        self.last_transmit = None;
        self.last_change = None;
    }
}

/// Everything that survives a restart.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub enabled: bool,
    pub channels: BTreeMap<Address, Option<Assignment>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: BTreeMap::new(),
        }
    }
}

/// Per-channel state, one lock per channel.
#[derive(Debug)]
pub struct ChannelStore {
    channels: Vec<Mutex<Channel>>,
    enabled: AtomicBool,
}

impl ChannelStore {
    pub fn new(channel_count: u8) -> Self {
        Self {
            channels: (0..channel_count)
                .map(|_| Mutex::new(Channel::default()))
                .collect(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn addresses(&self) -> impl Iterator<Item = Address> {
        // The constructor takes a u8 count, so every index fits.
        (0..self.channels.len()).map(|i| i as Address)
    }

    pub async fn lock(&self, address: Address) -> Result<MutexGuard<'_, Channel>, StoreError> {
        let channel = self
            .channels
            .get(usize::from(address))
            .ok_or(StoreError::UnknownAddress(address))?;
        Ok(channel.lock().await)
    }

    pub async fn get(&self, address: Address) -> Result<Channel, StoreError> {
        Ok(self.lock(address).await?.clone())
    }

    pub async fn set_assignment(
        &self,
        address: Address,
        content: Content,
        priority: i64,
        owner: String,
    ) -> Result<(), StoreError> {
        self.lock(address).await?.assign(Some(Assignment {
            content,
            priority,
            owner,
        }));
        Ok(())
    }

    pub async fn clear(&self, address: Address) -> Result<(), StoreError> {
        self.lock(address).await?.assign(None);
        Ok(())
    }

    /// Arbitrate and write in one critical section. `None` content blanks
    /// the channel.
    pub async fn try_assign(
        &self,
        address: Address,
        content: Option<Content>,
        priority: i64,
        owner: String,
    ) -> Result<Decision, StoreError> {
        let mut channel = self.lock(address).await?;
        let decision = crate::arbitration::decide(&channel, priority, &owner);
        if decision.is_accepted() {
            channel.assign(content.map(|content| Assignment {
                content,
                priority,
                owner,
            }));
        }
        Ok(decision)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns the previous value.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst)
    }

    /// Flip the enabled flag, returning the new value.
    pub fn toggle_enabled(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Snapshot {
        let mut channels = BTreeMap::new();
        for address in self.addresses() {
            let channel = self.channels[usize::from(address)].lock().await;
            channels.insert(address, channel.assignment.clone());
        }

        Snapshot {
            enabled: self.is_enabled(),
            channels,
        }
    }

    /// Load a snapshot. Entries for addresses this store does not have and
    /// invalid content are skipped.
    pub async fn restore(&self, snapshot: Snapshot) {
        for (address, assignment) in snapshot.channels {
            if let Some(Assignment { content, .. }) = &assignment {
                if let Err(error) = content.validate() {
                    tracing::warn!(address, %error, "Skipping invalid stored content");
                    continue;
                }
            }

            let restored = match assignment {
                Some(Assignment {
                    content,
                    priority,
                    owner,
                }) => {
                    self.set_assignment(address, content.sanitized(), priority, owner)
                        .await
                }
                None => self.clear(address).await,
            };
            if let Err(error) = restored {
                tracing::warn!(%error, "Skipping stored channel");
            }
        }

        self.set_enabled(snapshot.enabled);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No display with address {0}")]
    UnknownAddress(Address),
}
