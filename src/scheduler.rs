//! Decides, per channel, when to put what on the wire.
//!
//! Servicing a channel resolves what it should show, compares that with what
//! was last transmitted and sends at most one telegram. Afterwards the channel
//! is put back into a single timer queue at the instant it next needs
//! attention. Blank or disabled channels leave the queue until the control
//! side wakes them.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Local;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::content::Content;
use crate::content::Frame;
use crate::output::DriverError;
use crate::output::OutputDriver;
use crate::store::Address;
use crate::store::Channel;
use crate::store::ChannelStore;

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    /// Unchanged content is re-sent after this long.
    pub refresh_timeout: Duration,

    /// Clocks are re-resolved this often. Also the retry delay after a failed
    /// transmit and the shortest sleep between two services of a channel.
    pub poll_interval: Duration,

    /// Characters a display can take.
    pub max_text_len: usize,
}

impl RefreshSettings {
    /// Cut resolved text to the payload limit. Empty text means blank.
    fn fit(&self, text: Option<String>) -> Option<String> {
        let text = text?;
        let text = crate::charset::truncate(&text, self.max_text_len);
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// What servicing a channel decided to do.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Idle,

    /// Nothing assigned (or disabled) but the display still shows something.
    Blank,

    /// Content changed.
    Show(Option<String>),

    /// Same content again so the display does not time out.
    KeepAlive(Option<String>),

    /// Rotation moved on to `index`.
    Advance { index: usize, text: Option<String> },

    /// Active rotation item renders differently than what is on the display.
    Redraw(Option<String>),
}

impl Step {
    fn telegram_text(&self) -> Option<&str> {
        match self {
            Step::Idle => None,
            Step::Blank => Some(""),
            Step::Show(text)
            | Step::KeepAlive(text)
            | Step::Redraw(text)
            | Step::Advance { text, .. } => Some(text.as_deref().unwrap_or("")),
        }
    }
}

fn elapsed(since: Option<Instant>, now: Instant, limit: Duration) -> bool {
    since.map_or(true, |t| now.saturating_duration_since(t) >= limit)
}

fn plan(
    channel: &Channel,
    enabled: bool,
    now: Instant,
    wall: &DateTime<Local>,
    settings: &RefreshSettings,
) -> Step {
    let assignment = match &channel.assignment {
        Some(assignment) if enabled => assignment,
        _ if channel.last_rendered.is_some() => return Step::Blank,
        _ => return Step::Idle,
    };

    let keep_alive_due = elapsed(channel.last_transmit, now, settings.refresh_timeout);

    if let Content::Rotation(rotation) = &assignment.content {
        let advance = match (channel.rotation_index, channel.last_change) {
            (Some(index), Some(changed)) => {
                now.saturating_duration_since(changed) >= rotation.duration_of(index)
            }
            _ => true,
        };

        if advance {
            let index = channel
                .rotation_index
                .and_then(|i| (i + 1).checked_rem(rotation.items.len()))
                .unwrap_or(0);
            let text = rotation
                .items
                .get(index)
                .map(|frame| crate::resolver::resolve_frame(frame, wall));

            return Step::Advance {
                index,
                text: settings.fit(text),
            };
        }

        let text = settings.fit(crate::resolver::resolve(channel, wall));
        return if text != channel.last_rendered {
            Step::Redraw(text)
        } else if keep_alive_due {
            Step::KeepAlive(text)
        } else {
            Step::Idle
        };
    }

    let text = settings.fit(crate::resolver::resolve(channel, wall));
    if text != channel.last_rendered {
        Step::Show(text)
    } else if keep_alive_due {
        Step::KeepAlive(text)
    } else {
        Step::Idle
    }
}

fn record(channel: &mut Channel, step: Step, now: Instant) {
    match step {
        Step::Idle => {}
        Step::Blank => {
            channel.last_rendered = None;
            channel.last_transmit = Some(now);
            channel.last_change = Some(now);
        }
        Step::Show(text) => {
            channel.last_rendered = text;
            channel.last_transmit = Some(now);
            channel.last_change = Some(now);
        }
        Step::KeepAlive(_) => {
            channel.last_transmit = Some(now);
        }
        Step::Advance { index, text } => {
            channel.rotation_index = Some(index);
            channel.last_rendered = text;
            channel.last_transmit = Some(now);
            channel.last_change = Some(now);
        }
        Step::Redraw(text) => {
            channel.last_rendered = text;
            channel.last_transmit = Some(now);
        }
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// When the channel next needs servicing, `None` if only a wake-up can change
/// anything.
fn next_due(
    channel: &Channel,
    enabled: bool,
    now: Instant,
    settings: &RefreshSettings,
) -> Option<Instant> {
    let assignment = channel.assignment.as_ref().filter(|_| enabled)?;

    let keep_alive = match channel.last_transmit {
        Some(t) => t.checked_add(settings.refresh_timeout),
        None => Some(now),
    };
    let poll = now.checked_add(settings.poll_interval);

    let due = match &assignment.content {
        Content::Text(_) => keep_alive,
        Content::Clock(_) => poll,
        Content::Rotation(rotation) => {
            let index = channel.rotation_index.unwrap_or(0);
            let advance = match channel.last_change {
                Some(t) => t.checked_add(rotation.duration_of(index)),
                None => Some(now),
            };
            let mut due = earliest(keep_alive, advance);
            if let Some(Frame::Clock(_)) = rotation.items.get(index) {
                due = earliest(due, poll);
            }
            due
        }
    }?;

    Some(match poll {
        Some(poll) => due.max(poll),
        None => due,
    })
}

/// Min-heap of per-channel due instants. Rescheduling a channel leaves its old
/// entry in the heap; entries that no longer match `due` are skipped.
#[derive(Debug, Default)]
struct DueQueue {
    heap: BinaryHeap<Reverse<(Instant, Address)>>,
    due: BTreeMap<Address, Instant>,
}

impl DueQueue {
    fn schedule(&mut self, address: Address, at: Option<Instant>) {
        match at {
            Some(at) => {
                self.due.insert(address, at);
                self.heap.push(Reverse((at, address)));
            }
            None => {
                self.due.remove(&address);
            }
        }
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse((at, address))) = self.heap.peek() {
            if self.due.get(address) == Some(at) {
                break;
            }
            self.heap.pop();
        }
    }

    fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.heap.peek().map(|Reverse((at, _))| *at)
    }

    fn pop_due(&mut self, now: Instant) -> Option<Address> {
        self.discard_stale();
        let Reverse((at, address)) = *self.heap.peek()?;
        if at > now {
            return None;
        }
        self.heap.pop();
        self.due.remove(&address);
        Some(address)
    }
}

async fn send(
    driver: &mut dyn OutputDriver,
    address: Address,
    text: &str,
) -> Result<(), DriverError> {
    driver.select_channel(address).await?;
    driver.transmit(text).await
}

pub struct Scheduler {
    store: Arc<ChannelStore>,
    driver: Box<dyn OutputDriver>,
    settings: RefreshSettings,
    wake_receiver: mpsc::UnboundedReceiver<Address>,
    queue: DueQueue,
}

impl Scheduler {
    pub fn new(
        store: Arc<ChannelStore>,
        driver: Box<dyn OutputDriver>,
        settings: RefreshSettings,
        wake_receiver: mpsc::UnboundedReceiver<Address>,
    ) -> Self {
        Self {
            store,
            driver,
            settings,
            wake_receiver,
            queue: DueQueue::default(),
        }
    }

    /// Bring one channel up to date. Returns when it next needs servicing.
    ///
    /// The channel is locked to plan and again to record, never across the
    /// transmit. If an assignment landed in between, only what the display
    /// now shows is recorded and the channel is planned again shortly. A
    /// failed transmit records nothing, so the next service retries it.
    pub async fn service(
        &mut self,
        address: Address,
        now: Instant,
        wall: &DateTime<Local>,
    ) -> Option<Instant> {
        let store = self.store.clone();
        let enabled = store.is_enabled();
        let (step, generation) = {
            let Ok(channel) = store
                .lock(address)
                .await
                .inspect_err(|error| tracing::error!(%error, "Cannot service channel"))
            else {
                return None;
            };
            (
                plan(&channel, enabled, now, wall, &self.settings),
                channel.generation,
            )
        };

        let shown = match step.telegram_text() {
            Some(text) => {
                if let Err(error) = send(self.driver.as_mut(), address, text).await {
                    tracing::warn!(address, ?error, "Transmit failed, will retry");
                    return now.checked_add(self.settings.poll_interval);
                }
                tracing::debug!(address, ?step, "Transmitted");
                Some((!text.is_empty()).then(|| text.to_string()))
            }
            None => None,
        };

        let Ok(mut channel) = store.lock(address).await else {
            return None;
        };
        if channel.generation != generation {
            tracing::debug!(address, "Assignment changed during transmit");
            if let Some(shown) = shown {
                channel.last_rendered = shown;
            }
            return now.checked_add(self.settings.poll_interval);
        }

        record(&mut channel, step, now);
        next_due(&channel, enabled, now, &self.settings)
    }

    /// Service every channel once, regardless of when it is due.
    pub async fn tick(&mut self, now: Instant, wall: &DateTime<Local>) {
        let addresses: Vec<Address> = self.store.addresses().collect();
        for address in addresses {
            let due = self.service(address, now, wall).await;
            self.queue.schedule(address, due);
        }
    }

    /// Blank everything, show each banner line on every display, greet each
    /// display with its address, blank again.
    pub async fn selftest(&mut self, pause: Duration, banner: &[String]) {
        let addresses: Vec<Address> = self.store.addresses().collect();
        tracing::info!(?pause, "Running display self test");

        let mut steps: Vec<Vec<(Address, String)>> = Vec::new();
        steps.push(addresses.iter().map(|&a| (a, String::new())).collect());
        for line in banner {
            let line = self
                .settings
                .fit(Some(crate::charset::filter(line)))
                .unwrap_or_default();
            steps.push(addresses.iter().map(|&a| (a, line.clone())).collect());
        }
        steps.push(
            addresses
                .iter()
                .map(|&a| (a, format!("Display {a}")))
                .collect(),
        );

        for step in steps {
            for (address, text) in step {
                if let Err(error) = send(self.driver.as_mut(), address, &text).await {
                    tracing::warn!(address, ?error, "Self test transmit failed");
                }
            }
            tokio::time::sleep(pause).await;
        }

        for &address in &addresses {
            if let Err(error) = send(self.driver.as_mut(), address, "").await {
                tracing::warn!(address, ?error, "Self test transmit failed");
            }
        }
    }

    pub async fn run(mut self, cancellation_token: CancellationToken) {
        let mut wake_open = true;
        self.tick(Instant::now(), &Local::now()).await;

        loop {
            let deadline = self.queue.next_deadline();
            let sleep = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    tracing::info!("Cancelled, stopping display refresh");
                    break;
                }

                woken = self.wake_receiver.recv(), if wake_open => {
                    match woken {
                        Some(address) => {
                            tracing::trace!(address, "Channel woken");
                            self.queue.schedule(address, Some(Instant::now()));
                        }
                        None => {
                            tracing::debug!("Control side gone, no more wake-ups");
                            wake_open = false;
                        }
                    }
                }

                _ = sleep => {
                    let now = Instant::now();
                    let wall = Local::now();
                    while let Some(address) = self.queue.pop_due(now) {
                        let due = self.service(address, now, &wall).await;
                        self.queue.schedule(address, due);
                    }
                }
            }
        }
    }
}
