//! Where resolved text ends up.

pub mod ibis;
pub mod log;
pub mod serial;

use crate::config::OutputConfig;
use crate::store::Address;

/// A bus of displays: pick one, then send it a line of text.
///
/// `transmit` receives text already cut to the payload limit. An empty string
/// blanks the selected display.
#[async_trait::async_trait]
pub trait OutputDriver: Send {
    async fn select_channel(&mut self, address: Address) -> Result<(), DriverError>;

    async fn transmit(&mut self, text: &str) -> Result<(), DriverError>;
}

pub async fn open(config: &OutputConfig) -> Result<Box<dyn OutputDriver>, DriverError> {
    match config {
        OutputConfig::Serial { device } => {
            let driver = serial::SerialDriver::open(device)?;
            tracing::info!(%device, "Opened IBIS serial line");
            Ok(Box::new(driver))
        }
        OutputConfig::Log => {
            tracing::info!("No output device configured, logging transmissions only");
            Ok(Box::new(log::LogDriver::default()))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Failed to open serial line '{}'", .path)]
    Open {
        path: camino::Utf8PathBuf,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("Display address {0} cannot be selected with two selector lines")]
    AddressOutOfRange(Address),

    #[error("Failed to select display {address}")]
    Select {
        address: Address,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("Failed to write telegram")]
    Write(#[source] std::io::Error),
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::DriverError;
    use super::OutputDriver;
    use crate::store::Address;

    /// Remembers every transmission, optionally failing on demand.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingDriver {
        selected: Option<Address>,
        sent: Arc<Mutex<Vec<(Address, String)>>>,
        failing: Arc<AtomicBool>,
        gate: Arc<Mutex<Option<TransmitGate>>>,
    }

    /// Parks every transmit until released, like a slow device.
    #[derive(Debug, Clone, Default)]
    pub struct TransmitGate {
        /// Signalled when a transmit starts waiting.
        pub started: Arc<tokio::sync::Notify>,

        /// Lets one waiting transmit finish.
        pub release: Arc<tokio::sync::Notify>,
    }

    impl RecordingDriver {
        /// Drain what was transmitted since the last call.
        pub fn take(&self) -> Vec<(Address, String)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn hold_transmits(&self) -> TransmitGate {
            let gate = TransmitGate::default();
            *self.gate.lock().unwrap() = Some(gate.clone());
            gate
        }
    }

    #[async_trait::async_trait]
    impl OutputDriver for RecordingDriver {
        async fn select_channel(&mut self, address: Address) -> Result<(), DriverError> {
            self.selected = Some(address);
            Ok(())
        }

        async fn transmit(&mut self, text: &str) -> Result<(), DriverError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DriverError::Write(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "unplugged",
                )));
            }

            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.started.notify_one();
                gate.release.notified().await;
            }

            let address = self.selected.expect("transmit without selecting a channel");
            self.sent.lock().unwrap().push((address, text.to_string()));
            Ok(())
        }
    }
}
