use camino::Utf8Path;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialPort;
use tokio_serial::SerialPortBuilderExt;

use super::DriverError;
use crate::store::Address;

const BAUD_RATE: u32 = 1200;

/// IBIS master on a tty. Displays hang off a multiplexer whose two select
/// inputs are wired to DTR (high bit) and RTS (low bit).
pub struct SerialDriver {
    port: tokio_serial::SerialStream,
}

impl SerialDriver {
    /// 1200 baud, 7 data bits, even parity, 2 stop bits.
    pub fn open(path: &Utf8Path) -> Result<Self, DriverError> {
        let port = tokio_serial::new(path.as_str(), BAUD_RATE)
            .data_bits(tokio_serial::DataBits::Seven)
            .parity(tokio_serial::Parity::Even)
            .stop_bits(tokio_serial::StopBits::Two)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|source| DriverError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self { port })
    }
}

#[async_trait::async_trait]
impl super::OutputDriver for SerialDriver {
    async fn select_channel(&mut self, address: Address) -> Result<(), DriverError> {
        let (dtr, rts) = selector_lines(address)?;

        self.port
            .write_data_terminal_ready(dtr)
            .and_then(|()| self.port.write_request_to_send(rts))
            .map_err(|source| DriverError::Select { address, source })
    }

    async fn transmit(&mut self, text: &str) -> Result<(), DriverError> {
        let telegram = super::ibis::next_stop_telegram(text);
        tracing::trace!(?telegram, "Writing telegram");

        self.port
            .write_all(&telegram)
            .await
            .map_err(DriverError::Write)?;
        self.port.flush().await.map_err(DriverError::Write)
    }
}

/// Levels of (DTR, RTS) that select `address`.
fn selector_lines(address: Address) -> Result<(bool, bool), DriverError> {
    if address > 0b11 {
        return Err(DriverError::AddressOutOfRange(address));
    }
    Ok((address & 0b10 != 0, address & 0b01 != 0))
}
