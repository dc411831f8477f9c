use crate::store::Address;

/// Dry-run output: transmissions only show up in the log.
#[derive(Debug, Default)]
pub struct LogDriver {
    selected: Option<Address>,
}

#[async_trait::async_trait]
impl super::OutputDriver for LogDriver {
    async fn select_channel(&mut self, address: Address) -> Result<(), super::DriverError> {
        self.selected = Some(address);
        Ok(())
    }

    async fn transmit(&mut self, text: &str) -> Result<(), super::DriverError> {
        tracing::info!(address = ?self.selected, ?text, "Transmit");
        Ok(())
    }
}
