use crate::fetch::Fetcher;
use crate::metric::PACKET_LOSS;
use crate::{prepare, Check};
use async_trait::async_trait;
use meraki_api::Result;
use meraki_common::config::{Asset, AssetConfig};
use meraki_common::types::StateResult;

/// Upstream and downstream packet loss, one row per direction.
pub struct PacketCheck;

#[async_trait]
impl Check for PacketCheck {
    fn name(&self) -> &'static str {
        "packet"
    }

    fn tables(&self) -> &'static [&'static str] {
        &["loss"]
    }

    async fn run(
        &self,
        fetcher: &Fetcher,
        asset: &Asset,
        config: &AssetConfig,
    ) -> Result<StateResult> {
        let scope = prepare(self.name(), asset, config)?;
        let loss = fetcher.records(config, &scope, &PACKET_LOSS).await?;

        let mut state = StateResult::with_tables(self.tables());
        state.extend("loss", loss);
        Ok(state)
    }
}
