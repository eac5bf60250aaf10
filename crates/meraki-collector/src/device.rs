use crate::fetch::Fetcher;
use crate::metric::{
    CHANNEL_UTILIZATION, CLIENT_COUNT, DATA_RATE, DEVICE, DEVICE_CONNECTION_STATS, DEVICE_MEMORY,
    DEVICE_PACKET_LOSS, DEVICE_SIGNAL_QUALITY, LATENCY, STATUS,
};
use crate::{network_id, prepare, Check};
use async_trait::async_trait;
use meraki_api::Result;
use meraki_common::config::{Asset, AssetConfig};
use meraki_common::types::StateResult;

/// Full device snapshot: inventory, status and every per-device metric
/// merged into one `device` row, plus per-band channel utilization.
pub struct DeviceCheck;

#[async_trait]
impl Check for DeviceCheck {
    fn name(&self) -> &'static str {
        "device"
    }

    fn tables(&self) -> &'static [&'static str] {
        &["device", "channelUtilization"]
    }

    async fn run(
        &self,
        fetcher: &Fetcher,
        asset: &Asset,
        config: &AssetConfig,
    ) -> Result<StateResult> {
        let scope = prepare(self.name(), asset, config)?;

        let mut item = fetcher.record(config, &scope, &DEVICE).await?;
        let network_id = network_id(&item)?;
        let scope = scope.with_network(&network_id);

        for metric in [
            &STATUS,
            &DEVICE_MEMORY,
            &DEVICE_PACKET_LOSS,
            &DEVICE_SIGNAL_QUALITY,
            &LATENCY,
            &DATA_RATE,
            &CLIENT_COUNT,
            &DEVICE_CONNECTION_STATS,
        ] {
            item.merge(fetcher.fields(config, &scope, metric).await?);
        }

        let channel_utilization = fetcher
            .records(config, &scope, &CHANNEL_UTILIZATION)
            .await?;

        let mut state = StateResult::with_tables(self.tables());
        state.push("device", item);
        state.extend("channelUtilization", channel_utilization);
        Ok(state)
    }
}
