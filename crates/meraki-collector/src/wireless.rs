use crate::fetch::Fetcher;
use crate::metric::{
    CHANNEL_UTILIZATION, CLIENT_COUNT, DATA_RATE, DEVICE, LATENCY, SIGNAL_QUALITY, STATUS,
};
use crate::{network_id, prepare, Check};
use async_trait::async_trait;
use meraki_api::Result;
use meraki_common::config::{Asset, AssetConfig};
use meraki_common::types::{FlatRecord, StateResult};

/// Device inventory and status, network-level history (latency, data rate,
/// client count), signal quality and channel utilization as separate tables.
pub struct WirelessCheck;

#[async_trait]
impl Check for WirelessCheck {
    fn name(&self) -> &'static str {
        "wireless"
    }

    fn tables(&self) -> &'static [&'static str] {
        &["device", "network", "signalQuality", "channelUtilization"]
    }

    async fn run(
        &self,
        fetcher: &Fetcher,
        asset: &Asset,
        config: &AssetConfig,
    ) -> Result<StateResult> {
        let scope = prepare(self.name(), asset, config)?;

        let mut item = fetcher.record(config, &scope, &DEVICE).await?;
        item.set("organizationId", scope.org_id);
        let network_id = network_id(&item)?;
        let scope = scope.with_network(&network_id);

        item.merge(fetcher.fields(config, &scope, &STATUS).await?);

        let mut network = FlatRecord::new(scope.serial);
        network.set("networkId", network_id.as_str());
        for metric in [&LATENCY, &DATA_RATE, &CLIENT_COUNT] {
            network.merge(fetcher.fields(config, &scope, metric).await?);
        }

        let signal_quality = fetcher.records(config, &scope, &SIGNAL_QUALITY).await?;
        let channel_utilization = fetcher
            .records(config, &scope, &CHANNEL_UTILIZATION)
            .await?;

        let mut state = StateResult::with_tables(self.tables());
        state.push("device", item);
        state.push("network", network);
        state.extend("signalQuality", signal_quality);
        state.extend("channelUtilization", channel_utilization);
        Ok(state)
    }
}
