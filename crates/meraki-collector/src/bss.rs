use crate::fetch::Fetcher;
use crate::metric::BSS;
use crate::{prepare, Check};
use async_trait::async_trait;
use meraki_api::Result;
use meraki_common::config::{Asset, AssetConfig};
use meraki_common::types::StateResult;

/// Every basic service set broadcast by the access point, keyed by BSSID.
pub struct BssCheck;

#[async_trait]
impl Check for BssCheck {
    fn name(&self) -> &'static str {
        "bss"
    }

    fn tables(&self) -> &'static [&'static str] {
        &["basicServiceSets"]
    }

    async fn run(
        &self,
        fetcher: &Fetcher,
        asset: &Asset,
        config: &AssetConfig,
    ) -> Result<StateResult> {
        let scope = prepare(self.name(), asset, config)?;
        let sets = fetcher.records(config, &scope, &BSS).await?;

        let mut state = StateResult::with_tables(self.tables());
        state.extend("basicServiceSets", sets);
        Ok(state)
    }
}
