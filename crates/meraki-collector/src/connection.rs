use crate::fetch::Fetcher;
use crate::metric::CONNECTION_STATS;
use crate::{prepare, Check};
use async_trait::async_trait;
use meraki_api::Result;
use meraki_common::config::{Asset, AssetConfig};
use meraki_common::types::StateResult;

pub struct ConnectionCheck;

#[async_trait]
impl Check for ConnectionCheck {
    fn name(&self) -> &'static str {
        "connection"
    }

    fn tables(&self) -> &'static [&'static str] {
        &["stats"]
    }

    async fn run(
        &self,
        fetcher: &Fetcher,
        asset: &Asset,
        config: &AssetConfig,
    ) -> Result<StateResult> {
        let scope = prepare(self.name(), asset, config)?;
        let stats = fetcher.records(config, &scope, &CONNECTION_STATS).await?;

        let mut state = StateResult::with_tables(self.tables());
        state.extend("stats", stats);
        Ok(state)
    }
}
