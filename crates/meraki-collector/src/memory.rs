use crate::fetch::Fetcher;
use crate::metric::MEMORY;
use crate::{prepare, Check};
use async_trait::async_trait;
use meraki_api::Result;
use meraki_common::config::{Asset, AssetConfig};
use meraki_common::types::StateResult;

/// Provisioned, used and free memory in bytes.
pub struct MemoryCheck;

#[async_trait]
impl Check for MemoryCheck {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn tables(&self) -> &'static [&'static str] {
        &["memory"]
    }

    async fn run(
        &self,
        fetcher: &Fetcher,
        asset: &Asset,
        config: &AssetConfig,
    ) -> Result<StateResult> {
        let scope = prepare(self.name(), asset, config)?;
        let memory = fetcher.records(config, &scope, &MEMORY).await?;

        let mut state = StateResult::with_tables(self.tables());
        state.extend("memory", memory);
        Ok(state)
    }
}
