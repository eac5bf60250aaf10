//! Wireless metric checks for the Meraki probe.
//!
//! Each [`Check`] implementation collects one category of metrics for an
//! access point and returns them as a [`StateResult`] of flat tables. Checks
//! resolve the device first and then issue their remaining fetches one after
//! the other through a shared [`Fetcher`].

pub mod bss;
pub mod connection;
pub mod device;
pub mod fetch;
pub mod memory;
pub mod metric;
pub mod packet;
pub mod wireless;


use async_trait::async_trait;
use fetch::Scope;
use meraki_api::{ProbeError, Result};
use meraki_common::config::{Asset, AssetConfig, EXPECTED_INTERVAL_SECS};
use meraki_common::types::{FieldValue, FlatRecord, StateResult};
use std::collections::BTreeMap;

pub use fetch::Fetcher;

/// One named category of metrics collected per poll cycle.
#[async_trait]
pub trait Check: Send + Sync {
    /// Check key as registered with the host (e.g. `"device"`, `"bss"`).
    fn name(&self) -> &'static str;

    /// Tables always present in a successful result.
    fn tables(&self) -> &'static [&'static str];

    /// Collects the check's tables for one asset.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Config`] before any request when `serial` or
    /// `org_id` is missing, otherwise the error of the first fetch that still
    /// fails after its retry.
    async fn run(
        &self,
        fetcher: &Fetcher,
        asset: &Asset,
        config: &AssetConfig,
    ) -> Result<StateResult>;
}

/// All checks the probe knows, keyed by name.
pub struct CheckRegistry {
    checks: BTreeMap<&'static str, Box<dyn Check>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        let checks: Vec<Box<dyn Check>> = vec![
            Box::new(device::DeviceCheck),
            Box::new(wireless::WirelessCheck),
            Box::new(memory::MemoryCheck),
            Box::new(packet::PacketCheck),
            Box::new(connection::ConnectionCheck),
            Box::new(bss::BssCheck),
        ];
        Self {
            checks: checks.into_iter().map(|c| (c.name(), c)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Check> {
        self.checks.get(name).map(|c| c.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checks.keys().copied()
    }

    /// Runs the named check.
    pub async fn run(
        &self,
        name: &str,
        fetcher: &Fetcher,
        asset: &Asset,
        config: &AssetConfig,
    ) -> Result<StateResult> {
        let check = self
            .get(name)
            .ok_or_else(|| ProbeError::Config(format!("unknown check `{name}`")))?;
        check.run(fetcher, asset, config).await
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates the identifiers every check needs and warns about an
/// unexpected poll interval. The query window stays fixed either way.
pub(crate) fn prepare<'a>(
    check: &str,
    asset: &Asset,
    config: &'a AssetConfig,
) -> Result<Scope<'a>> {
    let interval = config.interval_secs();
    if interval != EXPECTED_INTERVAL_SECS {
        tracing::warn!(
            check,
            asset = %asset,
            interval,
            expected = EXPECTED_INTERVAL_SECS,
            "Works best with a 5 minute interval"
        );
    }

    let org_id = config.org_id().ok_or_else(|| {
        ProbeError::Config("Missing organization ID in asset collector configuration".into())
    })?;
    let serial = config
        .serial()
        .ok_or_else(|| ProbeError::Config("Missing Serial in asset collector configuration".into()))?;

    Ok(Scope::new(org_id, serial))
}

/// Network id resolved by the device lookup.
pub(crate) fn network_id(device: &FlatRecord) -> Result<String> {
    device
        .get("networkId")
        .and_then(FieldValue::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ProbeError::Transform(format!(
                "Device with serial `{}` has no network id",
                device.name()
            ))
        })
}
