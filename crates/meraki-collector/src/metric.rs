//! Declarative description of every upstream resource the probe reads.
//!
//! A [`Metric`] says where a resource lives, how to tell an empty window from
//! data, which object(s) to turn into rows and how each output field is
//! derived. [`crate::fetch::Fetcher`] is the only code that interprets them.

use serde::{Deserialize, Serialize};

/// Test applied to the raw body before any field is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Fail when the body is an empty list or object.
    NonEmpty,
    /// Fail unless the body is an object with a non-empty `items` list.
    Items,
}

/// Which part of the body the rows are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Select {
    Whole,
    First,
    FirstItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rows {
    /// One row from the selected object.
    Single,
    /// One row per element of the list at `path`. A missing list is an error
    /// only when `required` is set.
    Each {
        path: &'static [&'static str],
        required: bool,
    },
    /// One row per named child object, named after the key.
    Keys(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// JSON path relative to the row object.
    Path(&'static [&'static str]),
    Serial,
    NetworkId,
    /// Key of the child object for [`Rows::Keys`].
    RowKey,
    /// Value of the `Running software version` entry in `details`.
    SoftwareVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Scalar copied as-is, `null` included. A missing key is an error.
    Raw,
    /// Missing, `null` and empty strings become `null`.
    OptionalStr,
    /// Number or numeric string as float, `null` preserved.
    Float,
    /// As [`Conversion::Float`] but `null` reads as `0.0`.
    FloatOrZero,
    /// Number multiplied by a unit factor. `null` means the data is not ready.
    Scaled(i64),
    /// ISO-8601 string to epoch seconds, `null` when it cannot be parsed.
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub source: Source,
    pub conversion: Conversion,
}

const fn raw(name: &'static str, path: &'static [&'static str]) -> Field {
    Field {
        name,
        source: Source::Path(path),
        conversion: Conversion::Raw,
    }
}

const fn conv(name: &'static str, path: &'static [&'static str], conversion: Conversion) -> Field {
    Field {
        name,
        source: Source::Path(path),
        conversion,
    }
}

const fn from(name: &'static str, source: Source) -> Field {
    Field {
        name,
        source,
        conversion: Conversion::Raw,
    }
}

/// Delay class used between the two attempts of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Fixed short delay.
    Light,
    /// Base delay plus jitter, for history endpoints that lag real time.
    Critical,
}

/// What a check does when a metric still fails after its retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole check.
    #[default]
    Propagate,
    /// Emit the metric's fields as `null` and carry on.
    NullFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub key: &'static str,
    pub label: &'static str,
    pub path: &'static str,
    pub presence: Presence,
    pub select: Select,
    pub rows: Rows,
    pub fields: &'static [Field],
    pub retry: RetryClass,
    pub on_failure: FailurePolicy,
}

const DEVICES_PATH: &str = "/organizations/{org_id}/devices?serials[]={serial}";
const STATUSES_PATH: &str = "/organizations/{org_id}/devices/statuses?serials[]={serial}";
const MEMORY_PATH: &str = "/organizations/{org_id}/devices/system/memory/usage/history/byInterval?serials[]={serial}&interval=300&timespan=300";
const PACKET_LOSS_PATH: &str =
    "/organizations/{org_id}/wireless/devices/packetLoss/byDevice?timespan=300&serials[]={serial}";
const CHANNEL_UTILIZATION_PATH: &str = "/organizations/{org_id}/wireless/devices/channelUtilization/byDevice?interval=300&timespan=300&serials[]={serial}";
const SIGNAL_QUALITY_PATH: &str = "/networks/{network_id}/wireless/signalQualityHistory?timespan=300&resolution=300&deviceSerial={serial}";
const LATENCY_PATH: &str = "/networks/{network_id}/wireless/latencyHistory?timespan=300&resolution=300&deviceSerial={serial}";
const DATA_RATE_PATH: &str = "/networks/{network_id}/wireless/dataRateHistory?timespan=300&resolution=300&deviceSerial={serial}";
const CLIENT_COUNT_PATH: &str = "/networks/{network_id}/wireless/clientCountHistory?timespan=300&resolution=300&deviceSerial={serial}";
const CONNECTION_STATS_PATH: &str = "/devices/{serial}/wireless/connectionStats?timespan=300";
const BSS_PATH: &str = "/devices/{serial}/wireless/status";

const KB: i64 = 1000;
// kbps -> bytes per second
const KBPS: i64 = 125;

pub const DEVICE: Metric = Metric {
    key: "device",
    label: "Device",
    path: DEVICES_PATH,
    presence: Presence::NonEmpty,
    select: Select::First,
    rows: Rows::Single,
    fields: &[
        raw("name", &["serial"]),
        raw("deviceName", &["name"]),
        raw("mac", &["mac"]),
        raw("networkId", &["networkId"]),
        raw("productType", &["productType"]),
        raw("model", &["model"]),
        conv("address", &["address"], Conversion::OptionalStr),
        conv("lat", &["lat"], Conversion::Float),
        conv("lng", &["lng"], Conversion::Float),
        conv("notes", &["notes"], Conversion::OptionalStr),
        conv(
            "configurationUpdatedAt",
            &["configurationUpdatedAt"],
            Conversion::Timestamp,
        ),
        raw("firmware", &["firmware"]),
        Field {
            name: "runningSoftwareVersion",
            source: Source::SoftwareVersion,
            conversion: Conversion::OptionalStr,
        },
    ],
    retry: RetryClass::Light,
    on_failure: FailurePolicy::Propagate,
};

pub const STATUS: Metric = Metric {
    key: "status",
    label: "Device status",
    path: STATUSES_PATH,
    presence: Presence::NonEmpty,
    select: Select::First,
    rows: Rows::Single,
    fields: &[
        raw("status", &["status"]),
        conv("lastReportedAt", &["lastReportedAt"], Conversion::Timestamp),
        conv("lanIp", &["lanIp"], Conversion::OptionalStr),
        conv("gateway", &["gateway"], Conversion::OptionalStr),
        conv("ipType", &["ipType"], Conversion::OptionalStr),
        conv("primaryDns", &["primaryDns"], Conversion::OptionalStr),
        conv("secondaryDns", &["secondaryDns"], Conversion::OptionalStr),
    ],
    retry: RetryClass::Light,
    on_failure: FailurePolicy::Propagate,
};

pub const MEMORY: Metric = Metric {
    key: "memory",
    label: "Memory history",
    path: MEMORY_PATH,
    presence: Presence::Items,
    select: Select::FirstItem,
    rows: Rows::Single,
    fields: &[
        from("name", Source::Serial),
        conv("provisioned", &["provisioned"], Conversion::Scaled(KB)),
        conv("used", &["used", "median"], Conversion::Scaled(KB)),
        conv("free", &["free", "median"], Conversion::Scaled(KB)),
    ],
    retry: RetryClass::Critical,
    on_failure: FailurePolicy::Propagate,
};

pub const DEVICE_MEMORY: Metric = Metric {
    fields: &[
        conv("memoryProvisioned", &["provisioned"], Conversion::Scaled(KB)),
        conv("memoryUsed", &["used", "median"], Conversion::Scaled(KB)),
        conv("memoryFree", &["free", "median"], Conversion::Scaled(KB)),
    ],
    ..MEMORY
};

pub const PACKET_LOSS: Metric = Metric {
    key: "packetLoss",
    label: "Packet loss",
    path: PACKET_LOSS_PATH,
    presence: Presence::NonEmpty,
    select: Select::First,
    rows: Rows::Keys(&["upstream", "downstream"]),
    fields: &[
        from("name", Source::RowKey),
        raw("total", &["total"]),
        raw("lost", &["lost"]),
        conv("lossPercentage", &["lossPercentage"], Conversion::FloatOrZero),
    ],
    retry: RetryClass::Critical,
    on_failure: FailurePolicy::Propagate,
};

pub const DEVICE_PACKET_LOSS: Metric = Metric {
    rows: Rows::Single,
    fields: &[
        raw("upstreamTotal", &["upstream", "total"]),
        raw("upstreamLost", &["upstream", "lost"]),
        conv(
            "upstreamLossPercentage",
            &["upstream", "lossPercentage"],
            Conversion::FloatOrZero,
        ),
        raw("downstreamTotal", &["downstream", "total"]),
        raw("downstreamLost", &["downstream", "lost"]),
        conv(
            "downstreamLossPercentage",
            &["downstream", "lossPercentage"],
            Conversion::FloatOrZero,
        ),
    ],
    ..PACKET_LOSS
};

pub const CHANNEL_UTILIZATION: Metric = Metric {
    key: "channelUtilization",
    label: "Channel utilization",
    path: CHANNEL_UTILIZATION_PATH,
    presence: Presence::NonEmpty,
    select: Select::First,
    rows: Rows::Each {
        path: &["byBand"],
        required: false,
    },
    fields: &[
        raw("name", &["band"]),
        from("serial", Source::Serial),
        conv("wifiPercentage", &["wifi", "percentage"], Conversion::Float),
        conv("nonWifiPercentage", &["nonWifi", "percentage"], Conversion::Float),
        conv("totalPercentage", &["total", "percentage"], Conversion::Float),
    ],
    retry: RetryClass::Critical,
    on_failure: FailurePolicy::Propagate,
};

pub const SIGNAL_QUALITY: Metric = Metric {
    key: "signalQuality",
    label: "Signal quality",
    path: SIGNAL_QUALITY_PATH,
    presence: Presence::NonEmpty,
    select: Select::First,
    rows: Rows::Single,
    fields: &[
        from("name", Source::Serial),
        from("networkId", Source::NetworkId),
        raw("snr", &["snr"]),
        raw("rssi", &["rssi"]),
    ],
    retry: RetryClass::Critical,
    on_failure: FailurePolicy::Propagate,
};

pub const DEVICE_SIGNAL_QUALITY: Metric = Metric {
    fields: &[
        raw("signalQualitySnr", &["snr"]),
        raw("signalQualityRssi", &["rssi"]),
    ],
    ..SIGNAL_QUALITY
};

pub const LATENCY: Metric = Metric {
    key: "latency",
    label: "Latency",
    path: LATENCY_PATH,
    presence: Presence::NonEmpty,
    select: Select::First,
    rows: Rows::Single,
    fields: &[raw("avgLatencyMs", &["avgLatencyMs"])],
    retry: RetryClass::Critical,
    on_failure: FailurePolicy::Propagate,
};

pub const DATA_RATE: Metric = Metric {
    key: "dataRate",
    label: "Data rate",
    path: DATA_RATE_PATH,
    presence: Presence::NonEmpty,
    select: Select::First,
    rows: Rows::Single,
    fields: &[
        conv("averageBps", &["averageKbps"], Conversion::Scaled(KBPS)),
        conv("downloadBps", &["downloadKbps"], Conversion::Scaled(KBPS)),
        conv("uploadBps", &["uploadKbps"], Conversion::Scaled(KBPS)),
    ],
    retry: RetryClass::Critical,
    on_failure: FailurePolicy::Propagate,
};

pub const CLIENT_COUNT: Metric = Metric {
    key: "clientCount",
    label: "Client count",
    path: CLIENT_COUNT_PATH,
    presence: Presence::NonEmpty,
    select: Select::First,
    rows: Rows::Single,
    fields: &[raw("clientCount", &["clientCount"])],
    retry: RetryClass::Critical,
    on_failure: FailurePolicy::Propagate,
};

pub const CONNECTION_STATS: Metric = Metric {
    key: "connectionStats",
    label: "Connection stats",
    path: CONNECTION_STATS_PATH,
    presence: Presence::NonEmpty,
    select: Select::Whole,
    rows: Rows::Single,
    fields: &[
        from("name", Source::Serial),
        raw("assoc", &["connectionStats", "assoc"]),
        raw("auth", &["connectionStats", "auth"]),
        raw("dhcp", &["connectionStats", "dhcp"]),
        raw("dns", &["connectionStats", "dns"]),
        raw("success", &["connectionStats", "success"]),
    ],
    retry: RetryClass::Light,
    on_failure: FailurePolicy::Propagate,
};

pub const DEVICE_CONNECTION_STATS: Metric = Metric {
    fields: &[
        raw("connectionStatsAssoc", &["connectionStats", "assoc"]),
        raw("connectionStatsAuth", &["connectionStats", "auth"]),
        raw("connectionStatsDhcp", &["connectionStats", "dhcp"]),
        raw("connectionStatsDns", &["connectionStats", "dns"]),
        raw("connectionStatsSuccess", &["connectionStats", "success"]),
    ],
    ..CONNECTION_STATS
};

pub const BSS: Metric = Metric {
    key: "bss",
    label: "Basic service sets",
    path: BSS_PATH,
    presence: Presence::NonEmpty,
    select: Select::Whole,
    rows: Rows::Each {
        path: &["basicServiceSets"],
        required: true,
    },
    fields: &[
        raw("name", &["bssid"]),
        raw("ssidName", &["ssidName"]),
        raw("ssidNumber", &["ssidNumber"]),
        raw("enabled", &["enabled"]),
        raw("band", &["band"]),
        raw("channel", &["channel"]),
        raw("channelWidth", &["channelWidth"]),
        raw("power", &["power"]),
        raw("visible", &["visible"]),
        raw("broadcasting", &["broadcasting"]),
    ],
    retry: RetryClass::Light,
    on_failure: FailurePolicy::Propagate,
};

/// Every metric, in no particular order. Used to validate policy overrides.
pub const ALL: &[&Metric] = &[
    &DEVICE,
    &STATUS,
    &MEMORY,
    &DEVICE_MEMORY,
    &PACKET_LOSS,
    &DEVICE_PACKET_LOSS,
    &CHANNEL_UTILIZATION,
    &SIGNAL_QUALITY,
    &DEVICE_SIGNAL_QUALITY,
    &LATENCY,
    &DATA_RATE,
    &CLIENT_COUNT,
    &CONNECTION_STATS,
    &DEVICE_CONNECTION_STATS,
    &BSS,
];

pub fn is_known_key(key: &str) -> bool {
    ALL.iter().any(|metric| metric.key == key)
}

/// Whether `key` may be switched to [`FailurePolicy::NullFields`]. The device
/// lookup resolves the row name and network id every later fetch needs, so it
/// always propagates.
pub fn accepts_null_fields(key: &str) -> bool {
    is_known_key(key) && key != DEVICE.key
}
