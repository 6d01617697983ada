//! Per-metric readers over the latest snapshot.
//!
//! Every metric is one row in [`SENSORS`]: which source it reads, how to find
//! the value inside that source, how to convert it, and the static metadata
//! the host shows. Reading never fetches; it only projects the snapshot the
//! coordinator installed.

use crate::accessor::{self, Key};
use crate::catalog::{
    CELLULAR_INFO, CELLULAR_INFO_EX, CELLULAR_STATS, SMS_INBOX_COUNT, SMS_OUTBOX_COUNT,
    STATUS_INFO_V4, STATUS_INFO_V6, THROUGHPUT, TRAFFIC_MONTHLY,
};
use crate::error::FieldAccessError;
use crate::snapshot::Snapshot;
use crate::utils::round2;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Reported for a connection list that has no active entry.
pub const CONNECTION_DISABLED: &str = "Disabled";

/// A converted metric value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Text(String),
    Integer(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Primary,
    Diagnostic,
}

/// Where a metric lives inside its source payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Locator {
    /// Fixed path from the source root
    Path(&'static [Key]),
    /// Field of the primary carrier block, whichever shape the device sent
    Primary(&'static str),
    /// Field of secondary carrier `n`; absent aggregation reads as unavailable
    Secondary(usize, &'static str),
    /// `connect_status` of the entry whose `connectivity_type` is `"1"`.
    /// The payload may be a list of entries or a single entry.
    ConnectionStatus,
}

/// Conversion applied to the located raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Strings and raw codes as the device sent them
    Identity,
    /// Like `Identity`, but an empty string is unavailable
    NonEmptyText,
    Integer,
    Float,
    /// Bytes to MiB, two decimals
    MebiBytes,
    /// Bytes to GiB, two decimals; missing or invalid reads as 0
    GibiBytes,
    /// Digit string to integer; anything else reads as 0
    Counter,
    /// `"55.34GB"` to 55.34
    Gigabytes,
    /// Connection status code to its name
    ConnectStatus,
}

impl Transform {
    /// Convert a located value.
    ///
    /// # Errors
    ///
    /// Returns a description of why the value could not be converted.
    pub fn apply(self, raw: &Value) -> Result<Reading, String> {
        match self {
            Transform::Identity => identity(raw),
            Transform::NonEmptyText => match raw {
                Value::String(s) if s.is_empty() => Err("empty string".to_string()),
                other => identity(other),
            },
            Transform::Integer => parse_int(raw).map(Reading::Integer),
            Transform::Float => parse_float(raw).map(Reading::Float),
            Transform::MebiBytes => bytes_to_mib(raw).map(Reading::Float),
            Transform::GibiBytes => Ok(Reading::Float(bytes_to_gib(Some(raw)))),
            Transform::Counter => Ok(Reading::Integer(parse_counter(Some(raw)))),
            Transform::Gigabytes => parse_gigabytes(raw).map(Reading::Float),
            Transform::ConnectStatus => Ok(Reading::Text(
                map_connect_status(raw.as_str()).to_string(),
            )),
        }
    }

    /// Value reported when the raw value is missing or unconvertible.
    ///
    /// Traffic counters report zero ("nothing counted yet") instead of unknown.
    #[must_use]
    pub fn fallback(self) -> Option<Reading> {
        match self {
            Transform::GibiBytes => Some(Reading::Float(0.0)),
            Transform::Counter => Some(Reading::Integer(0)),
            _ => None,
        }
    }
}

fn identity(raw: &Value) -> Result<Reading, String> {
    match raw {
        Value::Null => Err("null value".to_string()),
        Value::String(s) => Ok(Reading::Text(s.clone())),
        Value::Number(n) => Ok(n
            .as_i64()
            .map_or_else(|| Reading::Float(n.as_f64().unwrap_or_default()), Reading::Integer)),
        other => Ok(Reading::Text(other.to_string())),
    }
}

/// Parse an integer from a JSON number or numeric string.
///
/// # Errors
///
/// Fails on anything that is not a whole number.
pub fn parse_int(raw: &Value) -> Result<i64, String> {
    match raw {
        Value::Number(n) => n.as_i64().ok_or_else(|| format!("{n} is not an integer")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid integer '{s}': {e}")),
        other => Err(format!("expected integer, found {}", accessor::node_kind(other))),
    }
}

/// Parse a finite float from a JSON number or numeric string.
///
/// # Errors
///
/// Fails on non-numeric or non-finite input.
pub fn parse_float(raw: &Value) -> Result<f64, String> {
    let value = match raw {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{n} is not representable as f64"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid number '{s}': {e}"))?,
        other => return Err(format!("expected number, found {}", accessor::node_kind(other))),
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("non-finite number {value}"))
    }
}

/// Bytes to MiB rounded to two decimals.
///
/// # Errors
///
/// Fails when the raw value is not numeric.
pub fn bytes_to_mib(raw: &Value) -> Result<f64, String> {
    parse_float(raw).map(|bytes| round2(bytes / BYTES_PER_MIB))
}

/// Bytes to GiB rounded to two decimals. Missing or invalid input is 0.
#[must_use]
pub fn bytes_to_gib(raw: Option<&Value>) -> f64 {
    match raw.map(parse_int) {
        #[allow(clippy::cast_precision_loss)]
        Some(Ok(bytes)) => round2(bytes as f64 / BYTES_PER_MIB / 1024.0),
        _ => 0.0,
    }
}

/// Digit-only string (or non-negative integer) to a count; anything else is 0.
#[must_use]
pub fn parse_counter(raw: Option<&Value>) -> i64 {
    match raw {
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().unwrap_or(0)
        }
        Some(Value::Number(n)) => n.as_u64().and_then(|v| i64::try_from(v).ok()).unwrap_or(0),
        _ => 0,
    }
}

/// Monthly totals are reported as `"55.34GB"`.
///
/// # Errors
///
/// Fails when the value is not a string or the remainder is not a number.
pub fn parse_gigabytes(raw: &Value) -> Result<f64, String> {
    let text = raw
        .as_str()
        .ok_or_else(|| format!("expected string, found {}", accessor::node_kind(raw)))?;
    parse_float(&Value::String(text.replace("GB", "")))
}

/// Name of a connection status code.
#[must_use]
pub fn map_connect_status(code: Option<&str>) -> &'static str {
    match code {
        Some("0") => "Connected",
        Some("1") => "Connecting",
        Some("2") => "Connect Fail",
        Some("3") => "Disconnected",
        _ => "Unknown",
    }
}

/// The active connection entry of a status payload, if any.
///
/// # Errors
///
/// Fails when the payload is neither a list nor an object (typically `null`
/// because the source failed).
pub fn active_connection(payload: &Value) -> Result<Option<&Value>, FieldAccessError> {
    let is_active = |entry: &Value| entry.get("connectivity_type").and_then(Value::as_str) == Some("1");

    match payload {
        Value::Array(entries) => Ok(entries.iter().find(|entry| is_active(entry))),
        Value::Object(_) => Ok(Some(payload).filter(|entry| is_active(entry))),
        other => Err(FieldAccessError::WrongNodeKind {
            expected: "object or array",
            found: accessor::node_kind(other),
            depth: 0,
        }),
    }
}

/// Declarative description of one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSpec {
    /// Stable unique id
    pub key: &'static str,
    pub name: &'static str,
    /// Catalog source the value is read from
    pub source: &'static str,
    pub locator: Locator,
    pub transform: Transform,
    pub unit: Option<&'static str>,
    pub category: Category,
    pub icon: &'static str,
    pub description: &'static str,
}

impl SensorSpec {
    const fn new(
        key: &'static str,
        name: &'static str,
        source: &'static str,
        locator: Locator,
        transform: Transform,
    ) -> Self {
        Self {
            key,
            name,
            source,
            locator,
            transform,
            unit: None,
            category: Category::Primary,
            icon: "mdi:network",
            description: "",
        }
    }

    const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    const fn diagnostic(mut self) -> Self {
        self.category = Category::Diagnostic;
        self
    }

    const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = icon;
        self
    }

    const fn about(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Locate and convert this metric, reporting exactly why it is unavailable.
    ///
    /// # Errors
    ///
    /// Returns the path miss or conversion failure.
    pub fn evaluate(&self, snapshot: &Snapshot) -> Result<Reading, FieldAccessError> {
        let root = snapshot.source(self.source);
        let convert = |raw: &Value| self.transform.apply(raw);

        match self.locator {
            Locator::Path(path) => accessor::resolve_with(root, path, convert),
            Locator::Primary(field) => accessor::resolve_with(
                accessor::primary_component(root),
                &[Key::Field(field)],
                convert,
            ),
            Locator::Secondary(n, field) => accessor::resolve_with(
                accessor::secondary_component(root, n)?,
                &[Key::Field(field)],
                convert,
            ),
            Locator::ConnectionStatus => match active_connection(root)? {
                Some(entry) => accessor::resolve_with(entry, &[Key::Field("connect_status")], convert),
                None => Ok(Reading::Text(CONNECTION_DISABLED.to_string())),
            },
        }
    }

    /// Current value, or `None` when unavailable.
    ///
    /// A source that failed or was never fetched makes the metric unavailable;
    /// the transform's fallback only covers a miss inside a fetched payload.
    #[must_use]
    pub fn read(&self, snapshot: &Snapshot) -> Option<Reading> {
        match snapshot.entry(self.source) {
            Some(entry) if entry.is_ok() => {}
            Some(_) => {
                debug!("Sensor {} unavailable: source {} failed", self.key, self.source);
                return None;
            }
            None => return None,
        }

        match self.evaluate(snapshot) {
            Ok(reading) => Some(reading),
            Err(e) => {
                debug!("Sensor {} unavailable: {e}", self.key);
                self.transform.fallback()
            }
        }
    }
}

const fn pcc(key: &'static str, name: &'static str, field: &'static str, transform: Transform) -> SensorSpec {
    SensorSpec::new(key, name, CELLULAR_INFO_EX, Locator::Primary(field), transform).diagnostic()
}

const fn scc1(key: &'static str, name: &'static str, field: &'static str, transform: Transform) -> SensorSpec {
    SensorSpec::new(key, name, CELLULAR_INFO_EX, Locator::Secondary(1, field), transform).diagnostic()
}

const fn field(
    key: &'static str,
    name: &'static str,
    source: &'static str,
    field: &'static [Key],
    transform: Transform,
) -> SensorSpec {
    SensorSpec::new(key, name, source, Locator::Path(field), transform)
}

/// Every metric exposed to the host.
#[rustfmt::skip]
pub static SENSORS: &[SensorSpec] = &[
    // Throughput
    field("askey_reserved_down", "Allocated Bandwidth Download", THROUGHPUT, &[Key::Field("down")], Transform::MebiBytes)
        .unit("MiB").diagnostic().icon("mdi:download-network")
        .about("Shows the allocated download bandwidth (not the actual throughput)."),
    field("askey_reserved_up", "Allocated Bandwidth Upload", THROUGHPUT, &[Key::Field("up")], Transform::MebiBytes)
        .unit("MiB").diagnostic().icon("mdi:upload-network")
        .about("Shows the allocated upload bandwidth (not the actual throughput)."),
    // IPv6
    SensorSpec::new("askey_status_v6", "IPv6 Status", STATUS_INFO_V6, Locator::ConnectionStatus, Transform::ConnectStatus)
        .about("Displays the current IPv6 connectivity status."),
    field("askey_ip_v6", "External IPv6", STATUS_INFO_V6, &[Key::Field("ip")], Transform::NonEmptyText)
        .about("Displays the external IPv6 address of the device."),
    field("askey_v6_gateway", "IPv6 Gateway", STATUS_INFO_V6, &[Key::Field("gateway")], Transform::NonEmptyText)
        .diagnostic().icon("mdi:router-network")
        .about("Displays the IPv6 gateway address used for routing."),
    field("askey_v6_dns1", "IPv6 DNS 1", STATUS_INFO_V6, &[Key::Field("primary_dns")], Transform::NonEmptyText)
        .diagnostic().icon("mdi:dns"),
    field("askey_v6_dns2", "IPv6 DNS 2", STATUS_INFO_V6, &[Key::Field("secondary_dns")], Transform::NonEmptyText)
        .diagnostic().icon("mdi:dns"),
    // IPv4
    SensorSpec::new("askey_v4_status", "IPv4 Status", STATUS_INFO_V4, Locator::ConnectionStatus, Transform::ConnectStatus)
        .about("Displays the current IPv4 connectivity status."),
    field("askey_v4_ip", "External IPv4", STATUS_INFO_V4, &[Key::Field("ip")], Transform::NonEmptyText)
        .about("Displays the external IPv4 address of the device."),
    field("askey_v4_gateway", "IPv4 Gateway", STATUS_INFO_V4, &[Key::Field("gateway")], Transform::NonEmptyText)
        .diagnostic().icon("mdi:router-network")
        .about("Displays the IPv4 gateway address used for routing."),
    field("askey_ipv4_primary_dns", "IPv4 DNS 1", STATUS_INFO_V4, &[Key::Field("primary_dns")], Transform::NonEmptyText)
        .diagnostic().icon("mdi:dns"),
    field("askey_v4_secondary_dns", "IPv4 DNS 2", STATUS_INFO_V4, &[Key::Field("secondary_dns")], Transform::NonEmptyText)
        .diagnostic().icon("mdi:dns"),
    // SMS
    field("askey_sms_inbox_count", "SMS Inbox Count", SMS_INBOX_COUNT, &[Key::Field("totalcount")], Transform::Integer)
        .unit("messages").icon("mdi:message-text")
        .about("Total number of messages in the SMS inbox."),
    field("askey_sms_outbox_count", "SMS Outbox Count", SMS_OUTBOX_COUNT, &[Key::Field("totalcount")], Transform::Integer)
        .unit("messages").icon("mdi:message-text")
        .about("Total number of messages in the SMS outbox."),
    // Primary component carrier
    pcc("askey_pcc_pci", "PCC PCI", "pci", Transform::Float)
        .about("Physical Cell Identity (PCI) of PCC."),
    pcc("askey_pcc_rssi", "PCC RSSI", "rssi", Transform::Float).unit("dBm").icon("mdi:signal"),
    pcc("askey_pcc_rsrp", "PCC RSRP", "rsrp", Transform::Float).unit("dBm").icon("mdi:signal"),
    pcc("askey_pcc_rsrq", "PCC RSRQ", "rsrq", Transform::Float).unit("dB").icon("mdi:signal"),
    pcc("askey_pcc_sinr", "PCC SINR", "sinr", Transform::Float).unit("dB").icon("mdi:signal"),
    pcc("askey_pcc_band", "PCC Band", "band", Transform::Identity),
    pcc("askey_pcc_bandw", "PCC Bandwidth", "bandw", Transform::Float).unit("MHz"),
    pcc("askey_pcc_rxch", "PCC RX Channel", "rxch", Transform::Float).icon("mdi:radio-tower"),
    pcc("askey_pcc_txch", "PCC TX Channel", "txch", Transform::Float).icon("mdi:radio-tower"),
    pcc("askey_pcc_rxfreq", "PCC RX Freq", "rxfreq", Transform::Float).unit("MHz").icon("mdi:radio-tower"),
    pcc("askey_pcc_txfreq", "PCC TX Freq", "txfreq", Transform::Float).unit("MHz").icon("mdi:radio-tower"),
    // Secondary component carrier 1
    scc1("askey_scc1_pci", "SCC1 PCI", "pci", Transform::Identity)
        .about("Physical Cell Identity (PCI) of SCC1."),
    scc1("askey_scc1_rssi", "SCC1 RSSI", "rssi", Transform::Float).unit("dBm").icon("mdi:signal"),
    scc1("askey_scc1_rsrp", "SCC1 RSRP", "rsrp", Transform::Float).unit("dBm").icon("mdi:signal"),
    scc1("askey_scc1_rsrq", "SCC1 RSRQ", "rsrq", Transform::Float).unit("dB").icon("mdi:signal"),
    scc1("askey_scc1_sinr", "SCC1 SINR", "sinr", Transform::Float).unit("dB").icon("mdi:signal"),
    scc1("askey_scc1_band", "SCC1 Band", "band", Transform::Identity),
    scc1("askey_scc1_bandw", "SCC1 Bandwidth", "bandw", Transform::Float).unit("MHz"),
    scc1("askey_scc1_rxch", "SCC1 RX Channel", "rxch", Transform::Identity).icon("mdi:radio-tower"),
    scc1("askey_scc1_txch", "SCC1 TX Channel", "txch", Transform::Identity).icon("mdi:radio-tower"),
    scc1("askey_scc1_rxfreq", "SCC1 RX Freq", "rxfreq", Transform::Float).unit("MHz").icon("mdi:radio-tower"),
    scc1("askey_scc1_txfreq", "SCC1 TX Freq", "txfreq", Transform::Float).unit("MHz").icon("mdi:radio-tower"),
    // Cellular statistics since last restart
    field("askey_tx", "Current Upload", CELLULAR_STATS, &[Key::Field("tx_bytes")], Transform::GibiBytes)
        .unit("GiB").icon("mdi:upload")
        .about("Tracks the amount of data transmitted (TX) since the last restart."),
    field("askey_rx", "Current Download", CELLULAR_STATS, &[Key::Field("rx_bytes")], Transform::GibiBytes)
        .unit("GiB").icon("mdi:download")
        .about("Tracks the amount of data received (RX) since the last restart."),
    field("askey_tx_dropped", "TX Dropped", CELLULAR_STATS, &[Key::Field("tx_dropped")], Transform::Counter)
        .diagnostic().icon("mdi:packet"),
    field("askey_rx_dropped", "RX Dropped", CELLULAR_STATS, &[Key::Field("rx_dropped")], Transform::Counter)
        .diagnostic().icon("mdi:packet"),
    field("askey_tx_errors", "TX Errors", CELLULAR_STATS, &[Key::Field("tx_error")], Transform::Counter)
        .diagnostic().icon("mdi:alert-circle"),
    field("askey_rx_errors", "RX Errors", CELLULAR_STATS, &[Key::Field("rx_error")], Transform::Counter)
        .diagnostic().icon("mdi:alert-circle"),
    field("askey_tx_packets", "TX Packets", CELLULAR_STATS, &[Key::Field("tx_packets")], Transform::Counter)
        .diagnostic().icon("mdi:packet"),
    field("askey_rx_packets", "RX Packets", CELLULAR_STATS, &[Key::Field("rx_packets")], Transform::Counter)
        .diagnostic().icon("mdi:packet"),
    // Monthly traffic
    field("askey_monthly_rx", "Monthly Download", TRAFFIC_MONTHLY, &[Key::Field("rx")], Transform::Gigabytes)
        .unit("GB").icon("mdi:download").about("Monthly received traffic."),
    field("askey_monthly_tx", "Monthly Upload", TRAFFIC_MONTHLY, &[Key::Field("tx")], Transform::Gigabytes)
        .unit("GB").icon("mdi:upload").about("Monthly transmitted traffic."),
    field("askey_monthly_total", "Monthly Total", TRAFFIC_MONTHLY, &[Key::Field("total")], Transform::Gigabytes)
        .unit("GB").icon("mdi:swap-horizontal").about("Total monthly traffic."),
    field("askey_monthly_updated_datetime", "Last Traffic Update", TRAFFIC_MONTHLY, &[Key::Field("updated_datetime")], Transform::Identity)
        .icon("mdi:calendar-clock"),
    // Basic cellular info
    field("askey_pcc_type", "Connection Type", CELLULAR_INFO, &[Key::Field("type")], Transform::Identity)
        .about("Network type (LTE or 5G)"),
    field("askey_pcc_gci", "PCC GCI", CELLULAR_INFO, &[Key::Field("gci")], Transform::Identity)
        .diagnostic().about("Global Cell Identity (GCI)."),
    field("askey_pcc_mcc", "PCC MCC", CELLULAR_INFO, &[Key::Field("mcc")], Transform::Identity)
        .diagnostic().about("Mobile Country Code (MCC)."),
    field("askey_pcc_mnc", "PCC MNC", CELLULAR_INFO, &[Key::Field("mnc")], Transform::Identity)
        .diagnostic().about("Mobile Network Code (MNC)."),
    field("askey_pcc_tac", "PCC TAC", CELLULAR_INFO, &[Key::Field("tac")], Transform::Identity)
        .diagnostic().about("Tracking Area Code (TAC)."),
    field("askey_pcc_enb", "PCC ENB", CELLULAR_INFO, &[Key::Field("enb")], Transform::Identity)
        .diagnostic().about("eNodeB ID (ENB)."),
    field("askey_pcc_cqi", "PCC CQI", CELLULAR_INFO, &[Key::Field("cqi")], Transform::Integer)
        .diagnostic().icon("mdi:signal").about("Channel Quality Indicator (CQI)."),
    field("askey_pcc_count", "PCC Count", CELLULAR_INFO, &[Key::Field("count")], Transform::Integer)
        .diagnostic().icon("mdi:counter").about("Count of connected cells or measurements."),
];

/// Look a metric up by its unique id.
#[must_use]
pub fn find(key: &str) -> Option<&'static SensorSpec> {
    SENSORS.iter().find(|spec| spec.key == key)
}

/// A metric bound to the coordinator's latest snapshot.
#[derive(Debug, Clone)]
pub struct Sensor {
    spec: &'static SensorSpec,
    snapshot: watch::Receiver<Arc<Snapshot>>,
}

impl Sensor {
    #[must_use]
    pub fn new(spec: &'static SensorSpec, snapshot: watch::Receiver<Arc<Snapshot>>) -> Self {
        Self { spec, snapshot }
    }

    #[must_use]
    pub fn spec(&self) -> &'static SensorSpec {
        self.spec
    }

    #[must_use]
    pub fn value(&self) -> Option<Reading> {
        let snapshot = Arc::clone(&*self.snapshot.borrow());
        self.spec.read(&snapshot)
    }

    #[must_use]
    pub fn state(&self) -> SensorState {
        let snapshot = Arc::clone(&*self.snapshot.borrow());
        SensorState::new(self.spec, &snapshot)
    }
}

/// Serializable metadata plus current value of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub key: &'static str,
    pub name: &'static str,
    pub source: &'static str,
    pub unit: Option<&'static str>,
    pub category: Category,
    pub icon: &'static str,
    pub description: &'static str,
    pub value: Option<Reading>,
}

impl SensorState {
    #[must_use]
    pub fn new(spec: &'static SensorSpec, snapshot: &Snapshot) -> Self {
        Self {
            key: spec.key,
            name: spec.name,
            source: spec.source,
            unit: spec.unit,
            category: spec.category,
            icon: spec.icon,
            description: spec.description,
            value: spec.read(snapshot),
        }
    }
}

/// Every metric evaluated against one snapshot.
#[must_use]
pub fn read_all(snapshot: &Snapshot) -> Vec<SensorState> {
    SENSORS
        .iter()
        .map(|spec| SensorState::new(spec, snapshot))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DEFAULT_CATALOG;
    use crate::error::TransportError;
    use crate::snapshot::SourceEntry;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};

    fn snapshot_with(source: &str, value: Value) -> Snapshot {
        let mut sources = BTreeMap::new();
        sources.insert(source.to_string(), SourceEntry::ok(value));
        Snapshot::new(1, sources)
    }

    fn read(key: &str, snapshot: &Snapshot) -> Option<Reading> {
        find(key).unwrap().read(snapshot)
    }

    #[test]
    fn test_sensor_keys_unique_and_sources_polled() {
        let keys: HashSet<_> = SENSORS.iter().map(|s| s.key).collect();
        assert_eq!(keys.len(), SENSORS.len());

        let sources: HashSet<_> = DEFAULT_CATALOG.iter().map(|e| e.name).collect();
        for spec in SENSORS {
            assert!(sources.contains(spec.source), "{} reads unpolled {}", spec.key, spec.source);
        }
    }

    #[test]
    fn test_bytes_to_gib() {
        assert!((bytes_to_gib(Some(&json!("1073741824"))) - 1.0).abs() < f64::EPSILON);
        assert!((bytes_to_gib(Some(&json!(1_073_741_824_u64))) - 1.0).abs() < f64::EPSILON);
        assert!((bytes_to_gib(Some(&Value::Null))).abs() < f64::EPSILON);
        assert!((bytes_to_gib(None)).abs() < f64::EPSILON);
        assert!((bytes_to_gib(Some(&json!("bad")))).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bytes_to_mib() {
        assert_eq!(bytes_to_mib(&json!("1048576")), Ok(1.0));
        assert_eq!(bytes_to_mib(&json!("157286400")), Ok(150.0));
        assert!(bytes_to_mib(&json!("fast")).is_err());
    }

    #[test]
    fn test_map_connect_status() {
        assert_eq!(map_connect_status(Some("0")), "Connected");
        assert_eq!(map_connect_status(Some("1")), "Connecting");
        assert_eq!(map_connect_status(Some("2")), "Connect Fail");
        assert_eq!(map_connect_status(Some("3")), "Disconnected");
        assert_eq!(map_connect_status(Some("9")), "Unknown");
        assert_eq!(map_connect_status(None), "Unknown");
    }

    #[test]
    fn test_parse_gigabytes() {
        assert_eq!(parse_gigabytes(&json!("55.34GB")), Ok(55.34));
        assert!(parse_gigabytes(&json!("N/A")).is_err());
        assert!(parse_gigabytes(&json!(12)).is_err());
    }

    #[test]
    fn test_parse_counter() {
        assert_eq!(parse_counter(Some(&json!("2427066"))), 2_427_066);
        assert_eq!(parse_counter(Some(&json!("-1"))), 0);
        assert_eq!(parse_counter(Some(&json!(""))), 0);
        assert_eq!(parse_counter(None), 0);
    }

    #[test]
    fn test_monthly_traffic_readers() {
        let snapshot = snapshot_with(
            TRAFFIC_MONTHLY,
            json!({"rx": "55.34GB", "tx": "N/A", "total": "73.90GB", "updated_datetime": "2025-10-09 20:09"}),
        );
        assert_eq!(read("askey_monthly_rx", &snapshot), Some(Reading::Float(55.34)));
        assert_eq!(read("askey_monthly_tx", &snapshot), None);
        assert_eq!(read("askey_monthly_total", &snapshot), Some(Reading::Float(73.9)));
        assert_eq!(
            read("askey_monthly_updated_datetime", &snapshot),
            Some(Reading::Text("2025-10-09 20:09".to_string()))
        );
    }

    #[test]
    fn test_traffic_counters_default_to_zero() {
        let snapshot = snapshot_with(CELLULAR_STATS, json!({"tx_bytes": null, "rx_bytes": "bad"}));
        assert_eq!(read("askey_tx", &snapshot), Some(Reading::Float(0.0)));
        assert_eq!(read("askey_rx", &snapshot), Some(Reading::Float(0.0)));
        assert_eq!(read("askey_rx_packets", &snapshot), Some(Reading::Integer(0)));

        let snapshot = snapshot_with(
            CELLULAR_STATS,
            json!({"tx_bytes": "329721290", "rx_bytes": "1106203912", "tx_dropped": "0", "rx_packets": "2977705"}),
        );
        assert_eq!(read("askey_tx", &snapshot), Some(Reading::Float(0.31)));
        assert_eq!(read("askey_rx", &snapshot), Some(Reading::Float(1.03)));
        assert_eq!(read("askey_rx_packets", &snapshot), Some(Reading::Integer(2_977_705)));
        assert_eq!(read("askey_rx_errors", &snapshot), Some(Reading::Integer(0)));
    }

    #[test]
    fn test_traffic_counters_unavailable_without_source() {
        let empty = Snapshot::empty();
        assert_eq!(read("askey_tx", &empty), None);
        assert_eq!(read("askey_rx_packets", &empty), None);

        let mut sources = BTreeMap::new();
        sources.insert(
            CELLULAR_STATS.to_string(),
            SourceEntry::failed(TransportError::Network {
                cause: "connection refused".to_string(),
                endpoint: "lte/cellular_stats".to_string(),
            }),
        );
        sources.insert(SMS_INBOX_COUNT.to_string(), SourceEntry::ok(json!({"totalcount": "2"})));
        let snapshot = Snapshot::new(1, sources);

        assert_eq!(read("askey_tx", &snapshot), None);
        assert_eq!(read("askey_tx_packets", &snapshot), None);
        assert_eq!(read("askey_rx_errors", &snapshot), None);
        assert_eq!(read("askey_sms_inbox_count", &snapshot), Some(Reading::Integer(2)));
    }

    #[test]
    fn test_primary_carrier_in_both_shapes() {
        let aggregated = snapshot_with(
            CELLULAR_INFO_EX,
            json!({"data": [{"pci": "55", "rsrp": "-95.5"}, {"pci": "99", "rsrp": "-101.25"}]}),
        );
        let flat = snapshot_with(CELLULAR_INFO_EX, json!({"pci": "55", "rsrp": "-95.5"}));

        for snapshot in [&aggregated, &flat] {
            assert_eq!(read("askey_pcc_pci", snapshot), Some(Reading::Float(55.0)));
            assert_eq!(read("askey_pcc_rsrp", snapshot), Some(Reading::Float(-95.5)));
        }

        assert_eq!(
            read("askey_scc1_pci", &aggregated),
            Some(Reading::Text("99".to_string()))
        );
        assert_eq!(read("askey_scc1_rsrp", &aggregated), Some(Reading::Float(-101.25)));
        assert_eq!(read("askey_scc1_pci", &flat), None);
        assert!(matches!(
            find("askey_scc1_pci").unwrap().evaluate(&flat),
            Err(FieldAccessError::MissingKey { .. })
        ));
    }

    #[test]
    fn test_connection_status_list_and_object() {
        let list = snapshot_with(
            STATUS_INFO_V4,
            json!([
                {"connectivity_type": "0", "connect_status": "3"},
                {"connectivity_type": "1", "connect_status": "0"}
            ]),
        );
        assert_eq!(
            read("askey_v4_status", &list),
            Some(Reading::Text("Connected".to_string()))
        );

        let object = snapshot_with(
            STATUS_INFO_V4,
            json!({"connectivity_type": "1", "connect_status": "2", "ip": "10.0.0.2", "gateway": ""}),
        );
        assert_eq!(
            read("askey_v4_status", &object),
            Some(Reading::Text("Connect Fail".to_string()))
        );
        assert_eq!(
            read("askey_v4_ip", &object),
            Some(Reading::Text("10.0.0.2".to_string()))
        );
        assert_eq!(read("askey_v4_gateway", &object), None);

        let inactive = snapshot_with(STATUS_INFO_V4, json!({"connectivity_type": "0"}));
        assert_eq!(
            read("askey_v4_status", &inactive),
            Some(Reading::Text(CONNECTION_DISABLED.to_string()))
        );

        assert_eq!(read("askey_v4_status", &Snapshot::empty()), None);
    }

    #[test]
    fn test_connection_status_unknown_code() {
        let snapshot = snapshot_with(
            STATUS_INFO_V6,
            json!({"connectivity_type": "1", "connect_status": "7"}),
        );
        assert_eq!(
            read("askey_status_v6", &snapshot),
            Some(Reading::Text("Unknown".to_string()))
        );
    }

    #[test]
    fn test_throughput_in_mib() {
        let snapshot = snapshot_with(THROUGHPUT, json!({"up": "52428800", "down": "oops"}));
        assert_eq!(read("askey_reserved_up", &snapshot), Some(Reading::Float(50.0)));
        assert_eq!(read("askey_reserved_down", &snapshot), None);
    }

    #[test]
    fn test_sms_count_and_cqi() {
        let snapshot = snapshot_with(SMS_INBOX_COUNT, json!({"totalcount": "42"}));
        assert_eq!(read("askey_sms_inbox_count", &snapshot), Some(Reading::Integer(42)));
        assert_eq!(read("askey_sms_outbox_count", &snapshot), None);

        let snapshot = snapshot_with(CELLULAR_INFO, json!({"cqi": "12", "type": "LTE"}));
        assert_eq!(read("askey_pcc_cqi", &snapshot), Some(Reading::Integer(12)));
        assert_eq!(read("askey_pcc_type", &snapshot), Some(Reading::Text("LTE".to_string())));
    }

    #[test]
    fn test_sensor_follows_new_snapshots() {
        let (tx, rx) = watch::channel(Arc::new(Snapshot::empty()));
        let sensor = Sensor::new(find("askey_sms_inbox_count").unwrap(), rx);
        assert_eq!(sensor.value(), None);

        tx.send_replace(Arc::new(snapshot_with(SMS_INBOX_COUNT, json!({"totalcount": "3"}))));
        assert_eq!(sensor.value(), Some(Reading::Integer(3)));
        assert_eq!(sensor.state().unit, Some("messages"));
    }

    #[test]
    fn test_read_all_serializes() {
        let states = read_all(&Snapshot::empty());
        assert_eq!(states.len(), SENSORS.len());
        let value = serde_json::to_value(&states).unwrap();
        assert_eq!(value[0]["key"], json!("askey_reserved_down"));
        assert_eq!(value[0]["category"], json!("diagnostic"));
        assert_eq!(value[0]["value"], Value::Null);
    }
}
