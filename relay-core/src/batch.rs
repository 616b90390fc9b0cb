//! Polled batch model and incremental builder
//!
//! A [`PolledBatch`] is the unit of delivery: one agent, one host, one
//! normalized timestamp, and per device two disjoint label groups:
//! - `timeseries` : numeric samples (gauges, counters)
//! - `timefixed`  : text samples (names, versions, enumerated states)
//!
//! Pollers never touch a batch directly. They push [`DataVariable`]s into a
//! [`BatchBuilder`], which classifies each sample once and yields the
//! finished batch from [`BatchBuilder::finish`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::BuildError;
use crate::identity::AgentIdentity;

/// One delivery unit (cache files hold exactly this JSON document)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolledBatch {
    pub timestamp: i64,
    pub agent_id: String,
    pub agent_program: String,
    pub agent_hostname: String,
    pub devices: BTreeMap<String, DeviceData>,
}

/// Samples collected from one device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceData {
    pub timeseries: BTreeMap<String, TimeSeriesLabel>,
    pub timefixed: BTreeMap<String, TimeFixedLabel>,
}

/// Numeric samples sharing a label, as `[index, value]` pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSeriesLabel {
    pub description: String,
    pub base_type: DataType,
    pub data: Vec<(String, NumericValue)>,
}

/// Text samples sharing a label, as `[index, value]` pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeFixedLabel {
    pub description: String,
    pub base_type: DataType,
    pub data: Vec<(String, String)>,
}

/// Declared type of a label's samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    Counter32,
    Counter64,
    String,
}

impl DataType {
    pub fn is_numeric(self) -> bool {
        !matches!(self, DataType::String)
    }
}

/// Numeric sample value
///
/// Integers stay integers on the wire so 64-bit counters survive a cache
/// round trip. Non-negative signed values compare equal to the same unsigned
/// value, since JSON does not keep the distinction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl PartialEq for NumericValue {
    fn eq(&self, other: &Self) -> bool {
        use NumericValue::*;
        match (*self, *other) {
            (Unsigned(a), Unsigned(b)) => a == b,
            (Signed(a), Signed(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Unsigned(a), Signed(b)) | (Signed(b), Unsigned(a)) => {
                b >= 0 && a == b as u64
            }
            _ => false,
        }
    }
}

impl NumericValue {
    pub(crate) fn is_finite(self) -> bool {
        match self {
            NumericValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<u64> for NumericValue {
    fn from(v: u64) -> Self {
        NumericValue::Unsigned(v)
    }
}

impl From<i64> for NumericValue {
    fn from(v: i64) -> Self {
        if v >= 0 {
            NumericValue::Unsigned(v as u64)
        } else {
            NumericValue::Signed(v)
        }
    }
}

impl From<f64> for NumericValue {
    fn from(v: f64) -> Self {
        NumericValue::Float(v)
    }
}

/// A sample as produced by a poller, classified at the source
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Numeric {
        data_type: DataType,
        value: NumericValue,
    },
    Text(String),
}

/// One polled value addressed by device, label and index
#[derive(Debug, Clone, PartialEq)]
pub struct DataVariable {
    pub device: String,
    pub label: String,
    pub index: String,
    pub sample: Sample,
}

impl DataVariable {
    pub fn numeric(
        device: impl Into<String>,
        label: impl Into<String>,
        index: impl Into<String>,
        data_type: DataType,
        value: impl Into<NumericValue>,
    ) -> Self {
        Self {
            device: device.into(),
            label: label.into(),
            index: index.into(),
            sample: Sample::Numeric {
                data_type,
                value: value.into(),
            },
        }
    }

    pub fn text(
        device: impl Into<String>,
        label: impl Into<String>,
        index: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            label: label.into(),
            index: index.into(),
            sample: Sample::Text(value.into()),
        }
    }
}

/// Floor `now` to the polling cadence
///
/// Every agent polling at the same interval stamps its batches with the same
/// boundary, which keeps cache filenames and collector rows aligned.
pub fn normalized_timestamp(now: DateTime<Utc>, interval_secs: u64) -> i64 {
    let ts = now.timestamp();
    if interval_secs == 0 {
        return ts;
    }
    let interval = interval_secs as i64;
    ts.div_euclid(interval) * interval
}

/// Accumulates [`DataVariable`]s and yields an immutable [`PolledBatch`]
#[derive(Debug)]
pub struct BatchBuilder {
    timestamp: i64,
    agent_id: String,
    agent_program: String,
    agent_hostname: String,
    descriptions: HashMap<String, String>,
    devices: BTreeMap<String, DeviceData>,
}

impl BatchBuilder {
    pub fn new(
        timestamp: i64,
        agent_id: impl Into<String>,
        agent_program: impl Into<String>,
        agent_hostname: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            agent_id: agent_id.into(),
            agent_program: agent_program.into(),
            agent_hostname: agent_hostname.into(),
            descriptions: HashMap::new(),
            devices: BTreeMap::new(),
        }
    }

    /// Builder stamped with this agent's identity
    pub fn for_identity(identity: &AgentIdentity, timestamp: i64) -> Self {
        Self::new(
            timestamp,
            identity.agent_id.clone(),
            identity.agent_program.clone(),
            identity.hostname.clone(),
        )
    }

    /// Human-readable label descriptions (labels without one get "")
    pub fn with_descriptions(mut self, descriptions: HashMap<String, String>) -> Self {
        self.descriptions = descriptions;
        self
    }

    pub fn push(&mut self, var: DataVariable) -> Result<&mut Self, BuildError> {
        let DataVariable {
            device,
            label,
            index,
            sample,
        } = var;

        if device.is_empty() || label.is_empty() {
            return Err(BuildError::EmptyName);
        }

        let description = self.descriptions.get(&label).cloned().unwrap_or_default();
        let entry = self.devices.entry(device.clone()).or_default();

        match sample {
            Sample::Numeric { data_type, value } => {
                if !value.is_finite() {
                    return Err(BuildError::NonFiniteValue { device, label });
                }
                if !data_type.is_numeric() || entry.timefixed.contains_key(&label) {
                    return Err(BuildError::MixedLabel { device, label });
                }
                let group = entry
                    .timeseries
                    .entry(label.clone())
                    .or_insert_with(|| TimeSeriesLabel {
                        description,
                        base_type: data_type,
                        data: Vec::new(),
                    });
                if group.base_type != data_type {
                    return Err(BuildError::ConflictingType { device, label });
                }
                group.data.push((index, value));
            }
            Sample::Text(value) => {
                if entry.timeseries.contains_key(&label) {
                    return Err(BuildError::MixedLabel { device, label });
                }
                entry
                    .timefixed
                    .entry(label)
                    .or_insert_with(|| TimeFixedLabel {
                        description,
                        base_type: DataType::String,
                        data: Vec::new(),
                    })
                    .data
                    .push((index, value));
            }
        }

        Ok(self)
    }

    pub fn extend<I>(&mut self, vars: I) -> Result<&mut Self, BuildError>
    where
        I: IntoIterator<Item = DataVariable>,
    {
        for var in vars {
            self.push(var)?;
        }
        Ok(self)
    }

    pub fn finish(self) -> PolledBatch {
        PolledBatch {
            timestamp: self.timestamp,
            agent_id: self.agent_id,
            agent_program: self.agent_program,
            agent_hostname: self.agent_hostname,
            devices: self.devices,
        }
    }
}

impl PolledBatch {
    /// At least one device reporting at least one label
    pub fn is_active(&self) -> bool {
        self.devices
            .values()
            .any(|d| !d.timeseries.is_empty() || !d.timefixed.is_empty())
    }

    pub fn label_count(&self) -> usize {
        self.devices
            .values()
            .map(|d| d.timeseries.len() + d.timefixed.len())
            .sum()
    }
}
