//! Record codec: [`PolledBatch`] <-> JSON bytes
//!
//! Encoding is canonical (device and label maps are ordered), so the same
//! batch always produces the same bytes. Decoding is strict: unknown keys,
//! missing keys, trailing data or a label in the wrong group all yield
//! [`CodecError::Corrupt`] and never a partially populated batch.

use crate::batch::PolledBatch;
use crate::error::CodecError;

pub fn encode(batch: &PolledBatch) -> Result<Vec<u8>, CodecError> {
    check_finite(batch)?;
    serde_json::to_vec(batch).map_err(CodecError::Encode)
}

/// Batches assembled by hand can carry NaN, which serde_json writes as `null`
fn check_finite(batch: &PolledBatch) -> Result<(), CodecError> {
    for (device, data) in &batch.devices {
        for (label, group) in &data.timeseries {
            if group.data.iter().any(|(_, value)| !value.is_finite()) {
                return Err(CodecError::NonFinite {
                    device: device.clone(),
                    label: label.clone(),
                });
            }
        }
    }
    Ok(())
}

pub fn decode(bytes: &[u8]) -> Result<PolledBatch, CodecError> {
    let batch: PolledBatch =
        serde_json::from_slice(bytes).map_err(|e| CodecError::Corrupt(e.to_string()))?;
    validate(&batch)?;
    Ok(batch)
}

/// Structural checks serde cannot express
fn validate(batch: &PolledBatch) -> Result<(), CodecError> {
    if batch.agent_id.is_empty() {
        return Err(CodecError::Corrupt("empty agent_id".into()));
    }
    if batch.agent_hostname.is_empty() {
        return Err(CodecError::Corrupt("empty agent_hostname".into()));
    }

    for (name, device) in &batch.devices {
        for (label, group) in &device.timeseries {
            if !group.base_type.is_numeric() {
                return Err(CodecError::Corrupt(format!(
                    "timeseries label '{label}' on device '{name}' has non-numeric base_type"
                )));
            }
            if device.timefixed.contains_key(label) {
                return Err(CodecError::Corrupt(format!(
                    "label '{label}' on device '{name}' appears in both timeseries and timefixed"
                )));
            }
        }
        for (label, group) in &device.timefixed {
            if group.base_type.is_numeric() {
                return Err(CodecError::Corrupt(format!(
                    "timefixed label '{label}' on device '{name}' has numeric base_type"
                )));
            }
        }
    }

    Ok(())
}
