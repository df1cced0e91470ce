// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 control reset
//!
//! Walks every control the driver exposes and writes its default value back.

use crate::errors::{DeviceError, DeviceResult};
use tracing::{debug, info};
use v4l::Device;
use v4l::control::{Control, Description, Flags, Type, Value};

/// Default of a plain-valued control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Integer(i64),
    Boolean(bool),
}

impl From<DefaultValue> for Value {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Integer(value) => Value::Integer(value),
            DefaultValue::Boolean(value) => Value::Boolean(value),
        }
    }
}

/// A control that can be restored to its default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResettableControl {
    pub id: u32,
    pub name: String,
    pub value: DefaultValue,
}

/// Default value to write back, for controls that take a plain value
fn default_value(typ: &Type, flags: Flags, default: i64) -> Option<DefaultValue> {
    let blocked = Flags::DISABLED | Flags::GRABBED | Flags::READ_ONLY | Flags::INACTIVE;
    if flags.intersects(blocked) {
        return None;
    }

    match typ {
        Type::Integer | Type::Integer64 | Type::Menu | Type::IntegerMenu => {
            Some(DefaultValue::Integer(default))
        }
        Type::Boolean => Some(DefaultValue::Boolean(default != 0)),
        // Buttons, class headers and compound controls have no default to restore
        _ => None,
    }
}

fn resettable(description: &Description) -> Option<ResettableControl> {
    let value = default_value(&description.typ, description.flags, description.default)?;
    Some(ResettableControl {
        id: description.id,
        name: description.name.clone(),
        value,
    })
}

/// Restore every writable control of `device_path` to its default
///
/// Returns the number of controls written. Individual controls the driver
/// refuses (e.g. manual exposure while auto exposure is on) are skipped.
pub fn reset_to_defaults(device_path: &str) -> DeviceResult<usize> {
    let device = Device::with_path(device_path)
        .map_err(|e| DeviceError::Control(format!("Failed to open {}: {}", device_path, e)))?;
    let controls: Vec<ResettableControl> = device
        .query_controls()
        .map_err(|e| DeviceError::Control(format!("Failed to query {}: {}", device_path, e)))?
        .iter()
        .filter_map(resettable)
        .collect();

    let mut written = 0;
    for control in &controls {
        let result = device.set_control(Control {
            id: control.id,
            value: control.value.into(),
        });

        match result {
            Ok(()) => written += 1,
            Err(e) => debug!(
                device_path,
                control = %control.name,
                error = %e,
                "Control refused its default"
            ),
        }
    }

    info!(device_path, written, total = controls.len(), "Reset device controls");
    Ok(written)
}
