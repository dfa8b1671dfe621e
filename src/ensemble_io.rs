//! Ensemble member discovery and NetCDF field reading
//!
//! Members for an analysis time live in one directory per timestamp:
//!
//! ```text
//! <data_root>/20100104_06/mem001.nc4
//! <data_root>/20100104_06/mem002.nc4
//! ```

use crate::errors::{Result, RuEnsError};
use crate::variables::VariableKind;
use chrono::NaiveDateTime;
use ndarray::{ArrayD, IxDyn};
use netcdf::{AttributeValue, Variable};
use std::path::{Path, PathBuf};

/// Directory name format for one analysis time
pub const MEMBER_DIR_FORMAT: &str = "%Y%m%d_%H";

/// Magnitudes at or above this are undefined in the ensemble output
pub const UNDEFINED_THRESHOLD: f32 = 1.0e14;

const MEMBER_EXTENSIONS: &[&str] = &["nc", "nc4"];

/// Directory holding the members of analysis time `t`
pub fn member_dir(data_root: &Path, t: NaiveDateTime) -> PathBuf {
    data_root.join(t.format(MEMBER_DIR_FORMAT).to_string())
}

/// Member files for `t`, sorted by name; empty if the directory is missing
pub fn discover_members(data_root: &Path, t: NaiveDateTime) -> Result<Vec<PathBuf>> {
    let dir = member_dir(data_root, t);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut members = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        let is_member = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| MEMBER_EXTENSIONS.contains(&e));
        if is_member {
            members.push(path);
        }
    }
    members.sort();
    Ok(members)
}

/// Read `var_name` from one member as a `[lev, lat, lon]` or `[lat, lon]` field
///
/// Leading singleton axes (the file's `time` axis) are dropped. Fill values
/// and undefined values become NaN.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the variable is missing, or
/// its rank does not match `kind`.
pub fn read_field(path: &Path, var_name: &str, kind: VariableKind) -> Result<ArrayD<f32>> {
    let file = netcdf::open(path)?;
    let var = file
        .variable(var_name)
        .ok_or_else(|| RuEnsError::VariableNotFound {
            var: format!("{var_name} (in {})", path.display()),
        })?;

    let mut shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    while shape.len() > kind.field_rank() && shape[0] == 1 {
        shape.remove(0);
    }
    if shape.len() != kind.field_rank() {
        return Err(RuEnsError::ShapeMismatch {
            var: var_name.to_string(),
            expected: match kind {
                VariableKind::ThreeD => "[lev, lat, lon]".to_string(),
                VariableKind::TwoD => "[lat, lon]".to_string(),
            },
            found: var.dimensions().iter().map(|d| d.len()).collect(),
        });
    }

    let fill = fill_value(&var);
    let values: Vec<f32> = var
        .get_values::<f32, _>(..)?
        .into_iter()
        .map(|v| {
            if fill == Some(v) || v.abs() >= UNDEFINED_THRESHOLD {
                f32::NAN
            } else {
                v
            }
        })
        .collect();

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// The `lat` coordinate of a member file, if it has one
pub fn read_latitudes(path: &Path) -> Result<Option<Vec<f32>>> {
    let file = netcdf::open(path)?;
    match file.variable("lat") {
        Some(lat) => Ok(Some(lat.get_values::<f32, _>(..)?)),
        None => Ok(None),
    }
}

fn fill_value(var: &Variable<'_>) -> Option<f32> {
    var.attribute("_FillValue")
        .and_then(|attr| match attr.value().ok()? {
            AttributeValue::Float(v) => Some(v),
            AttributeValue::Double(v) => Some(v as f32),
            AttributeValue::Short(v) => Some(f32::from(v)),
            AttributeValue::Int(v) => Some(v as f32),
            _ => None,
        })
}
