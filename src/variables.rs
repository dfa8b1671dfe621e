//! Variable kinds and the selection of variables to process

use crate::errors::{Result, RuEnsError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 3-D (level × lat × lon) or 2-D (lat × lon) field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    #[serde(rename = "3d")]
    ThreeD,
    #[serde(rename = "2d")]
    TwoD,
}

impl VariableKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThreeD => "3d",
            Self::TwoD => "2d",
        }
    }

    /// Rank of a single member field on disk, longitude included
    #[must_use]
    pub const fn field_rank(self) -> usize {
        match self {
            Self::ThreeD => 3,
            Self::TwoD => 2,
        }
    }

    /// Axis names of the zonally averaged field
    #[must_use]
    pub fn reduced_dims(self) -> Vec<String> {
        match self {
            Self::ThreeD => vec!["lev".to_string(), "lat".to_string()],
            Self::TwoD => vec!["lat".to_string()],
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full catalog of ensemble variables, 3-D first
#[must_use]
pub fn default_variables() -> (Vec<String>, Vec<String>) {
    let var3d = ["u", "v", "t", "qv", "o3", "delp"];
    let var2d = ["ps", "ts", "t2m", "u10m", "v10m", "slp"];
    (
        var3d.iter().map(|s| s.to_string()).collect(),
        var2d.iter().map(|s| s.to_string()).collect(),
    )
}

/// Deduplicated 3-D and 2-D variable lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSelection {
    var3d: Vec<String>,
    var2d: Vec<String>,
}

impl VariableSelection {
    /// Build a selection, dropping repeats and keeping first-seen order
    ///
    /// # Errors
    ///
    /// Returns an error if both lists are empty, a name is blank, or a name
    /// appears as both a 3-D and a 2-D variable.
    pub fn new<I, J, S, T>(var3d: I, var2d: J) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let var3d = dedup(var3d.into_iter().map(Into::into))?;
        let var2d = dedup(var2d.into_iter().map(Into::into))?;

        if var3d.is_empty() && var2d.is_empty() {
            return Err(RuEnsError::InvalidSelection {
                message: "no variables selected".to_string(),
            });
        }

        if let Some(clash) = var3d.iter().find(|v| var2d.contains(v)) {
            return Err(RuEnsError::InvalidSelection {
                message: format!("'{clash}' is listed as both 3-D and 2-D"),
            });
        }

        Ok(Self { var3d, var2d })
    }

    pub fn var3d(&self) -> &[String] {
        &self.var3d
    }

    pub fn var2d(&self) -> &[String] {
        &self.var2d
    }

    /// Every selected variable with its kind, 3-D first
    pub fn iter(&self) -> impl Iterator<Item = (&str, VariableKind)> {
        self.var3d
            .iter()
            .map(|v| (v.as_str(), VariableKind::ThreeD))
            .chain(self.var2d.iter().map(|v| (v.as_str(), VariableKind::TwoD)))
    }

    pub fn len(&self) -> usize {
        self.var3d.len() + self.var2d.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind_of(&self, name: &str) -> Option<VariableKind> {
        self.iter().find(|(v, _)| *v == name).map(|(_, kind)| kind)
    }

    /// First 3-D variable, falling back to the first 2-D one
    pub fn representative(&self) -> &str {
        self.var3d
            .first()
            .or_else(|| self.var2d.first())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

fn dedup(names: impl Iterator<Item = String>) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(RuEnsError::InvalidSelection {
                message: "empty variable name".to_string(),
            });
        }
        if !out.contains(&name) {
            out.push(name);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_dropped() {
        let sel = VariableSelection::new(["u", "v", "u"], ["ps"]).unwrap();
        assert_eq!(sel.var3d(), ["u", "v"]);
        assert_eq!(sel.len(), 3);
    }

    #[test]
    fn clash_between_kinds_is_rejected() {
        assert!(VariableSelection::new(["u"], ["u"]).is_err());
    }

    #[test]
    fn representative_prefers_3d() {
        let sel = VariableSelection::new(["t", "u"], ["ps"]).unwrap();
        assert_eq!(sel.representative(), "t");

        let only_2d = VariableSelection::new(Vec::<String>::new(), ["ps"]).unwrap();
        assert_eq!(only_2d.representative(), "ps");
        assert_eq!(only_2d.kind_of("ps"), Some(VariableKind::TwoD));
    }
}
