//! Request targeting - select requests by `type` or `type.name`

use std::fmt;
use std::str::FromStr;

/// A `type` or `type.name` selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub resource_type: String,
    pub name: Option<String>,
}

impl Target {
    /// Check whether a request of the given type and name is selected
    pub fn matches(&self, resource_type: &str, name: Option<&str>) -> bool {
        if self.resource_type != resource_type {
            return false;
        }
        match &self.name {
            None => true,
            Some(wanted) => name == Some(wanted.as_str()),
        }
    }
}

impl FromStr for Target {
    type Err = String;

    /// Resource types contain no dots, so the first dot separates the name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty target".to_string());
        }
        match s.split_once('.') {
            Some((ty, _)) if ty.is_empty() => Err(format!("invalid target '{s}': missing type")),
            Some((_, name)) if name.is_empty() => Err(format!("invalid target '{s}': missing name")),
            Some((ty, name)) => Ok(Self {
                resource_type: ty.to_string(),
                name: Some(name.to_string()),
            }),
            None => Ok(Self {
                resource_type: s.to_string(),
                name: None,
            }),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}.{}", self.resource_type, name),
            None => f.write_str(&self.resource_type),
        }
    }
}

/// Check a request against a set of targets; an empty set selects everything
pub fn is_selected(targets: &[Target], resource_type: &str, name: Option<&str>) -> bool {
    targets.is_empty() || targets.iter().any(|t| t.matches(resource_type, name))
}
