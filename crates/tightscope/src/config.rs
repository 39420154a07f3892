//! Analyzer configuration.
//!
//! Options are set from string pairs the way a host lint driver hands them
//! over. Boolean options accept the exact token sets of the original
//! configuration surface; `scope` additionally accepts `conservative` as a
//! third level that enables the analysis and conservative mode together.

use std::fmt;

/// The analyzer configuration bundle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Report declarations that can move to a tighter scope.
    pub scope: bool,
    /// Report uses of a variable after it was shadowed.
    pub shadow: bool,
    /// Report reassignments nested inside an enclosing assignment.
    pub nested_assign: bool,
    /// Analyze generated files.
    pub generated: bool,
    /// Suppress fixes that cross non-inert statements or change inferred
    /// types, and drop non-movable diagnostics entirely.
    pub conservative: bool,
    /// Combine several movable short declarations into one init clause.
    pub combine: bool,
    /// Suggest rename fixes for shadow diagnostics.
    pub rename: bool,
    /// A declaration spanning more lines than this may only move into a
    /// block, never an init clause. Negative means no limit.
    pub max_lines: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scope: true,
            shadow: true,
            nested_assign: true,
            generated: false,
            conservative: false,
            combine: true,
            rename: false,
            max_lines: -1,
        }
    }
}

/// A malformed option name or value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownOption(String),
    InvalidValue { option: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOption(option) => write!(f, "unknown option {option:?}"),
            Self::InvalidValue { option, value } => {
                write!(f, "invalid value {value:?} for option {option:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "on" | "On" | "full" | "Full" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" | "off" | "Off" => Some(false),
        _ => None,
    }
}

impl Settings {
    /// Applies one `name = value` option pair.
    pub fn set(&mut self, option: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            option: option.to_owned(),
            value: value.to_owned(),
        };
        match option {
            "scope" => {
                if value == "conservative" {
                    self.scope = true;
                    self.conservative = true;
                } else {
                    self.scope = parse_bool(value).ok_or_else(invalid)?;
                }
            }
            "shadow" => self.shadow = parse_bool(value).ok_or_else(invalid)?,
            "nested-assign" => self.nested_assign = parse_bool(value).ok_or_else(invalid)?,
            "generated" => self.generated = parse_bool(value).ok_or_else(invalid)?,
            "conservative" => self.conservative = parse_bool(value).ok_or_else(invalid)?,
            "combine" => self.combine = parse_bool(value).ok_or_else(invalid)?,
            "rename" => self.rename = parse_bool(value).ok_or_else(invalid)?,
            "max-lines" => self.max_lines = value.parse().map_err(|_| invalid())?,
            _ => return Err(ConfigError::UnknownOption(option.to_owned())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let settings = Settings::default();
        assert!(settings.scope);
        assert!(settings.shadow);
        assert!(settings.nested_assign);
        assert!(!settings.generated);
        assert!(!settings.conservative);
        assert!(settings.combine);
        assert!(!settings.rename);
        assert_eq!(settings.max_lines, -1);
    }

    #[test]
    fn boolean_token_sets_are_exact() {
        let mut settings = Settings::default();
        for value in ["1", "t", "T", "true", "TRUE", "True", "on", "On", "full", "Full"] {
            settings.set("rename", value).expect("valid true token");
            assert!(settings.rename, "{value} should enable");
        }
        for value in ["0", "f", "F", "false", "FALSE", "False", "off", "Off"] {
            settings.set("combine", value).expect("valid false token");
            assert!(!settings.combine, "{value} should disable");
        }
        assert!(settings.set("shadow", "yes").is_err());
        assert!(settings.set("shadow", "ON").is_err());
    }

    #[test]
    fn scope_accepts_conservative_level() {
        let mut settings = Settings::default();
        settings.set("scope", "conservative").expect("valid level");
        assert!(settings.scope);
        assert!(settings.conservative);
        assert!(settings.set("shadow", "conservative").is_err());
    }

    #[test]
    fn max_lines_parses_integers() {
        let mut settings = Settings::default();
        settings.set("max-lines", "5").expect("valid int");
        assert_eq!(settings.max_lines, 5);
        settings.set("max-lines", "-1").expect("valid int");
        assert_eq!(settings.max_lines, -1);
        assert!(settings.set("max-lines", "many").is_err());
        assert!(settings.set("lines", "5").is_err());
    }
}
