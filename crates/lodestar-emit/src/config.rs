//! Per-compilation configuration.
//!
//! Everything that would otherwise be a process-wide toggle lives here and is
//! threaded through every function's emission context.

use lodestar_macros::bail;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EmitError, Result};

/// Default nesting limit for both passes.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Options for one compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
    /// Emit debugger scope records and treat `debugger` statements as
    /// able to observe every enclosing binding
    pub debugger_tracking: bool,

    /// Bracket statements with source positions for step debugging
    pub statement_boundaries: bool,

    /// Maximum tree nesting before the compilation is abandoned
    pub max_depth: usize,

    /// Compile the whole program as strict code
    pub strict: bool,

    /// Replace branches on literal conditions with straight-line code
    pub fold_constant_branches: bool,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            debugger_tracking: false,
            statement_boundaries: true,
            max_depth: DEFAULT_MAX_DEPTH,
            strict: false,
            fold_constant_branches: true,
        }
    }
}

impl EmitConfig {
    /// Configuration with debugger support switched on.
    pub fn debugging() -> Self {
        Self {
            debugger_tracking: true,
            statement_boundaries: true,
            fold_constant_branches: false,
            ..Self::default()
        }
    }

    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EmitConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Rejects values the emitter cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            bail!(EmitError::Config("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_macros::{assert_matches, assert_ok};

    #[test]
    fn test_defaults() {
        let config = EmitConfig::default();
        assert!(!config.debugger_tracking);
        assert!(config.statement_boundaries);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = assert_ok!(EmitConfig::from_toml_str("debugger_tracking = true\n"));
        assert!(config.debugger_tracking);
        assert!(config.fold_constant_branches);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_rejects_zero_depth() {
        assert_matches!(
            EmitConfig::from_toml_str("max_depth = 0"),
            Err(EmitError::Config(_))
        );
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert_matches!(
            EmitConfig::from_toml_str("max_depth = \"deep\""),
            Err(EmitError::Config(_))
        );
    }
}
