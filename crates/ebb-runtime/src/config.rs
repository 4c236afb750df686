use serde::{Deserialize, Serialize};

use ebb_types::{IdSpace, Location, SPACE_SIZE};

use crate::error::{EbbError, Result};

/// Upper bound on `max_contexts`; each context keeps a range of at least 256 ids.
pub const MAX_CONTEXTS_LIMIT: usize = 256;

/// Process-wide runtime settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Allocation space (node id) owned by this process. Space 0 holds the
    /// reserved static identifiers and cannot be used.
    pub space: u16,
    /// Network location of this process.
    pub location: u32,
    /// Number of execution contexts that partition the allocation space.
    pub max_contexts: usize,
    /// Cache the coordination-service path of every identifier looked up.
    pub directory_path_cache: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            space: 1,
            location: 0,
            max_contexts: 4,
            directory_path_cache: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| EbbError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject reserved spaces and out-of-range context counts.
    pub fn validate(&self) -> Result<()> {
        if self.space == IdSpace::STATIC.get() {
            return Err(EbbError::Config(
                "space 0 is reserved for static identifiers".into(),
            ));
        }
        if self.max_contexts == 0 || self.max_contexts > MAX_CONTEXTS_LIMIT {
            return Err(EbbError::Config(format!(
                "max_contexts must be within 1..={MAX_CONTEXTS_LIMIT}, got {}",
                self.max_contexts
            )));
        }
        Ok(())
    }

    /// The allocation space managers draw identifiers from.
    pub fn id_space(&self) -> IdSpace {
        IdSpace::new(self.space)
    }

    /// This process's network location.
    pub fn location(&self) -> Location {
        Location::new(self.location)
    }

    /// Number of identifiers each context may allocate.
    pub fn range_per_context(&self) -> u32 {
        SPACE_SIZE / self.max_contexts as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = RuntimeConfig::default();
        assert_eq!(c.space, 1);
        assert_eq!(c.location(), Location::new(0));
        assert_eq!(c.max_contexts, 4);
        assert!(c.directory_path_cache);
        assert_eq!(c.range_per_context(), 16384);
        c.validate().unwrap();
    }

    #[test]
    fn parses_partial_toml() {
        let c = RuntimeConfig::from_toml_str("space = 7\nmax_contexts = 8\n").unwrap();
        assert_eq!(c.id_space(), IdSpace::new(7));
        assert_eq!(c.range_per_context(), 8192);
        assert!(c.directory_path_cache);
    }

    #[test]
    fn rejects_static_space() {
        let err = RuntimeConfig::from_toml_str("space = 0").unwrap_err();
        assert!(matches!(err, EbbError::Config(_)));
    }

    #[test]
    fn rejects_context_count_out_of_range() {
        for max_contexts in [0, MAX_CONTEXTS_LIMIT + 1] {
            let c = RuntimeConfig {
                max_contexts,
                ..RuntimeConfig::default()
            };
            assert!(matches!(c.validate(), Err(EbbError::Config(_))));
        }
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("space = \"one\""),
            Err(EbbError::Config(_))
        ));
    }
}
