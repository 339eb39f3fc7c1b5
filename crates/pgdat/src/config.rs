//! Process-wide runtime switches.
//!
//! Two booleans drive the runtime:
//! - *interpolation*: builders created while it is on return literal SQL from
//!   [`Builder::interpolate`](crate::Builder::interpolate).
//! - *strict*: extra validation (placeholder/argument counts, long-lived
//!   transactions, multi-row results where one row is expected).
//!
//! Both default to off.

use crate::client::Handle;
use crate::error::{DatError, DatResult};
use std::sync::atomic::{AtomicBool, Ordering};

static INTERPOLATION: AtomicBool = AtomicBool::new(false);
static STRICT: AtomicBool = AtomicBool::new(false);

/// Whether new builders interpolate arguments into literal SQL.
pub fn interpolation_enabled() -> bool {
    INTERPOLATION.load(Ordering::Relaxed)
}

/// Whether strict validation is on.
pub fn strict_enabled() -> bool {
    STRICT.load(Ordering::Relaxed)
}

/// Turn interpolation on or off for builders created afterwards.
pub fn set_interpolation(enabled: bool) {
    INTERPOLATION.store(enabled, Ordering::Relaxed);
}

/// Turn strict validation on or off.
pub fn set_strict(enabled: bool) {
    STRICT.store(enabled, Ordering::Relaxed);
}

/// Runtime configuration.
///
/// ```ignore
/// pgdat::Config::new().with_interpolation(true).apply();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Inline arguments as literals (default off).
    pub interpolation: bool,
    /// Strict validation (default off).
    pub strict: bool,
}

impl Config {
    /// Create a configuration with defaults (everything off).
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `PGDAT_INTERPOLATE` and `PGDAT_STRICT` from the environment.
    ///
    /// Accepted truthy values: `1`, `true`, `on`, `yes` (case-insensitive).
    pub fn from_env() -> Self {
        Self {
            interpolation: env_flag("PGDAT_INTERPOLATE"),
            strict: env_flag("PGDAT_STRICT"),
        }
    }

    /// Set the interpolation flag.
    pub fn with_interpolation(mut self, enabled: bool) -> Self {
        self.interpolation = enabled;
        self
    }

    /// Set the strict flag.
    pub fn with_strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    /// Install this configuration process-wide.
    pub fn apply(self) {
        set_interpolation(self.interpolation);
        set_strict(self.strict);
    }

    /// Snapshot of the currently installed configuration.
    pub fn current() -> Self {
        Self {
            interpolation: interpolation_enabled(),
            strict: strict_enabled(),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Verify the session escapes string literals the way the interpolator assumes.
///
/// Literal SQL relies on `standard_conforming_strings = on` (backslashes are not
/// escape characters). Call once when a connection is set up; it is a no-op
/// while interpolation is disabled.
pub async fn check_standard_conforming_strings(handle: &impl Handle) -> DatResult<()> {
    if !interpolation_enabled() {
        return Ok(());
    }
    let row = handle
        .query_one("SHOW standard_conforming_strings", &[])
        .await?;
    let value: String = row
        .try_get(0)
        .map_err(|e| DatError::decode("standard_conforming_strings", e.to_string()))?;
    if !value.eq_ignore_ascii_case("on") {
        return Err(DatError::Config(format!(
            "interpolation requires standard_conforming_strings=on, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flag_accepts_truthy_values() {
        for v in ["1", "true", "ON", " yes "] {
            assert!(parse_flag(v), "{v}");
        }
        for v in ["0", "false", "off", ""] {
            assert!(!parse_flag(v), "{v}");
        }
    }

    #[test]
    fn defaults_are_off() {
        let cfg = Config::new();
        assert!(!cfg.interpolation);
        assert!(!cfg.strict);
    }

    #[test]
    fn builder_sets_fields() {
        let cfg = Config::new().with_interpolation(true).with_strict(true);
        assert_eq!(
            cfg,
            Config {
                interpolation: true,
                strict: true
            }
        );
    }
}
