use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one engine instance. Compiled-in defaults work
/// everywhere; the environment can override individual knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock ceiling for a single intent, waits included.
    pub hard_ceiling: Duration,
    /// Attempts of the search/act/verify loop before escalation.
    pub max_attempts: u32,
    /// Settle wait between failed attempts.
    pub restabilize_wait: Duration,
    /// Settle wait after a navigation-as-success event.
    pub navigation_settle: Duration,
    /// Per-keystroke delay when typing into payment iframes.
    pub type_delay_ms: u64,
    /// Budget for custom-dropdown options to render after opening.
    pub dropdown_render_wait: Duration,
    /// Budget for a dependent dropdown (country -> state) to appear.
    pub dependent_dropdown_wait: Duration,
    /// Where OCR screenshots and extracted text land.
    pub debug_dir: PathBuf,
    /// Master switch for the OCR fallback.
    pub ocr_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hard_ceiling: Duration::from_secs(45),
            max_attempts: 3,
            restabilize_wait: Duration::from_millis(1500),
            navigation_settle: Duration::from_secs(2),
            type_delay_ms: 50,
            dropdown_render_wait: Duration::from_millis(1500),
            dependent_dropdown_wait: Duration::from_secs(5),
            debug_dir: PathBuf::from("variant_debug"),
            ocr_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Defaults plus any environment overrides. `.env` files are honored
    /// when present; a missing file is not an error.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        let mut cfg = Self::default();
        if let Ok(v) = env::var("ENGINE_HARD_CEILING_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                cfg.hard_ceiling = Duration::from_secs(secs);
            }
        }
        if let Ok(v) = env::var("ENGINE_DEBUG_DIR") {
            if !v.trim().is_empty() {
                cfg.debug_dir = PathBuf::from(v);
            }
        }
        if let Ok(v) = env::var("ENGINE_OCR_ENABLED") {
            cfg.ocr_enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = env::var("ENGINE_TYPE_DELAY_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                cfg.type_delay_ms = ms;
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_respect_spec_bounds() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.hard_ceiling, Duration::from_secs(45));
        assert_eq!(cfg.max_attempts, 3);
        assert!(cfg.restabilize_wait >= Duration::from_secs(1));
        assert!(cfg.restabilize_wait <= Duration::from_secs(2));
        assert_eq!(cfg.dependent_dropdown_wait, Duration::from_secs(5));
    }
}
