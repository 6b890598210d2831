#![forbid(unsafe_code)]

//! Program configuration.
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `CANOPY_MAX_MESSAGES_PER_STEP` | `max_messages_per_step` | 1024 |
//! | `CANOPY_RENDER_WHEN_CLEAN` | `render_when_clean` | false |
//! | `CANOPY_TRACE_PATCHES` | `trace_patches` | false |
//!
//! Booleans accept `1/0/true/false/yes/no/on/off`. Values that do not parse,
//! and a zero message bound, keep the default.

pub const ENV_MAX_MESSAGES_PER_STEP: &str = "CANOPY_MAX_MESSAGES_PER_STEP";
pub const ENV_RENDER_WHEN_CLEAN: &str = "CANOPY_RENDER_WHEN_CLEAN";
pub const ENV_TRACE_PATCHES: &str = "CANOPY_TRACE_PATCHES";

pub const DEFAULT_MAX_MESSAGES_PER_STEP: usize = 1024;

/// Knobs for [`Program`](crate::Program).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramConfig {
    /// Upper bound on messages folded into one render cycle.
    pub max_messages_per_step: usize,
    /// Diff and apply on every step, even when no message arrived.
    pub render_when_clean: bool,
    /// Log every applied patch at `trace` level.
    pub trace_patches: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            max_messages_per_step: DEFAULT_MAX_MESSAGES_PER_STEP,
            render_when_clean: false,
            trace_patches: false,
        }
    }
}

impl ProgramConfig {
    /// Read overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read overrides through a custom lookup (for tests).
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(max) = get_env(ENV_MAX_MESSAGES_PER_STEP)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            config.max_messages_per_step = max;
        }
        if let Some(value) = env_bool(&get_env, ENV_RENDER_WHEN_CLEAN) {
            config.render_when_clean = value;
        }
        if let Some(value) = env_bool(&get_env, ENV_TRACE_PATCHES) {
            config.trace_patches = value;
        }
        config
    }

    #[must_use]
    pub fn with_max_messages_per_step(mut self, max: usize) -> Self {
        self.max_messages_per_step = max.max(1);
        self
    }

    #[must_use]
    pub fn with_render_when_clean(mut self, enabled: bool) -> Self {
        self.render_when_clean = enabled;
        self
    }

    #[must_use]
    pub fn with_trace_patches(mut self, enabled: bool) -> Self {
        self.trace_patches = enabled;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool<F>(get_env: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    get_env(key).and_then(|value| parse_bool(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn get_env<'a>(map: &'a HashMap<String, String>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_env_is_default() {
        let env = map_env(&[]);
        assert_eq!(ProgramConfig::from_env_with(get_env(&env)), ProgramConfig::default());
    }

    #[test]
    fn overrides_are_read() {
        let env = map_env(&[
            (ENV_MAX_MESSAGES_PER_STEP, " 16 "),
            (ENV_RENDER_WHEN_CLEAN, "yes"),
            (ENV_TRACE_PATCHES, "ON"),
        ]);
        let config = ProgramConfig::from_env_with(get_env(&env));
        assert_eq!(config.max_messages_per_step, 16);
        assert!(config.render_when_clean);
        assert!(config.trace_patches);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let env = map_env(&[
            (ENV_MAX_MESSAGES_PER_STEP, "lots"),
            (ENV_RENDER_WHEN_CLEAN, "maybe"),
        ]);
        let config = ProgramConfig::from_env_with(get_env(&env));
        assert_eq!(config, ProgramConfig::default());

        let env = map_env(&[(ENV_MAX_MESSAGES_PER_STEP, "0")]);
        let config = ProgramConfig::from_env_with(get_env(&env));
        assert_eq!(config.max_messages_per_step, DEFAULT_MAX_MESSAGES_PER_STEP);
    }

    #[test]
    fn parse_bool_truthy_and_falsy() {
        for t in ["1", "true", "Yes", "on"] {
            assert_eq!(parse_bool(t), Some(true), "{t}");
        }
        for f in ["0", "FALSE", "no", "off"] {
            assert_eq!(parse_bool(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool("garbage"), None);
    }

    #[test]
    fn builder_clamps_zero_bound() {
        let config = ProgramConfig::default()
            .with_max_messages_per_step(0)
            .with_trace_patches(true);
        assert_eq!(config.max_messages_per_step, 1);
        assert!(config.trace_patches);
    }
}
