//! Shared pattern matching for event patterns (selector, §4.6) and
//! entity patterns (trigger matcher, §4.11): exact string, `*`-glob, or
//! `/regex/`.

use regex::Regex;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone)]
pub enum Pattern {
    Exact(String),
    Glob(Regex),
    Regex(Regex),
}

impl Pattern {
    /// Compile a pattern string. `name` is used only for error messages
    /// so callers can cite which trigger/registration a bad pattern
    /// belongs to.
    pub fn compile(raw: &str, name: &str) -> Result<Self> {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let body = &raw[1..raw.len() - 1];
            let re = Regex::new(body).map_err(|e| {
                CoreError::config(format!("pattern '{name}' has invalid regex: {e}"))
            })?;
            return Ok(Self::Regex(re));
        }

        if raw.contains('*') {
            let escaped = regex::escape(raw).replace("\\*", ".*");
            let anchored = format!("^{escaped}$");
            let re = Regex::new(&anchored).map_err(|e| {
                CoreError::config(format!("pattern '{name}' has invalid glob: {e}"))
            })?;
            return Ok(Self::Glob(re));
        }

        Ok(Self::Exact(raw.to_string()))
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exact(s) => s == value,
            Self::Glob(re) | Self::Regex(re) => re.is_match(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_identical_string() {
        let p = Pattern::compile("binary_sensor.front_door", "t").unwrap();
        assert!(p.matches("binary_sensor.front_door"));
        assert!(!p.matches("binary_sensor.back_door"));
    }

    #[test]
    fn glob_pattern_matches_prefix() {
        let p = Pattern::compile("binary_sensor.*", "t").unwrap();
        assert!(p.matches("binary_sensor.front_door"));
        assert!(!p.matches("sensor.front_door"));
    }

    #[test]
    fn regex_pattern_matches_body() {
        let p = Pattern::compile("/^vestaboard_(refresh|circuit)$/", "t").unwrap();
        assert!(p.matches("vestaboard_refresh"));
        assert!(!p.matches("vestaboard_other"));
    }

    #[test]
    fn invalid_regex_cites_trigger_name_in_error() {
        let err = Pattern::compile("/^bad(/", "front-door-trigger").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("front-door-trigger"));
    }
}
