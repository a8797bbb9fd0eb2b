// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{
    ConfigFile, LoggingSection, MaterializeSection, RawConfigFile, RawLoggingSection,
    RawMaterializeSection,
};
use crate::errors::{Result, StatecraftError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StatecraftError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let materialize = validate_materialize(raw.materialize)?;
        let logging = validate_logging(raw.logging)?;
        Ok(ConfigFile::new_unchecked(materialize, logging))
    }
}

fn validate_materialize(raw: RawMaterializeSection) -> Result<MaterializeSection> {
    let timeout = match raw.timeout.as_deref() {
        None => None,
        Some(s) => {
            let timeout = parse_duration(s).map_err(|e| {
                StatecraftError::ConfigError(format!("[materialize].timeout: {e}"))
            })?;
            if timeout.is_zero() {
                return Err(StatecraftError::ConfigError(
                    "[materialize].timeout must be greater than zero".to_string(),
                ));
            }
            Some(timeout)
        }
    };

    Ok(MaterializeSection {
        timeout,
        reject_duplicate_names: raw.reject_duplicate_names,
        detect_cycles: raw.detect_cycles,
    })
}

fn validate_logging(raw: RawLoggingSection) -> Result<LoggingSection> {
    let level = match raw.level.as_deref() {
        None => None,
        Some(s) => Some(crate::logging::parse_level_str(s).ok_or_else(|| {
            StatecraftError::ConfigError(format!(
                "[logging].level: unknown level '{s}'; expected error, warn, info, debug or trace"
            ))
        })?),
    };
    Ok(LoggingSection { level })
}

/// Parse `"<number><unit>"` with unit `ms`, `s`, `m` or `h`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        unit => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 30s "), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("3d").is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let raw = RawConfigFile {
            materialize: RawMaterializeSection {
                timeout: Some("0s".to_string()),
                ..RawMaterializeSection::default()
            },
            ..RawConfigFile::default()
        };
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, StatecraftError::ConfigError(_)));
    }

    #[test]
    fn rejects_unknown_level() {
        let raw = RawConfigFile {
            logging: RawLoggingSection {
                level: Some("chatty".to_string()),
            },
            ..RawConfigFile::default()
        };
        assert!(ConfigFile::try_from(raw).is_err());
    }
}
