use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::sps::{FrameRate, SpsOverrides};

/// `level_idc` values defined by ISO/IEC-14496-10-2022 Table A-1.
const KNOWN_LEVELS: [u8; 20] = [9, 10, 11, 12, 13, 20, 21, 22, 30, 31, 32, 40, 41, 42, 50, 51, 52, 60, 61, 62];

/// A recognized argument with a value that cannot be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterArgsError {
    /// `fps=` was not `<num>[:<den>]` with non-zero parts.
    #[error("invalid frame rate `{0}`")]
    InvalidFrameRate(String),

    /// `level=` was not a known level.
    #[error("invalid level `{0}`")]
    InvalidLevel(String),
}

/// Parsed filter arguments, e.g. `fps=30000:1001/level=4.1/cfr`.
///
/// Tokens are separated by `/`. Unknown tokens are logged and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterArgs {
    /// `fps=<num>:<den>` or `fps=<num>`
    pub frame_rate: Option<FrameRate>,
    /// `level=<idc>` or `level=<major>.<minor>`
    pub level_idc: Option<u8>,
    /// `cfr` sets, `vfr` clears `fixed_frame_rate_flag`; the last one wins.
    pub fixed_frame_rate: Option<bool>,
}

impl FilterArgs {
    /// True when no recognized argument was given.
    pub const fn is_empty(&self) -> bool {
        self.frame_rate.is_none() && self.level_idc.is_none() && self.fixed_frame_rate.is_none()
    }

    /// The SPS edits these arguments ask for.
    pub const fn overrides(&self) -> SpsOverrides {
        SpsOverrides {
            level_idc: self.level_idc,
            frame_rate: self.frame_rate,
            fixed_frame_rate: self.fixed_frame_rate,
        }
    }
}

fn parse_frame_rate(value: &str) -> Result<FrameRate, FilterArgsError> {
    let invalid = || FilterArgsError::InvalidFrameRate(value.to_owned());

    let (num, den) = match value.split_once(':') {
        Some((num, den)) => (num, den),
        None => (value, "1"),
    };
    let num = num.trim().parse::<u32>().map_err(|_| invalid())?;
    let den = den.trim().parse::<u32>().map_err(|_| invalid())?;

    FrameRate::new(num, den).ok_or_else(invalid)
}

fn parse_level(value: &str) -> Result<u8, FilterArgsError> {
    let invalid = || FilterArgsError::InvalidLevel(value.to_owned());

    let level_idc = match value.split_once('.') {
        Some((major, minor)) => {
            let major = major.parse::<u8>().map_err(|_| invalid())?;
            let minor = minor.parse::<u8>().map_err(|_| invalid())?;
            if minor > 9 {
                return Err(invalid());
            }
            major.checked_mul(10).and_then(|m| m.checked_add(minor)).ok_or_else(invalid)?
        }
        None => value.parse::<u8>().map_err(|_| invalid())?,
    };

    if KNOWN_LEVELS.contains(&level_idc) {
        Ok(level_idc)
    } else {
        Err(invalid())
    }
}

impl FromStr for FilterArgs {
    type Err = FilterArgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut args = Self::default();

        for token in s.split('/').map(str::trim).filter(|t| !t.is_empty()) {
            match token.split_once('=') {
                Some(("fps", value)) => args.frame_rate = Some(parse_frame_rate(value)?),
                Some(("level", value)) => args.level_idc = Some(parse_level(value)?),
                None if token == "cfr" => args.fixed_frame_rate = Some(true),
                None if token == "vfr" => args.fixed_frame_rate = Some(false),
                _ => warn!("ignoring unknown filter argument `{}`", token),
            }
        }

        Ok(args)
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_tokens() {
        let args: FilterArgs = "fps=30000:1001/level=4.1/cfr".parse().unwrap();
        assert_eq!(args.frame_rate, FrameRate::new(30000, 1001));
        assert_eq!(args.level_idc, Some(41));
        assert_eq!(args.fixed_frame_rate, Some(true));
        assert!(!args.is_empty());
    }

    #[test]
    fn test_level_forms() {
        assert_eq!(parse_level("41"), Ok(41));
        assert_eq!(parse_level("4.1"), Ok(41));
        assert_eq!(parse_level("5.2"), Ok(52));
        assert_eq!(parse_level("1.0"), Ok(10));
        assert_eq!(parse_level("30"), Ok(30));
        assert!(parse_level("43").is_err());
        assert!(parse_level("4.10").is_err());
        assert!(parse_level("abc").is_err());
        assert!(parse_level("").is_err());
    }

    #[test]
    fn test_frame_rate_forms() {
        assert_eq!(parse_frame_rate("25"), Ok(FrameRate { num: 25, den: 1 }));
        assert_eq!(parse_frame_rate("24000:1001"), Ok(FrameRate { num: 24000, den: 1001 }));
        assert!(parse_frame_rate("0:1").is_err());
        assert!(parse_frame_rate("25:0").is_err());
        assert!(parse_frame_rate("x:1").is_err());
        assert!(parse_frame_rate("4294967295:1").is_err());
    }

    #[test]
    fn test_last_rate_mode_wins() {
        let args: FilterArgs = "cfr/vfr".parse().unwrap();
        assert_eq!(args.fixed_frame_rate, Some(false));
    }

    #[test]
    fn test_unknown_tokens_are_ignored() {
        let args: FilterArgs = "bogus/sar=1:1//".parse().unwrap();
        assert!(args.is_empty());

        let args: FilterArgs = "".parse().unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_bad_value_is_an_error() {
        assert_eq!(
            "fps=0:1/level=41".parse::<FilterArgs>(),
            Err(FilterArgsError::InvalidFrameRate("0:1".into()))
        );
        assert_eq!(
            "level=abc".parse::<FilterArgs>(),
            Err(FilterArgsError::InvalidLevel("abc".into()))
        );
    }

    #[test]
    fn test_overrides_mirror_args() {
        let args: FilterArgs = "fps=50/level=42/vfr".parse().unwrap();
        let overrides = args.overrides();
        assert_eq!(overrides.frame_rate, FrameRate::new(50, 1));
        assert_eq!(overrides.level_idc, Some(42));
        assert_eq!(overrides.fixed_frame_rate, Some(false));
    }
}
