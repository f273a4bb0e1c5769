//! Registration expiry and throttle policy
//!
//! Registration validity windows and throttle intervals are configured as
//! ISO-8601 durations (`P1M`, `PT5S`, ...). The wire always carries the
//! original string; [`IsoDuration`] converts to a concrete [`chrono`]
//! duration for local expiry and throttle arithmetic.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::config::AgentConfig;
use crate::error::{Error, Result};

/// Date-part designators and their length in seconds. Months and years have
/// no fixed length; 30 and 365 days are close enough for local expiry
/// bookkeeping since the broker interprets the original string itself.
const DATE_DESIGNATORS: [(char, i64); 4] = [
    ('Y', 365 * 86_400),
    ('M', 30 * 86_400),
    ('W', 7 * 86_400),
    ('D', 86_400),
];

const TIME_DESIGNATORS: [(char, i64); 3] = [('H', 3_600), ('M', 60), ('S', 1)];

/// An ISO-8601 duration resolved to a number of seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IsoDuration {
    seconds: i64,
}

impl IsoDuration {
    /// Total length in seconds
    pub fn num_seconds(&self) -> i64 {
        self.seconds
    }

    /// The equivalent chrono duration
    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }
}

impl FromStr for IsoDuration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('P')
            .ok_or_else(|| Error::config(format!("ISO-8601 duration must start with 'P': '{s}'")))?;

        let (date_part, time_part) = match rest.split_once('T') {
            Some((date, time)) => (date, Some(time)),
            None => (rest, None),
        };

        let (date_seconds, date_components) = parse_components(s, date_part, &DATE_DESIGNATORS)?;
        let (time_seconds, time_components) = match time_part {
            Some(time) => parse_components(s, time, &TIME_DESIGNATORS)?,
            None => (0, 0),
        };

        if date_components + time_components == 0 {
            return Err(Error::config(format!(
                "ISO-8601 duration must contain at least one component: '{s}'"
            )));
        }

        let seconds = date_seconds.checked_add(time_seconds).ok_or_else(|| {
            Error::config(format!("ISO-8601 duration value out of range: '{s}'"))
        })?;

        Ok(Self { seconds })
    }
}

/// Parse one part of a duration (date or time) into seconds, enforcing
/// designator order and returning the number of components consumed.
fn parse_components(full: &str, part: &str, designators: &[(char, i64)]) -> Result<(i64, usize)> {
    let mut total = 0i64;
    let mut components = 0usize;
    let mut digits = String::new();
    let mut allowed = designators;

    for c in part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(Error::config(format!(
                "ISO-8601 duration designator '{c}' without a value: '{full}'"
            )));
        }
        let position = allowed
            .iter()
            .position(|(designator, _)| *designator == c)
            .ok_or_else(|| {
                Error::config(format!(
                    "unexpected ISO-8601 duration designator '{c}': '{full}'"
                ))
            })?;
        let value: i64 = digits
            .parse()
            .map_err(|_| Error::config(format!("ISO-8601 duration value out of range: '{full}'")))?;

        total = value
            .checked_mul(allowed[position].1)
            .and_then(|component| total.checked_add(component))
            .ok_or_else(|| {
                Error::config(format!("ISO-8601 duration value out of range: '{full}'"))
            })?;
        allowed = &allowed[position + 1..];
        digits.clear();
        components += 1;
    }

    if !digits.is_empty() {
        return Err(Error::config(format!(
            "ISO-8601 duration value without a designator: '{full}'"
        )));
    }

    Ok((total, components))
}

/// Policy governing registration validity and re-registration throttling
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    duration: IsoDuration,
    throttle: Option<IsoDuration>,
}

impl ExpiryPolicy {
    /// Create a policy from already-parsed durations
    pub fn new(duration: IsoDuration, throttle: Option<IsoDuration>) -> Self {
        Self { duration, throttle }
    }

    /// Build the policy from an agent configuration
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let duration = config.registration_duration.parse()?;
        let throttle = match &config.throttling {
            Some(value) => Some(value.parse()?),
            None => None,
        };
        Ok(Self { duration, throttle })
    }

    /// Expiry timestamp for a registration confirmed at `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.duration.as_duration()
    }

    /// Whether a re-registration at `now` should be suppressed because the
    /// previous successful registration is still within the throttle window
    pub fn should_throttle(
        &self,
        now: DateTime<Utc>,
        last_registered: Option<DateTime<Utc>>,
    ) -> bool {
        match (self.throttle, last_registered) {
            (Some(throttle), Some(last)) => {
                now.signed_duration_since(last) < throttle.as_duration()
            }
            _ => false,
        }
    }
}
