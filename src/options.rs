use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_config, Result};

/// A delay in milliseconds: either fixed or sampled uniformly from an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Delay {
    Fixed(u64),
    Range { min: u64, max: u64 },
}

impl Delay {
    pub const ZERO: Delay = Delay::Fixed(0);

    pub fn range(min: u64, max: u64) -> Self {
        Delay::Range { min, max }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> u64 {
        match *self {
            Delay::Fixed(ms) => ms,
            Delay::Range { min, max } if min >= max => min,
            Delay::Range { min, max } => rng.gen_range(min..=max),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if let Delay::Range { min, max } = *self {
            ensure_config!(min <= max, "{name}: min ({min}) must be <= max ({max})");
        }
        Ok(())
    }
}

impl From<u64> for Delay {
    fn from(ms: u64) -> Self {
        Delay::Fixed(ms)
    }
}

/// Partial typing options. Every `None` falls through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypingOverrides {
    pub locale: Option<String>,
    pub per_letter_delay: Option<Delay>,
    pub erase_delay: Option<Delay>,
    /// Pause before correcting wrong letters.
    pub error_delay: Option<Delay>,
    pub error_multiplier: Option<f64>,
    pub no_special_char_errors: Option<bool>,
}

impl TypingOverrides {
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn per_letter_delay(mut self, delay: impl Into<Delay>) -> Self {
        self.per_letter_delay = Some(delay.into());
        self
    }

    pub fn erase_delay(mut self, delay: impl Into<Delay>) -> Self {
        self.erase_delay = Some(delay.into());
        self
    }

    pub fn error_delay(mut self, delay: impl Into<Delay>) -> Self {
        self.error_delay = Some(delay.into());
        self
    }

    pub fn error_multiplier(mut self, multiplier: f64) -> Self {
        self.error_multiplier = Some(multiplier);
        self
    }

    pub fn no_special_char_errors(mut self, enabled: bool) -> Self {
        self.no_special_char_errors = Some(enabled);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, delay) in [
            ("per_letter_delay", self.per_letter_delay),
            ("erase_delay", self.erase_delay),
            ("error_delay", self.error_delay),
        ] {
            if let Some(delay) = delay {
                delay.validate(name)?;
            }
        }
        if let Some(multiplier) = self.error_multiplier {
            ensure_config!(
                multiplier.is_finite() && multiplier >= 0.0,
                "error_multiplier must be finite and >= 0 (got {multiplier})"
            );
        }
        if let Some(locale) = &self.locale {
            ensure_config!(!locale.is_empty(), "locale must not be empty");
        }
        Ok(())
    }
}

/// Fully resolved options in effect for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct TypingProfile {
    pub locale: String,
    pub per_letter_delay: Delay,
    pub erase_delay: Delay,
    pub error_delay: Delay,
    pub error_multiplier: f64,
    pub no_special_char_errors: bool,
}

impl Default for TypingProfile {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            per_letter_delay: Delay::range(50, 150),
            erase_delay: Delay::range(30, 70),
            error_delay: Delay::range(200, 400),
            error_multiplier: 1.0,
            no_special_char_errors: false,
        }
    }
}

impl TypingProfile {
    fn apply(&mut self, overrides: &TypingOverrides) {
        if let Some(locale) = &overrides.locale {
            self.locale = locale.clone();
        }
        if let Some(delay) = overrides.per_letter_delay {
            self.per_letter_delay = delay;
        }
        if let Some(delay) = overrides.erase_delay {
            self.erase_delay = delay;
        }
        if let Some(delay) = overrides.error_delay {
            self.error_delay = delay;
        }
        if let Some(multiplier) = overrides.error_multiplier {
            self.error_multiplier = multiplier;
        }
        if let Some(flag) = overrides.no_special_char_errors {
            self.no_special_char_errors = flag;
        }
    }
}

/// Built-in profile used while fast-forwarding: quick discrete steps, no typos.
pub fn fast_forward_defaults() -> TypingOverrides {
    TypingOverrides {
        locale: None,
        per_letter_delay: Some(Delay::Fixed(5)),
        erase_delay: Some(Delay::Fixed(5)),
        error_delay: Some(Delay::ZERO),
        error_multiplier: Some(0.0),
        no_special_char_errors: None,
    }
}

/// Layer options from lowest to highest precedence:
/// defaults, construction-time, current item, fast-forward.
pub fn resolve(
    defaults: &TypingProfile,
    construction: &TypingOverrides,
    item: Option<&TypingOverrides>,
    fast_forward: Option<&TypingOverrides>,
) -> TypingProfile {
    let mut profile = defaults.clone();
    profile.apply(construction);
    if let Some(item) = item {
        profile.apply(item);
    }
    if let Some(ff) = fast_forward {
        profile.apply(ff);
    }
    profile
}
