/// Faults raised by the typing engine.
///
/// None of these are retried. A simulated typo is not a fault and never shows up here.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TypingError {
    /// No keyboard layout is registered for the locale used by the error model.
    #[error("locale {locale} is not known")]
    UnknownLocale { locale: String },

    /// An instruction addressed a part the engine was not configured with.
    #[error("no queue found for part: {part}")]
    UnknownPart { part: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An erase reached past the start of the displayed text outside of a reset.
    #[error("cannot erase from empty text in part {part}")]
    EraseBeyondText { part: String },

    #[error("script error: {0}")]
    Script(String),
}

pub type Result<T, E = TypingError> = std::result::Result<T, E>;

macro_rules! ensure_config {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::TypingError::InvalidConfig(format!($($arg)+)));
        }
    };
}

pub(crate) use ensure_config;
