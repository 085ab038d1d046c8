pub mod error;
pub mod keyboard;
pub mod model;
pub mod options;
pub mod queue;
pub mod resetter;
pub mod text;
pub mod typed;
pub mod typo;

pub use error::TypingError;
pub use keyboard::KeyboardLayout;
pub use options::{Delay, TypingOverrides};
pub use text::{Markup, Snapshot};
pub use typed::{EraseOptions, SentenceOptions, Typed, TypedConfig, WaitOptions};
