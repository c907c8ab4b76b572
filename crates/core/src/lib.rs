pub mod intent;
pub mod models;
pub mod prompt;
pub mod sanitize;

pub use intent::{classify_intent, normalize_message};
pub use models::*;
pub use prompt::{build_prompt, REFUSAL_MESSAGE, SYSTEM_INSTRUCTION};
pub use sanitize::{sanitize, HyphenPolicy, ResponseSanitizer};
