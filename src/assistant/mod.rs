//! Chat front-ends that sit above the client adapters.
//!
//! - [`keyword`]: fixed vocabulary, with a two-turn absence flow
//! - [`model`]: a language model picks the tool and arguments
//!
//! Both take an explicit [`ChatContext`] or keep their own caches; nothing
//! here is process-wide, so conversations stay independent.

pub mod context;
pub mod dates;
pub mod keyword;
pub mod model;

pub use context::{ChatContext, PendingCall};
pub use keyword::{classify, Intent, KeywordRouter};
pub use model::{LanguageModel, ModelChoice, ModelError, ModelRouter, OllamaModel};
