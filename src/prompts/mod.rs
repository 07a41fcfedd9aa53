//! LLM prompts for build repair.
//!
//! - [`fix`] - System and user prompts asking for a structured fix plan

pub mod fix;

pub use fix::{build_fix_prompt, FixPrompt, FIX_SYSTEM_PROMPT};
