//! Shared utility functions for buildfix.

pub mod json_extraction;

pub use json_extraction::{
    find_matching_brace, try_extract_json_object, JsonExtractionError, JsonExtractionResult,
};
