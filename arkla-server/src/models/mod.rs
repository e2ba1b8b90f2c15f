//! Response models shared between services and handlers

pub mod process_result;

pub use process_result::{
    ConfidenceSummary, GeminiApiUsage, ProcessResponse, ProcessingStatus,
};
