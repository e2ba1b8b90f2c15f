//! Processing services behind the HTTP handlers

pub mod auto_filler;
pub mod confidence;
pub mod disposisi;
pub mod exporter;
pub mod extraction;
pub mod gemini_client;
pub mod kode_matcher;
pub mod preprocess;
pub mod processor;
pub mod prompts;
pub mod summarizer;
pub mod upload;

pub use gemini_client::{GeminiClient, GeminiError, TokenUsage};
pub use processor::{process_surat, ProcessRequest};
