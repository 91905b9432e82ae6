//! Catalog generation: source walking, export extraction and cache reuse.
pub mod code_parser;
pub mod core;
pub mod doc_comment;
pub mod languages;

pub use self::core::{GenerateError, GenerateOptions, GenerateStats, Generation, Generator, generate};
