//! # symref: symbolic cross-references for documentation
//!
//! Scans a TypeScript/JavaScript source tree into a catalog of exported
//! declarations, then expands `{@Name}` references and `symbol` directives in
//! documentation into links and rendered API blocks.
//!
//! ## Architecture
//!
//! - **[`catalog`]**: Declaration model, versioned catalog and cache artifacts
//! - **[`indexer`]**: Tree-sitter extraction and incremental catalog generation
//! - **[`resolver`]**: Reference tokens, hint disambiguation, suggestions
//! - **[`render`]**: Inline links and documentation blocks
//! - **[`document`]**: Document tree and the Markdown adapter
//! - **[`transform`]**: Expands references in a document tree
//! - **[`config`]**: Configuration loading and validation

pub mod catalog;
pub mod config;
pub mod document;
pub mod indexer;
pub mod render;
pub mod resolver;
pub mod transform;
