//! Common types and utilities for the ilc lowering pipeline.
//!
//! This crate provides foundational types used across all ilc crates:
//! - String interning (`Atom`, `ShardedInterner`)
//! - Source spans (`Span`)
//! - Lowering limits and thresholds
//! - The diagnostic model shared by the lowering crate and the driver

// String interning for qualified names and member names
pub mod interner;
pub use interner::{Atom, ShardedInterner};

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::Span;

// Centralized limits and thresholds
pub mod limits;

// Diagnostics - codes, templates and the Diagnostic record
pub mod diagnostics;
pub use diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticRelatedInformation, diagnostic_codes,
    format_message, get_message_template,
};
