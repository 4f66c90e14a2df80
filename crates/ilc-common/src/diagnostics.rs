//! Diagnostic types and message lookup for the lowering pipeline.
//!
//! Codes are grouped by the stage that reports them:
//! - `1xxx` declaration errors (refused before representation resolution)
//! - `2xxx` use-site errors (reported by the boxing decision stage)
//! - `9xxx` internal invariant violations (never user-recoverable)

use serde::Serialize;

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Suggestion = 2,
    Message = 3,
}

/// Related information for a diagnostic (e.g. the other half of a cycle).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagnosticRelatedInformation {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

/// A lowering diagnostic with optional related information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub const fn error(file: String, start: u32, length: u32, message: String, code: u32) -> Self {
        Self {
            file,
            start,
            length,
            message_text: message,
            category: DiagnosticCategory::Error,
            code,
            related_information: Vec::new(),
        }
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(mut self, file: String, start: u32, length: u32, message: String) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            file,
            start,
            length,
            message_text: message,
            category: DiagnosticCategory::Message,
            code: 0,
        });
        self
    }

    /// Internal errors are rendered with their own prefix by the reporter.
    pub fn is_internal(&self) -> bool {
        self.code >= 9000
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// A diagnostic message definition with code, category, and message template.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

pub mod diagnostic_codes {
    // Declaration errors
    pub const SELF_REFERENTIAL_CARRIER: u32 = 1001;
    pub const NON_FINAL_WRAPPER: u32 = 1002;
    pub const NESTED_WRAPPER: u32 = 1003;
    pub const VALIDATION_WITHOUT_PUBLIC_CONSTRUCTOR: u32 = 1004;
    pub const UNCONSTRAINED_GENERIC_CARRIER: u32 = 1005;
    pub const CARRIER_CHAIN_TOO_DEEP: u32 = 1006;

    // Use-site errors
    pub const VARARG_OF_WRAPPER: u32 = 2001;
    pub const IDENTITY_COMPARISON_ON_WRAPPER: u32 = 2002;
    pub const AMBIGUOUS_GENERIC_ARRAY: u32 = 2003;
    pub const UNRELATED_WRAPPER_CONVERSION: u32 = 2004;

    // Internal invariant violations
    pub const MANGLING_COLLISION: u32 = 9001;
    pub const UNKNOWN_WRAPPER: u32 = 9002;
    pub const INITIALIZATION_PATH_VIOLATION: u32 = 9003;
    pub const UNKNOWN_TYPE: u32 = 9004;
    pub const DUPLICATE_ABI_MEMBER: u32 = 9005;
}

use diagnostic_codes as codes;

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: codes::SELF_REFERENTIAL_CARRIER,
        category: DiagnosticCategory::Error,
        message: "Wrapper type '{0}' has a self-referential carrier: {1}.",
    },
    DiagnosticMessage {
        code: codes::NON_FINAL_WRAPPER,
        category: DiagnosticCategory::Error,
        message: "Wrapper type '{0}' must be final.",
    },
    DiagnosticMessage {
        code: codes::NESTED_WRAPPER,
        category: DiagnosticCategory::Error,
        message: "Wrapper type '{0}' must be declared at top level.",
    },
    DiagnosticMessage {
        code: codes::VALIDATION_WITHOUT_PUBLIC_CONSTRUCTOR,
        category: DiagnosticCategory::Error,
        message: "Wrapper type '{0}' declares a validation block but its primary constructor is not public.",
    },
    DiagnosticMessage {
        code: codes::UNCONSTRAINED_GENERIC_CARRIER,
        category: DiagnosticCategory::Error,
        message: "Carrier of wrapper type '{0}' is the unconstrained type parameter '{1}'.",
    },
    DiagnosticMessage {
        code: codes::CARRIER_CHAIN_TOO_DEEP,
        category: DiagnosticCategory::Error,
        message: "Carrier chain of wrapper type '{0}' exceeds the maximum depth of {1}.",
    },
    DiagnosticMessage {
        code: codes::VARARG_OF_WRAPPER,
        category: DiagnosticCategory::Error,
        message: "Wrapper type '{0}' cannot be used as a variadic element type.",
    },
    DiagnosticMessage {
        code: codes::IDENTITY_COMPARISON_ON_WRAPPER,
        category: DiagnosticCategory::Error,
        message: "Identity comparison is not allowed on operands of wrapper type '{0}'.",
    },
    DiagnosticMessage {
        code: codes::AMBIGUOUS_GENERIC_ARRAY,
        category: DiagnosticCategory::Error,
        message: "Element representation of '{0}' is ambiguous: type parameter '{1}' is bounded by wrapper type '{2}'.",
    },
    DiagnosticMessage {
        code: codes::UNRELATED_WRAPPER_CONVERSION,
        category: DiagnosticCategory::Error,
        message: "Cannot lower a value of wrapper type '{0}' into a position of wrapper type '{1}'.",
    },
    DiagnosticMessage {
        code: codes::MANGLING_COLLISION,
        category: DiagnosticCategory::Error,
        message: "Internal error: symbol '{0}' is produced by both '{1}' and '{2}'.",
    },
    DiagnosticMessage {
        code: codes::UNKNOWN_WRAPPER,
        category: DiagnosticCategory::Error,
        message: "Internal error: unknown wrapper id {0}.",
    },
    DiagnosticMessage {
        code: codes::INITIALIZATION_PATH_VIOLATION,
        category: DiagnosticCategory::Error,
        message: "Internal error: synthetic member '{0}' of '{1}' yields a wrapper value without passing through the factory or the boxing accessor.",
    },
    DiagnosticMessage {
        code: codes::UNKNOWN_TYPE,
        category: DiagnosticCategory::Error,
        message: "Internal error: unknown type id {0}.",
    },
    DiagnosticMessage {
        code: codes::DUPLICATE_ABI_MEMBER,
        category: DiagnosticCategory::Error,
        message: "Internal error: member '{0}' is emitted more than once for '{1}'.",
    },
];

/// Look up a diagnostic message definition by code.
#[must_use]
pub fn get_diagnostic_message(code: u32) -> Option<&'static DiagnosticMessage> {
    DIAGNOSTIC_MESSAGES.iter().find(|m| m.code == code)
}

/// Get the message template for a diagnostic code.
///
/// Returns the template string with `{0}`, `{1}`, etc. placeholders.
/// Use `format_message()` to fill in the placeholders.
#[must_use]
pub fn get_message_template(code: u32) -> Option<&'static str> {
    get_diagnostic_message(code).map(|m| m.message)
}

#[cfg(test)]
#[path = "../tests/diagnostics_tests.rs"]
mod tests;
