//! Lowering errors.
//!
//! Every error carries the source declaration or use site it is about, a stable
//! code from [`ilc_common::diagnostic_codes`], and converts into an
//! [`ilc_common::Diagnostic`]. None are retried and none are downgraded to
//! warnings.

use ilc_common::diagnostics::{Diagnostic, diagnostic_codes as codes, format_message, get_message_template};
use ilc_common::Span;
use std::fmt;

/// Which stage an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Refused at declaration resolution; the wrapper is not resolved further.
    Declaration,
    /// Reported by the boxing decision stage; the unit halts.
    UseSite,
    /// Invariant violation inside lowering itself.
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LoweringError {
    SelfReferentialCarrier {
        wrapper: String,
        /// `A -> B -> A`, outermost first.
        trace: Vec<String>,
        span: Span,
    },
    NonFinalWrapper {
        wrapper: String,
        span: Span,
    },
    NestedWrapper {
        wrapper: String,
        span: Span,
    },
    ValidationWithoutPublicConstructor {
        wrapper: String,
        span: Span,
    },
    UnconstrainedGenericCarrier {
        wrapper: String,
        parameter: String,
        span: Span,
    },
    CarrierChainTooDeep {
        wrapper: String,
        limit: u32,
        span: Span,
    },
    VarargOfWrapper {
        wrapper: String,
        span: Span,
    },
    IdentityComparisonOnWrapper {
        wrapper: String,
        span: Span,
    },
    AmbiguousGenericArray {
        array: String,
        parameter: String,
        bound: String,
        span: Span,
    },
    UnrelatedWrapperConversion {
        actual: String,
        formal: String,
        span: Span,
    },
    ManglingCollision {
        symbol: String,
        first: String,
        second: String,
        span: Span,
    },
    UnknownWrapper {
        id: u32,
    },
    UnknownType {
        id: u32,
    },
    InitializationPathViolation {
        member: String,
        wrapper: String,
    },
    /// Two members of one unit share symbol and descriptor.
    DuplicateAbiMember {
        signature: String,
        wrapper: String,
    },
}

impl LoweringError {
    pub const fn code(&self) -> u32 {
        match self {
            Self::SelfReferentialCarrier { .. } => codes::SELF_REFERENTIAL_CARRIER,
            Self::NonFinalWrapper { .. } => codes::NON_FINAL_WRAPPER,
            Self::NestedWrapper { .. } => codes::NESTED_WRAPPER,
            Self::ValidationWithoutPublicConstructor { .. } => {
                codes::VALIDATION_WITHOUT_PUBLIC_CONSTRUCTOR
            }
            Self::UnconstrainedGenericCarrier { .. } => codes::UNCONSTRAINED_GENERIC_CARRIER,
            Self::CarrierChainTooDeep { .. } => codes::CARRIER_CHAIN_TOO_DEEP,
            Self::VarargOfWrapper { .. } => codes::VARARG_OF_WRAPPER,
            Self::IdentityComparisonOnWrapper { .. } => codes::IDENTITY_COMPARISON_ON_WRAPPER,
            Self::AmbiguousGenericArray { .. } => codes::AMBIGUOUS_GENERIC_ARRAY,
            Self::UnrelatedWrapperConversion { .. } => codes::UNRELATED_WRAPPER_CONVERSION,
            Self::ManglingCollision { .. } => codes::MANGLING_COLLISION,
            Self::UnknownWrapper { .. } => codes::UNKNOWN_WRAPPER,
            Self::UnknownType { .. } => codes::UNKNOWN_TYPE,
            Self::InitializationPathViolation { .. } => codes::INITIALIZATION_PATH_VIOLATION,
            Self::DuplicateAbiMember { .. } => codes::DUPLICATE_ABI_MEMBER,
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self.code() {
            1000..=1999 => ErrorKind::Declaration,
            2000..=2999 => ErrorKind::UseSite,
            _ => ErrorKind::Internal,
        }
    }

    pub const fn span(&self) -> Span {
        match self {
            Self::SelfReferentialCarrier { span, .. }
            | Self::NonFinalWrapper { span, .. }
            | Self::NestedWrapper { span, .. }
            | Self::ValidationWithoutPublicConstructor { span, .. }
            | Self::UnconstrainedGenericCarrier { span, .. }
            | Self::CarrierChainTooDeep { span, .. }
            | Self::VarargOfWrapper { span, .. }
            | Self::IdentityComparisonOnWrapper { span, .. }
            | Self::AmbiguousGenericArray { span, .. }
            | Self::UnrelatedWrapperConversion { span, .. }
            | Self::ManglingCollision { span, .. } => *span,
            Self::UnknownWrapper { .. }
            | Self::UnknownType { .. }
            | Self::InitializationPathViolation { .. }
            | Self::DuplicateAbiMember { .. } => Span::UNKNOWN,
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Self::SelfReferentialCarrier { wrapper, trace, .. } => {
                vec![wrapper.clone(), trace.join(" -> ")]
            }
            Self::NonFinalWrapper { wrapper, .. }
            | Self::NestedWrapper { wrapper, .. }
            | Self::ValidationWithoutPublicConstructor { wrapper, .. }
            | Self::VarargOfWrapper { wrapper, .. }
            | Self::IdentityComparisonOnWrapper { wrapper, .. } => vec![wrapper.clone()],
            Self::UnconstrainedGenericCarrier {
                wrapper, parameter, ..
            } => vec![wrapper.clone(), parameter.clone()],
            Self::CarrierChainTooDeep { wrapper, limit, .. } => {
                vec![wrapper.clone(), limit.to_string()]
            }
            Self::AmbiguousGenericArray {
                array,
                parameter,
                bound,
                ..
            } => vec![array.clone(), parameter.clone(), bound.clone()],
            Self::UnrelatedWrapperConversion { actual, formal, .. } => {
                vec![actual.clone(), formal.clone()]
            }
            Self::ManglingCollision {
                symbol,
                first,
                second,
                ..
            } => vec![symbol.clone(), first.clone(), second.clone()],
            Self::UnknownWrapper { id } | Self::UnknownType { id } => vec![id.to_string()],
            Self::InitializationPathViolation { member, wrapper }
            | Self::DuplicateAbiMember {
                signature: member,
                wrapper,
            } => vec![member.clone(), wrapper.clone()],
        }
    }

    /// Rendered message text.
    pub fn message(&self) -> String {
        let args = self.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match get_message_template(self.code()) {
            Some(template) => format_message(template, &args),
            None => format!("error {}: {}", self.code(), args.join(", ")),
        }
    }

    /// Convert into a driver diagnostic; `files` maps `Span::file` to a path.
    pub fn to_diagnostic(&self, files: &[String]) -> Diagnostic {
        let span = self.span();
        let file = files.get(span.file as usize).cloned().unwrap_or_default();
        Diagnostic::error(file, span.start, span.len(), self.message(), self.code())
    }
}

impl fmt::Display for LoweringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IC{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for LoweringError {}
