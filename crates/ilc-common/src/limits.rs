//! Centralized limits and thresholds for the lowering pipeline.
//!
//! Keeping these in one place prevents duplicate definitions with
//! inconsistent values between the resolver, the mangler and the driver.

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum length of a carrier chain (`W3(W2(W1(Int32)))` has length 3).
///
/// Cycles are caught by declaration validation before resolution starts; this
/// bound only protects against pathological but acyclic chains. Exceeding it
/// is reported as a declaration error on the outermost wrapper.
pub const MAX_CARRIER_CHAIN_DEPTH: u32 = 64;

/// Iteration budget for a single top-level resolution.
pub const MAX_RESOLUTION_ITERATIONS: u32 = 10_000;

// =============================================================================
// Mangling
// =============================================================================

/// Default number of base64url characters kept from the signature digest.
pub const DEFAULT_MANGLE_HASH_LENGTH: usize = 7;

/// Shortest hash suffix accepted from configuration.
pub const MIN_MANGLE_HASH_LENGTH: usize = 4;

/// Longest hash suffix accepted from configuration (43 chars encode a full
/// SHA-256 digest; 16 is already far beyond collision range for one scope).
pub const MAX_MANGLE_HASH_LENGTH: usize = 16;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Initial capacity of the per-scope symbol table.
pub const SYMBOL_TABLE_INITIAL_CAPACITY: usize = 256;
