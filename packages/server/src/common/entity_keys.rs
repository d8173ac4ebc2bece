//! Typed key definitions for stored records.

pub use super::key::Key;

// ============================================================================
// Record marker types
// ============================================================================

/// Marker type for Source records (linked silo accounts).
pub struct SourceRecord;

/// Marker type for Response records (per-interaction delivery work items).
pub struct ResponseRecord;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Key of a Source: the silo-specific account id.
pub type SourceKey = Key<SourceRecord>;

/// Key of a Response: derived from the silo object it delivers.
pub type ResponseKey = Key<ResponseRecord>;
