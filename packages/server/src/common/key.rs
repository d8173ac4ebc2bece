//! Typed string keys for records whose identity comes from outside.
//!
//! Sources are keyed by a silo-specific id and responses by the id of the
//! silo object they were derived from, so neither can use generated UUIDs.
//! `Key<T>` wraps the string and keeps keys of different records apart at
//! compile time.
//!
//! ```compile_fail
//! use bridge_core::common::{ResponseKey, SourceKey};
//!
//! let source = SourceKey::new("snarfed.org");
//! let wrong: ResponseKey = source;
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

#[repr(transparent)]
pub struct Key<T>(String, PhantomData<fn() -> T>);

impl<T> Key<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into(), PhantomData)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The key with any `tag:domain,year:` prefix removed.
    ///
    /// Silo ids are usually tag URIs; URLs built from them use the bare part.
    pub fn short_id(&self) -> &str {
        strip_tag_uri(&self.0)
    }
}

/// Strip a `tag:domain,year:` prefix from an id, if present.
pub fn strip_tag_uri(id: &str) -> &str {
    match id.strip_prefix("tag:") {
        Some(rest) => match rest.split_once(':') {
            Some((authority, specific)) if authority.contains(',') => specific,
            _ => id,
        },
        None => id,
    }
}

// ============================================================================
// Standard trait implementations
// ============================================================================

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone(), PhantomData)
    }
}

impl<T> Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&format!("Key<{}>", std::any::type_name::<T>()))
            .field(&self.0)
            .finish()
    }
}

impl<T> Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Key<T> {}

impl<T> PartialOrd for Key<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Key<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> Borrow<str> for Key<T> {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<T> AsRef<str> for Key<T> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<T> From<&str> for Key<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T> From<String> for Key<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Serde support
// ============================================================================

impl<T> Serialize for Key<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Key<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// ============================================================================
// sqlx support
// ============================================================================

use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgHasArrayType, PgTypeInfo, PgValueRef, Postgres};
use sqlx::{Decode, Encode, Type};

impl<T> Type<Postgres> for Key<T> {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<T> PgHasArrayType for Key<T> {
    fn array_type_info() -> PgTypeInfo {
        <String as PgHasArrayType>::array_type_info()
    }
}

impl<T> Encode<'_, Postgres> for Key<T> {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<T> Decode<'_, Postgres> for Key<T> {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        <String as Decode<Postgres>>::decode(value).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing;
    type ThingKey = Key<Thing>;

    #[test]
    fn test_short_id_strips_tag_uri() {
        assert_eq!(ThingKey::new("tag:source.com,2013:1_2_a").short_id(), "1_2_a");
        assert_eq!(ThingKey::new("plain-id").short_id(), "plain-id");
        assert_eq!(ThingKey::new("tag:nocomma:x").short_id(), "tag:nocomma:x");
    }

    #[test]
    fn test_serde_is_transparent() {
        let key = ThingKey::new("abc");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"abc\"");
        let parsed: ThingKey = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_hash_map_lookup_by_str() {
        use std::collections::HashMap;
        let mut map: HashMap<ThingKey, u8> = HashMap::new();
        map.insert(ThingKey::new("k"), 1);
        assert_eq!(map.get("k"), Some(&1));
    }

    #[test]
    fn test_debug_includes_type_name() {
        let debug = format!("{:?}", ThingKey::new("k"));
        assert!(debug.contains("Thing"));
    }
}
