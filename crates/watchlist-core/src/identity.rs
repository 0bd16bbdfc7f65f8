//! Identity resolution across the catalog, persisted and title namespaces
//!
//! An item can be referenced by an external catalog id before it is
//! materialized and by its persisted id afterwards, while both forms carry a
//! display title. Resolution decides whether two references denote the same
//! list entry using only data that is already loaded.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;
use crate::item::{CatalogRef, ItemIdentity, ItemKey, PersistedId};

/// Which rule made two identities match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchReason {
    SameKey,
    SameCatalogRef,
    SameTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Match(MatchReason),
    NoMatch,
}

impl Resolution {
    pub fn is_match(&self) -> bool {
        matches!(self, Resolution::Match(_))
    }
}

/// Parse a raw identifier into its canonical key.
///
/// `"catalog-a:603"` and `"catalog-b:tt0133093"` are catalog references; a
/// UUID is a persisted id.
pub fn canonicalize(raw: &str) -> Result<ItemKey, IdentityError> {
    let raw = raw.trim();
    if raw.contains(':') {
        return raw.parse::<CatalogRef>().map(ItemKey::Catalog);
    }
    Uuid::parse_str(raw)
        .map(|id| ItemKey::Persisted(PersistedId(id)))
        .map_err(|_| IdentityError::Unrecognized(raw.to_string()))
}

/// Decide whether two identities denote the same item.
///
/// Rules, first hit wins: equal keys, the same decoded catalog reference,
/// then case-insensitively equal titles. Titles are only consulted when the
/// ids cannot decide: two different persisted ids, or two different catalog
/// references, never match. A blank or missing title never matches anything.
pub fn resolve(a: &ItemIdentity, b: &ItemIdentity) -> Resolution {
    if a.key == b.key {
        return Resolution::Match(MatchReason::SameKey);
    }

    match (a.catalog_ref(), b.catalog_ref()) {
        (Some(ra), Some(rb)) if ra == rb => {
            return Resolution::Match(MatchReason::SameCatalogRef);
        }
        (Some(_), Some(_)) => return Resolution::NoMatch,
        _ => {}
    }

    if a.key.persisted().is_some() && b.key.persisted().is_some() {
        return Resolution::NoMatch;
    }

    if titles_match(a.title.as_deref(), b.title.as_deref()) {
        return Resolution::Match(MatchReason::SameTitle);
    }

    Resolution::NoMatch
}

fn titles_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (normalize_title(a), normalize_title(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn normalize_title(title: Option<&str>) -> Option<String> {
    let title = title?.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_lowercase())
    }
}
