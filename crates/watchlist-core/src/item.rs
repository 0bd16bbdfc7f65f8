use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::IdentityError;

/// External lookup providers a title can be referenced from before it is
/// backed by a local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogProvider {
    CatalogA,
    CatalogB,
}

impl CatalogProvider {
    /// Textual tag used in the `"<tag>:<external_id>"` raw form.
    pub fn tag(&self) -> &'static str {
        match self {
            CatalogProvider::CatalogA => "catalog-a",
            CatalogProvider::CatalogB => "catalog-b",
        }
    }

    pub fn all() -> &'static [CatalogProvider] {
        &[CatalogProvider::CatalogA, CatalogProvider::CatalogB]
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.tag() == tag)
    }
}

impl fmt::Display for CatalogProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Reference to a title in an external catalog.
///
/// Produced by search/browse. Not votable or listable until it has been
/// materialized into a [`PersistedItem`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogRef {
    pub provider: CatalogProvider,
    pub external_id: String,
}

impl CatalogRef {
    pub fn new(provider: CatalogProvider, external_id: impl Into<String>) -> Self {
        Self {
            provider,
            external_id: external_id.into(),
        }
    }
}

impl fmt::Display for CatalogRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider.tag(), self.external_id)
    }
}

impl FromStr for CatalogRef {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, external_id) = s
            .split_once(':')
            .ok_or_else(|| IdentityError::Unrecognized(s.to_string()))?;
        let provider = CatalogProvider::from_tag(tag)
            .ok_or_else(|| IdentityError::UnknownProvider(tag.to_string()))?;
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(IdentityError::EmptyExternalId(provider));
        }
        Ok(CatalogRef::new(provider, external_id))
    }
}

/// Identifier of a record owned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedId(pub Uuid);

impl PersistedId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PersistedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for PersistedId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifier of a shared list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(pub Uuid);

impl ListId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ListId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ListId)
    }
}

/// The two identifier namespaces an item can be addressed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ItemKey {
    Catalog(CatalogRef),
    Persisted(PersistedId),
}

impl ItemKey {
    pub fn persisted(&self) -> Option<PersistedId> {
        match self {
            ItemKey::Persisted(id) => Some(*id),
            ItemKey::Catalog(_) => None,
        }
    }

    pub fn catalog(&self) -> Option<&CatalogRef> {
        match self {
            ItemKey::Catalog(r) => Some(r),
            ItemKey::Persisted(_) => None,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Catalog(r) => r.fmt(f),
            ItemKey::Persisted(id) => id.fmt(f),
        }
    }
}

impl From<CatalogRef> for ItemKey {
    fn from(r: CatalogRef) -> Self {
        ItemKey::Catalog(r)
    }
}

impl From<PersistedId> for ItemKey {
    fn from(id: PersistedId) -> Self {
        ItemKey::Persisted(id)
    }
}

/// Everything already loaded about an item that identity resolution may use.
///
/// The same logical title can be held under its catalog reference by one
/// part of the app and under its persisted id by another; `external_ref`
/// and `title` let the two be recognized as one item without a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemIdentity {
    pub key: ItemKey,
    pub external_ref: Option<CatalogRef>,
    pub title: Option<String>,
}

impl ItemIdentity {
    pub fn catalog(r: CatalogRef, title: Option<&str>) -> Self {
        Self {
            external_ref: Some(r.clone()),
            key: ItemKey::Catalog(r),
            title: title.map(str::to_string),
        }
    }

    pub fn persisted(id: PersistedId, title: Option<&str>) -> Self {
        Self {
            key: ItemKey::Persisted(id),
            external_ref: None,
            title: title.map(str::to_string),
        }
    }

    /// The catalog reference this identity decodes to, if any.
    pub fn catalog_ref(&self) -> Option<&CatalogRef> {
        self.key.catalog().or(self.external_ref.as_ref())
    }

    /// Same identity re-keyed onto a persisted id, keeping the catalog
    /// reference and title it was known by.
    pub fn with_persisted(&self, id: PersistedId) -> Self {
        Self {
            key: ItemKey::Persisted(id),
            external_ref: self.catalog_ref().cloned(),
            title: self.title.clone(),
        }
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) if !title.trim().is_empty() => write!(f, "{} ({})", title, self.key),
            _ => self.key.fmt(f),
        }
    }
}

/// Identity known only by its key, as parsed from a raw id.
impl From<ItemKey> for ItemIdentity {
    fn from(key: ItemKey) -> Self {
        Self {
            external_ref: key.catalog().cloned(),
            key,
            title: None,
        }
    }
}

/// The store's durable record for a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedItem {
    pub id: PersistedId,
    pub title: String,
    pub external_ref: Option<CatalogRef>,
}

impl PersistedItem {
    pub fn identity(&self) -> ItemIdentity {
        ItemIdentity {
            key: ItemKey::Persisted(self.id),
            external_ref: self.external_ref.clone(),
            title: Some(self.title.clone()),
        }
    }
}
