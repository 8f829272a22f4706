// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scope kinds and packed scope identifiers.
//!
//! A configuration value lives in exactly one scope: the global default, a
//! website, or a store. Groups exist as an internal level between websites and
//! stores. A [`ScopeId`] packs the kind and a numeric id into a single `u32`
//! (`kind << 24 | id`) so that it can be copied, hashed and compared cheaply.

use crate::domain::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest numeric id a scope can carry (24 bits).
pub const MAX_SCOPE_ID: u32 = 0x00FF_FFFF;

/// The kind of a scope.
///
/// The ordering of the variants is meaningful: a scope compares *greater* when
/// it is more specific. Field metas use it to express the most specific scope
/// that may write a route.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// No scope assigned.
    #[default]
    Absent = 0,
    /// The global default scope.
    Default = 1,
    /// A website.
    Website = 2,
    /// A store group. Internal only.
    Group = 3,
    /// A store view.
    Store = 4,
}

impl ScopeKind {
    /// The literal used in fully qualified paths and trie keys.
    pub fn name(self) -> &'static str {
        match self {
            ScopeKind::Absent => "absent",
            ScopeKind::Default => "default",
            ScopeKind::Website => "websites",
            ScopeKind::Group => "groups",
            ScopeKind::Store => "stores",
        }
    }

    /// Converts the raw byte of a packed id back into a kind.
    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(ScopeKind::Absent),
            1 => Ok(ScopeKind::Default),
            2 => Ok(ScopeKind::Website),
            3 => Ok(ScopeKind::Group),
            4 => Ok(ScopeKind::Store),
            other => Err(ConfigError::NotSupported {
                token: format!("scope kind {}", other),
            }),
        }
    }

    /// Returns true if a fully qualified path may start with this kind's name.
    pub fn is_known_token(token: &str) -> bool {
        token.parse::<ScopeKind>().is_ok()
    }

    /// The kind that may act as the parent of this kind in a fallback chain.
    pub fn parent(self) -> Option<ScopeKind> {
        match self {
            ScopeKind::Store | ScopeKind::Group => Some(ScopeKind::Website),
            ScopeKind::Website => Some(ScopeKind::Default),
            ScopeKind::Default | ScopeKind::Absent => None,
        }
    }
}

impl FromStr for ScopeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(ScopeKind::Default),
            "websites" => Ok(ScopeKind::Website),
            "groups" => Ok(ScopeKind::Group),
            "stores" => Ok(ScopeKind::Store),
            other => Err(ConfigError::NotSupported {
                token: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A packed `(ScopeKind, id)` pair.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::scope::{ScopeId, ScopeKind};
///
/// let store = ScopeId::store(22);
/// assert_eq!(store.kind(), ScopeKind::Store);
/// assert_eq!(store.id(), 22);
///
/// // the default scope always carries id 0
/// assert_eq!(ScopeId::new(ScopeKind::Default, 7).unwrap().id(), 0);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId(u32);

/// The default scope.
pub const DEFAULT_SCOPE: ScopeId = ScopeId((ScopeKind::Default as u32) << 24);

impl ScopeId {
    /// Packs a kind and id. Fails with `NotValid` if the id exceeds 24 bits.
    pub fn new(kind: ScopeKind, id: u32) -> Result<Self> {
        if id > MAX_SCOPE_ID {
            return Err(ConfigError::not_valid(format!(
                "scope id {} exceeds maximum {}",
                id, MAX_SCOPE_ID
            )));
        }
        let id = if kind == ScopeKind::Default { 0 } else { id };
        Ok(ScopeId(((kind as u32) << 24) | id))
    }

    /// The default scope.
    pub fn default_scope() -> Self {
        DEFAULT_SCOPE
    }

    /// A website scope. Ids above 24 bits are truncated.
    pub fn website(id: u32) -> Self {
        ScopeId(((ScopeKind::Website as u32) << 24) | (id & MAX_SCOPE_ID))
    }

    /// A group scope. Ids above 24 bits are truncated.
    pub fn group(id: u32) -> Self {
        ScopeId(((ScopeKind::Group as u32) << 24) | (id & MAX_SCOPE_ID))
    }

    /// A store scope. Ids above 24 bits are truncated.
    pub fn store(id: u32) -> Self {
        ScopeId(((ScopeKind::Store as u32) << 24) | (id & MAX_SCOPE_ID))
    }

    /// Rebuilds a scope from its packed representation.
    pub fn from_raw(raw: u32) -> Result<Self> {
        let kind = ScopeKind::from_u8((raw >> 24) as u8)?;
        ScopeId::new(kind, raw & MAX_SCOPE_ID)
    }

    /// The packed representation.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The scope kind. Unknown raw kinds cannot be constructed, so this never fails.
    pub fn kind(self) -> ScopeKind {
        ScopeKind::from_u8((self.0 >> 24) as u8).unwrap_or(ScopeKind::Absent)
    }

    /// The numeric id.
    pub fn id(self) -> u32 {
        self.0 & MAX_SCOPE_ID
    }

    /// Validates a declared parent/child relationship.
    ///
    /// A store (or group) must have a website parent, a website must have the
    /// default parent. Anything else is `NotValid`.
    pub fn validate_parent(self, parent: ScopeId) -> Result<()> {
        match self.kind().parent() {
            Some(expected) if expected == parent.kind() => Ok(()),
            _ => Err(ConfigError::not_valid(format!(
                "{} cannot be the parent of {}",
                parent, self
            ))),
        }
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        DEFAULT_SCOPE
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind().name(), self.id())
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({:?}, {})", self.kind(), self.id())
    }
}
