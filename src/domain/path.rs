// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes and scope-bound configuration paths.
//!
//! A [`Route`] is a validated `/`-separated key such as `carrier/dhl/username`.
//! A [`Path`] binds a route to a [`ScopeId`] and optionally carries an
//! environment suffix and an advisory expiry.
//!
//! # Encodings
//!
//! - Fully qualified string: `<kind>/<id>/<route>[/<env>]`, e.g.
//!   `websites/1/carrier/dhl/username`. The default scope renders id `0`.
//! - Binary: an 8-byte little-endian word (packed scope in the low 32 bits,
//!   bit 32 flags an environment suffix) followed by the route bytes.
//! - Trie key: `/` + route, followed by `/<kind>/<id>` only for website and
//!   store scopes.
//!
//! The trie key layout is load-bearing. Because the scope suffix comes *after*
//! the route segments, the key of a default-scope path is a segment prefix of
//! the key of every website or store path with the same route. Hooks and
//! subscriptions registered on the default key therefore observe all scopes.

use crate::domain::errors::{ConfigError, Result};
use crate::domain::scope::{ScopeId, ScopeKind, DEFAULT_SCOPE};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

/// Separator between route segments.
pub const SEPARATOR: char = '/';

/// Minimum number of segments of a full route.
pub const MIN_LEVELS: usize = 3;

/// Maximum number of segments a route may have.
pub const MAX_LEVELS: usize = 8;

/// Minimum byte length of a full route (`aa/bb/cc`).
pub const MIN_ROUTE_LEN: usize = 8;

/// Minimum length of the binary encoding.
pub const MIN_BINARY_LEN: usize = 13;

const ENV_SUFFIX_FLAG: u64 = 1 << 32;

/// Route prefixes reserved for fully qualified paths.
const RESERVED_PREFIXES: [&str; 3] = ["default", "websites", "stores"];

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn validate_segments(input: &str, what: &str) -> Result<usize> {
    let mut depth = 0;
    for segment in input.split(SEPARATOR) {
        if !is_valid_segment(segment) {
            return Err(ConfigError::not_valid(format!(
                "{} '{}' contains an invalid segment '{}'",
                what, input, segment
            )));
        }
        depth += 1;
    }
    if depth > MAX_LEVELS {
        return Err(ConfigError::not_valid(format!(
            "{} '{}' has {} levels, maximum is {}",
            what, input, depth, MAX_LEVELS
        )));
    }
    Ok(depth)
}

/// A validated configuration route.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::path::Route;
///
/// let route = Route::new("carrier/dhl/username").unwrap();
/// assert_eq!(route.depth(), 3);
/// assert_eq!(route.part(2).unwrap(), "dhl");
/// assert_eq!(route.level(2).unwrap(), "carrier/dhl");
///
/// assert!(Route::new("carrier/dhl").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route(String);

impl Route {
    /// Validates and wraps a route.
    pub fn new(route: impl Into<String>) -> Result<Self> {
        let route = route.into();
        if route.is_empty() {
            return Err(ConfigError::Empty {
                what: "route".to_string(),
            });
        }
        if route.matches(SEPARATOR).count() < MIN_LEVELS - 1 {
            return Err(ConfigError::not_valid(format!(
                "route '{}' needs at least {} levels",
                route, MIN_LEVELS
            )));
        }
        if route.len() < MIN_ROUTE_LEN {
            return Err(ConfigError::not_valid(format!(
                "route '{}' is shorter than {} characters",
                route, MIN_ROUTE_LEN
            )));
        }
        validate_segments(&route, "route")?;
        Ok(Route(route))
    }

    /// Returns the route as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Returns the 1-based segment at `pos`.
    pub fn part(&self, pos: usize) -> Result<&str> {
        if pos == 0 {
            return Err(ConfigError::not_valid("route part positions start at 1"));
        }
        self.segments().nth(pos - 1).ok_or_else(|| {
            ConfigError::not_valid(format!("route '{}' has no part {}", self.0, pos))
        })
    }

    /// Returns the first `depth` segments joined by the separator.
    pub fn level(&self, depth: usize) -> Result<&str> {
        if depth == 0 || depth > self.depth() {
            return Err(ConfigError::not_valid(format!(
                "route '{}' has no level {}",
                self.0, depth
            )));
        }
        let end = self
            .0
            .match_indices(SEPARATOR)
            .nth(depth - 1)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        Ok(&self.0[..end])
    }

    fn has_reserved_prefix(&self) -> bool {
        RESERVED_PREFIXES.iter().any(|p| self.0.starts_with(p))
    }
}

impl FromStr for Route {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Route::new(s)
    }
}

impl AsRef<str> for Route {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A route bound to a scope.
///
/// Paths are values: every `bind_*`/`with_*` call returns a modified copy.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::path::Path;
///
/// let path = Path::new("aa/bb/cc").unwrap().bind_website(10);
/// assert_eq!(path.to_string(), "websites/10/aa/bb/cc");
/// assert_eq!(path.trie_key(), "/aa/bb/cc/websites/10");
///
/// let parsed = Path::parse("websites/10/aa/bb/cc").unwrap();
/// assert_eq!(parsed, path);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    route: Route,
    scope: ScopeId,
    env_suffix: Option<String>,
    expires: Option<SystemTime>,
}

impl Path {
    /// Creates a default-scope path from a route.
    pub fn new(route: &str) -> Result<Self> {
        Ok(Self::from_route(Route::new(route)?))
    }

    /// Creates a default-scope path from an already validated route.
    pub fn from_route(route: Route) -> Self {
        Path {
            route,
            scope: DEFAULT_SCOPE,
            env_suffix: None,
            expires: None,
        }
    }

    /// Parses a bare route or a fully qualified `kind/id/route` string.
    ///
    /// A string is treated as fully qualified when its first segment is a scope
    /// name (`default`, `websites`, `groups`, `stores`).
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(ConfigError::Empty {
                what: "path".to_string(),
            });
        }
        let first = input.split(SEPARATOR).next().unwrap_or_default();
        if ScopeKind::is_known_token(first) {
            Self::parse_fq(input)
        } else {
            Self::new(input)
        }
    }

    /// Parses a strictly fully qualified `kind/id/route` string.
    pub fn parse_fq(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(ConfigError::Empty {
                what: "path".to_string(),
            });
        }
        let mut parts = input.splitn(3, SEPARATOR);
        let (kind, id, route) = match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(id), Some(route)) => (kind, id, route),
            _ => {
                return Err(ConfigError::not_valid(format!(
                    "'{}' is not a fully qualified path",
                    input
                )))
            }
        };
        let kind: ScopeKind = kind.parse()?;
        let id: u32 = id.parse().map_err(|_| {
            ConfigError::not_valid(format!("invalid scope id '{}' in '{}'", id, input))
        })?;
        let scope = ScopeId::new(kind, id)?;
        Ok(Self::from_route(Route::new(route)?).bind(scope))
    }

    /// Returns the route.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Returns the scope.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Returns the environment suffix, if any.
    pub fn env_suffix(&self) -> Option<&str> {
        self.env_suffix.as_deref()
    }

    /// Returns the advisory expiry, if any.
    pub fn expires(&self) -> Option<SystemTime> {
        self.expires
    }

    /// Returns true if the advisory expiry lies in the past.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// Binds the path to a scope.
    pub fn bind(&self, scope: ScopeId) -> Self {
        Path {
            scope,
            ..self.clone()
        }
    }

    /// Binds the path to the default scope.
    pub fn bind_default(&self) -> Self {
        self.bind(DEFAULT_SCOPE)
    }

    /// Binds the path to a website scope.
    pub fn bind_website(&self, id: u32) -> Self {
        self.bind(ScopeId::website(id))
    }

    /// Binds the path to a store scope.
    pub fn bind_store(&self, id: u32) -> Self {
        self.bind(ScopeId::store(id))
    }

    /// Appends an environment segment to the stored key.
    pub fn with_env_suffix(&self, env: &str) -> Result<Self> {
        if !is_valid_segment(env) {
            return Err(ConfigError::not_valid(format!(
                "invalid environment suffix '{}'",
                env
            )));
        }
        Ok(Path {
            env_suffix: Some(env.to_string()),
            ..self.clone()
        })
    }

    /// Attaches an advisory expiry time.
    pub fn with_expiry(&self, at: SystemTime) -> Self {
        Path {
            expires: Some(at),
            ..self.clone()
        }
    }

    /// Attaches an advisory expiry relative to now.
    pub fn with_ttl(&self, ttl: Duration) -> Self {
        self.with_expiry(SystemTime::now() + ttl)
    }

    /// Checks the rules that keep the fully qualified encoding unambiguous.
    pub fn validate(&self) -> Result<()> {
        if self.scope.kind() == ScopeKind::Absent {
            return Err(ConfigError::not_valid(format!(
                "path '{}' has no scope",
                self.route
            )));
        }
        if self.route.has_reserved_prefix() {
            return Err(ConfigError::not_valid(format!(
                "route '{}' starts with a reserved scope name",
                self.route
            )));
        }
        Ok(())
    }

    /// Returns true if [`Path::validate`] passes.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// The fully qualified string.
    pub fn fq(&self) -> String {
        let mut out = format!(
            "{}/{}/{}",
            self.scope.kind().name(),
            self.scope.id(),
            self.route
        );
        if let Some(env) = &self.env_suffix {
            out.push(SEPARATOR);
            out.push_str(env);
        }
        out
    }

    /// The key under which hooks for this path are looked up.
    pub fn trie_key(&self) -> String {
        trie_key_with_scope(self.route.as_str(), self.scope)
    }

    /// 64-bit SipHash of the fully qualified string (fixed zero key).
    pub fn hash64(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        hasher.write(self.fq().as_bytes());
        hasher.finish()
    }

    /// Encodes the path into its binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut word = u64::from(self.scope.raw());
        if self.env_suffix.is_some() {
            word |= ENV_SUFFIX_FLAG;
        }
        let mut out = Vec::with_capacity(8 + self.route.as_str().len());
        out.extend_from_slice(&word.to_le_bytes());
        out.extend_from_slice(self.route.as_str().as_bytes());
        if let Some(env) = &self.env_suffix {
            out.push(SEPARATOR as u8);
            out.extend_from_slice(env.as_bytes());
        }
        out
    }

    /// Decodes a path from its binary form.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_BINARY_LEN {
            return Err(ConfigError::not_valid(format!(
                "binary path needs at least {} bytes, got {}",
                MIN_BINARY_LEN,
                data.len()
            )));
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&data[..8]);
        let word = u64::from_le_bytes(word);
        let scope = ScopeId::from_raw(word as u32)?;
        let rest = std::str::from_utf8(&data[8..])
            .map_err(|e| ConfigError::not_valid(format!("binary path is not UTF-8: {}", e)))?;

        if word & ENV_SUFFIX_FLAG != 0 {
            let (route, env) = rest.rsplit_once(SEPARATOR).ok_or_else(|| {
                ConfigError::not_valid("binary path flags a missing environment suffix")
            })?;
            Path::new(route)?.bind(scope).with_env_suffix(env)
        } else {
            Ok(Path::new(rest)?.bind(scope))
        }
    }
}

impl FromStr for Path {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fq())
    }
}

fn trie_key_with_scope(route: &str, scope: ScopeId) -> String {
    match scope.kind() {
        ScopeKind::Website | ScopeKind::Store => format!(
            "{sep}{route}{sep}{kind}{sep}{id}",
            sep = SEPARATOR,
            route = route,
            kind = scope.kind().name(),
            id = scope.id()
        ),
        _ => format!("{}{}", SEPARATOR, route),
    }
}

/// Builds the trie key for a registration string.
///
/// Registrations may name a partial route (`carrier/dhl`) to observe a whole
/// subtree, or a fully qualified one (`websites/2/carrier/dhl/username`) to
/// observe a single scope. Segments are validated like route segments, but
/// the minimum depth does not apply.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::path::trie_key_for;
///
/// assert_eq!(trie_key_for("carrier/dhl").unwrap(), "/carrier/dhl");
/// assert_eq!(
///     trie_key_for("stores/3/carrier/dhl/username").unwrap(),
///     "/carrier/dhl/username/stores/3"
/// );
/// assert_eq!(trie_key_for("default/0/aa/bb/cc").unwrap(), "/aa/bb/cc");
/// ```
pub fn trie_key_for(key: &str) -> Result<String> {
    if key.is_empty() {
        return Err(ConfigError::Empty {
            what: "registration key".to_string(),
        });
    }
    let first = key.split(SEPARATOR).next().unwrap_or_default();
    if !ScopeKind::is_known_token(first) {
        validate_segments(key, "registration key")?;
        return Ok(format!("{}{}", SEPARATOR, key));
    }

    let mut parts = key.splitn(3, SEPARATOR);
    let (kind, id, route) = match (parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(id), Some(route)) => (kind, id, route),
        _ => {
            return Err(ConfigError::not_valid(format!(
                "registration key '{}' names a scope without a route",
                key
            )))
        }
    };
    let kind: ScopeKind = kind.parse()?;
    let id: u32 = id.parse().map_err(|_| {
        ConfigError::not_valid(format!("invalid scope id '{}' in '{}'", id, key))
    })?;
    validate_segments(route, "registration key")?;
    Ok(trie_key_with_scope(route, ScopeId::new(kind, id)?))
}
