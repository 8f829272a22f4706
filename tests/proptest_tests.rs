// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property-based tests using proptest.
//!
//! These tests use property-based testing to verify that path encodings,
//! hook lookups and value conversions hold for arbitrary inputs.

use proptest::prelude::*;
use scopecfg::domain::{trie_key_for, EventKind, Path, Result, ScopeId, Value, DEFAULT_SCOPE};
use scopecfg::trie::HookRegistry;
use std::sync::Arc;
use std::time::Duration;

// Routes whose first segment can never be read as a scope name
fn route_strategy() -> impl Strategy<Value = String> {
    (
        "[a-c][a-z0-9_]{1,7}",
        prop::collection::vec("[a-z0-9_]{2,8}", 2..=7),
    )
        .prop_map(|(first, rest)| {
            let mut segments = vec![first];
            segments.extend(rest);
            segments.join("/")
        })
}

fn scope_strategy() -> impl Strategy<Value = ScopeId> {
    prop_oneof![
        Just(DEFAULT_SCOPE),
        (1u32..100_000).prop_map(ScopeId::website),
        (1u32..100_000).prop_map(ScopeId::store),
    ]
}

fn path_strategy() -> impl Strategy<Value = Path> {
    (route_strategy(), scope_strategy())
        .prop_map(|(route, scope)| Path::new(&route).unwrap().bind(scope))
}

// The fully qualified string parses back to the same path
proptest! {
    #[test]
    fn test_fq_roundtrip(path in path_strategy()) {
        let fq = path.fq();
        let parsed = Path::parse(&fq).unwrap();
        prop_assert_eq!(&parsed, &path);
        prop_assert_eq!(parsed.to_string(), fq);
    }
}

// The binary form decodes to the same path, environment suffix included
proptest! {
    #[test]
    fn test_binary_roundtrip(
        path in path_strategy(),
        env in prop::option::of("[a-z]{1,8}")
    ) {
        let path = match env {
            Some(env) => path.with_env_suffix(&env).unwrap(),
            None => path,
        };
        let decoded = Path::from_bytes(&path.to_bytes()).unwrap();
        prop_assert_eq!(decoded, path);
    }
}

// Truncated binary input is rejected, never panics
proptest! {
    #[test]
    fn test_binary_truncation_fails_gracefully(path in path_strategy(), cut in 0usize..13) {
        let bytes = path.to_bytes();
        let cut = cut.min(bytes.len());
        prop_assert!(Path::from_bytes(&bytes[..cut]).is_err());
    }
}

// The hash depends only on the fully qualified string
proptest! {
    #[test]
    fn test_hash_follows_fq(a in path_strategy(), b in path_strategy()) {
        if a.fq() == b.fq() {
            prop_assert_eq!(a.hash64(), b.hash64());
        }
        prop_assert_eq!(a.hash64(), Path::parse(&a.fq()).unwrap().hash64());
    }
}

// An observer registered on any level of a route sees every scope of it
proptest! {
    #[test]
    fn test_route_levels_match_scoped_paths(path in path_strategy(), depth in 1usize..=8) {
        let depth = depth.min(path.route().depth());
        let level = path.route().level(depth).unwrap().to_string();

        let registry = HookRegistry::new();
        registry.put_event(
            EventKind::BeforeSet,
            &trie_key_for(&level).unwrap(),
            Arc::new(|_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> { Ok(raw) }),
        );
        prop_assert_eq!(registry.observers(EventKind::BeforeSet, &path.trie_key()).len(), 1);
        prop_assert!(path.trie_key().starts_with(&trie_key_for(&level).unwrap()));
    }
}

// A registration on a longer sibling segment never matches
proptest! {
    #[test]
    fn test_sibling_segments_do_not_match(path in path_strategy(), suffix in "[a-z]{1,4}") {
        let first = path.route().part(1).unwrap();
        let sibling = format!("{}{}", first, suffix);

        let registry = HookRegistry::new();
        registry.put_event(
            EventKind::AfterSet,
            &trie_key_for(&sibling).unwrap(),
            Arc::new(|_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> { Ok(raw) }),
        );
        prop_assert!(registry.observers(EventKind::AfterSet, &path.trie_key()).is_empty());
    }
}

// Integers survive a round trip through the raw bytes
proptest! {
    #[test]
    fn test_integer_values(n in any::<i64>()) {
        let value = Value::new(Path::new("aa/bb/cc").unwrap(), n.to_string());
        prop_assert_eq!(value.as_i64().unwrap(), n);
    }
}

// Whole second durations parse in both notations
proptest! {
    #[test]
    fn test_duration_values(minutes in 0u64..10_000, seconds in 0u64..60) {
        let total = Duration::from_secs(minutes * 60 + seconds);
        let path = Path::new("aa/bb/cc").unwrap();

        let bare = Value::new(path.clone(), (minutes * 60 + seconds).to_string());
        prop_assert_eq!(bare.as_duration().unwrap(), total);

        let suffixed = Value::new(path, format!("{}m{}s", minutes, seconds));
        prop_assert_eq!(suffixed.as_duration().unwrap(), total);
    }
}

// Arbitrary strings never panic any conversion
proptest! {
    #[test]
    fn test_conversions_fail_gracefully(s in "\\PC*") {
        let value = Value::new(Path::new("aa/bb/cc").unwrap(), s.clone());
        prop_assert_eq!(value.as_str().unwrap(), s.as_str());
        let _ = value.as_bool();
        let _ = value.as_i32();
        let _ = value.as_f64();
        let _ = value.as_duration();
        let _ = value.as_time();
        let _ = value.as_list();
    }
}
