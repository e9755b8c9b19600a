use std::collections::HashSet;

use crate::kernel::error::Error;
use crate::kernel::name::{NamePattern, ServiceName, matches_any};

fn name(s: &str) -> ServiceName {
    ServiceName::new(s).expect("valid service name")
}

fn pattern(s: &str) -> NamePattern {
    NamePattern::new(s).expect("valid pattern")
}

#[test]
fn test_service_name_validation() {
    assert!(ServiceName::new("app/db/pool").is_ok());
    assert!(ServiceName::new("kernel").is_ok());

    for bad in ["", "app//db", "/app", "app/", "app/*", "app/d?"] {
        let err = ServiceName::new(bad).expect_err(bad);
        assert!(matches!(err, Error::InvalidServiceName { .. }), "{} gave {:?}", bad, err);
    }
}

#[test]
fn test_service_name_segments_and_display() {
    let n = name("app/db/pool");
    assert_eq!(n.segments().collect::<Vec<_>>(), vec!["app", "db", "pool"]);
    assert_eq!(n.to_string(), "app/db/pool");
    assert_eq!("app/db/pool".parse::<ServiceName>().unwrap(), n);
}

#[test]
fn test_service_name_serde_round_trip() {
    let n = name("app/db");
    let json = serde_json::to_string(&n).unwrap();
    assert_eq!(json, "\"app/db\"");
    let back: ServiceName = serde_json::from_str(&json).unwrap();
    assert_eq!(back, n);

    assert!(serde_json::from_str::<ServiceName>("\"app//db\"").is_err());
}

#[test]
fn test_single_segment_wildcards() {
    let p = pattern("app/*");
    assert!(p.matches(&name("app/db")));
    assert!(p.matches(&name("app/web")));
    assert!(!p.matches(&name("app")));
    assert!(!p.matches(&name("app/db/pool")));

    let q = pattern("app/d?");
    assert!(q.matches(&name("app/db")));
    assert!(!q.matches(&name("app/dbx")));

    let inner = pattern("app/*-pool");
    assert!(inner.matches(&name("app/db-pool")));
    assert!(inner.matches(&name("app/-pool")));
    assert!(!inner.matches(&name("app/db-pools")));
}

#[test]
fn test_multi_segment_wildcard() {
    let p = pattern("app/**");
    assert!(p.matches(&name("app")));
    assert!(p.matches(&name("app/db")));
    assert!(p.matches(&name("app/db/pool")));
    assert!(!p.matches(&name("other/db")));

    let tail = pattern("**/pool");
    assert!(tail.matches(&name("pool")));
    assert!(tail.matches(&name("a/b/pool")));
    assert!(!tail.matches(&name("a/b/pools")));

    assert!(NamePattern::any().matches(&name("anything/at/all")));
}

#[test]
fn test_exact_pattern() {
    let n = name("app/db");
    let exact = NamePattern::exact(&n);
    assert!(!exact.is_wildcard());
    assert!(exact.matches(&n));
    assert!(!exact.matches(&name("app/db2")));
    assert!(pattern("app/*").is_wildcard());
}

#[test]
fn test_pattern_equality_is_on_source_text() {
    let mut set = HashSet::new();
    set.insert(pattern("app/*"));
    set.insert(pattern("app/*"));
    set.insert(pattern("app/**"));
    assert_eq!(set.len(), 2);
    assert_eq!(pattern("a/b"), NamePattern::from(&name("a/b")));
}

#[test]
fn test_invalid_patterns() {
    assert!(NamePattern::new("").is_err());
    assert!(NamePattern::new("app//x").is_err());
}

#[test]
fn test_matches_any_with_empty_set_matches_everything() {
    let n = name("x/y");
    assert!(matches_any(&[], &n));
    assert!(matches_any(&[pattern("a"), pattern("x/*")], &n));
    assert!(!matches_any(&[pattern("a"), pattern("b")], &n));
}

#[test]
fn test_backtracking_wildcards() {
    let p = pattern("app/a*b*c");
    assert!(p.matches(&name("app/abc")));
    assert!(p.matches(&name("app/aXbYbZc")));
    assert!(p.matches(&name("app/abcbc")));
    assert!(!p.matches(&name("app/abcb")));

    let q = pattern("**/db/**/pool");
    assert!(q.matches(&name("db/pool")));
    assert!(q.matches(&name("x/db/y/db/z/pool")));
    assert!(!q.matches(&name("x/db/y/pool/z")));
    assert!(pattern("app/**/**").matches(&name("app")));
}

#[test]
fn test_failing_wildcards_on_long_names_finish() {
    let segment = "a".repeat(200);
    let stars = pattern(&format!("{}*b", "*a".repeat(12)));
    assert!(!stars.matches(&name(&segment)));
    assert!(pattern(&format!("{}*", "*a".repeat(12))).matches(&name(&segment)));

    let deep = name(&vec!["x"; 120].join("/"));
    let nested = pattern(&format!("{}**/y", "**/x/".repeat(10)));
    assert!(!nested.matches(&deep));
    assert!(pattern(&format!("{}**", "**/x/".repeat(10))).matches(&deep));
}
