use super::*;

#[test]
fn builtin_registry_has_three_adapters() {
    let registry = AdapterRegistry::with_builtin_adapters();
    assert!(registry.get("claude").is_some());
    assert!(registry.get("gemini").is_some());
    assert!(registry.get("codex").is_some());
    assert!(registry.get("nonexistent").is_none());
}

#[test]
fn default_adapter_is_claude() {
    let registry = AdapterRegistry::with_builtin_adapters();
    assert_eq!(registry.default_adapter().expect("default present").name(), "claude");
    assert_eq!(registry.default_name(), "claude");
}

#[test]
fn find_by_prefix_resolves_recovery_lookup() {
    let registry = AdapterRegistry::with_builtin_adapters();
    let adapter = registry.find_by_prefix("ap-cc-ab12").expect("found");
    assert_eq!(adapter.name(), "claude");
    assert!(registry.find_by_prefix("unknown-prefix-xyz").is_none());
}

#[test]
fn find_by_binary_resolves_payload_routing() {
    let registry = AdapterRegistry::with_builtin_adapters();
    let adapter = registry.find_by_binary("gemini").expect("found");
    assert_eq!(adapter.name(), "gemini");
}

#[test]
fn version_in_range_accepts_unparsable_as_compatible() {
    let range = VersionRange {
        min: Some("1.0.0"),
        max: None,
    };
    assert!(version_in_range("not-a-version", &range));
    assert!(version_in_range("1.2.3", &range));
    assert!(!version_in_range("0.9.0", &range));
}
