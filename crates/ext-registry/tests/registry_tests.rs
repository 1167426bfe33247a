//! End-to-end registry behavior over an in-memory filesystem.

use std::sync::Arc;

use ext_fs::{MemoryFs, NormalizedPath};
use ext_registry::{Error, ExtensionRegistry, MemoryCache, RegistryConfig, Settings};
use ext_test_utils::{ManifestBuilder, memory_fs};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn new_registry(fs: &Arc<MemoryFs>, cache: &Arc<MemoryCache>, config: RegistryConfig) -> ExtensionRegistry {
    ExtensionRegistry::new(fs.clone(), config).with_cache(cache.clone())
}

fn load(registry: &mut ExtensionRegistry, paths: &[&str]) -> ext_registry::Result<()> {
    for path in paths {
        registry.queue(*path)?;
    }
    registry.load_from_queue()
}

fn two_extensions() -> Arc<MemoryFs> {
    Arc::new(memory_fs(&[
        (
            "/ext/A/extension.json",
            ManifestBuilder::new("A")
                .version("1.0.0")
                .config("Foo", json!(1))
                .set("TrackingCategories", json!(["a-category"]))
                .build(),
        ),
        (
            "/ext/B/extension.json",
            ManifestBuilder::new("B")
                .config_entry("List", json!({"value": ["b"], "merge_strategy": "array_merge"}))
                .build(),
        ),
    ]))
}

#[test]
fn cached_queue_is_not_parsed_again() {
    let fs = two_extensions();
    let cache = Arc::new(MemoryCache::new());

    let mut first = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut first, &["/ext/A/extension.json", "/ext/B/extension.json"]).unwrap();
    assert_eq!(fs.reads(), 2);

    let mut second = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut second, &["/ext/A/extension.json", "/ext/B/extension.json"]).unwrap();
    assert_eq!(fs.reads(), 2);

    assert_eq!(first.settings(), second.settings());
    assert_eq!(
        first.all_things().keys().collect::<Vec<_>>(),
        second.all_things().keys().collect::<Vec<_>>()
    );
}

#[test]
fn changed_mtime_invalidates_the_cache() {
    let fs = two_extensions();
    let cache = Arc::new(MemoryCache::new());

    load(
        &mut new_registry(&fs, &cache, RegistryConfig::default()),
        &["/ext/A/extension.json"],
    )
    .unwrap();
    fs.set_mtime("/ext/A/extension.json", 99);
    load(
        &mut new_registry(&fs, &cache, RegistryConfig::default()),
        &["/ext/A/extension.json"],
    )
    .unwrap();
    assert_eq!(fs.reads(), 2);
}

#[test]
fn warnings_prevent_caching_in_development() {
    let fs = Arc::new(memory_fs(&[(
        "/ext/Old/extension.json",
        ManifestBuilder::legacy("Old").set("config", json!({"Old": true})).build(),
    )]));
    let cache = Arc::new(MemoryCache::new());
    let config = RegistryConfig {
        development_warnings: true,
        ..RegistryConfig::default()
    };

    for _ in 0..2 {
        let mut registry = new_registry(&fs, &cache, config.clone());
        load(&mut registry, &["/ext/Old/extension.json"]).unwrap();
        assert_eq!(registry.settings().get("wgOld"), Some(&json!(true)));
    }
    assert_eq!(fs.reads(), 2);
    assert!(cache.is_empty());

    // Without development warnings the noisy result is cached as usual
    let quiet = RegistryConfig::default();
    for _ in 0..2 {
        load(&mut new_registry(&fs, &cache, quiet.clone()), &["/ext/Old/extension.json"]).unwrap();
    }
    assert_eq!(fs.reads(), 3);
}

#[test]
fn lazy_attributes_come_from_their_own_cache_entry() {
    let fs = two_extensions();
    let cache = Arc::new(MemoryCache::new());

    let mut first = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut first, &["/ext/A/extension.json", "/ext/B/extension.json"]).unwrap();
    assert_eq!(first.attribute("TrackingCategories").unwrap(), json!(["a-category"]));
    assert!(cache.keys().iter().any(|key| key.contains(":registration-lazy-attrib:")
        && key.ends_with(":TrackingCategories")));

    let mut second = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut second, &["/ext/A/extension.json", "/ext/B/extension.json"]).unwrap();
    assert_eq!(second.attribute("TrackingCategories").unwrap(), json!(["a-category"]));
    assert_eq!(second.attribute("QUnitTestModules").unwrap(), json!([]));
    // The empty lazy attribute was looked up by re-reading both manifests
    assert_eq!(fs.reads(), 4);
}

#[test]
fn lazy_attributes_after_several_batches_are_not_shared() {
    let category = |name: &str| ManifestBuilder::new(name).set("TrackingCategories", json!([name])).build();
    let fs = Arc::new(memory_fs(&[
        ("/ext/A/extension.json", category("a")),
        ("/ext/B/extension.json", ManifestBuilder::new("B").build()),
        ("/ext/C/extension.json", category("c")),
    ]));
    let cache = Arc::new(MemoryCache::new());

    let mut first = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut first, &["/ext/A/extension.json"]).unwrap();
    load(&mut first, &["/ext/B/extension.json"]).unwrap();
    assert_eq!(first.attribute("TrackingCategories").unwrap(), json!(["a"]));

    // Same last batch, different earlier one
    let mut second = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut second, &["/ext/C/extension.json"]).unwrap();
    load(&mut second, &["/ext/B/extension.json"]).unwrap();
    assert_eq!(second.attribute("TrackingCategories").unwrap(), json!(["c"]));

    // Only the single-batch loads of A and C stored lazy entries
    let lazy = cache.keys().into_iter().filter(|key| key.contains(":registration-lazy-attrib:")).count();
    assert_eq!(lazy, 2);
}

#[test]
fn lazy_attributes_reread_manifests_without_a_cache() {
    let fs = two_extensions();
    let mut registry = ExtensionRegistry::new(fs.clone(), RegistryConfig::default());
    load(&mut registry, &["/ext/A/extension.json", "/ext/B/extension.json"]).unwrap();
    assert_eq!(fs.reads(), 2);

    assert_eq!(registry.attribute("TrackingCategories").unwrap(), json!(["a-category"]));
    assert_eq!(fs.reads(), 4);
    // Memoized
    assert_eq!(registry.attribute("TrackingCategories").unwrap(), json!(["a-category"]));
    assert_eq!(fs.reads(), 4);
}

#[test]
fn array_plus_2d_keeps_first_loaded_leaves() {
    let perms = |value: Value| json!({"value": value, "merge_strategy": "array_plus_2d"});
    let fs = Arc::new(memory_fs(&[
        (
            "/ext/A/extension.json",
            ManifestBuilder::new("A")
                .config_entry("Perms", perms(json!({"user": {"read": true, "edit": false}})))
                .build(),
        ),
        (
            "/ext/B/extension.json",
            ManifestBuilder::new("B")
                .config_entry(
                    "Perms",
                    perms(json!({"user": {"edit": true, "move": true}, "sysop": {"block": true}})),
                )
                .build(),
        ),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/A/extension.json"]).unwrap();
    load(&mut registry, &["/ext/B/extension.json"]).unwrap();

    assert_eq!(
        registry.settings().get("wgPerms"),
        Some(&json!({
            "user": {"read": true, "edit": false, "move": true},
            "sysop": {"block": true}
        }))
    );
}

#[test]
fn provide_default_ignores_load_order() {
    let fs = Arc::new(memory_fs(&[
        (
            "/ext/A/extension.json",
            ManifestBuilder::new("A")
                .config_entry("Mode", json!({"value": "a", "merge_strategy": "provide_default"}))
                .build(),
        ),
        (
            "/ext/B/extension.json",
            ManifestBuilder::new("B")
                .config_entry("Mode", json!({"value": "b", "merge_strategy": "provide_default"}))
                .build(),
        ),
    ]));
    let cache = Arc::new(MemoryCache::new());

    for order in [["/ext/A/extension.json", "/ext/B/extension.json"], ["/ext/B/extension.json", "/ext/A/extension.json"]] {
        let mut registry = new_registry(&fs, &cache, RegistryConfig::default())
            .with_settings(Settings::from_iter([("wgMode", json!("host"))]));
        for path in order {
            load(&mut registry, &[path]).unwrap();
        }
        assert_eq!(registry.settings().get("wgMode"), Some(&json!("host")));
    }

    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/B/extension.json"]).unwrap();
    load(&mut registry, &["/ext/A/extension.json"]).unwrap();
    assert_eq!(registry.settings().get("wgMode"), Some(&json!("b")));
}

#[test]
fn same_name_twice_is_fatal() {
    let same = ManifestBuilder::new("Foo").build();
    let fs = Arc::new(memory_fs(&[
        ("/ext/Foo/extension.json", same.clone()),
        ("/ext/FooCopy/extension.json", same),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let expected =
        "It was attempted to load Foo twice, from /ext/Foo/extension.json and /ext/FooCopy/extension.json.";

    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    let err = load(&mut registry, &["/ext/Foo/extension.json", "/ext/FooCopy/extension.json"]).unwrap_err();
    assert_eq!(err.to_string(), expected);

    // Across batches too
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/Foo/extension.json"]).unwrap();
    let err = load(&mut registry, &["/ext/FooCopy/extension.json"]).unwrap_err();
    assert_eq!(err.to_string(), expected);
}

#[test]
fn class_map_resolves_against_manifest_dir() {
    let fs = Arc::new(
        memory_fs(&[(
            "/ext/extension.json",
            ManifestBuilder::new("Foo")
                .set("AutoloadClasses", json!({"Foo\\Bar": "src/Bar.php"}))
                .set("AutoloadNamespaces", json!({"Foo\\Ns\\": "src/Ns/"}))
                .build(),
        )])
        .with_file("/ext/src/Ns/Deep/Thing.php", "<?php"),
    );
    let cache = Arc::new(MemoryCache::new());
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/extension.json"]).unwrap();

    let autoloader = registry.autoloader();
    let expected = NormalizedPath::from("/ext/src/Bar.php");
    assert_eq!(autoloader.find("Foo\\Bar"), Some(expected.clone()));
    assert_eq!(autoloader.find("Foo\\Bar"), Some(expected));
    assert_eq!(
        autoloader.find("Foo\\Ns\\Deep\\Thing").map(|p| p.to_string()),
        Some("/ext/src/Ns/Deep/Thing.php".to_string())
    );
    assert_eq!(autoloader.find("Foo\\Ns\\Missing"), None);
}

#[test]
fn old_host_fails_naming_the_unit() {
    let fs = Arc::new(memory_fs(&[(
        "/ext/Foo/extension.json",
        ManifestBuilder::new("Foo")
            .requires("MediaWiki", json!(">=1.30"))
            .config("Enabled", json!(true))
            .build(),
    )]));
    let cache = Arc::new(MemoryCache::new());
    let config = RegistryConfig {
        host_version: "1.25".to_string(),
        ..RegistryConfig::default()
    };
    let mut registry = new_registry(&fs, &cache, config);
    let err = load(&mut registry, &["/ext/Foo/extension.json"]).unwrap_err();

    let Error::Incompatible { violations } = &err else {
        panic!("expected an incompatibility, got {err:?}");
    };
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].unit(), "Foo");
    insta::assert_snapshot!(
        err.to_string(),
        @"Foo is not compatible with the current MediaWiki core (version 1.25), it requires: >=1.30."
    );
    assert!(registry.all_things().is_empty());
    assert!(registry.settings().is_empty());
    assert!(cache.is_empty());
}

#[test]
fn every_violation_is_reported() {
    let fs = Arc::new(memory_fs(&[
        (
            "/ext/A/extension.json",
            ManifestBuilder::new("A")
                .requires("extensions", json!({"Missing": "*"}))
                .build(),
        ),
        (
            "/ext/B/extension.json",
            ManifestBuilder::new("B")
                .requires("platform", json!({"ability-shell": true, "ext-intl": "*"}))
                .requires("extensions", json!({"A": ">= 1.0"}))
                .build(),
        ),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let config = RegistryConfig {
        abilities: [("shell".to_string(), false)].into(),
        ability_errors: [("shell".to_string(), "shell is disabled".to_string())].into(),
        ..RegistryConfig::default()
    };
    let mut registry = new_registry(&fs, &cache, config);
    let err = load(&mut registry, &["/ext/A/extension.json", "/ext/B/extension.json"]).unwrap_err();
    assert_eq!(
        err.to_string().lines().collect::<Vec<_>>(),
        vec![
            "A requires Missing to be installed.",
            "B requires intl PHP extension to be installed.",
            "B requires \"shell\" ability: shell is disabled",
            "A does not expose its version, but B requires: >= 1.0.",
        ]
    );
}

#[test]
fn dependencies_resolve_within_and_across_batches() {
    let fs = Arc::new(memory_fs(&[
        ("/ext/Base/extension.json", ManifestBuilder::new("Base").version("2.1.0").build()),
        (
            "/ext/Mid/extension.json",
            ManifestBuilder::new("Mid")
                .version("1.0.0")
                .requires("extensions", json!({"Base": "^2.0"}))
                .build(),
        ),
        (
            "/ext/Top/extension.json",
            ManifestBuilder::new("Top")
                .requires("extensions", json!({"Mid": ">= 1.0", "Base": ">= 2.1"}))
                .build(),
        ),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/Base/extension.json", "/ext/Mid/extension.json"]).unwrap();
    load(&mut registry, &["/ext/Top/extension.json"]).unwrap();
    assert!(registry.is_loaded("Top", "*").unwrap());
    assert!(registry.is_loaded("Base", "^2.0").unwrap());
}

#[test]
fn dev_requires_only_count_when_checked() {
    let fs = Arc::new(memory_fs(&[(
        "/ext/Foo/extension.json",
        ManifestBuilder::new("Foo")
            .set("dev-requires", json!({"extensions": {"TestHelper": "*"}}))
            .build(),
    )]));
    let cache = Arc::new(MemoryCache::new());

    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/Foo/extension.json"]).unwrap();

    let config = RegistryConfig {
        check_dev: true,
        ..RegistryConfig::default()
    };
    let mut registry = new_registry(&fs, &cache, config);
    let err = load(&mut registry, &["/ext/Foo/extension.json"]).unwrap_err();
    assert_eq!(err.to_string(), "Foo requires TestHelper to be installed.");
}

#[test]
fn late_registration_fails_without_touching_settings() {
    let fs = two_extensions();
    let cache = Arc::new(MemoryCache::new());
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/A/extension.json"]).unwrap();
    let config = registry.finish();
    let before = registry.settings().clone();

    let err = registry.queue("/ext/B/extension.json").unwrap_err();
    assert!(matches!(err, Error::LateRegistration { .. }));

    let err = registry.load_from_queue().unwrap_err();
    assert_eq!(
        err.to_string(),
        "The following paths tried to load late: /ext/B/extension.json"
    );
    assert_eq!(registry.settings(), &before);
    assert!(!registry.is_loaded("B", "*").unwrap());
    assert_eq!(config.get("wgFoo"), Some(&json!(1)));
    assert_eq!(registry.finish().len(), config.len());
}

#[test]
fn prefixes_keep_same_named_settings_apart() {
    let fs = Arc::new(memory_fs(&[
        (
            "/ext/A/extension.json",
            ManifestBuilder::new("A").config("Foo", json!(1)).build(),
        ),
        (
            "/ext/B/extension.json",
            ManifestBuilder::new("B")
                .manifest_version(1)
                .set("config_prefix", json!("bar"))
                .set("config", json!({"Foo": 2}))
                .build(),
        ),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/A/extension.json", "/ext/B/extension.json"]).unwrap();

    let config = registry.finish();
    assert_eq!(config.get("wgFoo"), Some(&json!(1)));
    assert_eq!(config.get("barFoo"), Some(&json!(2)));
}

#[test]
fn hooks_reach_settings_and_attributes() {
    let fs = Arc::new(memory_fs(&[
        (
            "/ext/A/extension.json",
            ManifestBuilder::new("A")
                .set("HookHandlers", json!({"main": {"class": "A\\Hooks"}}))
                .set("Hooks", json!({"PageSaved": "main", "Legacy": "aLegacy"}))
                .build(),
        ),
        (
            "/ext/B/extension.json",
            ManifestBuilder::new("B").set("Hooks", json!({"Legacy": "bLegacy"})).build(),
        ),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default())
        .with_settings(Settings::from_iter([("wgHooks", json!({"Legacy": ["core"]}))]));
    load(&mut registry, &["/ext/A/extension.json"]).unwrap();
    load(&mut registry, &["/ext/B/extension.json"]).unwrap();

    assert_eq!(
        registry.settings().get("wgHooks"),
        Some(&json!({"Legacy": ["core", "aLegacy", "bLegacy"]}))
    );
    assert_eq!(
        registry.attribute("Hooks").unwrap(),
        json!({"PageSaved": [{
            "handler": {"name": "A-main", "class": "A\\Hooks"},
            "extensionPath": "/ext/A/extension.json"
        }]})
    );
}

#[test]
fn namespace_constants_are_defined() {
    let fs = Arc::new(memory_fs(&[(
        "/ext/Foo/extension.json",
        ManifestBuilder::new("Foo")
            .set(
                "namespaces",
                json!([{"id": 3000, "constant": "NS_FOO", "name": "Foo", "content": true}]),
            )
            .build(),
    )]));
    let cache = Arc::new(MemoryCache::new());
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());
    load(&mut registry, &["/ext/Foo/extension.json"]).unwrap();

    assert_eq!(registry.constants().get("NS_FOO"), Some(&3000));
    assert_eq!(registry.settings().get("wgContentNamespaces"), Some(&json!([3000])));
    assert_eq!(registry.attribute("ExtensionNamespaces").unwrap(), json!({"3000": "Foo"}));
}

#[test]
fn namespace_constant_with_two_ids_in_one_batch_is_fatal() {
    let namespace = |id: i64| json!([{"id": id, "constant": "NS_FOO", "name": "Foo"}]);
    let fs = Arc::new(memory_fs(&[
        ("/ext/A/extension.json", ManifestBuilder::new("A").set("namespaces", namespace(3000)).build()),
        ("/ext/B/extension.json", ManifestBuilder::new("B").set("namespaces", namespace(3001)).build()),
    ]));
    let cache = Arc::new(MemoryCache::new());
    let mut registry = new_registry(&fs, &cache, RegistryConfig::default());

    let err = load(&mut registry, &["/ext/A/extension.json", "/ext/B/extension.json"]).unwrap_err();
    assert!(matches!(
        err,
        Error::ConstantRedefined { ref name, existing: 3000, new: 3001 } if name == "NS_FOO"
    ));
    assert!(registry.constants().get("NS_FOO").is_none());
    assert!(registry.all_things().is_empty());
}

#[test]
fn unreadable_manifests_are_fatal() {
    let fs = Arc::new(
        MemoryFs::new()
            .with_file("/ext/Bad/extension.json", "{ not json")
            .with_file("/ext/List/extension.json", "[1, 2]")
            .with_file("/ext/Future/extension.json", r#"{"name": "Future", "manifest_version": 3}"#),
    );
    let cache = Arc::new(MemoryCache::new());

    for path in ["/ext/Bad/extension.json", "/ext/List/extension.json"] {
        let err = load(&mut new_registry(&fs, &cache, RegistryConfig::default()), &[path]).unwrap_err();
        assert!(matches!(err, Error::InvalidManifest { .. }), "{path}: {err:?}");
    }
    let err = load(
        &mut new_registry(&fs, &cache, RegistryConfig::default()),
        &["/ext/Future/extension.json"],
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnsupportedManifestVersion { .. }));
}
