//! End-to-end bootstrap on a real filesystem
//!
//! Exercises the whole flow against a temporary installation: queue the
//! manifests on disk -> load (process, check, cache) -> export -> finish.

use std::sync::Arc;

use ext_fs::{DiskFs, NormalizedPath};
use ext_registry::{ExtensionRegistry, FileCache, RegistryConfig};
use ext_test_utils::{ManifestBuilder, TestInstall};
use pretty_assertions::assert_eq;
use serde_json::json;

/// An installation with a feature-rich extension, a dependent and a skin.
fn setup_install() -> TestInstall {
    let install = TestInstall::new();
    install.add_extension(
        "Foo",
        &ManifestBuilder::new("Foo")
            .version("2.1.0")
            .set("author", json!("Ann"))
            .set("AutoloadClasses", json!({"Foo\\Hooks": "includes/Hooks.php"}))
            .set("AutoloadNamespaces", json!({"Foo\\": "src/"}))
            .set("HookHandlers", json!({"main": {"class": "Foo\\Hooks"}}))
            .set("Hooks", json!({"BeforePageDisplay": "main", "LegacyHook": "fooLegacy"}))
            .set("MessagesDirs", json!({"Foo": ["i18n"]}))
            .set("TrackingCategories", json!(["foo-tracking-category"]))
            .set(
                "namespaces",
                json!([{"id": 3000, "constant": "NS_FOO", "name": "Foo", "subpages": true}]),
            )
            .config("FooEnabled", json!(true))
            .config_entry("FooDir", json!({"value": "data", "path": true}))
            .build(),
    );
    install.write_file("extensions/Foo/includes/Hooks.php", "<?php");
    install.write_file("extensions/Foo/src/Widget.php", "<?php");
    install.add_extension(
        "Bar",
        &ManifestBuilder::new("Bar")
            .version("0.3.0")
            .requires("MediaWiki", json!(">= 1.40"))
            .requires("extensions", json!({"Foo": ">= 2.0"}))
            .set("TrackingCategories", json!(["bar-tracking-category"]))
            .set("attributes", json!({"Foo": {"Widgets": ["BarWidget"]}}))
            .build(),
    );
    install.add_skin(
        "Vector",
        &ManifestBuilder::new("Vector").set("type", json!("skin")).build(),
    );
    install
}

fn queue_all(registry: &mut ExtensionRegistry, install: &TestInstall) {
    let root = install.normalized_root();
    for path in [
        "extensions/Foo/extension.json",
        "extensions/Bar/extension.json",
        "skins/Vector/skin.json",
    ] {
        registry.queue(root.join(path)).unwrap();
    }
}

#[test]
fn test_bootstrap_from_disk() {
    let install = setup_install();
    let root = install.normalized_root();
    let mut registry = ExtensionRegistry::new(Arc::new(DiskFs::new()), RegistryConfig::default());

    queue_all(&mut registry, &install);
    registry.load_from_queue().unwrap();

    // Credits in queue order
    let names: Vec<&String> = registry.all_things().keys().collect();
    assert_eq!(names, vec!["Foo", "Bar", "Vector"]);
    assert_eq!(registry.all_things()["Vector"].kind, "skin");
    assert!(registry.is_loaded("Foo", ">= 2.0").unwrap());
    assert!(!registry.is_loaded("Foo", "^3").unwrap());

    // Constants and autoload
    assert_eq!(registry.constants().get("NS_FOO"), Some(&3000));
    assert_eq!(
        registry.autoloader().find("Foo\\Hooks"),
        Some(root.join("extensions/Foo/includes/Hooks.php"))
    );
    assert_eq!(
        registry.autoloader().find("Foo\\Widget"),
        Some(root.join("extensions/Foo/src/Widget.php"))
    );
    assert_eq!(registry.autoloader().find("Foo\\Missing"), None);

    // Attributes, including a lazy one and a cross-unit one
    assert_eq!(
        registry.attribute("TrackingCategories").unwrap(),
        json!(["foo-tracking-category", "bar-tracking-category"])
    );
    assert_eq!(registry.attribute("FooWidgets").unwrap(), json!(["BarWidget"]));
    assert_eq!(registry.attribute("NoSuchAttribute").unwrap(), json!([]));
    let hooks = registry.attribute("Hooks").unwrap();
    assert_eq!(
        hooks["BeforePageDisplay"][0]["handler"]["name"],
        json!("Foo-main")
    );

    let config = registry.finish();
    assert_eq!(config.get("wgFooEnabled"), Some(&json!(true)));
    assert_eq!(
        config.get("wgFooDir"),
        Some(&json!(root.join("extensions/Foo/data").as_str()))
    );
    assert_eq!(
        config.get("wgMessagesDirs"),
        Some(&json!({"Foo": [root.join("extensions/Foo/i18n").as_str()]}))
    );
    assert_eq!(config.get("wgHooks"), Some(&json!({"LegacyHook": ["fooLegacy"]})));
    assert_eq!(config.get("wgNamespacesWithSubpages"), Some(&json!({"3000": true})));
}

#[test]
fn test_file_cache_survives_restart() {
    let install = setup_install();
    let cache_dir = NormalizedPath::new(install.root().join("cache"));
    let config = RegistryConfig {
        cache_dir: Some(cache_dir.clone()),
        ..RegistryConfig::default()
    };

    let bootstrap = || {
        let mut registry = ExtensionRegistry::new(Arc::new(DiskFs::new()), config.clone())
            .with_cache(Arc::new(FileCache::new(cache_dir.clone())));
        queue_all(&mut registry, &install);
        registry.load_from_queue().unwrap();
        registry
    };

    let mut first = bootstrap();
    let first_config = first.finish();
    assert!(std::fs::read_dir(cache_dir.to_native()).unwrap().count() >= 1);

    // A corrupted manifest is not read again while its mtime is unchanged
    let manifest = install.root().join("extensions/Foo/extension.json");
    let modified = std::fs::metadata(&manifest).unwrap().modified().unwrap();
    std::fs::write(&manifest, "{ corrupt").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&manifest)
        .unwrap()
        .set_modified(modified)
        .unwrap();

    let mut second = bootstrap();
    assert_eq!(second.finish().get("wgFooEnabled"), first_config.get("wgFooEnabled"));
    assert_eq!(
        second.attribute("TrackingCategories").unwrap(),
        json!(["foo-tracking-category", "bar-tracking-category"])
    );
}

#[test]
fn test_registry_config_file_drives_checks() {
    let install = setup_install();
    let config_path = NormalizedPath::new(install.write_file(
        "extreg.toml",
        "host_version = \"1.39.0\"\n",
    ));
    let config = RegistryConfig::load(&config_path).unwrap();

    let mut registry = ExtensionRegistry::new(Arc::new(DiskFs::new()), config);
    queue_all(&mut registry, &install);
    let err = registry.load_from_queue().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Bar is not compatible with the current MediaWiki core (version 1.39.0), it requires: >= 1.40."
    );
    assert!(registry.all_things().is_empty());
}
