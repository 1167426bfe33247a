//! Registration scenarios against on-disk installations
//!
//! Each module covers one phase of bootstrap: dependency checking,
//! settings merges, callbacks and the finish barrier.

use std::sync::Arc;

use ext_fs::DiskFs;
use ext_registry::{Error, ExtensionRegistry, RegistryConfig, Settings};
use ext_test_utils::{ManifestBuilder, TestInstall};
use serde_json::{Value, json};

// =============================================================================
// Helpers
// =============================================================================

fn registry(config: RegistryConfig) -> ExtensionRegistry {
    ExtensionRegistry::new(Arc::new(DiskFs::new()), config)
}

/// Write each `(name, manifest)` as an extension and queue them in order.
fn load(
    registry: &mut ExtensionRegistry,
    install: &TestInstall,
    units: &[(&str, Value)],
) -> ext_registry::Result<()> {
    for (name, manifest) in units {
        registry.queue(install.add_extension(name, manifest))?;
    }
    registry.load_from_queue()
}

// =============================================================================
// S1: Dependencies
// =============================================================================

mod s1_dependencies {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("1.43.0", ">= 1.30", true)]
    #[case("1.25.0", ">= 1.30", false)]
    #[case("1.43.0", "1.43.x", true)]
    #[case("1.43.0", ">= 1.39, < 1.42", false)]
    fn s1_1_core_constraint(#[case] host: &str, #[case] constraint: &str, #[case] ok: bool) {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig {
            host_version: host.to_string(),
            ..RegistryConfig::default()
        });
        let result = load(
            &mut registry,
            &install,
            &[(
                "Foo",
                ManifestBuilder::new("Foo").requires("MediaWiki", json!(constraint)).build(),
            )],
        );
        assert_eq!(result.is_ok(), ok, "{result:?}");
    }

    #[test]
    fn s1_2_dependency_in_earlier_batch() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig::default());
        load(
            &mut registry,
            &install,
            &[("Foo", ManifestBuilder::new("Foo").version("1.5.0").build())],
        )
        .unwrap();
        load(
            &mut registry,
            &install,
            &[(
                "Bar",
                ManifestBuilder::new("Bar")
                    .requires("extensions", json!({"Foo": "^1.2"}))
                    .build(),
            )],
        )
        .unwrap();
        assert_eq!(registry.all_things().len(), 2);
    }

    #[test]
    fn s1_3_every_violation_is_reported() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig {
            runtime_version: Some("8.1.0".to_string()),
            abilities: [("shell".to_string(), false)].into(),
            ability_errors: [("shell".to_string(), "Shell is disabled".to_string())].into(),
            ..RegistryConfig::default()
        });
        let err = load(
            &mut registry,
            &install,
            &[(
                "Foo",
                ManifestBuilder::new("Foo")
                    .requires("skins", json!({"Vector": "*"}))
                    .requires("platform", json!({"php": ">= 8.2", "ability-shell": true}))
                    .build(),
            )],
        )
        .unwrap_err();

        let Error::Incompatible { violations } = &err else {
            panic!("expected an incompatibility, got {err:?}");
        };
        assert_eq!(violations.len(), 3);
        let message = err.to_string();
        assert!(message.contains("Foo requires Vector to be installed."));
        assert!(message.contains("Foo requires \"shell\" ability: Shell is disabled"));
        assert_eq!(message.lines().count(), 3);
    }

    #[test]
    fn s1_4_dev_requirements_only_when_checked() {
        let manifest = ManifestBuilder::new("Foo")
            .set("dev-requires", json!({"extensions": {"DevTool": "*"}}))
            .build();

        let install = TestInstall::new();
        let mut lenient = registry(RegistryConfig::default());
        load(&mut lenient, &install, &[("Foo", manifest.clone())]).unwrap();

        let install = TestInstall::new();
        let mut strict = registry(RegistryConfig {
            check_dev: true,
            ..RegistryConfig::default()
        });
        let err = load(&mut strict, &install, &[("Foo", manifest)]).unwrap_err();
        assert_eq!(err.to_string(), "Foo requires DevTool to be installed.");
    }
}

// =============================================================================
// S2: Settings
// =============================================================================

mod s2_settings {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn s2_1_provide_default_keeps_host_value() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig::default())
            .with_settings(Settings::from_iter([("wgFooMode", json!("host"))]));
        load(
            &mut registry,
            &install,
            &[(
                "Foo",
                ManifestBuilder::new("Foo")
                    .config_entry("FooMode", json!({"value": "ext", "merge_strategy": "provide_default"}))
                    .config_entry("FooLimit", json!({"value": 10, "merge_strategy": "provide_default"}))
                    .build(),
            )],
        )
        .unwrap();
        let config = registry.finish();
        assert_eq!(config.get("wgFooMode"), Some(&json!("host")));
        assert_eq!(config.get("wgFooLimit"), Some(&json!(10)));
    }

    #[test]
    fn s2_2_array_merge_puts_extension_values_first() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig::default())
            .with_settings(Settings::from_iter([("wgFooList", json!(["host"]))]));
        load(
            &mut registry,
            &install,
            &[("Foo", ManifestBuilder::new("Foo").config("FooList", json!(["ext"])).build())],
        )
        .unwrap();
        assert_eq!(registry.settings().get("wgFooList"), Some(&json!(["ext", "host"])));
    }

    #[test]
    fn s2_3_group_permissions_merge_per_group() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig::default()).with_settings(Settings::from_iter([(
            "wgGroupPermissions",
            json!({"user": {"edit": true}}),
        )]));
        load(
            &mut registry,
            &install,
            &[
                (
                    "Foo",
                    ManifestBuilder::new("Foo")
                        .set("GroupPermissions", json!({"user": {"foo": true}, "sysop": {"bar": true}}))
                        .build(),
                ),
                (
                    "Bar",
                    ManifestBuilder::new("Bar")
                        .set("GroupPermissions", json!({"user": {"baz": true}}))
                        .build(),
                ),
            ],
        )
        .unwrap();
        assert_eq!(
            registry.settings().get("wgGroupPermissions"),
            Some(&json!({"user": {"edit": true, "foo": true, "baz": true}, "sysop": {"bar": true}}))
        );
    }
}

// =============================================================================
// S3: Callbacks
// =============================================================================

mod s3_callbacks {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn s3_1_callback_runs_after_export() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig::default());
        registry.register_callback("Foo::onRegistration", |credit, settings| {
            let enabled = settings.get("wgFooEnabled").cloned().unwrap_or(Value::Null);
            settings.set("wgFooSeen", json!({"by": credit.name, "enabled": enabled}));
            Ok(())
        });
        load(
            &mut registry,
            &install,
            &[(
                "Foo",
                ManifestBuilder::new("Foo")
                    .set("callback", json!("Foo::onRegistration"))
                    .config("FooEnabled", json!(true))
                    .build(),
            )],
        )
        .unwrap();
        assert_eq!(
            registry.settings().get("wgFooSeen"),
            Some(&json!({"by": "Foo", "enabled": true}))
        );
    }

    #[test]
    fn s3_2_unknown_callback_exports_nothing() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig::default());
        let err = load(
            &mut registry,
            &install,
            &[(
                "Foo",
                ManifestBuilder::new("Foo")
                    .set("callback", json!("Foo::missing"))
                    .config("FooEnabled", json!(true))
                    .build(),
            )],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "callback 'Foo::missing' is not callable");
        assert!(registry.settings().get("wgFooEnabled").is_none());
        assert!(registry.all_things().is_empty());
    }
}

// =============================================================================
// S4: Finish barrier
// =============================================================================

mod s4_finish {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn s4_1_late_registration_names_paths() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig::default());
        load(
            &mut registry,
            &install,
            &[("Foo", ManifestBuilder::new("Foo").config("Foo", json!(1)).build())],
        )
        .unwrap();
        let config = registry.finish();

        let late = install.add_extension("Late", &ManifestBuilder::new("Late").config("Foo", json!(2)).build());
        let err = registry.queue(late.clone()).unwrap_err();
        assert!(err.to_string().contains(late.as_str()));

        let err = registry.load_from_queue().unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("The following paths tried to load late: {late}")
        );
        assert_eq!(registry.settings().get("wgFoo"), Some(&json!(1)));
        assert_eq!(config.get("wgFoo"), Some(&json!(1)));
        assert!(!registry.all_things().contains_key("Late"));
    }

    #[test]
    fn s4_2_finish_returns_the_same_config() {
        let install = TestInstall::new();
        let mut registry = registry(RegistryConfig::default());
        load(
            &mut registry,
            &install,
            &[("Foo", ManifestBuilder::new("Foo").config("Foo", json!(1)).build())],
        )
        .unwrap();
        let first = registry.finish();
        let second = registry.finish();
        assert!(registry.is_finished());
        assert_eq!(first.len(), second.len());
        assert_eq!(second.get("wgFoo"), Some(&json!(1)));
    }
}
