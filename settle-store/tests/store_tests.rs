//! End-to-end tests over real files: local store durability, managed
//! profiles in both formats, and bootstrap behavior.

use std::fs;
use std::path::Path;

use assert_fs::prelude::*;
use predicates::prelude::*;

use settle_core::catalog::{self, keys, CatalogFlavor};
use settle_core::{ManagedOverrideSource, PersistentBackend, RawValue, Tier, Value};
use settle_store::{
    open_registry_at, ManagedProfileFile, ProfileFormat, StoreConfig, StoreError, YamlFileBackend,
};

const NS: &str = "com.example.support";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_with_profile(profile: &Path) -> StoreConfig {
    StoreConfig {
        namespace: NS.to_string(),
        managed_profile: Some(profile.to_path_buf()),
        ..StoreConfig::default()
    }
}

fn plist_profile(entries: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
{entries}
</dict>
</plist>
"#
    )
}

// ---------------------------------------------------------------------------
// 1. Local store
// ---------------------------------------------------------------------------

#[test]
fn local_writes_survive_restart() {
    init_tracing();
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = config_with_profile(&home.path().join("absent.plist"));

    {
        let boot = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::Direct))
            .expect("bootstrap");
        boot.registry.set_value(keys::TITLE, "Contoso Help".to_string()).expect("set");
        boot.registry.set("HasSeenWelcomeScreen", true).expect("set");
        boot.registry.shutdown().expect("shutdown");
    }

    home.child(".settle/prefs/com.example.support.yaml")
        .assert(predicate::str::contains("com.example.support.Title: Contoso Help"))
        .assert(predicate::str::contains("com.example.support.HasSeenWelcomeScreen: true"));

    let boot = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::Direct))
        .expect("reopen");
    let title = boot.registry.get("Title").unwrap();
    assert_eq!(title.value, Value::from("Contoso Help"));
    assert_eq!(title.tier, Tier::Local);
    assert!(boot.registry.value(keys::HAS_SEEN_WELCOME_SCREEN).unwrap());
}

#[test]
fn reset_removes_entry_from_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let config = config_with_profile(&home.path().join("absent.plist"));
    let boot = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::Direct))
        .expect("bootstrap");

    boot.registry.set("UptimeDaysLimit", 5).expect("set");
    boot.registry.reset_to_default("UptimeDaysLimit").expect("reset");

    let on_disk = fs::read_to_string(home.child(".settle/prefs/com.example.support.yaml").path())
        .expect("store written");
    assert!(!on_disk.contains("UptimeDaysLimit"), "got: {on_disk}");
    assert_eq!(boot.registry.get("UptimeDaysLimit").unwrap().tier, Tier::Default);
}

#[test]
fn corrupt_local_store_fails_bootstrap_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".settle/prefs/com.example.support.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");
    let config = config_with_profile(&home.path().join("absent.plist"));

    let err = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::Direct))
        .unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("com.example.support.yaml"), "got: {err}");
}

#[test]
fn mistyped_stored_value_reads_as_default() {
    init_tracing();
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".settle/prefs/com.example.support.yaml")
        .write_str("com.example.support.UptimeDaysLimit: seven\nsomeone.else.Key: 1\n")
        .expect("write");
    let config = config_with_profile(&home.path().join("absent.plist"));

    let boot = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::Direct))
        .expect("bootstrap");
    let limit = boot.registry.get("UptimeDaysLimit").unwrap();
    assert_eq!(limit.value, Value::Int(0));
    assert_eq!(limit.tier, Tier::Default);
}

#[test]
fn backend_keeps_foreign_entries_on_rewrite() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child("prefs.yaml");
    file.write_str("other.app.Key: kept\n").expect("write");

    let backend = YamlFileBackend::open_path(file.path()).expect("open");
    backend.store("mine.Key", &Value::Int(1)).expect("store");

    file.assert(predicate::str::contains("other.app.Key: kept"))
        .assert(predicate::str::contains("mine.Key: 1"));
    assert_eq!(backend.load("other.app.Key").unwrap(), Some(RawValue::from("kept")));
}

// ---------------------------------------------------------------------------
// 2. Managed profiles
// ---------------------------------------------------------------------------

#[test]
fn plist_profile_overrides_and_blocks_local_writes() {
    init_tracing();
    let home = assert_fs::TempDir::new().expect("tempdir");
    let profile = home.child("com.example.support.plist");
    profile
        .write_str(&plist_profile(
            "<key>UptimeDaysLimit</key><integer>7</integer>\n<key>Title</key><string>Managed Help</string>",
        ))
        .expect("write");
    let config = config_with_profile(profile.path());

    let boot = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::Direct))
        .expect("bootstrap");
    let reg = &boot.registry;

    assert_eq!(reg.value(keys::UPTIME_DAYS_LIMIT).unwrap(), 7);
    assert!(reg.is_managed("Title").unwrap());
    assert!(reg.managed_refreshed_at().is_some());

    reg.set("UptimeDaysLimit", 30).expect("set on managed key is accepted");
    assert_eq!(reg.value(keys::UPTIME_DAYS_LIMIT).unwrap(), 7);
    assert!(
        !home.child(".settle/prefs/com.example.support.yaml").path().exists(),
        "managed writes must not reach the local store"
    );
}

#[test]
fn json_profile_with_mistyped_entry_falls_through() {
    init_tracing();
    let home = assert_fs::TempDir::new().expect("tempdir");
    let profile = home.child("overrides.json");
    profile
        .write_str(r#"{ "HideQuit": "yes", "ErrorMessage": "Call 555-0100", "Unknown": 1 }"#)
        .expect("write");
    let config = config_with_profile(profile.path());

    let boot = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::AppStore))
        .expect("bootstrap");
    let reg = &boot.registry;

    let hide_quit = reg.get("HideQuit").unwrap();
    assert_eq!(hide_quit.value, Value::Bool(false));
    assert_eq!(hide_quit.tier, Tier::Default);
    assert_eq!(reg.get("ErrorMessage").unwrap().tier, Tier::Managed);
}

#[test]
fn unreadable_profile_at_startup_means_nothing_managed() {
    init_tracing();
    let home = assert_fs::TempDir::new().expect("tempdir");
    let profile = home.child("com.example.support.plist");
    profile.write_str("this is not a property list").expect("write");
    let config = config_with_profile(profile.path());

    let boot = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::Direct))
        .expect("bootstrap tolerates a broken profile");
    assert!(!boot.registry.is_managed("Title").unwrap());
    assert!(boot.watcher.is_none());
}

#[test]
fn profile_reader_errors() {
    let home = assert_fs::TempDir::new().expect("tempdir");

    let list = home.child("list.json");
    list.write_str("[1, 2, 3]").expect("write");
    let err = ManagedProfileFile::detect(list.path()).read().unwrap_err();
    assert!(matches!(err, StoreError::NotADictionary { .. }), "got: {err}");

    let broken = home.child("broken.json");
    broken.write_str("{ not json").expect("write");
    let err = ManagedProfileFile::detect(broken.path()).snapshot().unwrap_err();
    assert!(err.to_string().contains("broken.json"), "got: {err}");
}

#[test]
fn plist_array_root_is_not_a_dictionary() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let profile = home.child("array.plist");
    profile
        .write_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><array><string>x</string></array></plist>
"#,
        )
        .expect("write");
    let err = ManagedProfileFile::new(profile.path(), ProfileFormat::Plist)
        .read()
        .unwrap_err();
    assert!(matches!(err, StoreError::NotADictionary { .. }), "got: {err}");
}

#[test]
fn missing_profile_is_empty_snapshot() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let snapshot = ManagedProfileFile::detect(home.path().join("nothing.plist"))
        .read()
        .expect("read");
    assert!(snapshot.is_empty());
}

// ---------------------------------------------------------------------------
// 3. Config
// ---------------------------------------------------------------------------

#[test]
fn config_file_drives_store_location() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let custom = home.path().join("elsewhere").join("prefs.yaml");
    home.child(".settle/config.yaml")
        .write_str(&format!(
            "namespace: {NS}\nlocal_store: {}\nmanaged_profile: {}\n",
            custom.display(),
            home.path().join("absent.plist").display()
        ))
        .expect("write");

    let config = StoreConfig::load_at(home.path()).expect("config");
    let boot = open_registry_at(home.path(), &config, catalog::definitions(CatalogFlavor::Direct))
        .expect("bootstrap");
    boot.registry.set("FooterText", "hello").expect("set");

    let on_disk = fs::read_to_string(&custom).expect("custom store written");
    assert!(on_disk.contains("com.example.support.FooterText: hello"), "got: {on_disk}");
}
