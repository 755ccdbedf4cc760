//! Live watcher: profile edits on disk reach the registry and its subscribers.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use settle_core::{ChangeEvent, KeyDefinition, MemoryBackend, Registry, Tier, Value};
use settle_store::{
    open_registry_at, ManagedProfileFile, ManagedProfileWatcher, ProfileFormat, StoreConfig,
};

const NS: &str = "com.example.support";

fn defs() -> Vec<KeyDefinition> {
    vec![
        KeyDefinition::int("UptimeDaysLimit", 0),
        KeyDefinition::string("Title", "Support"),
    ]
}

fn wait_for(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    check()
}

fn watching(profile: &Path) -> StoreConfig {
    StoreConfig {
        namespace: NS.to_string(),
        managed_profile: Some(profile.to_path_buf()),
        watch_managed: true,
        ..StoreConfig::default()
    }
}

fn managed_limit(reg: &Registry) -> Option<i64> {
    let effective = reg.get("UptimeDaysLimit").ok()?;
    (effective.tier == Tier::Managed).then(|| effective.value.as_int()).flatten()
}

#[test]
fn profile_edits_are_applied_and_observed() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let home = assert_fs::TempDir::new().expect("tempdir");
    let profile = home.path().join("managed").join("overrides.json");
    fs::create_dir_all(profile.parent().unwrap()).expect("mkdir");
    let config = watching(&profile);

    let boot = open_registry_at(home.path(), &config, defs()).expect("bootstrap");
    assert!(boot.watcher.is_some());
    let reg = Arc::clone(&boot.registry);

    let events = Arc::new(Mutex::new(Vec::<ChangeEvent>::new()));
    let sink = Arc::clone(&events);
    let _sub = reg
        .subscribe("UptimeDaysLimit", move |e: &ChangeEvent| sink.lock().unwrap().push(e.clone()))
        .expect("subscribe");

    fs::write(&profile, r#"{ "UptimeDaysLimit": 7 }"#).expect("write profile");
    assert!(
        wait_for(Duration::from_secs(10), || managed_limit(&reg) == Some(7)),
        "watcher never applied the profile"
    );

    fs::remove_file(&profile).expect("remove profile");
    assert!(
        wait_for(Duration::from_secs(10), || {
            matches!(reg.get("UptimeDaysLimit"), Ok(e) if e.tier == Tier::Default)
        }),
        "removing the profile must clear the override"
    );

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| e.new.value == Value::Int(7)));
    let last = events.last().expect("at least one notification");
    assert_eq!(last.new.value, Value::Int(0));
    assert_eq!(last.new.tier, Tier::Default);
}

#[test]
fn existing_profile_is_applied_when_watching() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let profile = home.path().join("overrides.json");
    fs::write(&profile, r#"{ "UptimeDaysLimit": 4 }"#).expect("write profile");

    let boot = open_registry_at(home.path(), &watching(&profile), defs()).expect("bootstrap");
    assert!(boot.watcher.is_some());
    assert_eq!(managed_limit(&boot.registry), Some(4));
}

#[test]
fn watcher_starts_before_the_profile_directory_exists() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let home = assert_fs::TempDir::new().expect("tempdir");
    let managed_dir = home.path().join("mdm").join("Managed Preferences");
    let profile = managed_dir.join("overrides.json");

    let boot = open_registry_at(home.path(), &watching(&profile), defs())
        .expect("bootstrap without the managed directory");
    assert!(boot.watcher.is_some());
    assert!(!boot.registry.is_managed("UptimeDaysLimit").unwrap());

    fs::create_dir_all(&managed_dir).expect("enroll: create directory");
    let staged = home.path().join("staged.json");
    fs::write(&staged, r#"{ "UptimeDaysLimit": 9 }"#).expect("stage profile");
    fs::rename(&staged, &profile).expect("install profile");

    assert!(
        wait_for(Duration::from_secs(10), || managed_limit(&boot.registry) == Some(9)),
        "override never applied after the directory appeared"
    );
}

#[test]
fn start_accepts_missing_directory() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let reg = Arc::new(Registry::new(Arc::new(MemoryBackend::new()), NS));
    reg.register(defs()).expect("register");

    let source = ManagedProfileFile::new(
        home.path().join("Managed Preferences").join("ns.plist"),
        ProfileFormat::Plist,
    );
    let watcher = ManagedProfileWatcher::start(reg, source).expect("start");
    assert!(watcher.profile().ends_with("Managed Preferences/ns.plist"));
}
