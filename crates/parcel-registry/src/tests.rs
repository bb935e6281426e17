use std::fs;
use std::path::Path;
use std::sync::Arc;

use parcel_core::{
    InstallSource, InstalledRepository, PackageId, PackageRecord, RefreshStatus, Repository,
    INSTALLED_REPOSITORY_ID,
};
use semver::Version;

use crate::{
    FsInstalledRepository, FsRepository, MemoryInstalledRepository, MemoryRepository,
    RepositoryConfig, RepositoryRegistry,
};

fn record(name: &str, version: &str) -> PackageRecord {
    PackageRecord::from_toml_str(&format!("name = \"{name}\"\nversion = \"{version}\"\n"))
        .expect("record must parse")
}

fn write_source_record(source: &Path, name: &str, version: &str, extra: &str) {
    let dir = source.join("index").join(name);
    fs::create_dir_all(&dir).expect("must create index dir");
    fs::write(
        dir.join(format!("{version}.toml")),
        format!("name = \"{name}\"\nversion = \"{version}\"\n{extra}"),
    )
    .expect("must write record");
}

fn config(name: &str, location: &Path) -> RepositoryConfig {
    RepositoryConfig {
        name: name.to_string(),
        location: location.display().to_string(),
        enabled: true,
        priority: 0,
        public_key: None,
    }
}

#[test]
fn fs_repository_refresh_reports_updated_then_up_to_date() {
    let source = tempfile::tempdir().expect("must create source dir");
    let state = tempfile::tempdir().expect("must create state dir");
    write_source_record(source.path(), "zlib", "1.3.0", "");

    let repository = FsRepository::new(config("core", source.path()), state.path());
    assert_eq!(
        repository.refresh(false).expect("first refresh must succeed"),
        RefreshStatus::Updated
    );
    assert_eq!(
        repository.refresh(false).expect("second refresh must succeed"),
        RefreshStatus::UpToDate
    );
    assert_eq!(
        repository.refresh(true).expect("forced refresh must succeed"),
        RefreshStatus::Updated
    );
    assert!(repository
        .snapshot_id()
        .expect("snapshot id must be recorded")
        .starts_with("fs:"));
}

#[test]
fn fs_repository_serves_refreshed_records_newest_first() {
    let source = tempfile::tempdir().expect("must create source dir");
    let state = tempfile::tempdir().expect("must create state dir");
    write_source_record(source.path(), "zlib", "1.2.0", "");
    write_source_record(source.path(), "zlib", "1.3.0", "license = \"Zlib\"\n");
    fs::create_dir_all(source.path().join("licenses")).expect("must create licenses dir");
    fs::write(source.path().join("licenses/Zlib.txt"), "zlib terms").expect("must write");

    let repository = FsRepository::new(config("core", source.path()), state.path());
    assert!(repository
        .package_names()
        .expect("must list before refresh")
        .is_empty());
    repository.refresh(false).expect("refresh must succeed");

    let versions = repository
        .package_versions("zlib")
        .expect("must read versions");
    let listed = versions
        .iter()
        .map(|record| record.version.to_string())
        .collect::<Vec<_>>();
    assert_eq!(listed, vec!["1.3.0", "1.2.0"]);
    assert_eq!(
        repository
            .license_text("Zlib")
            .expect("must read license")
            .as_deref(),
        Some("zlib terms")
    );
    assert_eq!(repository.license_text("GPL-2").expect("must read"), None);
}

#[test]
fn fs_repository_picks_up_source_changes() {
    let source = tempfile::tempdir().expect("must create source dir");
    let state = tempfile::tempdir().expect("must create state dir");
    write_source_record(source.path(), "zlib", "1.3.0", "");

    let repository = FsRepository::new(config("core", source.path()), state.path());
    repository.refresh(false).expect("refresh must succeed");
    write_source_record(source.path(), "curl", "8.0.0", "");
    assert_eq!(
        repository.refresh(false).expect("refresh must succeed"),
        RefreshStatus::Updated
    );
    assert_eq!(
        repository.package_names().expect("must list"),
        vec!["curl".to_string(), "zlib".to_string()]
    );
}

#[test]
fn fs_repository_refresh_fails_for_missing_source() {
    let state = tempfile::tempdir().expect("must create state dir");
    let missing = state.path().join("does-not-exist");
    let repository = FsRepository::new(config("core", &missing), state.path());
    let err = repository.refresh(false).expect_err("missing source must fail");
    assert!(err.to_string().contains("failed to refresh repository 'core'"));
}

#[test]
fn fs_repository_rejects_record_in_wrong_directory() {
    let source = tempfile::tempdir().expect("must create source dir");
    let state = tempfile::tempdir().expect("must create state dir");
    let dir = source.path().join("index/zlib");
    fs::create_dir_all(&dir).expect("must create dir");
    fs::write(dir.join("1.0.0.toml"), "name = \"curl\"\nversion = \"1.0.0\"\n")
        .expect("must write");

    let repository = FsRepository::new(config("core", source.path()), state.path());
    repository.refresh(false).expect("refresh must succeed");
    assert!(repository.package_versions("zlib").is_err());
}

#[test]
fn fs_repository_rejects_names_escaping_the_snapshot() {
    let source = tempfile::tempdir().expect("must create source dir");
    let state = tempfile::tempdir().expect("must create state dir");
    write_source_record(source.path(), "zlib", "1.3.0", "");
    fs::write(state.path().join("secret.txt"), "outside").expect("must write");

    let repository = FsRepository::new(config("core", source.path()), state.path());
    repository.refresh(false).expect("refresh must succeed");

    repository
        .package_versions("../../zlib")
        .expect_err("parent components must be rejected");
    repository
        .package_versions("nested/zlib")
        .expect_err("separators must be rejected");
    repository
        .license_text("../../../secret")
        .expect_err("license ids must not leave the snapshot");
    assert_eq!(
        repository
            .license_text("Missing")
            .expect("plain license ids are looked up"),
        None
    );
}

#[test]
fn fs_installed_repository_rejects_names_escaping_the_root() {
    let state = tempfile::tempdir().expect("must create state dir");
    let installed = FsInstalledRepository::new(state.path().join("installed"));

    installed
        .record_install(&record("../escape", "1.0.0"), InstallSource::User)
        .expect_err("receipt names must stay inside the registry");
    assert!(!state.path().join("escape.receipt").exists());
    installed
        .package_versions("..\\escape")
        .expect_err("separators must be rejected");
    installed
        .record_removal("../escape")
        .expect_err("removal must reject escaping names");
}

#[test]
fn fs_installed_repository_round_trips_receipts() {
    let root = tempfile::tempdir().expect("must create root");
    let installed = FsInstalledRepository::new(root.path().join("installed"));
    assert!(installed.package_names().expect("must list").is_empty());

    let mut editor = record("editor", "2.0.0");
    editor
        .dependencies
        .insert("zlib".to_string(), "^1.2".parse().expect("req"));
    installed
        .record_install(&editor, InstallSource::AutomaticDependency)
        .expect("must record install");

    assert_eq!(installed.id(), INSTALLED_REPOSITORY_ID);
    assert!(installed.is_installed());
    assert_eq!(
        installed.package_names().expect("must list"),
        vec!["editor".to_string()]
    );
    let stored = installed
        .record("editor", &Version::new(2, 0, 0))
        .expect("must read")
        .expect("record must exist");
    assert_eq!(stored.dependencies, editor.dependencies);
    assert_eq!(
        installed.install_source("editor").expect("must read"),
        Some(InstallSource::AutomaticDependency)
    );

    assert!(installed.record_removal("editor").expect("must remove"));
    assert!(!installed.record_removal("editor").expect("second removal"));
    assert!(installed.package_names().expect("must list").is_empty());
}

#[test]
fn fs_installed_repository_persists_accepted_licenses() {
    let root = tempfile::tempdir().expect("must create root");
    let installed = FsInstalledRepository::new(root.path());
    installed.accept_license("EULA-X").expect("must accept");
    installed.accept_license("EULA-X").expect("repeat must be a no-op");
    installed.accept_license("EULA-Y").expect("must accept");

    let reopened = FsInstalledRepository::new(root.path());
    let accepted = reopened.accepted_licenses().expect("must read");
    assert_eq!(
        accepted.into_iter().collect::<Vec<_>>(),
        vec!["EULA-X".to_string(), "EULA-Y".to_string()]
    );
}

#[test]
fn registry_resolves_ids_names_and_installed_entries() {
    let installed = Arc::new(MemoryInstalledRepository::new().with_record(record("zlib", "1.2.0")));
    let registry = RepositoryRegistry::new(installed)
        .with_repository(Arc::new(
            MemoryRepository::new("main")
                .with_record(record("zlib", "1.3.0"))
                .with_record(record("zlib", "1.2.5")),
        ))
        .with_repository(Arc::new(
            MemoryRepository::new("extra").with_record(record("zlib", "9.0.0")),
        ));

    let latest = registry
        .resolve_identifier("zlib", false)
        .expect("must resolve")
        .expect("zlib must be available");
    assert_eq!(latest.repository_id(), "main");
    assert_eq!(latest.version(), &Version::new(1, 3, 0));

    let local = registry
        .resolve_identifier("zlib", true)
        .expect("must resolve")
        .expect("zlib must be installed");
    assert!(local.repository().is_installed());

    let by_id = registry
        .resolve_id(&PackageId::parse("zlib;9.0.0;amd64;extra").expect("id must parse"))
        .expect("must resolve")
        .expect("id must match");
    assert_eq!(by_id.repository_id(), "extra");

    assert!(registry
        .resolve_identifier("zlib;4.0.0;amd64;main", false)
        .expect("must resolve")
        .is_none());
    assert!(registry
        .resolve_identifier("zlib;1.3.0;amd64;unknown", false)
        .expect("must resolve")
        .is_none());
    assert!(registry.resolve_identifier("zlib;1.3.0", false).is_err());
}

#[test]
fn registry_opens_repositories_by_id() {
    let registry = RepositoryRegistry::new(Arc::new(MemoryInstalledRepository::new()))
        .with_repository(Arc::new(MemoryRepository::new("main")));
    assert!(registry
        .open(INSTALLED_REPOSITORY_ID)
        .expect("installed must open")
        .is_installed());
    assert_eq!(registry.open("main").expect("main must open").id(), "main");
    assert!(registry.open("missing").is_none());
}

#[test]
fn registry_search_covers_installed_and_available() {
    let registry = RepositoryRegistry::new(Arc::new(
        MemoryInstalledRepository::new().with_record(record("libfoo", "1.0.0")),
    ))
    .with_repository(Arc::new(
        MemoryRepository::new("main")
            .with_record(record("libfoo", "1.1.0"))
            .with_record(record("bar", "1.0.0")),
    ));
    let found = registry.search("foo").expect("must search");
    let ids = found
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["libfoo-1.0.0@installed", "libfoo-1.1.0@main"]);
}

#[test]
fn open_fs_orders_by_priority_and_skips_disabled() {
    let state = tempfile::tempdir().expect("must create state dir");
    let mut low = config("low", state.path());
    low.priority = 10;
    let high = config("high", state.path());
    let mut off = config("off", state.path());
    off.enabled = false;

    let registry =
        RepositoryRegistry::open_fs(state.path(), &[low, high, off]).expect("must open");
    let ids = registry
        .available()
        .iter()
        .map(|repository| repository.id().to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["high", "low"]);
}

#[test]
fn open_fs_rejects_reserved_and_duplicate_names() {
    let state = tempfile::tempdir().expect("must create state dir");
    assert!(
        RepositoryRegistry::open_fs(state.path(), &[config("installed", state.path())]).is_err()
    );
    assert!(RepositoryRegistry::open_fs(
        state.path(),
        &[config("main", state.path()), config("main", state.path())]
    )
    .is_err());
}
