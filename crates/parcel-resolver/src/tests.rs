use std::collections::BTreeSet;
use std::sync::Arc;

use parcel_core::{ActionKind, PackageMatch, PackageRecord, TransactionError};
use parcel_registry::{MemoryInstalledRepository, MemoryRepository, RepositoryRegistry};
use semver::VersionReq;

use super::*;

fn record(raw: &str) -> PackageRecord {
    PackageRecord::from_toml_str(raw).expect("record must parse")
}

fn simple(name: &str, version: &str) -> PackageRecord {
    record(&format!("name = \"{name}\"\nversion = \"{version}\"\n"))
}

fn with_deps(name: &str, version: &str, deps: &[(&str, &str)]) -> PackageRecord {
    let mut parsed = simple(name, version);
    for (dep, req) in deps {
        parsed.dependencies.insert(
            dep.to_string(),
            VersionReq::parse(req).expect("req must parse"),
        );
    }
    parsed
}

fn names(queue: &parcel_core::ActionQueue) -> Vec<String> {
    queue.iter().map(|entry| entry.to_string()).collect()
}

fn target(registry: &RepositoryRegistry, name: &str, installed: bool) -> PackageMatch {
    registry
        .resolve_identifier(name, installed)
        .expect("lookup must succeed")
        .expect("package must exist")
}

fn chain_registry() -> Arc<RepositoryRegistry> {
    let main = MemoryRepository::new("main")
        .with_record(with_deps("app", "1.0.0", &[("lib", "^1")]))
        .with_record(with_deps("lib", "1.2.0", &[("zlib", "^2")]))
        .with_record(simple("lib", "1.1.0"))
        .with_record(simple("zlib", "2.1.0"))
        .with_record(simple("zlib", "3.0.0"));
    Arc::new(
        RepositoryRegistry::new(Arc::new(MemoryInstalledRepository::new()))
            .with_repository(Arc::new(main)),
    )
}

#[test]
fn selects_latest_matching_version() {
    let candidates = vec![simple("tool", "1.2.0"), simple("tool", "1.3.0"), simple("tool", "2.0.0")];
    let req = VersionReq::parse("^1.0").expect("req should parse");
    let resolved = select_highest_compatible(&candidates, &req).expect("must resolve");
    assert_eq!(resolved.version.to_string(), "1.3.0");
}

#[test]
fn install_queue_lists_dependencies_first() {
    let registry = chain_registry();
    let resolver = GraphResolver::new(registry.clone());
    let app = target(&registry, "app", false);

    let queue = resolver
        .resolve_install(&[app], true)
        .expect("resolution must succeed");
    assert_eq!(queue.kind(), ActionKind::Install);
    assert_eq!(
        names(&queue),
        vec!["zlib-2.1.0@main", "lib-1.2.0@main", "app-1.0.0@main"]
    );
}

#[test]
fn non_recursive_install_expands_direct_dependencies_only() {
    let registry = chain_registry();
    let resolver = GraphResolver::new(registry.clone());
    let app = target(&registry, "app", false);

    let queue = resolver
        .resolve_install(&[app], false)
        .expect("resolution must succeed");
    assert_eq!(names(&queue), vec!["lib-1.2.0@main", "app-1.0.0@main"]);
}

#[test]
fn install_skips_dependencies_already_satisfied() {
    let main = MemoryRepository::new("main")
        .with_record(with_deps("app", "1.0.0", &[("lib", "^1")]))
        .with_record(simple("lib", "1.2.0"));
    let registry = Arc::new(
        RepositoryRegistry::new(Arc::new(
            MemoryInstalledRepository::new().with_record(simple("lib", "1.0.0")),
        ))
        .with_repository(Arc::new(main)),
    );
    let resolver = GraphResolver::new(registry.clone());

    let queue = resolver
        .resolve_install(&[target(&registry, "app", false)], true)
        .expect("resolution must succeed");
    assert_eq!(names(&queue), vec!["app-1.0.0@main"]);
}

#[test]
fn missing_dependency_is_reported_by_name() {
    let main = MemoryRepository::new("main")
        .with_record(with_deps("app", "1.0.0", &[("ghost", "^1")]));
    let registry = Arc::new(
        RepositoryRegistry::new(Arc::new(MemoryInstalledRepository::new()))
            .with_repository(Arc::new(main)),
    );
    let resolver = GraphResolver::new(registry.clone());

    let err = resolver
        .resolve_install(&[target(&registry, "app", false)], true)
        .expect_err("ghost must be missing");
    match err {
        ResolveError::DependenciesNotFound(missing) => {
            assert_eq!(
                missing.into_iter().collect::<Vec<_>>(),
                vec!["ghost ^1".to_string()]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn conflicting_packages_are_a_collision() {
    let mut editor = with_deps("editor", "1.0.0", &[("vim-core", "^1")]);
    editor
        .conflicts
        .insert("nano".to_string(), VersionReq::parse("*").expect("req"));
    let main = MemoryRepository::new("main")
        .with_record(editor)
        .with_record(simple("vim-core", "1.0.0"));
    let registry = Arc::new(
        RepositoryRegistry::new(Arc::new(
            MemoryInstalledRepository::new().with_record(simple("nano", "7.0.0")),
        ))
        .with_repository(Arc::new(main)),
    );
    let resolver = GraphResolver::new(registry.clone());

    let err = resolver
        .resolve_install(&[target(&registry, "editor", false)], true)
        .expect_err("nano conflict must fail");
    match err {
        ResolveError::DependenciesCollision(packages) => {
            assert_eq!(packages, vec!["editor".to_string(), "nano".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unsatisfiable_shared_dependency_is_a_collision() {
    let main = MemoryRepository::new("main")
        .with_record(with_deps("a", "1.0.0", &[("zlib", "^1")]))
        .with_record(with_deps("b", "1.0.0", &[("zlib", "^2")]))
        .with_record(simple("zlib", "1.5.0"))
        .with_record(simple("zlib", "2.5.0"));
    let registry = Arc::new(
        RepositoryRegistry::new(Arc::new(MemoryInstalledRepository::new()))
            .with_repository(Arc::new(main)),
    );
    let resolver = GraphResolver::new(registry.clone());

    let err = resolver
        .resolve_install(
            &[target(&registry, "a", false), target(&registry, "b", false)],
            true,
        )
        .expect_err("zlib cannot satisfy both");
    assert!(matches!(err, ResolveError::DependenciesCollision(ref packages) if packages == &["zlib".to_string()]));
}

#[test]
fn dependency_cycle_is_a_collision() {
    let main = MemoryRepository::new("main")
        .with_record(with_deps("a", "1.0.0", &[("b", "^1")]))
        .with_record(with_deps("b", "1.0.0", &[("a", "^1")]));
    let registry = Arc::new(
        RepositoryRegistry::new(Arc::new(MemoryInstalledRepository::new()))
            .with_repository(Arc::new(main)),
    );
    let resolver = GraphResolver::new(registry.clone());

    let err = resolver
        .resolve_install(&[target(&registry, "a", false)], true)
        .expect_err("cycle must fail");
    assert!(matches!(err, ResolveError::DependenciesCollision(ref packages) if packages.len() == 2));
}

fn installed_chain() -> Arc<RepositoryRegistry> {
    let installed = MemoryInstalledRepository::new()
        .with_record(simple("zlib", "2.1.0"))
        .with_record(with_deps("lib", "1.2.0", &[("zlib", "^2")]))
        .with_record(with_deps("app", "1.0.0", &[("lib", "^1")]))
        .with_record(simple("other", "1.0.0"));
    Arc::new(RepositoryRegistry::new(Arc::new(installed)))
}

#[test]
fn removal_queue_lists_dependents_first() {
    let registry = installed_chain();
    let resolver = GraphResolver::new(registry.clone());

    let queue = resolver
        .resolve_removal(&[target(&registry, "zlib", true)])
        .expect("removal must resolve");
    assert_eq!(queue.kind(), ActionKind::Remove);
    assert_eq!(
        names(&queue),
        vec![
            "app-1.0.0@installed",
            "lib-1.2.0@installed",
            "zlib-2.1.0@installed"
        ]
    );
}

#[test]
fn removal_of_vital_dependents_is_refused() {
    let registry = installed_chain();
    let resolver = GraphResolver::new(registry.clone()).with_vital(["app", "lib", "glibc"]);

    let err = resolver
        .resolve_removal(&[target(&registry, "zlib", true)])
        .expect_err("vital packages must block removal");
    let expected = ["app", "lib"]
        .into_iter()
        .map(ToString::to_string)
        .collect::<BTreeSet<_>>();
    assert!(matches!(err, ResolveError::DependenciesNotRemovable(ref vital) if vital == &expected));

    let terminal = TransactionError::from(err);
    assert_eq!(
        terminal.to_string(),
        "could not perform remove operation, these packages are vital: app, lib"
    );
}

#[test]
fn reverse_queries_exclude_targets() {
    let registry = installed_chain();
    let resolver = GraphResolver::new(registry.clone());
    let zlib = target(&registry, "zlib", true);

    let direct = resolver
        .resolve_reverse(std::slice::from_ref(&zlib), false)
        .expect("reverse must resolve");
    assert_eq!(names(&direct), vec!["lib-1.2.0@installed"]);

    let deep = resolver
        .resolve_reverse(&[zlib], true)
        .expect("reverse must resolve");
    assert_eq!(
        names(&deep),
        vec!["app-1.0.0@installed", "lib-1.2.0@installed"]
    );
}

#[test]
fn resolve_errors_map_to_terminal_errors() {
    let missing = TransactionError::from(ResolveError::DependenciesNotFound(
        ["ghost ^1".to_string()].into_iter().collect(),
    ));
    assert_eq!(missing.exit_status(), "dep-resolution-failed");
    assert!(missing.to_string().contains("ghost ^1"));

    let internal = TransactionError::from(ResolveError::Repository(anyhow::anyhow!("disk gone")));
    assert_eq!(internal.exit_status(), "internal-error");
}
