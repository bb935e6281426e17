use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use proptest::prelude::*;
use semver::Version;

use crate::{
    percentage, ActionKind, ActionPhase, ActionQueue, PackageId, PackageMatch, PackageRecord,
    ProgressReporter, Repository, RepositoryHandle, ResolutionFailure, TransactionError,
};

struct FixtureRepository {
    id: String,
    records: Vec<PackageRecord>,
}

impl Repository for FixtureRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn package_names(&self) -> Result<Vec<String>> {
        Ok(self.records.iter().map(|r| r.name.clone()).collect())
    }

    fn package_versions(&self, name: &str) -> Result<Vec<PackageRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect())
    }

    fn license_text(&self, _license: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

fn record(raw: &str) -> PackageRecord {
    PackageRecord::from_toml_str(raw).expect("record must parse")
}

fn fixture(id: &str, records: Vec<PackageRecord>) -> RepositoryHandle {
    Arc::new(FixtureRepository {
        id: id.to_string(),
        records,
    })
}

#[test]
fn parses_record_with_dependencies_and_artifact() {
    let parsed = record(
        r#"
name = "editor"
version = "2.1.0"
description = "text editor"
license = "GPL-2 EULA-X"
homepage = "https://example.test/editor"
[dependencies]
libfoo = "^1.2"
[artifact]
url = "https://example.test/editor-2.1.0.tar.zst"
sha256 = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
"#,
    );

    assert_eq!(parsed.version, Version::new(2, 1, 0));
    assert_eq!(parsed.licenses(), vec!["GPL-2", "EULA-X"]);
    assert!(parsed.dependencies.contains_key("libfoo"));
    assert_eq!(
        parsed.signing_payload(),
        b"editor\n2.1.0\ne3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\n"
            .to_vec()
    );
}

#[test]
fn rejects_self_dependency_and_bad_checksum() {
    let self_dep = PackageRecord::from_toml_str(
        r#"
name = "loop"
version = "1.0.0"
[dependencies]
loop = "*"
"#,
    );
    assert!(self_dep.is_err());

    let bad_sha = PackageRecord::from_toml_str(
        r#"
name = "tool"
version = "1.0.0"
[artifact]
url = "file:///tmp/tool.tar"
sha256 = "abc"
"#,
    );
    let err = bad_sha.expect_err("short checksum must be rejected");
    assert!(err.to_string().contains("64 hex characters"), "{err}");
}

#[test]
fn conflicts_are_symmetric() {
    let left = record(
        r#"
name = "left"
version = "1.0.0"
[conflicts]
right = "<2"
"#,
    );
    let right = record("name = \"right\"\nversion = \"1.5.0\"\n");

    assert!(left.conflicts_with(&right));
    assert!(right.conflicts_with(&left));
}

#[test]
fn package_id_round_trips_through_display() {
    let id = PackageId::parse("editor;2.1.0;amd64;main").expect("id must parse");
    assert_eq!(id.name, "editor");
    assert_eq!(id.repository, "main");
    assert_eq!(id.to_string(), "editor;2.1.0;amd64;main");
}

#[test]
fn package_id_requires_four_fields() {
    let err = PackageId::parse("editor;2.1.0;amd64").expect_err("three fields are invalid");
    assert!(err.to_string().contains("does not contain 4 fields"));
    assert!(!PackageId::looks_like_id("editor"));
}

#[test]
fn package_match_identity_uses_repository_id() {
    let editor = record("name = \"editor\"\nversion = \"1.0.0\"\n");
    let main = fixture("main", vec![editor.clone()]);
    let mirror = fixture("mirror", vec![editor.clone()]);

    let a = PackageMatch::from_record(&editor, main.clone());
    let b = PackageMatch::from_record(&editor, main);
    let c = PackageMatch::from_record(&editor, mirror);

    assert_eq!(a, b);
    assert_ne!(a, c);
    let set = [a.clone(), b, c].into_iter().collect::<HashSet<_>>();
    assert_eq!(set.len(), 2);
    assert_eq!(a.to_string(), "editor-1.0.0@main");
    assert_eq!(a.record().expect("record must load"), editor);
}

#[test]
fn missing_record_reports_package() {
    let main = fixture("main", Vec::new());
    let ghost = PackageMatch::new("ghost", Version::new(1, 0, 0), main);
    let err = ghost.record().expect_err("record must be missing");
    assert!(err.to_string().contains("ghost-1.0.0@main"));
}

#[test]
fn added_entries_excludes_targets() {
    let a = record("name = \"a\"\nversion = \"1.0.0\"\n");
    let b = record("name = \"b\"\nversion = \"1.0.0\"\n");
    let repo = fixture("installed", vec![a.clone(), b.clone()]);
    let target = PackageMatch::from_record(&a, repo.clone());
    let dependent = PackageMatch::from_record(&b, repo);

    let queue = ActionQueue::new(ActionKind::Remove, vec![dependent.clone(), target.clone()]);
    assert_eq!(queue.added_entries(&[target]), vec![&dependent]);
}

#[test]
fn percentage_is_floored_and_capped() {
    assert_eq!(percentage(1, 3), 33);
    assert_eq!(percentage(3, 3), 100);
    assert_eq!(percentage(7, 3), 100);
    assert_eq!(percentage(0, 0), 100);
}

#[test]
fn reporter_spans_both_phases_without_reset() {
    let mut progress = ProgressReporter::new(4);
    assert_eq!(progress.start(), Some(0));
    assert_eq!(progress.advance(), Some(25));
    assert_eq!(progress.advance(), Some(50));
    assert_eq!(progress.advance(), Some(75));
    assert_eq!(progress.advance(), Some(100));
    assert_eq!(progress.finish(), None);
    assert_eq!(progress.done(), 4);
}

#[test]
fn reporter_deduplicates_repeated_values() {
    let mut progress = ProgressReporter::new(300);
    assert_eq!(progress.start(), Some(0));
    assert_eq!(progress.advance(), None);
    assert_eq!(progress.advance(), None);
    assert_eq!(progress.advance(), Some(1));
    assert_eq!(progress.finish(), Some(100));
}

#[test]
fn error_messages_name_offenders() {
    let err = TransactionError::NotRemovable {
        vital: vec!["A".to_string(), "B".to_string()],
    };
    assert_eq!(
        err.to_string(),
        "could not perform remove operation, these packages are vital: A, B"
    );

    let err = TransactionError::ActionFailed {
        phase: ActionPhase::Fetch,
        package: "editor;1.0.0;amd64;main".to_string(),
        detail: "exit code 1".to_string(),
    };
    assert_eq!(err.exit_status(), "package-download-failed");
    assert!(err.to_string().starts_with("cannot download package: editor"));

    let err: TransactionError = ResolutionFailure::DependenciesNotFound {
        missing: vec!["libfoo ^1".to_string()],
    }
    .into();
    assert_eq!(err.exit_status(), "dep-resolution-failed");
    assert!(err.to_string().contains("libfoo ^1"));
}

proptest! {
    #[test]
    fn percentage_never_exceeds_hundred(done in 0u64..10_000, total in 0u64..10_000) {
        prop_assert!(percentage(done, total) <= 100);
    }

    #[test]
    fn reported_values_strictly_increase(total in 1u64..500) {
        let mut progress = ProgressReporter::new(total);
        let mut reported = progress.start().into_iter().collect::<Vec<_>>();
        for _ in 0..total {
            reported.extend(progress.advance());
        }
        reported.extend(progress.finish());
        prop_assert!(reported.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert_eq!(reported.last().copied(), Some(100));
    }
}
