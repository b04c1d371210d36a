//! End-to-end merge scenarios against repositories built by the real git
//! binary. Where a byte-exact result matters, the same merge is performed by
//! git in a copy of the repository and the trees are compared.

use std::path::Path;
use std::process::Command;

use bstr::{BString, ByteSlice};
use mgit_hash::ObjectId;
use mgit_merge::{merge, MergeOptions};
use mgit_repo::Repository;
use mgit_utils::date::{GitDate, Signature};

const TEST_DATE: &str = "1262356920 +0000";

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Mr. Test")
        .env("GIT_AUTHOR_EMAIL", "mrtest@example.com")
        .env("GIT_COMMITTER_NAME", "Mr. Test")
        .env("GIT_COMMITTER_EMAIL", "mrtest@example.com")
        .env("GIT_AUTHOR_DATE", TEST_DATE)
        .env("GIT_COMMITTER_DATE", TEST_DATE)
        .output()
        .expect("failed to run git");
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("git {:?} failed: {}", args, stderr);
    }
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn author() -> Signature {
    Signature {
        name: BString::from("Mr. Test"),
        email: BString::from("mrtest@example.com"),
        date: GitDate::new(1262356920, 0),
    }
}

fn resolve(dir: &Path, rev: &str) -> String {
    git(dir, &["rev-parse", rev])
}

/// Recursively copy a repository so git can perform the reference merge in
/// the copy without disturbing the original.
fn copy_repo(src: &Path, dst: &Path) {
    std::fs::create_dir_all(dst).unwrap();
    for entry in std::fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let meta = std::fs::symlink_metadata(&from).unwrap();
        if meta.is_dir() {
            copy_repo(&from, &to);
        } else {
            std::fs::copy(&from, &to).unwrap();
        }
    }
}

/// Linear history on master: base -> newer -> newest, with `oldest`
/// pointing at the first commit and `newest` at the last.
fn linear_repo(dir: &Path) {
    git(dir, &["init", "-q", "-b", "master"]);
    git(dir, &["config", "user.name", "Mr. Test"]);
    git(dir, &["config", "user.email", "mrtest@example.com"]);

    std::fs::write(dir.join("f.txt"), "one\n").unwrap();
    git(dir, &["add", "f.txt"]);
    git(dir, &["commit", "-q", "-m", "first"]);
    git(dir, &["branch", "oldest"]);

    std::fs::write(dir.join("f.txt"), "one\ntwo\n").unwrap();
    git(dir, &["add", "f.txt"]);
    git(dir, &["commit", "-q", "-m", "second"]);

    git(dir, &["branch", "newest"]);
    std::fs::write(dir.join("f.txt"), "one\ntwo\nthree\n").unwrap();
    git(dir, &["add", "f.txt"]);
    git(dir, &["commit", "-q", "-m", "third"]);
    // newest is ahead of master: move master back one commit.
    git(dir, &["branch", "-f", "newest", "HEAD"]);
    git(dir, &["reset", "-q", "--hard", "HEAD~1"]);
}

/// Divergent history: master deletes the first half of a ten-line file,
/// `delete-second-half` deletes the other half.
fn divergent_repo(dir: &Path) {
    git(dir, &["init", "-q", "-b", "master"]);
    git(dir, &["config", "user.name", "Mr. Test"]);
    git(dir, &["config", "user.email", "mrtest@example.com"]);

    let lines: Vec<String> = (1..=10).map(|i| format!("line {i}\n")).collect();
    std::fs::write(dir.join("mergeme.txt"), lines.concat()).unwrap();
    git(dir, &["add", "mergeme.txt"]);
    git(dir, &["commit", "-q", "-m", "base"]);

    git(dir, &["checkout", "-q", "-b", "delete-second-half"]);
    std::fs::write(dir.join("mergeme.txt"), lines[..5].concat()).unwrap();
    git(dir, &["add", "mergeme.txt"]);
    git(dir, &["commit", "-q", "-m", "keep first half"]);

    git(dir, &["checkout", "-q", "master"]);
    std::fs::write(dir.join("mergeme.txt"), lines[5..].concat()).unwrap();
    git(dir, &["add", "mergeme.txt"]);
    git(dir, &["commit", "-q", "-m", "keep second half"]);
}

/// Perform the same merge with real git in a copy; returns the reference
/// merge commit's (tree, parents).
fn reference_merge(src: &Path, theirs: &str, message: &str) -> (String, Vec<String>) {
    let clone = tempfile::tempdir().unwrap();
    copy_repo(src, clone.path());
    git(
        clone.path(),
        &["-c", "commit.gpgsign=false", "merge", "-q", theirs, "-m", message],
    );
    let tree = resolve(clone.path(), "HEAD^{tree}");
    let parents = vec![
        resolve(clone.path(), "HEAD^1"),
        resolve(clone.path(), "HEAD^2"),
    ];
    (tree, parents)
}

#[test]
fn self_merge_is_already_merged() {
    let dir = tempfile::tempdir().unwrap();
    linear_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let head_before = resolve(dir.path(), "master");
    let report = merge(
        &repo,
        Some("master"),
        "master",
        &MergeOptions {
            fast_forward_only: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert!(report.already_merged);
    assert_eq!(report.oid.unwrap().to_hex(), head_before);
    assert_eq!(resolve(dir.path(), "master"), head_before);
}

#[test]
fn merging_ancestor_is_already_merged() {
    let dir = tempfile::tempdir().unwrap();
    linear_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let head_before = resolve(dir.path(), "master");
    let report = merge(
        &repo,
        Some("master"),
        "oldest",
        &MergeOptions {
            fast_forward_only: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert!(report.already_merged);
    assert_eq!(report.oid.unwrap().to_hex(), head_before);
    assert_eq!(resolve(dir.path(), "master"), head_before);
}

#[test]
fn merging_descendant_fast_forwards() {
    let dir = tempfile::tempdir().unwrap();
    linear_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let newest = resolve(dir.path(), "newest");
    let report = merge(
        &repo,
        Some("master"),
        "newest",
        &MergeOptions {
            fast_forward_only: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert!(report.fast_forward);
    assert!(!report.already_merged);
    assert_eq!(report.oid.unwrap().to_hex(), newest);
    assert_eq!(resolve(dir.path(), "master"), newest);

    // The working tree was materialized too.
    assert_eq!(
        std::fs::read(dir.path().join("f.txt")).unwrap(),
        b"one\ntwo\nthree\n"
    );
}

#[test]
fn fast_forward_dry_run_moves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    linear_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let before = resolve(dir.path(), "master");
    let newest = resolve(dir.path(), "newest");

    let report = merge(
        &repo,
        Some("master"),
        "newest",
        &MergeOptions {
            fast_forward_only: true,
            dry_run: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert!(report.fast_forward);
    assert_eq!(report.oid.unwrap().to_hex(), newest);
    assert_eq!(resolve(dir.path(), "master"), before);
}

#[test]
fn non_fast_forward_requires_author() {
    let dir = tempfile::tempdir().unwrap();
    divergent_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let result = merge(
        &repo,
        Some("master"),
        "delete-second-half",
        &MergeOptions {
            dry_run: true,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(mgit_merge::MergeError::MissingAuthor)));
}

#[test]
fn fast_forward_only_rejects_divergence() {
    let dir = tempfile::tempdir().unwrap();
    divergent_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let result = merge(
        &repo,
        Some("master"),
        "delete-second-half",
        &MergeOptions {
            fast_forward_only: true,
            author: Some(author()),
            ..Default::default()
        },
    );
    assert!(matches!(
        result,
        Err(mgit_merge::MergeError::FastForwardImpossible)
    ));
}

#[test]
fn three_way_dry_run_computes_reference_tree() {
    let dir = tempfile::tempdir().unwrap();
    divergent_repo(dir.path());
    let (ref_tree, _) = reference_merge(dir.path(), "delete-second-half", "M");

    let repo = Repository::open(dir.path()).unwrap();
    let before = resolve(dir.path(), "master");

    let report = merge(
        &repo,
        Some("master"),
        "delete-second-half",
        &MergeOptions {
            dry_run: true,
            author: Some(author()),
            ..Default::default()
        },
    )
    .unwrap();

    assert!(report.recursive_merge);
    assert!(report.merge_commit);
    assert!(report.oid.is_none());
    let tree = report.tree.unwrap();
    assert_eq!(tree.to_hex(), ref_tree);

    // The branch did not move and no tree object was persisted.
    assert_eq!(resolve(dir.path(), "master"), before);
    assert!(!repo.odb().contains(&tree));
}

#[test]
fn three_way_no_update_branch_persists_commit_only() {
    let dir = tempfile::tempdir().unwrap();
    divergent_repo(dir.path());
    let (ref_tree, _) = reference_merge(dir.path(), "delete-second-half", "M");

    let repo = Repository::open(dir.path()).unwrap();
    let before = resolve(dir.path(), "master");

    let report = merge(
        &repo,
        Some("master"),
        "delete-second-half",
        &MergeOptions {
            no_update_branch: true,
            author: Some(author()),
            ..Default::default()
        },
    )
    .unwrap();

    let oid = report.oid.unwrap();
    assert!(repo.odb().contains(&oid));
    assert_eq!(resolve(dir.path(), "master"), before);
    assert_eq!(report.tree.unwrap().to_hex(), ref_tree);
}

#[test]
fn three_way_merge_matches_reference_commit() {
    let dir = tempfile::tempdir().unwrap();
    divergent_repo(dir.path());
    let (ref_tree, ref_parents) = reference_merge(dir.path(), "delete-second-half", "M");

    let repo = Repository::open(dir.path()).unwrap();

    let report = merge(
        &repo,
        Some("master"),
        "delete-second-half",
        &MergeOptions {
            message: Some("M".into()),
            author: Some(author()),
            ..Default::default()
        },
    )
    .unwrap();

    assert!(report.merge_commit);
    let oid = report.oid.unwrap();
    assert_eq!(resolve(dir.path(), "master"), oid.to_hex());

    let commit = repo.read_commit(&oid).unwrap();
    assert_eq!(commit.tree.to_hex(), ref_tree);
    assert_eq!(
        commit
            .parents
            .iter()
            .map(|p| p.to_hex())
            .collect::<Vec<_>>(),
        ref_parents
    );
    assert_eq!(commit.message.as_bstr(), "M\n");

    // Both halves deleted leaves the file empty.
    assert_eq!(std::fs::read(dir.path().join("mergeme.txt")).unwrap(), b"");

    // The merge state files are gone.
    assert!(!dir.path().join(".git/MERGE_HEAD").exists());
    assert!(!dir.path().join(".git/MERGE_MSG").exists());

    // git agrees the result is clean.
    assert_eq!(git(dir.path(), &["status", "--porcelain"]), "");
}

#[test]
fn merge_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    divergent_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let first = merge(
        &repo,
        Some("master"),
        "delete-second-half",
        &MergeOptions {
            message: Some("M".into()),
            author: Some(author()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(first.merge_commit);

    let second = merge(
        &repo,
        Some("master"),
        "delete-second-half",
        &MergeOptions {
            author: Some(author()),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(second.already_merged);
    assert_eq!(second.oid, first.oid);
}

#[test]
fn mode_change_and_edit_merge_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q", "-b", "master"]);
    git(dir.path(), &["config", "user.name", "Mr. Test"]);
    git(dir.path(), &["config", "user.email", "mrtest@example.com"]);

    std::fs::write(dir.path().join("tool.sh"), "#!/bin/sh\necho hi\n").unwrap();
    git(dir.path(), &["add", "tool.sh"]);
    git(dir.path(), &["commit", "-q", "-m", "base"]);

    // Theirs edits the content.
    git(dir.path(), &["checkout", "-q", "-b", "edit"]);
    std::fs::write(dir.path().join("tool.sh"), "#!/bin/sh\necho bye\n").unwrap();
    git(dir.path(), &["add", "tool.sh"]);
    git(dir.path(), &["commit", "-q", "-m", "edit"]);

    // Ours flips the executable bit only.
    git(dir.path(), &["checkout", "-q", "master"]);
    git(
        dir.path(),
        &["update-index", "--chmod=+x", "tool.sh"],
    );
    git(dir.path(), &["commit", "-q", "-m", "chmod"]);
    // Keep the worktree in sync with the staged mode so git sees it clean.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            dir.path().join("tool.sh"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();
    }

    let (ref_tree, _) = reference_merge(dir.path(), "edit", "M");

    let repo = Repository::open(dir.path()).unwrap();
    let report = merge(
        &repo,
        Some("master"),
        "edit",
        &MergeOptions {
            message: Some("M".into()),
            author: Some(author()),
            ..Default::default()
        },
    )
    .unwrap();

    assert!(report.merge_commit, "mode+edit merge should be clean");
    assert_eq!(report.tree.unwrap().to_hex(), ref_tree);
}

#[test]
fn disjoint_edits_to_same_file_merge_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q", "-b", "master"]);
    git(dir.path(), &["config", "user.name", "Mr. Test"]);
    git(dir.path(), &["config", "user.email", "mrtest@example.com"]);

    let lines: Vec<String> = (1..=12).map(|i| format!("line {i}\n")).collect();
    std::fs::write(dir.path().join("shared.txt"), lines.concat()).unwrap();
    git(dir.path(), &["add", "shared.txt"]);
    git(dir.path(), &["commit", "-q", "-m", "base"]);

    git(dir.path(), &["checkout", "-q", "-b", "bottom"]);
    let mut theirs = lines.clone();
    theirs[11] = "line 12 (theirs)\n".into();
    std::fs::write(dir.path().join("shared.txt"), theirs.concat()).unwrap();
    git(dir.path(), &["add", "shared.txt"]);
    git(dir.path(), &["commit", "-q", "-m", "edit bottom"]);

    git(dir.path(), &["checkout", "-q", "master"]);
    let mut ours = lines.clone();
    ours[0] = "line 1 (ours)\n".into();
    std::fs::write(dir.path().join("shared.txt"), ours.concat()).unwrap();
    git(dir.path(), &["add", "shared.txt"]);
    git(dir.path(), &["commit", "-q", "-m", "edit top"]);

    let (ref_tree, _) = reference_merge(dir.path(), "bottom", "M");

    let repo = Repository::open(dir.path()).unwrap();
    let report = merge(
        &repo,
        Some("master"),
        "bottom",
        &MergeOptions {
            message: Some("M".into()),
            author: Some(author()),
            ..Default::default()
        },
    )
    .unwrap();

    assert!(report.merge_commit, "disjoint edits should merge cleanly");
    assert_eq!(report.tree.unwrap().to_hex(), ref_tree);

    let mut expected = lines;
    expected[0] = "line 1 (ours)\n".into();
    expected[11] = "line 12 (theirs)\n".into();
    assert_eq!(
        std::fs::read(dir.path().join("shared.txt")).unwrap(),
        expected.concat().as_bytes()
    );
}

#[test]
fn conflicting_edits_record_merge_state() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q", "-b", "master"]);
    git(dir.path(), &["config", "user.name", "Mr. Test"]);
    git(dir.path(), &["config", "user.email", "mrtest@example.com"]);

    std::fs::write(dir.path().join("clash.txt"), "a\nmiddle\nz\n").unwrap();
    git(dir.path(), &["add", "clash.txt"]);
    git(dir.path(), &["commit", "-q", "-m", "base"]);

    git(dir.path(), &["checkout", "-q", "-b", "topic"]);
    std::fs::write(dir.path().join("clash.txt"), "a\ntheir version\nz\n").unwrap();
    git(dir.path(), &["add", "clash.txt"]);
    git(dir.path(), &["commit", "-q", "-m", "theirs"]);

    git(dir.path(), &["checkout", "-q", "master"]);
    std::fs::write(dir.path().join("clash.txt"), "a\nour version\nz\n").unwrap();
    git(dir.path(), &["add", "clash.txt"]);
    git(dir.path(), &["commit", "-q", "-m", "ours"]);

    let master_before = resolve(dir.path(), "master");
    let topic = resolve(dir.path(), "topic");

    let repo = Repository::open(dir.path()).unwrap();
    let report = merge(
        &repo,
        Some("master"),
        "topic",
        &MergeOptions {
            author: Some(author()),
            ..Default::default()
        },
    )
    .unwrap();

    // Conflicts are not errors: the merge completes in merging state.
    assert!(!report.merge_commit);
    assert!(report.recursive_merge);
    assert!(report.oid.is_none());
    assert!(report.tree.is_some());

    // The branch did not move; MERGE_HEAD points at theirs.
    assert_eq!(resolve(dir.path(), "master"), master_before);
    assert_eq!(resolve(dir.path(), "MERGE_HEAD"), topic);
    assert!(dir.path().join(".git/MERGE_MSG").exists());

    // Conflict markers in the working file.
    let merged = std::fs::read_to_string(dir.path().join("clash.txt")).unwrap();
    assert!(merged.contains("<<<<<<< ours"));
    assert!(merged.contains("our version"));
    assert!(merged.contains("======="));
    assert!(merged.contains("their version"));
    assert!(merged.contains(">>>>>>> theirs"));

    // Stage 1/2/3 entries visible to git.
    let unmerged = git(dir.path(), &["ls-files", "-u"]);
    assert_eq!(unmerged.lines().count(), 3);

    // The recorded stages carry base/ours/theirs blob ids.
    let base_blob = git(dir.path(), &["rev-parse", &format!("{master_before}^:clash.txt")]);
    let our_blob = git(dir.path(), &["rev-parse", &format!("{master_before}:clash.txt")]);
    let their_blob = git(dir.path(), &["rev-parse", &format!("{topic}:clash.txt")]);
    let stage_oids: Vec<String> = unmerged
        .lines()
        .map(|l| l.split_whitespace().nth(1).unwrap().to_string())
        .collect();
    assert_eq!(stage_oids, vec![base_blob, our_blob, their_blob]);
}

#[test]
fn unknown_ref_fails_to_expand() {
    let dir = tempfile::tempdir().unwrap();
    linear_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let result = merge(&repo, Some("master"), "no-such-branch", &MergeOptions::default());
    assert!(matches!(
        result,
        Err(mgit_merge::MergeError::Ref(
            mgit_ref::RefError::NotExpanded(_)
        ))
    ));
}

#[test]
fn merge_reports_use_real_oids() {
    let dir = tempfile::tempdir().unwrap();
    linear_repo(dir.path());
    let repo = Repository::open(dir.path()).unwrap();

    let report = merge(
        &repo,
        Some("master"),
        "newest",
        &MergeOptions::default(),
    )
    .unwrap();

    let oid: ObjectId = report.oid.unwrap();
    assert_eq!(oid.to_hex(), resolve(dir.path(), "newest"));
}
