//! The merge orchestrator.
//!
//! Resolves the two refs, finds their merge base, and dispatches:
//!
//! - base == theirs: nothing to do, the branch already contains theirs.
//! - base == ours: fast-forward — move the branch and check out.
//! - otherwise: three-way merge — diff the trees, apply per-path actions to
//!   the working directory and index, build the result tree, and either
//!   create the merge commit or leave the repository in merging state with
//!   `MERGE_HEAD`/`MERGE_MSG` and conflict stages recorded.

use mgit_hash::ObjectId;
use mgit_index::acquire;
use mgit_object::Object;
use mgit_repo::Repository;
use mgit_revwalk::merge_base;
use mgit_utils::date::Signature;

use crate::apply::{apply_entry, apply_index_ops};
use crate::checkout::checkout;
use crate::commit_op::{commit, CommitOptions};
use crate::content::MergeLabels;
use crate::state;
use crate::MergeError;

/// Options for a merge operation.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Refuse to create a merge commit; only fast-forward.
    pub fast_forward_only: bool,
    /// Compute everything but persist no objects and move no refs.
    pub dry_run: bool,
    /// Persist the merge commit but leave the branch where it is.
    pub no_update_branch: bool,
    /// Skip the working-directory checkout on fast-forward.
    pub no_checkout: bool,
    /// Commit message; defaults to `Merge branch '<theirs>' into <ours>`.
    pub message: Option<String>,
    /// Author identity. Required for a non-fast-forward merge.
    pub author: Option<Signature>,
    /// Committer identity; defaults to the author.
    pub committer: Option<Signature>,
}

/// Structured result of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// New commit OID, or the tip after a fast-forward. Absent on dry-run
    /// commits and on conflicts.
    pub oid: Option<ObjectId>,
    /// Root tree of the merged result (three-way merges only).
    pub tree: Option<ObjectId>,
    /// The branch already contained theirs; nothing was touched.
    pub already_merged: bool,
    /// The branch was fast-forwarded.
    pub fast_forward: bool,
    /// A merge commit was created.
    pub merge_commit: bool,
    /// The three-way machinery ran.
    pub recursive_merge: bool,
}

/// Merge `theirs` into `ours` (defaulting to the current branch).
pub fn merge(
    repo: &Repository,
    ours: Option<&str>,
    theirs: &str,
    opts: &MergeOptions,
) -> Result<MergeReport, MergeError> {
    // Resolve both sides to refs and commit OIDs.
    let current_ref = repo.current_ref()?;
    let ours_ref = match ours {
        Some(name) => repo.refs().expand(name)?,
        None => current_ref
            .clone()
            .ok_or_else(|| mgit_ref::RefError::NotResolved("HEAD".into()))?,
    };
    let theirs_ref = repo.refs().expand(theirs)?;

    let our_oid = peel_to_commit(repo, repo.refs().resolve(&ours_ref)?)?;
    let their_oid = peel_to_commit(repo, repo.refs().resolve(&theirs_ref)?)?;

    // Find the common ancestor; exactly one is used even when several exist.
    let base_oids = merge_base(repo, &[our_oid, their_oid])?;

    let Some(&base_oid) = base_oids.first() else {
        return Err(MergeError::NoCommonAncestry {
            ours: ours_ref.to_string(),
            theirs: theirs_ref.to_string(),
        });
    };

    if base_oid == their_oid {
        // Theirs is already reachable from ours.
        return Ok(MergeReport {
            oid: Some(our_oid),
            already_merged: true,
            ..Default::default()
        });
    }

    if base_oid == our_oid {
        // Fast-forward.
        if !opts.dry_run && !opts.no_update_branch {
            repo.refs().write_ref(&ours_ref, &their_oid)?;
        }
        if !opts.no_checkout {
            checkout(repo, &ours_ref, opts.dry_run)?;
        }
        return Ok(MergeReport {
            oid: Some(their_oid),
            fast_forward: true,
            ..Default::default()
        });
    }

    // Three-way merge from here on. The committer defaults to the author at
    // this boundary; commit creation itself requires both identities.
    if opts.fast_forward_only {
        return Err(MergeError::FastForwardImpossible);
    }
    let author = opts.author.clone().ok_or(MergeError::MissingAuthor)?;
    let committer = opts.committer.clone().unwrap_or_else(|| author.clone());

    // The merge is computed against ours; make sure it is checked out.
    if current_ref.as_ref() != Some(&ours_ref) {
        checkout(repo, &ours_ref, opts.dry_run)?;
    }

    if !opts.dry_run {
        state::write_merge_head(repo.git_dir(), &their_oid)?;
    }

    let our_tree = repo.commit_tree(&our_oid)?;
    let base_tree = repo.commit_tree(&base_oid)?;
    let their_tree = repo.commit_tree(&their_oid)?;

    let diff = mgit_diff::three_way::diff_merge_trees(repo, our_tree, base_tree, their_tree)?;

    // Apply the working-directory side of every entry, collecting the index
    // mutations and the set of conflicted paths.
    let labels = MergeLabels::default();
    let mut ops = Vec::with_capacity(diff.len());
    let mut any_conflict = false;
    for entry in &diff {
        let outcome = apply_entry(repo, entry, &labels, !opts.dry_run)?;
        if !outcome.clean {
            any_conflict = true;
        }
        if let Some(op) = outcome.op {
            ops.push(op);
        }
    }

    // One critical section: mutate the index, then build the result tree.
    let persist = !opts.dry_run;
    let odb = repo.odb();
    let tree_oid = acquire(repo.index_path(), |idx| {
        apply_index_ops(idx, &ops);
        idx.write_tree(odb, persist)
    })?;

    let message = opts.message.clone().unwrap_or_else(|| {
        format!(
            "Merge branch '{}' into {}",
            theirs_ref.short_name(),
            ours_ref.short_name()
        )
    });

    if any_conflict {
        // Leave the repository in merging state for the user to resolve.
        if !opts.dry_run {
            state::write_merge_msg(repo.git_dir(), &message)?;
        }
        return Ok(MergeReport {
            tree: Some(tree_oid),
            merge_commit: false,
            recursive_merge: true,
            ..Default::default()
        });
    }

    // Clean merge: create the commit. The second parent comes from
    // MERGE_HEAD, which the commit also clears.
    let commit_oid = commit(
        repo,
        &CommitOptions {
            message: Some(message),
            author: Some(author),
            committer: Some(committer),
            tree: Some(tree_oid),
            parents: Some(vec![our_oid]),
            dry_run: opts.dry_run,
            no_update_branch: opts.no_update_branch,
            ref_name: Some(ours_ref),
        },
    )
    .map_err(annotate_commit_error)?;

    Ok(MergeReport {
        oid: if opts.dry_run { None } else { Some(commit_oid) },
        tree: Some(tree_oid),
        merge_commit: true,
        recursive_merge: true,
        ..Default::default()
    })
}

/// Follow tag objects down to a commit OID.
fn peel_to_commit(repo: &Repository, oid: ObjectId) -> Result<ObjectId, MergeError> {
    let mut current = oid;
    for _ in 0..10 {
        match repo.odb().read_cached(&current)? {
            Some(Object::Commit(_)) => return Ok(current),
            Some(Object::Tag(tag)) => current = tag.object,
            Some(other) => {
                return Err(MergeError::ObjectTypeAssertion {
                    oid: current,
                    expected: "commit",
                    actual: other.object_type().to_string(),
                })
            }
            None => return Err(MergeError::CommitNotFetched(current)),
        }
    }
    Err(MergeError::ObjectTypeAssertion {
        oid,
        expected: "commit",
        actual: "tag chain too deep".into(),
    })
}

/// Merge-input objects that vanish mid-commit surface as unfetched commits.
fn annotate_commit_error(err: MergeError) -> MergeError {
    match err {
        MergeError::ObjectNotFound(oid) => MergeError::CommitNotFetched(oid),
        other => other,
    }
}
