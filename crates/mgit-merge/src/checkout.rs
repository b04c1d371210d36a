//! Minimal checkout: materialize a ref's tree into the working directory and
//! index, then point HEAD at the ref.
//!
//! The target tree is diffed against the index; only paths that differ are
//! touched. Working-directory writes happen up front, index mutations land
//! inside one critical section.

use bstr::BString;
use mgit_diff::walk::{WalkSource, Walker};
use mgit_diff::DiffError;
use mgit_hash::ObjectId;
use mgit_index::{acquire, StatData};
use mgit_object::FileMode;
use mgit_ref::RefName;
use mgit_repo::Repository;

use crate::apply::{read_blob, remove_workfile, write_workfile};
use crate::MergeError;

enum CheckoutOp {
    Write {
        path: BString,
        oid: ObjectId,
        mode: FileMode,
    },
    Remove {
        path: BString,
    },
}

/// Check out `ref_name`: update working directory and index to its tree and
/// repoint HEAD. A no-op under `dry_run`.
pub fn checkout(repo: &Repository, ref_name: &RefName, dry_run: bool) -> Result<(), MergeError> {
    if dry_run {
        return Ok(());
    }

    let commit_oid = repo.refs().resolve(ref_name)?;
    let tree_oid = repo.commit_tree(&commit_oid)?;

    // Collect the differences between the target tree and the index.
    let walker = Walker::new(repo, vec![WalkSource::Tree(tree_oid), WalkSource::Index])?;
    let odb = repo.odb();

    let mut ops: Vec<CheckoutOp> = Vec::new();
    walker.walk(|path, views| {
        for view in views.iter().flatten() {
            if view.mode().is_gitlink() {
                return Err(DiffError::SubmodulesNotSupported(BString::from(path)));
            }
        }

        let target = views[0].as_ref().filter(|e| !e.is_tree());
        let staged = views[1].as_ref().filter(|e| !e.is_tree());

        match (target, staged) {
            (Some(t), Some(s)) => {
                if t.oid(odb)? != s.oid(odb)? || t.mode() != s.mode() {
                    ops.push(CheckoutOp::Write {
                        path: BString::from(path),
                        oid: t.oid(odb)?,
                        mode: t.mode(),
                    });
                }
            }
            (Some(t), None) => ops.push(CheckoutOp::Write {
                path: BString::from(path),
                oid: t.oid(odb)?,
                mode: t.mode(),
            }),
            (None, Some(_)) => ops.push(CheckoutOp::Remove {
                path: BString::from(path),
            }),
            (None, None) => {}
        }
        Ok(())
    })?;

    // Materialize the working directory, gathering fresh stats for the index
    // update. Removals go first so a path changing type (file to directory
    // or back) is vacated before its replacement lands.
    let work_tree = repo.require_work_tree()?.to_path_buf();
    let mut staged: Vec<(BString, ObjectId, FileMode, StatData)> = Vec::new();
    let mut removed: Vec<BString> = Vec::new();

    for op in &ops {
        if let CheckoutOp::Remove { path } = op {
            remove_workfile(&work_tree, path.as_ref())?;
            removed.push(path.clone());
        }
    }
    for op in &ops {
        if let CheckoutOp::Write { path, oid, mode } = op {
            let content = read_blob(odb, oid)?;
            let stat = write_workfile(&work_tree, path.as_ref(), &content, *mode)?;
            staged.push((path.clone(), *oid, *mode, stat));
        }
    }

    acquire(repo.index_path(), |idx| {
        for (path, oid, mode, stat) in &staged {
            idx.insert(path.as_ref(), *oid, *mode, *stat);
        }
        for path in &removed {
            idx.remove(path.as_ref());
        }
        Ok(())
    })?;

    // HEAD follows the checked-out ref.
    repo.refs()
        .write_symbolic_ref(&RefName::new("HEAD")?, ref_name)?;

    Ok(())
}
