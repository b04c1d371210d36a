//! Merge base computation via multi-source breadth-first search.
//!
//! Each input commit is assigned one bit; the walk floods parent edges
//! breadth first, OR-ing each commit's reachability mask into a tracker.
//! The first commits whose mask covers every input are the lowest common
//! ancestors: everything deeper is dominated by them, and the round-based
//! frontier guarantees nothing shallower was missed.

use std::collections::{HashMap, HashSet};

use mgit_hash::ObjectId;
use mgit_repo::Repository;

use crate::RevWalkError;

/// Maximum number of simultaneous merge sources (one bit each).
pub const MAX_MERGE_SOURCES: usize = 32;

/// Find the lowest common ancestors of a set of commits.
///
/// Returns all equally-shallow common ancestors in the order they were
/// discovered (callers that need one pick the first). An empty result means
/// the inputs share no history. Unreadable commits silently dead-end their
/// branch of the search, mirroring a shallow or partially-fetched clone.
pub fn merge_base(repo: &Repository, oids: &[ObjectId]) -> Result<Vec<ObjectId>, RevWalkError> {
    if oids.len() > MAX_MERGE_SOURCES {
        return Err(RevWalkError::TooManySources(oids.len()));
    }
    if oids.is_empty() {
        return Ok(Vec::new());
    }

    let full_mask: u32 = if oids.len() == MAX_MERGE_SOURCES {
        u32::MAX
    } else {
        (1u32 << oids.len()) - 1
    };

    // tracker: which sources reach each commit.
    let mut tracker: HashMap<ObjectId, u32> = HashMap::new();
    let mut results: Vec<ObjectId> = Vec::new();

    // Frontier entries carry their source bit so parent expansion preserves
    // which walk they belong to.
    let mut frontier: Vec<(ObjectId, u32)> = oids
        .iter()
        .enumerate()
        .map(|(i, oid)| (*oid, 1u32 << i))
        .collect();

    while !frontier.is_empty() {
        // Paint this round's frontier into the tracker.
        for (oid, bit) in &frontier {
            let mask = tracker.entry(*oid).or_insert(0);
            *mask |= bit;
            if *mask == full_mask && !results.contains(oid) {
                results.push(*oid);
            }
        }

        // Everything found in one round is equally shallow; report it all.
        if !results.is_empty() {
            return Ok(results);
        }

        // Expand to parents, deduplicating per (commit, source).
        let mut next: Vec<(ObjectId, u32)> = Vec::new();
        let mut enqueued: HashSet<(ObjectId, u32)> = HashSet::new();

        for (oid, bit) in &frontier {
            let commit = match repo.read_commit(oid) {
                Ok(c) => c,
                // Missing or unreadable object: this branch dead-ends.
                Err(_) => continue,
            };
            for parent in &commit.parents {
                let already_painted =
                    tracker.get(parent).map_or(false, |mask| mask & bit != 0);
                if !already_painted && enqueued.insert((*parent, *bit)) {
                    next.push((*parent, *bit));
                }
            }
        }

        frontier = next;
    }

    Ok(results)
}

/// Check whether `ancestor` is an ancestor of (or equal to) `descendant`.
pub fn is_ancestor(
    repo: &Repository,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> Result<bool, RevWalkError> {
    if ancestor == descendant {
        return Ok(true);
    }
    let bases = merge_base(repo, &[*ancestor, *descendant])?;
    Ok(bases.contains(ancestor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BString;
    use mgit_object::{Commit, Object};
    use mgit_utils::date::{GitDate, Signature};

    fn signature() -> Signature {
        Signature {
            name: BString::from("Test"),
            email: BString::from("test@test.com"),
            date: GitDate::new(1700000000, 0),
        }
    }

    /// Write a synthetic commit; the tree OID does not need to exist for
    /// graph walking.
    fn commit(repo: &Repository, parents: &[ObjectId], marker: u8) -> ObjectId {
        let commit = Commit {
            tree: ObjectId::EMPTY_TREE,
            parents: parents.to_vec(),
            author: signature(),
            committer: signature(),
            gpgsig: None,
            extra_headers: Vec::new(),
            message: BString::from(format!("commit {marker}\n")),
        };
        repo.odb().write(&Object::Commit(commit)).unwrap()
    }

    #[test]
    fn single_source_is_its_own_base() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let a = commit(&repo, &[], 0);
        assert_eq!(merge_base(&repo, &[a]).unwrap(), vec![a]);
    }

    #[test]
    fn same_commit_twice() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let a = commit(&repo, &[], 0);
        assert_eq!(merge_base(&repo, &[a, a]).unwrap(), vec![a]);
    }

    #[test]
    fn diamond_base() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        // A -> B, A -> C
        let a = commit(&repo, &[], 0);
        let b = commit(&repo, &[a], 1);
        let c = commit(&repo, &[a], 2);

        assert_eq!(merge_base(&repo, &[b, c]).unwrap(), vec![a]);
    }

    #[test]
    fn linear_history_base_is_older_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let a = commit(&repo, &[], 0);
        let b = commit(&repo, &[a], 1);
        let c = commit(&repo, &[b], 2);

        assert_eq!(merge_base(&repo, &[a, c]).unwrap(), vec![a]);
        assert_eq!(merge_base(&repo, &[c, a]).unwrap(), vec![a]);
    }

    #[test]
    fn disjoint_histories_have_no_base() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let a = commit(&repo, &[], 0);
        let b = commit(&repo, &[], 1);

        assert!(merge_base(&repo, &[a, b]).unwrap().is_empty());
    }

    #[test]
    fn criss_cross_returns_both_bases() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        // Criss-cross: X and Y are both merge bases of D and E.
        //   X   Y
        //   |\ /|
        //   | x |
        //   |/ \|
        //   D   E
        let x = commit(&repo, &[], 0);
        let y = commit(&repo, &[], 1);
        let d = commit(&repo, &[x, y], 2);
        let e = commit(&repo, &[x, y], 3);

        let bases = merge_base(&repo, &[d, e]).unwrap();
        assert_eq!(bases.len(), 2);
        assert!(bases.contains(&x));
        assert!(bases.contains(&y));
    }

    #[test]
    fn three_sources() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let a = commit(&repo, &[], 0);
        let b = commit(&repo, &[a], 1);
        let c = commit(&repo, &[a], 2);
        let d = commit(&repo, &[a], 3);

        assert_eq!(merge_base(&repo, &[b, c, d]).unwrap(), vec![a]);
    }

    #[test]
    fn missing_object_dead_ends() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let a = commit(&repo, &[], 0);
        let phantom = ObjectId::from([0xee; 20]);

        assert!(merge_base(&repo, &[a, phantom]).unwrap().is_empty());
    }

    #[test]
    fn too_many_sources_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let oids = vec![ObjectId::NULL; MAX_MERGE_SOURCES + 1];
        assert!(matches!(
            merge_base(&repo, &oids),
            Err(RevWalkError::TooManySources(33))
        ));
    }

    #[test]
    fn ancestry_checks() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let a = commit(&repo, &[], 0);
        let b = commit(&repo, &[a], 1);
        let c = commit(&repo, &[a], 2);
        let d = commit(&repo, &[b, c], 3);

        assert!(is_ancestor(&repo, &a, &d).unwrap());
        assert!(is_ancestor(&repo, &a, &a).unwrap());
        assert!(is_ancestor(&repo, &b, &d).unwrap());
        assert!(!is_ancestor(&repo, &d, &a).unwrap());
        assert!(!is_ancestor(&repo, &b, &c).unwrap());
    }
}
