//! Tree entry ordering properties.
//!
//! Git's tree sort order (directories compare as if suffixed '/') must be a
//! total order, and serialization must normalize any input order to it.

use bstr::BString;
use mgit_hash::ObjectId;
use mgit_object::{FileMode, Tree, TreeEntry};
use proptest::prelude::*;

fn entry(name: &str, is_dir: bool) -> TreeEntry {
    TreeEntry {
        mode: if is_dir { FileMode::Tree } else { FileMode::Regular },
        name: BString::from(name),
        oid: ObjectId::from([0xaa; 20]),
    }
}

#[test]
fn known_git_ordering() {
    // The classic ordering pitfall: foo-bar < foo.c < foo(dir) < foo0
    let mut tree = Tree {
        entries: vec![
            entry("foo0", false),
            entry("foo", true),
            entry("foo.c", false),
            entry("foo-bar", false),
        ],
    };
    tree.sort();
    let names: Vec<_> = tree.iter().map(|e| e.name.to_string()).collect();
    assert_eq!(names, vec!["foo-bar", "foo.c", "foo", "foo0"]);
}

fn arb_entry() -> impl Strategy<Value = TreeEntry> {
    ("[a-z][a-z.-]{0,8}", any::<bool>()).prop_map(|(name, is_dir)| entry(&name, is_dir))
}

proptest! {
    #[test]
    fn ordering_is_total(a in arb_entry(), b in arb_entry(), c in arb_entry()) {
        use std::cmp::Ordering;
        // Antisymmetry
        prop_assert_eq!(TreeEntry::cmp_entries(&a, &b), TreeEntry::cmp_entries(&b, &a).reverse());
        // Transitivity (only the Less chain needs checking; others follow by symmetry)
        if TreeEntry::cmp_entries(&a, &b) == Ordering::Less
            && TreeEntry::cmp_entries(&b, &c) == Ordering::Less
        {
            prop_assert_eq!(TreeEntry::cmp_entries(&a, &c), Ordering::Less);
        }
    }

    #[test]
    fn serialize_parse_roundtrip(mut entries in proptest::collection::vec(arb_entry(), 0..8)) {
        // Tree entries must have unique names; dedup by name.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.dedup_by(|a, b| a.name == b.name);

        let tree = Tree { entries };
        let serialized = tree.serialize_content();
        let parsed = Tree::parse(&serialized).unwrap();

        // Parsed entries come back in canonical order.
        let mut expected = tree.entries.clone();
        expected.sort();
        prop_assert_eq!(parsed.entries, expected);
    }
}
