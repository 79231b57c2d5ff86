//! Property tests for the workspace tree builder

use devlab_core::{build_tree, parse_listing, ListingEntry, DEFAULT_DENYLIST};
use devlab_types::NodeType;
use proptest::prelude::*;
use std::collections::HashMap;

const ROOT: &str = "/home/devlab";

/// Paths under the root drawn from a small alphabet so parents recur
fn arb_relative() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "c", ".cache", "go", "src"]), 1..4)
}

fn arb_listing() -> impl Strategy<Value = Vec<ListingEntry>> {
    prop::collection::vec((arb_relative(), any::<bool>()), 0..40).prop_map(|items| {
        let mut entries = vec![ListingEntry::new(ROOT, NodeType::Folder)];
        for (segments, is_dir) in items {
            // emit every ancestor as a folder, as find would
            for depth in 1..segments.len() {
                entries.push(ListingEntry::new(
                    format!("{ROOT}/{}", segments[..depth].join("/")),
                    NodeType::Folder,
                ));
            }
            let kind = if is_dir { NodeType::Folder } else { NodeType::File };
            entries.push(ListingEntry::new(format!("{ROOT}/{}", segments.join("/")), kind));
        }
        entries
    })
}

proptest! {
    #[test]
    fn output_is_independent_of_listing_order(
        (listing, shuffled) in arb_listing().prop_flat_map(|l| {
            let shuffled = Just(l.clone()).prop_shuffle();
            (Just(l), shuffled)
        })
    ) {
        let a = build_tree(&listing, ROOT, DEFAULT_DENYLIST);
        let b = build_tree(&shuffled, ROOT, DEFAULT_DENYLIST);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn every_non_root_node_has_exactly_one_parent(listing in arb_listing()) {
        let tree = build_tree(&listing, ROOT, DEFAULT_DENYLIST);

        let mut parents: HashMap<&str, usize> = HashMap::new();
        for node in &tree {
            for child in &node.children {
                *parents.entry(child.as_str()).or_default() += 1;
            }
        }
        for node in tree.iter().filter(|n| !n.is_root) {
            prop_assert_eq!(parents.get(node.path.as_str()).copied(), Some(1), "{}", node.path);
        }
    }

    #[test]
    fn denied_paths_never_appear(listing in arb_listing()) {
        let tree = build_tree(&listing, ROOT, DEFAULT_DENYLIST);
        let cache = format!("{ROOT}/.cache");
        let prefix = format!("{cache}/");
        for node in &tree {
            prop_assert!(node.path != cache && !node.path.starts_with(&prefix), "{}", node.path);
        }
    }

    #[test]
    fn parse_listing_never_panics(input in ".{0,200}") {
        let _ = parse_listing(&input);
    }
}

#[test]
fn reference_listing() {
    let tree = build_tree(
        &parse_listing(
            "/home/devlab d\n/home/devlab/a f\n/home/devlab/b d\n/home/devlab/b/c f\n",
        ),
        ROOT,
        DEFAULT_DENYLIST,
    );
    let root = tree.iter().find(|n| n.is_root).unwrap();
    assert_eq!(root.children, vec!["/home/devlab/a", "/home/devlab/b"]);
    let b = tree.iter().find(|n| n.path == "/home/devlab/b").unwrap();
    assert_eq!(b.children, vec!["/home/devlab/b/c"]);
}
