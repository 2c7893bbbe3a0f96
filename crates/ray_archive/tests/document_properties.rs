//! Integration tests for the archive document model
//!
//! Covers the behaviour scene loading depends on:
//! - Packed round trip preserves kinds, values and ordering
//! - Find-or-insert vs append semantics on objects
//! - Null upgrade happens once
//! - Type mismatches are reported, never defaulted

use ray_archive::{ArchiveError, ArchiveNode, NodeKind};

fn sample_scene() -> ArchiveNode {
    let mut scene = ArchiveNode::new();
    scene["version"] = 3u32.into();
    scene["name"] = "courtyard".into();

    let mut camera = ArchiveNode::new();
    camera["fov"] = 55.0.into();
    camera["near"] = 0.1.into();
    camera["order"] = (-1i64).into();
    scene.push_back("object", camera).unwrap();

    let mut sun = ArchiveNode::new();
    sun["type"] = "sun".into();
    sun["color"] = [1.0f32, 0.95, 0.9].into();
    sun["shadow"] = true.into();
    scene.push_back("object", sun).unwrap();

    scene["seed"] = u64::MAX.into();
    scene["unused"] = ArchiveNode::new();
    scene
}

#[test]
fn test_packed_round_trip_is_exact() {
    let scene = sample_scene();
    let bytes = scene.to_packed_bytes().unwrap();
    let restored = ArchiveNode::from_packed_bytes(&bytes).unwrap();

    assert_eq!(restored, scene);
    assert_eq!(restored["version"].kind(), NodeKind::Unsigned);
    assert_eq!(restored["seed"].get::<u64>().unwrap(), u64::MAX);

    let objects: Vec<&str> = restored.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(objects, vec!["version", "name", "object", "object", "seed", "unused"]);
}

#[test]
fn test_text_round_trip_preserves_order_and_duplicates() {
    let scene = sample_scene();
    let text = scene.to_json_string().unwrap();
    let restored = ArchiveNode::from_json_str(&text).unwrap();

    let second = restored.iter().filter(|(k, _)| k == "object").nth(1).unwrap();
    assert_eq!(second.1["type"].as_str().unwrap(), "sun");
    assert_eq!(restored["seed"].kind(), NodeKind::Unsigned);
    // Small unsigned values come back as integers from text.
    assert_eq!(restored["version"].kind(), NodeKind::Integer);
    assert_eq!(restored["version"].get::<u32>().unwrap(), 3);
}

#[test]
fn test_push_back_then_lookup_returns_first() {
    let mut node = ArchiveNode::new();
    node.push_back("k", "v1").unwrap();
    node.push_back("k", "v2").unwrap();

    let all: Vec<&str> = node.iter().map(|(_, v)| v.as_str().unwrap()).collect();
    assert_eq!(all, vec!["v1", "v2"]);
    assert_eq!(node.at("k").unwrap().as_str().unwrap(), "v1");
}

#[test]
fn test_index_write_on_null_creates_one_entry() {
    let mut node = ArchiveNode::new();
    node["k"] = "v3".into();
    assert_eq!(node.len(), 1);

    for _ in 0..5 {
        let _ = &mut node["k"];
    }
    assert_eq!(node.len(), 1);
}

#[test]
fn test_null_upgrade_is_idempotent() {
    let mut node = ArchiveNode::new();
    node.at_mut("first").unwrap();
    node.at_mut("second").unwrap();

    assert!(node.is_object());
    let keys: Vec<&str> = node.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["first", "second"]);
}

#[test]
fn test_type_mismatch_names_both_kinds() {
    let node = ArchiveNode::from(12);

    match node.as_str() {
        Err(ArchiveError::TypeMismatch { expected, found }) => {
            assert_eq!(expected, "string");
            assert_eq!(found, "integer");
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }

    match node.as_array() {
        Err(ArchiveError::TypeMismatch { expected, found }) => {
            assert_eq!(expected, "array");
            assert_eq!(found, "integer");
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }
}

#[test]
fn test_move_transfers_subtree() {
    let mut scene = sample_scene();
    let before = scene.deep_clone();

    let moved = std::mem::take(&mut scene);
    assert!(scene.is_null());
    assert_eq!(moved, before);

    let mut holder = ArchiveNode::new();
    holder["scene"] = moved;
    assert_eq!(holder["scene"]["name"].as_str().unwrap(), "courtyard");
}

/// Deterministic nested tree: arrays of objects of arrays, with repeated
/// keys at every object level. Every leaf kind survives text as well as
/// packed archives: signed integers, unsigned past `i64::MAX`, floats
/// with an exact binary form.
fn nested_tree(depth: u32, seed: &mut u64) -> ArchiveNode {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let pick = (*seed >> 33) as i64;

    if depth == 0 {
        return match pick % 6 {
            0 => ArchiveNode::new(),
            1 => (pick % 2 == 0).into(),
            2 => (-pick).into(),
            3 => (u64::MAX - pick as u64).into(),
            4 => ((pick % 64) as f64 * 0.25).into(),
            _ => format!("leaf{}", pick % 100).into(),
        };
    }

    let mut object = ArchiveNode::new();
    for i in 0..3 {
        let mut items = ArchiveNode::new();
        for _ in 0..2 {
            items.push(nested_tree(depth - 1, seed)).unwrap();
        }
        // "child" repeats, "meta" does not
        object.push_back("child", items).unwrap();
        object.push_back(format!("meta{}", i), nested_tree(0, seed)).unwrap();
    }
    object.push_back("child", nested_tree(depth - 1, seed)).unwrap();
    object
}

fn key_paths(node: &ArchiveNode, prefix: &str, out: &mut Vec<String>) {
    for (key, child) in node.iter() {
        let path = format!("{}/{}", prefix, key);
        out.push(path.clone());
        key_paths(child, &path, out);
    }
    for (i, item) in node.elements().enumerate() {
        key_paths(item, &format!("{}[{}]", prefix, i), out);
    }
}

#[test]
fn test_nested_trees_round_trip_through_both_archives() {
    for start in [1u64, 7, 42, 1234] {
        let mut seed = start;
        let tree = nested_tree(4, &mut seed);

        let mut expected_paths = Vec::new();
        key_paths(&tree, "", &mut expected_paths);
        assert!(expected_paths.iter().filter(|p| p.ends_with("/child")).count() > 4);

        let packed = ArchiveNode::from_packed_bytes(&tree.to_packed_bytes().unwrap()).unwrap();
        assert_eq!(packed, tree);

        let text = ArchiveNode::from_json_str(&tree.to_json_string().unwrap()).unwrap();
        assert_eq!(text, tree);

        let mut text_paths = Vec::new();
        key_paths(&text, "", &mut text_paths);
        assert_eq!(text_paths, expected_paths);

        // Deep copies compare equal and stay independent
        let mut copy = tree.deep_clone();
        assert_eq!(copy, tree);
        copy["child"].push(1).unwrap();
        assert_ne!(copy, tree);
    }
}
