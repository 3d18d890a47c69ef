//! Exporters: hex viewer rows, JSON tree and text dump.

use binmetal::ast::{def, let_, rep, seq};
use binmetal::export::{dump, flat_js, flat_rows, tree_json, Marker};
use binmetal::expr::con;
use binmetal::{Encoding, Format, SliceSource, TreeOptions};
use serde_json::json;

fn marker(offset: u64, length: u64, name: &str) -> Marker {
    Marker {
        offset,
        length,
        name: name.to_string(),
    }
}

#[test]
fn test_flat_rows_order() {
    let grammar = seq(
        "s",
        vec![def("a", 2), def("b", 30), def("c", 4), let_("k", con(1))],
    );
    let data = [0u8; 36];
    let src = SliceSource::new(&data);
    let env = Format::new("s", grammar, Encoding::default()).decode(&src).unwrap();

    let rows = flat_rows(env.history());
    assert_eq!(rows.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    // newest first within a row; computed values are not byte ranges
    assert_eq!(rows[&0], vec![marker(2, 30, "b"), marker(0, 2, "a")]);
    assert_eq!(rows[&1], vec![marker(32, 4, "c")]);

    assert_eq!(
        flat_js(env.history()),
        "/* generated by binmetal */var columnCountUpdate = 32;var locationsUpdate = [0, 1];\
         var dataUpdate = [[[2, 30, 'b'], [0, 2, 'a']],[[32, 4, 'c']]];"
    );
}

fn items() -> Format {
    let grammar = seq("root", vec![rep("items", seq("item", vec![def("x", 1)]))]);
    Format::new("items", grammar, Encoding::default())
}

#[test]
fn test_tree_shares_children_by_definition() {
    let data = [1u8, 2];
    let src = SliceSource::new(&data);
    let env = items().decode(&src).unwrap();
    let tree = tree_json(env.history(), &TreeOptions::default());
    assert_eq!(
        tree,
        json!({
            "name": "Seq: root",
            "children": [{
                "name": "Rep: items",
                "children": [
                    {"name": "Seq: item", "children": [{"name": "Def: x"}, {"name": "Def: x"}]},
                    {"name": "Seq: item"}
                ]
            }]
        })
    );
}

#[test]
fn test_tree_per_parent_children() {
    let data = [1u8, 2];
    let src = SliceSource::new(&data);
    let env = items().decode(&src).unwrap();
    let opts = TreeOptions {
        share_children_by_definition: false,
    };
    let tree = tree_json(env.history(), &opts);
    let item = json!({"name": "Seq: item", "children": [{"name": "Def: x"}]});
    assert_eq!(
        tree,
        json!({
            "name": "Seq: root",
            "children": [{"name": "Rep: items", "children": [item.clone(), item]}]
        })
    );
}

#[test]
fn test_tree_of_empty_history() {
    let data: [u8; 0] = [];
    let src = SliceSource::new(&data);
    let env = binmetal::Environment::new(&src);
    assert_eq!(tree_json(env.history(), &TreeOptions::default()), json!({}));
}

#[test]
fn test_dump_lines() {
    let data = [1u8, 2];
    let src = SliceSource::new(&data);
    let env = items().decode(&src).unwrap();
    let text = dump(env.history());
    assert!(text.contains("[Seq: root]"));
    assert!(text.contains("[Rep: items]"));
    assert!(text.contains("x = 1 (0x1)"));
    assert!(text.contains("x = 2 (0x2)"));
    assert_eq!(text.lines().count(), 6);
}
