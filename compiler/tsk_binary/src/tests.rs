use proptest::prelude::*;
use tsk_ir::{ConfigTree, ConfigTreeBuilder, Object, OperatorCall, Value};

use crate::{compile, Compression, CompileOptions, LoadedConfig};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1.0e9..1.0e9f64).prop_map(Value::Float),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-c]{1,2}", inner.clone(), 0..4).prop_map(Value::Object),
            ("[a-z]{1,5}", prop::collection::btree_map("[a-c]", inner, 0..3)).prop_map(
                |(name, args): (String, Object)| Value::OperatorCall(OperatorCall::new(name, args))
            ),
        ]
    })
}

fn tree() -> impl Strategy<Value = ConfigTree> {
    prop::collection::vec(
        ("[a-d]{0,2}", prop::collection::vec(("[a-e]{1,2}", value()), 0..5)),
        0..5,
    )
    .prop_map(|sections| {
        let mut builder = ConfigTreeBuilder::new();
        for (name, entries) in sections {
            builder.ensure_section(&name);
            for (key, value) in entries {
                builder.set(&name, &key, value);
            }
        }
        builder.finish()
    })
}

proptest! {
    #[test]
    fn compiled_trees_load_back_unchanged(tree in tree(), deflate in any::<bool>()) {
        let compression = if deflate { Compression::Deflate } else { Compression::None };
        let options = CompileOptions::default().with_compression(compression);
        let bytes = compile(&tree, &options).unwrap();
        let loaded = LoadedConfig::from_bytes(bytes).unwrap();
        prop_assert_eq!(loaded.to_tree().unwrap(), tree);
    }

    #[test]
    fn tables_hold_no_duplicates(tree in tree()) {
        let bytes = compile(&tree, &CompileOptions::default()).unwrap();
        let loaded = LoadedConfig::from_bytes(bytes).unwrap();
        for table in [
            loaded.string_table().collect::<Vec<_>>(),
            loaded.value_table().collect::<Vec<_>>(),
        ] {
            let mut unique = table.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), table.len());
        }
    }

    #[test]
    fn flat_keys_match_the_tree(tree in tree()) {
        let bytes = compile(&tree, &CompileOptions::default()).unwrap();
        let loaded = LoadedConfig::from_bytes(bytes).unwrap();
        for section in tree.sections() {
            for key in section.keys() {
                let dotted = if section.name().is_empty() {
                    key.to_owned()
                } else {
                    format!("{}.{key}", section.name())
                };
                let got = loaded.get(&dotted).unwrap();
                prop_assert_eq!(got.as_ref(), tree.get(&dotted));
            }
        }
    }
}
