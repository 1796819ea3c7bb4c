//! The resolved configuration tree.
//!
//! Sections and keys keep declaration order. A [`ConfigTree`] is immutable;
//! it is assembled through a [`ConfigTreeBuilder`], which also records how
//! each key came to hold its value while the build is in progress.

use rustc_hash::FxHashMap;

use crate::value::merge_values;
use crate::Value;

/// One section of a resolved tree.
#[derive(Clone, Debug, Default)]
pub struct TreeSection {
    name: String,
    entries: Vec<(String, Value)>,
    index: FxHashMap<String, usize>,
}

impl TreeSection {
    fn new(name: &str) -> Self {
        TreeSection {
            name: name.to_owned(),
            ..TreeSection::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace or insert, keeping the position of the first declaration.
    fn set(&mut self, key: &str, value: Value) -> bool {
        if let Some(&i) = self.index.get(key) {
            self.entries[i].1 = value;
            true
        } else {
            self.index.insert(key.to_owned(), self.entries.len());
            self.entries.push((key.to_owned(), value));
            false
        }
    }

    fn take(&mut self, key: &str) -> Option<Value> {
        self.index
            .get(key)
            .map(|&i| std::mem::take(&mut self.entries[i].1))
    }
}

impl PartialEq for TreeSection {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.entries == other.entries
    }
}

/// Section name → key → value, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigTree {
    sections: Vec<TreeSection>,
    index: FxHashMap<String, usize>,
}

impl ConfigTree {
    pub fn new() -> Self {
        ConfigTree::default()
    }

    pub fn section(&self, name: &str) -> Option<&TreeSection> {
        self.index.get(name).map(|&i| &self.sections[i])
    }

    pub fn sections(&self) -> impl Iterator<Item = &TreeSection> {
        self.sections.iter()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(TreeSection::name)
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of keys across sections.
    pub fn key_count(&self) -> usize {
        self.sections.iter().map(TreeSection::len).sum()
    }

    /// Look up a dotted key.
    ///
    /// `section.key.nested.path` reads `key` from `section` and follows the
    /// rest through objects and arrays. A path whose first segment is not a
    /// section (or a single segment) is read from the root section.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        let segments: Vec<&str> = dotted.split('.').collect();
        lookup_segments(self, &segments)
    }

    /// Every leaf as `(dotted key, value)`. Objects are expanded; arrays,
    /// scalars, operator calls and empty objects are leaves. Keys of the
    /// root section carry no section prefix.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for section in &self.sections {
            for (key, value) in section.iter() {
                let prefix = if section.name.is_empty() {
                    key.to_owned()
                } else {
                    format!("{}.{key}", section.name)
                };
                flatten_into(&prefix, value, &mut out);
            }
        }
        out
    }

    /// A new tree with `overlay` applied on top of `self`, key by key.
    #[must_use]
    pub fn merged(&self, overlay: &ConfigTree) -> ConfigTree {
        let mut builder = ConfigTreeBuilder::from_tree(self.clone());
        for section in &overlay.sections {
            builder.ensure_section(&section.name);
            for (key, value) in section.iter() {
                builder.set(&section.name, key, value.clone());
            }
        }
        builder.finish()
    }
}

/// Section lookup first, then the root-object fallback.
fn lookup_segments<'t>(tree: &'t ConfigTree, segments: &[&str]) -> Option<&'t Value> {
    match segments {
        [] => None,
        [key] => tree.section("")?.get(key),
        [first, key, rest @ ..] => {
            if let Some(value) = tree.section(first).and_then(|s| s.get(key)) {
                return value.get_path(rest);
            }
            tree.section("")?.get(first)?.get_path(&segments[1..])
        }
    }
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    tsk_stack::ensure_sufficient_stack(|| match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(&format!("{prefix}.{key}"), nested, out);
            }
        }
        _ => out.push((prefix.to_owned(), value.clone())),
    });
}

/// What happened to a key during a build step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MergeKind {
    Inserted,
    Overridden,
    Merged,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MergeRecord {
    pub section: String,
    pub key: String,
    pub kind: MergeKind,
}

/// Mutable tree under construction, with its merge history.
#[derive(Debug, Default)]
pub struct ConfigTreeBuilder {
    tree: ConfigTree,
    history: Vec<MergeRecord>,
}

impl ConfigTreeBuilder {
    pub fn new() -> Self {
        ConfigTreeBuilder::default()
    }

    fn from_tree(tree: ConfigTree) -> Self {
        ConfigTreeBuilder {
            tree,
            history: Vec::new(),
        }
    }

    /// Make sure `name` exists, even if it ends up with no keys.
    pub fn ensure_section(&mut self, name: &str) -> &mut TreeSection {
        let idx = match self.tree.index.get(name) {
            Some(&i) => i,
            None => {
                let i = self.tree.sections.len();
                self.tree.sections.push(TreeSection::new(name));
                self.tree.index.insert(name.to_owned(), i);
                i
            }
        };
        &mut self.tree.sections[idx]
    }

    /// Last declaration wins.
    pub fn set(&mut self, section: &str, key: &str, value: Value) -> MergeKind {
        let existed = self.ensure_section(section).set(key, value);
        let kind = if existed {
            MergeKind::Overridden
        } else {
            MergeKind::Inserted
        };
        self.record(section, key, kind);
        kind
    }

    /// `+=`: combine with the current value via [`merge_values`].
    pub fn merge(&mut self, section: &str, key: &str, value: Value) -> MergeKind {
        let target = self.ensure_section(section);
        let kind = match target.take(key) {
            Some(existing) => {
                target.set(key, merge_values(existing, value));
                MergeKind::Merged
            }
            None => {
                target.set(key, value);
                MergeKind::Inserted
            }
        };
        self.record(section, key, kind);
        kind
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.tree.section(section)?.get(key)
    }

    pub fn history(&self) -> &[MergeRecord] {
        &self.history
    }

    /// Freeze the tree. The merge history is dropped.
    pub fn finish(self) -> ConfigTree {
        self.tree
    }

    fn record(&mut self, section: &str, key: &str, kind: MergeKind) {
        self.history.push(MergeRecord {
            section: section.to_owned(),
            key: key.to_owned(),
            kind,
        });
    }
}
