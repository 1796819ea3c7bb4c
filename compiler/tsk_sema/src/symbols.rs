//! Where every `(section, key)` pair is declared and what references
//! point at.
//!
//! Repeated sections share one key space: a later `[db]` overrides single
//! keys of an earlier `[db]`. For each key the table keeps its effective
//! declarations, which are the last `=` and every `+=` after it.

use rustc_hash::FxHashMap;
use tsk_ir::{AssignOp, Config, Entry, Reference, ROOT_SECTION};

/// One `(section, key)` pair.
#[derive(Debug)]
pub struct KeyNode<'ast> {
    pub section: &'ast str,
    pub key: &'ast str,
    /// Declarations that contribute to the final value, in source order.
    pub decls: Vec<&'ast Entry>,
}

impl KeyNode<'_> {
    /// `section.key`, or just `key` in the root section.
    pub fn display_name(&self) -> String {
        if self.section.is_empty() {
            self.key.to_owned()
        } else {
            format!("{}.{}", self.section, self.key)
        }
    }
}

/// What a reference denotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup<'r> {
    /// A declared key, plus a path into its value.
    Key { node: usize, rest: &'r [String] },
    /// A bare word that names no key: an unquoted string.
    Word(&'r str),
    Unknown,
}

#[derive(Debug, Default)]
pub struct SymbolTable<'ast> {
    nodes: Vec<KeyNode<'ast>>,
    index: FxHashMap<&'ast str, FxHashMap<&'ast str, usize>>,
    sections: Vec<&'ast str>,
    /// Variable name (without `$`) to the node of its last declaration.
    variables: FxHashMap<&'ast str, usize>,
}

impl<'ast> SymbolTable<'ast> {
    pub fn build(config: &'ast Config) -> Self {
        let mut table = SymbolTable::default();
        for section in &config.sections {
            let name = section.name.as_str();
            if !table.index.contains_key(name) {
                table.sections.push(name);
                table.index.insert(name, FxHashMap::default());
            }
            for entry in &section.entries {
                let id = table.intern(name, &entry.key);
                let decls = &mut table.nodes[id].decls;
                if entry.op == AssignOp::Set {
                    decls.clear();
                }
                decls.push(entry);
                if let Some(var) = entry.variable_name() {
                    table.variables.insert(var, id);
                }
            }
        }
        table
    }

    fn intern(&mut self, section: &'ast str, key: &'ast str) -> usize {
        let keys = self.index.entry(section).or_default();
        if let Some(&id) = keys.get(key) {
            return id;
        }
        let id = self.nodes.len();
        keys.insert(key, id);
        self.nodes.push(KeyNode {
            section,
            key,
            decls: Vec::new(),
        });
        id
    }

    /// Keys in order of first declaration.
    pub fn nodes(&self) -> &[KeyNode<'ast>] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &KeyNode<'ast> {
        &self.nodes[id]
    }

    /// Section names in order of first declaration.
    pub fn sections(&self) -> &[&'ast str] {
        &self.sections
    }

    pub fn find(&self, section: &str, key: &str) -> Option<usize> {
        self.index.get(section)?.get(key).copied()
    }

    pub fn variable(&self, name: &str) -> Option<usize> {
        self.variables.get(name).copied()
    }

    /// Resolve `reference` as written in section `from`.
    ///
    /// `name` is a key of `from` or else a plain word. `a.b.c` is tried as
    /// section `a` key `b`, then key `a` of `from`, then key `a` of the
    /// root section.
    pub fn lookup<'r>(&'r self, from: &str, reference: &'r Reference) -> Lookup<'r> {
        match reference {
            Reference::Variable(name) => match self.variable(name) {
                Some(node) => Lookup::Key { node, rest: &[] },
                None => Lookup::Unknown,
            },
            Reference::Path(segments) => match segments.as_slice() {
                [] => Lookup::Unknown,
                [word] => match self.find(from, word) {
                    Some(node) => Lookup::Key { node, rest: &[] },
                    None => Lookup::Word(word),
                },
                [first, second, rest @ ..] => {
                    if let Some(node) = self.find(first, second) {
                        return Lookup::Key { node, rest };
                    }
                    let nested = &segments[1..];
                    [from, ROOT_SECTION]
                        .into_iter()
                        .find_map(|section| self.find(section, first))
                        .map_or(Lookup::Unknown, |node| Lookup::Key { node, rest: nested })
                }
            },
        }
    }
}
