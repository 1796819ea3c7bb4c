//! Deduplicated string and value tables.
//!
//! Values are interned children-first, so every child index is smaller
//! than the index of the entry that refers to it. Two values with the same
//! structure share one entry, and so do two equal strings.

use rustc_hash::FxHashMap;
use tsk_ir::{Object, Value};
use tsk_stack::ensure_sufficient_stack;

use crate::error::CompileError;
use crate::format::{
    put_u32, to_u32, TAG_ARRAY, TAG_BOOL, TAG_CALL, TAG_FLOAT, TAG_INT, TAG_NULL, TAG_OBJECT,
    TAG_STRING,
};

/// One value-table entry. Indices point into the owning [`Tables`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Entry {
    Null,
    Bool(bool),
    Int(i64),
    /// Bit pattern, so that every float has exactly one entry.
    Float(u64),
    Str(u32),
    Array(Vec<u32>),
    Object(Vec<(u32, u32)>),
    Call { name: u32, args: u32 },
}

impl Entry {
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<(), CompileError> {
        match self {
            Entry::Null => out.push(TAG_NULL),
            Entry::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*b));
            }
            Entry::Int(n) => {
                out.push(TAG_INT);
                out.extend_from_slice(&n.to_le_bytes());
            }
            Entry::Float(bits) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&bits.to_le_bytes());
            }
            Entry::Str(s) => {
                out.push(TAG_STRING);
                put_u32(out, *s);
            }
            Entry::Array(items) => {
                out.push(TAG_ARRAY);
                put_u32(out, to_u32(items.len(), "array length")?);
                for &item in items {
                    put_u32(out, item);
                }
            }
            Entry::Object(fields) => {
                out.push(TAG_OBJECT);
                put_u32(out, to_u32(fields.len(), "object size")?);
                for &(key, value) in fields {
                    put_u32(out, key);
                    put_u32(out, value);
                }
            }
            Entry::Call { name, args } => {
                out.push(TAG_CALL);
                put_u32(out, *name);
                put_u32(out, *args);
            }
        }
        Ok(())
    }

    /// Translate indices through `strings` and `values`.
    fn remap(&self, strings: &[u32], values: &[u32]) -> Entry {
        let s = |i: &u32| strings[*i as usize];
        let v = |i: &u32| values[*i as usize];
        match self {
            Entry::Null | Entry::Bool(_) | Entry::Int(_) | Entry::Float(_) => self.clone(),
            Entry::Str(i) => Entry::Str(s(i)),
            Entry::Array(items) => Entry::Array(items.iter().map(v).collect()),
            Entry::Object(fields) => {
                Entry::Object(fields.iter().map(|(k, x)| (s(k), v(x))).collect())
            }
            Entry::Call { name, args } => Entry::Call {
                name: s(name),
                args: v(args),
            },
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    strings: Vec<String>,
    string_ids: FxHashMap<String, u32>,
    values: Vec<Entry>,
    value_ids: FxHashMap<Entry, u32>,
}

impl Tables {
    pub(crate) fn strings(&self) -> &[String] {
        &self.strings
    }

    pub(crate) fn values(&self) -> &[Entry] {
        &self.values
    }

    pub(crate) fn string(&mut self, s: &str) -> Result<u32, CompileError> {
        if let Some(&id) = self.string_ids.get(s) {
            return Ok(id);
        }
        let id = to_u32(self.strings.len(), "string table")?;
        self.strings.push(s.to_owned());
        self.string_ids.insert(s.to_owned(), id);
        Ok(id)
    }

    fn entry(&mut self, entry: Entry) -> Result<u32, CompileError> {
        if let Some(&id) = self.value_ids.get(&entry) {
            return Ok(id);
        }
        let id = to_u32(self.values.len(), "value table")?;
        self.values.push(entry.clone());
        self.value_ids.insert(entry, id);
        Ok(id)
    }

    pub(crate) fn value(&mut self, value: &Value) -> Result<u32, CompileError> {
        ensure_sufficient_stack(|| {
            let entry = match value {
                Value::Null => Entry::Null,
                Value::Bool(b) => Entry::Bool(*b),
                Value::Int(n) => Entry::Int(*n),
                Value::Float(x) => Entry::Float(x.to_bits()),
                Value::String(s) => Entry::Str(self.string(s)?),
                Value::Array(items) => Entry::Array(
                    items
                        .iter()
                        .map(|item| self.value(item))
                        .collect::<Result<_, _>>()?,
                ),
                Value::Object(map) => self.object(map)?,
                Value::OperatorCall(call) => {
                    let name = self.string(&call.name)?;
                    let object = self.object(&call.args)?;
                    let args = self.entry(object)?;
                    Entry::Call { name, args }
                }
            };
            self.entry(entry)
        })
    }

    fn object(&mut self, map: &Object) -> Result<Entry, CompileError> {
        let mut fields = Vec::with_capacity(map.len());
        for (key, value) in map {
            let key = self.string(key)?;
            fields.push((key, self.value(value)?));
        }
        Ok(Entry::Object(fields))
    }

    /// Intern everything in `other` into `self`.
    ///
    /// Returns the new index of each of `other`'s strings and values.
    /// Absorbing the same sequence of tables always yields the same result,
    /// whichever thread built them.
    pub(crate) fn absorb(&mut self, other: &Tables) -> Result<(Vec<u32>, Vec<u32>), CompileError> {
        let strings = other
            .strings
            .iter()
            .map(|s| self.string(s))
            .collect::<Result<Vec<_>, _>>()?;
        let mut values = Vec::with_capacity(other.values.len());
        for entry in &other.values {
            let id = self.entry(entry.remap(&strings, &values))?;
            values.push(id);
        }
        Ok((strings, values))
    }
}

#[cfg(test)]
mod tests {
    use tsk_ir::OperatorCall;

    use super::*;

    #[test]
    fn repeated_values_share_entries() {
        let mut tables = Tables::default();
        let a = tables.value(&Value::from("localhost")).unwrap_or(u32::MAX);
        let b = tables.value(&Value::from("localhost")).unwrap_or(u32::MAX);
        assert_eq!(a, b);
        assert_eq!(tables.strings().len(), 1);
        assert_eq!(tables.values().len(), 1);
    }

    #[test]
    fn children_precede_parents() {
        let mut tables = Tables::default();
        let mut args = Object::new();
        args.insert("name".into(), Value::from("X"));
        let call = Value::OperatorCall(OperatorCall::new("env", args));
        let nested = Value::Array(vec![call, Value::Array(vec![Value::Int(1)])]);
        assert!(tables.value(&nested).is_ok());
        for (index, entry) in tables.values().iter().enumerate() {
            let children: Vec<u32> = match entry {
                Entry::Array(items) => items.clone(),
                Entry::Object(fields) => fields.iter().map(|&(_, v)| v).collect(),
                Entry::Call { args, .. } => vec![*args],
                _ => Vec::new(),
            };
            assert!(children.iter().all(|&c| (c as usize) < index), "{entry:?}");
        }
    }

    #[test]
    fn floats_with_different_bits_stay_distinct() {
        let mut tables = Tables::default();
        let pos = tables.value(&Value::Float(0.0)).unwrap_or(u32::MAX);
        let neg = tables.value(&Value::Float(-0.0)).unwrap_or(u32::MAX);
        assert_ne!(pos, neg);
    }

    #[test]
    fn absorb_merges_shared_entries() {
        let mut first = Tables::default();
        let mut second = Tables::default();
        assert!(first.value(&Value::from("a")).is_ok());
        assert!(second.value(&Value::from("b")).is_ok());
        assert!(second.value(&Value::from("a")).is_ok());

        let mut global = Tables::default();
        assert!(global.absorb(&first).is_ok());
        let (strings, values) = global.absorb(&second).unwrap_or_default();
        assert_eq!(strings, vec![1, 0]);
        assert_eq!(values, vec![1, 0]);
        assert_eq!(global.strings(), ["a".to_owned(), "b".to_owned()]);
    }
}
