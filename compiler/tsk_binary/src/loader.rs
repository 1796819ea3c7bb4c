//! Memory-mapped access to `.pnt` artifacts.
//!
//! Opening an artifact validates the header and body checksum, scans the
//! table and section index boundaries, and sizes every value-table entry.
//! Section payloads are decoded the first time a key of that section is
//! read and kept for the life of the handle. Dotted lookups that find a
//! value are cached separately so repeated reads of the same key skip the
//! path walk.
//!
//! Value entries may share children, so a small table can describe a huge
//! tree. Every entry's expanded size is known after opening, and decoding
//! stops with [`LoadError::Corruption`] once a handle would materialize
//! more nodes than its budget allows.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use dashmap::DashMap;
use flate2::read::DeflateDecoder;
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use tracing::debug;
use tsk_ir::{ConfigTree, ConfigTreeBuilder, Object, OperatorCall, TreeSection, Value};
use tsk_stack::ensure_sufficient_stack;

use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::format::{
    ByteReader, Compression, Header, HEADER_LEN, TAG_ARRAY, TAG_BOOL, TAG_CALL, TAG_FLOAT,
    TAG_INT, TAG_NULL, TAG_OBJECT, TAG_STRING,
};

/// Nodes any artifact may expand to, however small.
const MIN_NODE_BUDGET: u64 = 1 << 22;

/// Further nodes allowed per body byte.
const NODES_PER_BODY_BYTE: u64 = 1024;

/// Cached dotted lookups per handle.
const FLAT_CACHE_LIMIT: usize = 1 << 16;

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => map,
            Backing::Owned(bytes) => bytes,
        }
    }
}

/// Byte range inside the body.
#[derive(Copy, Clone, Debug)]
struct Slot {
    start: usize,
    end: usize,
}

struct SectionSlot {
    name: String,
    payload: Slot,
    /// A one-section tree, or the reason the payload could not be decoded.
    decoded: OnceLock<Result<ConfigTree, String>>,
}

/// A loaded artifact. Cheap to share between threads behind an `Arc`.
pub struct LoadedConfig {
    backing: Backing,
    body_start: usize,
    header: Header,
    strings: Vec<Slot>,
    values: Vec<Slot>,
    /// Expanded node count of each value entry.
    weights: Vec<u64>,
    node_budget: u64,
    decoded_nodes: AtomicU64,
    sections: Vec<SectionSlot>,
    by_name: FxHashMap<String, usize>,
    flat: DashMap<String, Value>,
}

#[allow(unsafe_code)]
fn map_file(file: &File) -> std::io::Result<Mmap> {
    // SAFETY: artifacts are only ever replaced by renaming a new file over
    // the old path, never modified in place, so the mapped inode stays
    // unchanged for the lifetime of the mapping.
    unsafe { Mmap::map(file) }
}

impl LoadedConfig {
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        Self::open_with(path, &CancelToken::new())
    }

    pub fn open_with(path: &Path, cancel: &CancelToken) -> Result<Self, LoadError> {
        cancel.check()?;
        let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
        let map = map_file(&file).map_err(|e| LoadError::io(path, e))?;
        let loaded = Self::from_backing(Backing::Mapped(map), cancel)?;
        debug!(
            path = %path.display(),
            sections = loaded.sections.len(),
            compression = %loaded.header.compression,
            "opened artifact"
        );
        Ok(loaded)
    }

    /// Load from bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LoadError> {
        Self::from_backing(Backing::Owned(bytes), &CancelToken::new())
    }

    fn from_backing(backing: Backing, cancel: &CancelToken) -> Result<Self, LoadError> {
        let header = Header::decode(backing.bytes())?;
        header.verify(&backing.bytes()[HEADER_LEN..])?;
        let inflated = match header.compression {
            Compression::None => None,
            Compression::Deflate => {
                let mut out = Vec::new();
                DeflateDecoder::new(&backing.bytes()[HEADER_LEN..])
                    .read_to_end(&mut out)
                    .map_err(|e| LoadError::corruption(format!("bad deflate stream: {e}")))?;
                Some(out)
            }
        };
        let (backing, body_start) = match inflated {
            Some(body) => (Backing::Owned(body), 0),
            None => (backing, HEADER_LEN),
        };

        let body = &backing.bytes()[body_start..];
        let mut reader = ByteReader::new(body);
        let strings = scan_table(&mut reader, "string")?;
        cancel.check()?;
        let values = scan_table(&mut reader, "value")?;
        cancel.check()?;
        let node_budget = u64::try_from(body.len())
            .unwrap_or(u64::MAX)
            .saturating_mul(NODES_PER_BODY_BYTE)
            .max(MIN_NODE_BUDGET);
        let weights = value_weights(body, &values, node_budget)?;
        cancel.check()?;

        let count = reader.u32("section count")?;
        let mut index = Vec::new();
        for _ in 0..count {
            let name = reader.u32("section name")?;
            let offset = reader.u32("section offset")? as usize;
            let len = reader.u32("section length")? as usize;
            index.push((name, offset, len));
        }
        let payload_base = reader.position();

        let mut sections = Vec::with_capacity(index.len());
        let mut by_name = FxHashMap::default();
        for (name, offset, len) in index {
            let name = decode_string(body, &strings, name)?.to_owned();
            let payload = payload_slot(payload_base, offset, len, body.len()).ok_or_else(|| {
                LoadError::corruption(format!("section `{name}` payload out of bounds"))
            })?;
            if by_name.insert(name.clone(), sections.len()).is_some() {
                return Err(LoadError::corruption(format!("duplicate section `{name}`")));
            }
            sections.push(SectionSlot {
                name,
                payload,
                decoded: OnceLock::new(),
            });
        }

        Ok(LoadedConfig {
            backing,
            body_start,
            header,
            strings,
            values,
            weights,
            node_budget,
            decoded_nodes: AtomicU64::new(0),
            sections,
            by_name,
            flat: DashMap::new(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// True when the body is read straight from the mapped file.
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections whose payload has been decoded so far.
    pub fn decoded_sections(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.decoded.get().is_some())
            .count()
    }

    /// Raw bytes of each string-table entry.
    pub fn string_table(&self) -> impl Iterator<Item = &[u8]> {
        let body = self.body();
        self.strings.iter().map(move |s| &body[s.start..s.end])
    }

    /// Raw bytes of each value-table entry.
    pub fn value_table(&self) -> impl Iterator<Item = &[u8]> {
        let body = self.body();
        self.values.iter().map(move |s| &body[s.start..s.end])
    }

    fn body(&self) -> &[u8] {
        &self.backing.bytes()[self.body_start..]
    }

    pub fn section(&self, name: &str) -> Result<Option<&TreeSection>, LoadError> {
        match self.by_name.get(name) {
            Some(&i) => Ok(self.section_tree(i)?.section(name)),
            None => Ok(None),
        }
    }

    fn section_tree(&self, i: usize) -> Result<&ConfigTree, LoadError> {
        let slot = &self.sections[i];
        slot.decoded
            .get_or_init(|| {
                self.decode_section(slot).map_err(|e| match e {
                    LoadError::Corruption { detail } => detail,
                    other => other.to_string(),
                })
            })
            .as_ref()
            .map_err(|detail| LoadError::Corruption {
                detail: detail.clone(),
            })
    }

    /// Look up a dotted key the way [`ConfigTree::get`] does.
    pub fn get(&self, dotted: &str) -> Result<Option<Value>, LoadError> {
        if let Some(hit) = self.flat.get(dotted) {
            return Ok(Some(hit.value().clone()));
        }
        let segments: Vec<&str> = dotted.split('.').collect();
        let found = self.lookup(&segments)?;
        if let Some(value) = &found {
            if self.flat.len() < FLAT_CACHE_LIMIT {
                self.flat.insert(dotted.to_owned(), value.clone());
            }
        }
        Ok(found)
    }

    #[cfg(test)]
    pub(crate) fn cached_lookups(&self) -> usize {
        self.flat.len()
    }

    fn lookup(&self, segments: &[&str]) -> Result<Option<Value>, LoadError> {
        let root = |path: &[&str]| -> Result<Option<Value>, LoadError> {
            let Some((first, rest)) = path.split_first() else {
                return Ok(None);
            };
            Ok(self
                .section("")?
                .and_then(|s| s.get(first))
                .and_then(|v| v.get_path(rest))
                .cloned())
        };
        match segments {
            [] | [_] => root(segments),
            [first, key, rest @ ..] => {
                if let Some(value) = self.section(first)?.and_then(|s| s.get(key)) {
                    return Ok(value.get_path(rest).cloned());
                }
                root(segments)
            }
        }
    }

    /// Decode every section into an owned tree.
    pub fn to_tree(&self) -> Result<ConfigTree, LoadError> {
        self.to_tree_with(&CancelToken::new())
    }

    pub fn to_tree_with(&self, cancel: &CancelToken) -> Result<ConfigTree, LoadError> {
        let mut builder = ConfigTreeBuilder::new();
        for (i, slot) in self.sections.iter().enumerate() {
            cancel.check()?;
            builder.ensure_section(&slot.name);
            if let Some(section) = self.section_tree(i)?.section(&slot.name) {
                for (key, value) in section.iter() {
                    builder.set(&slot.name, key, value.clone());
                }
            }
        }
        Ok(builder.finish())
    }

    fn decode_section(&self, slot: &SectionSlot) -> Result<ConfigTree, LoadError> {
        let body = self.body();
        let payload = &body[slot.payload.start..slot.payload.end];
        self.charge(slot, payload)?;
        let mut reader = ByteReader::new(payload);
        let count = reader.u32("section size")?;
        let mut builder = ConfigTreeBuilder::new();
        builder.ensure_section(&slot.name);
        for _ in 0..count {
            let key = reader.u32("key")?;
            let value = reader.u32("value")?;
            let key = decode_string(body, &self.strings, key)?;
            builder.set(&slot.name, key, self.decode_value(value)?);
        }
        if !reader.is_at_end() {
            return Err(LoadError::corruption(format!(
                "trailing bytes in section `{}`",
                slot.name
            )));
        }
        Ok(builder.finish())
    }

    /// Count the nodes `payload` will produce against the handle's budget.
    fn charge(&self, slot: &SectionSlot, payload: &[u8]) -> Result<(), LoadError> {
        let mut reader = ByteReader::new(payload);
        let count = reader.u32("section size")?;
        let mut nodes = 0u64;
        for _ in 0..count {
            reader.u32("key")?;
            let value = reader.u32("value")?;
            let weight = self.weights.get(value as usize).ok_or_else(|| {
                LoadError::corruption(format!("value index {value} out of bounds"))
            })?;
            nodes = nodes.saturating_add(*weight);
        }
        let before = self.decoded_nodes.fetch_add(nodes, Ordering::Relaxed);
        if before.saturating_add(nodes) > self.node_budget {
            return Err(LoadError::corruption(format!(
                "section `{}` expands past {} nodes",
                slot.name, self.node_budget
            )));
        }
        Ok(())
    }

    fn string(&self, index: u32) -> Result<&str, LoadError> {
        decode_string(self.body(), &self.strings, index)
    }

    /// Children precede their parents; [`value_weights`] checked that.
    fn child(&self, parent: u32, child: u32) -> Result<Value, LoadError> {
        if child >= parent {
            return Err(forward_reference(parent, child));
        }
        self.decode_value(child)
    }

    fn decode_value(&self, index: u32) -> Result<Value, LoadError> {
        let slot = self.values.get(index as usize).ok_or_else(|| {
            LoadError::corruption(format!("value index {index} out of bounds"))
        })?;
        let mut reader = ByteReader::new(&self.body()[slot.start..slot.end]);
        let value = ensure_sufficient_stack(|| -> Result<Value, LoadError> {
            Ok(match reader.u8("value tag")? {
                TAG_NULL => Value::Null,
                TAG_BOOL => match reader.u8("bool")? {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    b => return Err(LoadError::corruption(format!("bool byte {b}"))),
                },
                TAG_INT => Value::Int(reader.i64("int")?),
                TAG_FLOAT => Value::Float(f64::from_bits(reader.u64("float")?)),
                TAG_STRING => Value::String(self.string(reader.u32("string")?)?.to_owned()),
                TAG_ARRAY => {
                    let len = reader.u32("array length")?;
                    let mut items = Vec::new();
                    for _ in 0..len {
                        items.push(self.child(index, reader.u32("array item")?)?);
                    }
                    Value::Array(items)
                }
                TAG_OBJECT => Value::Object(self.decode_fields(index, &mut reader)?),
                TAG_CALL => {
                    let name = self.string(reader.u32("operator name")?)?.to_owned();
                    let args = match self.child(index, reader.u32("operator args")?)? {
                        Value::Object(args) => args,
                        other => {
                            return Err(LoadError::corruption(format!(
                                "operator `{name}` has {} arguments",
                                other.type_name()
                            )))
                        }
                    };
                    Value::OperatorCall(OperatorCall::new(name, args))
                }
                tag => return Err(LoadError::corruption(format!("unknown value tag {tag}"))),
            })
        })?;
        if !reader.is_at_end() {
            return Err(LoadError::corruption(format!(
                "trailing bytes in value {index}"
            )));
        }
        Ok(value)
    }

    fn decode_fields(&self, index: u32, reader: &mut ByteReader<'_>) -> Result<Object, LoadError> {
        let len = reader.u32("object size")?;
        let mut object = Object::new();
        for _ in 0..len {
            let key = self.string(reader.u32("field key")?)?.to_owned();
            let value = self.child(index, reader.u32("field value")?)?;
            object.insert(key, value);
        }
        Ok(object)
    }
}

/// Payload range of an index entry, if it lies inside the body.
fn payload_slot(base: usize, offset: usize, len: usize, body_len: usize) -> Option<Slot> {
    let start = base.checked_add(offset)?;
    let end = start.checked_add(len).filter(|&end| end <= body_len)?;
    Some(Slot { start, end })
}

#[cold]
fn forward_reference(parent: u32, child: u32) -> LoadError {
    LoadError::corruption(format!("value {parent} refers forward to {child}"))
}

/// Expanded node count of every value entry, checking that each child
/// precedes its parent and that no entry expands past `budget`.
fn value_weights(body: &[u8], values: &[Slot], budget: u64) -> Result<Vec<u64>, LoadError> {
    let mut weights: Vec<u64> = Vec::with_capacity(values.len());
    for (index, slot) in values.iter().enumerate() {
        let parent = u32::try_from(index).unwrap_or(u32::MAX);
        let mut weight = 1u64;
        for child in value_children(&body[slot.start..slot.end])? {
            let child_weight = weights
                .get(child as usize)
                .ok_or_else(|| forward_reference(parent, child))?;
            weight = weight.saturating_add(*child_weight);
        }
        if weight > budget {
            return Err(LoadError::corruption(format!(
                "value {index} expands past {budget} nodes"
            )));
        }
        weights.push(weight);
    }
    Ok(weights)
}

/// Value-table indices referenced by one encoded entry.
fn value_children(entry: &[u8]) -> Result<Vec<u32>, LoadError> {
    let mut reader = ByteReader::new(entry);
    let mut children = Vec::new();
    match reader.u8("value tag")? {
        TAG_ARRAY => {
            for _ in 0..reader.u32("array length")? {
                children.push(reader.u32("array item")?);
            }
        }
        TAG_OBJECT => {
            for _ in 0..reader.u32("object size")? {
                reader.u32("field key")?;
                children.push(reader.u32("field value")?);
            }
        }
        TAG_CALL => {
            reader.u32("operator name")?;
            children.push(reader.u32("operator args")?);
        }
        _ => {}
    }
    Ok(children)
}

/// Read a `count, (len, bytes)*` table, recording where each entry lives.
fn scan_table(reader: &mut ByteReader<'_>, what: &str) -> Result<Vec<Slot>, LoadError> {
    let count = reader.u32(&format!("{what} table size"))?;
    let mut slots = Vec::new();
    for _ in 0..count {
        let len = reader.u32(&format!("{what} length"))? as usize;
        let start = reader.position();
        reader.take(len, &format!("{what} entry"))?;
        slots.push(Slot {
            start,
            end: start + len,
        });
    }
    Ok(slots)
}

fn decode_string<'b>(body: &'b [u8], strings: &[Slot], index: u32) -> Result<&'b str, LoadError> {
    let slot = strings
        .get(index as usize)
        .ok_or_else(|| LoadError::corruption(format!("string index {index} out of bounds")))?;
    std::str::from_utf8(&body[slot.start..slot.end])
        .map_err(|_| LoadError::corruption(format!("string {index} is not UTF-8")))
}

/// Open the artifact at `path` and decode all of it.
pub fn load(path: &Path) -> Result<ConfigTree, LoadError> {
    load_with(path, &CancelToken::new())
}

pub fn load_with(path: &Path, cancel: &CancelToken) -> Result<ConfigTree, LoadError> {
    LoadedConfig::open_with(path, cancel)?.to_tree_with(cancel)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
