//! Serialization of configuration trees into `.pnt` bytes.
//!
//! Each section is interned into its own [`Tables`]. Large trees do this on
//! the rayon pool. The per-section tables are then absorbed into the shared
//! tables strictly in section order, so parallel and sequential builds
//! produce the same bytes.

use std::io::Write;
use std::time::Duration;

use flate2::write::DeflateEncoder;
use rayon::prelude::*;
use tracing::{debug, trace};
use tsk_ir::{
    AssignOp, Config, ConfigTree, ConfigTreeBuilder, Node, NodeKind, Object, OperatorCall,
    TreeSection, Value,
};
use tsk_stack::ensure_sufficient_stack;

use crate::cancel::CancelToken;
use crate::error::CompileError;
use crate::format::{
    body_checksum, put_u32, to_u32, Compression, Fingerprint, Header, HEADER_LEN,
};
use crate::intern::Tables;

#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub compression: Compression,
    /// Identity of the source, copied into the header.
    pub fingerprint: Fingerprint,
    /// Sections are interned in parallel above this count.
    pub parallel_threshold: usize,
    pub cancel: CancelToken,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            compression: Compression::None,
            fingerprint: Fingerprint::default(),
            parallel_threshold: 32,
            cancel: CancelToken::new(),
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    #[must_use]
    pub fn with_parallel_threshold(mut self, sections: usize) -> Self {
        self.parallel_threshold = sections;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.cancel = self.cancel.with_timeout(timeout);
        self
    }
}

/// One section interned against its own tables.
struct SectionUnit {
    name: u32,
    entries: Vec<(u32, u32)>,
    tables: Tables,
}

fn intern_section(section: &TreeSection, cancel: &CancelToken) -> Result<SectionUnit, CompileError> {
    cancel.check()?;
    let mut tables = Tables::default();
    let name = tables.string(section.name())?;
    let mut entries = Vec::with_capacity(section.len());
    for (key, value) in section.iter() {
        let key = tables.string(key)?;
        entries.push((key, tables.value(value)?));
    }
    Ok(SectionUnit {
        name,
        entries,
        tables,
    })
}

/// Compile `tree` into artifact bytes.
///
/// Body layout after the header:
///
/// - string table: `count u32`, then `len u32` + UTF-8 bytes per string
/// - value table: `count u32`, then `len u32` + entry per value, where an
///   entry is a tag byte and a payload whose value references all point
///   to earlier entries
/// - section index: `count u32`, then `name u32, offset u32, len u32` per
///   section, offsets relative to the start of the payload region
/// - section payloads: `count u32`, then `key u32, value u32` per key
///
/// Identical trees and options always yield identical bytes.
pub fn compile(tree: &ConfigTree, options: &CompileOptions) -> Result<Vec<u8>, CompileError> {
    let cancel = &options.cancel;
    let sections: Vec<&TreeSection> = tree.sections().collect();
    let parallel = sections.len() > options.parallel_threshold;
    let units: Vec<SectionUnit> = if parallel {
        sections
            .par_iter()
            .map(|section| intern_section(section, cancel))
            .collect::<Result<_, _>>()?
    } else {
        sections
            .iter()
            .map(|section| intern_section(section, cancel))
            .collect::<Result<_, _>>()?
    };

    let mut tables = Tables::default();
    let mut index = Vec::with_capacity(units.len());
    let mut payloads = Vec::new();
    for unit in &units {
        cancel.check()?;
        let (strings, values) = tables.absorb(&unit.tables)?;
        let offset = payloads.len();
        put_u32(&mut payloads, to_u32(unit.entries.len(), "section size")?);
        for &(key, value) in &unit.entries {
            put_u32(&mut payloads, strings[key as usize]);
            put_u32(&mut payloads, values[value as usize]);
        }
        index.push((
            strings[unit.name as usize],
            to_u32(offset, "payload region")?,
            to_u32(payloads.len() - offset, "section payload")?,
        ));
        trace!(keys = unit.entries.len(), "section encoded");
    }

    let body = encode_body(&tables, &index, &payloads)?;
    let stored = match options.compression {
        Compression::None => body,
        Compression::Deflate => {
            let mut encoder = DeflateEncoder::new(
                Vec::with_capacity(body.len() / 2),
                flate2::Compression::default(),
            );
            encoder
                .write_all(&body)
                .map_err(|e| CompileError::io("compressing artifact", e))?;
            encoder
                .finish()
                .map_err(|e| CompileError::io("compressing artifact", e))?
        }
    };
    let header = Header::new(options.compression, options.fingerprint, body_checksum(&stored));
    let mut out = Vec::with_capacity(HEADER_LEN + stored.len());
    header.encode(&mut out);
    out.extend_from_slice(&stored);
    debug!(
        sections = units.len(),
        strings = tables.strings().len(),
        values = tables.values().len(),
        parallel,
        compression = %options.compression,
        bytes = out.len(),
        "compiled artifact"
    );
    Ok(out)
}

fn encode_body(
    tables: &Tables,
    index: &[(u32, u32, u32)],
    payloads: &[u8],
) -> Result<Vec<u8>, CompileError> {
    let mut body = Vec::new();
    put_u32(&mut body, to_u32(tables.strings().len(), "string table")?);
    for s in tables.strings() {
        put_u32(&mut body, to_u32(s.len(), "string")?);
        body.extend_from_slice(s.as_bytes());
    }

    put_u32(&mut body, to_u32(tables.values().len(), "value table")?);
    let mut entry = Vec::new();
    for value in tables.values() {
        entry.clear();
        value.encode(&mut entry)?;
        put_u32(&mut body, to_u32(entry.len(), "value entry")?);
        body.extend_from_slice(&entry);
    }

    put_u32(&mut body, to_u32(index.len(), "section index")?);
    for &(name, offset, len) in index {
        put_u32(&mut body, name);
        put_u32(&mut body, offset);
        put_u32(&mut body, len);
    }
    body.extend_from_slice(payloads);
    to_u32(body.len(), "artifact")?;
    Ok(body)
}

/// Compile a syntax tree without resolving it.
///
/// Repeated sections merge key by key and `+=` merges values, as in
/// resolution. Operator calls are stored unevaluated with positional
/// arguments keyed by index. References need resolution and are rejected.
pub fn compile_ast(config: &Config, options: &CompileOptions) -> Result<Vec<u8>, CompileError> {
    let mut builder = ConfigTreeBuilder::new();
    for section in &config.sections {
        options.cancel.check()?;
        builder.ensure_section(&section.name);
        for entry in &section.entries {
            let location = if section.name.is_empty() {
                entry.key.clone()
            } else {
                format!("{}.{}", section.name, entry.key)
            };
            let value = lower(&entry.value, &location)?;
            match entry.op {
                AssignOp::Set => builder.set(&section.name, &entry.key, value),
                AssignOp::Merge => builder.merge(&section.name, &entry.key, value),
            };
        }
    }
    compile(&builder.finish(), options)
}

fn lower(node: &Node, location: &str) -> Result<Value, CompileError> {
    ensure_sufficient_stack(|| match &node.kind {
        NodeKind::Literal(value) => Ok(value.clone()),
        NodeKind::Array(items) => items
            .iter()
            .map(|item| lower(item, location))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        NodeKind::Object(fields) => {
            let mut object = Object::new();
            for field in fields {
                object.insert(field.key.clone(), lower(&field.value, location)?);
            }
            Ok(Value::Object(object))
        }
        NodeKind::Range { min, max } => {
            let mut object = Object::new();
            object.insert("min".to_owned(), Value::Int(*min));
            object.insert("max".to_owned(), Value::Int(*max));
            object.insert("type".to_owned(), Value::from("range"));
            Ok(Value::Object(object))
        }
        NodeKind::Reference(_) => Err(CompileError::Unsupported {
            shape: "reference",
            location: location.to_owned(),
        }),
        NodeKind::OperatorCall(call) => {
            let mut args = Object::new();
            for (i, arg) in call.args.iter().enumerate() {
                let key = arg.name.clone().unwrap_or_else(|| i.to_string());
                args.insert(key, lower(&arg.value, location)?);
            }
            Ok(Value::OperatorCall(OperatorCall::new(&call.name, args)))
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
