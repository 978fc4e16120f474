//! Pipeline config document.
//!
//! The document is a YAML mapping. Blocks carrying `kotekan_buffer`,
//! `kotekan_metadata_pool` or `kotekan_process` declare pipeline objects;
//! any other nested mapping is a plain group whose scalar values are
//! inherited by the blocks below it.
//!
//! Values are looked up from the block itself up through its parents to the
//! root. A string value naming a root key resolves to that key's value, so
//! `num_frames: buffer_depth` reads the global `buffer_depth`.

use std::fmt;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::SimError;

/// Location of a block in the document, e.g. `/group/fakevis0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPath(Vec<String>);

impl BlockPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, name: &str) -> Self {
        let mut parts = self.0.clone();
        parts.push(name.to_owned());
        Self(parts)
    }

    /// Last path component; buffers are referenced by this name.
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for part in &self.0 {
            write!(f, "/{part}")?;
        }
        Ok(())
    }
}

/// What a block declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Buffer(String),
    MetadataPool(String),
    Process(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub path: BlockPath,
    pub kind: BlockKind,
}

/// Parsed config document.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    root: Mapping,
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(yaml: &str) -> Result<Self, SimError> {
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|e| SimError::Document(e.to_string()))?;
        match value {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self {
                root: Mapping::new(),
            }),
            _ => Err(SimError::Document(
                "document root must be a mapping".to_owned(),
            )),
        }
    }

    /// All declared blocks in document order.
    pub fn blocks(&self) -> Result<Vec<Block>, SimError> {
        let mut out = Vec::new();
        collect_blocks(&self.root, &BlockPath::root(), &mut out)?;
        Ok(out)
    }

    fn mapping_at(&self, parts: &[String]) -> Option<&Mapping> {
        let mut current = &self.root;
        for part in parts {
            current = current.get(part.as_str())?.as_mapping()?;
        }
        Some(current)
    }

    /// Whether `key` is set on the block itself (not inherited).
    pub fn has_local(&self, path: &BlockPath, key: &str) -> bool {
        self.mapping_at(path.parts())
            .is_some_and(|m| m.contains_key(key))
    }

    /// Raw lookup walking from the block up to the root.
    pub fn lookup(&self, path: &BlockPath, key: &str) -> Option<&Value> {
        let parts = path.parts();
        (0..=parts.len())
            .rev()
            .filter_map(|depth| self.mapping_at(&parts[..depth]))
            .find_map(|m| m.get(key))
    }

    /// Lookup with root-key indirection applied.
    pub fn lookup_resolved(&self, path: &BlockPath, key: &str) -> Option<&Value> {
        self.lookup(path, key).map(|v| self.resolve(v))
    }

    fn resolve<'a>(&'a self, value: &'a Value) -> &'a Value {
        if let Value::String(name) = value {
            if let Some(target) = self.root.get(name.as_str()) {
                if !target.is_mapping() {
                    return target;
                }
            }
        }
        value
    }

    pub fn get_u64(&self, path: &BlockPath, key: &str) -> Result<u64, SimError> {
        let value = self.require(path, key)?;
        value
            .as_u64()
            .ok_or_else(|| type_error(path, key, "a non-negative integer", value))
    }

    pub fn get_u64_or(&self, path: &BlockPath, key: &str, default: u64) -> Result<u64, SimError> {
        match self.lookup_resolved(path, key) {
            Some(_) => self.get_u64(path, key),
            None => Ok(default),
        }
    }

    pub fn get_f64(&self, path: &BlockPath, key: &str) -> Result<f64, SimError> {
        let value = self.require(path, key)?;
        value
            .as_f64()
            .ok_or_else(|| type_error(path, key, "a number", value))
    }

    pub fn get_f64_or(&self, path: &BlockPath, key: &str, default: f64) -> Result<f64, SimError> {
        match self.lookup_resolved(path, key) {
            Some(_) => self.get_f64(path, key),
            None => Ok(default),
        }
    }

    pub fn get_bool_or(&self, path: &BlockPath, key: &str, default: bool) -> Result<bool, SimError> {
        match self.lookup_resolved(path, key) {
            Some(value) => value
                .as_bool()
                .ok_or_else(|| type_error(path, key, "a boolean", value)),
            None => Ok(default),
        }
    }

    /// String lookup; string values are never resolved through root keys.
    pub fn get_string(&self, path: &BlockPath, key: &str) -> Result<String, SimError> {
        let value = self
            .lookup(path, key)
            .ok_or_else(|| SimError::config(path.to_string(), key, "required key is missing"))?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| type_error(path, key, "a string", value))
    }

    pub fn get_string_or(
        &self,
        path: &BlockPath,
        key: &str,
        default: &str,
    ) -> Result<String, SimError> {
        match self.lookup(path, key) {
            Some(_) => self.get_string(path, key),
            None => Ok(default.to_owned()),
        }
    }

    pub fn get_string_list(&self, path: &BlockPath, key: &str) -> Result<Vec<String>, SimError> {
        let value = self.require(path, key)?;
        let seq = value
            .as_sequence()
            .ok_or_else(|| type_error(path, key, "a list of strings", value))?;
        seq.iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| type_error(path, key, "a list of strings", value))
            })
            .collect()
    }

    pub fn get_u32_list_or(
        &self,
        path: &BlockPath,
        key: &str,
        default: Vec<u32>,
    ) -> Result<Vec<u32>, SimError> {
        let Some(value) = self.lookup_resolved(path, key) else {
            return Ok(default);
        };
        let seq = value
            .as_sequence()
            .ok_or_else(|| type_error(path, key, "a list of integers", value))?;
        seq.iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| type_error(path, key, "a list of 32-bit integers", value))
            })
            .collect()
    }

    fn require(&self, path: &BlockPath, key: &str) -> Result<&Value, SimError> {
        self.lookup_resolved(path, key)
            .ok_or_else(|| SimError::config(path.to_string(), key, "required key is missing"))
    }
}

fn type_error(path: &BlockPath, key: &str, expected: &str, found: &Value) -> SimError {
    let found = serde_yaml::to_string(found)
        .map(|s| s.trim_end().to_owned())
        .unwrap_or_else(|_| "?".to_owned());
    SimError::config(path.to_string(), key, format!("expected {expected}, found {found}"))
}

fn collect_blocks(map: &Mapping, path: &BlockPath, out: &mut Vec<Block>) -> Result<(), SimError> {
    for (key, value) in map {
        let Value::Mapping(child) = value else {
            continue;
        };
        let name = key.as_str().ok_or_else(|| {
            SimError::Document(format!("non-string block name under '{path}'"))
        })?;
        let child_path = path.child(name);

        let kind = [
            ("kotekan_buffer", BlockKind::Buffer as fn(String) -> BlockKind),
            ("kotekan_metadata_pool", BlockKind::MetadataPool),
            ("kotekan_process", BlockKind::Process),
        ]
        .into_iter()
        .find_map(|(tag, make)| child.get(tag).map(|v| (tag, make, v)));

        match kind {
            Some((tag, make, v)) => {
                let kind_name = v.as_str().ok_or_else(|| {
                    SimError::config(child_path.to_string(), tag, "expected a string")
                })?;
                out.push(Block {
                    path: child_path,
                    kind: make(kind_name.to_owned()),
                });
            }
            None => collect_blocks(child, &child_path, out)?,
        }
    }
    Ok(())
}
