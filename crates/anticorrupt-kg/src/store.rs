//! Record store: YAML files grouped by kind under one data directory.
//!
//! ```text
//! <data>/institutions/stf.yaml       one record (mapping)
//! <data>/relationships/core.yaml     `relationships:` list, or a bare sequence
//! <data>/glossary/terms.yaml         `terms:` list
//! ```
//!
//! Parsing stops at `serde_yaml::Value`; shapes are checked by the validator.
//! A bad file becomes a [`ParseError`] and the load carries on.

use anticorrupt_core::{is_valid_id, Entity, EntityKind, Error, Result};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One record as read from disk, not yet shape-checked.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub kind: EntityKind,
    pub source: PathBuf,
    /// Position within a multi-record file.
    pub index: usize,
    pub value: Value,
}

impl RawRecord {
    /// The `id` field, if present and a string.
    pub fn raw_id(&self) -> Option<&str> {
        self.value.get("id").and_then(Value::as_str)
    }
}

/// A file that could not be read or parsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub kind: EntityKind,
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for ParseError {}

/// Everything read for one kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KindLoad {
    pub records: Vec<RawRecord>,
    pub parse_errors: Vec<ParseError>,
    pub files: usize,
    /// The kind directory does not exist.
    pub missing: bool,
}

/// Result of [`RecordStore::load_all`], keyed by kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedRecords {
    pub kinds: BTreeMap<EntityKind, KindLoad>,
}

impl LoadedRecords {
    pub fn insert(&mut self, kind: EntityKind, load: KindLoad) {
        self.kinds.insert(kind, load);
    }

    pub fn records(&self, kind: EntityKind) -> &[RawRecord] {
        self.kinds.get(&kind).map(|l| l.records.as_slice()).unwrap_or(&[])
    }

    pub fn parse_errors(&self) -> impl Iterator<Item = &ParseError> {
        self.kinds.values().flat_map(|l| l.parse_errors.iter())
    }

    pub fn missing_kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.kinds.iter().filter(|(_, l)| l.missing).map(|(k, _)| *k)
    }

    pub fn record_count(&self) -> usize {
        self.kinds.values().map(|l| l.records.len()).sum()
    }

    pub fn file_count(&self) -> usize {
        self.kinds.values().map(|l| l.files).sum()
    }
}

/// File-backed store rooted at a data directory.
#[derive(Clone, Debug)]
pub struct RecordStore {
    root: PathBuf,
    extensions: Vec<String>,
}

impl RecordStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: vec!["yaml".into(), "yml".into()],
        }
    }

    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: EntityKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Lazy sequence of the kind's records in file-name order.
    ///
    /// The directory is listed up front; files are read as the iterator
    /// advances. Clone the iterator to restart from the beginning.
    pub fn list_kind(&self, kind: EntityKind) -> RecordIter {
        let dir = self.kind_dir(kind);
        let mut pending = VecDeque::new();
        let mut files = Vec::new();

        if dir.is_dir() {
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && self.accepts(entry.path()) => {
                        files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                        warn!("cannot list {}: {}", path.display(), e);
                        pending.push_back(Err(ParseError { kind, path, message: e.to_string() }));
                    }
                }
            }
        } else {
            debug!("{} does not exist", dir.display());
        }

        RecordIter { kind, files: files.into_iter(), pending }
    }

    /// Read one kind completely.
    pub fn load_kind(&self, kind: EntityKind) -> KindLoad {
        let missing = !self.kind_dir(kind).is_dir();
        let iter = self.list_kind(kind);
        let files = iter.remaining_files();
        let mut load = KindLoad { files, missing, ..Default::default() };
        for item in iter {
            match item {
                Ok(record) => load.records.push(record),
                Err(e) => load.parse_errors.push(e),
            }
        }
        debug!(
            "loaded {} {} record(s) from {} file(s), {} parse error(s)",
            load.records.len(),
            kind,
            load.files,
            load.parse_errors.len()
        );
        load
    }

    /// Read every kind.
    pub fn load_all(&self) -> LoadedRecords {
        let mut loaded = LoadedRecords::default();
        for &kind in EntityKind::ALL {
            loaded.insert(kind, self.load_kind(kind));
        }
        loaded
    }

    /// Write a record back to the store.
    ///
    /// A record whose id is already stored is replaced where it lives, at its
    /// position in a multi-record file. A new id gets `<kind dir>/<id>.yaml`.
    pub fn write_record(&self, record: &Entity) -> Result<PathBuf> {
        let id = record.id();
        if !is_valid_id(id) {
            return Err(Error::InvalidRecord(format!("'{}' is not a valid record id", id)));
        }
        let kind = record.kind();

        if let Some(existing) = self.find(kind, id) {
            let text = std::fs::read_to_string(&existing.source)?;
            let mut doc: Value = serde_yaml::from_str(&text)?;
            if !replace_entry(kind, &mut doc, existing.index, serde_yaml::to_value(record)?) {
                return Err(Error::InvalidRecord(format!(
                    "{} '{}' in {} changed while it was being rewritten",
                    kind,
                    id,
                    existing.source.display()
                )));
            }
            write_atomic(&existing.source, &serde_yaml::to_string(&doc)?)?;
            debug!("replaced {} '{}' in {}", kind, id, existing.source.display());
            return Ok(existing.source);
        }

        let dir = self.kind_dir(kind);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.yaml", id));
        write_atomic(&path, &serde_yaml::to_string(record)?)?;
        debug!("wrote {} {}", kind, path.display());
        Ok(path)
    }

    /// First stored record with this id, in load order.
    fn find(&self, kind: EntityKind, id: &str) -> Option<RawRecord> {
        self.list_kind(kind).filter_map(|r| r.ok()).find(|r| r.raw_id() == Some(id))
    }

    fn accepts(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with('_') || name.starts_with('.') {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

/// Restartable iterator returned by [`RecordStore::list_kind`].
#[derive(Clone, Debug)]
pub struct RecordIter {
    kind: EntityKind,
    files: std::vec::IntoIter<PathBuf>,
    pending: VecDeque<std::result::Result<RawRecord, ParseError>>,
}

impl RecordIter {
    /// Files not yet opened.
    pub fn remaining_files(&self) -> usize {
        self.files.len()
    }
}

impl Iterator for RecordIter {
    type Item = std::result::Result<RawRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let path = self.files.next()?;
            self.pending.extend(read_file(self.kind, &path));
        }
    }
}

fn read_file(kind: EntityKind, path: &Path) -> Vec<std::result::Result<RawRecord, ParseError>> {
    let fail = |message: String| {
        warn!("skipping {}: {}", path.display(), message);
        vec![Err(ParseError { kind, path: path.to_path_buf(), message })]
    };

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => return fail(format!("cannot read file: {}", e)),
    };
    let doc: Value = match serde_yaml::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => return fail(format!("malformed YAML: {}", e)),
    };

    let items = match doc {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items,
        Value::Mapping(map) => match collection(kind, &map) {
            Some(items) => items.clone(),
            None => vec![Value::Mapping(map)],
        },
        other => vec![other],
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, value)| Ok(RawRecord { kind, source: path.to_path_buf(), index, value }))
        .collect()
}

/// Temp file next to `path`, then rename over it.
fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("record");
    let tmp = path.with_file_name(format!(".{}.tmp", name));
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Put `value` in the slot `read_file` numbered `index`.
fn replace_entry(kind: EntityKind, doc: &mut Value, index: usize, value: Value) -> bool {
    let single = doc.as_mapping().map_or(false, |map| map.contains_key("id"));
    if single {
        if index != 0 {
            return false;
        }
        *doc = value;
        return true;
    }

    let items = match doc {
        Value::Sequence(items) => Some(items),
        Value::Mapping(map) => {
            let key = [kind.collection_key(), kind.dir_name()]
                .into_iter()
                .find(|key| map.get(*key).map_or(false, Value::is_sequence));
            match key {
                Some(key) => map.get_mut(key).and_then(Value::as_sequence_mut),
                None => None,
            }
        }
        _ => None,
    };
    match items.and_then(|items| items.get_mut(index)) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}

/// A list under the collection key, unless the mapping is itself a record.
fn collection<'a>(kind: EntityKind, map: &'a serde_yaml::Mapping) -> Option<&'a Vec<Value>> {
    if map.contains_key("id") {
        return None;
    }
    [kind.collection_key(), kind.dir_name()]
        .into_iter()
        .find_map(|key| map.get(key).and_then(Value::as_sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn reads_single_and_collection_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "relationships/a.yaml", "relationships:\n  - id: r1\n  - id: r2\n");
        write(tmp.path(), "relationships/b.yaml", "id: r3\n");
        write(tmp.path(), "relationships/c.yml", "- id: r4\n");

        let store = RecordStore::new(tmp.path());
        let ids: Vec<String> = store
            .list_kind(EntityKind::Relationship)
            .map(|r| r.unwrap().raw_id().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["r1", "r2", "r3", "r4"]);
    }

    #[test]
    fn glossary_uses_terms_key() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "glossary/terms.yaml", "terms:\n  - id: delacao\n  - id: foro\n");
        let store = RecordStore::new(tmp.path());
        let load = store.load_kind(EntityKind::Glossary);
        assert_eq!(load.records.len(), 2);
        assert_eq!(load.records[1].index, 1);
    }

    #[test]
    fn skips_underscore_and_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "figures/_schema.yaml", "id: nope\n");
        write(tmp.path(), "figures/README.md", "# figures\n");
        write(tmp.path(), "figures/lula.yaml", "id: lula\n");
        let load = RecordStore::new(tmp.path()).load_kind(EntityKind::Figure);
        assert_eq!(load.files, 1);
        assert_eq!(load.records.len(), 1);
    }

    #[test]
    fn malformed_file_does_not_stop_the_load() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "events/a.yaml", "id: [unclosed\n");
        write(tmp.path(), "events/b.yaml", "id: ok\n");
        write(tmp.path(), "events/c.yaml", "");
        let load = RecordStore::new(tmp.path()).load_kind(EntityKind::Event);
        assert_eq!(load.parse_errors.len(), 1);
        assert!(load.parse_errors[0].path.ends_with("a.yaml"));
        assert_eq!(load.records.len(), 1);
    }

    #[test]
    fn missing_directory_is_flagged() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = RecordStore::new(tmp.path()).load_all();
        assert_eq!(loaded.missing_kinds().count(), EntityKind::ALL.len());
        assert_eq!(loaded.record_count(), 0);
    }

    #[test]
    fn list_kind_is_restartable() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "events/a.yaml", "- id: e1\n- id: e2\n");
        let mut iter = RecordStore::new(tmp.path()).list_kind(EntityKind::Event);
        let fresh = iter.clone();
        iter.next();
        assert_eq!(iter.count(), 1);
        assert_eq!(fresh.count(), 2);
    }
}
