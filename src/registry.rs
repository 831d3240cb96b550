//! Registry - Named definitions stored under one directory tree.
//!
//! The registry indexes every definition file below a root directory. A
//! file's base name (without extension) is its external name and its
//! extension gives the kind (`cmc` circuit, `cmb` black box, `cmr` repeat
//! box). When the same base name occurs more than once, the first file in
//! traversal order wins and the others are reported.
//!
//! Loading a definition runs three gates before handing out a factory:
//!
//! 1. a structural schema check of the raw JSON (see [`validate_schema`]),
//!    skipped when [`EngineConfig::validate_schema`] is off or the file is
//!    in the legacy line format;
//! 2. semantic cross-checks (see [`cross_check`]);
//! 3. for boxes, the bond check of
//!    [`BoxFactory::validate_bonds`](crate::factory::BoxFactory::validate_bonds).
//!
//! A definition failing any gate comes back as [`LoadOutcome::Unusable`]
//! so batch loads can skip it.
//!
//! # Example
//!
//! ```no_run
//! use crazymatrix::{EngineConfig, LoadOutcome, Registry, Result};
//!
//! # fn main() -> Result<()> {
//! let mut registry = Registry::new("definitions", EngineConfig::default());
//! let report = registry.scan()?;
//! for dup in &report.duplicates {
//!     eprintln!("'{}' ignored at {}", dup.name, dup.ignored.display());
//! }
//!
//! match registry.load("mandel")? {
//!     LoadOutcome::Usable(definition) => println!("{:?}", definition.kind()),
//!     LoadOutcome::Unusable { reason, .. } => eprintln!("skipped: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::EngineConfig;
use crate::definition_file::{DefinitionDoc, DefinitionKind};
use crate::error::{CrazyMatrixError, Result};
use crate::factory::{Definition, DefinitionResolver};
use crate::template::{BlockKind, BoxSide, DRAWER_ID, POINT_ID};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One indexed definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Base file name
    pub name: String,
    /// Kind, from the extension
    pub kind: DefinitionKind,
    /// Location of the file
    pub path: PathBuf,
}

/// A base name found more than once during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateName {
    /// The shared base name
    pub name: String,
    /// File that stays indexed
    pub kept: PathBuf,
    /// File that was ignored
    pub ignored: PathBuf,
}

/// Result of [`Registry::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Number of indexed definitions
    pub indexed: usize,
    /// Ignored duplicates, in discovery order
    pub duplicates: Vec<DuplicateName>,
}

/// Result of [`Registry::load`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// Definition passed every check
    Usable(Definition),
    /// Definition failed a check; nothing was instantiated
    Unusable {
        /// Name that was loaded
        name: String,
        /// First failed check
        reason: CrazyMatrixError,
    },
}

impl LoadOutcome {
    /// `true` for `Usable`.
    pub fn is_usable(&self) -> bool {
        matches!(self, LoadOutcome::Usable(_))
    }

    /// The definition, if usable.
    pub fn into_definition(self) -> Option<Definition> {
        match self {
            LoadOutcome::Usable(definition) => Some(definition),
            LoadOutcome::Unusable { .. } => None,
        }
    }
}

/// Index of definition files below a root directory.
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
    config: EngineConfig,
    entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Create a registry over `root`; call [`scan`](Self::scan) to index it.
    pub fn new(root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self {
            root: root.into(),
            config,
            entries: Vec::new(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configuration used for loading.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Indexed entries, in discovery order.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Entry indexed under `name`.
    pub fn entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Rebuild the index from the directory tree.
    ///
    /// Directories are walked once, symlinks followed, entries sorted by
    /// file name so the first occurrence of a name is deterministic.
    ///
    /// # Errors
    ///
    /// `Io` if the tree cannot be traversed.
    pub fn scan(&mut self) -> Result<ScanReport> {
        self.entries.clear();
        let mut report = ScanReport::default();

        for entry in WalkDir::new(&self.root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(kind) = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(DefinitionKind::from_extension)
            else {
                continue;
            };
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            if let Some(kept) = self.entry(name) {
                log::warn!(
                    "name '{name}' found more than once, keeping {} and ignoring {}",
                    kept.path.display(),
                    path.display()
                );
                report.duplicates.push(DuplicateName {
                    name: name.to_owned(),
                    kept: kept.path.clone(),
                    ignored: path.to_path_buf(),
                });
                continue;
            }
            self.entries.push(RegistryEntry {
                name: name.to_owned(),
                kind,
                path: path.to_path_buf(),
            });
        }

        report.indexed = self.entries.len();
        log::info!(
            "scanned {}: {} definitions, {} duplicates",
            self.root.display(),
            report.indexed,
            report.duplicates.len()
        );
        Ok(report)
    }

    /// Load and check the definition indexed under `name`.
    ///
    /// # Errors
    ///
    /// `UnresolvedBoxReference` if `name` is not indexed. Every problem
    /// with the file itself is reported as [`LoadOutcome::Unusable`].
    pub fn load(&self, name: &str) -> Result<LoadOutcome> {
        let entry = self
            .entry(name)
            .ok_or_else(|| CrazyMatrixError::UnresolvedBoxReference(name.to_owned()))?;

        Ok(match self.load_entry(entry) {
            Ok(definition) => LoadOutcome::Usable(definition),
            Err(reason) => {
                log::warn!("definition '{name}' is unusable: {reason}");
                LoadOutcome::Unusable {
                    name: name.to_owned(),
                    reason,
                }
            }
        })
    }

    /// Load every indexed definition, in index order.
    pub fn load_all(&self) -> Vec<(String, LoadOutcome)> {
        self.entries
            .iter()
            .map(|entry| {
                let outcome = match self.load_entry(entry) {
                    Ok(definition) => LoadOutcome::Usable(definition),
                    Err(reason) => LoadOutcome::Unusable {
                        name: entry.name.clone(),
                        reason,
                    },
                };
                (entry.name.clone(), outcome)
            })
            .collect()
    }

    fn load_entry(&self, entry: &RegistryEntry) -> Result<Definition> {
        let text = std::fs::read_to_string(&entry.path)?;
        let doc = if text.trim_start().starts_with('{') {
            let raw: JsonValue = serde_json::from_str(&text)?;
            if self.config.validate_schema {
                validate_schema(&raw)?;
            }
            serde_json::from_value(raw)?
        } else {
            DefinitionDoc::from_legacy_text(&text)?
        };

        let definition = Definition::from_doc(entry.kind, doc)?;
        let problems = cross_check(&definition);
        if !problems.is_empty() {
            return Err(CrazyMatrixError::CrossCheck(problems.join("; ")));
        }
        if let Definition::Box(factory) = &definition {
            factory.validate_bonds(&entry.name)?;
        }
        log::debug!("loaded {:?} '{}'", entry.kind, entry.name);
        Ok(definition)
    }

    /// Write `definition` under `name`.
    ///
    /// New names go to `<root>/<name>.<ext>`. Overwriting keeps the
    /// directory of the existing entry; if the kind changed, the old file
    /// is removed.
    ///
    /// # Errors
    ///
    /// `NameExists` if `name` is indexed and `overwrite` is false.
    pub fn store(&mut self, definition: &Definition, name: &str, overwrite: bool) -> Result<PathBuf> {
        let kind = definition.kind();
        let doc = definition.to_doc();

        let path = match self.entries.iter().position(|entry| entry.name == name) {
            Some(_) if !overwrite => {
                log::warn!("name '{name}' already exists, not stored");
                return Err(CrazyMatrixError::NameExists(name.to_owned()));
            }
            Some(index) => {
                let previous = self.entries[index].path.clone();
                let path = previous.with_extension(kind.extension());
                doc.write_json(&path)?;
                if path != previous {
                    std::fs::remove_file(&previous)?;
                }
                self.entries[index] = RegistryEntry {
                    name: name.to_owned(),
                    kind,
                    path: path.clone(),
                };
                log::info!("definition '{name}' overwritten at {}", path.display());
                path
            }
            None => {
                std::fs::create_dir_all(&self.root)?;
                let path = self.root.join(format!("{name}.{}", kind.extension()));
                doc.write_json(&path)?;
                self.entries.push(RegistryEntry {
                    name: name.to_owned(),
                    kind,
                    path: path.clone(),
                });
                log::info!("definition '{name}' stored at {}", path.display());
                path
            }
        };
        Ok(path)
    }
}

impl DefinitionResolver for Registry {
    fn resolve(&self, name: &str) -> Result<Definition> {
        self.load(name)?
            .into_definition()
            .ok_or_else(|| CrazyMatrixError::UnresolvedBoxReference(name.to_owned()))
    }
}

/// Structural check of a raw definition document.
///
/// Requires an object whose optional `meta` is an object and whose
/// optional `blocks`, `conns` and `bonds` are arrays of records with the
/// fields instantiation relies on, of the right JSON types.
///
/// # Errors
///
/// `SchemaValidation` naming the first offending record.
pub fn validate_schema(raw: &JsonValue) -> Result<()> {
    let doc = raw
        .as_object()
        .ok_or_else(|| schema_error("document is not an object"))?;

    if let Some(meta) = doc.get("meta") {
        let meta = meta
            .as_object()
            .ok_or_else(|| schema_error("meta is not an object"))?;
        optional_count(meta, "n_in", "meta")?;
        optional_count(meta, "n_out", "meta")?;
    }

    for (i, block) in records(doc, "blocks")?.iter().enumerate() {
        let at = format!("blocks[{i}]");
        let block = record(block, &at)?;
        let kind = required_str(block, "kind", &at)?;
        if kind.parse::<BlockKind>().is_err() {
            return Err(schema_error(format!("{at}: unknown kind '{kind}'")));
        }
        required_str(block, "id", &at)?;
        optional_count(block, "n_in", &at)?;
        optional_count(block, "n_out", &at)?;
        if !matches!(block.get("value"), None | Some(JsonValue::Null) | Some(JsonValue::Number(_))) {
            return Err(schema_error(format!("{at}: value is not a number")));
        }
        optional_str(block, "reference", &at)?;
    }

    for (i, conn) in records(doc, "conns")?.iter().enumerate() {
        let at = format!("conns[{i}]");
        let conn = record(conn, &at)?;
        required_str(conn, "source_id", &at)?;
        required_str(conn, "dest_id", &at)?;
        optional_count(conn, "source_pin", &at)?;
        optional_count(conn, "dest_pin", &at)?;
    }

    for (i, bond) in records(doc, "bonds")?.iter().enumerate() {
        let at = format!("bonds[{i}]");
        let bond = record(bond, &at)?;
        let side = required_str(bond, "side", &at)?;
        if side.parse::<BoxSide>().is_err() {
            return Err(schema_error(format!("{at}: side must be 'in' or 'out'")));
        }
        required_str(bond, "block_id", &at)?;
        optional_count(bond, "block_pin", &at)?;
        if bond.get("box_pin").and_then(JsonValue::as_u64).is_none() {
            return Err(schema_error(format!("{at}: box_pin is missing or not a pin index")));
        }
    }
    Ok(())
}

fn schema_error(message: impl Into<String>) -> CrazyMatrixError {
    CrazyMatrixError::SchemaValidation(message.into())
}

fn records<'a>(doc: &'a Map<String, JsonValue>, key: &str) -> Result<&'a [JsonValue]> {
    match doc.get(key) {
        None | Some(JsonValue::Null) => Ok(&[]),
        Some(JsonValue::Array(items)) => Ok(items),
        Some(_) => Err(schema_error(format!("{key} is not an array"))),
    }
}

fn record<'a>(item: &'a JsonValue, at: &str) -> Result<&'a Map<String, JsonValue>> {
    item.as_object()
        .ok_or_else(|| schema_error(format!("{at} is not an object")))
}

fn required_str<'a>(obj: &'a Map<String, JsonValue>, key: &str, at: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| schema_error(format!("{at}: {key} is missing or not a string")))
}

fn optional_str(obj: &Map<String, JsonValue>, key: &str, at: &str) -> Result<()> {
    match obj.get(key) {
        None | Some(JsonValue::Null) | Some(JsonValue::String(_)) => Ok(()),
        Some(_) => Err(schema_error(format!("{at}: {key} is not a string"))),
    }
}

fn optional_count(obj: &Map<String, JsonValue>, key: &str, at: &str) -> Result<()> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => Ok(()),
        Some(v) if v.as_u64().is_some() => Ok(()),
        Some(_) => Err(schema_error(format!("{at}: {key} is not a pin count"))),
    }
}

/// Semantic checks a definition must pass before it is handed out.
///
/// Returns every problem found; an empty list means the definition is
/// usable as far as these checks go:
///
/// - `const` blocks carry a value
/// - `box` blocks carry a reference name
/// - connections and bonds name existing blocks
/// - a circuit has at least one connection into its drawer
/// - a box has at least one IN and one OUT bond
pub fn cross_check(definition: &Definition) -> Vec<String> {
    let graph = definition.graph();
    let mut problems = Vec::new();

    let mut known: HashSet<&str> = graph.blocks().iter().map(|b| b.id.as_str()).collect();
    if let Definition::Circuit(_) = definition {
        known.extend([POINT_ID, DRAWER_ID]);
    }

    for block in graph.blocks() {
        match block.kind {
            BlockKind::Const if block.value.is_none() => {
                problems.push(format!("const block {} has no value", block.id))
            }
            BlockKind::Box if block.reference.is_none() => {
                problems.push(format!("box block {} has no reference", block.id))
            }
            _ => {}
        }
    }
    for conn in graph.conns() {
        for id in [&conn.source_id, &conn.dest_id] {
            if !known.contains(id.as_str()) {
                problems.push(format!("connection {conn} names unknown block '{id}'"));
            }
        }
    }

    match definition {
        Definition::Circuit(_) => {
            if !graph.conns().iter().any(|conn| conn.dest_id == DRAWER_ID) {
                problems.push("circuit has no connection into the drawer".into());
            }
        }
        Definition::Box(factory) => {
            for bond in factory.bonds() {
                if !known.contains(bond.block_id.as_str()) {
                    problems.push(format!("bond {bond} names unknown block '{}'", bond.block_id));
                }
            }
            for side in [BoxSide::In, BoxSide::Out] {
                if !factory.bonds().iter().any(|bond| bond.side == side) {
                    problems.push(format!("box has no {} bond", side.as_str().to_uppercase()));
                }
            }
        }
    }
    problems
}
