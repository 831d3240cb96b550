//! Definition files - Persisted form of circuits and boxes.
//!
//! A [`DefinitionDoc`] holds everything a factory needs: a meta record,
//! the block list, the connection list and (for boxes) the bond list. All
//! cross-references are by template id.
//!
//! # Formats
//!
//! - **JSON** (`to_json` / `from_json`): the on-disk format. Every optional
//!   field may be missing; unknown fields are ignored.
//! - **Binary** (`to_binary` / `from_binary`): compact bincode encoding.
//! - **Legacy text** (`from_legacy_text`): import of the older
//!   `;`-separated line format.
//!
//! # Example
//!
//! ```
//! use crazymatrix::{DefinitionDoc, DefinitionKind};
//!
//! let doc = DefinitionDoc::from_legacy_text(
//!     "Meta;1;1\n\
//!      Block;square;1;1;sq;-\n\
//!      Bond;in;sq;0;0\n\
//!      Bond;out;sq;0;0\n",
//! )
//! .unwrap();
//! assert_eq!(doc.meta.n_in, Some(1));
//! assert_eq!(doc.blocks.len(), 1);
//! assert_eq!(doc.bonds.len(), 2);
//! assert_eq!(DefinitionKind::from_extension("cmr"), Some(DefinitionKind::RepeatBox));
//! ```

use crate::error::{CrazyMatrixError, Result};
use crate::template::{BlockKind, BlockTemplate, BondTemplate, ConnTemplate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a definition file describes; follows the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// Top-level circuit (`.cmc`)
    Circuit,
    /// Black box (`.cmb`)
    BlackBox,
    /// Repeat box (`.cmr`)
    RepeatBox,
}

impl DefinitionKind {
    /// All kinds.
    pub const ALL: [DefinitionKind; 3] = [
        DefinitionKind::Circuit,
        DefinitionKind::BlackBox,
        DefinitionKind::RepeatBox,
    ];

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            DefinitionKind::Circuit => "cmc",
            DefinitionKind::BlackBox => "cmb",
            DefinitionKind::RepeatBox => "cmr",
        }
    }

    /// Kind for a file extension, if it names one.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.extension() == ext)
    }

    /// `true` for both box kinds.
    pub fn is_box(self) -> bool {
        !matches!(self, DefinitionKind::Circuit)
    }
}

/// Meta record of a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocMeta {
    /// Kind, when recorded
    pub kind: Option<DefinitionKind>,
    /// Boundary inputs of a box
    pub n_in: Option<usize>,
    /// Boundary outputs of a box
    pub n_out: Option<usize>,
    /// Free text
    pub description: Option<String>,
}

/// Full persisted description of a circuit or box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefinitionDoc {
    /// Meta information
    pub meta: DocMeta,
    /// Block templates
    pub blocks: Vec<BlockTemplate>,
    /// Connection templates
    pub conns: Vec<ConnTemplate>,
    /// Bond templates (boxes only)
    pub bonds: Vec<BondTemplate>,
}

impl DefinitionDoc {
    /// Serialize to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to bincode.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bincode.
    pub fn from_binary(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Write as JSON to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a definition file, JSON or legacy text.
    ///
    /// Content whose first non-blank character is `{` is read as JSON,
    /// anything else as legacy text.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse JSON or legacy text, see [`read`](Self::read).
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim_start().starts_with('{') {
            Self::from_json(text)
        } else {
            Self::from_legacy_text(text)
        }
    }

    /// Parse the legacy `;`-separated line format.
    ///
    /// Records:
    ///
    /// - `Meta;n_in;n_out`
    /// - `Block;kind;n_in;n_out;id;value`
    /// - `Conn;source_id;source_pin;dest_id;dest_pin`
    /// - `Bond;side;block_id;block_pin;box_pin`
    ///
    /// `-` marks an absent value; a negative `n_in` or `dest_pin` means
    /// "n-ary" and "append" respectively. Blank lines and unknown record
    /// tags are skipped.
    ///
    /// # Errors
    ///
    /// `Parse` with the 1-based line number for records with the wrong
    /// field count or unreadable fields.
    pub fn from_legacy_text(text: &str) -> Result<Self> {
        let mut doc = DefinitionDoc::default();
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let fields: Vec<&str> = line.trim_end().split(';').collect();
            let parse_err = |message: String| CrazyMatrixError::Parse {
                line: line_no,
                message,
            };
            let expect = |n: usize| {
                if fields.len() == n {
                    Ok(())
                } else {
                    Err(parse_err(format!(
                        "{} record needs {n} fields, found {}",
                        fields[0],
                        fields.len()
                    )))
                }
            };

            match fields[0] {
                "" => continue,
                "Meta" => {
                    expect(3)?;
                    doc.meta.n_in = opt_count(fields[1]).map_err(parse_err)?;
                    doc.meta.n_out = opt_count(fields[2]).map_err(parse_err)?;
                }
                "Block" => {
                    expect(6)?;
                    let kind: BlockKind = fields[1].parse().map_err(|e: CrazyMatrixError| parse_err(e.to_string()))?;
                    let mut template = BlockTemplate::of_kind(kind, fields[4]);
                    template.n_in = opt_count(fields[2]).map_err(parse_err)?;
                    template.n_out = count(fields[3]).map_err(parse_err)?;
                    template.value = match fields[5] {
                        "-" => None,
                        v => Some(v.parse().map_err(|_| parse_err(format!("bad value '{v}'")))?),
                    };
                    doc.blocks.push(template);
                }
                "Conn" => {
                    expect(5)?;
                    doc.conns.push(ConnTemplate::new(
                        fields[1],
                        count(fields[2]).map_err(parse_err)?,
                        fields[3],
                        opt_count(fields[4]).map_err(parse_err)?,
                    ));
                }
                "Bond" => {
                    expect(5)?;
                    let side = fields[1].parse().map_err(|e: CrazyMatrixError| parse_err(e.to_string()))?;
                    doc.bonds.push(BondTemplate::new(
                        side,
                        fields[2],
                        opt_count(fields[3]).map_err(parse_err)?,
                        count(fields[4]).map_err(parse_err)?,
                    ));
                }
                other => log::debug!("line {line_no}: skipping unknown record '{other}'"),
            }
        }
        Ok(doc)
    }
}

fn count(field: &str) -> std::result::Result<usize, String> {
    field
        .parse()
        .map_err(|_| format!("expected a pin count, found '{field}'"))
}

/// `-` and negative numbers read as absent.
fn opt_count(field: &str) -> std::result::Result<Option<usize>, String> {
    if field == "-" {
        return Ok(None);
    }
    let n: i64 = field
        .parse()
        .map_err(|_| format!("expected a pin count, found '{field}'"))?;
    Ok(usize::try_from(n).ok())
}
