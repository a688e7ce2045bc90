//! Tag files: ordered `Label: value` metadata.
//!
//! Values longer than [`TAG_LINE_WIDTH`] are wrapped on word boundaries; each
//! continuation line starts with a three-space indent. Parsing reverses this
//! by joining continuation lines to the preceding field with a single space.
//!
//! ```text
//! Source-Organization: Example Archive
//! External-Description: A long description that keeps going past the wrap
//!    column and continues on the next line.
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::error::{BagError, BagResult, ParseIssue};

/// Column limit for formatted tag lines.
pub const TAG_LINE_WIDTH: usize = 79;

/// Required tag file extension.
pub const TAG_FILE_EXTENSION: &str = "txt";

const CONTINUATION_INDENT: &str = "   ";

lazy_static! {
    static ref TAG_LINE: Regex = Regex::new(r"^(\S*:)?(\s.*)?$").unwrap();
}

/// One `label: value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagField {
    pub label: String,
    pub value: String,
}

impl TagField {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A tag file and its fields, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFile {
    path: PathBuf,
    fields: Vec<TagField>,
}

impl TagFile {
    /// Create an empty tag file handle for `path`.
    ///
    /// The file name must end in `.txt` and its parent directory must exist.
    /// Nothing is written until [`TagFile::write`].
    pub fn new(path: impl Into<PathBuf>) -> BagResult<Self> {
        let path = path.into();
        validate_tag_file_name(&path)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(BagError::PathNotFound {
                    path: parent.to_path_buf(),
                });
            }
        }
        Ok(Self {
            path,
            fields: Vec::new(),
        })
    }

    /// Read and parse an existing tag file.
    ///
    /// Unparsable lines do not fail the call; they come back as issues next
    /// to the fields that did parse.
    pub fn parse(path: impl Into<PathBuf>) -> BagResult<(Self, Vec<ParseIssue>)> {
        let path = path.into();
        validate_tag_file_name(&path)?;
        let content = fs::read_to_string(&path).map_err(|e| BagError::io(&path, e))?;
        let (fields, issues) = parse_fields(&content);
        debug!(path = %path.display(), fields = fields.len(), issues = issues.len(), "parsed tag file");
        Ok((Self { path, fields }, issues))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fields(&self) -> &[TagField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a field. Repeated labels are kept as separate fields.
    pub fn add_field(&mut self, label: impl Into<String>, value: impl Into<String>) -> BagResult<()> {
        let label = label.into();
        validate_label(&label)?;
        self.fields.push(TagField::new(label, value));
        Ok(())
    }

    /// Replace the value of the first field with `label`, or append it.
    pub fn set_field(&mut self, label: impl Into<String>, value: impl Into<String>) -> BagResult<()> {
        let label = label.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.label == label) {
            Some(field) => {
                field.value = value;
                Ok(())
            }
            None => self.add_field(label, value),
        }
    }

    /// Value of the first field with `label`.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }

    /// Values of every field with `label`, in file order.
    pub fn get_all(&self, label: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.label == label)
            .map(|f| f.value.as_str())
            .collect()
    }

    /// Formatted file content.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            out.push_str(&format_field(&field.label, &field.value));
            out.push('\n');
        }
        out
    }

    /// Write the file, creating parent directories as needed.
    pub fn write(&self) -> BagResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BagError::DestUnwritable {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, self.to_text()).map_err(|source| BagError::DestUnwritable {
            path: self.path.clone(),
            source,
        })
    }
}

/// Format one field, wrapping at [`TAG_LINE_WIDTH`] columns.
///
/// A word that would push the line past the limit starts a continuation
/// line. A single word longer than the limit is never split. No trailing
/// newline is added.
pub fn format_field(label: &str, value: &str) -> String {
    let mut out = format!("{}:", label);
    let mut column = out.chars().count();
    let mut line_has_word = false;

    for word in value.split_whitespace() {
        let width = word.chars().count();
        if line_has_word && column + 1 + width > TAG_LINE_WIDTH {
            out.push('\n');
            out.push_str(CONTINUATION_INDENT);
            out.push_str(word);
            column = CONTINUATION_INDENT.len() + width;
        } else {
            out.push(' ');
            out.push_str(word);
            column += 1 + width;
        }
        line_has_word = true;
    }
    out
}

/// Parse tag file content into fields.
///
/// Lines starting with a `label:` token open a new field; lines starting
/// with whitespace continue the previous one. Blank lines are skipped.
pub fn parse_fields(content: &str) -> (Vec<TagField>, Vec<ParseIssue>) {
    let mut fields: Vec<TagField> = Vec::new();
    let mut issues = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = TAG_LINE.captures(line) else {
            issues.push(ParseIssue::new(line_no, line, "expected 'label: value' or an indented continuation"));
            continue;
        };
        let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        match caps.get(1).filter(|m| !m.as_str().is_empty()) {
            Some(label) => {
                let label = label.as_str();
                let label = label.strip_suffix(':').unwrap_or(label);
                fields.push(TagField::new(label, value));
            }
            None => match fields.last_mut() {
                Some(prev) if !value.is_empty() => {
                    if !prev.value.is_empty() {
                        prev.value.push(' ');
                    }
                    prev.value.push_str(value);
                }
                Some(_) => {}
                None => {
                    issues.push(ParseIssue::new(line_no, line, "continuation line before any field"));
                }
            },
        }
    }

    (fields, issues)
}

pub(crate) fn validate_tag_file_name(path: &Path) -> BagResult<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem_ok = name
        .strip_suffix(".txt")
        .map(|stem| !stem.is_empty())
        .unwrap_or(false);
    if stem_ok {
        Ok(())
    } else {
        Err(BagError::InvalidName {
            name: path.display().to_string(),
            reason: format!("tag files must end in .{} and have a name", TAG_FILE_EXTENSION),
        })
    }
}

fn validate_label(label: &str) -> BagResult<()> {
    if label.is_empty() {
        return Err(BagError::InvalidName {
            name: label.to_string(),
            reason: "label is empty".into(),
        });
    }
    if label.contains(':') || label.chars().any(char::is_whitespace) {
        return Err(BagError::InvalidName {
            name: label.to_string(),
            reason: "label must not contain ':' or whitespace".into(),
        });
    }
    Ok(())
}
