//! Document identity and the facts exposed to templates as `file`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::{Metadata, Value};

/// Vault-relative document path with `/` separators.
///
/// The vault root is addressed as `/` when used as a folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(path: impl AsRef<str>) -> Self {
        let normalized = path.as_ref().replace('\\', "/");
        let trimmed = normalized.trim_start_matches("./").trim_start_matches('/');
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name with extension.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without its extension.
    pub fn basename(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }

    pub fn extension(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[idx + 1..],
            _ => "",
        }
    }

    /// Parent folder path; `/` for documents at the vault root.
    pub fn parent_path(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "/",
        }
    }

    /// Last segment of the parent folder; empty at the vault root.
    pub fn parent_name(&self) -> &str {
        match self.parent_path() {
            "/" => "",
            parent => parent.rsplit('/').next().unwrap_or(parent),
        }
    }

    pub fn is_markdown(&self) -> bool {
        self.extension().eq_ignore_ascii_case("md")
    }

    /// Folder depth, zero at the vault root.
    pub fn depth(&self) -> usize {
        self.0.matches('/').count()
    }

    /// Whether the document lives in `folder` or any of its subfolders.
    /// `/` and the empty string match everything.
    pub fn is_within(&self, folder: &str) -> bool {
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            return true;
        }
        self.0
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for DocumentId {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// Host-reported file statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStat {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub stat: Option<DocumentStat>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            stat: None,
        }
    }

    pub fn with_stat(mut self, stat: DocumentStat) -> Self {
        self.stat = Some(stat);
        self
    }

    /// The `file` binding for template evaluation.
    ///
    /// `properties` is `null` when the document has no metadata block.
    pub fn facts(&self, tags: &[String], properties: Option<&Metadata>) -> Value {
        let id = &self.id;
        let mut parent = Metadata::new();
        parent.insert("path".into(), Value::from(id.parent_path()));
        parent.insert("name".into(), Value::from(id.parent_name()));

        let mut facts = Metadata::new();
        facts.insert("path".into(), Value::from(id.as_str()));
        facts.insert("name".into(), Value::from(id.name()));
        facts.insert("basename".into(), Value::from(id.basename()));
        facts.insert("extension".into(), Value::from(id.extension()));
        facts.insert("parent".into(), Value::Map(parent));
        facts.insert(
            "tags".into(),
            Value::List(tags.iter().map(|t| Value::from(t.as_str())).collect()),
        );
        facts.insert(
            "properties".into(),
            properties.cloned().map(Value::Map).unwrap_or(Value::Null),
        );
        if let Some(stat) = &self.stat {
            let mut s = Metadata::new();
            s.insert("ctime".into(), Value::Integer(stat.created.timestamp_millis()));
            s.insert("mtime".into(), Value::Integer(stat.modified.timestamp_millis()));
            s.insert("size".into(), Value::Integer(stat.size as i64));
            facts.insert("stat".into(), Value::Map(s));
        }
        Value::Map(facts)
    }
}
