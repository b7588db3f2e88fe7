//! Read-only page index exposed to templates as `dv`.

use tracing::{debug, warn};

use fmgen_core::{Document, DocumentStore, Metadata, QueryApi, StoreResult, Value};
use fmgen_parser::split;

/// Snapshot of every page in a vault. Each page is its frontmatter plus a
/// `file` map with `path`, `name`, `basename`, `folder` and `tags`.
#[derive(Debug, Clone, Default)]
pub struct VaultIndex {
    pages: Vec<Value>,
}

impl VaultIndex {
    /// Read every document in `store`. Documents with unreadable
    /// frontmatter are indexed without it.
    pub async fn build(store: &dyn DocumentStore) -> StoreResult<Self> {
        let documents = store.list().await?;
        let mut pages = Vec::with_capacity(documents.len());
        for document in &documents {
            let text = match store.read(&document.id).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(path = %document.id, error = %err, "skipping unreadable page");
                    continue;
                }
            };
            pages.push(page_for(document, &text));
        }
        debug!(pages = pages.len(), "vault index built");
        Ok(Self { pages })
    }

    pub fn from_pages(pages: Vec<Value>) -> Self {
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn page_for(document: &Document, text: &str) -> Value {
    let (mut page, tags) = match split(text) {
        Ok(parsed) => (parsed.metadata.unwrap_or_default(), parsed.tags),
        Err(err) => {
            warn!(path = %document.id, error = %err, "indexing page without frontmatter");
            (Metadata::new(), Vec::new())
        }
    };

    let id = &document.id;
    let mut file = Metadata::new();
    file.insert("path".into(), Value::from(id.as_str()));
    file.insert("name".into(), Value::from(id.name()));
    file.insert("basename".into(), Value::from(id.basename()));
    file.insert("folder".into(), Value::from(id.parent_path()));
    file.insert(
        "tags".into(),
        Value::List(tags.iter().map(|t| Value::from(t.as_str())).collect()),
    );
    if let Some(stat) = &document.stat {
        file.insert("mtime".into(), Value::Integer(stat.modified.timestamp_millis()));
        file.insert("size".into(), Value::Integer(stat.size as i64));
    }
    page.insert("file".into(), Value::Map(file));
    Value::Map(page)
}

/// Whether `page` matches a source: `#tag`, or a folder path with
/// optional double quotes (`"Daily/2024"`).
fn matches_source(page: &Value, source: &str) -> bool {
    let file = page.get("file");
    if let Some(tag) = source.strip_prefix('#') {
        return file
            .get("tags")
            .as_list()
            .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)));
    }
    let folder = source.trim_matches('"').trim_matches('/');
    match file.get("path").as_str() {
        Some(path) if folder.is_empty() => !path.is_empty(),
        Some(path) => path
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/')),
        None => false,
    }
}

impl QueryApi for VaultIndex {
    fn pages(&self, source: Option<&str>) -> Vec<Value> {
        match source.map(str::trim).filter(|s| !s.is_empty()) {
            Some(source) => self
                .pages
                .iter()
                .filter(|page| matches_source(page, source))
                .cloned()
                .collect(),
            None => self.pages.clone(),
        }
    }

    fn page(&self, path: &str) -> Option<Value> {
        let path = path.trim_start_matches('/');
        let with_extension = format!("{path}.md");
        self.pages
            .iter()
            .find(|page| {
                let file_path = page.get("file").get("path").as_str();
                file_path == Some(path) || file_path == Some(with_extension.as_str())
            })
            .cloned()
    }
}
