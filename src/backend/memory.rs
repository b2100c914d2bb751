//! In-process backend.
//!
//! Keeps collections and records in memory behind a single async lock. It
//! understands a small subset of the PocketBase filter grammar: `field = value`
//! and `field != value` clauses joined with `&&`, where a value is a quoted
//! string, a number, `true`, `false` or `null`.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use super::{Backend, Collection, NewCollection, Record, RecordQuery};
use crate::error::{BackendError, BackendResult};

/// Length of generated ids, matching PocketBase's 15-character ids.
const ID_LEN: usize = 15;

#[derive(Default)]
struct Store {
    collections: Vec<Collection>,
    /// Records keyed by collection id, in insertion order.
    records: HashMap<String, Vec<Record>>,
}

impl Store {
    fn collection(&self, name_or_id: &str) -> BackendResult<&Collection> {
        self.collections
            .iter()
            .find(|c| c.id == name_or_id || c.name == name_or_id)
            .ok_or_else(|| BackendError::NotFound(name_or_id.to_string()))
    }
}

/// Backend that stores everything in memory.
#[derive(Default)]
pub struct MemoryBackend {
    store: RwLock<Store>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..ID_LEN].to_string()
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn find_all_collections(&self, kind: Option<&str>) -> BackendResult<Vec<Collection>> {
        let store = self.store.read().await;
        Ok(store
            .collections
            .iter()
            .filter(|c| kind.map_or(true, |k| c.kind == k))
            .cloned()
            .collect())
    }

    async fn find_collection_by_name_or_id(&self, name_or_id: &str) -> BackendResult<Collection> {
        let store = self.store.read().await;
        store.collection(name_or_id).cloned()
    }

    async fn create_collection(&self, collection: NewCollection) -> BackendResult<Collection> {
        if collection.name.trim().is_empty() {
            return Err(BackendError::Validation(
                "collection name cannot be blank".to_string(),
            ));
        }

        let mut store = self.store.write().await;
        if store.collections.iter().any(|c| c.name == collection.name) {
            return Err(BackendError::Validation(format!(
                "collection '{}' already exists",
                collection.name
            )));
        }

        let created = Collection {
            id: new_id(),
            name: collection.name,
            kind: collection.kind,
            fields: collection.fields,
        };
        store.collections.push(created.clone());
        store.records.insert(created.id.clone(), Vec::new());
        Ok(created)
    }

    async fn find_records_by_filter(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> BackendResult<Vec<Record>> {
        let clauses = parse_filter(&query.filter)?;
        let sort = parse_sort(&query.sort);

        let store = self.store.read().await;
        let collection = store.collection(collection)?;
        let mut matched: Vec<Record> = store
            .records
            .get(&collection.id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| clauses.iter().all(|c| c.matches(r)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !sort.is_empty() {
            matched.sort_by(|a, b| compare_records(a, b, &sort));
        }

        let limit = if query.limit == 0 { usize::MAX } else { query.limit };
        Ok(matched.into_iter().skip(query.offset).take(limit).collect())
    }

    async fn find_record_by_id(&self, collection: &Collection, id: &str) -> BackendResult<Record> {
        let store = self.store.read().await;
        store
            .records
            .get(&collection.id)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn save(&self, mut record: Record) -> BackendResult<Record> {
        let mut store = self.store.write().await;
        let collection = store.collection(&record.collection_id)?.clone();

        for field in collection.fields.iter().filter(|f| f.required) {
            let blank = match record.get(&field.name) {
                None | Some(JsonValue::Null) => true,
                Some(JsonValue::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if blank {
                return Err(BackendError::Validation(format!(
                    "field '{}' cannot be blank",
                    field.name
                )));
            }
        }

        let records = store.records.entry(collection.id).or_default();
        if record.is_new() {
            record.id = new_id();
            records.push(record.clone());
        } else {
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => return Err(BackendError::NotFound(record.id)),
            }
        }
        Ok(record)
    }

    async fn delete(&self, record: &Record) -> BackendResult<()> {
        let mut store = self.store.write().await;
        let records = store
            .records
            .get_mut(&record.collection_id)
            .ok_or_else(|| BackendError::NotFound(record.collection_id.clone()))?;
        let before = records.len();
        records.retain(|r| r.id != record.id);
        if records.len() == before {
            return Err(BackendError::NotFound(record.id.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct Clause {
    field: String,
    negated: bool,
    value: JsonValue,
}

impl Clause {
    fn matches(&self, record: &Record) -> bool {
        let actual = if self.field == "id" {
            Some(JsonValue::String(record.id.clone()))
        } else {
            record.get(&self.field).cloned()
        };
        let equal = match (&actual, &self.value) {
            (None, JsonValue::Null) => true,
            (Some(a), b) => values_equal(a, b),
            (None, _) => false,
        };
        equal != self.negated
    }
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Split on `&&` outside of quoted strings.
fn split_clauses(filter: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    let bytes = filter.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '&' && bytes.get(i + 1) == Some(&b'&') => {
                parts.push(&filter[start..i]);
                i += 2;
                start = i;
                continue;
            }
            None => {}
        }
        i += 1;
    }
    parts.push(&filter[start..]);
    parts
}

/// Byte offset of the first `needle` outside of quoted strings.
fn find_unquoted(text: &str, needle: u8) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in text.as_bytes().iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == needle => return Some(i),
            None => {}
        }
    }
    None
}

fn parse_filter(filter: &str) -> BackendResult<Vec<Clause>> {
    if filter.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_clauses(filter).into_iter().map(parse_clause).collect()
}

fn parse_clause(clause: &str) -> BackendResult<Clause> {
    let invalid = || BackendError::InvalidFilter(clause.trim().to_string());

    let eq = find_unquoted(clause, b'=').ok_or_else(invalid)?;
    let (field, negated) = match clause[..eq].strip_suffix('!') {
        Some(field) => (field, true),
        None => (&clause[..eq], false),
    };
    let raw = &clause[eq + 1..];

    let field = field.trim();
    if field.is_empty()
        || !field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(invalid());
    }

    let raw = raw.trim();
    let value = if raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')))
    {
        JsonValue::String(raw[1..raw.len() - 1].to_string())
    } else {
        match serde_json::from_str::<JsonValue>(raw) {
            Ok(v @ (JsonValue::Number(_) | JsonValue::Bool(_) | JsonValue::Null)) => v,
            _ => return Err(invalid()),
        }
    };

    Ok(Clause {
        field: field.to_string(),
        negated,
        value,
    })
}

/// Parse `field,-other` into (field, descending) pairs.
fn parse_sort(sort: &str) -> Vec<(String, bool)> {
    sort.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('-') {
            Some(field) => (field.to_string(), true),
            None => (s.trim_start_matches('+').to_string(), false),
        })
        .collect()
}

fn compare_records(a: &Record, b: &Record, sort: &[(String, bool)]) -> Ordering {
    for (field, descending) in sort {
        let ord = compare_values(a.get(field), b.get(field));
        let ord = if *descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(p), Some(q)) => p.partial_cmp(&q).unwrap_or(Ordering::Equal),
            _ => match (x.as_str(), y.as_str()) {
                (Some(p), Some(q)) => p.cmp(q),
                _ => x.to_string().cmp(&y.to_string()),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CollectionField;
    use serde_json::json;

    async fn seeded() -> (MemoryBackend, Collection) {
        let backend = MemoryBackend::new();
        let posts = backend
            .create_collection(NewCollection {
                name: "posts".to_string(),
                kind: "base".to_string(),
                fields: vec![CollectionField::new("title", "text", true)],
            })
            .await
            .unwrap();

        for (title, published, views) in [("a", true, 3), ("b", false, 10), ("c && d", true, 1)] {
            let mut record = Record::new(&posts);
            record.set("title", json!(title));
            record.set("published", json!(published));
            record.set("views", json!(views));
            backend.save(record).await.unwrap();
        }
        (backend, posts)
    }

    fn query(filter: &str) -> RecordQuery {
        RecordQuery {
            filter: filter.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_filter_clauses() {
        let (backend, _) = seeded().await;

        let all = backend.find_records_by_filter("posts", &query("")).await.unwrap();
        assert_eq!(all.len(), 3);

        let published = backend
            .find_records_by_filter("posts", &query("published = true"))
            .await
            .unwrap();
        assert_eq!(published.len(), 2);

        let both = backend
            .find_records_by_filter("posts", &query("published = true && title != 'a'"))
            .await
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].get("title"), Some(&json!("c && d")));
    }

    #[tokio::test]
    async fn test_operators_inside_quotes_are_literal() {
        let (backend, posts) = seeded().await;
        let mut record = Record::new(&posts);
        record.set("title", json!("a!=b"));
        backend.save(record).await.unwrap();

        let hits = backend
            .find_records_by_filter("posts", &query("title = 'a!=b'"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let rest = backend
            .find_records_by_filter("posts", &query("title != \"a!=b\""))
            .await
            .unwrap();
        assert_eq!(rest.len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_filter_is_rejected() {
        let (backend, _) = seeded().await;
        let err = backend
            .find_records_by_filter("posts", &query("title ~ 'a'"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn test_limit_offset_and_sort() {
        let (backend, _) = seeded().await;
        let page = backend
            .find_records_by_filter(
                "posts",
                &RecordQuery {
                    sort: "-views".to_string(),
                    limit: 2,
                    offset: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let views: Vec<_> = page.iter().map(|r| r.get("views").cloned()).collect();
        assert_eq!(views, vec![Some(json!(3)), Some(json!(1))]);
    }

    #[tokio::test]
    async fn test_required_field_is_enforced() {
        let (backend, posts) = seeded().await;
        let err = backend.save(Record::new(&posts)).await.unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let (backend, posts) = seeded().await;
        let first = backend
            .find_records_by_filter("posts", &query(""))
            .await
            .unwrap()
            .remove(0);
        assert_eq!(first.id.len(), ID_LEN);

        backend.delete(&first).await.unwrap();
        let err = backend.delete(&first).await.unwrap_err();
        assert_eq!(err, BackendError::NotFound(first.id.clone()));
        assert!(backend.find_record_by_id(&posts, &first.id).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_collection_name() {
        let (backend, _) = seeded().await;
        let err = backend
            .create_collection(NewCollection {
                name: "posts".to_string(),
                kind: "base".to_string(),
                fields: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
    }
}
