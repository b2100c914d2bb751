//! Demo data.
//!
//! Seeds a `posts` collection and a handful of records so the tools have
//! something to show on a fresh instance. Everything here is best effort:
//! failures are logged and reported, never fatal.

use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use crate::backend::{Backend, CollectionField, NewCollection, Record};

/// Name of the demo collection.
pub const DEMO_COLLECTION: &str = "posts";

/// What a seeding run managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Whether the collection was created by this run.
    pub collection_created: bool,
    /// Number of records saved.
    pub records_created: usize,
}

fn demo_fields() -> Vec<CollectionField> {
    vec![
        CollectionField::new("title", "text", true),
        CollectionField::new("content", "editor", true),
        CollectionField::new("author", "text", true),
        CollectionField::new("published", "bool", false),
        CollectionField::new("tags", "text", false),
    ]
}

fn demo_posts() -> Vec<JsonValue> {
    vec![
        json!({
            "title": "Welcome to PocketBase",
            "content": "A sample post created with PocketBase, an open source realtime backend and database.",
            "author": "Administrator",
            "published": true,
            "tags": "pocketbase,backend,database",
        }),
        json!({
            "title": "MCP server integration",
            "content": "The Model Context Protocol server lets an AI assistant operate the database.",
            "author": "Developer",
            "published": true,
            "tags": "mcp,ai,integration",
        }),
        json!({
            "title": "Test post",
            "content": "A draft used to check that everything works.",
            "author": "Tester",
            "published": false,
            "tags": "test,demo",
        }),
    ]
}

/// Poll the backend until it answers, giving up after `attempts` tries.
pub async fn wait_until_ready(backend: &dyn Backend, attempts: usize, delay: Duration) -> bool {
    for attempt in 1..=attempts {
        match backend.find_all_collections(None).await {
            Ok(_) => return true,
            Err(err) => {
                if attempt == attempts {
                    warn!(error = %err, "Backend did not become ready");
                } else {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    false
}

/// Create the demo collection (if absent) and add the demo records.
pub async fn seed(backend: &dyn Backend) -> SeedReport {
    let mut report = SeedReport::default();

    let created = backend
        .create_collection(NewCollection {
            name: DEMO_COLLECTION.to_string(),
            kind: "base".to_string(),
            fields: demo_fields(),
        })
        .await;
    let collection = match created {
        Ok(collection) => {
            info!(collection = DEMO_COLLECTION, "Demo collection created");
            report.collection_created = true;
            collection
        }
        Err(err) => {
            warn!(collection = DEMO_COLLECTION, error = %err, "Demo collection may already exist");
            match backend.find_collection_by_name_or_id(DEMO_COLLECTION).await {
                Ok(collection) => collection,
                Err(err) => {
                    warn!(collection = DEMO_COLLECTION, error = %err, "Demo collection unavailable");
                    return report;
                }
            }
        }
    };

    for post in demo_posts() {
        let mut record = Record::new(&collection);
        if let JsonValue::Object(fields) = post {
            for (key, value) in fields {
                record.set(&key, value);
            }
        }
        let title = record
            .get("title")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();

        match backend.save(record).await {
            Ok(saved) => {
                info!(id = %saved.id, %title, "Demo record created");
                report.records_created += 1;
            }
            Err(err) => warn!(%title, error = %err, "Demo record creation failed"),
        }
    }

    report
}
