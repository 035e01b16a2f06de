//! In-process document driver for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use entitystore::{ConnectOptions, Connector, Credentials, DocumentDriver, DocumentStore, Store};
use entitystore_common::{ConnectionError, Error, Result, StoreError};

/// Documents per collection, plus failure switches and call counters
#[derive(Default)]
pub struct FakeDriver {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    pub fail_open: AtomicBool,
    pub fail_auth: AtomicBool,
    pub fail_close: AtomicBool,
    pub fail_find: AtomicBool,
    closed: AtomicBool,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub data_calls: AtomicUsize,
    pub last_credentials: Mutex<Option<Credentials>>,
    pub last_query: Mutex<Option<Document>>,
    pub last_sort: Mutex<Option<Document>>,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a raw document as-is, assigning `_id` when missing
    pub fn seed(&self, collection: &str, mut document: Document) -> ObjectId {
        let id = match document.get_object_id("_id") {
            Ok(id) => id,
            Err(_) => {
                let id = ObjectId::new();
                document.insert("_id", id);
                id
            }
        };
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(document);
        id
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn data_calls(&self) -> usize {
        self.data_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(AtomicOrdering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::SeqCst)
    }

    // a closed driver rejects data calls, like a shut-down client
    fn touch(&self) -> Result<()> {
        self.data_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.is_closed() {
            return Err(StoreError::Backend("client shut down".into()).into());
        }
        Ok(())
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        (Bson::Null, _) => Some(Ordering::Less),
        (_, Bson::Null) => Some(Ordering::Greater),
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        _ => number(a)?.partial_cmp(&number(b)?),
    }
}

#[allow(clippy::cast_precision_loss)]
fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn field(document: &Document, key: &str) -> Bson {
    document.get(key).cloned().unwrap_or(Bson::Null)
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| {
        let actual = field(document, key);
        match condition {
            Bson::Document(operators) if operators.keys().all(|k| k.starts_with('$')) => {
                operators.iter().all(|(op, expected)| {
                    let ordering = compare(&actual, expected);
                    match op.as_str() {
                        "$eq" => ordering == Some(Ordering::Equal),
                        "$gt" => ordering == Some(Ordering::Greater),
                        "$gte" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                        "$lt" => ordering == Some(Ordering::Less),
                        "$lte" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                        _ => false,
                    }
                })
            }
            expected => compare(&actual, expected) == Some(Ordering::Equal),
        }
    })
}

fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|a, b| {
        for (key, direction) in sort {
            let ordering = compare(&field(a, key), &field(b, key)).unwrap_or(Ordering::Equal);
            let ordering = if number(direction).is_some_and(|d| d < 0.0) {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl DocumentDriver for FakeDriver {
    async fn open(&self) -> Result<()> {
        self.opens.fetch_add(1, AtomicOrdering::SeqCst);
        self.closed.store(false, AtomicOrdering::SeqCst);
        if self.fail_open.load(AtomicOrdering::SeqCst) {
            return Err(ConnectionError::ConnectionFailed("connection refused".into()).into());
        }
        Ok(())
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        *self.last_credentials.lock() = Some(credentials.clone());
        if self.fail_auth.load(AtomicOrdering::SeqCst) {
            return Err(ConnectionError::AuthenticationFailed("bad credentials".into()).into());
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, AtomicOrdering::SeqCst);
        self.closed.store(true, AtomicOrdering::SeqCst);
        if self.fail_close.load(AtomicOrdering::SeqCst) {
            return Err(Error::Internal("socket already gone".into()));
        }
        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<ObjectId> {
        self.touch()?;
        let id = ObjectId::new();
        let mut stored = bson::doc! { "_id": id };
        for (key, value) in document {
            stored.insert(key, value);
        }
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(stored);
        Ok(id)
    }

    async fn replace_one(&self, collection: &str, id: ObjectId, document: Document) -> Result<u64> {
        self.touch()?;
        let mut collections = self.collections.lock();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match documents
            .iter_mut()
            .find(|d| d.get_object_id("_id").ok() == Some(id))
        {
            Some(existing) => {
                let mut replacement = bson::doc! { "_id": id };
                for (key, value) in document {
                    replacement.insert(key, value);
                }
                *existing = replacement;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.touch()?;
        Ok(self
            .documents(collection)
            .into_iter()
            .find(|d| matches(d, &filter)))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
        self.touch()?;
        let mut collections = self.collections.lock();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match documents.iter().position(|d| matches(d, &filter)) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<Document>> {
        self.touch()?;
        *self.last_query.lock() = Some(filter.clone());
        *self.last_sort.lock() = sort.clone();
        if self.fail_find.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Backend("cursor killed".into()).into());
        }
        let mut found: Vec<Document> = self
            .documents(collection)
            .into_iter()
            .filter(|d| matches(d, &filter))
            .collect();
        if let Some(sort) = &sort {
            sort_documents(&mut found, sort);
        }
        Ok(found)
    }
}

/// Connector handing out one fixed [`FakeDriver`]
pub struct FakeConnector {
    pub driver: Arc<FakeDriver>,
    pub creates: AtomicUsize,
}

impl FakeConnector {
    pub fn new(driver: Arc<FakeDriver>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            creates: AtomicUsize::new(0),
        })
    }

    pub fn creates(&self) -> usize {
        self.creates.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn create(&self, _location: &str, _options: &ConnectOptions) -> Result<Arc<dyn DocumentDriver>> {
        self.creates.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self.driver.clone())
    }

    fn vendor_name(&self) -> &'static str {
        "fake"
    }
}

pub fn options_for(driver: &Arc<FakeDriver>) -> ConnectOptions {
    ConnectOptions::new()
        .with_database("test")
        .with_vendor(FakeConnector::new(driver.clone()))
}

/// A store connected to a fresh fake driver
pub async fn connected_store() -> (DocumentStore, Arc<FakeDriver>) {
    let driver = FakeDriver::new();
    let store = DocumentStore::new();
    store
        .connect("fake://test", Some(options_for(&driver)))
        .await
        .expect("fake connect");
    (store, driver)
}
