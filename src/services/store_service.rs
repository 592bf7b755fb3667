// src/services/store_service.rs
use async_trait::async_trait;
use redis::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing;

use crate::errors::{RideError, RideResult};
use crate::models::{driver::Driver, ride::RideRequest};
use crate::utils::retry::RetryPolicy;

/// Conditional-write attempts before a mutation gives up.
const MAX_MUTATION_ATTEMPTS: usize = 8;

// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "campus".to_string(),
        }
    }
}

// Store key strategies
#[derive(Debug, Clone)]
pub enum StoreKey {
    Simple(String),
    Composite(Vec<String>),
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::Simple(key) => f.write_str(key),
            StoreKey::Composite(parts) => f.write_str(&parts.join(":")),
        }
    }
}

/// Stored envelope. `version` increases by one on every successful write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub data: T,
}

// ------------------------------
// Traits
// ------------------------------

#[async_trait]
pub trait DocumentOperations<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &StoreKey) -> Result<Option<Versioned<T>>, StoreError>;
    /// Writes version 1. Returns false if the key already exists.
    async fn insert(&self, key: &StoreKey, value: &T) -> Result<bool, StoreError>;
    /// Writes `expected_version + 1` only if the stored version still equals
    /// `expected_version`. Returns false when another writer got there first.
    async fn compare_and_set(&self, key: &StoreKey, expected_version: u64, value: &T) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SetOperations: Send + Sync {
    async fn sadd(&self, key: &StoreKey, value: &str) -> Result<(), StoreError>;
    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError>;
    async fn srem(&self, key: &StoreKey, value: &str) -> Result<(), StoreError>;
}

// Enum to wrap different store implementations
pub enum Store {
    Redis(RedisStore),
    Memory(MemoryStore),
}

// Redis-based store implementation
pub struct RedisStore {
    connection: redis::aio::MultiplexedConnection,
}

// Compare-and-set on the JSON envelope's version field.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return -1
end
local doc = cjson.decode(current)
if tonumber(doc['version']) ~= tonumber(ARGV[1]) then
  return 0
end
redis.call('SET', KEYS[1], ARGV[2])
return 1
"#;

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Ok(Self { connection })
    }

    fn conn(&self) -> redis::aio::MultiplexedConnection {
        self.connection.clone()
    }
}

// -------- Redis impls --------

#[async_trait]
impl<T> DocumentOperations<T> for RedisStore
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &StoreKey) -> Result<Option<Versioned<T>>, StoreError> {
        let mut conn = self.conn();
        let data: Option<String> = redis::cmd("GET")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::OperationError(e.to_string()))?;

        data.map(|json| serde_json::from_str(&json).map_err(|e| StoreError::SerializationError(e.to_string())))
            .transpose()
    }

    async fn insert(&self, key: &StoreKey, value: &T) -> Result<bool, StoreError> {
        let json = encode(1, value)?;
        let mut conn = self.conn();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key.to_string())
            .arg(json)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::OperationError(e.to_string()))?;

        Ok(reply.is_some())
    }

    async fn compare_and_set(&self, key: &StoreKey, expected_version: u64, value: &T) -> Result<bool, StoreError> {
        let json = encode(expected_version + 1, value)?;
        let mut conn = self.conn();
        let outcome: i64 = redis::Script::new(CAS_SCRIPT)
            .key(key.to_string())
            .arg(expected_version)
            .arg(json)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::OperationError(e.to_string()))?;

        match outcome {
            1 => Ok(true),
            0 => Ok(false),
            _ => Err(StoreError::MissingDocument(key.to_string())),
        }
    }
}

#[async_trait]
impl SetOperations for RedisStore {
    async fn sadd(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = redis::cmd("SADD")
            .arg(key.to_string())
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::OperationError(e.to_string()))?;
        Ok(())
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn();
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::OperationError(e.to_string()))?;
        Ok(members)
    }

    async fn srem(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = redis::cmd("SREM")
            .arg(key.to_string())
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::OperationError(e.to_string()))?;
        Ok(())
    }
}

// Memory store for development/testing
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, String>>,
    sets: RwLock<HashMap<String, BTreeSet<String>>>,
    unavailable: AtomicBool,
    failing_index_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every operation fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes only set additions fail, leaving documents and reads working.
    pub fn set_index_writes_failing(&self, failing: bool) {
        self.failing_index_writes.store(failing, Ordering::SeqCst);
    }

    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::ConnectionError("memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

// -------- Memory impls --------

#[async_trait]
impl<T> DocumentOperations<T> for MemoryStore
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &StoreKey) -> Result<Option<Versioned<T>>, StoreError> {
        self.check_available()?;
        let documents = self.documents.read().await;

        documents
            .get(&key.to_string())
            .map(|json| serde_json::from_str(json).map_err(|e| StoreError::SerializationError(e.to_string())))
            .transpose()
    }

    async fn insert(&self, key: &StoreKey, value: &T) -> Result<bool, StoreError> {
        self.check_available()?;
        let json = encode(1, value)?;
        let mut documents = self.documents.write().await;

        let key_str = key.to_string();
        if documents.contains_key(&key_str) {
            return Ok(false);
        }
        documents.insert(key_str, json);
        Ok(true)
    }

    async fn compare_and_set(&self, key: &StoreKey, expected_version: u64, value: &T) -> Result<bool, StoreError> {
        self.check_available()?;
        let json = encode(expected_version + 1, value)?;
        let key_str = key.to_string();

        // Read and write under one write guard so the check cannot go stale.
        let mut documents = self.documents.write().await;
        let current = documents
            .get(&key_str)
            .ok_or_else(|| StoreError::MissingDocument(key_str.clone()))?;
        let stored: VersionOnly =
            serde_json::from_str(current).map_err(|e| StoreError::SerializationError(e.to_string()))?;

        if stored.version != expected_version {
            return Ok(false);
        }
        documents.insert(key_str, json);
        Ok(true)
    }
}

#[async_trait]
impl SetOperations for MemoryStore {
    async fn sadd(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        self.check_available()?;
        if self.failing_index_writes.load(Ordering::SeqCst) {
            return Err(StoreError::OperationError("index write rejected".to_string()));
        }
        let mut sets = self.sets.write().await;
        sets.entry(key.to_string()).or_default().insert(value.to_string());
        Ok(())
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        let sets = self.sets.read().await;
        Ok(sets
            .get(&key.to_string())
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn srem(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        self.check_available()?;
        let mut sets = self.sets.write().await;
        if let Some(members) = sets.get_mut(&key.to_string()) {
            members.remove(value);
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct VersionOnly {
    version: u64,
}

fn encode<T: Serialize>(version: u64, data: &T) -> Result<String, StoreError> {
    serde_json::to_string(&Versioned { version, data })
        .map_err(|e| StoreError::SerializationError(e.to_string()))
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Operation error: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Document missing: {0}")]
    MissingDocument(String),
}

impl From<StoreError> for RideError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ConnectionError(_) | StoreError::OperationError(_) => {
                RideError::UpstreamUnavailable(error.to_string())
            }
            StoreError::SerializationError(msg) => RideError::StoreSerialization(msg),
            StoreError::MissingDocument(key) => RideError::NotFound(key),
        }
    }
}

// Store key generators for different resources
pub struct StoreKeys {
    prefix: String,
}

impl StoreKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn key(&self, parts: &[&str]) -> StoreKey {
        let mut all = Vec::with_capacity(parts.len() + 1);
        all.push(self.prefix.clone());
        all.extend(parts.iter().map(|p| p.to_string()));
        StoreKey::Composite(all)
    }

    // Ride keys
    pub fn ride_by_id(&self, ride_id: &str) -> StoreKey {
        self.key(&["ride", "id", ride_id])
    }

    pub fn all_rides(&self) -> StoreKey {
        self.key(&["rides", "all"])
    }

    pub fn rides_by_requester(&self, requester_id: &str) -> StoreKey {
        self.key(&["rides", "requester", requester_id])
    }

    pub fn rides_by_driver(&self, driver_id: &str) -> StoreKey {
        self.key(&["rides", "driver", driver_id])
    }

    // Driver keys
    pub fn driver_by_id(&self, driver_id: &str) -> StoreKey {
        self.key(&["driver", "id", driver_id])
    }

    pub fn all_drivers(&self) -> StoreKey {
        self.key(&["drivers", "all"])
    }
}

// ------------------------------
// Enum delegations (Store)
// ------------------------------

#[async_trait]
impl<T> DocumentOperations<T> for Store
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &StoreKey) -> Result<Option<Versioned<T>>, StoreError> {
        match self {
            Store::Redis(store) => DocumentOperations::<T>::get(store, key).await,
            Store::Memory(store) => DocumentOperations::<T>::get(store, key).await,
        }
    }

    async fn insert(&self, key: &StoreKey, value: &T) -> Result<bool, StoreError> {
        match self {
            Store::Redis(store) => store.insert(key, value).await,
            Store::Memory(store) => store.insert(key, value).await,
        }
    }

    async fn compare_and_set(&self, key: &StoreKey, expected_version: u64, value: &T) -> Result<bool, StoreError> {
        match self {
            Store::Redis(store) => store.compare_and_set(key, expected_version, value).await,
            Store::Memory(store) => store.compare_and_set(key, expected_version, value).await,
        }
    }
}

#[async_trait]
impl SetOperations for Store {
    async fn sadd(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.sadd(key, value).await,
            Store::Memory(store) => store.sadd(key, value).await,
        }
    }

    async fn smembers(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        match self {
            Store::Redis(store) => store.smembers(key).await,
            Store::Memory(store) => store.smembers(key).await,
        }
    }

    async fn srem(&self, key: &StoreKey, value: &str) -> Result<(), StoreError> {
        match self {
            Store::Redis(store) => store.srem(key, value).await,
            Store::Memory(store) => store.srem(key, value).await,
        }
    }
}

// Store service wrapper
pub struct StoreService {
    store: Arc<Store>,
    keys: StoreKeys,
    retry: RetryPolicy,
}

impl StoreService {
    pub async fn new(config: StoreConfig, retry: RetryPolicy) -> Result<Self, StoreError> {
        let store = match config.redis_url.as_deref() {
            Some(url) => {
                tracing::info!("Using Redis document store");
                Store::Redis(RedisStore::new(url).await?)
            }
            None => {
                tracing::warn!("REDIS_URL not set, using in-memory document store");
                Store::Memory(MemoryStore::new())
            }
        };

        Ok(Self {
            store: Arc::new(store),
            keys: StoreKeys::new(config.key_prefix),
            retry,
        })
    }

    pub fn new_memory(retry: RetryPolicy) -> Self {
        Self {
            store: Arc::new(Store::Memory(MemoryStore::new())),
            keys: StoreKeys::new(StoreConfig::default().key_prefix),
            retry,
        }
    }

    pub fn backend(&self) -> &Store {
        &self.store
    }

    // Generic document helpers

    async fn read<T>(&self, operation: &str, key: &StoreKey) -> RideResult<Option<Versioned<T>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let store = self.store.as_ref();
        self.retry
            .run(operation, move || async move {
                DocumentOperations::<T>::get(store, key).await.map_err(RideError::from)
            })
            .await
    }

    async fn members(&self, operation: &str, key: &StoreKey) -> RideResult<Vec<String>> {
        let store = self.store.as_ref();
        self.retry
            .run(operation, move || async move { store.smembers(key).await.map_err(RideError::from) })
            .await
    }

    async fn index(&self, operation: &str, key: &StoreKey, member: &str) -> RideResult<()> {
        let store = self.store.as_ref();
        self.retry
            .run(operation, move || async move { store.sadd(key, member).await.map_err(RideError::from) })
            .await
    }

    async fn create<T>(&self, operation: &str, key: &StoreKey, value: &T) -> RideResult<()>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let inserted = self
            .retry
            .once(operation, async { self.store.insert(key, value).await.map_err(RideError::from) })
            .await?;

        if inserted {
            Ok(())
        } else {
            Err(RideError::conflict(format!("document already exists: {}", key)))
        }
    }

    /// Read-modify-write loop over a conditional write. `apply` runs on a copy;
    /// if it fails nothing is written and its error is returned as-is. When the
    /// write loses a race the document is re-read and `apply` re-validated.
    async fn mutate<T, F>(&self, key: &StoreKey, not_found: RideError, mut apply: F) -> RideResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnMut(&mut T) -> RideResult<()> + Send,
    {
        for attempt in 1..=MAX_MUTATION_ATTEMPTS {
            let Some(current) = self.read::<T>("store.read_for_update", key).await? else {
                return Err(not_found);
            };

            let mut next = current.data.clone();
            apply(&mut next)?;

            let written = self
                .retry
                .once("store.compare_and_set", async {
                    self.store
                        .compare_and_set(key, current.version, &next)
                        .await
                        .map_err(RideError::from)
                })
                .await?;

            if written {
                return Ok(next);
            }
            tracing::debug!(key = %key, attempt, "document changed concurrently, re-reading");
        }

        Err(RideError::ConcurrentModification(format!(
            "{} kept changing after {} attempts",
            key, MAX_MUTATION_ATTEMPTS
        )))
    }

    // Ride methods
    pub async fn get_ride(&self, ride_id: &str) -> RideResult<Option<RideRequest>> {
        let key = self.keys.ride_by_id(ride_id);
        Ok(self.read::<RideRequest>("store.get_ride", &key).await?.map(|doc| doc.data))
    }

    /// Indexes before the document is created: an index entry without a
    /// document is skipped on load, a document without one is never listed.
    pub async fn insert_ride(&self, ride: &RideRequest) -> RideResult<()> {
        self.index("store.index_ride", &self.keys.all_rides(), &ride.id).await?;
        self.index(
            "store.index_requester_ride",
            &self.keys.rides_by_requester(&ride.requester_id),
            &ride.id,
        )
        .await?;

        self.create("store.insert_ride", &self.keys.ride_by_id(&ride.id), ride).await
    }

    pub async fn mutate_ride<F>(&self, ride_id: &str, apply: F) -> RideResult<RideRequest>
    where
        F: FnMut(&mut RideRequest) -> RideResult<()> + Send,
    {
        let key = self.keys.ride_by_id(ride_id);
        self.mutate(&key, RideError::ride_not_found(ride_id), apply).await
    }

    pub async fn all_ride_ids(&self) -> RideResult<Vec<String>> {
        self.members("store.all_ride_ids", &self.keys.all_rides()).await
    }

    pub async fn ride_ids_for_requester(&self, requester_id: &str) -> RideResult<Vec<String>> {
        self.members("store.requester_rides", &self.keys.rides_by_requester(requester_id)).await
    }

    pub async fn ride_ids_for_driver(&self, driver_id: &str) -> RideResult<Vec<String>> {
        self.members("store.driver_rides", &self.keys.rides_by_driver(driver_id)).await
    }

    pub async fn index_driver_ride(&self, driver_id: &str, ride_id: &str) -> RideResult<()> {
        self.index("store.index_driver_ride", &self.keys.rides_by_driver(driver_id), ride_id).await
    }

    /// Loads rides concurrently, skipping ids whose document is gone.
    pub async fn load_rides(&self, ride_ids: &[String]) -> RideResult<Vec<RideRequest>> {
        let loaded = futures::future::try_join_all(ride_ids.iter().map(|id| self.get_ride(id))).await?;
        Ok(loaded.into_iter().flatten().collect())
    }

    pub async fn all_rides(&self) -> RideResult<Vec<RideRequest>> {
        let ids = self.all_ride_ids().await?;
        self.load_rides(&ids).await
    }

    // Driver methods
    pub async fn get_driver(&self, driver_id: &str) -> RideResult<Option<Driver>> {
        let key = self.keys.driver_by_id(driver_id);
        Ok(self.read::<Driver>("store.get_driver", &key).await?.map(|doc| doc.data))
    }

    pub async fn insert_driver(&self, driver: &Driver) -> RideResult<()> {
        self.index("store.index_driver", &self.keys.all_drivers(), &driver.id).await?;
        self.create("store.insert_driver", &self.keys.driver_by_id(&driver.id), driver).await
    }

    pub async fn mutate_driver<F>(&self, driver_id: &str, apply: F) -> RideResult<Driver>
    where
        F: FnMut(&mut Driver) -> RideResult<()> + Send,
    {
        let key = self.keys.driver_by_id(driver_id);
        self.mutate(&key, RideError::driver_not_found(driver_id), apply).await
    }

    pub async fn all_drivers(&self) -> RideResult<Vec<Driver>> {
        let ids = self.members("store.all_drivers", &self.keys.all_drivers()).await?;
        let loaded = futures::future::try_join_all(ids.iter().map(|id| self.get_driver(id))).await?;
        Ok(loaded.into_iter().flatten().collect())
    }
}

// Health check
impl StoreService {
    pub async fn health_check(&self) -> RideResult<()> {
        self.all_ride_ids().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Counter {
        value: u32,
    }

    fn key() -> StoreKey {
        StoreKey::Simple("test:counter".to_string())
    }

    fn service() -> StoreService {
        StoreService::new_memory(RetryPolicy::new(1, Duration::from_millis(200), 1))
    }

    #[test]
    fn test_key_layout() {
        let keys = StoreKeys::new("campus");
        assert_eq!(keys.ride_by_id("rid-261019-a1b2c").to_string(), "campus:ride:id:rid-261019-a1b2c");
        assert_eq!(keys.rides_by_requester("s1").to_string(), "campus:rides:requester:s1");
    }

    #[tokio::test]
    async fn test_memory_insert_is_create_only() {
        let store = MemoryStore::new();
        assert!(store.insert(&key(), &Counter { value: 1 }).await.unwrap());
        assert!(!store.insert(&key(), &Counter { value: 2 }).await.unwrap());

        let stored: Versioned<Counter> = DocumentOperations::<Counter>::get(&store, &key()).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.data, Counter { value: 1 });
    }

    #[tokio::test]
    async fn test_memory_compare_and_set_rejects_stale_version() {
        let store = MemoryStore::new();
        store.insert(&key(), &Counter { value: 1 }).await.unwrap();

        assert!(store.compare_and_set(&key(), 1, &Counter { value: 2 }).await.unwrap());
        assert!(!store.compare_and_set(&key(), 1, &Counter { value: 3 }).await.unwrap());

        let stored: Versioned<Counter> = DocumentOperations::<Counter>::get(&store, &key()).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.data.value, 2);
    }

    #[tokio::test]
    async fn test_mutate_leaves_document_untouched_on_error() {
        let service = service();
        service.create("test.create", &key(), &Counter { value: 5 }).await.unwrap();

        let result: RideResult<Counter> = service
            .mutate(&key(), RideError::not_found_for_test(), |counter: &mut Counter| {
                counter.value = 99;
                Err(RideError::AlreadyRated)
            })
            .await;
        assert!(matches!(result, Err(RideError::AlreadyRated)));

        let stored = service.read::<Counter>("test.read", &key()).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.data.value, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_do_not_lose_updates() {
        let service = Arc::new(service());
        service.create("test.create", &key(), &Counter { value: 0 }).await.unwrap();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .mutate(&key(), RideError::not_found_for_test(), |counter: &mut Counter| {
                            counter.value += 1;
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = service.read::<Counter>("test.read", &key()).await.unwrap().unwrap();
        assert_eq!(stored.data.value, 6);
        assert_eq!(stored.version, 7);
    }

    #[tokio::test]
    async fn test_outage_surfaces_as_upstream_unavailable() {
        let service = service();
        if let Store::Memory(memory) = service.backend() {
            memory.set_unavailable(true);
        }

        let result = service.get_ride("rid-261019-a1b2c").await;
        assert!(matches!(result, Err(RideError::UpstreamUnavailable(_))));
    }

    impl RideError {
        fn not_found_for_test() -> Self {
            RideError::NotFound("counter".to_string())
        }
    }
}
