// =============================================================================
// store.rs — THE SNAPSHOT, KEPT IN REDIS
// =============================================================================
//
// Two hashes per namespace:
//
//   <table>:active   name -> Record as JSON
//   <table>:closed   name -> Record as JSON plus a closed_at timestamp
//
// The snapshot for reconciliation is the whole active hash. Each write call
// turns one partition into one MULTI/EXEC pipeline. A record that cannot be
// serialized is logged and left out of its batch; the rest still go in.
//
// Redis does not roll back inside EXEC: a command refused at run time (say
// WRONGTYPE) fails alone while its neighbours apply. So the EXEC reply is read
// command by command, every refused record is logged, and the returned count
// is the records whose writes all succeeded. A batch that never executes
// (EXECABORT, lost connection) comes back as StoreError::Commit.
// =============================================================================

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::{AsyncCommands, ErrorKind, Pipeline, RedisError, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::models::{sort_by_position_name, Record};

/// The storage side of a sync run.
pub trait RecordStore {
    /// Every currently active record, in no particular order.
    async fn load_active(&self) -> Result<Vec<Record>, StoreError>;

    /// Add records to the active set. Returns how many were committed.
    async fn insert(&self, records: &[Record]) -> Result<usize, StoreError>;

    /// Move records from the active set to the closed set, keyed by name.
    async fn mark_absent(&self, records: &[Record]) -> Result<usize, StoreError>;

    /// Overwrite active records with the new side of each `(old, new)` pair.
    async fn update(&self, changes: &[(Record, Record)]) -> Result<usize, StoreError>;
}

/// Key names for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    pub active: String,
    pub closed: String,
}

impl Keys {
    pub fn new(table: &str) -> Self {
        Self {
            active: format!("{table}:active"),
            closed: format!("{table}:closed"),
        }
    }
}

/// What goes into the closed hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedRecord {
    #[serde(flatten)]
    pub record: Record,
    pub closed_at: DateTime<Utc>,
}

/// Redis-backed record store.
pub struct RedisStore {
    con: ConnectionManager,
    keys: Keys,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, table: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(StoreError::Connection)?;
        let con = ConnectionManager::new(client)
            .await
            .map_err(StoreError::Connection)?;

        info!(table = %table, "Redis connection established");

        Ok(Self {
            con,
            keys: Keys::new(table),
        })
    }

    /// Execute one batch and count the records it applied.
    async fn commit(&self, batch: Batch) -> Result<usize, StoreError> {
        let Batch {
            operation,
            pipe,
            owners,
        } = batch;

        if owners.is_empty() {
            return Ok(0);
        }

        let commit_error = |source| StoreError::Commit { operation, source };

        // MULTI and every QUEUED reply are skipped; the last reply is EXEC's.
        let mut con = self.con.clone();
        let mut replies = con
            .req_packed_commands(&pipe, owners.len() + 1, 1)
            .await
            .map_err(commit_error)?;

        let replies = match replies.pop() {
            Some(Value::Array(items)) if items.len() == owners.len() => items,
            other => {
                return Err(commit_error(RedisError::from((
                    ErrorKind::ResponseError,
                    "unexpected EXEC reply",
                    format!("{other:?}"),
                ))))
            }
        };

        let applied = tally(operation, &owners, replies);
        debug!(operation, applied, "batch committed");
        Ok(applied)
    }
}

/// An atomic pipeline plus the record name behind each queued command.
struct Batch {
    operation: &'static str,
    pipe: Pipeline,
    owners: Vec<String>,
}

impl Batch {
    fn new(operation: &'static str) -> Self {
        let mut pipe = redis::pipe();
        pipe.atomic();
        Self {
            operation,
            pipe,
            owners: Vec::new(),
        }
    }

    fn hset(&mut self, key: &str, name: &str, json: String) {
        self.pipe.hset(key, name, json);
        self.owners.push(name.to_string());
    }

    fn hdel(&mut self, key: &str, name: &str) {
        self.pipe.hdel(key, name);
        self.owners.push(name.to_string());
    }
}

/// Walk an EXEC reply alongside the command owners. A record counts as
/// applied only if every one of its commands succeeded.
fn tally(operation: &'static str, owners: &[String], replies: Vec<Value>) -> usize {
    let mut failed: HashSet<&str> = HashSet::new();

    for (name, reply) in owners.iter().zip(replies) {
        if let Err(source) = reply.extract_error() {
            let e = StoreError::Statement {
                name: name.clone(),
                source,
            };
            error!(operation, error = %e, "record not applied");
            failed.insert(name.as_str());
        }
    }

    let records: HashSet<&str> = owners.iter().map(String::as_str).collect();
    records.len() - failed.len()
}

impl RecordStore for RedisStore {
    async fn load_active(&self) -> Result<Vec<Record>, StoreError> {
        let mut con = self.con.clone();
        let entries: HashMap<String, String> = con
            .hgetall(&self.keys.active)
            .await
            .map_err(StoreError::Load)?;

        let records = decode_snapshot(entries)?;
        info!(records = records.len(), "snapshot loaded");
        Ok(records)
    }

    async fn insert(&self, records: &[Record]) -> Result<usize, StoreError> {
        let mut batch = Batch::new("insert");

        for record in records {
            if let Some(json) = encode("insert", &record.name, record) {
                batch.hset(&self.keys.active, &record.name, json);
            }
        }

        self.commit(batch).await
    }

    async fn mark_absent(&self, records: &[Record]) -> Result<usize, StoreError> {
        let closed_at = Utc::now();
        let mut batch = Batch::new("mark_absent");

        for record in records {
            let closed = ClosedRecord {
                record: record.clone(),
                closed_at,
            };
            if let Some(json) = encode("mark_absent", &record.name, &closed) {
                batch.hdel(&self.keys.active, &record.name);
                batch.hset(&self.keys.closed, &record.name, json);
            }
        }

        self.commit(batch).await
    }

    async fn update(&self, changes: &[(Record, Record)]) -> Result<usize, StoreError> {
        let mut batch = Batch::new("update");

        for (_, new) in changes {
            if let Some(json) = encode("update", &new.name, new) {
                batch.hset(&self.keys.active, &new.name, json);
            }
        }

        self.commit(batch).await
    }
}

/// Serialize one value for a batch. Failures are logged and the record is
/// left out.
fn encode<T: Serialize>(operation: &'static str, name: &str, value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(source) => {
            let e = StoreError::Encode {
                name: name.to_string(),
                source,
            };
            error!(operation, error = %e, "record skipped");
            None
        }
    }
}

/// Turn the raw active hash into records. One bad entry fails the load.
fn decode_snapshot(entries: HashMap<String, String>) -> Result<Vec<Record>, StoreError> {
    let mut records = entries
        .into_iter()
        .map(|(name, json)| {
            serde_json::from_str::<Record>(&json).map_err(|source| StoreError::Snapshot { name, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    sort_by_position_name(&mut records);
    Ok(records)
}
