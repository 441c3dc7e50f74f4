//! In-process replicated store.
//!
//! Each node holds its own copy of the partitions it owns; a partition lives
//! on `replication_factor` consecutive nodes starting at the hash of its key.
//! Every cell carries a write timestamp and replicas converge by
//! last-write-wins. Nodes can be taken down or made unresponsive, which makes
//! this engine a deterministic stand-in for a real cluster in tests and in
//! the command-line tool.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

use super::{
    ConsistencyLevel, EngineError, PreparedStatement, Row, Statement, StorageEngine, Value,
};
use crate::models::{TableSchema, TemperatureRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Up,
    /// Known dead; the engine refuses requests that need it.
    Down,
    /// Believed alive but never answers; requests that need it time out.
    Unresponsive,
}

/// One statement execution observed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub statement: Statement,
    pub level: ConsistencyLevel,
}

#[derive(Debug, Clone)]
struct Cell<T> {
    value: T,
    timestamp: u64,
}

impl<T: Clone> Cell<T> {
    fn newer(current: Option<&Cell<T>>, candidate: &Cell<T>) -> bool {
        current.map_or(true, |c| c.timestamp <= candidate.timestamp)
    }
}

#[derive(Debug, Clone, Default)]
struct Partition {
    name: Option<Cell<String>>,
    rows: BTreeMap<NaiveDate, Cell<TemperatureRecord>>,
}

impl Partition {
    fn merge_from(&mut self, other: &Partition) {
        if let Some(name) = &other.name {
            if Cell::newer(self.name.as_ref(), name) {
                self.name = Some(name.clone());
            }
        }
        for (date, cell) in &other.rows {
            if Cell::newer(self.rows.get(date), cell) {
                self.rows.insert(*date, cell.clone());
            }
        }
    }
}

#[derive(Debug)]
struct Node {
    state: NodeState,
    partitions: HashMap<String, Partition>,
}

enum Outcome {
    Done(Vec<Row>),
    TimedOut(EngineError),
}

pub struct ReplicatedMemoryEngine {
    nodes: Vec<RwLock<Node>>,
    schema: RwLock<Option<TableSchema>>,
    replica_timeout: Duration,
    clock: AtomicU64,
    next_statement_id: AtomicU64,
    faults: Mutex<VecDeque<EngineError>>,
    attempt_log: Option<Mutex<Vec<Attempt>>>,
}

impl ReplicatedMemoryEngine {
    pub fn new(node_count: u8, replica_timeout: Duration) -> Self {
        let nodes = (0..node_count.max(1))
            .map(|_| {
                RwLock::new(Node {
                    state: NodeState::Up,
                    partitions: HashMap::new(),
                })
            })
            .collect();

        Self {
            nodes,
            schema: RwLock::new(None),
            replica_timeout,
            clock: AtomicU64::new(1),
            next_statement_id: AtomicU64::new(1),
            faults: Mutex::new(VecDeque::new()),
            attempt_log: None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn replication_factor(&self) -> u8 {
        self.schema
            .read()
            .as_ref()
            .map(|s| s.replication_factor)
            .unwrap_or(1)
    }

    /// Nodes holding `partition_key`, in placement order.
    pub fn replicas_for(&self, partition_key: &str) -> Vec<usize> {
        let n = self.nodes.len();
        let rf = (self.replication_factor() as usize).min(n);
        let start = (fnv1a(partition_key.as_bytes()) % n as u64) as usize;
        (0..rf).map(|i| (start + i) % n).collect()
    }

    pub fn set_node_state(&self, node: usize, state: NodeState) {
        if let Some(lock) = self.nodes.get(node) {
            debug!("Node {} -> {:?}", node, state);
            lock.write().state = state;
        }
    }

    pub fn set_all_nodes(&self, state: NodeState) {
        for node in 0..self.nodes.len() {
            self.set_node_state(node, state);
        }
    }

    pub fn node_state(&self, node: usize) -> Option<NodeState> {
        self.nodes.get(node).map(|lock| lock.read().state)
    }

    /// Take down `count` of the replicas owning `partition_key`, last first,
    /// so the primary placement stays up for as long as possible.
    pub fn take_down_replicas(&self, partition_key: &str, count: usize) {
        for node in self.replicas_for(partition_key).into_iter().rev().take(count) {
            self.set_node_state(node, NodeState::Down);
        }
    }

    /// Fail the next `execute` call with `error`, before touching any replica.
    pub fn inject_fault(&self, error: EngineError) {
        self.faults.lock().push_back(error);
    }

    /// Record every `execute` call for later inspection. Off by default.
    pub fn with_attempt_log(mut self) -> Self {
        self.attempt_log = Some(Mutex::new(Vec::new()));
        self
    }

    /// Executions seen so far; always empty without [`Self::with_attempt_log`].
    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempt_log
            .as_ref()
            .map(|log| log.lock().clone())
            .unwrap_or_default()
    }

    pub fn clear_attempts(&self) {
        if let Some(log) = &self.attempt_log {
            log.lock().clear();
        }
    }

    /// Rows stored for `partition_key` on a single node, ignoring its state.
    pub fn local_row_count(&self, node: usize, partition_key: &str) -> usize {
        self.nodes
            .get(node)
            .and_then(|lock| lock.read().partitions.get(partition_key).map(|p| p.rows.len()))
            .unwrap_or(0)
    }

    fn check_params(statement: Statement, params: &[Value]) -> Result<(), EngineError> {
        let expected = statement.param_types();
        if params.len() != expected.len() {
            return Err(EngineError::InvalidQuery(format!(
                "{} expects {} parameters, got {}",
                statement,
                expected.len(),
                params.len()
            )));
        }
        for (i, (value, ty)) in params.iter().zip(expected).enumerate() {
            if value.column_type() != Some(*ty) {
                return Err(EngineError::InvalidQuery(format!(
                    "{} parameter {} must be {}, got {:?}",
                    statement,
                    i,
                    ty.cql(),
                    value
                )));
            }
        }
        Ok(())
    }

    fn run(
        &self,
        statement: Statement,
        level: ConsistencyLevel,
        params: &[Value],
    ) -> Result<Outcome, EngineError> {
        let partition_key = params
            .first()
            .and_then(Value::as_text)
            .ok_or_else(|| EngineError::InvalidQuery("missing partition key".to_string()))?
            .to_string();

        let replicas = self.replicas_for(&partition_key);
        let rf = replicas.len() as u8;
        let required = level.required_replicas(rf);

        let states: Vec<(usize, NodeState)> = replicas
            .iter()
            .map(|&node| (node, self.nodes[node].read().state))
            .collect();

        let alive = states.iter().filter(|(_, s)| *s != NodeState::Down).count() as u8;
        if alive == 0 {
            return Err(EngineError::NoHostAvailable {
                partition: partition_key,
            });
        }
        if alive < required || required > rf {
            return Err(EngineError::Unavailable {
                level,
                required,
                alive,
            });
        }

        let responders: Vec<usize> = states
            .iter()
            .filter(|(_, s)| *s == NodeState::Up)
            .map(|(node, _)| *node)
            .collect();

        if statement.is_write() {
            self.apply_write(statement, &partition_key, params, &responders);
            if (responders.len() as u8) < required {
                return Ok(Outcome::TimedOut(EngineError::WriteTimeout {
                    level,
                    received: responders.len() as u8,
                    required,
                }));
            }
            return Ok(Outcome::Done(Vec::new()));
        }

        if (responders.len() as u8) < required {
            return Ok(Outcome::TimedOut(EngineError::ReadTimeout {
                level,
                received: responders.len() as u8,
                required,
            }));
        }

        let merged = self.read_merged(&partition_key, &responders[..required as usize]);
        Ok(Outcome::Done(Self::project(statement, merged, params)))
    }

    fn apply_write(&self, statement: Statement, key: &str, params: &[Value], nodes: &[usize]) {
        let timestamp = self.clock.fetch_add(1, Ordering::SeqCst);

        for &node in nodes {
            let mut guard = self.nodes[node].write();
            let partition = guard.partitions.entry(key.to_string()).or_default();

            match (statement, params) {
                (
                    Statement::InsertTemperature,
                    [_, Value::Date(date), Value::Int(tmin), Value::Int(tmax)],
                ) => {
                    let cell = Cell {
                        value: TemperatureRecord::new(*tmin, *tmax),
                        timestamp,
                    };
                    if Cell::newer(partition.rows.get(date), &cell) {
                        partition.rows.insert(*date, cell);
                    }
                }
                (Statement::InsertStationName, [_, Value::Text(name)]) => {
                    let cell = Cell {
                        value: name.clone(),
                        timestamp,
                    };
                    if Cell::newer(partition.name.as_ref(), &cell) {
                        partition.name = Some(cell);
                    }
                }
                _ => {}
            }
            trace!("Applied {} for '{}' on node {} @{}", statement, key, node, timestamp);
        }
    }

    fn read_merged(&self, key: &str, nodes: &[usize]) -> Option<Partition> {
        let mut merged: Option<Partition> = None;
        for &node in nodes {
            let guard = self.nodes[node].read();
            if let Some(partition) = guard.partitions.get(key) {
                merged
                    .get_or_insert_with(Partition::default)
                    .merge_from(partition);
            }
        }
        merged
    }

    fn project(statement: Statement, partition: Option<Partition>, params: &[Value]) -> Vec<Row> {
        match statement {
            Statement::SelectStationName => partition
                .map(|p| {
                    let name = p.name.map(|c| Value::Text(c.value)).unwrap_or(Value::Null);
                    vec![Row::new().with("name", name)]
                })
                .unwrap_or_default(),
            Statement::SelectMaxTmax => {
                // Aggregates always yield one row; null when nothing matched.
                let max = partition
                    .and_then(|p| p.rows.values().map(|c| c.value.tmax).max())
                    .map(Value::Int)
                    .unwrap_or(Value::Null);
                vec![Row::new().with("max_temp", max)]
            }
            Statement::SelectStationRecords => {
                let (Some(from), Some(to)) = (
                    params.get(1).and_then(Value::as_date),
                    params.get(2).and_then(Value::as_date),
                ) else {
                    return Vec::new();
                };
                if from > to {
                    return Vec::new();
                }
                partition
                    .map(|p| {
                        p.rows
                            .range(from..=to)
                            .map(|(date, cell)| {
                                Row::new()
                                    .with("date", Value::Date(*date))
                                    .with("tmin", Value::Int(cell.value.tmin))
                                    .with("tmax", Value::Int(cell.value.tmax))
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            }
            Statement::InsertTemperature | Statement::InsertStationName => Vec::new(),
        }
    }
}

#[async_trait]
impl StorageEngine for ReplicatedMemoryEngine {
    async fn create_schema(&self, schema: &TableSchema) -> Result<(), EngineError> {
        if schema.replication_factor == 0 || schema.replication_factor as usize > self.nodes.len()
        {
            return Err(EngineError::InvalidQuery(format!(
                "replication factor {} not satisfiable with {} nodes",
                schema.replication_factor,
                self.nodes.len()
            )));
        }

        // Schema changes drop existing data, matching a fresh keyspace.
        for lock in &self.nodes {
            lock.write().partitions.clear();
        }
        *self.schema.write() = Some(schema.clone());
        debug!("Created {}", schema.qualified_table());
        Ok(())
    }

    async fn prepare(&self, statement: Statement) -> Result<PreparedStatement, EngineError> {
        if self
            .nodes
            .iter()
            .all(|lock| lock.read().state == NodeState::Down)
        {
            return Err(EngineError::NoHostAvailable {
                partition: String::new(),
            });
        }

        {
            let guard = self.schema.read();
            let schema = guard.as_ref().ok_or_else(|| {
                EngineError::SchemaMismatch("keyspace weather does not exist".to_string())
            })?;

            if let Some(column) = statement
                .columns()
                .iter()
                .find(|c| schema.column(c).is_none())
            {
                return Err(EngineError::SchemaMismatch(format!(
                    "undefined column '{}' in {}",
                    column,
                    schema.qualified_table()
                )));
            }
            if let Some(field) = statement
                .compound_fields()
                .iter()
                .find(|f| !schema.has_compound_field(f))
            {
                return Err(EngineError::SchemaMismatch(format!(
                    "undefined field '{}' in type {}",
                    field, schema.compound_type
                )));
            }
        }

        let id = self.next_statement_id.fetch_add(1, Ordering::Relaxed);
        Ok(PreparedStatement::new(id, statement))
    }

    async fn execute(
        &self,
        prepared: &PreparedStatement,
        level: ConsistencyLevel,
        params: &[Value],
    ) -> Result<Vec<Row>, EngineError> {
        if let Some(log) = &self.attempt_log {
            log.lock().push(Attempt {
                statement: prepared.statement,
                level,
            });
        }

        let fault = self.faults.lock().pop_front();
        if let Some(fault) = fault {
            return Err(fault);
        }

        if self.schema.read().is_none() {
            return Err(EngineError::SchemaMismatch(
                "keyspace weather does not exist".to_string(),
            ));
        }
        Self::check_params(prepared.statement, params)?;

        match self.run(prepared.statement, level, params)? {
            Outcome::Done(rows) => Ok(rows),
            Outcome::TimedOut(error) => {
                tokio::time::sleep(self.replica_timeout).await;
                Err(error)
            }
        }
    }

    async fn describe_table(&self) -> Result<String, EngineError> {
        self.schema
            .read()
            .as_ref()
            .map(TableSchema::create_table_cql)
            .ok_or_else(|| EngineError::SchemaMismatch("table weather.stations does not exist".to_string()))
    }

    fn name(&self) -> &'static str {
        "replicated-memory"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
