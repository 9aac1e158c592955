//! In-memory session that records what it is asked to run.
//!
//! Answers are scripted by a responder closure, so facade behaviour can be
//! exercised without a live store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use cassorm_proto::{CompiledStatement, Row, RowSet};

use super::{Connector, RowStream, Session, StoreError};
use crate::config::ConnectionConfig;

type Responder = dyn Fn(&CompiledStatement) -> Result<RowSet, StoreError> + Send + Sync;
type BatchResponder = dyn Fn(&[CompiledStatement]) -> Result<(), StoreError> + Send + Sync;
type StreamResponder = dyn Fn(&CompiledStatement) -> Vec<Result<Row, StoreError>> + Send + Sync;

/// One call observed by a [`RecordingSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// `execute`.
    Execute(CompiledStatement),
    /// `batch`.
    Batch(Vec<CompiledStatement>),
    /// `stream`.
    Stream(CompiledStatement),
    /// `shutdown`.
    Shutdown,
}

/// Session double that logs every call and answers from closures.
pub struct RecordingSession {
    keyspace: Option<String>,
    log: Mutex<Vec<Recorded>>,
    responder: Box<Responder>,
    batch_responder: Box<BatchResponder>,
    stream_responder: Option<Box<StreamResponder>>,
    shut_down: AtomicBool,
}

impl RecordingSession {
    /// Session that answers every statement with no rows.
    pub fn new() -> Self {
        Self {
            keyspace: None,
            log: Mutex::new(Vec::new()),
            responder: Box::new(|_: &CompiledStatement| Ok(Vec::new())),
            batch_responder: Box::new(|_: &[CompiledStatement]| Ok(())),
            stream_responder: None,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Bind to a keyspace.
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// Answer `execute` calls, and `stream` calls unless
    /// [`stream_with`](Self::stream_with) is set, with `responder`.
    pub fn respond_with<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompiledStatement) -> Result<RowSet, StoreError> + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    /// Answer `batch` calls with `responder`.
    pub fn respond_to_batches_with<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[CompiledStatement]) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        self.batch_responder = Box::new(responder);
        self
    }

    /// Answer `stream` calls with the items `responder` returns, so a
    /// stream can fail part way through.
    pub fn stream_with<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompiledStatement) -> Vec<Result<Row, StoreError>> + Send + Sync + 'static,
    {
        self.stream_responder = Some(Box::new(responder));
        self
    }

    /// Every call so far, in order.
    pub fn log(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.log.lock().clear();
    }

    /// Whether `shutdown` was called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn record(&self, call: Recorded) {
        self.log.lock().push(call);
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Session for RecordingSession {
    fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    async fn execute(&self, statement: &CompiledStatement) -> Result<RowSet, StoreError> {
        self.record(Recorded::Execute(statement.clone()));
        (self.responder)(statement)
    }

    async fn batch(&self, statements: &[CompiledStatement]) -> Result<(), StoreError> {
        self.record(Recorded::Batch(statements.to_vec()));
        (self.batch_responder)(statements)
    }

    async fn stream(&self, statement: &CompiledStatement) -> Result<RowStream, StoreError> {
        self.record(Recorded::Stream(statement.clone()));
        if let Some(responder) = &self.stream_responder {
            return Ok(stream::iter(responder(statement)).boxed());
        }
        let rows = (self.responder)(statement)?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    async fn shutdown(&self) -> Result<(), StoreError> {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.record(Recorded::Shutdown);
        }
        Ok(())
    }
}

/// Connector handing out one shared [`RecordingSession`].
pub struct RecordingConnector {
    session: Arc<RecordingSession>,
    connects: AtomicUsize,
}

impl RecordingConnector {
    /// Wrap a session.
    pub fn new(session: RecordingSession) -> Self {
        Self {
            session: Arc::new(session),
            connects: AtomicUsize::new(0),
        }
    }

    /// The shared session, for inspecting its log.
    pub fn session(&self) -> Arc<RecordingSession> {
        self.session.clone()
    }

    /// Number of successful `connect` calls.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn Session>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.session.clone())
    }
}
