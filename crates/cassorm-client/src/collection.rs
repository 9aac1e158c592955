//! Collection execution facade.
//!
//! A [`Collection`] pairs one compiled schema with the session of its
//! connection. Every operation compiles first and only then talks to the
//! store, so compilation errors never leave side effects behind.
//!
//! Update and destroy that do not pin the full key read the matching keys
//! and then write one batch. Rows changed by other clients between the two
//! steps are not detected.

use std::sync::Arc;

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use cassorm_core::migration::{self, MigrateMode, TableDescription};
use cassorm_core::query::{decode_raw_row, decode_row, merge_record, MutationPlan, StatementBuilder};
use cassorm_core::{ModelDef, SchemaDescriptor};
use cassorm_proto::{CompiledStatement, Criteria, RawQuery, Record, RowSet};

use crate::error::{Error, Result};
use crate::session::Session;

/// Records decoded from a row stream.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// Drop the first `skip` records and end after `limit`. Errors are passed
/// through and count against neither bound.
fn page(records: RecordStream, skip: usize, limit: usize) -> RecordStream {
    records
        .scan((skip, limit), |(to_skip, remaining), item| {
            let next = match item {
                _ if *remaining == 0 => None,
                Err(e) => Some(Some(Err(e))),
                Ok(_) if *to_skip > 0 => {
                    *to_skip -= 1;
                    Some(None)
                }
                Ok(record) => {
                    *remaining -= 1;
                    Some(Some(Ok(record)))
                }
            };
            future::ready(next)
        })
        .filter_map(future::ready)
        .boxed()
}

/// One model bound to a live session.
pub struct Collection {
    schema: Arc<SchemaDescriptor>,
    session: Arc<dyn Session>,
}

impl Collection {
    /// Compile a model and bind it to a session.
    pub fn new(model: &ModelDef, session: Arc<dyn Session>) -> Result<Self> {
        let schema = SchemaDescriptor::compile(model)?;
        Ok(Self::from_schema(schema, session))
    }

    /// Bind an already compiled schema to a session.
    pub fn from_schema(schema: SchemaDescriptor, session: Arc<dyn Session>) -> Self {
        Self {
            schema: Arc::new(schema),
            session,
        }
    }

    /// Compiled schema.
    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Normalise ORM criteria. A bare value addresses the partition key.
    pub fn criteria(&self, value: &Value) -> Result<Criteria> {
        Ok(Criteria::parse(value, self.schema.partition_attribute())?)
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.schema)
    }

    async fn execute(&self, statement: &CompiledStatement) -> Result<RowSet> {
        tracing::debug!(
            table = %self.schema.table_name(),
            kind = %statement.kind,
            cql = %statement.text,
            params = statement.params.len(),
            "executing statement"
        );
        Ok(self.session.execute(statement).await?)
    }

    async fn submit_batch(&self, statements: &[CompiledStatement]) -> Result<()> {
        tracing::debug!(
            table = %self.schema.table_name(),
            statements = statements.len(),
            "executing batch"
        );
        Ok(self.session.batch(statements).await?)
    }

    /// Insert one record and return it with its generated key and defaults.
    pub async fn create(&self, record: Record) -> Result<Record> {
        let plan = self.builder().insert(&record)?;
        self.submit_batch(std::slice::from_ref(&plan.statement)).await?;
        Ok(plan.record)
    }

    /// Insert records in one batch.
    ///
    /// Every record is validated before anything is submitted; one bad
    /// record fails the whole call.
    pub async fn create_each(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let builder = self.builder();
        let plans = records
            .iter()
            .map(|record| builder.insert(record))
            .collect::<cassorm_core::Result<Vec<_>>>()?;

        let (statements, created): (Vec<_>, Vec<_>) =
            plans.into_iter().map(|p| (p.statement, p.record)).unzip();
        self.submit_batch(&statements).await?;
        Ok(created)
    }

    /// Find matching records.
    ///
    /// `skip` is applied here; the statement limit already covers the
    /// skipped rows.
    pub async fn find(&self, criteria: &Criteria) -> Result<Vec<Record>> {
        let builder = self.builder();
        let statement = builder.select(criteria)?;
        let pinned = builder.pinned_key(criteria)?.is_some();

        let rows = self.execute(&statement).await?;
        let records = rows.iter().map(|row| decode_row(&self.schema, row));
        if pinned {
            return Ok(records.collect());
        }

        let skip = criteria.skip.unwrap_or(0) as usize;
        let limit = criteria.limit.map_or(usize::MAX, |l| l as usize);
        Ok(records.skip(skip).take(limit).collect())
    }

    /// Count matching rows. A limit caps the count.
    pub async fn count(&self, criteria: &Criteria) -> Result<u64> {
        let statement = self.builder().count(criteria)?;
        let rows = self.execute(&statement).await?;
        let count = rows
            .first()
            .and_then(|row| row.iter().next())
            .and_then(|(_, value)| value.as_i64())
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Update matching rows and return, per row, its key merged with the
    /// update values. The store is not re-read.
    pub async fn update(&self, criteria: &Criteria, values: &Record) -> Result<Vec<Record>> {
        let plan = self.builder().update(criteria, values)?;
        let keys = self.run_mutation(plan.plan).await?;
        Ok(keys
            .into_iter()
            .map(|key| merge_record(key, &plan.values))
            .collect())
    }

    /// Delete matching rows and return their keys.
    pub async fn destroy(&self, criteria: &Criteria) -> Result<Vec<Record>> {
        let plan = self.builder().delete(criteria)?;
        self.run_mutation(plan).await
    }

    async fn run_mutation(&self, plan: MutationPlan) -> Result<Vec<Record>> {
        match plan {
            MutationPlan::Direct { statement, key } => {
                self.execute(&statement).await?;
                Ok(vec![key])
            }
            MutationPlan::SelectThenMutate { select, template } => {
                let rows = self.execute(&select).await?;
                if rows.is_empty() {
                    return Ok(Vec::new());
                }
                let statements = rows
                    .iter()
                    .map(|row| template.bind(row))
                    .collect::<cassorm_core::Result<Vec<_>>>()?;
                self.submit_batch(&statements).await?;
                Ok(rows.iter().map(|row| template.key_record(row)).collect())
            }
        }
    }

    /// Stream matching records as the session yields them.
    pub async fn stream(&self, criteria: &Criteria) -> Result<RecordStream> {
        let builder = self.builder();
        let statement = builder.select(criteria)?;
        let pinned = builder.pinned_key(criteria)?.is_some();

        tracing::debug!(
            table = %self.schema.table_name(),
            cql = %statement.text,
            "streaming statement"
        );
        let rows = self.session.stream(&statement).await?;

        let schema = self.schema.clone();
        let records = rows
            .map(move |row| -> Result<Record> { Ok(decode_row(&schema, &row?)) })
            .boxed();
        if pinned {
            return Ok(records);
        }
        let skip = criteria.skip.unwrap_or(0) as usize;
        let limit = criteria.limit.map_or(usize::MAX, |l| l as usize);
        Ok(page(records, skip, limit))
    }

    /// Push matching records into `sink` and return how many were sent.
    ///
    /// A bounded channel makes the producer wait for the consumer.
    pub async fn stream_to(&self, criteria: &Criteria, sink: mpsc::Sender<Record>) -> Result<usize> {
        let mut records = self.stream(criteria).await?;
        let mut sent = 0;
        while let Some(record) = records.next().await {
            sink.send(record?).await.map_err(|_| Error::Stream)?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Run caller-supplied statements. Rows are converted but not mapped to
    /// attributes; a batch returns no rows.
    pub async fn query(&self, raw: RawQuery) -> Result<Vec<Record>> {
        match raw {
            RawQuery::Single { text, params } => {
                let statement =
                    CompiledStatement::new(RawQuery::kind_of(&text), text).with_params(params);
                let rows = self.execute(&statement).await?;
                Ok(rows.iter().map(decode_raw_row).collect())
            }
            RawQuery::Batch(items) => {
                let statements: Vec<_> = items
                    .into_iter()
                    .map(|(text, params)| {
                        CompiledStatement::new(RawQuery::kind_of(&text), text).with_params(params)
                    })
                    .collect();
                self.submit_batch(&statements).await?;
                Ok(Vec::new())
            }
        }
    }

    /// Create the table and its indexes.
    pub async fn define(&self) -> Result<()> {
        for statement in self.schema.ddl_statements() {
            self.execute(&statement).await?;
        }
        tracing::info!(table = %self.schema.table_name(), "table defined");
        Ok(())
    }

    /// Drop the table. A table that is already gone is not an error.
    pub async fn drop_table(&self) -> Result<()> {
        match self.execute(&self.schema.drop_table_statement()).await {
            Ok(_) => Ok(()),
            Err(Error::Store(e)) if e.is_absent() => {
                tracing::debug!(table = %self.schema.table_name(), "table already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Describe the live table, or `None` when it does not exist.
    pub async fn describe(&self) -> Result<Option<TableDescription>> {
        let keyspace = self
            .session
            .keyspace()
            .ok_or_else(|| Error::Config("session is not bound to a keyspace".to_string()))?;
        let statement = TableDescription::describe_statement(keyspace, self.schema.table_name());
        let rows = self.execute(&statement).await?;
        Ok(TableDescription::from_rows(&self.schema, &rows))
    }

    /// Synchronise the live table and return the number of statements run.
    pub async fn migrate(&self, mode: MigrateMode) -> Result<usize> {
        let live = match mode {
            MigrateMode::Alter => self.describe().await?,
            MigrateMode::Safe | MigrateMode::Drop => None,
        };
        let steps = migration::plan(mode, &self.schema, live.as_ref());

        for step in &steps {
            match self.execute(&step.statement).await {
                Ok(_) => {}
                Err(Error::Store(e)) if step.tolerate_absent && e.is_absent() => {}
                Err(e) => return Err(e),
            }
        }

        if !steps.is_empty() {
            tracing::info!(
                table = %self.schema.table_name(),
                mode = %mode,
                statements = steps.len(),
                "schema synchronised"
            );
        }
        Ok(steps.len())
    }
}
