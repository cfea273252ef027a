//! Restore orchestration
//!
//! Wraps parsing and interleaving in database lifecycle handling: the
//! target database either ends up fully restored or is dropped again.

use std::path::Path;

use crate::config::Config;
use crate::error::{DumpError, Result};
use crate::protocol::{quote_ident, Connection, Connector, DataChunk};

use super::{parse_with_max_version, Interleaver};

/// Lifecycle of one restore call
///
/// ```text
/// NotStarted ─► DatabaseCreated ─► Connected ─► Restoring ─► Committed
///                     │                │            │
///                     └────────────────┴────────────┴──► RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    NotStarted,
    DatabaseCreated,
    Connected,
    Restoring,
    Committed,
    RolledBack,
}

impl RestoreState {
    fn advance(&mut self, next: RestoreState) {
        tracing::debug!("Restore state: {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// What a successful restore did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSummary {
    pub database: String,
    pub blocks: usize,
    pub chunks: usize,
    pub bytes: u64,
    pub state: RestoreState,
}

/// Restores dump files into freshly created databases
pub struct Restorer {
    config: Config,
}

impl Restorer {
    /// Create a restorer; fails if the config is invalid
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create `database` via `admin` and restore `dump_path` into it
    ///
    /// On any failure after the database is created, the new connection is
    /// closed, the database is dropped and the original error is returned.
    /// The new connection is closed exactly once in every case.
    pub fn restore<A, K>(
        &self,
        admin: &mut A,
        connector: &K,
        database: &str,
        dump_path: &Path,
    ) -> Result<RestoreSummary>
    where
        A: Connection + ?Sized,
        K: Connector,
    {
        let quoted = quote_ident(database)?;
        let mut state = RestoreState::NotStarted;

        admin.execute(&format!("CREATE DATABASE {}", quoted))?;
        state.advance(RestoreState::DatabaseCreated);
        tracing::info!("Created database {}, restoring from {}", database, dump_path.display());

        let mut conn = ConnectionGuard::empty();
        match self.run(connector, database, dump_path, &mut conn, &mut state) {
            Ok(mut summary) => {
                if let Err(e) = conn.close() {
                    tracing::warn!("Closing connection to {} failed: {}", database, e);
                }
                state.advance(RestoreState::Committed);
                summary.state = state;
                tracing::info!(
                    "Restore of {} complete: {} blocks, {} chunks, {} bytes",
                    database,
                    summary.blocks,
                    summary.chunks,
                    summary.bytes
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!("Restore of {} failed in {:?}: {}", database, state, e);
                if let Err(close_err) = conn.close() {
                    tracing::warn!("Closing connection to {} failed: {}", database, close_err);
                }
                if let Err(drop_err) = admin.execute(&format!("DROP DATABASE {}", quoted)) {
                    tracing::warn!("Dropping database {} failed: {}", database, drop_err);
                }
                state.advance(RestoreState::RolledBack);
                Err(e)
            }
        }
    }

    /// Steps that trigger rollback when they fail
    fn run<K: Connector>(
        &self,
        connector: &K,
        database: &str,
        dump_path: &Path,
        conn: &mut ConnectionGuard<K::Conn>,
        state: &mut RestoreState,
    ) -> Result<RestoreSummary> {
        let conn = conn.set(connector.connect(database)?);
        state.advance(RestoreState::Connected);

        let info = parse_with_max_version(dump_path, self.config.max_supported_version)?;
        let blocks = info.restore_blocks();
        let mut stream = TrackedStream::new(Interleaver::new(self.config.fan_out, dump_path, &info)?);
        state.advance(RestoreState::Restoring);

        let sent = conn.restore_session(&info.schema_text, &blocks, &mut stream);
        if let Some(e) = stream.failure.take() {
            return Err(e);
        }
        sent?;

        Ok(RestoreSummary {
            database: database.to_string(),
            blocks: blocks.len(),
            chunks: stream.chunks,
            bytes: stream.bytes,
            state: *state,
        })
    }
}

/// Owns the new connection and closes it at most once
struct ConnectionGuard<C: Connection> {
    conn: Option<C>,
}

impl<C: Connection> ConnectionGuard<C> {
    fn empty() -> Self {
        Self { conn: None }
    }

    fn set(&mut self, conn: C) -> &mut C {
        self.conn.insert(conn)
    }

    fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(mut conn) => conn.close(),
            None => Ok(()),
        }
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Counts what the server pulled and keeps the first stream error.
///
/// The transport only sees a placeholder error; the real cause is
/// reported by the orchestrator so it survives any wrapping on the way.
struct TrackedStream<I> {
    inner: I,
    chunks: usize,
    bytes: u64,
    failure: Option<DumpError>,
}

impl<I> TrackedStream<I> {
    fn new(inner: I) -> Self {
        Self {
            inner,
            chunks: 0,
            bytes: 0,
            failure: None,
        }
    }
}

impl<I: Iterator<Item = Result<DataChunk>>> Iterator for TrackedStream<I> {
    type Item = Result<DataChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failure.is_some() {
            return None;
        }
        match self.inner.next()? {
            Ok(chunk) => {
                self.chunks += 1;
                self.bytes += chunk.data.len() as u64;
                Some(Ok(chunk))
            }
            Err(e) => {
                let placeholder = DumpError::Connection(format!("restore data stream aborted: {}", e));
                self.failure = Some(e);
                Some(Err(placeholder))
            }
        }
    }
}
