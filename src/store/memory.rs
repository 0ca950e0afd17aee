use chrono::{DateTime, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use tracing::{debug, info};

use crate::errors::{LedgerError, Result};
use crate::facts::Fact;
use crate::store::validation::validate_batch;
use crate::store::{FactStore, HistoryEntry, Op, TxInfo, View};
use crate::types::{EntityId, TxId, TxMetadata};

struct LogRecord {
    tx: TxId,
    op: Op,
    fact: Fact,
}

/// In-memory reference implementation of the store contract: an
/// append-only transaction log plus a materialized current view. Commit
/// instants come from a `SafeTimeProvider` so tests can steer the clock.
pub struct MemoryStore {
    log: Vec<LogRecord>,
    txs: Vec<TxInfo>,
    view: View,
    time: SafeTimeProvider,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_time(SafeTimeProvider::new(TimeSource::System))
    }

    pub fn with_time(time: SafeTimeProvider) -> Self {
        Self {
            log: Vec::new(),
            txs: Vec::new(),
            view: View::new(),
            time,
        }
    }

    pub fn time(&self) -> &SafeTimeProvider {
        &self.time
    }

    /// number of committed transactions
    pub fn tx_count(&self) -> usize {
        self.txs.len()
    }

    fn tx_info(&self, tx: TxId) -> &TxInfo {
        &self.txs[(tx - 1) as usize]
    }

    fn commit(&mut self, op: Op, facts: Vec<Fact>, meta: TxMetadata) -> TxId {
        let tx_id = (self.txs.len() + 1) as TxId;
        self.txs.push(TxInfo {
            tx_id,
            instant: self.time.now(),
            meta,
        });
        for fact in facts {
            self.view.apply(op, &fact);
            self.log.push(LogRecord { tx: tx_id, op, fact });
        }
        tx_id
    }

    fn replay<F>(&self, up_to: F) -> View
    where
        F: Fn(TxId) -> bool,
    {
        let mut view = View::new();
        for record in &self.log {
            if up_to(record.tx) {
                view.apply(record.op, &record.fact);
            }
        }
        view
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FactStore for MemoryStore {
    fn append(&mut self, facts: Vec<Fact>, meta: TxMetadata) -> Result<TxId> {
        validate_batch(&self.view, &facts)?;
        let count = facts.len();
        let tx = self.commit(Op::Assert, facts, meta);
        info!(tx, facts = count, "committed batch");
        Ok(tx)
    }

    fn current(&self) -> View {
        self.view.clone()
    }

    fn as_of(&self, instant: DateTime<Utc>) -> View {
        let cutoff: Option<TxId> = self
            .txs
            .iter()
            .rev()
            .find(|tx| tx.instant <= instant)
            .map(|tx| tx.tx_id);
        match cutoff {
            Some(cutoff) => self.replay(|tx| tx <= cutoff),
            None => View::new(),
        }
    }

    fn as_of_tx(&self, tx: TxId) -> View {
        self.replay(|t| t <= tx)
    }

    fn history(&self, entity: EntityId) -> Vec<HistoryEntry> {
        self.log
            .iter()
            .filter(|record| record.fact.entity_id() == entity)
            .map(|record| HistoryEntry {
                op: record.op,
                fact: record.fact.clone(),
                tx: self.tx_info(record.tx).clone(),
            })
            .collect()
    }

    fn retract_entity(&mut self, entity: EntityId, meta: TxMetadata) -> Result<TxId> {
        let root = self
            .view
            .fact(entity)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(entity))?;

        let mut retracted = vec![root];
        for owned in self.view.owned_by(entity) {
            if let Some(fact) = self.view.fact(owned) {
                retracted.push(fact.clone());
            }
        }

        debug!(%entity, cascade = retracted.len() - 1, "retracting entity");
        Ok(self.commit(Op::Retract, retracted, meta))
    }
}
