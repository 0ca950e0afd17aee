pub mod memory;
pub mod validation;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};
use crate::facts::{
    Contract, DepositMovement, Disbursement, DocumentSnapshot, Facility, Fact, FactKind, Fee,
    Installment, Party, Payment, PrincipalAllocation, RateAdjustment, Signing,
};
use crate::types::{EntityId, TxId, TxMetadata};

pub use memory::MemoryStore;

/// assertion state transition for one fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Assert,
    Retract,
}

/// commit envelope: monotonic id, wall-clock instant, caller metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TxInfo {
    pub tx_id: TxId,
    pub instant: DateTime<Utc>,
    pub meta: TxMetadata,
}

/// one asserted/retracted transition in an entity's history
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub op: Op,
    pub fact: Fact,
    pub tx: TxInfo,
}

/// Append-only store of facts. Writes are serialized; reads hand out
/// immutable point-in-time `View` values and never block writers.
pub trait FactStore {
    /// atomically commit a batch of facts plus metadata; on any violation
    /// the entire batch fails and the store is untouched
    fn append(&mut self, facts: Vec<Fact>, meta: TxMetadata) -> Result<TxId>;

    /// reader over the currently asserted facts
    fn current(&self) -> View;

    /// reader over the facts asserted at a prior wall-clock instant,
    /// including facts retracted since
    fn as_of(&self, instant: DateTime<Utc>) -> View;

    /// reader positioned at a transaction boundary
    fn as_of_tx(&self, tx: TxId) -> View;

    /// ordered asserted/retracted transitions for one entity
    fn history(&self, entity: EntityId) -> Vec<HistoryEntry>;

    /// mark the entity retracted; schema-declared owned children cascade
    fn retract_entity(&mut self, entity: EntityId, meta: TxMetadata) -> Result<TxId>;
}

/// Immutable reader over a set of asserted facts. Assertion order is
/// preserved so derivations see stable tie-breaking; a re-asserted fact
/// keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct View {
    entries: Vec<Option<Fact>>,
    index: HashMap<EntityId, usize>,
}

impl View {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn apply(&mut self, op: Op, fact: &Fact) {
        let id = fact.entity_id();
        match op {
            Op::Assert => {
                if let Some(&pos) = self.index.get(&id) {
                    self.entries[pos] = Some(fact.clone());
                } else {
                    self.index.insert(id, self.entries.len());
                    self.entries.push(Some(fact.clone()));
                }
            }
            Op::Retract => {
                if let Some(&pos) = self.index.get(&id) {
                    self.entries[pos] = None;
                }
            }
        }
    }

    /// all asserted facts in assertion order
    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.entries.iter().filter_map(|e| e.as_ref())
    }

    /// point lookup by identifier
    pub fn fact(&self, id: EntityId) -> Option<&Fact> {
        self.index
            .get(&id)
            .and_then(|&pos| self.entries[pos].as_ref())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.fact(id).is_some()
    }

    pub fn kind_of(&self, id: EntityId) -> Option<FactKind> {
        self.fact(id).map(|f| f.kind())
    }

    pub fn contract(&self, id: EntityId) -> Result<&Contract> {
        match self.fact(id) {
            Some(Fact::Contract(c)) => Ok(c),
            _ => Err(LedgerError::not_found(id)),
        }
    }

    pub fn document(&self, id: EntityId) -> Result<&DocumentSnapshot> {
        match self.fact(id) {
            Some(Fact::DocumentSnapshot(d)) => Ok(d),
            _ => Err(LedgerError::not_found(id)),
        }
    }

    pub fn party(&self, id: EntityId) -> Option<&Party> {
        match self.fact(id) {
            Some(Fact::Party(p)) => Some(p),
            _ => None,
        }
    }

    pub fn facility(&self, id: EntityId) -> Result<&Facility> {
        match self.fact(id) {
            Some(Fact::Facility(f)) => Ok(f),
            _ => Err(LedgerError::not_found(id)),
        }
    }

    /// schedule rows for a contract, ordered by seq
    pub fn installments(&self, contract: EntityId) -> Vec<&Installment> {
        let mut rows: Vec<&Installment> = self
            .iter()
            .filter_map(|f| match f {
                Fact::Installment(i) if i.contract == contract => Some(i),
                _ => None,
            })
            .collect();
        rows.sort_by_key(|i| i.seq);
        rows
    }

    /// fees for a contract in assertion order
    pub fn fees(&self, contract: EntityId) -> Vec<&Fee> {
        self.iter()
            .filter_map(|f| match f {
                Fact::Fee(fee) if fee.contract == contract => Some(fee),
                _ => None,
            })
            .collect()
    }

    pub fn payments(&self, contract: EntityId) -> Vec<&Payment> {
        self.iter()
            .filter_map(|f| match f {
                Fact::Payment(p) if p.contract == contract => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn disbursements(&self, contract: EntityId) -> Vec<&Disbursement> {
        self.iter()
            .filter_map(|f| match f {
                Fact::Disbursement(d) if d.contract == contract => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn deposit_movements(&self, contract: EntityId) -> Vec<&DepositMovement> {
        self.iter()
            .filter_map(|f| match f {
                Fact::DepositMovement(d) if d.contract == contract => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn principal_allocations(&self, contract: EntityId) -> Vec<&PrincipalAllocation> {
        self.iter()
            .filter_map(|f| match f {
                Fact::PrincipalAllocation(p) if p.contract == contract => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn rate_adjustments(&self, contract: EntityId) -> Vec<&RateAdjustment> {
        self.iter()
            .filter_map(|f| match f {
                Fact::RateAdjustment(r) if r.contract == contract => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self, contract: EntityId) -> Vec<&DocumentSnapshot> {
        self.iter()
            .filter_map(|f| match f {
                Fact::DocumentSnapshot(d) if d.contract == contract => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn signings(&self, document: EntityId) -> Vec<&Signing> {
        self.iter()
            .filter_map(|f| match f {
                Fact::Signing(s) if s.document == document => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn contracts_of_facility(&self, facility: EntityId) -> Vec<&Contract> {
        self.iter()
            .filter_map(|f| match f {
                Fact::Contract(c) if c.facility == Some(facility) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// ids of every asserted fact owned (directly or transitively) by
    /// `parent`, in assertion order
    pub fn owned_by(&self, parent: EntityId) -> Vec<EntityId> {
        let mut owned: Vec<EntityId> = Vec::new();
        let mut roots = vec![parent];
        while let Some(root) = roots.pop() {
            for fact in self.iter() {
                if fact.owner() == Some(root) {
                    owned.push(fact.entity_id());
                    roots.push(fact.entity_id());
                }
            }
        }
        owned
    }
}
