//! In-memory table of ephemeral workflow instances
//!
//! Drafts are keyed by (user, workflow kind): at most one draft per key at
//! any instant, with O(1) lookup. The table is sharded by user so unrelated
//! users never contend on the same lock. Every draft carries a generation
//! stamp; a handle whose generation no longer matches signals
//! [`DeskError::StaleDraft`], which is "nothing to do", not a failure. That
//! is what stops a late in-flight event from resurrecting a cancelled,
//! replaced, or evicted draft.
//!
//! Drafts are intentionally lost on process restart.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::entities::UserId;
use crate::errors::{DeskError, DeskResult};
use crate::workflow::equipment::EquipmentDraft;
use crate::workflow::intake::IntakeDraft;

/// The workflows that keep full drafts. Support threads use single-field
/// markers owned by the support engine instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowKind {
    /// Multi-step request intake
    RequestIntake,
    /// Assign / return / repair equipment
    EquipmentAction,
}

/// Accumulator and current step of one in-flight workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftState {
    /// Request-intake draft
    Intake(IntakeDraft),
    /// Equipment-action draft
    Equipment(EquipmentDraft),
}

impl DraftState {
    /// Which workflow this draft belongs to
    pub fn kind(&self) -> WorkflowKind {
        match self {
            DraftState::Intake(_) => WorkflowKind::RequestIntake,
            DraftState::Equipment(_) => WorkflowKind::EquipmentAction,
        }
    }
}

/// Handle to a live draft, valid only within the current event's processing.
/// Engines must not retain it past that call.
#[derive(Debug, Clone, Copy)]
pub struct DraftHandle {
    /// Owning user
    pub user: UserId,
    /// Workflow kind
    pub kind: WorkflowKind,
    generation: u64,
}

struct DraftEntry {
    state: DraftState,
    created_at: Instant,
    generation: u64,
}

const SHARD_COUNT: usize = 16;

/// Sharded draft table
pub struct DraftStore {
    shards: Vec<RwLock<HashMap<(UserId, WorkflowKind), DraftEntry>>>,
    next_generation: AtomicU64,
}

impl Default for DraftStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            next_generation: AtomicU64::new(1),
        }
    }

    fn shard(&self, user: UserId) -> &RwLock<HashMap<(UserId, WorkflowKind), DraftEntry>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        user.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Create a fresh draft for (user, kind of `state`), silently discarding
    /// any prior incomplete draft of the same kind for that user.
    pub fn begin(&self, user: UserId, state: DraftState) -> DraftHandle {
        let kind = state.kind();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let entry = DraftEntry { state, created_at: Instant::now(), generation };

        let mut shard = self.shard(user).write().unwrap();
        if shard.insert((user, kind), entry).is_some() {
            tracing::info!(%user, ?kind, "replaced incomplete draft");
        }
        DraftHandle { user, kind, generation }
    }

    /// Look up the live draft for (user, kind). Returns a handle plus a
    /// snapshot of its state.
    pub fn find(&self, user: UserId, kind: WorkflowKind) -> Option<(DraftHandle, DraftState)> {
        let shard = self.shard(user).read().unwrap();
        shard.get(&(user, kind)).map(|entry| {
            (
                DraftHandle { user, kind, generation: entry.generation },
                entry.state.clone(),
            )
        })
    }

    /// Atomically mutate the draft behind `handle` (step and accumulator
    /// together). The closure runs under the shard lock against the stored
    /// state itself, so two updates to the same draft compose instead of the
    /// later one overwriting the earlier. Signals `StaleDraft` if the draft
    /// was replaced, ended, or evicted since the handle was issued; a failing
    /// closure leaves the draft as the closure left it.
    pub fn advance(
        &self,
        handle: &DraftHandle,
        update: impl FnOnce(&mut DraftState) -> DeskResult<()>,
    ) -> DeskResult<()> {
        let mut shard = self.shard(handle.user).write().unwrap();
        match shard.get_mut(&(handle.user, handle.kind)) {
            Some(entry) if entry.generation == handle.generation => update(&mut entry.state),
            _ => Err(DeskError::StaleDraft { user: handle.user, kind: handle.kind }),
        }
    }

    /// Delete the draft behind `handle` (terminal success or cancel) and
    /// return its final state. Signals `StaleDraft` like [`advance`].
    ///
    /// [`advance`]: DraftStore::advance
    pub fn end(&self, handle: &DraftHandle) -> DeskResult<DraftState> {
        let mut shard = self.shard(handle.user).write().unwrap();
        match shard.get(&(handle.user, handle.kind)) {
            Some(entry) if entry.generation == handle.generation => {
                let entry = shard.remove(&(handle.user, handle.kind)).unwrap();
                Ok(entry.state)
            }
            _ => Err(DeskError::StaleDraft { user: handle.user, kind: handle.kind }),
        }
    }

    /// Evict drafts older than `ttl`. Returns how many were removed.
    /// The embedder decides when to sweep; the store spawns no tasks.
    pub fn evict_stale(&self, ttl: Duration) -> usize {
        let mut evicted = 0;
        for shard in &self.shards {
            let mut shard = shard.write().unwrap();
            let before = shard.len();
            shard.retain(|_, entry| entry.created_at.elapsed() < ttl);
            evicted += before - shard.len();
        }
        if evicted > 0 {
            tracing::info!(evicted, "evicted abandoned drafts");
        }
        evicted
    }

    /// Number of live drafts across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().unwrap().len()).sum()
    }

    /// Check if no drafts are live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
