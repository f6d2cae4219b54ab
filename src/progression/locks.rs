//! Per-member mutual exclusion for read-modify-write sequences

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

use crate::types::MemberId;

/// Entries beyond this count trigger a sweep of idle locks
const PRUNE_THRESHOLD: usize = 1024;

/// Held while a member's record is being read, changed and written back
pub type MemberGuard = OwnedMutexGuard<()>;

/// One async mutex per member id.
///
/// Members never block each other; two commands for the same member run
/// one after the other.
#[derive(Default)]
pub struct MemberLocks {
    slots: Mutex<HashMap<MemberId, Arc<TokioMutex<()>>>>,
}

impl MemberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `member_id`
    pub async fn acquire(&self, member_id: &MemberId) -> MemberGuard {
        let slot = {
            let mut slots = self.slots.lock();
            if slots.len() >= PRUNE_THRESHOLD {
                // Only the map holds idle slots; waiters and holders own a clone.
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            slots
                .entry(member_id.clone())
                .or_insert_with(|| Arc::new(TokioMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Number of tracked members
    pub fn tracked(&self) -> usize {
        self.slots.lock().len()
    }
}
