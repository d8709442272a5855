use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Claims {
    /// Service id to the generation of its current claim
    held: HashMap<i64, u64>,
    next_generation: u64,
}

/// Single-flight set of services currently under verification.
///
/// Cloning shares the underlying set, so every tick handed a clone observes
/// the same in-flight services.
#[derive(Debug, Clone, Default)]
pub struct VerificationGuard {
    claims: Arc<Mutex<Claims>>,
}

impl VerificationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn claims(&self) -> MutexGuard<'_, Claims> {
        // The map stays consistent even if a holder panicked mid-insert.
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `service_id`. Returns `None` when a verification for it is
    /// already running. The claim is released when the permit drops.
    pub fn try_acquire(&self, service_id: i64) -> Option<GuardPermit> {
        let mut claims = self.claims();
        if claims.held.contains_key(&service_id) {
            return None;
        }

        let generation = claims.next_generation;
        claims.next_generation += 1;
        claims.held.insert(service_id, generation);
        Some(GuardPermit { guard: self.clone(), service_id, generation })
    }

    /// Release a claim whoever holds it. Releasing an unclaimed id is a
    /// no-op. A permit outliving a forced release leaves later claims alone.
    pub fn release(&self, service_id: i64) {
        self.claims().held.remove(&service_id);
    }

    fn release_generation(&self, service_id: i64, generation: u64) {
        let mut claims = self.claims();
        if claims.held.get(&service_id) == Some(&generation) {
            claims.held.remove(&service_id);
        }
    }

    pub fn is_held(&self, service_id: i64) -> bool {
        self.claims().held.contains_key(&service_id)
    }

    pub fn len(&self) -> usize {
        self.claims().held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims().held.is_empty()
    }
}

/// Claim on one service; releases on drop
#[derive(Debug)]
pub struct GuardPermit {
    guard: VerificationGuard,
    service_id: i64,
    generation: u64,
}

impl GuardPermit {
    pub fn service_id(&self) -> i64 {
        self.service_id
    }
}

impl Drop for GuardPermit {
    fn drop(&mut self) {
        self.guard.release_generation(self.service_id, self.generation);
    }
}
