use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

use hashbrown::HashMap;
use strata_world::CubePos;

/// One coordinate's in-progress materialization. The owning thread is
/// recorded so a re-entrant request from inside generation can be detected
/// instead of deadlocking on its own work.
pub(crate) struct Gate {
    owner: ThreadId,
    done: Mutex<bool>,
    ready: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            owner: thread::current().id(),
            done: Mutex::new(false),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn wait(&self) {
        let mut done = self.done.lock().unwrap();
        while !*done {
            done = self.ready.wait(done).unwrap();
        }
    }

    fn complete(&self) {
        *self.done.lock().unwrap() = true;
        self.ready.notify_all();
    }
}

/// What a request learns when it tries to claim a coordinate.
pub(crate) enum Claim {
    /// This request owns materialization; it must call `finish`.
    Owned,
    /// Another thread is on it; wait on the gate and retry.
    Busy(Arc<Gate>),
    /// The requesting thread is already generating this coordinate.
    Reentrant,
}

/// Table of in-flight materializations, at most one per coordinate.
#[derive(Default)]
pub(crate) struct InflightTable {
    gates: Mutex<HashMap<CubePos, Arc<Gate>>>,
}

impl InflightTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn claim(&self, pos: CubePos) -> Claim {
        let mut gates = self.gates.lock().unwrap();
        match gates.get(&pos) {
            Some(gate) if gate.owner == thread::current().id() => Claim::Reentrant,
            Some(gate) => Claim::Busy(Arc::clone(gate)),
            None => {
                gates.insert(pos, Arc::new(Gate::new()));
                Claim::Owned
            }
        }
    }

    /// Release a claim taken with `Claim::Owned`, waking all waiters.
    pub(crate) fn finish(&self, pos: CubePos) {
        let gate = self.gates.lock().unwrap().remove(&pos);
        if let Some(gate) = gate {
            gate.complete();
        }
    }

    pub(crate) fn is_inflight(&self, pos: CubePos) -> bool {
        self.gates.lock().unwrap().contains_key(&pos)
    }
}
