//! Replica selection.
//!
//! Two stateful pickers over the live replica set: plain round-robin and
//! weighted round-robin. Both are safe under concurrent callers (all
//! state, including the pick cursor, sits behind one mutex) and both are
//! driven at runtime by [`listen_states`], which folds the liveness
//! transitions emitted by shard workers back into membership.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::InserterError;
use crate::host::{Host, HostId, HostInfo, HostState, WeightedHostInfo};

/// Membership mutation half of a selector.
pub trait HostStateController: Send + Sync + 'static {
    type Host: Host;

    fn add_host(&self, host: Self::Host) -> Result<(), InserterError>;
    fn remove_host(&self, host: Self::Host) -> Result<(), InserterError>;
}

/// A picker over the hosts a [`HostStateController`] has admitted.
pub trait HostSelector: HostStateController {
    /// The next replica to receive a row. Called on the hot push path.
    fn pick(&self) -> HostInfo;
}

/// Applies liveness transitions from `states` to `controller`: an `Up`
/// host is added, a `Down` host removed. Returns the first controller
/// error, or [`InserterError::Canceled`] once `cancel` fires. A closed
/// channel ends the listener cleanly.
pub async fn listen_states<C>(
    cancel: &CancellationToken,
    controller: &C,
    states: async_channel::Receiver<C::Host>,
) -> Result<(), InserterError>
where
    C: HostStateController,
{
    loop {
        tokio::select! {
            update = states.recv() => {
                let Ok(host) = update else { return Ok(()) };
                match host.info().state {
                    HostState::Up => controller.add_host(host)?,
                    HostState::Down => controller.remove_host(host)?,
                }
            }
            _ = cancel.cancelled() => return Err(InserterError::Canceled),
        }
    }
}

fn invalid_state(host: HostId, expected: HostState, actual: HostState) -> InserterError {
    InserterError::InvalidHostState {
        host,
        expected,
        actual,
    }
}

// =============================================================================
// Round-robin
// =============================================================================

#[derive(Default)]
struct RoundRobinState {
    keys: Vec<HostId>,
    positions: HashMap<HostId, usize>,
    hosts: HashMap<HostId, HostInfo>,
    cursor: u64,
}

/// Cycles through up replicas in insertion order.
#[derive(Default)]
pub struct RoundRobinSelector {
    state: Mutex<RoundRobinState>,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostStateController for RoundRobinSelector {
    type Host = HostInfo;

    /// Admits an up host. Re-adding a known identity is a no-op.
    fn add_host(&self, host: HostInfo) -> Result<(), InserterError> {
        if host.state == HostState::Down {
            return Err(invalid_state(host.id(), HostState::Up, host.state));
        }

        let mut state = self.state.lock();
        let id = host.id();
        if !state.hosts.contains_key(&id) {
            state.keys.push(id.clone());
            let position = state.keys.len() - 1;
            state.positions.insert(id.clone(), position);
            state.hosts.insert(id, host);
        }
        Ok(())
    }

    /// Withdraws a down host. Removing an unknown identity is a no-op.
    fn remove_host(&self, host: HostInfo) -> Result<(), InserterError> {
        if host.state == HostState::Up {
            return Err(invalid_state(host.id(), HostState::Down, host.state));
        }

        let mut state = self.state.lock();
        let id = host.id();
        let Some(position) = state.positions.remove(&id) else {
            return Ok(());
        };
        state.keys.remove(position);
        state.hosts.remove(&id);
        for later in state.positions.values_mut() {
            if *later > position {
                *later -= 1;
            }
        }
        Ok(())
    }
}

impl HostSelector for RoundRobinSelector {
    /// # Panics
    ///
    /// Panics when no hosts are registered. Construction adds at least one
    /// host; an empty selector is only reachable by removing every
    /// replica at runtime.
    fn pick(&self) -> HostInfo {
        let mut state = self.state.lock();
        assert!(!state.keys.is_empty(), "pick from a selector with no hosts");

        let idx = (state.cursor % state.keys.len() as u64) as usize;
        state.cursor = (state.cursor + 1) % u64::MAX;
        state.hosts[&state.keys[idx]].clone()
    }
}

#[cfg(test)]
impl RoundRobinSelector {
    pub(crate) fn keys_snapshot(&self) -> Vec<HostId> {
        self.state.lock().keys.clone()
    }

    pub(crate) fn positions_snapshot(&self) -> HashMap<HostId, usize> {
        self.state.lock().positions.clone()
    }
}

// =============================================================================
// Weighted round-robin
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OwnRange {
    begin: u32,
    end: u32,
}

#[derive(Default)]
struct WeightedState {
    /// Replica slots in insertion order; parallel to `ranges`.
    slots: Vec<WeightedHostInfo>,
    /// Each slot's half-open span in `owns`. Spans tile the array.
    ranges: Vec<OwnRange>,
    index: HashMap<HostId, usize>,
    /// Ownership array: slot handles, one entry per unit of weight.
    owns: Vec<usize>,
    cursor: u32,
}

/// Cycles through up replicas in proportion to their weights, with a
/// deterministic strided pattern inside one full cycle.
#[derive(Default)]
pub struct WeightedRoundRobinSelector {
    state: Mutex<WeightedState>,
}

impl WeightedRoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostStateController for WeightedRoundRobinSelector {
    type Host = WeightedHostInfo;

    /// Admits an up host, or updates a known host's weight. The new
    /// weight reshapes the ownership array immediately; ranges after the
    /// updated slot shift by the weight difference.
    fn add_host(&self, host: WeightedHostInfo) -> Result<(), InserterError> {
        if host.weight == 0 {
            return Err(InserterError::ZeroWeight);
        }
        if host.host.state == HostState::Down {
            return Err(invalid_state(host.id(), HostState::Up, host.host.state));
        }

        let mut state = self.state.lock();
        let id = host.id();
        let pos = match state.index.get(&id).copied() {
            Some(pos) => pos,
            None => {
                let begin = state.ranges.last().map_or(0, |range| range.end);
                let pos = state.slots.len();
                state.slots.push(host.clone());
                state.ranges.push(OwnRange {
                    begin,
                    end: begin + host.weight,
                });
                state.index.insert(id, pos);
                state
                    .owns
                    .extend(std::iter::repeat(pos).take(host.weight as usize));
                pos
            }
        };
        state.slots[pos].host.state = HostState::Up;

        let old_weight = state.slots[pos].weight;
        if old_weight == host.weight {
            return Ok(());
        }

        let delta = i64::from(host.weight) - i64::from(old_weight);
        let range = state.ranges[pos];
        if pos == state.ranges.len() - 1 {
            // Last slot: extend or truncate the tail of the array in place.
            if delta > 0 {
                state
                    .owns
                    .extend(std::iter::repeat(pos).take(delta as usize));
            } else {
                let keep = (state.owns.len() as i64 + delta) as usize;
                state.owns.truncate(keep);
            }
        } else {
            // Interior slot: rebuild as head ++ resized span ++ tail, then
            // shift every later range by the weight difference.
            let mut rebuilt = Vec::with_capacity((state.owns.len() as i64 + delta) as usize);
            rebuilt.extend_from_slice(&state.owns[..range.begin as usize]);
            rebuilt.extend(std::iter::repeat(pos).take(host.weight as usize));
            rebuilt.extend_from_slice(&state.owns[range.end as usize..]);
            state.owns = rebuilt;

            for later in &mut state.ranges[pos + 1..] {
                later.begin = (i64::from(later.begin) + delta) as u32;
                later.end = (i64::from(later.end) + delta) as u32;
            }
        }
        state.ranges[pos].end = (i64::from(range.end) + delta) as u32;
        state.slots[pos].weight = host.weight;
        Ok(())
    }

    /// Marks a down host's slot down in place. The ownership array and
    /// ranges keep their shape; `pick` skips the dead span. The host's
    /// weight is not updated on removal.
    fn remove_host(&self, host: WeightedHostInfo) -> Result<(), InserterError> {
        if host.host.state == HostState::Up {
            return Err(invalid_state(host.id(), HostState::Down, host.host.state));
        }

        let mut state = self.state.lock();
        let Some(pos) = state.index.get(&host.id()).copied() else {
            return Ok(());
        };
        state.slots[pos].host.state = HostState::Down;
        Ok(())
    }
}

impl HostSelector for WeightedRoundRobinSelector {
    /// Walks the ownership array from the cursor, skipping each down
    /// slot's whole span. Once every replica has been seen down, some
    /// replica is returned anyway: callers cannot assume a picked replica
    /// is usable, and the push path tolerates that by timing out and
    /// re-picking.
    ///
    /// # Panics
    ///
    /// Panics when no hosts are registered.
    fn pick(&self) -> HostInfo {
        let mut state = self.state.lock();
        let mut down = 0;

        loop {
            if down == state.slots.len() {
                let slot = state
                    .slots
                    .first()
                    .expect("pick from a selector with no hosts");
                return slot.host.clone();
            }

            let idx = (state.cursor % state.owns.len() as u32) as usize;
            state.cursor = (state.cursor + 1) % u32::MAX;

            let pos = state.owns[idx];
            if state.slots[pos].host.state == HostState::Up {
                return state.slots[pos].host.clone();
            }

            down += 1;
            state.cursor = state.ranges[pos].end;
        }
    }
}

#[cfg(test)]
impl WeightedRoundRobinSelector {
    pub(crate) fn owns_snapshot(&self) -> Vec<usize> {
        self.state.lock().owns.clone()
    }

    pub(crate) fn ranges_snapshot(&self) -> Vec<(u32, u32)> {
        self.state
            .lock()
            .ranges
            .iter()
            .map(|range| (range.begin, range.end))
            .collect()
    }

    pub(crate) fn slot_snapshot(&self, id: &HostId) -> Option<WeightedHostInfo> {
        let state = self.state.lock();
        state.index.get(id).map(|&pos| state.slots[pos].clone())
    }

    pub(crate) fn state_snapshot(&self) -> HashMap<HostId, HostState> {
        self.state
            .lock()
            .slots
            .iter()
            .map(|slot| (slot.id(), slot.host.state))
            .collect()
    }
}

#[cfg(test)]
#[path = "selector_test.rs"]
mod selector_test;
