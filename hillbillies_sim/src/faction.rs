// Factions and their task schedulers.
//
// A `Faction` is a capacity-bounded set of unit ids plus a `Scheduler`
// holding the tasks its members may claim. Two units are hostile iff they
// belong to different factions.
//
// Placement of new units follows one policy (`place_new_unit`): while fewer
// than `max_active_factions` factions are active, the unit founds a faction
// of its own (reusing an empty one when available); once the limit is
// reached it joins the least-populated active faction that still has room.
// A full world of full factions refuses the unit.
//
// See also: `world.rs` for the membership operations that call into this
// module, `task/mod.rs` for the `Task` type the scheduler stores.
//
// **Critical constraint: determinism.** Members and tasks live in ordered
// collections; ties between equally populated factions or equally urgent
// tasks go to the lowest id.

use crate::config::SimConfig;
use crate::error::TaskFault;
use crate::task::Task;
use crate::types::{FactionId, TaskId, UnitId};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Priority-ordered task pool of one faction.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    tasks: BTreeMap<TaskId, Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, id: TaskId, task: Task) {
        self.tasks.insert(id, task);
    }

    pub fn remove_task(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks, highest priority first.
    pub fn tasks(&self) -> Vec<(TaskId, &Task)> {
        let mut all: Vec<_> = self.tasks.iter().map(|(&id, t)| (id, t)).collect();
        all.sort_by(|a, b| b.1.priority().cmp(&a.1.priority()).then(a.0.cmp(&b.0)));
        all
    }

    /// The highest-priority task nobody is executing.
    pub fn best_available_task(&self) -> Option<TaskId> {
        self.tasks
            .iter()
            .filter(|(_, task)| task.assignee().is_none())
            .max_by(|a, b| a.1.priority().cmp(&b.1.priority()).then(b.0.cmp(a.0)))
            .map(|(&id, _)| id)
    }

    /// Mark a task as claimed by `unit`. Fails if it is missing or taken.
    pub(crate) fn claim(&mut self, id: TaskId, unit: UnitId) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) if task.assignee.is_none() => {
                task.assignee = Some(unit);
                true
            }
            _ => false,
        }
    }

    /// Give a task back to the pool. A failed task loses `penalty` priority.
    pub(crate) fn release(&mut self, id: TaskId, failure: Option<(TaskFault, i32)>) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.assignee = None;
            if let Some((fault, penalty)) = failure {
                task.priority -= penalty;
                task.last_fault = Some(fault);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Faction
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Faction {
    id: FactionId,
    name: String,
    members: BTreeSet<UnitId>,
    pub(crate) scheduler: Scheduler,
}

impl Faction {
    pub fn new(id: FactionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: BTreeSet::new(),
            scheduler: Scheduler::new(),
        }
    }

    pub fn id(&self) -> FactionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &BTreeSet<UnitId> {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_active(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn has_room(&self, capacity: usize) -> bool {
        self.members.len() < capacity
    }

    /// Add a member. Refused (returning `false`, membership unchanged) when
    /// the faction already holds `capacity` units.
    pub fn add_member(&mut self, unit: UnitId, capacity: usize) -> bool {
        if self.members.contains(&unit) {
            return true;
        }
        if !self.has_room(capacity) {
            return false;
        }
        self.members.insert(unit)
    }

    pub fn remove_member(&mut self, unit: UnitId) -> bool {
        self.members.remove(&unit)
    }
}

// ---------------------------------------------------------------------------
// Placement policy
// ---------------------------------------------------------------------------

/// Where a newly added unit goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Become the first member of this existing, currently empty faction.
    Reuse(FactionId),
    /// Found a brand new faction.
    Found,
    /// Join this active faction.
    Join(FactionId),
    /// No faction can take the unit.
    Refuse,
}

pub fn place_new_unit(factions: &BTreeMap<FactionId, Faction>, config: &SimConfig) -> Placement {
    let active = factions.values().filter(|f| f.is_active()).count();
    if active < config.max_active_factions {
        return match factions.values().find(|f| !f.is_active()) {
            Some(empty) => Placement::Reuse(empty.id),
            None => Placement::Found,
        };
    }
    factions
        .values()
        .filter(|f| f.is_active() && f.has_room(config.max_faction_size))
        .min_by_key(|f| (f.member_count(), f.id))
        .map_or(Placement::Refuse, |f| Placement::Join(f.id))
}
