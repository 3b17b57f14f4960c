//! The Graph Builder - declaration phase of a scenario.
//!
//! Declaring events has no side effects: the builder only records
//! `(application, operation, arguments)` tuples together with their
//! dependencies and timing. `finalize` freezes the declarations into an
//! [`EventGraph`] after a topological check.
//!
//! # Usage
//!
//! ```ignore
//! let mut builder = GraphBuilder::begin_build();
//! let kickoff = builder
//!     .user("AgentUserInterface", "send_message_to_agent", args! { "content" => "hi" })
//!     .delay(Duration::from_secs(1))
//!     .register()?;
//! builder
//!     .agent("KVStore", "get_all", args! {})
//!     .oracle()
//!     .after(kickoff)
//!     .delay(Duration::from_secs(1))
//!     .register()?;
//! let graph = builder.finalize()?;
//! ```

use crate::error::BuildError;
use crate::event::{Action, Condition, DependencyRef, Event, EventId, EventSpec, EventType, Timing};
use crate::graph::EventGraph;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;
use tempo_env::{AppName, Args, OperationName, SimTime};

/// Handle to a registered event, used to declare dependencies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(EventId);

impl EventHandle {
    pub fn id(self) -> EventId {
        self.0
    }
}

impl From<EventHandle> for EventId {
    fn from(handle: EventHandle) -> Self {
        handle.0
    }
}

/// Collects event declarations and freezes them into a graph.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Declarations in registration order
    specs: Vec<EventSpec>,

    /// Label -> id of already-registered events
    labels: HashMap<String, EventId>,
}

impl GraphBuilder {
    /// Starts a declaration phase.
    pub fn begin_build() -> Self {
        Self::default()
    }

    /// Number of registered events.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Registers an event declaration.
    ///
    /// Id dependencies must name already-registered events. Label
    /// dependencies may point forward and are checked by [`finalize`](Self::finalize).
    pub fn register(&mut self, spec: EventSpec) -> Result<EventHandle, BuildError> {
        let id = EventId(self.specs.len() as u32);
        let name = spec.label.clone().unwrap_or_else(|| id.to_string());

        if let Some(label) = &spec.label {
            if self.labels.contains_key(label) {
                return Err(BuildError::DuplicateLabel(label.clone()));
            }
        }

        for dependency in &spec.dependencies {
            if let DependencyRef::Id(dep) = dependency {
                if dep.index() >= self.specs.len() {
                    return Err(BuildError::UnknownDependency {
                        event: name,
                        dependency: dep.to_string(),
                    });
                }
            }
        }

        if spec.oracle && spec.event_type != EventType::Agent {
            return Err(BuildError::InvalidOracle { event: name });
        }

        let is_condition = spec.event_type == EventType::Condition;
        if is_condition != spec.condition.is_some() {
            return Err(BuildError::ConditionMismatch { event: name });
        }

        if let Timing::After(delay) = spec.timing {
            if !SimTime::is_representable(delay) {
                return Err(BuildError::InvalidTiming {
                    event: name,
                    reason: format!("delay {:?} is finer than a millisecond", delay),
                });
            }
        }

        if let Some(condition) = &spec.condition {
            for (what, duration) in [("interval", condition.interval), ("timeout", condition.timeout)] {
                if !SimTime::is_representable(duration) {
                    return Err(BuildError::InvalidTiming {
                        event: name,
                        reason: format!("{} {:?} is finer than a millisecond", what, duration),
                    });
                }
            }
            if condition.interval.is_zero() {
                return Err(BuildError::InvalidCondition {
                    event: name,
                    reason: "re-check interval must be positive".to_string(),
                });
            }
        }

        if !is_condition && spec.action.is_none() {
            return Err(BuildError::MissingAction { event: name });
        }

        if let Some(label) = &spec.label {
            self.labels.insert(label.clone(), id);
        }
        self.specs.push(spec);

        Ok(EventHandle(id))
    }

    /// Declares a user event bound to `app.operation(args)`.
    pub fn user(
        &mut self,
        app: impl Into<AppName>,
        operation: impl Into<OperationName>,
        args: Args,
    ) -> EventDraft<'_> {
        self.draft(EventType::User, Action::new(app, operation, args))
    }

    /// Declares an environment event bound to `app.operation(args)`.
    pub fn env(
        &mut self,
        app: impl Into<AppName>,
        operation: impl Into<OperationName>,
        args: Args,
    ) -> EventDraft<'_> {
        self.draft(EventType::Env, Action::new(app, operation, args))
    }

    /// Declares an agent event bound to `app.operation(args)`.
    pub fn agent(
        &mut self,
        app: impl Into<AppName>,
        operation: impl Into<OperationName>,
        args: Args,
    ) -> EventDraft<'_> {
        self.draft(EventType::Agent, Action::new(app, operation, args))
    }

    /// Declares a condition event.
    pub fn condition(&mut self, condition: Condition) -> EventDraft<'_> {
        EventDraft {
            builder: self,
            spec: EventSpec::condition(condition),
        }
    }

    fn draft(&mut self, event_type: EventType, action: Action) -> EventDraft<'_> {
        EventDraft {
            builder: self,
            spec: EventSpec::new(event_type, action),
        }
    }

    /// Freezes the declarations into an acyclic graph.
    ///
    /// Fails with [`BuildError::UnknownDependency`] for unresolved labels and
    /// with [`BuildError::Cycle`] naming one offending cycle.
    pub fn finalize(self) -> Result<EventGraph, BuildError> {
        let labels = self.labels;
        let mut events = Vec::with_capacity(self.specs.len());

        for (index, spec) in self.specs.into_iter().enumerate() {
            let id = EventId(index as u32);
            let mut dependencies = Vec::with_capacity(spec.dependencies.len());
            for dependency in &spec.dependencies {
                let dep = match dependency {
                    DependencyRef::Id(dep) => *dep,
                    DependencyRef::Label(label) => {
                        *labels.get(label).ok_or_else(|| BuildError::UnknownDependency {
                            event: spec.label.clone().unwrap_or_else(|| id.to_string()),
                            dependency: label.clone(),
                        })?
                    }
                };
                dependencies.push(dep);
            }
            dependencies.sort_unstable();
            dependencies.dedup();

            events.push(Event {
                id,
                label: spec.label,
                event_type: spec.event_type,
                dependencies,
                timing: spec.timing,
                action: spec.action,
                oracle: spec.oracle,
                condition: spec.condition,
            });
        }

        let mut dependents: Vec<Vec<EventId>> = vec![Vec::new(); events.len()];
        let mut in_degree: Vec<usize> = Vec::with_capacity(events.len());
        for event in &events {
            in_degree.push(event.dependencies.len());
            for dep in &event.dependencies {
                dependents[dep.index()].push(event.id);
            }
        }

        // Kahn's algorithm, smallest registration index first
        let mut ready: BinaryHeap<Reverse<EventId>> = events
            .iter()
            .filter(|e| e.dependencies.is_empty())
            .map(|e| Reverse(e.id))
            .collect();
        let mut order = Vec::with_capacity(events.len());
        let mut done = vec![false; events.len()];

        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            done[id.index()] = true;
            for dependent in &dependents[id.index()] {
                let remaining = &mut in_degree[dependent.index()];
                *remaining -= 1;
                if *remaining == 0 {
                    ready.push(Reverse(*dependent));
                }
            }
        }

        if order.len() < events.len() {
            let cycle = find_cycle(&events, &done);
            return Err(BuildError::Cycle { cycle });
        }

        Ok(EventGraph::new(events, dependents, order))
    }
}

/// Walks unprocessed dependency edges from the first stuck event until a node repeats.
///
/// Every event left unprocessed by Kahn's algorithm has at least one
/// unprocessed dependency, so the walk always closes a cycle.
fn find_cycle(events: &[Event], done: &[bool]) -> Vec<String> {
    let Some(start) = events.iter().find(|e| !done[e.id.index()]) else {
        return Vec::new();
    };

    let mut path: Vec<EventId> = Vec::new();
    let mut seen: HashMap<EventId, usize> = HashMap::new();
    let mut current = start.id;

    loop {
        if let Some(&pos) = seen.get(&current) {
            let mut cycle: Vec<String> = path[pos..]
                .iter()
                .rev()
                .map(|id| events[id.index()].display_name())
                .collect();
            if let Some(first) = cycle.first().cloned() {
                cycle.push(first);
            }
            return cycle;
        }
        seen.insert(current, path.len());
        path.push(current);

        let next = events[current.index()]
            .dependencies
            .iter()
            .copied()
            .find(|dep| !done[dep.index()]);
        match next {
            Some(dep) => current = dep,
            None => return Vec::new(),
        }
    }
}

/// An event being declared; consumed by [`register`](EventDraft::register).
pub struct EventDraft<'b> {
    builder: &'b mut GraphBuilder,
    spec: EventSpec,
}

impl<'b> EventDraft<'b> {
    /// Depends on an already-registered event.
    pub fn after(mut self, handle: EventHandle) -> Self {
        self.spec.dependencies.push(DependencyRef::Id(handle.id()));
        self
    }

    /// Depends on every handle in `handles`. An empty slice leaves the event a root.
    pub fn depends_on(mut self, handles: &[EventHandle]) -> Self {
        self.spec
            .dependencies
            .extend(handles.iter().map(|h| DependencyRef::Id(h.id())));
        self
    }

    /// Depends on the event carrying `label`, which may be registered later.
    pub fn after_label(mut self, label: impl Into<String>) -> Self {
        self.spec.dependencies.push(DependencyRef::Label(label.into()));
        self
    }

    /// Triggers `delay` after the latest dependency completes.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.spec = self.spec.delay(delay);
        self
    }

    /// Triggers at a fixed simulated time.
    pub fn at(mut self, time: SimTime) -> Self {
        self.spec = self.spec.at(time);
        self
    }

    /// Marks an agent event as expected (gold) behavior.
    pub fn oracle(mut self) -> Self {
        self.spec.oracle = true;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.spec.label = Some(label.into());
        self
    }

    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.spec.event_type = event_type;
        self
    }

    /// Action fired when a condition event is satisfied.
    pub fn then(mut self, action: Action) -> Self {
        self.spec.action = Some(action);
        self
    }

    /// Registers the declared event.
    pub fn register(self) -> Result<EventHandle, BuildError> {
        self.builder.register(self.spec)
    }
}
