//! Declarative event matching.
//!
//! Each indexer supplies a table of the (entity, action) pairs it reacts
//! to. The dispatcher consults the table before touching the indexer, so
//! indexers never see traffic they did not declare.

use std::collections::HashMap;

use catalog_types::{Entity, EventAction, IndexEvent};

/// Table of (entity, actions) pairs one indexer subscribes to.
#[derive(Debug, Clone, Default)]
pub struct EventMatcher {
    rules: HashMap<Entity, Vec<EventAction>>,
}

impl EventMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that the given actions on `entity` are of interest.
    /// Calling again for the same entity extends the action set.
    pub fn with_entity(mut self, entity: Entity, actions: &[EventAction]) -> Self {
        let entry = self.rules.entry(entity).or_default();
        for action in actions {
            if !entry.contains(action) {
                entry.push(*action);
            }
        }
        self
    }

    /// Whether (entity, action) is in the declared set.
    pub fn matches(&self, entity: Entity, action: EventAction) -> bool {
        self.rules
            .get(&entity)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Whether any rule exists for this entity, regardless of action.
    ///
    /// The entity-level reindex cascade uses this to decide which
    /// indexers care about a changed entity at all.
    pub fn handles_entity(&self, entity: Entity) -> bool {
        self.rules.contains_key(&entity)
    }

    /// Whether the event's (entity, action) pair is in the declared set.
    pub fn matches_event(&self, event: &IndexEvent) -> bool {
        self.matches(event.entity, event.action)
    }

    /// True when no rules were declared.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
