//! Domain mutation events consumed by the indexing subsystem.
//!
//! An event describes a write that already happened elsewhere in the
//! platform: which kind of entity changed, how it changed, and which ids
//! were touched. Events carry no derived state. Each indexer decides on
//! its own whether an event concerns it and what work it implies.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Entity kinds the indexing subsystem knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// A catalog product of any type.
    Product,
    /// An inventory stock item. Events for stock items carry the ids of
    /// the owning products, not the stock item rows themselves.
    StockItem,
    /// A catalog category.
    Category,
}

impl Entity {
    /// Stable code used in persisted backlog rows and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Product => "catalog_product",
            Entity::StockItem => "stock_item",
            Entity::Category => "catalog_category",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Entity {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "catalog_product" => Ok(Entity::Product),
            "stock_item" => Ok(Entity::StockItem),
            "catalog_category" => Ok(Entity::Category),
            other => Err(CatalogError::InvalidInput(format!(
                "unknown entity code: {}",
                other
            ))),
        }
    }
}

/// How the entity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// A single entity was created or updated.
    Save,
    /// A single entity was removed.
    Delete,
    /// Many entities received the same change at once.
    MassAction,
}

impl EventAction {
    /// Stable code used in persisted backlog rows and log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Save => "save",
            EventAction::Delete => "delete",
            EventAction::MassAction => "mass_action",
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventAction {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "save" => Ok(EventAction::Save),
            "delete" => Ok(EventAction::Delete),
            "mass_action" => Ok(EventAction::MassAction),
            other => Err(CatalogError::InvalidInput(format!(
                "unknown event action: {}",
                other
            ))),
        }
    }
}

/// A description of one domain mutation, handed to the dispatcher by the
/// write path that performed it.
///
/// Treated as immutable once constructed: indexers only ever see a shared
/// reference and must not rely on id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEvent {
    /// What kind of entity changed.
    pub entity: Entity,
    /// How it changed.
    pub action: EventAction,
    /// Ids of the affected entities. A save or delete carries exactly one,
    /// a mass action carries any number.
    pub ids: Vec<i64>,
}

impl IndexEvent {
    /// Event for a single created or updated entity.
    pub fn save(entity: Entity, id: i64) -> Self {
        Self {
            entity,
            action: EventAction::Save,
            ids: vec![id],
        }
    }

    /// Event for a single removed entity.
    pub fn delete(entity: Entity, id: i64) -> Self {
        Self {
            entity,
            action: EventAction::Delete,
            ids: vec![id],
        }
    }

    /// Event for a bulk change applied to many entities at once.
    pub fn mass_action(entity: Entity, ids: Vec<i64>) -> Self {
        Self {
            entity,
            action: EventAction::MassAction,
            ids,
        }
    }

    /// True when the event carries no ids at all.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl std::fmt::Display for IndexEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({} ids)",
            self.entity,
            self.action,
            self.ids.len()
        )
    }
}
