//! The stock-status indexer.
//!
//! Maintains `inventory_stock_status`, the denormalized availability
//! table keyed by (product, website, stock). Simple products read their
//! status straight off their stock item; bundles roll their children up
//! through a per-option intermediate and combine the result with their
//! own flags.

mod bundle;
mod simple;

use std::sync::Arc;

use rusqlite::params_from_iter;
use tracing::debug;

use catalog_storage::{
    AttributeRef, CatalogStore, Db, EavStore, STATUS_ATTRIBUTE, STOCK_STATUS,
    STOCK_STATUS_KEYS,
};
use catalog_types::{Entity, EventAction, IndexEvent, StockSettings};

use crate::error::IndexingError;
use crate::indexer::{Indexer, UpdateResult};
use crate::matcher::EventMatcher;
use crate::rebuild::{run_shadow_rebuild, RebuildProgress};

/// Inputs shared by the aggregation passes.
///
/// A full rebuild points both tables at the scratch twin; an incremental
/// run points both at the primary so bundle rollups see fresh child rows.
struct AggregationContext<'a> {
    /// Table the pass inserts into
    destination: &'a str,
    /// Table the bundle rollup reads child statuses from
    facts: &'a str,
    /// Resolved product `status` attribute
    status_attribute: &'a AttributeRef,
    /// Store-wide manage-stock setting
    manage_stock: bool,
    /// Product scope; `Some` is never empty, `None` means everything
    ids: Option<&'a [i64]>,
}

impl AggregationContext<'_> {
    fn scope_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.into_iter().flatten().copied()
    }

    /// Bind order for passes that filter on the status attribute.
    fn params(&self) -> impl Iterator<Item = i64> + '_ {
        std::iter::once(self.status_attribute.attribute_id).chain(self.scope_ids())
    }
}

/// Availability a stock item contributes on its own.
///
/// A missing stock item reads as in stock either way: the joins are LEFT
/// and every branch coalesces NULL towards 1.
fn own_status_expr(manage_stock: bool) -> &'static str {
    if manage_stock {
        // Managed by default; an item opting out is always in stock.
        "CASE WHEN si.use_config_manage_stock = 0 AND si.manage_stock = 0 THEN 1 \
         ELSE COALESCE(si.is_in_stock, 1) END"
    } else {
        // Unmanaged by default; only an item opting in keeps its own flag.
        "CASE WHEN si.use_config_manage_stock = 0 AND si.manage_stock = 1 \
         THEN si.is_in_stock ELSE 1 END"
    }
}

/// ` AND column IN (?, ?, ...)` for a scoped pass, empty for a full one.
fn scope_clause(column: &str, ids: Option<&[i64]>) -> String {
    match ids {
        Some(ids) => {
            let marks = vec!["?"; ids.len()].join(", ");
            format!(" AND {} IN ({})", column, marks)
        }
        None => String::new(),
    }
}

/// Indexer for product availability.
pub struct StockStatusIndexer {
    db: Arc<Db>,
    catalog: CatalogStore,
    eav: EavStore,
    matcher: EventMatcher,
    manage_stock: bool,
}

impl StockStatusIndexer {
    pub fn new(db: Arc<Db>, settings: &StockSettings) -> Self {
        let matcher = EventMatcher::new()
            .with_entity(
                Entity::Product,
                &[
                    EventAction::Save,
                    EventAction::Delete,
                    EventAction::MassAction,
                ],
            )
            .with_entity(
                Entity::StockItem,
                &[EventAction::Save, EventAction::MassAction],
            );
        Self {
            catalog: CatalogStore::new(Arc::clone(&db)),
            eav: EavStore::new(Arc::clone(&db)),
            db,
            matcher,
            manage_stock: settings.manage_stock,
        }
    }

    /// Recompute the given products plus any bundles that contain them.
    ///
    /// Runs in one transaction: scoped rows are deleted first, then both
    /// passes write fresh rows against the primary table. Products that
    /// became disabled or unassigned simply never come back.
    fn rebuild_scoped(&self, ids: &[i64]) -> Result<UpdateResult, IndexingError> {
        let mut scope = ids.to_vec();
        scope.extend(self.catalog.bundle_parent_ids(ids)?);
        scope.sort_unstable();
        scope.dedup();

        let status_attribute = self.eav.resolve(STATUS_ATTRIBUTE)?;
        let ctx = AggregationContext {
            destination: STOCK_STATUS.primary,
            facts: STOCK_STATUS.primary,
            status_attribute: &status_attribute,
            manage_stock: self.manage_stock,
            ids: Some(&scope),
        };

        let tx = self.db.transaction()?;
        let marks = vec!["?"; scope.len()].join(", ");
        let deleted = tx.execute(
            &format!(
                "DELETE FROM {} WHERE product_id IN ({})",
                STOCK_STATUS.primary, marks
            ),
            params_from_iter(scope.iter()),
        )?;
        let written = simple::rebuild(&tx, &ctx)? + bundle::rebuild(&tx, &ctx)?;
        tx.commit()?;

        let mut result = UpdateResult::new();
        result.record_deleted(deleted);
        result.record_rows(written as usize);
        debug!(
            products = scope.len(),
            rows = written,
            "Recomputed stock status"
        );
        Ok(result)
    }

    /// Drop index rows for deleted products and refresh their parents.
    fn remove_products(&self, ids: &[i64]) -> Result<UpdateResult, IndexingError> {
        // Collected before the source rows disappear entirely; a cascade
        // that already removed the selections leaves nothing to widen.
        let parents = self.catalog.bundle_parent_ids(ids)?;

        let marks = vec!["?"; ids.len()].join(", ");
        let deleted = self.db.conn().execute(
            &format!(
                "DELETE FROM {} WHERE product_id IN ({})",
                STOCK_STATUS.primary, marks
            ),
            params_from_iter(ids.iter()),
        )?;

        let mut result = UpdateResult::new();
        result.record_deleted(deleted);
        if !parents.is_empty() {
            result.merge(&self.rebuild_scoped(&parents)?);
        }
        Ok(result)
    }
}

impl Indexer for StockStatusIndexer {
    fn code(&self) -> &'static str {
        "stock_status"
    }

    fn name(&self) -> &'static str {
        "Stock Status"
    }

    fn description(&self) -> &'static str {
        "Product availability by website and stock source"
    }

    fn primary_entity(&self) -> Entity {
        Entity::Product
    }

    fn matcher(&self) -> &EventMatcher {
        &self.matcher
    }

    fn process_event(&self, event: &IndexEvent) -> Result<UpdateResult, IndexingError> {
        if !self.matcher.matches_event(event) || event.is_empty() {
            let mut result = UpdateResult::new();
            result.record_skip();
            return Ok(result);
        }
        if event.entity == Entity::Product && event.action == EventAction::Delete {
            return self.remove_products(&event.ids);
        }
        // Stock items are keyed by product id, so both entities recompute
        // the same scope.
        self.rebuild_scoped(&event.ids)
    }

    fn reindex_all(&self) -> Result<RebuildProgress, IndexingError> {
        let status_attribute = self.eav.resolve(STATUS_ATTRIBUTE)?;
        run_shadow_rebuild(&self.db, self, &STOCK_STATUS, || {
            let ctx = AggregationContext {
                destination: STOCK_STATUS.scratch,
                facts: STOCK_STATUS.scratch,
                status_attribute: &status_attribute,
                manage_stock: self.manage_stock,
                ids: None,
            };
            let conn = self.db.conn();
            Ok(simple::rebuild(conn, &ctx)? + bundle::rebuild(conn, &ctx)?)
        })
    }

    fn reindex_ids(&self, ids: &[i64]) -> Result<UpdateResult, IndexingError> {
        if ids.is_empty() {
            return Ok(UpdateResult::new());
        }
        self.rebuild_scoped(ids)
    }

    fn disable_keys(&self) -> Result<(), IndexingError> {
        for key in STOCK_STATUS_KEYS {
            self.db
                .conn()
                .execute(&format!("DROP INDEX IF EXISTS {}", key.name), [])?;
        }
        Ok(())
    }

    fn enable_keys(&self) -> Result<(), IndexingError> {
        for key in STOCK_STATUS_KEYS {
            self.db.conn().execute(key.create_sql, [])?;
        }
        Ok(())
    }
}
