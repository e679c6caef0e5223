//! Availability rollup for bundle products.
//!
//! Two passes over an intermediate table. The first grades every option
//! of every bundle: an option is available when any of its selections is
//! in stock. The second grades the bundles themselves: available when
//! every required option is available and the bundle's own flags allow
//! it. The intermediate is wiped on the way in and on the way out.

use rusqlite::{params_from_iter, Connection};

use catalog_storage::{ProductType, GLOBAL_STORE_ID, STATUS_ENABLED};

use super::{own_status_expr, scope_clause, AggregationContext};
use crate::error::IndexingError;

pub(super) fn rebuild(
    conn: &Connection,
    ctx: &AggregationContext,
) -> Result<u64, IndexingError> {
    conn.execute("DELETE FROM bundle_option_status", [])?;
    build_option_status(conn, ctx)?;
    let rows = build_parent_status(conn, ctx)?;
    conn.execute("DELETE FROM bundle_option_status", [])?;
    Ok(rows)
}

/// Grade each option: the best status among its selections.
///
/// An option with no selections grades 0, as does a selection whose
/// child is missing from the availability facts (disabled, unassigned,
/// or deleted) or carries required custom options.
fn build_option_status(
    conn: &Connection,
    ctx: &AggregationContext,
) -> Result<u64, IndexingError> {
    let sql = format!(
        "INSERT INTO bundle_option_status \
             (parent_id, website_id, stock_id, option_id, required, status) \
         SELECT bo.parent_id, pw.website_id, s.stock_id, bo.option_id, bo.required, \
             MAX(CASE \
                 WHEN bs.selection_id IS NULL THEN 0 \
                 WHEN child.required_options = 1 THEN 0 \
                 ELSE COALESCE(i.stock_status, 0) \
             END) \
         FROM bundle_option bo \
         INNER JOIN catalog_product parent ON parent.product_id = bo.parent_id \
         INNER JOIN catalog_product_website pw ON pw.product_id = bo.parent_id \
         CROSS JOIN inventory_stock s \
         LEFT JOIN bundle_selection bs ON bs.option_id = bo.option_id \
         LEFT JOIN catalog_product child ON child.product_id = bs.product_id \
         LEFT JOIN {facts} i ON i.product_id = bs.product_id \
            AND i.website_id = pw.website_id AND i.stock_id = s.stock_id \
         WHERE parent.type_id = '{type_id}'{scope} \
         GROUP BY bo.parent_id, pw.website_id, s.stock_id, bo.option_id, bo.required",
        facts = ctx.facts,
        type_id = ProductType::Bundle.as_str(),
        scope = scope_clause("bo.parent_id", ctx.ids),
    );
    let rows = conn.execute(&sql, params_from_iter(ctx.scope_ids()))?;
    Ok(rows as u64)
}

/// Grade each bundle: the worst required option, floored by the
/// bundle's own stock flags. Optional options and bundles without any
/// options contribute a neutral 1. Bundles carry no own quantity.
fn build_parent_status(
    conn: &Connection,
    ctx: &AggregationContext,
) -> Result<u64, IndexingError> {
    let sql = format!(
        "INSERT INTO {destination} (product_id, website_id, stock_id, qty, stock_status) \
         SELECT ce.product_id, pw.website_id, s.stock_id, 0, \
             MIN( \
                 MIN(CASE \
                     WHEN o.option_id IS NULL THEN 1 \
                     WHEN o.required = 0 THEN 1 \
                     ELSE o.status \
                 END), \
                 MIN({own_status}) \
             ) \
         FROM catalog_product ce \
         INNER JOIN catalog_product_website pw ON pw.product_id = ce.product_id \
         CROSS JOIN inventory_stock s \
         LEFT JOIN inventory_stock_item si \
            ON si.product_id = ce.product_id AND si.stock_id = s.stock_id \
         LEFT JOIN bundle_option_status o ON o.parent_id = ce.product_id \
            AND o.website_id = pw.website_id AND o.stock_id = s.stock_id \
         INNER JOIN {status_values} st ON st.product_id = ce.product_id \
            AND st.attribute_id = ? AND st.store_id = {store} AND st.value = {enabled} \
         WHERE ce.type_id = '{type_id}'{scope} \
         GROUP BY ce.product_id, pw.website_id, s.stock_id",
        destination = ctx.destination,
        own_status = own_status_expr(ctx.manage_stock),
        status_values = ctx.status_attribute.backend_table,
        store = GLOBAL_STORE_ID,
        enabled = STATUS_ENABLED,
        type_id = ProductType::Bundle.as_str(),
        scope = scope_clause("ce.product_id", ctx.ids),
    );
    let rows = conn.execute(&sql, params_from_iter(ctx.params()))?;
    Ok(rows as u64)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rusqlite::{params, OptionalExtension};

    use catalog_storage::{
        BundleOptionRow, CatalogStore, Db, EavStore, ProductRow, StockItemRow,
        DEFAULT_WEBSITE_ID, STATUS_ATTRIBUTE, STOCK_STATUS,
    };

    use super::super::simple;
    use super::*;

    fn setup() -> (Arc<Db>, CatalogStore) {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let catalog = CatalogStore::new(Arc::clone(&db));
        (db, catalog)
    }

    /// Runs the simple pass first so the rollup has child facts to read.
    fn rebuild_all(db: &Arc<Db>) -> u64 {
        let attribute = EavStore::new(Arc::clone(db))
            .resolve(STATUS_ATTRIBUTE)
            .unwrap();
        let ctx = AggregationContext {
            destination: STOCK_STATUS.primary,
            facts: STOCK_STATUS.primary,
            status_attribute: &attribute,
            manage_stock: true,
            ids: None,
        };
        simple::rebuild(db.conn(), &ctx).unwrap();
        rebuild(db.conn(), &ctx).unwrap()
    }

    fn seed_child(catalog: &CatalogStore, id: i64, in_stock: bool) {
        catalog
            .upsert_product(&ProductRow::simple(id, format!("child-{}", id)))
            .unwrap();
        catalog.assign_website(id, DEFAULT_WEBSITE_ID).unwrap();
        catalog
            .upsert_stock_item(&StockItemRow::new(id, 1.0, in_stock))
            .unwrap();
    }

    fn seed_bundle(catalog: &CatalogStore, id: i64) {
        catalog
            .upsert_product(&ProductRow::bundle(id, format!("bundle-{}", id)))
            .unwrap();
        catalog.assign_website(id, DEFAULT_WEBSITE_ID).unwrap();
    }

    fn row_of(db: &Db, product: i64) -> Option<(f64, i64)> {
        db.conn()
            .query_row(
                "SELECT qty, stock_status FROM inventory_stock_status \
                 WHERE product_id = ?1 AND website_id = 1 AND stock_id = 1",
                params![product],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap()
    }

    fn status_of(db: &Db, product: i64) -> Option<i64> {
        row_of(db, product).map(|(_, status)| status)
    }

    #[test]
    fn required_option_out_of_stock_blocks_the_bundle() {
        let (db, catalog) = setup();
        seed_child(&catalog, 20, false);
        seed_bundle(&catalog, 30);
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, true))
            .unwrap();
        catalog.add_selection(1, 30, 20, 0).unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(0));
    }

    #[test]
    fn optional_option_out_of_stock_does_not_block() {
        let (db, catalog) = setup();
        seed_child(&catalog, 20, true);
        seed_child(&catalog, 21, false);
        seed_bundle(&catalog, 30);
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, true))
            .unwrap();
        catalog.add_selection(1, 30, 20, 0).unwrap();
        catalog
            .upsert_option(&BundleOptionRow::new(2, 30, false))
            .unwrap();
        catalog.add_selection(2, 30, 21, 0).unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(1));
    }

    #[test]
    fn any_in_stock_selection_satisfies_an_option() {
        let (db, catalog) = setup();
        seed_child(&catalog, 20, false);
        seed_child(&catalog, 21, true);
        seed_bundle(&catalog, 30);
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, true))
            .unwrap();
        catalog.add_selection(1, 30, 20, 0).unwrap();
        catalog.add_selection(1, 30, 21, 1).unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(1));
    }

    #[test]
    fn bundle_without_options_uses_its_own_flags() {
        let (db, catalog) = setup();
        seed_bundle(&catalog, 30);
        catalog
            .upsert_stock_item(&StockItemRow::new(30, 0.0, false))
            .unwrap();
        seed_bundle(&catalog, 31);
        catalog
            .upsert_stock_item(&StockItemRow::new(31, 0.0, true))
            .unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(0));
        assert_eq!(status_of(&db, 31), Some(1));
    }

    #[test]
    fn bundle_missing_its_stock_item_defaults_to_in_stock() {
        let (db, catalog) = setup();
        seed_child(&catalog, 20, true);
        seed_bundle(&catalog, 30);
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, true))
            .unwrap();
        catalog.add_selection(1, 30, 20, 0).unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(1));
    }

    #[test]
    fn own_flags_floor_healthy_options() {
        let (db, catalog) = setup();
        seed_child(&catalog, 20, true);
        seed_bundle(&catalog, 30);
        catalog
            .upsert_stock_item(&StockItemRow::new(30, 0.0, false))
            .unwrap();
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, true))
            .unwrap();
        catalog.add_selection(1, 30, 20, 0).unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(0));
    }

    #[test]
    fn required_option_with_no_selections_blocks() {
        let (db, catalog) = setup();
        seed_bundle(&catalog, 30);
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, true))
            .unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(0));
    }

    #[test]
    fn optional_option_with_no_selections_does_not_block() {
        let (db, catalog) = setup();
        seed_bundle(&catalog, 30);
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, false))
            .unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(1));
    }

    #[test]
    fn child_with_required_custom_options_never_satisfies() {
        let (db, catalog) = setup();
        catalog
            .upsert_product(
                &ProductRow::simple(20, "child-20").with_required_options(true),
            )
            .unwrap();
        catalog.assign_website(20, DEFAULT_WEBSITE_ID).unwrap();
        catalog
            .upsert_stock_item(&StockItemRow::new(20, 5.0, true))
            .unwrap();
        seed_bundle(&catalog, 30);
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, true))
            .unwrap();
        catalog.add_selection(1, 30, 20, 0).unwrap();

        rebuild_all(&db);
        assert_eq!(status_of(&db, 30), Some(0));
    }

    #[test]
    fn bundle_rows_carry_zero_qty() {
        let (db, catalog) = setup();
        seed_bundle(&catalog, 30);
        catalog
            .upsert_stock_item(&StockItemRow::new(30, 12.0, true))
            .unwrap();

        rebuild_all(&db);
        assert_eq!(row_of(&db, 30), Some((0.0, 1)));
    }

    #[test]
    fn intermediate_table_is_cleared_after_the_rollup() {
        let (db, catalog) = setup();
        seed_child(&catalog, 20, true);
        seed_bundle(&catalog, 30);
        catalog
            .upsert_option(&BundleOptionRow::new(1, 30, true))
            .unwrap();
        catalog.add_selection(1, 30, 20, 0).unwrap();

        rebuild_all(&db);
        assert_eq!(db.count("bundle_option_status").unwrap(), 0);
    }
}
