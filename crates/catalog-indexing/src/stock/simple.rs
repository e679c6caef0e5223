//! Availability pass for simple products.
//!
//! One row per (product, website, stock): qty copied off the stock item,
//! status derived from the item's flags and the store-wide manage-stock
//! setting. Disabled products are filtered out by an inner join on the
//! global `status` attribute value.

use rusqlite::{params_from_iter, Connection};

use catalog_storage::{ProductType, GLOBAL_STORE_ID, STATUS_ENABLED};

use super::{own_status_expr, scope_clause, AggregationContext};
use crate::error::IndexingError;

pub(super) fn rebuild(
    conn: &Connection,
    ctx: &AggregationContext,
) -> Result<u64, IndexingError> {
    let sql = format!(
        "INSERT INTO {destination} (product_id, website_id, stock_id, qty, stock_status) \
         SELECT ce.product_id, pw.website_id, s.stock_id, COALESCE(si.qty, 0), {own_status} \
         FROM catalog_product ce \
         INNER JOIN catalog_product_website pw ON pw.product_id = ce.product_id \
         CROSS JOIN inventory_stock s \
         LEFT JOIN inventory_stock_item si \
            ON si.product_id = ce.product_id AND si.stock_id = s.stock_id \
         INNER JOIN {status_values} st ON st.product_id = ce.product_id \
            AND st.attribute_id = ? AND st.store_id = {store} AND st.value = {enabled} \
         WHERE ce.type_id = '{type_id}'{scope}",
        destination = ctx.destination,
        own_status = own_status_expr(ctx.manage_stock),
        status_values = ctx.status_attribute.backend_table,
        store = GLOBAL_STORE_ID,
        enabled = STATUS_ENABLED,
        type_id = ProductType::Simple.as_str(),
        scope = scope_clause("ce.product_id", ctx.ids),
    );
    let rows = conn.execute(&sql, params_from_iter(ctx.params()))?;
    Ok(rows as u64)
}
