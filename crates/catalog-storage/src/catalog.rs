//! Typed access to the catalog source tables.
//!
//! These are the normalized tables the platform's write path maintains:
//! products, website assignments, stock items, bundle structure. The
//! indexers only ever read them; the write helpers here exist for the
//! platform glue and for tests that stand in for it.

use rusqlite::{params, params_from_iter};
use std::sync::Arc;

use crate::db::Db;
use crate::error::StorageError;

/// Stock every installation starts with.
pub const DEFAULT_STOCK_ID: i64 = 1;
/// Website every installation starts with.
pub const DEFAULT_WEBSITE_ID: i64 = 1;

/// Product type codes the stock indexer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductType {
    Simple,
    Bundle,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Simple => "simple",
            ProductType::Bundle => "bundle",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProductType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(ProductType::Simple),
            "bundle" => Ok(ProductType::Bundle),
            other => Err(StorageError::InvalidValue(format!(
                "unknown product type: {}",
                other
            ))),
        }
    }
}

/// One catalog product.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub product_id: i64,
    pub sku: String,
    pub type_id: ProductType,
    /// Whether the product has required custom options. A child selection
    /// with required custom options cannot be auto-added to the cart, so
    /// it never counts toward bundle availability.
    pub required_options: bool,
}

impl ProductRow {
    pub fn simple(product_id: i64, sku: impl Into<String>) -> Self {
        Self {
            product_id,
            sku: sku.into(),
            type_id: ProductType::Simple,
            required_options: false,
        }
    }

    pub fn bundle(product_id: i64, sku: impl Into<String>) -> Self {
        Self {
            product_id,
            sku: sku.into(),
            type_id: ProductType::Bundle,
            required_options: false,
        }
    }

    pub fn with_required_options(mut self, required: bool) -> Self {
        self.required_options = required;
        self
    }
}

/// One inventory stock item, keyed by (product, stock).
#[derive(Debug, Clone)]
pub struct StockItemRow {
    pub product_id: i64,
    pub stock_id: i64,
    pub qty: f64,
    pub is_in_stock: bool,
    pub manage_stock: bool,
    pub use_config_manage_stock: bool,
}

impl StockItemRow {
    /// Stock item on the default stock, following the store-wide
    /// manage-stock setting.
    pub fn new(product_id: i64, qty: f64, is_in_stock: bool) -> Self {
        Self {
            product_id,
            stock_id: DEFAULT_STOCK_ID,
            qty,
            is_in_stock,
            manage_stock: true,
            use_config_manage_stock: true,
        }
    }

    pub fn with_stock(mut self, stock_id: i64) -> Self {
        self.stock_id = stock_id;
        self
    }

    /// Override the store-wide manage-stock setting for this item.
    pub fn with_manage_stock(mut self, manage: bool) -> Self {
        self.use_config_manage_stock = false;
        self.manage_stock = manage;
        self
    }
}

/// One bundle option group.
#[derive(Debug, Clone)]
pub struct BundleOptionRow {
    pub option_id: i64,
    pub parent_id: i64,
    pub required: bool,
    pub position: i64,
}

impl BundleOptionRow {
    pub fn new(option_id: i64, parent_id: i64, required: bool) -> Self {
        Self {
            option_id,
            parent_id,
            required,
            position: 0,
        }
    }

    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }
}

/// Store for the catalog source tables.
pub struct CatalogStore {
    db: Arc<Db>,
}

impl CatalogStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Insert or update a product.
    ///
    /// New products get the enabled `status` attribute value at the
    /// global store, matching what the platform's save hook does.
    pub fn upsert_product(&self, product: &ProductRow) -> Result<(), StorageError> {
        let tx = self.db.transaction()?;
        tx.execute(
            "INSERT INTO catalog_product (product_id, sku, type_id, required_options) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (product_id) DO UPDATE SET \
                 sku = excluded.sku, \
                 type_id = excluded.type_id, \
                 required_options = excluded.required_options",
            params![
                product.product_id,
                product.sku,
                product.type_id.as_str(),
                product.required_options as i64
            ],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO catalog_product_int (attribute_id, store_id, product_id, value) \
             SELECT attribute_id, 0, ?1, 1 FROM eav_attribute WHERE attribute_code = 'status'",
            params![product.product_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove a product and everything hanging off it.
    pub fn delete_product(&self, product_id: i64) -> Result<(), StorageError> {
        let tx = self.db.transaction()?;
        tx.execute(
            "DELETE FROM catalog_product WHERE product_id = ?1",
            params![product_id],
        )?;
        tx.execute(
            "DELETE FROM catalog_product_website WHERE product_id = ?1",
            params![product_id],
        )?;
        tx.execute(
            "DELETE FROM inventory_stock_item WHERE product_id = ?1",
            params![product_id],
        )?;
        tx.execute(
            "DELETE FROM catalog_product_int WHERE product_id = ?1",
            params![product_id],
        )?;
        tx.execute(
            "DELETE FROM bundle_selection \
             WHERE product_id = ?1 OR parent_product_id = ?1",
            params![product_id],
        )?;
        tx.execute(
            "DELETE FROM bundle_option WHERE parent_id = ?1",
            params![product_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_website(&self, website_id: i64, code: &str) -> Result<(), StorageError> {
        self.db.conn().execute(
            "INSERT INTO catalog_website (website_id, code) VALUES (?1, ?2) \
             ON CONFLICT (website_id) DO UPDATE SET code = excluded.code",
            params![website_id, code],
        )?;
        Ok(())
    }

    pub fn assign_website(&self, product_id: i64, website_id: i64) -> Result<(), StorageError> {
        self.db.conn().execute(
            "INSERT OR IGNORE INTO catalog_product_website (product_id, website_id) \
             VALUES (?1, ?2)",
            params![product_id, website_id],
        )?;
        Ok(())
    }

    pub fn upsert_stock(&self, stock_id: i64, name: &str) -> Result<(), StorageError> {
        self.db.conn().execute(
            "INSERT INTO inventory_stock (stock_id, stock_name) VALUES (?1, ?2) \
             ON CONFLICT (stock_id) DO UPDATE SET stock_name = excluded.stock_name",
            params![stock_id, name],
        )?;
        Ok(())
    }

    pub fn upsert_stock_item(&self, item: &StockItemRow) -> Result<(), StorageError> {
        self.db.conn().execute(
            "INSERT INTO inventory_stock_item \
             (product_id, stock_id, qty, is_in_stock, manage_stock, use_config_manage_stock) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (product_id, stock_id) DO UPDATE SET \
                 qty = excluded.qty, \
                 is_in_stock = excluded.is_in_stock, \
                 manage_stock = excluded.manage_stock, \
                 use_config_manage_stock = excluded.use_config_manage_stock",
            params![
                item.product_id,
                item.stock_id,
                item.qty,
                item.is_in_stock as i64,
                item.manage_stock as i64,
                item.use_config_manage_stock as i64
            ],
        )?;
        Ok(())
    }

    pub fn upsert_option(&self, option: &BundleOptionRow) -> Result<(), StorageError> {
        self.db.conn().execute(
            "INSERT INTO bundle_option (option_id, parent_id, required, position) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (option_id) DO UPDATE SET \
                 parent_id = excluded.parent_id, \
                 required = excluded.required, \
                 position = excluded.position",
            params![
                option.option_id,
                option.parent_id,
                option.required as i64,
                option.position
            ],
        )?;
        Ok(())
    }

    /// Attach a child product to a bundle option. Returns the selection id.
    pub fn add_selection(
        &self,
        option_id: i64,
        parent_product_id: i64,
        product_id: i64,
        position: i64,
    ) -> Result<i64, StorageError> {
        self.db.conn().execute(
            "INSERT INTO bundle_selection (option_id, parent_product_id, product_id, position) \
             VALUES (?1, ?2, ?3, ?4)",
            params![option_id, parent_product_id, product_id, position],
        )?;
        Ok(self.db.conn().last_insert_rowid())
    }

    pub fn remove_selection(&self, selection_id: i64) -> Result<(), StorageError> {
        self.db.conn().execute(
            "DELETE FROM bundle_selection WHERE selection_id = ?1",
            params![selection_id],
        )?;
        Ok(())
    }

    /// Bundle parents that use any of the given products as a selection.
    ///
    /// A change to a child's stock can flip its parents' status, so
    /// incremental runs widen their id set with these.
    pub fn bundle_parent_ids(&self, child_ids: &[i64]) -> Result<Vec<i64>, StorageError> {
        if child_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; child_ids.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT parent_product_id FROM bundle_selection \
             WHERE product_id IN ({}) ORDER BY parent_product_id",
            placeholders
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(child_ids.iter()), |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}
