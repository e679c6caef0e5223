//! End-to-end test infrastructure for the catalog indexing subsystem.
//!
//! Provides a shared TestHarness and seeding helpers for tests covering
//! the full event-to-index pipeline: catalog writes, event dispatch,
//! backlog drains, and full rebuilds.

use std::sync::Arc;

use catalog_indexing::{Dispatcher, StockStatusIndexer};
use catalog_storage::{
    BundleOptionRow, CatalogStore, Db, EavStore, ProcessStore, ProductRow, StockItemRow,
    DEFAULT_WEBSITE_ID, GLOBAL_STORE_ID, STATUS_ATTRIBUTE, STATUS_DISABLED,
};
use catalog_types::{IndexerMode, ProcessState, StockSettings};

/// One row of the availability index, in primary-key order.
pub type IndexRow = (i64, i64, i64, f64, i64);

/// Shared test harness for end-to-end tests.
///
/// Owns a file-backed database in a temp directory and typed writers
/// for seeding the catalog source tables.
pub struct TestHarness {
    /// Keeps the temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub db: Arc<Db>,
    pub catalog: CatalogStore,
    pub eav: EavStore,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let db = Arc::new(
            Db::open(&temp_dir.path().join("catalog.db")).expect("Failed to open test database"),
        );
        Self {
            catalog: CatalogStore::new(Arc::clone(&db)),
            eav: EavStore::new(Arc::clone(&db)),
            db,
            _temp_dir: temp_dir,
        }
    }

    /// Dispatcher with the stock indexer registered in the given mode.
    pub fn engine(&self, mode: IndexerMode) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.db));
        dispatcher
            .register(
                Box::new(StockStatusIndexer::new(
                    Arc::clone(&self.db),
                    &StockSettings::default(),
                )),
                mode,
            )
            .expect("Failed to register stock indexer");
        dispatcher
    }

    /// Simple product assigned to the default website, with a stock item.
    pub fn seed_simple(&self, id: i64, qty: f64, in_stock: bool) {
        self.catalog
            .upsert_product(&ProductRow::simple(id, format!("sku-{}", id)))
            .expect("Failed to upsert product");
        self.catalog
            .assign_website(id, DEFAULT_WEBSITE_ID)
            .expect("Failed to assign website");
        self.set_stock(id, qty, in_stock);
    }

    /// Bundle product assigned to the default website, without options.
    pub fn seed_bundle(&self, id: i64) {
        self.catalog
            .upsert_product(&ProductRow::bundle(id, format!("bundle-{}", id)))
            .expect("Failed to upsert bundle");
        self.catalog
            .assign_website(id, DEFAULT_WEBSITE_ID)
            .expect("Failed to assign website");
    }

    /// Option on a bundle with the given children as selections.
    pub fn add_option(&self, option_id: i64, parent_id: i64, required: bool, children: &[i64]) {
        self.catalog
            .upsert_option(&BundleOptionRow::new(option_id, parent_id, required))
            .expect("Failed to upsert option");
        for (position, child) in children.iter().enumerate() {
            self.catalog
                .add_selection(option_id, parent_id, *child, position as i64)
                .expect("Failed to add selection");
        }
    }

    /// Overwrite a product's stock item on the default stock.
    pub fn set_stock(&self, product_id: i64, qty: f64, in_stock: bool) {
        self.catalog
            .upsert_stock_item(&StockItemRow::new(product_id, qty, in_stock))
            .expect("Failed to upsert stock item");
    }

    /// Set the product's global status to disabled.
    pub fn disable_product(&self, product_id: i64) {
        let attribute_id = self
            .eav
            .resolve(STATUS_ATTRIBUTE)
            .expect("Failed to resolve status attribute")
            .attribute_id;
        self.eav
            .set_int_value(attribute_id, GLOBAL_STORE_ID, product_id, STATUS_DISABLED)
            .expect("Failed to set status value");
    }

    /// Availability of one product on the default website and stock.
    pub fn status_of(&self, product_id: i64) -> Option<i64> {
        use rusqlite::OptionalExtension;
        self.db
            .conn()
            .query_row(
                "SELECT stock_status FROM inventory_stock_status \
                 WHERE product_id = ?1 AND website_id = 1 AND stock_id = 1",
                rusqlite::params![product_id],
                |row| row.get(0),
            )
            .optional()
            .expect("Failed to query stock status")
    }

    /// Every availability row, ordered by primary key.
    ///
    /// Snapshots taken before and after an operation make idempotence
    /// and incremental-versus-full comparisons exact.
    pub fn index_snapshot(&self) -> Vec<IndexRow> {
        let mut stmt = self
            .db
            .conn()
            .prepare(
                "SELECT product_id, website_id, stock_id, qty, stock_status \
                 FROM inventory_stock_status \
                 ORDER BY product_id, website_id, stock_id",
            )
            .expect("Failed to prepare snapshot query");
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })
            .expect("Failed to query snapshot")
            .collect::<Result<Vec<IndexRow>, _>>()
            .expect("Failed to collect snapshot");
        rows
    }

    /// Current process row for one indexer.
    pub fn process_state(&self, code: &str) -> ProcessState {
        ProcessStore::new(Arc::clone(&self.db))
            .load(code)
            .expect("Failed to load process state")
    }

    /// Queued backlog rows for one indexer.
    pub fn backlog_count(&self, code: &str) -> i64 {
        self.db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM index_backlog WHERE indexer_code = ?1",
                rusqlite::params![code],
                |row| row.get(0),
            )
            .expect("Failed to count backlog")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
