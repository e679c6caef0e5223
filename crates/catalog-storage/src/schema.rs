//! Table definitions for the catalog index subsystem.
//!
//! Source tables mirror the normalized catalog schema the platform writes
//! to. Index tables are the denormalized destinations the storefront
//! reads. Each index table has a scratch twin (`_idx` suffix) that full
//! rebuilds write into before swapping it in.

/// All tables, created idempotently on open.
///
/// Seed rows: the default stock, the default website, and the product
/// `status` attribute exist on every installation and the aggregation
/// queries assume them.
pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS index_process (
    indexer_code TEXT PRIMARY KEY,
    mode TEXT NOT NULL,
    status TEXT NOT NULL,
    last_run_at TEXT
);

CREATE TABLE IF NOT EXISTS index_backlog (
    backlog_id INTEGER PRIMARY KEY AUTOINCREMENT,
    indexer_code TEXT NOT NULL,
    entity TEXT NOT NULL,
    action TEXT NOT NULL,
    ids TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_backlog_indexer ON index_backlog (indexer_code, backlog_id);

CREATE TABLE IF NOT EXISTS catalog_website (
    website_id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS catalog_product (
    product_id INTEGER PRIMARY KEY,
    sku TEXT NOT NULL UNIQUE,
    type_id TEXT NOT NULL,
    required_options INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS catalog_product_website (
    product_id INTEGER NOT NULL,
    website_id INTEGER NOT NULL,
    PRIMARY KEY (product_id, website_id)
);

CREATE TABLE IF NOT EXISTS inventory_stock (
    stock_id INTEGER PRIMARY KEY,
    stock_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS inventory_stock_item (
    product_id INTEGER NOT NULL,
    stock_id INTEGER NOT NULL,
    qty REAL NOT NULL DEFAULT 0,
    is_in_stock INTEGER NOT NULL DEFAULT 0,
    manage_stock INTEGER NOT NULL DEFAULT 1,
    use_config_manage_stock INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (product_id, stock_id)
);

CREATE TABLE IF NOT EXISTS bundle_option (
    option_id INTEGER PRIMARY KEY,
    parent_id INTEGER NOT NULL,
    required INTEGER NOT NULL DEFAULT 1,
    position INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_bundle_option_parent ON bundle_option (parent_id);

CREATE TABLE IF NOT EXISTS bundle_selection (
    selection_id INTEGER PRIMARY KEY AUTOINCREMENT,
    option_id INTEGER NOT NULL,
    parent_product_id INTEGER NOT NULL,
    product_id INTEGER NOT NULL,
    position INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_bundle_selection_option ON bundle_selection (option_id);
CREATE INDEX IF NOT EXISTS idx_bundle_selection_child ON bundle_selection (product_id);

CREATE TABLE IF NOT EXISTS eav_attribute (
    attribute_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_code TEXT NOT NULL UNIQUE,
    backend_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS catalog_product_int (
    value_id INTEGER PRIMARY KEY AUTOINCREMENT,
    attribute_id INTEGER NOT NULL,
    store_id INTEGER NOT NULL DEFAULT 0,
    product_id INTEGER NOT NULL,
    value INTEGER,
    UNIQUE (attribute_id, store_id, product_id)
);

CREATE TABLE IF NOT EXISTS inventory_stock_status (
    product_id INTEGER NOT NULL,
    website_id INTEGER NOT NULL,
    stock_id INTEGER NOT NULL,
    qty REAL NOT NULL DEFAULT 0,
    stock_status INTEGER NOT NULL,
    PRIMARY KEY (product_id, website_id, stock_id)
);
CREATE INDEX IF NOT EXISTS idx_stock_status_scope ON inventory_stock_status (stock_status, website_id, stock_id);

CREATE TABLE IF NOT EXISTS inventory_stock_status_idx (
    product_id INTEGER NOT NULL,
    website_id INTEGER NOT NULL,
    stock_id INTEGER NOT NULL,
    qty REAL NOT NULL DEFAULT 0,
    stock_status INTEGER NOT NULL,
    PRIMARY KEY (product_id, website_id, stock_id)
);

CREATE TABLE IF NOT EXISTS bundle_option_status (
    parent_id INTEGER NOT NULL,
    website_id INTEGER NOT NULL,
    stock_id INTEGER NOT NULL,
    option_id INTEGER NOT NULL,
    required INTEGER NOT NULL,
    status INTEGER NOT NULL,
    PRIMARY KEY (parent_id, website_id, stock_id, option_id)
);

INSERT OR IGNORE INTO inventory_stock (stock_id, stock_name) VALUES (1, 'Default');
INSERT OR IGNORE INTO catalog_website (website_id, code) VALUES (1, 'base');
INSERT OR IGNORE INTO eav_attribute (attribute_code, backend_type) VALUES ('status', 'int');
";

/// A primary/scratch table pair maintained by one indexer.
///
/// The primary table is what storefront queries read. The scratch twin
/// is only ever written between a truncate and a swap, so its content
/// outside a running rebuild is garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePair {
    /// Table storefront reads hit.
    pub primary: &'static str,
    /// Scratch twin full rebuilds write into.
    pub scratch: &'static str,
    /// Column list shared by both tables, in insert order.
    pub columns: &'static str,
}

/// Destination pair for the stock-status indexer.
pub const STOCK_STATUS: TablePair = TablePair {
    primary: "inventory_stock_status",
    scratch: "inventory_stock_status_idx",
    columns: "product_id, website_id, stock_id, qty, stock_status",
};

/// A droppable secondary index on a primary index table.
///
/// Bulk loads run faster without secondary indexes in place, so full
/// rebuilds drop these first and restore them afterwards.
#[derive(Debug, Clone, Copy)]
pub struct IndexKey {
    /// Index name, usable in DROP INDEX.
    pub name: &'static str,
    /// Statement that restores the index.
    pub create_sql: &'static str,
}

/// Secondary indexes on the stock-status primary table.
pub const STOCK_STATUS_KEYS: &[IndexKey] = &[IndexKey {
    name: "idx_stock_status_scope",
    create_sql: "CREATE INDEX IF NOT EXISTS idx_stock_status_scope \
                 ON inventory_stock_status (stock_status, website_id, stock_id)",
}];
