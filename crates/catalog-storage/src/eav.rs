//! The narrow slice of the EAV metadata system the indexers consume.
//!
//! Aggregation queries need to know where an attribute's values live.
//! This store resolves an attribute code to {attribute id, backend
//! table}; scope fallback stays with the EAV collaborator, the indexers
//! only ever read the global-store row.

use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::db::Db;
use crate::error::StorageError;

/// Attribute code for product enabled/disabled state.
pub const STATUS_ATTRIBUTE: &str = "status";
/// `status` value for sellable products.
pub const STATUS_ENABLED: i64 = 1;
/// `status` value for disabled products.
pub const STATUS_DISABLED: i64 = 2;
/// Store id of the global scope.
pub const GLOBAL_STORE_ID: i64 = 0;

/// Where one attribute's values live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    pub attribute_id: i64,
    pub backend_table: String,
}

/// Store for attribute metadata and attribute values.
pub struct EavStore {
    db: Arc<Db>,
}

impl EavStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Resolve an attribute code to its id and backend table.
    pub fn resolve(&self, code: &str) -> Result<AttributeRef, StorageError> {
        let row = self
            .db
            .conn()
            .query_row(
                "SELECT attribute_id, backend_type FROM eav_attribute \
                 WHERE attribute_code = ?1",
                params![code],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let (attribute_id, backend_type) =
            row.ok_or_else(|| StorageError::NotFound(format!("attribute {}", code)))?;
        Ok(AttributeRef {
            attribute_id,
            backend_table: format!("catalog_product_{}", backend_type),
        })
    }

    /// Create the attribute if missing, returning its id either way.
    pub fn ensure_attribute(&self, code: &str, backend_type: &str) -> Result<i64, StorageError> {
        self.db.conn().execute(
            "INSERT OR IGNORE INTO eav_attribute (attribute_code, backend_type) \
             VALUES (?1, ?2)",
            params![code, backend_type],
        )?;
        Ok(self.resolve(code)?.attribute_id)
    }

    /// Set an integer attribute value for a product at a store scope.
    pub fn set_int_value(
        &self,
        attribute_id: i64,
        store_id: i64,
        product_id: i64,
        value: i64,
    ) -> Result<(), StorageError> {
        self.db.conn().execute(
            "INSERT INTO catalog_product_int (attribute_id, store_id, product_id, value) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (attribute_id, store_id, product_id) DO UPDATE SET \
                 value = excluded.value",
            params![attribute_id, store_id, product_id, value],
        )?;
        Ok(())
    }
}
