use crate::model::{CatalogItem, Listing, PromotionItem, SourceError, StorageError, StoreFilter};
use crate::source::traits::ListingSource;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

const SELECT_LISTINGS: &str = "SELECT id, kind, name, brand, size, price, previous_price, store,
        categories, valid_from, valid_until
     FROM listings ORDER BY rowid";

/// Local listing cache. Also serves as a listing source.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    label: String,
}

impl SqliteStorage {
    /// Opens the database and runs migrations.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let label = db_path.as_ref().display().to_string();
        let conn = Connection::open(db_path)?;
        Self::init(conn, label)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, ":memory:".into())
    }

    fn init(conn: Connection, label: String) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                brand TEXT,
                size TEXT,
                price REAL NOT NULL,
                store TEXT NOT NULL
            );
            ",
        )?;

        // Columns added after the first release
        Self::migrate_add_column_if_missing(&conn, "listings", "previous_price", "REAL")?;
        Self::migrate_add_column_if_missing(&conn, "listings", "categories", "TEXT NOT NULL DEFAULT '[]'")?;
        Self::migrate_add_column_if_missing(&conn, "listings", "valid_from", "TEXT")?;
        Self::migrate_add_column_if_missing(&conn, "listings", "valid_until", "TEXT")?;

        Ok(Self { conn: Mutex::new(conn), label })
    }

    fn migrate_add_column_if_missing(
        conn: &Connection,
        table: &str,
        column: &str,
        column_def: &str,
    ) -> Result<(), StorageError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let existing_columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        if !existing_columns.iter().any(|c| c == column) {
            let alter_sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def);
            conn.execute(&alter_sql, [])?;
        }

        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts or replaces a listing.
    pub fn save_listing(&self, listing: &Listing) -> Result<(), StorageError> {
        let (kind, previous_price, valid_from, valid_until) = match listing {
            Listing::Regular(_) => ("regular", None, None, None),
            Listing::Promotion(promo) => (
                "promotion",
                Some(promo.previous_price),
                promo.valid_from.map(|d| d.to_rfc3339()),
                promo.valid_until.map(|d| d.to_rfc3339()),
            ),
        };
        let categories = serde_json::to_string(listing.categories()).unwrap_or_else(|_| "[]".into());

        self.conn().execute(
            "INSERT OR REPLACE INTO listings (
                id, kind, name, brand, size, price, previous_price, store,
                categories, valid_from, valid_until
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                listing.id(),
                kind,
                listing.name(),
                listing.brand(),
                listing.size(),
                listing.price(),
                previous_price,
                listing.store(),
                categories,
                valid_from,
                valid_until,
            ],
        )?;
        Ok(())
    }

    /// Replaces a store's listings with `listings`, dropping ids no longer offered.
    pub fn replace_store_listings(&self, store: &str, listings: &[Listing]) -> Result<(), StorageError> {
        for listing in listings {
            self.save_listing(listing)?;
        }

        let current_ids: Vec<String> = listings.iter().map(|l| l.id().to_string()).collect();
        let conn = self.conn();
        if current_ids.is_empty() {
            conn.execute("DELETE FROM listings WHERE store = ?1", params![store])?;
            return Ok(());
        }

        let placeholders = current_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("DELETE FROM listings WHERE store = ?1 AND id NOT IN ({})", placeholders);
        let mut stmt = conn.prepare(&sql)?;
        let mut params_vec = vec![store.to_string()];
        params_vec.extend(current_ids);
        stmt.execute(rusqlite::params_from_iter(params_vec))?;
        Ok(())
    }

    /// Replaces each store's cached listings with the ones in `listings`.
    /// Stores absent from the snapshot keep their rows. Returns the cached row count.
    pub fn save_snapshot(&self, listings: &[Listing]) -> Result<usize, StorageError> {
        let mut by_store: BTreeMap<&str, Vec<Listing>> = BTreeMap::new();
        for listing in listings {
            by_store.entry(listing.store()).or_default().push(listing.clone());
        }

        for (store, batch) in &by_store {
            self.replace_store_listings(store, batch)?;
        }
        info!("Cached listings of {} stores in {}", by_store.len(), self.label);
        self.count()
    }

    /// All stored listings accepted by `filter`, in insertion order.
    pub fn load_listings(&self, filter: &StoreFilter) -> Result<Vec<Listing>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(SELECT_LISTINGS)?;
        let rows = stmt.query_map([], Self::map_listing)?;

        let mut listings = Vec::new();
        for row in rows {
            let listing = row?;
            if filter.matches(listing.store()) {
                listings.push(listing);
            }
        }

        Ok(listings)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        let count: i64 = self.conn().query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn map_listing(row: &Row) -> Result<Listing, rusqlite::Error> {
        let kind: String = row.get(1)?;
        let categories_json: String = row.get(8)?;
        let categories: Vec<String> = serde_json::from_str(&categories_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

        match kind.as_str() {
            "regular" => Ok(Listing::Regular(CatalogItem {
                id: row.get(0)?,
                name: row.get(2)?,
                brand: row.get(3)?,
                size: row.get(4)?,
                price: row.get(5)?,
                store: row.get(7)?,
                categories,
            })),
            "promotion" => {
                let price: f64 = row.get(5)?;
                Ok(Listing::Promotion(PromotionItem {
                    id: row.get(0)?,
                    name: row.get(2)?,
                    brand: row.get(3)?,
                    size: row.get(4)?,
                    new_price: price,
                    previous_price: row.get::<_, Option<f64>>(6)?.unwrap_or(price),
                    store: row.get(7)?,
                    categories,
                    valid_from: Self::parse_datetime(row, 9)?,
                    valid_until: Self::parse_datetime(row, 10)?,
                }))
            }
            other => Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(StorageError::InvalidKind(other.to_string())),
            )),
        }
    }

    fn parse_datetime(row: &Row, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
        let raw: Option<String> = row.get(idx)?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        idx,
                        rusqlite::types::Type::Text,
                        Box::new(StorageError::InvalidDatetime(e)),
                    )
                })
        })
        .transpose()
    }
}

#[async_trait::async_trait]
impl ListingSource for SqliteStorage {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, filter: &StoreFilter) -> Result<Vec<Listing>, SourceError> {
        let listings = self.load_listings(filter)?;
        info!("Loaded {} listings from {}", listings.len(), self.label);
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn milk(id: &str, store: &str) -> Listing {
        Listing::Regular(CatalogItem {
            id: id.into(),
            name: "Fresh Milk".into(),
            brand: Some("Almarai".into()),
            size: Some("1L".into()),
            price: 6.5,
            store: store.into(),
            categories: vec!["dairy".into()],
        })
    }

    #[test]
    fn listings_round_trip_through_sqlite() {
        let storage = SqliteStorage::in_memory().unwrap();
        let promo = Listing::Promotion(PromotionItem {
            id: "p1".into(),
            name: "Fresh Milk".into(),
            brand: None,
            size: None,
            new_price: 5.0,
            previous_price: 6.5,
            store: "Lulu".into(),
            categories: Vec::new(),
            valid_from: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            valid_until: None,
        });
        storage.save_listing(&milk("m1", "Carrefour")).unwrap();
        storage.save_listing(&promo).unwrap();

        let loaded = storage.load_listings(&StoreFilter::all()).unwrap();
        assert_eq!(loaded, vec![milk("m1", "Carrefour"), promo]);
    }

    #[test]
    fn replace_drops_listings_no_longer_offered() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage.replace_store_listings("Lulu", &[milk("a", "Lulu"), milk("b", "Lulu")]).unwrap();
        storage.save_listing(&milk("c", "Carrefour")).unwrap();

        storage.replace_store_listings("Lulu", &[milk("b", "Lulu")]).unwrap();
        assert_eq!(storage.count().unwrap(), 2);

        let lulu = storage
            .load_listings(&StoreFilter { stores: vec!["Lulu".into()] })
            .unwrap();
        assert_eq!(lulu.len(), 1);
        assert_eq!(lulu[0].id(), "b");

        storage.replace_store_listings("Lulu", &[]).unwrap();
        assert_eq!(storage.count().unwrap(), 1);
    }

    #[test]
    fn snapshot_refreshes_only_the_stores_it_carries() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage
            .save_snapshot(&[milk("a", "Lulu"), milk("b", "Lulu"), milk("c", "Carrefour")])
            .unwrap();

        let cached = storage.save_snapshot(&[milk("b", "Lulu"), milk("d", "Lulu")]).unwrap();
        assert_eq!(cached, 3);

        let mut ids: Vec<String> = storage
            .load_listings(&StoreFilter::all())
            .unwrap()
            .iter()
            .map(|l| l.id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn malformed_promotion_window_is_reported() {
        let storage = SqliteStorage::in_memory().unwrap();
        storage
            .conn()
            .execute(
                "INSERT INTO listings (id, kind, name, price, store, valid_from)
                 VALUES ('p', 'promotion', 'Milk', 5.0, 'Lulu', 'next tuesday')",
                [],
            )
            .unwrap();

        let err = storage.load_listings(&StoreFilter::all()).unwrap_err();
        assert!(err.to_string().contains("invalid datetime"), "got {err}");
    }

    #[test]
    fn reopening_a_database_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.db");
        SqliteStorage::new(&path).unwrap().save_listing(&milk("m1", "Lulu")).unwrap();

        let reopened = SqliteStorage::new(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
