//! SQLite-backed registry store using sqlx.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    async_trait::async_trait,
    carlink_common::{ParticipantId, Tag},
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
    tracing::debug,
};

use crate::{
    Error, Result,
    error::Context,
    record::{Provenance, RecordPatch, RegistryRecord},
    store::RegistryStore,
};

const SELECT_COLUMNS: &str =
    "SELECT tag, identity, allow_direct, display_name, phone, verified, provenance FROM registry";

#[derive(sqlx::FromRow)]
struct RecordRow {
    tag: String,
    identity: Option<i64>,
    allow_direct: bool,
    display_name: Option<String>,
    phone: Option<String>,
    verified: bool,
    provenance: String,
}

impl TryFrom<RecordRow> for RegistryRecord {
    type Error = Error;

    fn try_from(r: RecordRow) -> Result<Self> {
        Ok(Self {
            identity: r.identity.map(ParticipantId),
            tag: Tag::parse(&r.tag)
                .with_context(|| format!("corrupt registry row {:?}", r.tag))?,
            allow_direct: r.allow_direct,
            display_name: r.display_name,
            phone: r.phone,
            verified: r.verified,
            provenance: r
                .provenance
                .parse::<Provenance>()
                .with_context(|| format!("corrupt registry row {:?}", r.tag))?,
        })
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Map unique-constraint failures onto the registry's typed errors.
fn map_unique_violation(err: sqlx::Error, tag: &Tag, identity: Option<ParticipantId>) -> Error {
    if let sqlx::Error::Database(ref db) = err
        && db.is_unique_violation()
    {
        return match identity {
            Some(identity) if db.message().contains("identity") => {
                Error::identity_taken(identity)
            },
            _ => Error::duplicate_tag(tag),
        };
    }
    err.into()
}

/// SQLite-backed persistence for plate records.
pub struct SqliteRegistryStore {
    pool: SqlitePool,
}

impl SqliteRegistryStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;
        debug!(database_url, "registry database ready");

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistryStore for SqliteRegistryStore {
    async fn get(&self, tag: &Tag) -> Result<Option<RegistryRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!("{SELECT_COLUMNS} WHERE tag = ?"))
            .bind(tag.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(RegistryRecord::try_from).transpose()
    }

    async fn find_by_identity(&self, identity: ParticipantId) -> Result<Option<RegistryRecord>> {
        let row =
            sqlx::query_as::<_, RecordRow>(&format!("{SELECT_COLUMNS} WHERE identity = ?"))
                .bind(identity.0)
                .fetch_optional(&self.pool)
                .await?;
        row.map(RegistryRecord::try_from).transpose()
    }

    async fn insert(&self, record: &RegistryRecord) -> Result<()> {
        let now = now_ms();
        sqlx::query(
            r#"INSERT INTO registry
                 (tag, identity, allow_direct, display_name, phone, verified, provenance, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.tag.as_str())
        .bind(record.identity.map(|id| id.0))
        .bind(record.allow_direct)
        .bind(&record.display_name)
        .bind(&record.phone)
        .bind(record.verified)
        .bind(record.provenance.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &record.tag, record.identity))?;
        Ok(())
    }

    async fn update(&self, tag: &Tag, patch: &RecordPatch) -> Result<RegistryRecord> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, RecordRow>(&format!("{SELECT_COLUMNS} WHERE tag = ?"))
            .bind(tag.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::not_found(tag))?;
        let mut record = RegistryRecord::try_from(row)?;
        patch.apply(&mut record);

        sqlx::query(
            r#"UPDATE registry SET
                 identity = ?, allow_direct = ?, display_name = ?, phone = ?,
                 verified = ?, provenance = ?, updated_at = ?
               WHERE tag = ?"#,
        )
        .bind(record.identity.map(|id| id.0))
        .bind(record.allow_direct)
        .bind(&record.display_name)
        .bind(&record.phone)
        .bind(record.verified)
        .bind(record.provenance.as_str())
        .bind(now_ms())
        .bind(tag.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, tag, patch.identity))?;

        tx.commit().await?;
        Ok(record)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::resolver::ExternalPlate,
    };

    async fn test_store() -> SqliteRegistryStore {
        // One connection: every `sqlite::memory:` connection is its own database.
        SqliteRegistryStore::new("sqlite::memory:", 1).await.unwrap()
    }

    fn tag(s: &str) -> Tag {
        Tag::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let store = test_store().await;
        sqlx::query(
            "INSERT INTO registry (tag, identity, provenance, created_at, updated_at)
             VALUES ('not a plate!', 7, 'local', 0, 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.find_by_identity(ParticipantId(7)).await.unwrap_err();
        assert!(
            err.to_string().starts_with("corrupt registry row \"not a plate!\""),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = test_store().await;
        let record = RegistryRecord::local(
            ParticipantId(42),
            tag("AB123"),
            Some("+7000".into()),
            Some("alice".into()),
            true,
        );
        store.insert(&record).await.unwrap();

        let loaded = store.get(&tag("AB123")).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        let by_id = store.find_by_identity(ParticipantId(42)).await.unwrap();
        assert_eq!(by_id, Some(record));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = test_store().await;
        assert!(store.get(&tag("NOPE1")).await.unwrap().is_none());
        assert!(store.find_by_identity(ParticipantId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_external_records_share_null_identity() {
        let store = test_store().await;
        for t in ["X1", "X2"] {
            store
                .insert(&RegistryRecord::external(tag(t), ExternalPlate::default()))
                .await
                .unwrap();
        }
        let x1 = store.get(&tag("X1")).await.unwrap().unwrap();
        assert_eq!(x1.identity, None);
        assert_eq!(x1.provenance, Provenance::External);
    }

    #[tokio::test]
    async fn test_duplicate_tag() {
        let store = test_store().await;
        let record = RegistryRecord::local(ParticipantId(1), tag("A1"), None, None, false);
        store.insert(&record).await.unwrap();
        let other = RegistryRecord::local(ParticipantId(2), tag("A1"), None, None, false);
        assert!(matches!(
            store.insert(&other).await,
            Err(Error::DuplicateTag { .. })
        ));
    }

    #[tokio::test]
    async fn test_identity_taken() {
        let store = test_store().await;
        store
            .insert(&RegistryRecord::local(ParticipantId(1), tag("A1"), None, None, false))
            .await
            .unwrap();
        let second = RegistryRecord::local(ParticipantId(1), tag("B2"), None, None, false);
        assert!(matches!(
            store.insert(&second).await,
            Err(Error::IdentityTaken { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_claims_external_record() {
        let store = test_store().await;
        store
            .insert(&RegistryRecord::external(tag("AB123"), ExternalPlate {
                display_name: Some("Ivan".into()),
                phone: None,
                allow_direct: false,
            }))
            .await
            .unwrap();

        let claimed = RegistryRecord::local(
            ParticipantId(7),
            tag("AB123"),
            Some("+7111".into()),
            None,
            true,
        );
        let updated = store
            .update(&tag("AB123"), &RecordPatch::claim(&claimed))
            .await
            .unwrap();
        assert_eq!(updated.identity, Some(ParticipantId(7)));
        assert_eq!(updated.provenance, Provenance::Local);
        assert_eq!(updated.display_name.as_deref(), Some("Ivan"));
        assert_eq!(store.get(&tag("AB123")).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_missing() {
        let store = test_store().await;
        let result = store.update(&tag("A1"), &RecordPatch::default()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }
}
