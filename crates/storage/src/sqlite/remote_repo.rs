use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, Transaction};
use tutor_core::model::UserId;

use super::SqliteRepository;
use super::mapping::{conn, counter_column, parse_set_field, ser, u32_from_i64, u64_from_i64, u64_to_i64};
use crate::document::RemoteRecord;
use crate::repository::{RemoteCounterField, RemoteSetField, RemoteStore, StorageError};

async fn record_exists(
    tx: &mut Transaction<'_, Sqlite>,
    user: &UserId,
) -> Result<bool, StorageError> {
    let row = sqlx::query("SELECT 1 FROM progress_records WHERE learner_id = ?1")
        .bind(user.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(conn)?;
    Ok(row.is_some())
}

async fn insert_members(
    tx: &mut Transaction<'_, Sqlite>,
    user: &UserId,
    record: &RemoteRecord,
) -> Result<(), StorageError> {
    for field in [RemoteSetField::CompletedLessons, RemoteSetField::EarnedBadges] {
        for value in record.set(field) {
            sqlx::query(
                r"
                INSERT OR IGNORE INTO progress_record_members (learner_id, field, value)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(user.as_str())
            .bind(field.as_str())
            .bind(value)
            .execute(&mut **tx)
            .await
            .map_err(conn)?;
        }
    }
    Ok(())
}

fn stamp(record: &RemoteRecord) -> DateTime<Utc> {
    record.updated_at.unwrap_or_else(Utc::now)
}

#[async_trait]
impl RemoteStore for SqliteRepository {
    async fn get_record(&self, user: &UserId) -> Result<Option<RemoteRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT points, streak_days, updated_at
            FROM progress_records
            WHERE learner_id = ?1
            ",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut record = RemoteRecord {
            points: u64_from_i64("points", row.try_get("points").map_err(ser)?)?,
            streak_days: u32_from_i64("streak_days", row.try_get("streak_days").map_err(ser)?)?,
            updated_at: row.try_get("updated_at").map_err(ser)?,
            ..RemoteRecord::default()
        };

        let members = sqlx::query(
            r"
            SELECT field, value
            FROM progress_record_members
            WHERE learner_id = ?1
            ORDER BY rowid
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        for member in members {
            let field: String = member.try_get("field").map_err(ser)?;
            let value: String = member.try_get("value").map_err(ser)?;
            record.append(parse_set_field(&field)?, &value);
        }

        Ok(Some(record))
    }

    async fn create_record(
        &self,
        user: &UserId,
        defaults: &RemoteRecord,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let inserted = sqlx::query(
            r"
            INSERT OR IGNORE INTO progress_records (learner_id, points, streak_days, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(user.as_str())
        .bind(u64_to_i64("points", defaults.points)?)
        .bind(i64::from(defaults.streak_days))
        .bind(stamp(defaults))
        .execute(&mut *tx)
        .await
        .map_err(conn)?
        .rows_affected();

        if inserted == 1 {
            insert_members(&mut tx, user, defaults).await?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn append_to_set(
        &self,
        user: &UserId,
        field: RemoteSetField,
        value: &str,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        if !record_exists(&mut tx, user).await? {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
            INSERT OR IGNORE INTO progress_record_members (learner_id, field, value)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(user.as_str())
        .bind(field.as_str())
        .bind(value)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("UPDATE progress_records SET updated_at = ?2 WHERE learner_id = ?1")
            .bind(user.as_str())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn increment_number(
        &self,
        user: &UserId,
        field: RemoteCounterField,
        delta: i64,
    ) -> Result<(), StorageError> {
        let column = counter_column(field);
        let sql = format!(
            "UPDATE progress_records SET {column} = MAX({column} + ?2, 0), updated_at = ?3 \
             WHERE learner_id = ?1"
        );

        let affected = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(delta)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(conn)?
            .rows_affected();

        if affected == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn overwrite_record(
        &self,
        user: &UserId,
        record: &RemoteRecord,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO progress_records (learner_id, points, streak_days, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(learner_id) DO UPDATE SET
                points = excluded.points,
                streak_days = excluded.streak_days,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user.as_str())
        .bind(u64_to_i64("points", record.points)?)
        .bind(i64::from(record.streak_days))
        .bind(stamp(record))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM progress_record_members WHERE learner_id = ?1")
            .bind(user.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        insert_members(&mut tx, user, record).await?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
