//! Repository for the `roms` table.

use romshelf_core::catalog::RomUpdate;
use romshelf_core::types::DbId;
use sqlx::PgPool;

use crate::models::rom::RomRow;

const COLUMNS: &str = "id, platform_id, name, summary, fs_name, fs_path, fs_name_no_tags, \
     fs_name_no_ext, path_manual, created_at, updated_at";

pub struct RomRepo;

impl RomRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RomRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM roms WHERE id = $1");
        sqlx::query_as::<_, RomRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply the rom-level part of `update` inside an open transaction.
    ///
    /// `summary` is only written when present in the update, which allows
    /// clearing it with an explicit `None`. Returns `None` if no row with
    /// the given `id` exists.
    pub async fn update_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
        update: &RomUpdate,
    ) -> Result<Option<RomRow>, sqlx::Error> {
        let query = format!(
            "UPDATE roms SET
                name = COALESCE($2, name),
                summary = CASE WHEN $3 THEN $4 ELSE summary END,
                fs_name = COALESCE($5, fs_name),
                fs_name_no_tags = COALESCE($6, fs_name_no_tags),
                fs_name_no_ext = COALESCE($7, fs_name_no_ext),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let rename = update.rename.as_ref();
        sqlx::query_as::<_, RomRow>(&query)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.summary.is_some())
            .bind(update.summary.clone().flatten())
            .bind(rename.map(|r| r.fs_name.as_str()))
            .bind(rename.map(|r| r.fs_name_no_tags.as_str()))
            .bind(rename.map(|r| r.fs_name_no_ext.as_str()))
            .fetch_optional(&mut **tx)
            .await
    }

    /// Returns `true` if the rom exists.
    pub async fn set_manual_path(
        pool: &PgPool,
        id: DbId,
        path_manual: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE roms SET path_manual = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(path_manual)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a rom; its file rows go with it (`ON DELETE CASCADE`).
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM roms WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
