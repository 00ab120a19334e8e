//! Repository for the `rom_files` table.

use romshelf_core::types::DbId;
use sqlx::PgPool;

use crate::models::rom_file::RomFileRow;

const COLUMNS: &str =
    "id, rom_id, file_name, file_path, file_size_bytes, crc_hash, created_at, updated_at";

pub struct RomFileRepo;

impl RomFileRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RomFileRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rom_files WHERE id = $1");
        sqlx::query_as::<_, RomFileRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All files of a rom, ordered by file name then id.
    pub async fn list_by_rom(pool: &PgPool, rom_id: DbId) -> Result<Vec<RomFileRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rom_files
             WHERE rom_id = $1
             ORDER BY file_name ASC, id ASC"
        );
        sqlx::query_as::<_, RomFileRow>(&query)
            .bind(rom_id)
            .fetch_all(pool)
            .await
    }

    /// Point a file row at its new name and directory inside an open
    /// transaction. Returns `true` if the row belongs to `rom_id`.
    pub async fn rename_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        rom_id: DbId,
        id: DbId,
        file_name: &str,
        file_path: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE rom_files SET file_name = $3, file_path = $4, updated_at = NOW() \
             WHERE id = $1 AND rom_id = $2",
        )
        .bind(id)
        .bind(rom_id)
        .bind(file_name)
        .bind(file_path)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
