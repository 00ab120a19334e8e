//! Repository for the `platforms` table.

use romshelf_core::types::DbId;
use sqlx::PgPool;

use crate::models::platform::PlatformRow;

const COLUMNS: &str = "id, slug, fs_slug, name, custom_name, created_at, updated_at";

pub struct PlatformRepo;

impl PlatformRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PlatformRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM platforms WHERE id = $1");
        sqlx::query_as::<_, PlatformRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
