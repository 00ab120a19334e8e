//! [`RomCatalog`] backed by Postgres.

use async_trait::async_trait;
use romshelf_core::catalog::{Platform, Rom, RomCatalog, RomFile, RomUpdate};
use romshelf_core::error::CoreError;
use romshelf_core::types::DbId;

use crate::repositories::{PlatformRepo, RomFileRepo, RomRepo};
use crate::DbPool;

/// PostgreSQL unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgCatalog {
    pool: DbPool,
}

impl PgCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RomCatalog for PgCatalog {
    async fn find_rom(&self, id: DbId) -> Result<Option<Rom>, CoreError> {
        let Some(row) = RomRepo::find_by_id(&self.pool, id).await.map_err(db_error)? else {
            return Ok(None);
        };
        let files = RomFileRepo::list_by_rom(&self.pool, id)
            .await
            .map_err(db_error)?;
        Ok(Some(row.into_domain(files)))
    }

    async fn find_rom_file(&self, id: DbId) -> Result<Option<RomFile>, CoreError> {
        Ok(RomFileRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_error)?
            .map(RomFile::from))
    }

    async fn find_platform(&self, id: DbId) -> Result<Option<Platform>, CoreError> {
        Ok(PlatformRepo::find_by_id(&self.pool, id)
            .await
            .map_err(db_error)?
            .map(Platform::from))
    }

    async fn update_rom(&self, id: DbId, update: &RomUpdate) -> Result<Option<Rom>, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        if RomRepo::update_in_tx(&mut tx, id, update)
            .await
            .map_err(db_error)?
            .is_none()
        {
            return Ok(None);
        }

        if let Some(rename) = &update.rename {
            for file in &rename.files {
                let updated =
                    RomFileRepo::rename_in_tx(&mut tx, id, file.id, &file.file_name, &file.file_path)
                        .await
                        .map_err(db_error)?;
                if !updated {
                    return Err(CoreError::NotFound {
                        entity: "RomFile",
                        id: file.id,
                    });
                }
            }
        }

        tx.commit().await.map_err(db_error)?;
        self.find_rom(id).await
    }

    async fn delete_rom(&self, id: DbId) -> Result<bool, CoreError> {
        RomRepo::delete(&self.pool, id).await.map_err(db_error)
    }

    async fn set_manual_path(&self, id: DbId, path_manual: &str) -> Result<(), CoreError> {
        if RomRepo::set_manual_path(&self.pool, id, path_manual)
            .await
            .map_err(db_error)?
        {
            Ok(())
        } else {
            Err(CoreError::NotFound { entity: "Rom", id })
        }
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(db_error)
    }
}

/// Map a sqlx error into the domain error space.
///
/// Unique violations become [`CoreError::Conflict`]; everything else is
/// logged and reported as internal.
fn db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let constraint = db_err.constraint().unwrap_or("unknown");
            return CoreError::Conflict(format!(
                "Duplicate value violates unique constraint: {constraint}"
            ));
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(format!("Database error: {err}"))
}
