use std::sync::Arc;

use romshelf_core::catalog::RomCatalog;
use romshelf_core::delivery::DeliveryService;
use romshelf_core::library::LibraryService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Rom catalog (Postgres in production, in-memory in tests).
    pub catalog: Arc<dyn RomCatalog>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Download strategy selection.
    pub delivery: Arc<DeliveryService>,
    /// Uploads, renames, deletes and manuals.
    pub library: Arc<LibraryService>,
}

impl AppState {
    /// Wire the services around `catalog` using the layout and delivery mode
    /// from `config`.
    pub fn new(catalog: Arc<dyn RomCatalog>, config: ServerConfig) -> Self {
        let layout = config.layout();
        let delivery = DeliveryService::new(
            Arc::clone(&catalog),
            layout.clone(),
            config.delivery_mode,
        );
        let library = LibraryService::new(Arc::clone(&catalog), layout);

        Self {
            catalog,
            config: Arc::new(config),
            delivery: Arc::new(delivery),
            library: Arc::new(library),
        }
    }
}
