//! Application state container shared across Axum route handlers and services.
//!
//! Holds the database connection and the token rotation runtime. It is cloned
//! freely and passed into route handlers via Axum's `State<T>` extractor.

use crate::rotation::RotationManager;
use sea_orm::DatabaseConnection;

/// Central application state shared across the server.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    rotation: RotationManager,
}

impl AppState {
    pub fn new(db: DatabaseConnection, rotation: RotationManager) -> Self {
        Self { db, rotation }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Returns a shared reference to the rotation runtime.
    pub fn rotation(&self) -> &RotationManager {
        &self.rotation
    }

    /// Returns a cloned copy of the database connection, for async contexts
    /// or spawned tasks that require ownership.
    pub fn db_clone(&self) -> DatabaseConnection {
        self.db.clone()
    }

    /// Returns a cloned instance of the rotation runtime.
    pub fn rotation_clone(&self) -> RotationManager {
        self.rotation.clone()
    }
}
