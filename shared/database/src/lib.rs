//! ProDetect Database Library
//!
//! Connection management and the entity models backing the AML core. All
//! query construction lives in the service-side repositories; this crate only
//! owns the schema surface and the pool.

pub mod connection;
pub mod entities;

pub use connection::*;

// Re-export commonly used ORM types so service crates share one import path
pub use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
pub use uuid::Uuid;
