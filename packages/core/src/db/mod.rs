//! Database Layer
//!
//! This module handles all database interactions using libsql:
//!
//! - Database initialization and connection management
//! - One nested-set table per hierarchy kind
//! - Transaction statements and the SQL primitives of the engine
//! - Pure interval arithmetic shared by the mutation algorithms
//! - Events published after committed mutations

mod database;
mod error;
pub mod events;
pub mod intervals;

pub use database::{DatabaseService, DbInsertNodeParams, DbNumbering};
pub use error::DatabaseError;
pub use events::HierarchyEvent;
pub use intervals::{MovePlan, Placement, Span};
