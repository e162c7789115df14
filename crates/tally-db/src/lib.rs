//! # tally-db: Database Layer for Tally POS
//!
//! This crate provides database access for the Tally POS checkout
//! pipeline. It uses SQLite for local storage with sqlx for async
//! operations, and owns the one thing `tally-core` cannot: the atomic
//! sale commit and its inventory ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tally POS Data Flow                               │
//! │                                                                         │
//! │  External caller (CartPayload)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ catalog/sale/ │    │  (embedded)  │  │   │
//! │  │   │               │    │    ledger     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│               │    │ 001_init.sql │  │   │
//! │  │   │ WAL mode      │    │ SaleCoordina- │    │              │  │   │
//! │  │   │ Migrations    │    │ tor (commit)  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and commit error types
//! - [`repository`] - Repositories (catalog, ledger, sale)
//! - [`checkout`] - The sale coordinator: validate + atomic commit
//!
//! ## Usage
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//!
//! let receipt = db.checkout().checkout(&cart_payload, "cashier-1").await?;
//! println!("sale {} total {}", receipt.sale_id, receipt.total);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{CatalogError, CheckoutError, CommitError, DbError, LedgerError};
pub use pool::{Database, DbConfig};

pub use checkout::{CheckoutReceipt, CommitRequest, SaleCoordinator};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::sale::SaleRepository;
