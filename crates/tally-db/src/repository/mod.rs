//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Checkout pipeline / admin surface                                     │
//! │       │                                                                 │
//! │       │  db.catalog().snapshot(&ids)                                   │
//! │       │  db.ledger().apply(id, -2, EntryType::Sale, ...)               │
//! │       ▼                                                                 │
//! │  Repository (SQL isolated here)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  The coordinator (crate::checkout) reuses the repositories' `*_in`     │
//! │  variants so every SQL statement still lives in exactly one place,     │
//! │  while the transaction boundary stays with the coordinator.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Product catalog reads and admin writes
//! - [`ledger::LedgerRepository`] - Append-only stock ledger with the
//!   guarded delta primitive
//! - [`sale::SaleRepository`] - Sale and sale line queries

pub mod catalog;
pub mod ledger;
pub mod sale;
