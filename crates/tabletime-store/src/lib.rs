//! # tabletime-store: Remote Record Store
//!
//! Everything Tabletime knows about tables, sessions, products and expenses
//! comes from one authoritative store behind a request/response API. This
//! crate defines that contract and its two implementations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   tabletime-engine  ──────►  dyn RemoteStore                            │
//! │                                  │                                      │
//! │                    ┌─────────────┴──────────────┐                       │
//! │                    ▼                            ▼                       │
//! │              MemoryStore                   HttpStore ──► REST API       │
//! │          (reference rules, tests,        (bearer token from             │
//! │           demo data)                      Credentials)                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`store`] - The `RemoteStore` trait and its request types
//! - [`memory`] - In-process store enforcing the authoritative rules
//! - [`http`] - REST adapter and wire DTOs
//! - [`auth`] - Explicit credential context (token + role)
//! - [`demo`] - Seed data for the in-process store
//! - [`error`] - Store error taxonomy

pub mod auth;
pub mod demo;
pub mod error;
pub mod http;
pub mod memory;
pub mod store;

pub use auth::{CredentialContext, Credentials, Role};
pub use error::{StoreError, StoreResult};
pub use http::{HttpStore, HttpStoreConfig};
pub use memory::MemoryStore;
pub use store::{PastSessionQuery, RemoteStore, UpsertLine};
