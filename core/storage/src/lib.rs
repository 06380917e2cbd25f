//! Persistence adapters for the gmvault credential record.
//!
//! The vault core only needs to load and save one record: the password
//! verifier, its salt and the KDF parameters. This crate defines that
//! record's storage format and a [`CredentialRepository`] trait with
//! in-memory, SQLite and JSON file implementations, plus a registry for
//! resolving a backend by name.
//!
//! # Design Principles
//! - Backends store opaque strings and integers; no crypto happens here
//! - A save replaces the whole record in one atomic write
//! - Backends are synchronous; callers serialize writers themselves

pub mod file;
pub mod memory;
pub mod record;
pub mod registry;
pub mod repository;
pub mod sqlite;

pub use file::FileRepository;
pub use memory::MemoryRepository;
pub use record::CredentialRecord;
pub use registry::{create_default_registry, RepositoryFactory, RepositoryRegistry};
pub use repository::CredentialRepository;
pub use sqlite::SqliteRepository;
