//! Core types and shared functionality for the Kumi compile service.
//!
//! This crate provides:
//! - Content-addressed compile cache and artifact lookup
//! - Ephemeral and public bundle sharing
//! - Volatile (SQLite or in-memory) and durable (SQLite) stores
//! - Unified error types
//! - Configuration structures

pub mod artifacts;
pub mod codec;
pub mod compile;
pub mod compiler;
pub mod config;
pub mod digest;
pub mod error;
pub mod share;
pub mod store;

pub use artifacts::{Artifact, ArtifactServer};
pub use codec::Codec;
pub use compile::{CompileCache, CompiledArtifact};
pub use compiler::{CommandCompiler, CompileFailure, CompileOutput, Compiler, Diagnostic};
pub use config::{AppConfig, ConfigError, VolatileBackend};
pub use digest::KeyScheme;
pub use error::Error;
pub use share::{ShareHandle, ShareKind, ShareManager};
pub use store::{Database, DurableStore, MemoryStore, PublicShare, VolatileStore};
