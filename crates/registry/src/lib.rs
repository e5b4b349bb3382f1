//! Tile registry and reconciliation engine.
//!
//! # Role
//!
//! Turns the per-principal tile spec list into a live, ordered set of tile
//! components and keeps that set in sync as the list changes:
//!
//! * [`TileTable`]: closed dispatch table from [`TileSpec`] to constructor,
//!   gated by [`CapabilityProbe`] requirements.
//! * [`Registry`]: reconciles desired specs against live instances and
//!   publishes an immutable [`TileSnapshot`].
//! * [`SettingsStore`]: in-memory [`SpecSource`] and [`ChangeSource`].
//! * [`TileHost`]: registry plus a serialized worker actor plus the settings
//!   observer.
//!
//! # Invariants
//!
//! - Unchanged specs keep the same instance across reconciliations.
//! - Readers never observe a destroyed instance through a published snapshot.
//! - The change callback fires only when the ordered spec sequence changes.
//!
//! [`TileSpec`]: tilehost_spec::TileSpec

mod capability;
mod component;
mod config;
mod error;
mod factory;
mod host;
mod principal;
mod registry;
mod settings;
mod source;
mod tiles;

#[cfg(test)]
mod testing;

pub use capability::{CapabilityProbe, MultiSessionMode, NetworkKind, StaticCapabilities};
pub use component::Component;
pub use config::{CapabilityConfig, ConfigError, HostConfig, TileLists, WorkerConfig, load_config, load_config_str};
pub use error::{ComponentError, FactoryError, RegistryError};
pub use factory::{ComponentFactory, Constructor, Matcher, Requirement, TileEntry, TileTable};
pub use host::{HostError, HostEvent, HostParts, TileHost};
pub use principal::PrincipalId;
pub use registry::{ChangeCallback, ReconcileReport, Registry, RegistryPhase, TileSnapshot};
pub use settings::SettingsStore;
pub use source::{ChangeListener, ChangeSource, Registration, SpecLoader, SpecSource};
pub use tiles::{BuiltinTile, IntentTile};
