//! Core procedural woody-plant growth and pipe-model library.
//!
//! Main components:
//! - [`skeleton`] — generic node/flow topology store with handle pools.
//! - [`bud`] — bud types and per-bud growth state.
//! - [`params`] — growth policy objects and YAML persistence.
//! - [`growth`] — the per-step shoot and root growth engine.
//! - [`environment`] — soil/light input seams.
//! - [`plant`] — plant instances and data-parallel batch growth.
//! - [`physics_2d`] — the 2-D particle packing solver.
//! - [`pipes`] — pipe, segment, profile and cell pools.
//! - [`pipe_model`] — vascular strand reconstruction over a grown skeleton.
//! - [`types`] — shared handle aliases.

pub mod bud;
pub mod environment;
pub mod error;
pub mod growth;
pub mod params;
pub mod physics_2d;
pub mod pipe_model;
pub mod pipes;
pub mod plant;
pub mod skeleton;
pub mod types;
