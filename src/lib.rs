//! # mapper
//!
//! Production of consolidated ENA sky maps from a declarative request.
//!
//! ## Overview
//!
//! ```text
//! Configuration ─► MapRequest ─► Consolidator::run
//!                                   │
//!                                   ├─ for each window: MapAssembler::generate
//!                                   │      ├─ dependencies_of / tier_of   (descriptor::dependencies)
//!                                   │      ├─ InputCollector              (catalog queries)
//!                                   │      └─ ProcessingEngine            (external science code)
//!                                   ├─ merge along epoch              (container)
//!                                   └─ IntermediateCleaner            (resources)
//! ```
//!
//! The science algorithms, the catalog service and the kernel subsystem stay
//! outside the crate, behind the traits of [`engine`], [`catalog`] and
//! [`resources`].
pub mod assembly;
pub mod catalog;
pub mod collector;
pub mod configuration;
pub mod consolidator;
pub mod constants;
pub mod container;
pub mod descriptor;
pub mod engine;
pub mod env_state;
pub mod mapper_errors;
pub mod progress_bar;
pub mod resources;
pub mod time;
