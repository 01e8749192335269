//! # Processing engine interface
//!
//! The science algorithms that turn inputs into a map are external. The mapper
//! only knows how to **invoke** them and how many artifacts to expect back.
//!
//! An engine goes through three phases, followed by an unconditional release:
//!
//! ```text
//! prepare_inputs() ─► compute(&inputs) ─► finalize(products, &inputs) ─► [artifacts]
//!        └──────────────────┴─────────────────────┴──► release_resources()
//! ```
//!
//! [`run_engine`] drives the phases and guarantees the release, whatever the phase
//! that failed. The resolved inputs and intermediate products are opaque to the
//! mapper and only travel between the phases of one engine.
//!
//! ## See also
//! * [`command::CommandEngineFactory`] – Engines backed by an external executable.
//! * [`crate::assembly::MapAssembler`] – Builds the [`EngineInvocation`] and enforces
//!   the single-artifact contract.
pub mod command;

use std::any::Any;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::{
    descriptor::{dependencies::DataLevel, Instrument},
    mapper_errors::EngineError,
    time::{compact_date, TimeWindow},
};

/// Output of [`ProcessingEngine::prepare_inputs`], owned by the engine implementation.
pub type ResolvedInputs = Box<dyn Any + Send>;

/// Output of [`ProcessingEngine::compute`], owned by the engine implementation.
pub type ComputeProducts = Box<dyn Any + Send>;

/// Files handed to an engine, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputManifest {
    /// Pointing sets and survival probability products
    pub science: Vec<String>,
    pub ancillary: Vec<String>,
    /// Kernel file names selected for the window
    pub spice: Vec<String>,
    /// Artifacts of dependency maps (Tier-3 only)
    pub maps: Vec<Utf8PathBuf>,
}

/// Everything an engine needs to produce one map.
#[derive(Debug, Clone)]
pub struct EngineInvocation {
    pub instrument: Instrument,
    pub data_level: DataLevel,
    /// Descriptor in its engine projection (no quantity suffix)
    pub descriptor: String,
    pub window: TimeWindow,
    pub inputs: InputManifest,
    /// Directory the engine must write its artifacts into
    pub work_dir: Utf8PathBuf,
    /// Kernel pool content at invocation time, in load order
    pub kernels: Vec<Utf8PathBuf>,
}

impl EngineInvocation {
    /// Start of the window as `YYYYMMDD`.
    pub fn start_date(&self) -> String {
        compact_date(&self.window.start)
    }
}

pub trait ProcessingEngine {
    fn prepare_inputs(&mut self) -> Result<ResolvedInputs, EngineError>;

    fn compute(&mut self, inputs: &ResolvedInputs) -> Result<ComputeProducts, EngineError>;

    /// Write the artifacts and return their paths.
    fn finalize(
        &mut self,
        products: ComputeProducts,
        inputs: &ResolvedInputs,
    ) -> Result<Vec<Utf8PathBuf>, EngineError>;

    fn release_resources(&mut self);
}

pub trait EngineFactory {
    /// Engine for the instrument and level of `invocation`.
    fn create(&self, invocation: &EngineInvocation)
        -> Result<Box<dyn ProcessingEngine>, EngineError>;
}

fn run_phases(engine: &mut dyn ProcessingEngine) -> Result<Vec<Utf8PathBuf>, EngineError> {
    let inputs = engine.prepare_inputs()?;
    let products = engine.compute(&inputs)?;
    engine.finalize(products, &inputs)
}

/// Run the three phases of `engine`, then release it.
///
/// Return
/// ----------
/// * The artifacts returned by `finalize`, or the error of the first failing phase.
///   [`ProcessingEngine::release_resources`] runs in both cases.
pub fn run_engine(engine: &mut dyn ProcessingEngine) -> Result<Vec<Utf8PathBuf>, EngineError> {
    let outcome = run_phases(engine);
    engine.release_resources();
    outcome
}
