//! Engines backed by an external executable.
//!
//! The executable is called once per map, from the redirected working directory,
//! with the processing command line of the mission pipeline:
//!
//! ```text
//! <program> [extra args] --instrument hi --data-level l2 \
//!     --descriptor h90-ena-h-sf-nsp-ram-hae-4deg-6mo --start-date 20250101 \
//!     --version v000 --dependency '{"science":[..],"ancillary":[..],"spice":[..],"maps":[..],"kernels":[..]}'
//! ```
//!
//! Artifacts are the science files that appeared in the working directory (or one
//! of its sub-directories) while the command ran.
use std::{collections::BTreeSet, io, process::Command};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info};

use super::{
    ComputeProducts, EngineFactory, EngineInvocation, InputManifest, ProcessingEngine,
    ResolvedInputs,
};
use crate::{
    constants::{OUTPUT_VERSION, SCIENCE_FILE_EXTENSION},
    mapper_errors::EngineError,
};

#[derive(Debug, Clone)]
pub struct CommandEngineFactory {
    program: Utf8PathBuf,
    extra_args: Vec<String>,
}

impl CommandEngineFactory {
    pub fn new(program: impl Into<Utf8PathBuf>, extra_args: Vec<String>) -> Self {
        CommandEngineFactory {
            program: program.into(),
            extra_args,
        }
    }
}

impl EngineFactory for CommandEngineFactory {
    fn create(
        &self,
        invocation: &EngineInvocation,
    ) -> Result<Box<dyn ProcessingEngine>, EngineError> {
        Ok(Box::new(CommandEngine {
            program: self.program.clone(),
            extra_args: self.extra_args.clone(),
            invocation: invocation.clone(),
        }))
    }
}

#[derive(Serialize)]
struct DependencyManifest<'a> {
    #[serde(flatten)]
    inputs: &'a InputManifest,
    kernels: &'a [Utf8PathBuf],
}

struct PreparedCommand {
    args: Vec<String>,
    existing: BTreeSet<Utf8PathBuf>,
}

struct CommandEngine {
    program: Utf8PathBuf,
    extra_args: Vec<String>,
    invocation: EngineInvocation,
}

/// Science files under `dir`, recursively.
fn science_files(dir: &Utf8Path) -> io::Result<BTreeSet<Utf8PathBuf>> {
    let mut found = BTreeSet::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in current.read_dir_utf8()? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path.to_path_buf());
            } else if path.extension() == Some(SCIENCE_FILE_EXTENSION) {
                found.insert(path.to_path_buf());
            }
        }
    }
    Ok(found)
}

impl CommandEngine {
    fn arguments(&self) -> Result<Vec<String>, EngineError> {
        let invocation = &self.invocation;
        let level = invocation
            .data_level
            .token()
            .ok_or("no data level for this descriptor")?;
        let dependency = serde_json::to_string(&DependencyManifest {
            inputs: &invocation.inputs,
            kernels: &invocation.kernels,
        })?;

        let start_date = invocation.start_date();

        let mut args = self.extra_args.clone();
        args.extend(
            [
                "--instrument",
                invocation.instrument.name(),
                "--data-level",
                level,
                "--descriptor",
                invocation.descriptor.as_str(),
                "--start-date",
                start_date.as_str(),
                "--version",
                OUTPUT_VERSION,
                "--dependency",
                dependency.as_str(),
            ]
            .map(String::from),
        );
        Ok(args)
    }
}

impl ProcessingEngine for CommandEngine {
    fn prepare_inputs(&mut self) -> Result<ResolvedInputs, EngineError> {
        let prepared = PreparedCommand {
            args: self.arguments()?,
            existing: science_files(&self.invocation.work_dir)?,
        };
        Ok(Box::new(prepared))
    }

    fn compute(&mut self, inputs: &ResolvedInputs) -> Result<ComputeProducts, EngineError> {
        let prepared = inputs
            .downcast_ref::<PreparedCommand>()
            .ok_or("inputs were not prepared by this engine")?;

        info!(
            program = %self.program,
            descriptor = %self.invocation.descriptor,
            "running processing command"
        );
        let output = Command::new(&self.program)
            .args(&prepared.args)
            .current_dir(&self.invocation.work_dir)
            .output()?;
        debug!(stdout = %String::from_utf8_lossy(&output.stdout), "processing command output");

        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )
            .into());
        }
        Ok(Box::new(()))
    }

    fn finalize(
        &mut self,
        _products: ComputeProducts,
        inputs: &ResolvedInputs,
    ) -> Result<Vec<Utf8PathBuf>, EngineError> {
        let prepared = inputs
            .downcast_ref::<PreparedCommand>()
            .ok_or("inputs were not prepared by this engine")?;
        let produced = science_files(&self.invocation.work_dir)?;
        Ok(produced.difference(&prepared.existing).cloned().collect())
    }

    fn release_resources(&mut self) {
        debug!(descriptor = %self.invocation.descriptor, "processing command released");
    }
}
