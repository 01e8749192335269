//! # Output consolidation
//!
//! A [`MapRequest`] names one descriptor and a list of windows. [`Consolidator::run`]
//! turns it into a single versioned science file:
//!
//! ```text
//! Pending ─► Skipped                                    (output already exists)
//! Pending ─► Generating(1..N) ─► Merging ─► Cleaning ─► Done
//! Pending ─► Generating(k) ─► Failed ─► Cleaning ─► Reported
//! ```
//!
//! 1. The output name is fixed by the descriptor and the first window start:
//!    `imap_<instrument>_<l2|l3>_<descriptor>_<YYYYMMDD>_v000.cdf`. If that file
//!    exists the run is skipped without generating anything.
//! 2. Each window is generated in order by the [`MapAssembler`].
//! 3. Artifacts are sorted by their first `epoch` value.
//! 4. The earliest artifact is the base; the epochs and epoch-indexed variables of
//!    the others are appended to it, then the provenance attributes are rewritten.
//!    The result goes through a temporary sibling renamed at the end.
//! 5. Intermediate scratch directories are removed through the
//!    [`IntermediateCleaner`], whatever happened in steps 2 to 4. A failed run
//!    leaves nothing at the output path.
//!
//! Failures never escape [`Consolidator::run`]: they are logged with their causes
//! and returned as [`RunOutcome::Failed`].
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use hifitime::Epoch;
use tracing::{debug, error, info};

use crate::{
    assembly::{artifact_name, MapAssembler},
    constants::{
        DATA_TYPE_ATTR, DATA_TYPE_SEPARATOR, LOGICAL_FILE_ID_ATTR, LOGICAL_SOURCE_ATTR,
        MISSION_PREFIX, OUTPUT_VERSION, SCIENCE_FILE_EXTENSION, TOOL_CONFIGURATION_ATTR,
    },
    container::{Dataset, ScienceContainer},
    descriptor::{dependencies::tier_of, MapDescriptor},
    mapper_errors::MapperError,
    progress_bar::{fmt_dur, WindowProgress},
    resources::{GenerationResources, IntermediateCleaner},
    time::{compact_date, TimeWindow},
};

/// One consolidated map to produce.
#[derive(Debug, Clone)]
pub struct MapRequest {
    pub descriptor: MapDescriptor,
    /// Ascending, non-empty
    pub windows: Vec<TimeWindow>,
    /// Request text, stored verbatim in the output
    pub raw_config: String,
    pub output_directory: Utf8PathBuf,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The output already existed
    Skipped(Utf8PathBuf),
    Done(Utf8PathBuf),
    Failed(MapperError),
}

/// File name of the consolidated output of `descriptor` starting at `first_start`.
pub fn output_file_name(
    descriptor: &MapDescriptor,
    first_start: &Epoch,
) -> Result<String, MapperError> {
    let level = tier_of(descriptor).token().ok_or_else(|| {
        MapperError::UnsupportedInstrument(descriptor.instrument_descriptor().to_string())
    })?;
    Ok(format!(
        "{MISSION_PREFIX}_{}_{level}_{descriptor}_{}_{OUTPUT_VERSION}.{SCIENCE_FILE_EXTENSION}",
        descriptor.instrument().name(),
        compact_date(first_start),
    ))
}

impl MapRequest {
    /// Path of the consolidated output.
    pub fn output_path(&self) -> Result<Utf8PathBuf, MapperError> {
        let first = self
            .windows
            .first()
            .ok_or_else(|| MapperError::configuration("time_ranges", "[]"))?;
        Ok(self
            .output_directory
            .join(output_file_name(&self.descriptor, &first.start)?))
    }
}

/// Replace the descriptor part of a `Data_type` value, keeping its description.
fn rewrite_data_type(current: Option<&String>, level: &str, descriptor: &MapDescriptor) -> String {
    let current = current.map(String::as_str).unwrap_or_default();
    let description = current
        .split_once(DATA_TYPE_SEPARATOR)
        .map_or(current, |(_, description)| description);
    format!(
        "{}_{descriptor}{DATA_TYPE_SEPARATOR}{description}",
        level.to_uppercase()
    )
}

/// Log entry of a failed run.
fn failure_message(
    descriptor: &MapDescriptor,
    window: Option<&TimeWindow>,
    err: &MapperError,
) -> String {
    let stage = match window {
        Some(window) => format!("window {window}"),
        None => "consolidation".to_string(),
    };
    format!(
        "Failed to generate map: {descriptor} ({stage}) with error\n{}",
        err.report()
    )
}

pub struct Consolidator<'a> {
    assembler: &'a MapAssembler<'a>,
    container: &'a dyn ScienceContainer,
    cleaner: &'a dyn IntermediateCleaner,
}

impl<'a> Consolidator<'a> {
    pub fn new(
        assembler: &'a MapAssembler<'a>,
        container: &'a dyn ScienceContainer,
        cleaner: &'a dyn IntermediateCleaner,
    ) -> Self {
        Consolidator {
            assembler,
            container,
            cleaner,
        }
    }

    /// Produce the consolidated output of `request`.
    ///
    /// Arguments
    /// -----------------
    /// * `request`: descriptor, windows, raw request text and output directory
    /// * `resources`: kernel pool and working directory handed to the assembler
    ///
    /// Return
    /// ----------
    /// * [`RunOutcome::Skipped`] if the output exists, [`RunOutcome::Done`] with the
    ///   output path on success, [`RunOutcome::Failed`] otherwise. Cleanup has run in
    ///   the last two cases; a cleanup failure is logged and does not turn a written
    ///   output into a failure.
    pub fn run(&self, request: &MapRequest, resources: &mut GenerationResources) -> RunOutcome {
        let output_path = request.output_path();
        if let Ok(path) = &output_path {
            if path.exists() {
                info!("Output {path} already exists, skipping");
                return RunOutcome::Skipped(path.clone());
            }
        }

        let (result, failed_window) = match output_path {
            Ok(path) => match self.generate_and_merge(request, &path, resources) {
                Ok(()) => (Ok(path), None),
                Err((window, err)) => (Err(err), window),
            },
            Err(err) => (Err(err), None),
        };

        let instrument = request.descriptor.instrument();
        let cleanup = self.cleaner.cleanup(instrument);
        if let Err(cleanup_err) = &cleanup {
            error!("Cleanup of {} failed: {}", instrument.name(), cleanup_err.report());
        }

        match result {
            Ok(path) => {
                info!("Created file {path}");
                RunOutcome::Done(path)
            }
            Err(err) => {
                error!(
                    "{}",
                    failure_message(&request.descriptor, failed_window.as_ref(), &err)
                );
                RunOutcome::Failed(err)
            }
        }
    }

    /// Generate every window then merge.
    ///
    /// Errors carry the window being generated, `None` once merging started.
    fn generate_and_merge(
        &self,
        request: &MapRequest,
        output_path: &Utf8Path,
        resources: &mut GenerationResources,
    ) -> Result<(), (Option<TimeWindow>, MapperError)> {
        let total = request.windows.len();
        let mut progress = WindowProgress::new(total);
        let mut artifacts = Vec::with_capacity(total);

        for (i, window) in request.windows.iter().enumerate() {
            info!("Generating map {}/{total}", i + 1);
            let artifact = self
                .assembler
                .generate(&request.descriptor, window, resources)
                .map_err(|err| (Some(*window), err))?;
            artifacts.push(artifact);
            let (last, mean) = progress.window_done();
            debug!(window = %window, last = %fmt_dur(last), mean = %fmt_dur(mean), "window done");
        }
        progress.finish();

        let merged = self
            .merge(request, output_path, &artifacts)
            .map_err(|err| (None, err))?;
        self.write_atomically(output_path, &merged)
            .map_err(|err| (None, err))
    }

    fn merge(
        &self,
        request: &MapRequest,
        output_path: &Utf8Path,
        artifacts: &[Utf8PathBuf],
    ) -> Result<Dataset, MapperError> {
        let mut datasets = Vec::with_capacity(artifacts.len());
        for path in artifacts {
            let dataset = self.container.read(path)?;
            let first_epoch = dataset
                .first_epoch()
                .ok_or_else(|| MapperError::container(path, "no epoch values"))?;
            datasets.push((first_epoch, path, dataset));
        }
        datasets.sort_by_key(|(first_epoch, _, _)| *first_epoch);

        let mut datasets = datasets.into_iter();
        let (_, base_path, mut merged) = datasets
            .next()
            .ok_or_else(|| MapperError::configuration("time_ranges", "[]"))?;
        debug!("base map {}", artifact_name(base_path));
        for (_, path, dataset) in datasets {
            merged
                .append_epochs(&dataset)
                .map_err(|reason| MapperError::container(path, reason))?;
        }

        let descriptor = &request.descriptor;
        let level = tier_of(descriptor).token().unwrap_or_default();
        let data_type = rewrite_data_type(merged.attributes.get(DATA_TYPE_ATTR), level, descriptor);
        let stem = output_path.file_stem().unwrap_or_default().to_string();

        let attributes = &mut merged.attributes;
        attributes.insert(LOGICAL_SOURCE_ATTR.into(), descriptor.to_string());
        attributes.insert(LOGICAL_FILE_ID_ATTR.into(), stem);
        attributes.insert(TOOL_CONFIGURATION_ATTR.into(), request.raw_config.clone());
        attributes.insert(DATA_TYPE_ATTR.into(), data_type);
        Ok(merged)
    }

    fn write_atomically(&self, output_path: &Utf8Path, dataset: &Dataset) -> Result<(), MapperError> {
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = Utf8PathBuf::from(format!("{output_path}.partial"));
        let written = self
            .container
            .write(&partial, dataset)
            .and_then(|()| fs::rename(&partial, output_path).map_err(MapperError::from));
        if written.is_err() && partial.exists() {
            let _ = fs::remove_file(&partial);
        }
        written
    }
}
