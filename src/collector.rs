//! # Temporal input collection
//!
//! Given a descriptor and a time window, [`InputCollector`] selects the files a
//! processing engine needs:
//!
//! - **pointing sets** ([`InputCollector::pointing_inputs`]): one catalog query per
//!   logical tag of the instrument, keeping the highest version of every start date;
//!   survival-corrected maps also take the matching survival probability products;
//! - **ancillary files** ([`InputCollector::ancillary_inputs`]): per logical tag, the
//!   latest file starting on or before the end of the window;
//! - **geometry kernels** ([`InputCollector::kernel_windows`]): every kernel whose
//!   validity overlaps the window, category by category.
//!
//! Every operation returns bare file names, in the order the catalog listed them.
//! Catalog failures are propagated unchanged.
use hifitime::Epoch;
use tracing::debug;

use crate::{
    catalog::{
        base_name, Catalog, CatalogDate, CatalogFileRecord, CatalogQuery, KernelCategory,
        KernelService,
    },
    constants::{POINTING_SET_LEVEL, SURVIVAL_INSTRUMENT, SURVIVAL_LEVEL},
    descriptor::{FrameDescriptor, Instrument, MapDescriptor, SurvivalCorrection},
    mapper_errors::MapperError,
    time::TimeWindow,
};

pub struct InputCollector<'a> {
    catalog: &'a dyn Catalog,
    kernel_service: &'a dyn KernelService,
}

/// Logical tags of the pointing sets used by `descriptor`.
fn pointing_set_tags(descriptor: &MapDescriptor) -> Vec<String> {
    let sensor = descriptor.sensor();
    let per_sensor = |product: &str| {
        let mut tags = Vec::new();
        if sensor.includes_45() {
            tags.push(format!("45sensor-{product}"));
        }
        if sensor.includes_90() {
            tags.push(format!("90sensor-{product}"));
        }
        tags
    };

    match descriptor.instrument() {
        Instrument::Hi => per_sensor("pset"),
        Instrument::Lo => vec!["pset".to_string()],
        Instrument::Ultra => match descriptor.frame_descriptor() {
            FrameDescriptor::Spacecraft => per_sensor("spacecraftpset"),
            _ => per_sensor("heliopset"),
        },
        Instrument::Glows | Instrument::Idex => Vec::new(),
    }
}

/// Keep the highest version of each start date, dates in first-seen order.
fn highest_version_per_date(files: Vec<CatalogFileRecord>) -> Vec<CatalogFileRecord> {
    let mut kept: Vec<CatalogFileRecord> = Vec::with_capacity(files.len());
    for file in files {
        match kept.iter_mut().find(|k| k.start_date == file.start_date) {
            Some(existing) if file.version > existing.version => *existing = file,
            Some(_) => {}
            None => kept.push(file),
        }
    }
    kept
}

impl<'a> InputCollector<'a> {
    pub fn new(catalog: &'a dyn Catalog, kernel_service: &'a dyn KernelService) -> Self {
        InputCollector {
            catalog,
            kernel_service,
        }
    }

    fn query_latest(
        &self,
        instrument: &str,
        data_level: &str,
        tag: String,
        start_date: CatalogDate,
        end_date: CatalogDate,
    ) -> Result<Vec<CatalogFileRecord>, MapperError> {
        let query = CatalogQuery {
            instrument: instrument.to_string(),
            data_level: data_level.to_string(),
            descriptor: tag,
            start_date,
            end_date,
        };
        let files = self.catalog.query(&query)?;
        debug!(descriptor = %query.descriptor, found = files.len(), "catalog query");
        Ok(highest_version_per_date(files))
    }

    /// Pointing sets (and survival products for `sp` maps) covering `window`.
    ///
    /// Return
    /// ----------
    /// * The file names, possibly empty, or [`MapperError::NoPointingTags`] when the
    ///   instrument has no pointing set product.
    pub fn pointing_inputs(
        &self,
        descriptor: &MapDescriptor,
        window: &TimeWindow,
    ) -> Result<Vec<String>, MapperError> {
        let tags = pointing_set_tags(descriptor);
        if tags.is_empty() {
            return Err(MapperError::NoPointingTags(descriptor.to_string()));
        }

        let instrument = descriptor.instrument().name();
        let start_date = CatalogDate::from_epoch(&window.start)?;
        let end_date = CatalogDate::from_epoch(&window.end)?;

        let mut files = Vec::new();
        for tag in tags {
            files.extend(self.query_latest(
                instrument,
                POINTING_SET_LEVEL,
                tag,
                start_date,
                end_date,
            )?);
        }

        if descriptor.survival_corrected() == SurvivalCorrection::Sp {
            if let Some(scope) = descriptor.instrument().survival_tag() {
                files.extend(self.query_latest(
                    SURVIVAL_INSTRUMENT,
                    SURVIVAL_LEVEL,
                    format!("survival-probability-{scope}"),
                    start_date,
                    end_date,
                )?);
            }
        }

        files.iter().map(CatalogFileRecord::file_name).collect()
    }

    /// Calibration files in effect at `end_date`, one per logical tag.
    pub fn ancillary_inputs(
        &self,
        descriptor: &MapDescriptor,
        end_date: &Epoch,
    ) -> Result<Vec<String>, MapperError> {
        let cutoff = CatalogDate::from_epoch(end_date)?;
        let sensor = descriptor.sensor();
        let keep = |record: &CatalogFileRecord| match descriptor.instrument() {
            Instrument::Hi => {
                (sensor.includes_45() && record.descriptor.starts_with("45"))
                    || (sensor.includes_90() && record.descriptor.starts_with("90"))
            }
            _ => true,
        };

        let mut groups: Vec<(String, Vec<CatalogFileRecord>)> = Vec::new();
        for record in self
            .catalog
            .query_ancillary(descriptor.instrument().name())?
            .into_iter()
            .filter(keep)
        {
            match groups.iter_mut().find(|(tag, _)| *tag == record.descriptor) {
                Some((_, members)) => members.push(record),
                None => groups.push((record.descriptor.clone(), vec![record])),
            }
        }

        groups
            .iter()
            .filter_map(|(_, members)| {
                members
                    .iter()
                    .filter(|r| r.start_date <= cutoff)
                    .max_by_key(|r| (r.start_date, r.version))
            })
            .map(CatalogFileRecord::file_name)
            .collect()
    }

    /// Kernels whose validity overlaps `[start, end]`, grouped by category.
    pub fn kernel_windows(&self, start: &Epoch, end: &Epoch) -> Result<Vec<String>, MapperError> {
        let mut file_names = Vec::new();
        for category in KernelCategory::ALL {
            for kernel in self.kernel_service.kernel_metadata(category)? {
                if kernel.min_epoch()? <= *end && *start < kernel.max_epoch()? {
                    file_names.push(base_name(&kernel.file_name)?);
                }
            }
        }
        Ok(file_names)
    }
}
