//! # Remote data catalog interfaces
//!
//! The mission archive exposes three kinds of metadata that the mapper needs:
//!
//! - **science files** (pointing sets, survival probabilities), queried by
//!   instrument, data level, logical descriptor and date range ([`Catalog::query`]);
//! - **ancillary files** (calibrations), listed per instrument
//!   ([`Catalog::query_ancillary`]);
//! - **geometry kernels**, listed per [`KernelCategory`] with their validity range
//!   ([`KernelService::kernel_metadata`]) and fetched by name
//!   ([`KernelService::download`]).
//!
//! Records are read-only views of the catalog responses. Failures of the
//! underlying service are returned as they come, without retries.
//!
//! ## See also
//! * [`imap_api::ImapApi`] – HTTP implementation of both traits.
//! * [`crate::collector`] – Selection rules applied on top of these records.
pub mod imap_api;

use std::{fmt, str::FromStr};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use hifitime::Epoch;
use serde::Deserialize;

use crate::{
    constants::CATALOG_DATE_FORMAT,
    mapper_errors::MapperError,
    time::{compact_date, epoch_from_naive},
};

/// File version, `vNNN` in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Version(pub u32);

impl FromStr for Version {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('v')
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
            .map(Version)
            .ok_or_else(|| MapperError::configuration("version", s))
    }
}

impl TryFrom<String> for Version {
    type Error = MapperError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{:03}", self.0)
    }
}

/// Calendar day, `YYYYMMDD` in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct CatalogDate(NaiveDate);

impl CatalogDate {
    /// UTC day containing `epoch`.
    pub fn from_epoch(epoch: &Epoch) -> Result<Self, MapperError> {
        compact_date(epoch).parse()
    }
}

impl FromStr for CatalogDate {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, CATALOG_DATE_FORMAT)
            .map(CatalogDate)
            .map_err(|e| MapperError::InvalidDate(format!("{s}: {e}")))
    }
}

impl TryFrom<String> for CatalogDate {
    type Error = MapperError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CatalogDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CATALOG_DATE_FORMAT))
    }
}

/// One science or ancillary file listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogFileRecord {
    pub file_path: Utf8PathBuf,
    /// Logical tag, e.g. `90sensor-pset`
    pub descriptor: String,
    pub start_date: CatalogDate,
    pub version: Version,
}

impl CatalogFileRecord {
    /// Bare file name of the record.
    pub fn file_name(&self) -> Result<String, MapperError> {
        base_name(&self.file_path)
    }
}

pub(crate) fn base_name(path: &Utf8Path) -> Result<String, MapperError> {
    path.file_name()
        .map(str::to_string)
        .ok_or_else(|| MapperError::Utf8PathError(format!("no file name in {path}")))
}

/// Date format of kernel validity bounds.
const KERNEL_DATE_FORMAT: &str = "%Y-%m-%d, %H:%M:%S";

/// One geometry kernel listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KernelRecord {
    pub file_name: Utf8PathBuf,
    /// `YYYY-MM-DD, HH:MM:SS`, UTC
    pub min_date_datetime: String,
    /// `YYYY-MM-DD, HH:MM:SS`, UTC
    pub max_date_datetime: String,
}

impl KernelRecord {
    /// Start of validity.
    pub fn min_epoch(&self) -> Result<Epoch, MapperError> {
        parse_kernel_date(&self.min_date_datetime)
    }

    /// End of validity.
    pub fn max_epoch(&self) -> Result<Epoch, MapperError> {
        parse_kernel_date(&self.max_date_datetime)
    }
}

fn parse_kernel_date(s: &str) -> Result<Epoch, MapperError> {
    chrono::NaiveDateTime::parse_from_str(s, KERNEL_DATE_FORMAT)
        .map(|naive| epoch_from_naive(&naive))
        .map_err(|e| MapperError::InvalidDate(format!("{s}: {e}")))
}

/// Kernel categories, in the order they are collected and loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelCategory {
    Leapseconds,
    SpacecraftClock,
    PointingAttitude,
    ImapFrames,
    ScienceFrames,
}

impl KernelCategory {
    pub const ALL: [KernelCategory; 5] = [
        KernelCategory::Leapseconds,
        KernelCategory::SpacecraftClock,
        KernelCategory::PointingAttitude,
        KernelCategory::ImapFrames,
        KernelCategory::ScienceFrames,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KernelCategory::Leapseconds => "leapseconds",
            KernelCategory::SpacecraftClock => "spacecraft_clock",
            KernelCategory::PointingAttitude => "pointing_attitude",
            KernelCategory::ImapFrames => "imap_frames",
            KernelCategory::ScienceFrames => "science_frames",
        }
    }
}

/// Filter of a science file query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub instrument: String,
    pub data_level: String,
    pub descriptor: String,
    pub start_date: CatalogDate,
    pub end_date: CatalogDate,
}

/// Science and ancillary file metadata.
pub trait Catalog {
    fn query(&self, query: &CatalogQuery) -> Result<Vec<CatalogFileRecord>, MapperError>;

    /// Every ancillary file of `instrument`, in catalog order.
    fn query_ancillary(&self, instrument: &str) -> Result<Vec<CatalogFileRecord>, MapperError>;
}

/// Geometry kernel metadata and retrieval.
pub trait KernelService {
    fn kernel_metadata(&self, category: KernelCategory) -> Result<Vec<KernelRecord>, MapperError>;

    /// Make `file_name` available locally and return its path.
    fn download(&self, file_name: &str) -> Result<Utf8PathBuf, MapperError>;
}
