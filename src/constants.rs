//! # Constants and type definitions for the mapper
//!
//! This module centralizes the **naming conventions**, **catalog tags**, and **time
//! constants** shared by the descriptor codec, the input collector and the consolidator.
//!
//! ## Overview
//!
//! - File naming (prefix, version, extension) of consolidated outputs
//! - Catalog data levels and logical descriptor tags
//! - Science container attribute and variable names
//! - Fixed-length year used to lay out canonical map periods
//!
//! Changing any value here changes output filenames or catalog queries, so they are
//! treated as part of the external contract of the crate.

// -------------------------------------------------------------------------------------------------
// Output naming
// -------------------------------------------------------------------------------------------------

/// Prefix of every file produced or consumed by the mission pipeline
pub const MISSION_PREFIX: &str = "imap";

/// Version stamped on consolidated outputs
pub const OUTPUT_VERSION: &str = "v000";

/// Extension of science container files
pub const SCIENCE_FILE_EXTENSION: &str = "cdf";

// -------------------------------------------------------------------------------------------------
// Catalog
// -------------------------------------------------------------------------------------------------

/// Data level of pointing sets (Tier-2 inputs)
pub const POINTING_SET_LEVEL: &str = "l1c";

/// Instrument publishing survival probability products
pub const SURVIVAL_INSTRUMENT: &str = "glows";

/// Data level of survival probability products
pub const SURVIVAL_LEVEL: &str = "l3e";

/// Table name of the ancillary (calibration) catalog
pub const ANCILLARY_TABLE: &str = "ancillary";

/// Date format used by the catalog for `start_date` / `end_date`
pub const CATALOG_DATE_FORMAT: &str = "%Y%m%d";

// -------------------------------------------------------------------------------------------------
// Science container names
// -------------------------------------------------------------------------------------------------

/// Timestamp axis of every map file
pub const EPOCH_VARIABLE: &str = "epoch";

/// Variable attribute naming the axis governing the leading dimension
pub const DEPEND_0: &str = "DEPEND_0";

pub const LOGICAL_SOURCE_ATTR: &str = "Logical_source";
pub const LOGICAL_FILE_ID_ATTR: &str = "Logical_file_id";
pub const TOOL_CONFIGURATION_ATTR: &str = "Mapper_tool_configuration";
pub const DATA_TYPE_ATTR: &str = "Data_type";

/// Separator between the descriptor and the description in `Data_type`
pub const DATA_TYPE_SEPARATOR: char = '>';

// -------------------------------------------------------------------------------------------------
// Time
// -------------------------------------------------------------------------------------------------

/// Length of the averaged year in seconds (365.25 days)
pub const AVERAGE_YEAR_SECONDS: i64 = 31_557_600;
