//! # Map request configuration
//!
//! A request file describes one map in mission vocabulary and the time it covers.
//! YAML (`.yaml`, `.yml`) and JSON (`.json`) are accepted:
//!
//! ```yaml
//! instrument: Hi 90
//! spin_phase: Ram
//! reference_frame_type: spacecraft
//! survival_corrected: true
//! spice_frame_name: ECLIPJ2000
//! pixelation_scheme: square
//! pixel_parameter: 2
//! map_data_type: ENA Intensity
//! quantity_suffix: CUSTOM
//! canonical_map_period:
//!   year: 2025
//!   quarter: 1
//!   map_period: 6
//!   number_of_maps: 1
//! ```
//!
//! Instead of `canonical_map_period`, explicit `time_ranges` (list of `start` / `end`
//! ISO-8601 timestamps, UTC when no offset is given) may be listed. Exactly one
//! of the two must be present.
//!
//! [`Configuration::map_descriptor`] translates the vocabulary into a
//! [`MapDescriptor`], [`Configuration::map_date_ranges`] yields the windows and
//! [`Configuration::map_request`] bundles both for the consolidator.
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use hifitime::Duration;
use serde::Deserialize;

use crate::{
    consolidator::MapRequest,
    descriptor::{
        FrameDescriptor, Instrument, MapDescriptor, MapDuration, PrincipalData, Sensor,
        SpinPhase, SurvivalCorrection,
    },
    mapper_errors::MapperError,
    time::{epoch_from_naive, CanonicalMapPeriod, TimeWindow},
};

/// Frames usable without a custom kernel.
const KNOWN_SPICE_FRAMES: &[&str] = &[
    "ECLIPJ2000",
    "J2000",
    "IMAP_SPACECRAFT",
    "IMAP_DPS",
    "IMAP_HAE",
    "IMAP_HNU",
    "IMAP_GCS",
    "IMAP_HRE",
    "IMAP_HI_45",
    "IMAP_HI_90",
    "IMAP_LO",
    "IMAP_ULTRA_45",
    "IMAP_ULTRA_90",
    "hae",
    "hnu",
    "gcs",
    "hre",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

fn default_output_directory() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Configuration {
    /// Instrument and sensor, e.g. `Hi 90`, `Ultra combined`, `Lo`
    pub instrument: String,
    /// `ram`, `anti-ram` or `full spin`
    pub spin_phase: String,
    /// `spacecraft`, `heliospheric` or `heliospheric kinematic`
    pub reference_frame_type: String,
    pub survival_corrected: bool,
    pub spice_frame_name: String,
    /// `square` or `healpix`
    pub pixelation_scheme: String,
    pub pixel_parameter: u32,
    /// `ENA Intensity` or `Spectral Index`
    pub map_data_type: String,
    pub canonical_map_period: Option<CanonicalMapPeriod>,
    pub time_ranges: Option<Vec<TimeRange>>,
    pub kernel_path: Option<Utf8PathBuf>,
    pub lo_species: Option<String>,
    #[serde(default = "default_output_directory")]
    pub output_directory: Utf8PathBuf,
    #[serde(default)]
    pub quantity_suffix: String,
    /// Request text as read
    #[serde(skip)]
    pub raw_config: String,
}

/// Parse an ISO-8601 timestamp into UTC.
fn parse_timestamp(field: &'static str, value: &str) -> Result<hifitime::Epoch, MapperError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Ok(epoch_from_naive(&with_offset.naive_utc()));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(epoch_from_naive(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| epoch_from_naive(&naive))
        .ok_or_else(|| MapperError::configuration(field, value))
}

impl Configuration {
    /// Read a request file, choosing the parser from its extension.
    pub fn from_file(path: &Utf8Path) -> Result<Self, MapperError> {
        let text = fs::read_to_string(path)?;
        match path.extension() {
            Some("json") => Self::from_json(&text),
            Some("yaml" | "yml") => Self::from_yaml(&text),
            _ => Err(MapperError::InvalidConfigurationFile(format!(
                "Configuration file {path} must have .json or .yaml extension"
            ))),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, MapperError> {
        let config: Configuration = serde_yaml::from_str(text)?;
        config.with_raw(text)
    }

    pub fn from_json(text: &str) -> Result<Self, MapperError> {
        let config: Configuration = serde_json::from_str(text)?;
        config.with_raw(text)
    }

    fn with_raw(mut self, text: &str) -> Result<Self, MapperError> {
        match (&self.canonical_map_period, &self.time_ranges) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => {
                return Err(MapperError::InvalidConfigurationFile(
                    "exactly one of canonical_map_period and time_ranges is required".into(),
                ))
            }
        }
        self.raw_config = text.to_string();
        Ok(self)
    }

    fn instrument_and_sensor(&self) -> Result<(Instrument, Sensor), MapperError> {
        let mut parts = self.instrument.split_whitespace();
        let instrument: Instrument = parts
            .next()
            .ok_or_else(|| MapperError::configuration("instrument", &self.instrument))?
            .parse()?;
        let sensor: Sensor = parts.next().unwrap_or_default().parse()?;
        if parts.next().is_some() {
            return Err(MapperError::configuration("instrument", &self.instrument));
        }
        Ok((instrument, sensor))
    }

    /// Descriptor of the requested map.
    ///
    /// Return
    /// ----------
    /// * The descriptor, or [`MapperError::Configuration`] naming the first field
    ///   with an unknown value.
    pub fn map_descriptor(&self) -> Result<MapDescriptor, MapperError> {
        let (instrument, sensor) = self.instrument_and_sensor()?;

        let frame_descriptor = match self.reference_frame_type.to_lowercase().as_str() {
            "spacecraft" => FrameDescriptor::Spacecraft,
            "heliospheric" => FrameDescriptor::Heliospheric,
            "heliospheric kinematic" => FrameDescriptor::HeliosphericKinematic,
            _ => {
                return Err(MapperError::configuration(
                    "reference_frame_type",
                    &self.reference_frame_type,
                ))
            }
        };
        let principal_data = match self.map_data_type.to_lowercase().as_str() {
            "ena intensity" => PrincipalData::Ena,
            "spectral index" => PrincipalData::Spx,
            _ => return Err(MapperError::configuration("map_data_type", &self.map_data_type)),
        };
        let spin_phase = match self.spin_phase.to_lowercase().as_str() {
            "ram" => SpinPhase::Ram,
            "anti-ram" => SpinPhase::Anti,
            "full spin" => SpinPhase::Full,
            _ => return Err(MapperError::configuration("spin_phase", &self.spin_phase)),
        };
        let resolution = match self.pixelation_scheme.to_lowercase().as_str() {
            "square" => format!("{}deg", self.pixel_parameter),
            "healpix" => format!("nside{}", self.pixel_parameter),
            _ => {
                return Err(MapperError::configuration(
                    "pixelation_scheme",
                    &self.pixelation_scheme,
                ))
            }
        };
        let survival_corrected = if self.survival_corrected {
            SurvivalCorrection::Sp
        } else {
            SurvivalCorrection::Nsp
        };

        if self.kernel_path.is_none() && !KNOWN_SPICE_FRAMES.contains(&self.spice_frame_name.as_str())
        {
            return Err(MapperError::InvalidConfigurationFile(format!(
                "Unknown Spice Frame {} with no custom kernel path provided",
                self.spice_frame_name
            )));
        }
        let coordinate_system: String = self
            .spice_frame_name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();

        MapDescriptor::builder(instrument, sensor)
            .principal_data(principal_data)
            .survival_corrected(survival_corrected)
            .spin_phase(spin_phase)
            .frame_descriptor(frame_descriptor)
            .coordinate_system(coordinate_system)
            .resolution_str(resolution)
            .duration(self.map_duration()?)
            .species(self.lo_species.as_deref().unwrap_or("h"))
            .quantity_suffix(self.quantity_suffix.clone())
            .build()
    }

    fn map_duration(&self) -> Result<MapDuration, MapperError> {
        match &self.canonical_map_period {
            Some(period) => Ok(MapDuration::Months(period.map_period)),
            None => {
                let windows = self.map_date_ranges()?;
                let span = match (windows.first(), windows.last()) {
                    (Some(first), Some(last)) => last.end - first.start,
                    _ => Duration::ZERO,
                };
                Ok(MapDuration::Custom(span))
            }
        }
    }

    /// Windows of the request, ascending by start.
    pub fn map_date_ranges(&self) -> Result<Vec<TimeWindow>, MapperError> {
        if let Some(period) = &self.canonical_map_period {
            return period.calculate_date_ranges();
        }
        let mut windows = self
            .time_ranges
            .iter()
            .flatten()
            .map(|range| {
                TimeWindow::new(
                    parse_timestamp("time_ranges.start", &range.start)?,
                    parse_timestamp("time_ranges.end", &range.end)?,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        windows.sort_by(|a, b| a.start.cmp(&b.start));
        if windows.is_empty() {
            return Err(MapperError::configuration("time_ranges", "[]"));
        }
        Ok(windows)
    }

    /// Everything the consolidator needs to produce this map.
    pub fn map_request(&self) -> Result<MapRequest, MapperError> {
        Ok(MapRequest {
            descriptor: self.map_descriptor()?,
            windows: self.map_date_ranges()?,
            raw_config: self.raw_config.clone(),
            output_directory: self.output_directory.clone(),
        })
    }
}
