//! # Map descriptors
//!
//! A [`MapDescriptor`] is the structured identity of a map: which instrument and
//! sensor produced it, which quantity it holds, in which frame and at which
//! resolution. Descriptors are **values**: they are built once, compared field by
//! field, and every transformation (see [`MapDescriptor::with_sensor`] and friends)
//! returns a new descriptor.
//!
//! ## Canonical encoding
//!
//! ```text
//! h90-enaCUSTOM-h-sf-sp-ram-hae-2deg-6mo
//! │   │  │      │ │  │  │   │   │    └ duration   (<n>mo, <n>yr or "custom")
//! │   │  │      │ │  │  │   │   └ resolution      (<n>deg or nside<n>)
//! │   │  │      │ │  │  │   └ coordinate system
//! │   │  │      │ │  │  └ spin phase              (ram, anti, full)
//! │   │  │      │ │  └ survival correction        (sp, nsp)
//! │   │  │      │ └ frame                         (sf, hf, hk)
//! │   │  │      └ species
//! │   │  └ quantity suffix (may be empty)
//! │   └ principal data                           (ena, spx)
//! └ instrument and sensor                        (h45, h90, hic, u45, u90, ulc, ilo, glx, idx)
//! ```
//!
//! [`fmt::Display`] produces this string and [`FromStr`] parses it back. An ad hoc
//! duration ([`MapDuration::Custom`]) is written as `custom` whatever its length,
//! so decoding it yields a zero-length custom duration: the encoding is a name, not a
//! serialization of the time span.
//!
//! The second projection, [`MapDescriptor::to_map_descriptor_string`], drops the
//! quantity suffix and is the descriptor handed to processing engines.
pub mod dependencies;

use std::{fmt, str::FromStr, sync::LazyLock};

use hifitime::Duration;
use regex::Regex;

use crate::mapper_errors::MapperError;

static RESOLUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+deg|nside\d+)$").unwrap_or_else(|e| panic!("resolution regex: {e}"))
});

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(mo|yr)$").unwrap_or_else(|e| panic!("duration regex: {e}"))
});

const CUSTOM_DURATION: &str = "custom";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Hi,
    Lo,
    Ultra,
    Glows,
    Idex,
}

impl Instrument {
    /// Lower-case name used by the catalog and in filenames.
    pub fn name(&self) -> &'static str {
        match self {
            Instrument::Hi => "hi",
            Instrument::Lo => "lo",
            Instrument::Ultra => "ultra",
            Instrument::Glows => "glows",
            Instrument::Idex => "idex",
        }
    }

    /// Short tag scoping the survival probability product of this instrument.
    pub fn survival_tag(&self) -> Option<&'static str> {
        match self {
            Instrument::Hi => Some("hi"),
            Instrument::Lo => Some("lo"),
            Instrument::Ultra => Some("ul"),
            Instrument::Glows | Instrument::Idex => None,
        }
    }

    fn has_sensors(&self) -> bool {
        matches!(self, Instrument::Hi | Instrument::Ultra)
    }
}

impl FromStr for Instrument {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hi" => Ok(Instrument::Hi),
            "lo" => Ok(Instrument::Lo),
            "ultra" => Ok(Instrument::Ultra),
            "glows" => Ok(Instrument::Glows),
            "idex" => Ok(Instrument::Idex),
            _ => Err(MapperError::configuration("instrument", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    S45,
    S90,
    Combined,
    None,
}

impl Sensor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensor::S45 => "45",
            Sensor::S90 => "90",
            Sensor::Combined => "combined",
            Sensor::None => "",
        }
    }

    /// Whether this sensor selection includes the 45° sensor.
    pub fn includes_45(&self) -> bool {
        matches!(self, Sensor::S45 | Sensor::Combined)
    }

    /// Whether this sensor selection includes the 90° sensor.
    pub fn includes_90(&self) -> bool {
        matches!(self, Sensor::S90 | Sensor::Combined)
    }
}

impl FromStr for Sensor {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "45" => Ok(Sensor::S45),
            "90" => Ok(Sensor::S90),
            "combined" => Ok(Sensor::Combined),
            "" => Ok(Sensor::None),
            _ => Err(MapperError::configuration("sensor", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalData {
    /// ENA intensity
    Ena,
    /// Spectral index
    Spx,
}

impl PrincipalData {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalData::Ena => "ena",
            PrincipalData::Spx => "spx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurvivalCorrection {
    Sp,
    Nsp,
}

impl SurvivalCorrection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurvivalCorrection::Sp => "sp",
            SurvivalCorrection::Nsp => "nsp",
        }
    }
}

impl FromStr for SurvivalCorrection {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sp" => Ok(SurvivalCorrection::Sp),
            "nsp" => Ok(SurvivalCorrection::Nsp),
            _ => Err(MapperError::configuration("survival_corrected", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpinPhase {
    Ram,
    Anti,
    Full,
}

impl SpinPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpinPhase::Ram => "ram",
            SpinPhase::Anti => "anti",
            SpinPhase::Full => "full",
        }
    }
}

impl FromStr for SpinPhase {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ram" => Ok(SpinPhase::Ram),
            "anti" => Ok(SpinPhase::Anti),
            "full" => Ok(SpinPhase::Full),
            _ => Err(MapperError::configuration("spin_phase", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameDescriptor {
    /// Spacecraft frame (`sf`)
    Spacecraft,
    /// Heliospheric frame (`hf`)
    Heliospheric,
    /// Heliospheric kinematic frame (`hk`)
    HeliosphericKinematic,
}

impl FrameDescriptor {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameDescriptor::Spacecraft => "sf",
            FrameDescriptor::Heliospheric => "hf",
            FrameDescriptor::HeliosphericKinematic => "hk",
        }
    }
}

impl FromStr for FrameDescriptor {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sf" => Ok(FrameDescriptor::Spacecraft),
            "hf" => Ok(FrameDescriptor::Heliospheric),
            "hk" => Ok(FrameDescriptor::HeliosphericKinematic),
            _ => Err(MapperError::configuration("frame_descriptor", s)),
        }
    }
}

/// Time span covered by a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapDuration {
    Months(u32),
    Years(u32),
    /// Ad hoc span, encoded as `custom`
    Custom(Duration),
}

impl fmt::Display for MapDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapDuration::Months(n) => write!(f, "{n}mo"),
            MapDuration::Years(n) => write!(f, "{n}yr"),
            MapDuration::Custom(_) => f.write_str(CUSTOM_DURATION),
        }
    }
}

impl FromStr for MapDuration {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == CUSTOM_DURATION {
            return Ok(MapDuration::Custom(Duration::ZERO));
        }
        let caps = DURATION_RE
            .captures(s)
            .ok_or_else(|| MapperError::configuration("duration", s))?;
        let n: u32 = caps[1]
            .parse()
            .map_err(|_| MapperError::configuration("duration", s))?;
        match &caps[2] {
            "mo" => Ok(MapDuration::Months(n)),
            _ => Ok(MapDuration::Years(n)),
        }
    }
}

/// Structured identity of a map.
///
/// Build one with [`MapDescriptor::builder`] or parse its canonical string with
/// [`str::parse`]. Fields are read through accessors; derived descriptors come from
/// the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDescriptor {
    instrument: Instrument,
    sensor: Sensor,
    principal_data: PrincipalData,
    survival_corrected: SurvivalCorrection,
    spin_phase: SpinPhase,
    frame_descriptor: FrameDescriptor,
    coordinate_system: String,
    resolution_str: String,
    duration: MapDuration,
    species: String,
    quantity_suffix: String,
}

impl MapDescriptor {
    /// Start a descriptor for `instrument` / `sensor`.
    ///
    /// Defaults: ENA intensity, no survival correction, ram spin phase, spacecraft
    /// frame, `hae` coordinates, `2deg` resolution, 6 months, hydrogen, no suffix.
    pub fn builder(instrument: Instrument, sensor: Sensor) -> MapDescriptorBuilder {
        MapDescriptorBuilder {
            descriptor: MapDescriptor {
                instrument,
                sensor,
                principal_data: PrincipalData::Ena,
                survival_corrected: SurvivalCorrection::Nsp,
                spin_phase: SpinPhase::Ram,
                frame_descriptor: FrameDescriptor::Spacecraft,
                coordinate_system: "hae".into(),
                resolution_str: "2deg".into(),
                duration: MapDuration::Months(6),
                species: "h".into(),
                quantity_suffix: String::new(),
            },
        }
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    pub fn principal_data(&self) -> PrincipalData {
        self.principal_data
    }

    pub fn survival_corrected(&self) -> SurvivalCorrection {
        self.survival_corrected
    }

    pub fn spin_phase(&self) -> SpinPhase {
        self.spin_phase
    }

    pub fn frame_descriptor(&self) -> FrameDescriptor {
        self.frame_descriptor
    }

    pub fn coordinate_system(&self) -> &str {
        &self.coordinate_system
    }

    pub fn resolution_str(&self) -> &str {
        &self.resolution_str
    }

    pub fn duration(&self) -> MapDuration {
        self.duration
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn quantity_suffix(&self) -> &str {
        &self.quantity_suffix
    }

    /// Instrument and sensor token (`h45`, `hic`, `ilo`, ...).
    pub fn instrument_descriptor(&self) -> &'static str {
        match (self.instrument, self.sensor) {
            (Instrument::Hi, Sensor::S45) => "h45",
            (Instrument::Hi, Sensor::S90) => "h90",
            (Instrument::Hi, _) => "hic",
            (Instrument::Ultra, Sensor::S45) => "u45",
            (Instrument::Ultra, Sensor::S90) => "u90",
            (Instrument::Ultra, _) => "ulc",
            (Instrument::Lo, _) => "ilo",
            (Instrument::Glows, _) => "glx",
            (Instrument::Idex, _) => "idx",
        }
    }

    pub fn with_sensor(&self, sensor: Sensor) -> Self {
        MapDescriptor {
            sensor,
            ..self.clone()
        }
    }

    pub fn with_principal_data(&self, principal_data: PrincipalData) -> Self {
        MapDescriptor {
            principal_data,
            ..self.clone()
        }
    }

    pub fn with_survival_corrected(&self, survival_corrected: SurvivalCorrection) -> Self {
        MapDescriptor {
            survival_corrected,
            ..self.clone()
        }
    }

    pub fn with_spin_phase(&self, spin_phase: SpinPhase) -> Self {
        MapDescriptor {
            spin_phase,
            ..self.clone()
        }
    }

    /// Descriptor string without the quantity suffix, as expected by processing engines.
    pub fn to_map_descriptor_string(&self) -> String {
        self.join_fields(self.principal_data.as_str().to_string())
    }

    fn join_fields(&self, principal: String) -> String {
        [
            self.instrument_descriptor().to_string(),
            principal,
            self.species.clone(),
            self.frame_descriptor.as_str().to_string(),
            self.survival_corrected.as_str().to_string(),
            self.spin_phase.as_str().to_string(),
            self.coordinate_system.clone(),
            self.resolution_str.clone(),
            self.duration.to_string(),
        ]
        .join("-")
    }

    fn validate(self) -> Result<Self, MapperError> {
        match (self.instrument.has_sensors(), self.sensor) {
            (true, Sensor::None) | (false, Sensor::S45 | Sensor::S90 | Sensor::Combined) => {
                return Err(MapperError::configuration(
                    "sensor",
                    format!("{} {}", self.instrument.name(), self.sensor.as_str()),
                ));
            }
            _ => {}
        }
        check_token("species", &self.species, false)?;
        check_token("coordinate_system", &self.coordinate_system, false)?;
        check_token("quantity_suffix", &self.quantity_suffix, true)?;
        if !RESOLUTION_RE.is_match(&self.resolution_str) {
            return Err(MapperError::configuration(
                "resolution_str",
                self.resolution_str,
            ));
        }
        Ok(self)
    }
}

fn check_token(field: &'static str, value: &str, allow_empty: bool) -> Result<(), MapperError> {
    let well_formed = value.chars().all(|c| c.is_ascii_alphanumeric());
    if !well_formed || (value.is_empty() && !allow_empty) {
        return Err(MapperError::configuration(field, value));
    }
    Ok(())
}

impl fmt::Display for MapDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let principal = format!("{}{}", self.principal_data.as_str(), self.quantity_suffix);
        f.write_str(&self.join_fields(principal))
    }
}

impl FromStr for MapDescriptor {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split('-').collect();
        let [instrument, principal, species, frame, survival, spin, coordinate, resolution, duration] =
            tokens[..]
        else {
            return Err(MapperError::configuration("descriptor", s));
        };

        let (instrument, sensor) = match instrument {
            "h45" => (Instrument::Hi, Sensor::S45),
            "h90" => (Instrument::Hi, Sensor::S90),
            "hic" => (Instrument::Hi, Sensor::Combined),
            "u45" => (Instrument::Ultra, Sensor::S45),
            "u90" => (Instrument::Ultra, Sensor::S90),
            "ulc" => (Instrument::Ultra, Sensor::Combined),
            "ilo" => (Instrument::Lo, Sensor::None),
            "glx" => (Instrument::Glows, Sensor::None),
            "idx" => (Instrument::Idex, Sensor::None),
            other => return Err(MapperError::configuration("instrument", other)),
        };

        let (principal_data, quantity_suffix) = if let Some(rest) = principal.strip_prefix("ena") {
            (PrincipalData::Ena, rest)
        } else if let Some(rest) = principal.strip_prefix("spx") {
            (PrincipalData::Spx, rest)
        } else {
            return Err(MapperError::configuration("principal_data", principal));
        };

        MapDescriptor::builder(instrument, sensor)
            .principal_data(principal_data)
            .quantity_suffix(quantity_suffix)
            .species(species)
            .frame_descriptor(frame.parse()?)
            .survival_corrected(survival.parse()?)
            .spin_phase(spin.parse()?)
            .coordinate_system(coordinate)
            .resolution_str(resolution)
            .duration(duration.parse()?)
            .build()
    }
}

/// Builder for [`MapDescriptor`]; [`MapDescriptorBuilder::build`] validates the fields.
#[derive(Debug, Clone)]
pub struct MapDescriptorBuilder {
    descriptor: MapDescriptor,
}

impl MapDescriptorBuilder {
    pub fn principal_data(mut self, principal_data: PrincipalData) -> Self {
        self.descriptor.principal_data = principal_data;
        self
    }

    pub fn survival_corrected(mut self, survival_corrected: SurvivalCorrection) -> Self {
        self.descriptor.survival_corrected = survival_corrected;
        self
    }

    pub fn spin_phase(mut self, spin_phase: SpinPhase) -> Self {
        self.descriptor.spin_phase = spin_phase;
        self
    }

    pub fn frame_descriptor(mut self, frame_descriptor: FrameDescriptor) -> Self {
        self.descriptor.frame_descriptor = frame_descriptor;
        self
    }

    pub fn coordinate_system(mut self, coordinate_system: impl Into<String>) -> Self {
        self.descriptor.coordinate_system = coordinate_system.into();
        self
    }

    pub fn resolution_str(mut self, resolution_str: impl Into<String>) -> Self {
        self.descriptor.resolution_str = resolution_str.into();
        self
    }

    pub fn duration(mut self, duration: MapDuration) -> Self {
        self.descriptor.duration = duration;
        self
    }

    pub fn species(mut self, species: impl Into<String>) -> Self {
        self.descriptor.species = species.into();
        self
    }

    pub fn quantity_suffix(mut self, quantity_suffix: impl Into<String>) -> Self {
        self.descriptor.quantity_suffix = quantity_suffix.into();
        self
    }

    pub fn build(self) -> Result<MapDescriptor, MapperError> {
        self.descriptor.validate()
    }
}
