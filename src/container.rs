//! # Science containers
//!
//! Map artifacts are science files made of **global attributes** and named
//! **variables**. Each variable is a flat array with a shape and its own attributes.
//! The `epoch` variable holds the timestamps of the file (nanoseconds, as 64-bit
//! integers); a variable whose `DEPEND_0` attribute is `epoch` is indexed by time
//! along its leading dimension.
//!
//! The on-disk format is behind [`ScienceContainer`]. [`JsonContainer`] stores the
//! [`Dataset`] model as JSON.
//!
//! ## See also
//! * [`crate::consolidator`] – Concatenates datasets along the epoch axis.
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEPEND_0, EPOCH_VARIABLE},
    mapper_errors::MapperError,
};

/// Values of a variable, flattened in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum VariableData {
    F64(Vec<f64>),
    I64(Vec<i64>),
    Text(Vec<String>),
}

impl VariableData {
    pub fn len(&self) -> usize {
        match self {
            VariableData::F64(v) => v.len(),
            VariableData::I64(v) => v.len(),
            VariableData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&mut self, other: &VariableData) -> Result<(), String> {
        match (self, other) {
            (VariableData::F64(a), VariableData::F64(b)) => a.extend_from_slice(b),
            (VariableData::I64(a), VariableData::I64(b)) => a.extend_from_slice(b),
            (VariableData::Text(a), VariableData::Text(b)) => a.extend_from_slice(b),
            _ => return Err("value types differ".into()),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub data: VariableData,
    pub shape: Vec<usize>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Variable {
    pub fn new(data: VariableData, shape: Vec<usize>) -> Self {
        Variable {
            data,
            shape,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Name of the variable governing the leading dimension.
    pub fn depend_0(&self) -> Option<&str> {
        self.attributes.get(DEPEND_0).map(String::as_str)
    }

    fn is_consistent(&self) -> bool {
        !self.shape.is_empty() && self.shape.iter().product::<usize>() == self.data.len()
    }

    /// Append `other` along the leading dimension.
    fn concatenate(&mut self, other: &Variable) -> Result<(), String> {
        if self.shape.get(1..) != other.shape.get(1..) || self.shape.is_empty() {
            return Err(format!(
                "shapes {:?} and {:?} cannot be concatenated",
                self.shape, other.shape
            ));
        }
        self.data.append(&other.data)?;
        self.shape[0] += other.shape[0];
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,
}

impl Dataset {
    /// First timestamp of the `epoch` variable.
    pub fn first_epoch(&self) -> Option<i64> {
        match &self.variables.get(EPOCH_VARIABLE)?.data {
            VariableData::I64(values) => values.first().copied(),
            _ => None,
        }
    }

    /// Names of the variables indexed by `epoch`, `epoch` itself excluded.
    pub fn epoch_dependent(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|(name, var)| *name != EPOCH_VARIABLE && var.depend_0() == Some(EPOCH_VARIABLE))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Append the `epoch` axis of `other`, and every variable depending on it.
    ///
    /// Variables not indexed by time are left as they are in `self`.
    pub fn append_epochs(&mut self, other: &Dataset) -> Result<(), String> {
        let mut names = vec![EPOCH_VARIABLE.to_string()];
        names.extend(self.epoch_dependent());

        for name in names {
            let extra = other
                .variables
                .get(&name)
                .ok_or_else(|| format!("variable {name} missing"))?;
            let target = self
                .variables
                .get_mut(&name)
                .ok_or_else(|| format!("variable {name} missing"))?;
            target
                .concatenate(extra)
                .map_err(|reason| format!("variable {name}: {reason}"))?;
        }
        Ok(())
    }
}

/// Reader and writer of science files.
pub trait ScienceContainer {
    fn read(&self, path: &Utf8Path) -> Result<Dataset, MapperError>;

    fn write(&self, path: &Utf8Path, dataset: &Dataset) -> Result<(), MapperError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContainer;

impl ScienceContainer for JsonContainer {
    fn read(&self, path: &Utf8Path) -> Result<Dataset, MapperError> {
        let reader = BufReader::new(File::open(path)?);
        let dataset: Dataset = serde_json::from_reader(reader)?;
        if let Some((name, _)) = dataset.variables.iter().find(|(_, v)| !v.is_consistent()) {
            return Err(MapperError::container(
                path,
                format!("variable {name} does not match its shape"),
            ));
        }
        Ok(dataset)
    }

    fn write(&self, path: &Utf8Path, dataset: &Dataset) -> Result<(), MapperError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, dataset)?;
        writer.flush()?;
        Ok(())
    }
}
