//! # Generation resources
//!
//! Map generation touches two pieces of shared, order-sensitive state: the
//! **kernel pool** holding geometry kernels, and the **working directory** where
//! processing engines write their intermediate artifacts. Both live in
//! [`GenerationResources`], an explicit handle passed to every generation call
//! instead of process-wide globals.
//!
//! ## Overview
//!
//! - [`KernelPool`] – Where kernels are loaded, in load order ([`KernelManifest`]
//!   records them for engines that load kernels themselves).
//! - [`WorkingDirectory`] – Scratch root plus the currently redirected location;
//!   [`WorkingDirectory::redirect`] hands out a [`Redirection`] guard which restores the
//!   previous location when dropped, error paths included.
//! - [`IntermediateCleaner`] – Removal of intermediate per-instrument scratch state
//!   ([`DirectoryCleaner`] deletes the `l2` and `l3` directories wholesale).
//!
//! ## Scratch layout
//!
//! ```text
//! <scratch_root>/imap/<instrument>/l2
//! <scratch_root>/imap/<instrument>/l3
//! ```
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::{
    constants::MISSION_PREFIX,
    descriptor::{dependencies::DataLevel, Instrument},
    mapper_errors::MapperError,
};

/// Registry of loaded geometry kernels.
pub trait KernelPool {
    fn load(&mut self, path: &Utf8Path) -> Result<(), MapperError>;

    /// Unload every kernel.
    fn clear(&mut self);

    /// Every kernel loaded since the last [`KernelPool::clear`], in load order.
    fn loaded(&self) -> &[Utf8PathBuf];
}

/// Pool recording kernel paths without interpreting them.
#[derive(Debug, Default, Clone)]
pub struct KernelManifest {
    kernels: Vec<Utf8PathBuf>,
}

impl KernelPool for KernelManifest {
    fn load(&mut self, path: &Utf8Path) -> Result<(), MapperError> {
        if !path.exists() {
            return Err(MapperError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("kernel {path} not found"),
            )));
        }
        if !self.kernels.iter().any(|k| k == path) {
            self.kernels.push(path.to_path_buf());
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.kernels.clear();
    }

    fn loaded(&self) -> &[Utf8PathBuf] {
        &self.kernels
    }
}

fn level_dir(scratch_root: &Utf8Path, instrument: Instrument, level: &str) -> Utf8PathBuf {
    scratch_root
        .join(MISSION_PREFIX)
        .join(instrument.name())
        .join(level)
}

/// Scratch root and current engine output location.
#[derive(Debug)]
pub struct WorkingDirectory {
    scratch_root: Utf8PathBuf,
    current: Utf8PathBuf,
}

impl WorkingDirectory {
    pub fn new(scratch_root: impl Into<Utf8PathBuf>) -> Self {
        let scratch_root = scratch_root.into();
        WorkingDirectory {
            current: scratch_root.clone(),
            scratch_root,
        }
    }

    pub fn current(&self) -> &Utf8Path {
        &self.current
    }

    /// Point the working directory at the `level` scratch of `instrument`, creating it.
    ///
    /// Return
    /// ----------
    /// * A guard exposing the new location; dropping it restores the previous one.
    pub fn redirect(
        &mut self,
        instrument: Instrument,
        level: DataLevel,
    ) -> Result<Redirection<'_>, MapperError> {
        let token = level.token().ok_or_else(|| {
            MapperError::UnsupportedInstrument(instrument.name().to_string())
        })?;
        let target = level_dir(&self.scratch_root, instrument, token);
        fs::create_dir_all(&target)?;
        debug!(%target, "working directory redirected");

        let previous = std::mem::replace(&mut self.current, target);
        Ok(Redirection {
            directory: self,
            previous: Some(previous),
        })
    }
}

/// Active redirection of a [`WorkingDirectory`].
#[derive(Debug)]
pub struct Redirection<'a> {
    directory: &'a mut WorkingDirectory,
    previous: Option<Utf8PathBuf>,
}

impl Redirection<'_> {
    pub fn path(&self) -> &Utf8Path {
        &self.directory.current
    }
}

impl Drop for Redirection<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.directory.current = previous;
        }
    }
}

/// Removal of the intermediate state left by generating maps of one instrument.
pub trait IntermediateCleaner {
    fn cleanup(&self, instrument: Instrument) -> Result<(), MapperError>;
}

/// Deletes `<scratch_root>/imap/<instrument>/{l2,l3}` recursively.
#[derive(Debug, Clone)]
pub struct DirectoryCleaner {
    scratch_root: Utf8PathBuf,
}

impl DirectoryCleaner {
    pub fn new(scratch_root: impl Into<Utf8PathBuf>) -> Self {
        DirectoryCleaner {
            scratch_root: scratch_root.into(),
        }
    }
}

impl IntermediateCleaner for DirectoryCleaner {
    fn cleanup(&self, instrument: Instrument) -> Result<(), MapperError> {
        for level in [DataLevel::L2, DataLevel::L3] {
            if let Some(token) = level.token() {
                let dir = level_dir(&self.scratch_root, instrument, token);
                if dir.exists() {
                    debug!(%dir, "removing intermediate directory");
                    fs::remove_dir_all(&dir)?;
                }
            }
        }
        Ok(())
    }
}

/// Mutable state threaded through map generation.
pub struct GenerationResources {
    pub kernel_pool: Box<dyn KernelPool>,
    pub working_directory: WorkingDirectory,
}

impl GenerationResources {
    pub fn new(kernel_pool: Box<dyn KernelPool>, working_directory: WorkingDirectory) -> Self {
        GenerationResources {
            kernel_pool,
            working_directory,
        }
    }
}
