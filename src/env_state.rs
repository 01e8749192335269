//! # Mapper environment state
//!
//! This module defines [`MapperEnv`], the **shared environment object** holding what
//! is needed to talk to the mission data archive:
//!
//! - a persistent [`ureq::Agent`] HTTP client,
//! - the base URL of the data access API,
//! - an optional API token, sent as a bearer token,
//! - the local data directory where downloaded files are cached.
//!
//! ## Structure
//!
//! ```text
//! MapperEnv
//! ├── http_client      (ureq::Agent)
//! ├── data_access_url  (IMAP_DATA_ACCESS_URL)
//! ├── access_token     (IMAP_API_KEY)
//! └── data_dir         (IMAP_DATA_DIR, defaults to the user cache directory)
//! ```
//!
//! ## Notes
//!
//! - Requests carry no timeout and are never retried: a failing call surfaces
//!   as [`MapperError::ExternalService`].
//! - A file already present in `data_dir` is never downloaded again.
//!
//! ## See also
//!
//! - [`crate::catalog::imap_api::ImapApi`] – Catalog and kernel service built on this object.
use std::{fs, io};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tracing::{debug, info};
use ureq::Agent;

use crate::mapper_errors::MapperError;

/// Name of the cache sub-directory used when no data directory is configured.
const CACHE_DIR_NAME: &str = "imap_mapper";

/// This object is passed to the catalog client to provide access to the archive
///
/// # Fields
///
/// * `http_client` - The ureq agent used for every request
/// * `data_access_url` - Base URL of the data access API, without trailing slash
/// * `access_token` - Optional API key
/// * `data_dir` - Local cache of downloaded files
#[derive(Debug, Clone)]
pub struct MapperEnv {
    pub http_client: Agent,
    pub data_access_url: String,
    pub access_token: Option<String>,
    pub data_dir: Utf8PathBuf,
}

impl MapperEnv {
    /// Create a new environment
    ///
    /// Arguments
    /// ---------
    /// * `data_access_url`: base URL of the data access API
    /// * `access_token`: optional API key
    /// * `data_dir`: local data directory, [`MapperEnv::default_data_dir`] when `None`
    ///
    /// Return
    /// ------
    /// * The environment, or an error if no data directory can be determined
    pub fn new(
        data_access_url: impl Into<String>,
        access_token: Option<String>,
        data_dir: Option<Utf8PathBuf>,
    ) -> Result<Self, MapperError> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => Self::default_data_dir()?,
        };

        let config = Agent::config_builder().build();
        let agent: Agent = config.into();

        Ok(MapperEnv {
            http_client: agent,
            data_access_url: data_access_url.into().trim_end_matches('/').to_string(),
            access_token,
            data_dir,
        })
    }

    /// `<user cache dir>/imap_mapper`
    pub fn default_data_dir() -> Result<Utf8PathBuf, MapperError> {
        let base_dir = BaseDirs::new().ok_or_else(|| {
            MapperError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                "Cannot find the base directory",
            ))
        })?;
        let cache_path = Utf8Path::from_path(base_dir.cache_dir()).ok_or_else(|| {
            MapperError::Utf8PathError(format!("{}", base_dir.cache_dir().display()))
        })?;
        Ok(cache_path.join(CACHE_DIR_NAME))
    }

    /// Full URL of an API endpoint, `path_and_query` starting without a slash.
    pub(crate) fn endpoint(&self, path_and_query: &str) -> String {
        format!("{}/{}", self.data_access_url, path_and_query)
    }

    fn request(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>, MapperError> {
        debug!(%url, "GET");
        let mut request = self.http_client.get(url);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        Ok(request.call()?)
    }

    pub(crate) fn get_from_url(&self, url: &str) -> Result<String, MapperError> {
        Ok(self.request(url)?.body_mut().read_to_string()?)
    }

    /// Download `url` into `path` unless `path` already exists.
    ///
    /// The body is streamed into a `.part` sibling which is renamed once complete,
    /// so an interrupted download never looks cached.
    pub(crate) fn download_to(&self, url: &str, path: &Utf8Path) -> Result<(), MapperError> {
        if path.exists() {
            debug!(%path, "already cached");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!("Downloading {url}...");
        let partial = Utf8PathBuf::from(format!("{path}.part"));
        let mut response = self.request(url)?;
        let mut file = fs::File::create(&partial)?;
        io::copy(&mut response.body_mut().as_reader(), &mut file)?;
        fs::rename(&partial, path)?;
        info!("Downloaded {url}");
        Ok(())
    }
}
