//! HTTP client of the mission data access API.
//!
//! | Operation | Endpoint |
//! |---|---|
//! | [`Catalog::query`] | `query?instrument=..&data_level=..&descriptor=..&start_date=..&end_date=..` |
//! | [`Catalog::query_ancillary`] | `query?table=ancillary&instrument=..` |
//! | [`KernelService::kernel_metadata`] | `spice-query?type=<category>&start_time=0` |
//! | [`KernelService::download`] | `download/<file_name>` |
use camino::Utf8PathBuf;

use super::{Catalog, CatalogFileRecord, CatalogQuery, KernelCategory, KernelRecord, KernelService};
use crate::{constants::ANCILLARY_TABLE, env_state::MapperEnv, mapper_errors::MapperError};

#[derive(Debug, Clone)]
pub struct ImapApi {
    env: MapperEnv,
}

impl ImapApi {
    pub fn new(env: MapperEnv) -> Self {
        ImapApi { env }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path_and_query: &str) -> Result<T, MapperError> {
        let body = self.env.get_from_url(&self.env.endpoint(path_and_query))?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn query_string(query: &CatalogQuery) -> String {
    format!(
        "query?instrument={}&data_level={}&descriptor={}&start_date={}&end_date={}",
        query.instrument, query.data_level, query.descriptor, query.start_date, query.end_date
    )
}

impl Catalog for ImapApi {
    fn query(&self, query: &CatalogQuery) -> Result<Vec<CatalogFileRecord>, MapperError> {
        self.get_json(&query_string(query))
    }

    fn query_ancillary(&self, instrument: &str) -> Result<Vec<CatalogFileRecord>, MapperError> {
        self.get_json(&format!("query?table={ANCILLARY_TABLE}&instrument={instrument}"))
    }
}

impl KernelService for ImapApi {
    fn kernel_metadata(&self, category: KernelCategory) -> Result<Vec<KernelRecord>, MapperError> {
        self.get_json(&format!("spice-query?type={}&start_time=0", category.as_str()))
    }

    fn download(&self, file_name: &str) -> Result<Utf8PathBuf, MapperError> {
        let local_file = self.env.data_dir.join(file_name);
        let url = self.env.endpoint(&format!("download/{file_name}"));
        self.env.download_to(&url, &local_file)?;
        Ok(local_file)
    }
}
