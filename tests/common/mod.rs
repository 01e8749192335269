#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, fs};

use camino::{Utf8Path, Utf8PathBuf};
use hifitime::Epoch;
use mapper::{
    catalog::{
        Catalog, CatalogFileRecord, CatalogQuery, KernelCategory, KernelRecord, KernelService,
        Version,
    },
    constants::{DATA_TYPE_ATTR, DEPEND_0, EPOCH_VARIABLE},
    container::{Dataset, JsonContainer, ScienceContainer, Variable, VariableData},
    engine::{
        ComputeProducts, EngineFactory, EngineInvocation, ProcessingEngine, ResolvedInputs,
    },
    mapper_errors::{EngineError, MapperError},
    resources::{GenerationResources, KernelManifest, WorkingDirectory},
    time::{compact_date, TimeWindow},
};

/// Temporary directory holding the archive cache, the scratch root and the outputs.
pub struct Workspace {
    _dir: tempfile::TempDir,
    pub root: Utf8PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        for sub in ["kernels", "scratch", "output"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        Workspace { _dir: dir, root }
    }

    pub fn scratch(&self) -> Utf8PathBuf {
        self.root.join("scratch")
    }

    pub fn output(&self) -> Utf8PathBuf {
        self.root.join("output")
    }

    pub fn resources(&self) -> GenerationResources {
        GenerationResources::new(
            Box::new(KernelManifest::default()),
            WorkingDirectory::new(self.scratch()),
        )
    }
}

pub fn window(start: (i32, u8, u8), end: (i32, u8, u8)) -> TimeWindow {
    TimeWindow::new(
        Epoch::from_gregorian_utc_at_midnight(start.0, start.1, start.2),
        Epoch::from_gregorian_utc_at_midnight(end.0, end.1, end.2),
    )
    .unwrap()
}

/// Catalog answering every pointing set tag with one file per listed start date.
///
/// Kernel metadata holds an always valid leapseconds kernel plus the kernels
/// added with [`FakeArchive::with_kernel`].
pub struct FakeArchive {
    pub kernel_dir: Utf8PathBuf,
    pub pset_dates: Vec<String>,
    pub kernels: HashMap<KernelCategory, Vec<KernelRecord>>,
    pub queries: RefCell<Vec<CatalogQuery>>,
}

fn kernel_record(file_name: &str, min: &str, max: &str) -> KernelRecord {
    KernelRecord {
        file_name: file_name.into(),
        min_date_datetime: min.into(),
        max_date_datetime: max.into(),
    }
}

impl FakeArchive {
    pub fn new(workspace: &Workspace, pset_dates: &[&str]) -> Self {
        FakeArchive {
            kernel_dir: workspace.root.join("kernels"),
            pset_dates: pset_dates.iter().map(|d| d.to_string()).collect(),
            kernels: HashMap::from([(
                KernelCategory::Leapseconds,
                vec![kernel_record(
                    "imap/spice/lsk/naif0012.tls",
                    "2000-01-01, 00:00:00",
                    "2100-01-01, 00:00:00",
                )],
            )]),
            queries: RefCell::default(),
        }
    }

    /// Add a kernel valid over `[min, max]` (`YYYY-MM-DD, HH:MM:SS`).
    pub fn with_kernel(
        mut self,
        category: KernelCategory,
        file_name: &str,
        min: &str,
        max: &str,
    ) -> Self {
        self.kernels
            .entry(category)
            .or_default()
            .push(kernel_record(file_name, min, max));
        self
    }
}

impl Catalog for FakeArchive {
    fn query(&self, query: &CatalogQuery) -> Result<Vec<CatalogFileRecord>, MapperError> {
        self.queries.borrow_mut().push(query.clone());
        let start = query.start_date.to_string();
        let end = query.end_date.to_string();
        Ok(self
            .pset_dates
            .iter()
            .filter(|date| **date >= start && **date <= end)
            .map(|date| CatalogFileRecord {
                file_path: format!(
                    "imap/{0}/{1}/imap_{0}_{1}_{2}_{date}_v001.cdf",
                    query.instrument, query.data_level, query.descriptor
                )
                .into(),
                descriptor: query.descriptor.clone(),
                start_date: date.parse().unwrap(),
                version: Version(1),
            })
            .collect())
    }

    fn query_ancillary(&self, instrument: &str) -> Result<Vec<CatalogFileRecord>, MapperError> {
        Ok(vec![CatalogFileRecord {
            file_path: format!("imap/ancillary/imap_{instrument}_90sensor-cal_20240101_v001.cdf")
                .into(),
            descriptor: "90sensor-cal".into(),
            start_date: "20240101".parse().unwrap(),
            version: Version(1),
        }])
    }
}

impl KernelService for FakeArchive {
    fn kernel_metadata(&self, category: KernelCategory) -> Result<Vec<KernelRecord>, MapperError> {
        Ok(self.kernels.get(&category).cloned().unwrap_or_default())
    }

    fn download(&self, file_name: &str) -> Result<Utf8PathBuf, MapperError> {
        let path = self.kernel_dir.join(file_name);
        fs::write(&path, "kernel")?;
        Ok(path)
    }
}

/// Engine writing one map per invocation, with the epochs registered for its start date.
#[derive(Default)]
pub struct MapEngineFactory {
    pub epochs: HashMap<String, Vec<i64>>,
    pub fail_on: Option<String>,
    pub invocations: RefCell<Vec<EngineInvocation>>,
}

impl MapEngineFactory {
    pub fn descriptors(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(|i| i.descriptor.clone())
            .collect()
    }
}

impl EngineFactory for MapEngineFactory {
    fn create(&self, invocation: &EngineInvocation) -> Result<Box<dyn ProcessingEngine>, EngineError> {
        self.invocations.borrow_mut().push(invocation.clone());
        let start_date = compact_date(&invocation.window.start);
        Ok(Box::new(MapEngine {
            epochs: self
                .epochs
                .get(&start_date)
                .cloned()
                .unwrap_or_else(|| vec![0]),
            fail: self.fail_on.as_deref() == Some(invocation.descriptor.as_str()),
            invocation: invocation.clone(),
        }))
    }
}

struct MapEngine {
    invocation: EngineInvocation,
    epochs: Vec<i64>,
    fail: bool,
}

pub fn map_dataset(epochs: &[i64], data_type: &str) -> Dataset {
    let n = epochs.len();
    let mut dataset = Dataset::default();
    dataset
        .attributes
        .insert(DATA_TYPE_ATTR.into(), data_type.into());
    dataset
        .attributes
        .insert("Logical_source".into(), "engine_source".into());
    dataset.variables.insert(
        EPOCH_VARIABLE.into(),
        Variable::new(VariableData::I64(epochs.to_vec()), vec![n]),
    );
    dataset.variables.insert(
        "ena_intensity".into(),
        Variable::new(
            VariableData::F64(epochs.iter().flat_map(|e| [*e as f64, -(*e as f64)]).collect()),
            vec![n, 2],
        )
        .with_attribute(DEPEND_0, EPOCH_VARIABLE),
    );
    dataset.variables.insert(
        "latitude".into(),
        Variable::new(VariableData::F64(vec![-45.0, 45.0]), vec![2]),
    );
    dataset
}

impl ProcessingEngine for MapEngine {
    fn prepare_inputs(&mut self) -> Result<ResolvedInputs, EngineError> {
        Ok(Box::new(self.invocation.inputs.clone()))
    }

    fn compute(&mut self, _inputs: &ResolvedInputs) -> Result<ComputeProducts, EngineError> {
        if self.fail {
            return Err(format!("{} processing failed", self.invocation.data_level).into());
        }
        let level = self.invocation.data_level.to_string().to_uppercase();
        Ok(Box::new(map_dataset(
            &self.epochs,
            &format!("{level}_{}>Level-{} ENA map", self.invocation.descriptor, &level[1..]),
        )))
    }

    fn finalize(
        &mut self,
        products: ComputeProducts,
        _inputs: &ResolvedInputs,
    ) -> Result<Vec<Utf8PathBuf>, EngineError> {
        let dataset = products
            .downcast::<Dataset>()
            .map_err(|_| "unexpected products")?;
        let invocation = &self.invocation;
        let path = invocation.work_dir.join(format!(
            "imap_{}_{}_{}_{}_v000.cdf",
            invocation.instrument.name(),
            invocation.data_level,
            invocation.descriptor,
            invocation.start_date()
        ));
        JsonContainer
            .write(&path, &dataset)
            .map_err(|err| err.to_string())?;
        Ok(vec![path])
    }

    fn release_resources(&mut self) {}
}

pub fn read(path: &Utf8Path) -> Dataset {
    JsonContainer.read(path).unwrap()
}
