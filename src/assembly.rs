//! # Map assembly
//!
//! [`MapAssembler::generate`] produces the artifact of one descriptor over one
//! window, recursing through the dependency graph of Tier-3 maps.
//!
//! ## Overview
//!
//! | Tier | Inputs | Engine output directory |
//! |---|---|---|
//! | L2 | pointing sets, ancillary files, kernels | `<scratch>/imap/<instrument>/l2` |
//! | L3 | pointing sets, ancillary files, kernels, dependency artifacts | `<scratch>/imap/<instrument>/l3` |
//! | Not applicable | none, always an error | |
//!
//! For every map the assembler
//!
//! 1. collects the inputs ([`crate::collector::InputCollector`]),
//! 2. empties the kernel pool, downloads the kernels selected for the window and
//!    loads them in category order, then the optional custom kernel,
//! 3. redirects the working directory to the level scratch for the duration of
//!    the engine call,
//! 4. runs the engine ([`crate::engine::run_engine`]) and requires exactly one
//!    artifact.
//!
//! Engine failures are wrapped in [`MapperError::Engine`] carrying the descriptor
//! of the map being generated, so that a failure deep in the recursion names the
//! sub-map that caused it.
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{error, info};

use crate::{
    catalog::{Catalog, KernelService},
    collector::InputCollector,
    descriptor::{
        dependencies::{dependencies_of, tier_of, DataLevel},
        MapDescriptor,
    },
    engine::{run_engine, EngineFactory, EngineInvocation, InputManifest},
    mapper_errors::{EngineError, MapperError},
    resources::GenerationResources,
    time::TimeWindow,
};

pub struct MapAssembler<'a> {
    collector: InputCollector<'a>,
    kernel_service: &'a dyn KernelService,
    engines: &'a dyn EngineFactory,
    custom_kernel: Option<Utf8PathBuf>,
}

impl<'a> MapAssembler<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        kernel_service: &'a dyn KernelService,
        engines: &'a dyn EngineFactory,
    ) -> Self {
        MapAssembler {
            collector: InputCollector::new(catalog, kernel_service),
            kernel_service,
            engines,
            custom_kernel: None,
        }
    }

    /// Load `path` after the catalog kernels of every map.
    pub fn with_custom_kernel(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.custom_kernel = path;
        self
    }

    /// Generate the artifact of `descriptor` over `window`.
    ///
    /// Arguments
    /// -----------------
    /// * `descriptor`: the map to produce
    /// * `window`: time range of the map
    /// * `resources`: kernel pool and working directory used by the engines
    ///
    /// Return
    /// ----------
    /// * The path of the single artifact returned by the engine.
    ///
    /// Errors
    /// ----------
    /// * [`MapperError::UnsupportedInstrument`] for descriptors with no processing tier
    /// * [`MapperError::NoInputs`] when a Tier-2 map has no pointing set in `window`
    /// * [`MapperError::EngineContract`] when the engine returns zero or several artifacts
    /// * [`MapperError::Engine`] when the engine itself fails
    /// * catalog errors, unchanged
    pub fn generate(
        &self,
        descriptor: &MapDescriptor,
        window: &TimeWindow,
        resources: &mut GenerationResources,
    ) -> Result<Utf8PathBuf, MapperError> {
        match tier_of(descriptor) {
            DataLevel::NotApplicable => Err(MapperError::UnsupportedInstrument(
                descriptor.instrument_descriptor().to_string(),
            )),
            DataLevel::L2 => {
                let inputs = self.collect_inputs(descriptor, window)?;
                if inputs.science.is_empty() {
                    let err = MapperError::NoInputs {
                        descriptor: descriptor.to_string(),
                        window: window.to_string(),
                    };
                    error!("{err}");
                    return Err(err);
                }
                self.invoke(descriptor, DataLevel::L2, window, inputs, resources)
            }
            DataLevel::L3 => {
                let mut maps = Vec::new();
                for dependency in dependencies_of(descriptor) {
                    maps.push(self.generate(&dependency, window, resources)?);
                }
                let mut inputs = self.collect_inputs(descriptor, window)?;
                inputs.maps = maps;
                self.invoke(descriptor, DataLevel::L3, window, inputs, resources)
            }
        }
    }

    fn collect_inputs(
        &self,
        descriptor: &MapDescriptor,
        window: &TimeWindow,
    ) -> Result<InputManifest, MapperError> {
        Ok(InputManifest {
            spice: self.collector.kernel_windows(&window.start, &window.end)?,
            science: self.collector.pointing_inputs(descriptor, window)?,
            ancillary: self.collector.ancillary_inputs(descriptor, &window.end)?,
            maps: Vec::new(),
        })
    }

    fn load_kernels(
        &self,
        kernels: &[String],
        resources: &mut GenerationResources,
    ) -> Result<(), MapperError> {
        resources.kernel_pool.clear();
        for name in kernels {
            let local = self.kernel_service.download(name)?;
            resources.kernel_pool.load(&local)?;
        }
        if let Some(custom) = &self.custom_kernel {
            resources.kernel_pool.load(custom)?;
        }
        Ok(())
    }

    fn invoke(
        &self,
        descriptor: &MapDescriptor,
        level: DataLevel,
        window: &TimeWindow,
        inputs: InputManifest,
        resources: &mut GenerationResources,
    ) -> Result<Utf8PathBuf, MapperError> {
        info!("Generating map: {descriptor} {window}");
        for file in inputs.science.iter().chain(&inputs.ancillary) {
            info!("  {file}");
        }
        for map in &inputs.maps {
            info!("  {}", artifact_name(map));
        }

        self.load_kernels(&inputs.spice, resources)?;
        let kernels = resources.kernel_pool.loaded().to_vec();
        let redirection = resources
            .working_directory
            .redirect(descriptor.instrument(), level)?;

        let invocation = EngineInvocation {
            instrument: descriptor.instrument(),
            data_level: level,
            descriptor: descriptor.to_map_descriptor_string(),
            window: *window,
            inputs,
            work_dir: redirection.path().to_path_buf(),
            kernels,
        };

        let wrap = |source: EngineError| MapperError::Engine {
            descriptor: descriptor.to_string(),
            source,
        };
        let mut engine = self.engines.create(&invocation).map_err(wrap)?;
        let mut artifacts = run_engine(engine.as_mut()).map_err(wrap)?;
        drop(redirection);

        match artifacts.len() {
            1 => Ok(artifacts.remove(0)),
            count => {
                let level = level.token().unwrap_or_default();
                Err(MapperError::EngineContract {
                    descriptor: descriptor.to_string(),
                    level,
                    count,
                })
            }
        }
    }
}

/// Artifact file name, for log messages.
pub(crate) fn artifact_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

#[cfg(test)]
mod assembly_test {
    use std::{cell::RefCell, collections::HashMap, fs, rc::Rc};

    use camino::Utf8PathBuf;
    use hifitime::Epoch;

    use super::*;
    use crate::{
        catalog::{CatalogFileRecord, CatalogQuery, KernelCategory, KernelRecord, Version},
        engine::{ComputeProducts, ProcessingEngine, ResolvedInputs},
        resources::{KernelManifest, WorkingDirectory},
    };

    struct FakeArchive {
        root: Utf8PathBuf,
        psets: HashMap<String, Vec<CatalogFileRecord>>,
    }

    impl Catalog for FakeArchive {
        fn query(&self, query: &CatalogQuery) -> Result<Vec<CatalogFileRecord>, MapperError> {
            Ok(self.psets.get(&query.descriptor).cloned().unwrap_or_default())
        }

        fn query_ancillary(&self, _: &str) -> Result<Vec<CatalogFileRecord>, MapperError> {
            Ok(Vec::new())
        }
    }

    impl KernelService for FakeArchive {
        fn kernel_metadata(
            &self,
            category: KernelCategory,
        ) -> Result<Vec<KernelRecord>, MapperError> {
            Ok(match category {
                KernelCategory::Leapseconds => vec![KernelRecord {
                    file_name: "naif0012.tls".into(),
                    min_date_datetime: "2000-01-01, 00:00:00".into(),
                    max_date_datetime: "2100-01-01, 00:00:00".into(),
                }],
                _ => Vec::new(),
            })
        }

        fn download(&self, file_name: &str) -> Result<Utf8PathBuf, MapperError> {
            let path = self.root.join(file_name);
            fs::write(&path, "")?;
            Ok(path)
        }
    }

    /// Records invocations; writes `outputs` artifacts named after the descriptor.
    struct RecordingFactory {
        outputs: usize,
        fail_on: Option<&'static str>,
        invocations: Rc<RefCell<Vec<EngineInvocation>>>,
    }

    struct RecordingEngine {
        invocation: EngineInvocation,
        outputs: usize,
        fail: bool,
    }

    impl ProcessingEngine for RecordingEngine {
        fn prepare_inputs(&mut self) -> Result<ResolvedInputs, EngineError> {
            Ok(Box::new(()))
        }

        fn compute(&mut self, _: &ResolvedInputs) -> Result<ComputeProducts, EngineError> {
            if self.fail {
                return Err("L2 processing failed".into());
            }
            Ok(Box::new(()))
        }

        fn finalize(
            &mut self,
            _: ComputeProducts,
            _: &ResolvedInputs,
        ) -> Result<Vec<Utf8PathBuf>, EngineError> {
            (0..self.outputs)
                .map(|i| {
                    let path = self
                        .invocation
                        .work_dir
                        .join(format!("{}_{i}.cdf", self.invocation.descriptor));
                    fs::write(&path, "")?;
                    Ok(path)
                })
                .collect()
        }

        fn release_resources(&mut self) {}
    }

    impl EngineFactory for RecordingFactory {
        fn create(
            &self,
            invocation: &EngineInvocation,
        ) -> Result<Box<dyn ProcessingEngine>, EngineError> {
            self.invocations.borrow_mut().push(invocation.clone());
            Ok(Box::new(RecordingEngine {
                invocation: invocation.clone(),
                outputs: self.outputs,
                fail: self.fail_on == Some(invocation.descriptor.as_str()),
            }))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        root: Utf8PathBuf,
        archive: FakeArchive,
        factory: RecordingFactory,
    }

    impl Fixture {
        fn new(outputs: usize) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
            let mut psets = HashMap::new();
            for tag in ["45sensor-pset", "90sensor-pset"] {
                psets.insert(
                    tag.to_string(),
                    vec![CatalogFileRecord {
                        file_path: format!("imap/hi/l1c/imap_hi_l1c_{tag}_20250101_v001.cdf").into(),
                        descriptor: tag.to_string(),
                        start_date: "20250101".parse().unwrap(),
                        version: Version(1),
                    }],
                );
            }
            Fixture {
                archive: FakeArchive {
                    root: root.clone(),
                    psets,
                },
                factory: RecordingFactory {
                    outputs,
                    fail_on: None,
                    invocations: Rc::default(),
                },
                root,
                _dir: dir,
            }
        }

        fn resources(&self) -> GenerationResources {
            GenerationResources::new(
                Box::new(KernelManifest::default()),
                WorkingDirectory::new(self.root.join("scratch")),
            )
        }

        fn assembler(&self) -> MapAssembler<'_> {
            MapAssembler::new(&self.archive, &self.archive, &self.factory)
        }
    }

    fn window() -> TimeWindow {
        TimeWindow::new(
            Epoch::from_gregorian_utc_at_midnight(2025, 1, 1),
            Epoch::from_gregorian_utc_at_midnight(2025, 4, 2),
        )
        .unwrap()
    }

    fn parse(s: &str) -> MapDescriptor {
        s.parse().unwrap()
    }

    #[test]
    fn test_l2_invocation() {
        let fixture = Fixture::new(1);
        let mut resources = fixture.resources();
        let artifact = fixture
            .assembler()
            .generate(&parse("h90-enaX-h-sf-nsp-ram-hae-4deg-3mo"), &window(), &mut resources)
            .unwrap();
        assert_eq!(
            artifact,
            fixture
                .root
                .join("scratch/imap/hi/l2/h90-ena-h-sf-nsp-ram-hae-4deg-3mo_0.cdf")
        );

        let invocations = fixture.factory.invocations.borrow();
        assert_eq!(invocations.len(), 1);
        let invocation = &invocations[0];
        assert_eq!(invocation.data_level, DataLevel::L2);
        assert_eq!(
            invocation.inputs.science,
            vec!["imap_hi_l1c_90sensor-pset_20250101_v001.cdf"]
        );
        assert_eq!(invocation.inputs.spice, vec!["naif0012.tls"]);
        assert_eq!(invocation.kernels, vec![fixture.root.join("naif0012.tls")]);
        assert_eq!(invocation.start_date(), "20250101");

        // redirection released after the call
        assert_eq!(resources.working_directory.current(), fixture.root.join("scratch"));
    }

    #[test]
    fn test_l3_recursion_order() {
        let fixture = Fixture::new(1);
        let mut resources = fixture.resources();
        let artifact = fixture
            .assembler()
            .generate(&parse("hic-ena-h-sf-sp-full-hae-4deg-3mo"), &window(), &mut resources)
            .unwrap();
        assert!(artifact.starts_with(fixture.root.join("scratch/imap/hi/l3")));

        let invocations = fixture.factory.invocations.borrow();
        let descriptors: Vec<&str> = invocations.iter().map(|i| i.descriptor.as_str()).collect();
        assert_eq!(
            descriptors,
            vec![
                "h90-ena-h-sf-nsp-ram-hae-4deg-3mo",
                "h90-ena-h-sf-nsp-anti-hae-4deg-3mo",
                "h90-ena-h-sf-sp-full-hae-4deg-3mo",
                "h45-ena-h-sf-nsp-ram-hae-4deg-3mo",
                "h45-ena-h-sf-nsp-anti-hae-4deg-3mo",
                "h45-ena-h-sf-sp-full-hae-4deg-3mo",
                "hic-ena-h-sf-sp-full-hae-4deg-3mo",
            ]
        );

        let top = &invocations[6];
        assert_eq!(top.data_level, DataLevel::L3);
        assert_eq!(top.inputs.maps.len(), 2);
        assert!(top.inputs.maps[0].as_str().ends_with("h90-ena-h-sf-sp-full-hae-4deg-3mo_0.cdf"));
        assert!(top.inputs.maps[1].as_str().ends_with("h45-ena-h-sf-sp-full-hae-4deg-3mo_0.cdf"));
    }

    #[test]
    fn test_unsupported_instrument() {
        let fixture = Fixture::new(1);
        let err = fixture
            .assembler()
            .generate(&parse("glx-ena-h-sf-nsp-ram-hae-4deg-3mo"), &window(), &mut fixture.resources())
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot produce map for instrument: glx");
        assert!(fixture.factory.invocations.borrow().is_empty());
    }

    #[test]
    fn test_no_pointing_sets() {
        let fixture = Fixture::new(1);
        let err = fixture
            .assembler()
            .generate(&parse("ilo-ena-h-sf-nsp-ram-hae-4deg-3mo"), &window(), &mut fixture.resources())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No pointing sets found for ilo-ena-h-sf-nsp-ram-hae-4deg-3mo 2025-01-01 to 2025-04-02"
        );
        assert!(fixture.factory.invocations.borrow().is_empty());
    }

    #[test]
    fn test_artifact_count_contract() {
        for (outputs, message) in [
            (0, "L2 processing did not return any files!"),
            (2, "L2 processing returned too many files! (2 files)"),
        ] {
            let fixture = Fixture::new(outputs);
            let err = fixture
                .assembler()
                .generate(&parse("h45-ena-h-sf-nsp-ram-hae-4deg-3mo"), &window(), &mut fixture.resources())
                .unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn test_engine_failure_names_the_sub_map() {
        let mut fixture = Fixture::new(1);
        fixture.factory.fail_on = Some("h45-ena-h-sf-nsp-anti-hae-4deg-3mo");
        let mut resources = fixture.resources();
        let err = fixture
            .assembler()
            .generate(&parse("h45-ena-h-sf-sp-full-hae-4deg-3mo"), &window(), &mut resources)
            .unwrap_err();
        assert_eq!(
            err.report(),
            "Processing for h45-ena-h-sf-nsp-anti-hae-4deg-3mo failed\n  caused by: L2 processing failed"
        );
        assert_eq!(resources.working_directory.current(), fixture.root.join("scratch"));
    }

    #[test]
    fn test_custom_kernel_loaded_last() {
        let fixture = Fixture::new(1);
        let custom = fixture.root.join("imap_custom.tf");
        fs::write(&custom, "").unwrap();
        let mut resources = fixture.resources();
        fixture
            .assembler()
            .with_custom_kernel(Some(custom.clone()))
            .generate(&parse("h90-ena-h-sf-nsp-ram-hae-4deg-3mo"), &window(), &mut resources)
            .unwrap();
        assert_eq!(
            resources.kernel_pool.loaded(),
            &[fixture.root.join("naif0012.tls"), custom]
        );
    }
}
