//! Integration tests for a full analysis cycle.
//!
//! These tests run the orchestrator against a fake WRF/WRFDA installation in
//! a temporary directory. Jobs go through a `ScriptedBackend` whose effects
//! write the files the real executables would produce, so staging and
//! promotion run for real while no model code does.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tempfile::TempDir;
use wrfcycle::bias::{BiasCorrector, BiasError};
use wrfcycle::config::{
    ConfigFile, BE_DAT_CV3, DA_NAMELIST_TEMPLATE, DA_UPDATE_BC_EXE, DA_WRFVAR_EXE, LANDUSE_TBL,
    OBSPROC_DIR, OBSPROC_EXE, OBSPROC_NAMELIST_TEMPLATE, WRF_EXE,
};
use wrfcycle::cycle::{
    Cycle, CycleOrchestrator, CycleOutcome, DomainId, PipelineStage, PromotionKind, StageFailure,
};
use wrfcycle::job::{JobBackend, JobError, JobHandle, JobOutcome, JobRequest, ScriptedBackend};
use wrfcycle::namelist::Namelist;
use wrfcycle::retry::{RelaxationTable, RetryState};
use wrfcycle::staging::DomainStaging;
use wrfcycle::time::model_time;

// =============================================================================
// Test Helpers
// =============================================================================

const OBS_FILE: &str = "little_r_2014030106";

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2014, 3, 1)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap()
}

fn cycle(domains: usize) -> Cycle {
    Cycle::new(start(), Duration::hours(3), domains).unwrap()
}

fn touch(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn forecast_namelist(domains: usize) -> String {
    let list = |v: &str| vec![v; domains].join(", ");
    format!(
        "&time_control\n run_hours = 6,\n/\n\
         &domains\n time_step = 60,\n max_dom = {domains},\n\
         e_we = {},\n e_sn = {},\n e_vert = {},\n dx = {},\n dy = {},\n\
         i_parent_start = {},\n j_parent_start = {},\n parent_id = {},\n\
         parent_time_step_ratio = {},\n/\n\
         &physics\n mp_physics = 8,\n cu_physics = {},\n/\n",
        list("100"),
        list("90"),
        list("40"),
        list("9000.0"),
        list("9000.0"),
        list("1"),
        list("1"),
        list("1"),
        list("3"),
        list("1"),
    )
}

/// A fake WRF/WRFDA installation, run directory and observation store.
struct Fixture {
    _temp: TempDir,
    config: ConfigFile,
}

impl Fixture {
    fn new(domains: usize) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let wrf = root.join("WRF");
        let wrfda = root.join("WRFDA");
        let run = root.join("run");
        let obs = root.join("obs");

        touch(&wrf.join(WRF_EXE), "");
        for table in [
            "DIR.txt",
            "HEIGHT.txt",
            "PRES.txt",
            "RH.txt",
            "TEMP.txt",
            "UV.txt",
            "obserr.txt",
        ] {
            touch(&wrfda.join(OBSPROC_DIR).join(table), "");
        }
        for exe in [OBSPROC_EXE, DA_WRFVAR_EXE, DA_UPDATE_BC_EXE, BE_DAT_CV3, LANDUSE_TBL] {
            touch(&wrfda.join(exe), "");
        }
        touch(
            &wrfda.join(OBSPROC_NAMELIST_TEMPLATE),
            "&record1\n obs_gts_filename = 'obs.2008020512',\n/\n\
             &record2\n time_analysis = '2008-02-05_12:00:00',\n/\n",
        );
        touch(
            &wrfda.join(DA_NAMELIST_TEMPLATE),
            "&wrfvar7\n cv_options = 3,\n/\n&domains\n e_we = 1,\n/\n",
        );

        touch(&run.join("namelist.input"), &forecast_namelist(domains));
        touch(&run.join("wrfbdy_d01"), "boundary");
        for d in 1..=domains {
            touch(&run.join(format!("wrfinput_d{d:02}")), &format!("first guess d{d:02}"));
        }
        touch(&obs.join(OBS_FILE), "observations");

        let mut config = ConfigFile::default();
        config.filesystem.wrf_dir = wrf;
        config.filesystem.wrfda_dir = wrfda;
        config.filesystem.wrf_run_dir = run;
        config.filesystem.work_dir = root.join("work");
        config.filesystem.obs_dir = obs;
        config.filesystem.obs_filename = OBS_FILE.to_string();
        config.logging.file = root.join("wrfcycle.log");
        config.cycle.domains = Some(domains);

        Self {
            _temp: temp,
            config,
        }
    }

    fn run_dir(&self) -> &Path {
        &self.config.filesystem.wrf_run_dir
    }

    fn wrfinput(&self, domain: usize) -> String {
        read(&self.run_dir().join(format!("wrfinput_d{domain:02}")))
    }
}

/// Backend whose jobs produce the files the real executables write.
fn backend() -> ScriptedBackend {
    backend_for(start())
}

fn backend_for(analysis: NaiveDateTime) -> ScriptedBackend {
    let obsproc_output = format!("obs_gts_{}.3DVAR", model_time(&analysis));
    let backend = ScriptedBackend::new();
    backend.on_run("obsproc.exe", move |request| {
        fs::write(request.workdir.join(&obsproc_output), "3dvar obs").unwrap();
    });
    backend.on_run("da_wrfvar.exe", |request| {
        let domain = request.workdir.file_name().unwrap().to_string_lossy().into_owned();
        fs::write(request.workdir.join("wrfvar_output"), format!("analysis {domain}")).unwrap();
    });
    backend
}

fn stage_names(backend: &ScriptedBackend) -> Vec<String> {
    backend.names()
}

/// Never reports completion for jobs of one executable.
struct StalledBackend {
    inner: ScriptedBackend,
    stalled: &'static str,
}

impl JobBackend for StalledBackend {
    async fn submit(
        &self,
        request: &JobRequest,
        depends_on: Option<&JobHandle>,
    ) -> Result<JobHandle, JobError> {
        self.inner.submit(request, depends_on).await
    }

    async fn await_completion(&self, handle: JobHandle) -> Result<JobOutcome, JobError> {
        if handle.name() == self.stalled {
            std::future::pending::<()>().await;
        }
        self.inner.await_completion(handle).await
    }
}

/// Fails for one domain and records every call.
struct FailingBiasCorrector {
    fail_for: DomainId,
    calls: Arc<AtomicUsize>,
}

impl BiasCorrector for FailingBiasCorrector {
    async fn correct(
        &self,
        domain: DomainId,
        _analysis_time: NaiveDateTime,
        _analysis_file: &Path,
    ) -> Result<(), BiasError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if domain == self.fail_for {
            return Err(BiasError::Failed {
                domain,
                status: Some(1),
                stderr: "no coefficients for this month".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Successful cycles
// =============================================================================

#[test]
fn test_fixture_config_is_valid() {
    let fixture = Fixture::new(2);
    fixture.config.validate().unwrap();
}

#[tokio::test]
async fn test_two_domains_complete_with_assimilation() {
    let fixture = Fixture::new(2);
    let backend = backend();

    let report = CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, Some(CycleOutcome::CompletedWithAssimilation));
    assert_eq!(report.promotions_of(PromotionKind::InitialConditions).count(), 2);
    assert_eq!(report.promotions_of(PromotionKind::LateralBoundary).count(), 1);
    assert_eq!(
        report
            .promotions_of(PromotionKind::FallbackInitialConditions)
            .count(),
        0
    );

    assert_eq!(fixture.wrfinput(1), "analysis d01");
    assert_eq!(fixture.wrfinput(2), "analysis d02");
    assert_eq!(read(&fixture.run_dir().join("wrffg_d02")), "first guess d02");
    assert_eq!(read(&fixture.run_dir().join("wrfbdy_d01")), "boundary");

    assert_eq!(
        stage_names(&backend),
        vec![
            "obsproc.exe",
            "da_update_bc.exe",
            "da_update_bc.exe",
            "da_wrfvar.exe",
            "da_wrfvar.exe",
            "da_update_bc.exe",
            "wrf.exe",
        ]
    );
}

#[tokio::test]
async fn test_assimilation_runs_once_per_domain_and_lateral_once() {
    let fixture = Fixture::new(3);
    let backend = backend();

    let report = CycleOrchestrator::new(&fixture.config, cycle(3), &backend)
        .run_analysis()
        .await
        .unwrap();

    let wrfvar: Vec<_> = report
        .runs_of(PipelineStage::VariationalAssimilation)
        .map(|r| r.domain.unwrap().get())
        .collect();
    assert_eq!(wrfvar, vec![1, 2, 3]);

    let lateral: Vec<_> = report
        .runs_of(PipelineStage::BoundaryUpdateLateral)
        .map(|r| r.domain)
        .collect();
    assert_eq!(lateral, vec![Some(DomainId::OUTER)]);
    assert_eq!(report.runs_of(PipelineStage::ForecastIntegration).count(), 0);
}

#[tokio::test]
async fn test_assimilation_diagnostics_move_to_run_dir() {
    let fixture = Fixture::new(1);
    let backend = backend();
    backend.on_run("da_wrfvar.exe", |request| {
        fs::write(request.workdir.join("wrfvar_output"), "analysis d01").unwrap();
        fs::write(request.workdir.join("rsl.out.0000"), "minimisation log").unwrap();
    });

    CycleOrchestrator::new(&fixture.config, cycle(1), &backend)
        .run_analysis()
        .await
        .unwrap();

    let kept = fixture
        .run_dir()
        .join(format!("wrfda_rsl_out_{}", model_time(&start())));
    assert_eq!(read(&kept), "minimisation log");
    let staging = DomainStaging::new(&fixture.config, &cycle(1));
    assert!(!staging
        .layout()
        .wrfda_dir(DomainId::OUTER)
        .join("rsl.out.0000")
        .exists());
}

#[tokio::test]
async fn test_assimilation_namelist_is_synced_per_domain() {
    let fixture = Fixture::new(2);
    let backend = backend();

    CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .run_analysis()
        .await
        .unwrap();

    let staging = DomainStaging::new(&fixture.config, &cycle(2));
    let d02 = staging.layout().wrfda_dir(DomainId::new(2).unwrap());
    let da = Namelist::read(&d02.join("namelist.input")).unwrap();
    assert_eq!(da.get_int("domains", "e_we").unwrap(), 100);
    assert_eq!(da.get_int("physics", "mp_physics").unwrap(), 8);
    assert_eq!(da.get_int("wrfvar7", "cv_options").unwrap(), 3);

    let control = Namelist::read(&d02.join("da_control.nml")).unwrap();
    assert_eq!(control.get_int("da_control", "parent_id").unwrap(), 1);
}

#[test]
fn test_prepare_twice_yields_same_directory() {
    let fixture = Fixture::new(1);
    let staging = DomainStaging::new(&fixture.config, &cycle(1));
    let domain = DomainId::OUTER;

    let listing = |dir: &Path| {
        let mut entries: Vec<(String, Vec<u8>)> = fs::read_dir(dir)
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path();
                let content = fs::read(&path).unwrap_or_default();
                (path.file_name().unwrap().to_string_lossy().into_owned(), content)
            })
            .collect();
        entries.sort();
        entries
    };

    let first = staging
        .prepare(domain, PipelineStage::BoundaryUpdateLower)
        .unwrap();
    let before = listing(&first);
    let second = staging
        .prepare(domain, PipelineStage::BoundaryUpdateLower)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(before, listing(&second));

    let obsproc = staging
        .prepare(domain, PipelineStage::ObservationPreprocess)
        .unwrap();
    let before = listing(&obsproc);
    staging
        .prepare(domain, PipelineStage::ObservationPreprocess)
        .unwrap();
    assert_eq!(before, listing(&obsproc));
}

// =============================================================================
// Failures during the analysis
// =============================================================================

#[tokio::test]
async fn test_failed_assimilation_aborts_before_promotion() {
    let fixture = Fixture::new(2);
    let backend = backend();
    backend.outcomes("da_wrfvar.exe", [JobOutcome::Succeeded, JobOutcome::Failed]);

    let err = CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::VariationalAssimilation);
    assert_eq!(err.domain, DomainId::new(2));
    assert!(matches!(err.kind, StageFailure::JobFailed));
    assert!(err.workdir.ends_with("wrfda/d02"));

    assert_eq!(backend.count("wrf.exe"), 0);
    assert_eq!(fixture.wrfinput(1), "first guess d01");
    assert_eq!(fixture.wrfinput(2), "first guess d02");
}

#[tokio::test]
async fn test_missing_observations_fail_before_submission() {
    let fixture = Fixture::new(1);
    fs::remove_file(fixture.config.filesystem.obs_dir.join(OBS_FILE)).unwrap();
    let backend = backend();

    let err = CycleOrchestrator::new(&fixture.config, cycle(1), &backend)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::ObservationPreprocess);
    assert!(matches!(err.kind, StageFailure::Staging(_)));
    assert!(backend.submissions().is_empty());
}

#[tokio::test]
async fn test_bias_correction_failure_is_not_fatal() {
    let fixture = Fixture::new(2);
    let backend = backend();
    let calls = Arc::new(AtomicUsize::new(0));

    let report = CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .with_bias_corrector(FailingBiasCorrector {
            fail_for: DomainId::new(2).unwrap(),
            calls: Arc::clone(&calls),
        })
        .run()
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("d02"));
    assert_eq!(report.outcome, Some(CycleOutcome::CompletedWithAssimilation));
    assert_eq!(fixture.wrfinput(2), "analysis d02");
}

// =============================================================================
// Dependency chaining and low-only mode
// =============================================================================

#[tokio::test]
async fn test_chained_mode_declares_dependencies() {
    let mut fixture = Fixture::new(2);
    fixture.config.cycle.chain_domains = true;
    let backend = backend();

    let report = CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .run_analysis()
        .await
        .unwrap();

    let submissions = backend.submissions();
    let names: Vec<_> = submissions.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "obsproc.exe",
            "da_update_bc.exe",
            "da_wrfvar.exe",
            "da_update_bc.exe",
            "da_wrfvar.exe",
            "da_update_bc.exe",
        ]
    );
    assert_eq!(submissions[2].depends_on, Some(submissions[1].id));
    assert_eq!(submissions[4].depends_on, Some(submissions[3].id));
    assert_eq!(submissions[1].depends_on, None);

    assert_eq!(report.promotions_of(PromotionKind::PreservedFirstGuess).count(), 2);
    assert_eq!(fixture.wrfinput(2), "analysis d02");
}

#[tokio::test]
async fn test_chained_failure_skips_dependent_assimilation() {
    let mut fixture = Fixture::new(1);
    fixture.config.cycle.chain_domains = true;
    let backend = backend();
    backend.fail_next("da_update_bc.exe");

    let err = CycleOrchestrator::new(&fixture.config, cycle(1), &backend)
        .run_analysis()
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::BoundaryUpdateLower);
    assert_eq!(err.domain, Some(DomainId::OUTER));
    let staging = DomainStaging::new(&fixture.config, &cycle(1));
    assert!(!staging
        .layout()
        .wrfda_dir(DomainId::OUTER)
        .join("wrfvar_output")
        .exists());
}

#[tokio::test]
async fn test_chained_failure_waits_for_every_submitted_job() {
    let mut fixture = Fixture::new(2);
    fixture.config.cycle.chain_domains = true;
    let backend = backend();
    backend.fail_next("da_update_bc.exe");

    let err = CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .run_analysis()
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::BoundaryUpdateLower);
    assert_eq!(err.domain, Some(DomainId::OUTER));

    let mut submitted: Vec<u64> = backend.submissions().iter().map(|s| s.id.value()).collect();
    let mut awaited: Vec<u64> = backend.awaited().iter().map(|id| id.value()).collect();
    submitted.sort_unstable();
    awaited.sort_unstable();
    assert_eq!(submitted.len(), 5);
    assert_eq!(awaited, submitted);
    assert_eq!(backend.count("da_update_bc.exe"), 2);
}

#[tokio::test]
async fn test_low_only_promotes_first_guess() {
    let fixture = Fixture::new(2);
    let backend = backend();

    let report = CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .low_only(true)
        .run()
        .await
        .unwrap();

    assert_eq!(
        stage_names(&backend),
        vec!["da_update_bc.exe", "da_update_bc.exe", "wrf.exe"]
    );
    assert_eq!(report.outcome, Some(CycleOutcome::CompletedWithoutAssimilation));
    assert_eq!(fixture.wrfinput(1), "first guess d01");
    assert_eq!(fixture.wrfinput(2), "first guess d02");
    assert_eq!(report.promotions_of(PromotionKind::LateralBoundary).count(), 0);
}

// =============================================================================
// Forecast retries and fallback
// =============================================================================

#[tokio::test]
async fn test_fallback_after_relaxation_table_is_exhausted() {
    let mut fixture = Fixture::new(1);
    fixture.config.retry.table =
        RelaxationTable::from_columns(&[10, 8], &[vec![1, 5], vec![1, 4]]).unwrap();
    let backend = backend();
    backend.outcomes(
        "wrf.exe",
        [
            JobOutcome::Failed,
            JobOutcome::Failed,
            JobOutcome::Failed,
            JobOutcome::Succeeded,
        ],
    );

    let report = CycleOrchestrator::new(&fixture.config, cycle(1), &backend)
        .run()
        .await
        .unwrap();

    let states: Vec<_> = report
        .runs_of(PipelineStage::ForecastIntegration)
        .map(|r| r.retry.unwrap())
        .collect();
    assert_eq!(
        states,
        vec![
            RetryState::Attempt(0),
            RetryState::Attempt(1),
            RetryState::Attempt(2),
            RetryState::Fallback,
        ]
    );
    assert_eq!(report.outcome, Some(CycleOutcome::CompletedWithoutAssimilation));
    assert_eq!(fixture.wrfinput(1), "first guess d01");
    assert_eq!(
        report
            .promotions_of(PromotionKind::FallbackInitialConditions)
            .count(),
        1
    );

    let forecast = Namelist::read(&fixture.run_dir().join("namelist.input")).unwrap();
    assert_eq!(forecast.get_int("domains", "time_step").unwrap(), 8);
    assert!(fixture.run_dir().join("namelist.input.bak").exists());
}

#[tokio::test]
async fn test_every_domain_falls_back_to_its_first_guess() {
    let fixture = Fixture::new(2);
    let table_len = fixture.config.retry.table.len();
    let backend = backend();
    backend.outcomes(
        "wrf.exe",
        std::iter::repeat(JobOutcome::Failed).take(table_len + 1),
    );

    let report = CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .run()
        .await
        .unwrap();

    let fallbacks = report
        .runs_of(PipelineStage::ForecastIntegration)
        .filter(|r| r.retry == Some(RetryState::Fallback))
        .count();
    assert_eq!(fallbacks, 1);
    assert_eq!(backend.count("wrf.exe"), table_len + 2);
    for d in 1..=2 {
        let preserved = read(&fixture.run_dir().join(format!("wrffg_d{d:02}")));
        assert_eq!(fixture.wrfinput(d), preserved);
    }
}

#[tokio::test]
async fn test_failed_fallback_is_terminal() {
    let mut fixture = Fixture::new(1);
    fixture.config.retry.table = RelaxationTable::from_columns(&[10], &[vec![1, 5]]).unwrap();
    let backend = backend();
    backend.outcomes("wrf.exe", [JobOutcome::Failed; 3]);

    let err = CycleOrchestrator::new(&fixture.config, cycle(1), &backend)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::ForecastIntegration);
    assert!(matches!(
        err.kind,
        StageFailure::RetriesExhausted { attempts: 3 }
    ));
    assert_eq!(backend.count("wrf.exe"), 3);
    assert_eq!(fixture.wrfinput(1), "first guess d01");
}

#[tokio::test]
async fn test_success_without_completion_marker_is_retried() {
    let fixture = Fixture::new(1);
    let backend = backend();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    backend.on_run("wrf.exe", move |request| {
        let log = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            "-------------- FATAL CALLED ---------------\n"
        } else {
            "d01 2014-03-01_09:00:00 wrf: SUCCESS COMPLETE WRF\n"
        };
        fs::write(request.workdir.join("rsl.error.0000"), log).unwrap();
    });

    let report = CycleOrchestrator::new(&fixture.config, cycle(1), &backend)
        .run()
        .await
        .unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    let last = report
        .runs_of(PipelineStage::ForecastIntegration)
        .last()
        .unwrap();
    assert_eq!(last.retry, Some(RetryState::Attempt(1)));
    assert_eq!(report.outcome, Some(CycleOutcome::CompletedWithAssimilation));
}

#[tokio::test]
async fn test_forecast_namelist_covers_the_cycle() {
    let fixture = Fixture::new(2);
    let backend = backend();

    CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .run()
        .await
        .unwrap();

    let forecast = Namelist::read(&fixture.run_dir().join("namelist.input")).unwrap();
    assert_eq!(forecast.get_int("time_control", "run_hours").unwrap(), 3);
    assert_eq!(forecast.get_int("time_control", "start_hour").unwrap(), 6);
    assert_eq!(forecast.get_int("time_control", "end_hour").unwrap(), 9);
    assert!(fixture.run_dir().join("wrf.exe").exists());

    let link: PathBuf = fs::read_link(fixture.run_dir().join("wrf.exe")).unwrap();
    assert!(link.ends_with(WRF_EXE));
}

#[tokio::test]
async fn test_relaxation_does_not_leak_into_next_cycle() {
    let fixture = Fixture::new(1);
    let first = backend();
    first.outcomes("wrf.exe", [JobOutcome::Failed, JobOutcome::Succeeded]);

    let report = CycleOrchestrator::new(&fixture.config, cycle(1), &first)
        .run()
        .await
        .unwrap();
    let last = report
        .runs_of(PipelineStage::ForecastIntegration)
        .last()
        .unwrap();
    assert_eq!(last.retry, Some(RetryState::Attempt(1)));
    let relaxed = Namelist::read(&fixture.run_dir().join("namelist.input")).unwrap();
    assert_eq!(relaxed.get_int("domains", "time_step").unwrap(), 10);

    let next_start = start() + Duration::hours(3);
    let next = Cycle::new(next_start, Duration::hours(3), 1).unwrap();
    let second = backend_for(next_start);
    let report = CycleOrchestrator::new(&fixture.config, next, &second)
        .run()
        .await
        .unwrap();

    let states: Vec<_> = report
        .runs_of(PipelineStage::ForecastIntegration)
        .map(|r| r.retry.unwrap())
        .collect();
    assert_eq!(states, vec![RetryState::Attempt(0)]);
    let forecast = Namelist::read(&fixture.run_dir().join("namelist.input")).unwrap();
    assert_eq!(forecast.get_int("domains", "time_step").unwrap(), 60);
    assert_eq!(forecast.get_int("time_control", "start_hour").unwrap(), 9);
    let template = Namelist::read(&fixture.run_dir().join("namelist.input.template")).unwrap();
    assert_eq!(template.get_int("domains", "time_step").unwrap(), 60);
}

// =============================================================================
// Stage timeouts
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_forecast_timeout_aborts_without_retrying() {
    let mut fixture = Fixture::new(1);
    fixture.config.cycle.stage_timeout_secs = Some(600);
    let backend = StalledBackend {
        inner: backend(),
        stalled: "wrf.exe",
    };

    let err = CycleOrchestrator::new(&fixture.config, cycle(1), &backend)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::ForecastIntegration);
    assert!(matches!(
        err.kind,
        StageFailure::TimedOut(limit) if limit == std::time::Duration::from_secs(600)
    ));
    assert_eq!(backend.inner.count("wrf.exe"), 1);
    assert!(!fixture.run_dir().join("namelist.input.bak").exists());
    assert_eq!(fixture.wrfinput(1), "analysis d01");
}

#[tokio::test(start_paused = true)]
async fn test_stalled_assimilation_times_out() {
    let mut fixture = Fixture::new(2);
    fixture.config.cycle.stage_timeout_secs = Some(60);
    let backend = StalledBackend {
        inner: backend(),
        stalled: "da_wrfvar.exe",
    };

    let err = CycleOrchestrator::new(&fixture.config, cycle(2), &backend)
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::VariationalAssimilation);
    assert_eq!(err.domain, Some(DomainId::OUTER));
    assert!(matches!(err.kind, StageFailure::TimedOut(_)));
    assert_eq!(backend.inner.count("da_wrfvar.exe"), 1);
    assert_eq!(backend.inner.count("wrf.exe"), 0);
    assert_eq!(fixture.wrfinput(1), "first guess d01");
}
