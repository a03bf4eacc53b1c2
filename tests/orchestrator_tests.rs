//! End-to-end provisioning runs against a fake host and an in-memory store.
//!
//! Covers the full happy path, fail-fast aborts in every phase that can
//! fail, operator cancellation, and re-running over an existing install.

mod common;

use common::FakeHost;
use sensor_provision::config::{ScriptedSource, Settings};
use sensor_provision::error::{ConfigError, ProvisionError};
use sensor_provision::models::ArtifactKind;
use sensor_provision::orchestrator::ProvisionPhase;
use sensor_provision::{ArtifactStore, ConnectivityProbe, MemoryStore, Orchestrator};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const HAPPY_ANSWERS: [&str; 6] = ["NATIONAL_1", "", "", "x", "", "y"];

fn orchestrator(host: Arc<FakeHost>, store: Arc<MemoryStore>) -> Orchestrator {
    Orchestrator::new(Settings::default(), host, store)
        .with_probe(ConnectivityProbe::new(3306, Duration::from_millis(300)))
}

#[tokio::test]
async fn test_end_to_end_defaults_scenario() {
    let host = Arc::new(FakeHost::new().with_present(&["/dev/spidev0.0", "/dev/i2c-1"]));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(host.clone(), store.clone());
    let mut source = ScriptedSource::new(HAPPY_ANSWERS);

    let started = Instant::now();
    let report = orch.run(&mut source).await.expect("provisioning should succeed");

    // Collected configuration, password redacted in the report
    assert_eq!(report.config.device_identity, "NATIONAL_1");
    assert_eq!(report.config.sensor_pin, 17);
    assert_eq!(report.config.data_store.host, "192.168.1.54");
    assert_eq!(report.config.data_store.user, "webapp");
    assert_eq!(report.config.data_store.database_name, "iwt_db");
    assert_ne!(report.config.data_store.password, "x");

    // Every artifact kind written
    assert_eq!(report.artifacts.len(), ArtifactKind::ALL.len());
    for entry in &report.artifacts {
        assert!(store.exists(&entry.path), "{} missing", entry.path.display());
    }
    let config_module = store.read(Path::new("/home/pi/sensor/config.py")).unwrap();
    assert!(config_module.contains("'password': 'x',"));

    // Probe outcome does not matter for success, but it is bounded
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(orch.current_phase().await, ProvisionPhase::Done);
    let state = orch.state().await;
    assert!(state.has_visited(ProvisionPhase::Probing));
    assert!(state.has_visited(ProvisionPhase::Reporting));
    assert!(state.abort.is_none());

    // Report printed through the operator channel
    assert!(source
        .transcript
        .iter()
        .any(|line| line.contains("Provisioning complete")));
}

#[tokio::test]
async fn test_host_calls_follow_phase_order() {
    let host = Arc::new(FakeHost::new());
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(host.clone(), store);

    orch.run(&mut ScriptedSource::new(HAPPY_ANSWERS)).await.unwrap();

    let calls = host.calls();
    let position = |prefix: &str| {
        calls
            .iter()
            .position(|c| c.starts_with(prefix))
            .unwrap_or_else(|| panic!("no call starting with {}", prefix))
    };
    assert!(position("apt-update") < position("apt-install"));
    assert!(position("apt-install") < position("pip-install"));
    assert!(position("pip-install") < position("enable-interface spi"));
    assert!(position("enable-interface i2c") < position("mkdir"));
    assert!(position("mkdir") < position("systemctl-daemon-reload"));
    assert!(position("systemctl-daemon-reload") < position("systemctl-enable sensor.service"));
    assert!(position("systemctl-enable") < position("systemctl-restart sensor.service"));
}

#[tokio::test]
async fn test_failed_system_step_aborts_before_artifacts() {
    let host = Arc::new(FakeHost::failing_on("apt-install"));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(host.clone(), store.clone());

    let err = orch.run(&mut ScriptedSource::new(HAPPY_ANSWERS)).await.unwrap_err();

    match &err {
        ProvisionError::Pipeline(pipeline) => assert_eq!(pipeline.step_name, "install-packages"),
        other => panic!("expected pipeline error, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 1);
    assert!(store.paths().is_empty(), "no artifact may be written");
    assert!(!host.called("pip-install"));
    assert!(!host.called("systemctl"));

    let state = orch.state().await;
    assert_eq!(state.phase, ProvisionPhase::Aborted);
    let abort = state.abort.unwrap();
    assert_eq!(abort.phase, ProvisionPhase::RunningSystemSteps);
    assert_eq!(abort.component, "install-packages");
}

#[tokio::test]
async fn test_failed_service_step_aborts_before_probe() {
    let host = Arc::new(FakeHost::failing_on("systemctl-enable"));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(host.clone(), store.clone());

    let err = orch.run(&mut ScriptedSource::new(HAPPY_ANSWERS)).await.unwrap_err();

    assert_eq!(err.component(), "enable-service");
    assert!(!host.called("systemctl-restart"));
    // Artifacts were complete before the service phase started
    assert_eq!(store.paths().len(), ArtifactKind::ALL.len());
    let state = orch.state().await;
    assert!(!state.has_visited(ProvisionPhase::Probing));
    assert_eq!(state.abort.unwrap().phase, ProvisionPhase::RunningServiceSteps);
}

#[tokio::test]
async fn test_unwritable_store_is_fatal() {
    let host = Arc::new(FakeHost::new());
    let store = Arc::new(MemoryStore::read_only());
    let orch = orchestrator(host.clone(), store);

    let err = orch.run(&mut ScriptedSource::new(HAPPY_ANSWERS)).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Generation(_)));
    assert_eq!(err.component(), "artifacts");
    assert!(!host.called("systemctl"));
}

#[tokio::test]
async fn test_unprivileged_run_stops_at_first_step() {
    let host = Arc::new(FakeHost::unprivileged());
    let orch = orchestrator(host.clone(), Arc::new(MemoryStore::new()));

    let err = orch.run(&mut ScriptedSource::new(HAPPY_ANSWERS)).await.unwrap_err();

    assert_eq!(err.component(), "check-privileges");
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_touches_nothing() {
    let host = Arc::new(FakeHost::new());
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(host.clone(), store.clone());

    let err = orch
        .run(&mut ScriptedSource::new(["NATIONAL_1", "", "", "x", "", "n"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Config(ConfigError::UserCancelled)));
    assert_eq!(err.exit_code(), 2);
    assert!(host.calls().is_empty());
    assert!(store.paths().is_empty());
    let state = orch.state().await;
    assert_eq!(state.abort.unwrap().phase, ProvisionPhase::CollectingConfig);
}

#[tokio::test]
async fn test_missing_identity_is_fatal() {
    let host = Arc::new(FakeHost::new());
    let orch = orchestrator(host.clone(), Arc::new(MemoryStore::new()));

    let err = orch
        .run(&mut ScriptedSource::new(["", "db", "u", "x", "4", "y"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::Config(ConfigError::MissingRequiredField(_))
    ));
    assert_eq!(err.exit_code(), 1);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_rerun_backs_up_previous_artifacts() {
    let store = Arc::new(MemoryStore::new());

    orchestrator(Arc::new(FakeHost::new()), store.clone())
        .run(&mut ScriptedSource::new(HAPPY_ANSWERS))
        .await
        .unwrap();
    let first = store.read(Path::new("/home/pi/sensor/config.py")).unwrap();

    let report = orchestrator(Arc::new(FakeHost::new()), store.clone())
        .run(&mut ScriptedSource::new(["NATIONAL_2", "", "", "y2", "", "yes"]))
        .await
        .unwrap();

    assert!(report.artifacts.iter().all(|a| a.backup.is_some()));
    let config_entry = report
        .artifacts
        .iter()
        .find(|a| a.kind == ArtifactKind::ConfigModule)
        .unwrap();
    let backup = config_entry.backup.as_ref().unwrap();
    assert_eq!(store.read(backup).unwrap(), first);
    assert!(store
        .read(Path::new("/home/pi/sensor/config.py"))
        .unwrap()
        .contains("NATIONAL_2"));
}

#[tokio::test]
async fn test_missing_device_nodes_become_report_warnings() {
    let host = Arc::new(FakeHost::new());
    let orch = orchestrator(host, Arc::new(MemoryStore::new()));

    let report = orch.run(&mut ScriptedSource::new(HAPPY_ANSWERS)).await.unwrap();

    let steps: Vec<&str> = report.warnings.iter().map(|w| w.step.as_str()).collect();
    assert!(steps.contains(&"verify-interfaces"));
    assert!(steps.contains(&"stage-application"));
    assert!(report.render().contains("reboot required"));
}

#[tokio::test]
async fn test_report_json_saved_when_dir_configured() {
    let temp_dir = TempDir::new().unwrap();
    let orch = orchestrator(Arc::new(FakeHost::new()), Arc::new(MemoryStore::new()))
        .with_report_dir(temp_dir.path());

    orch.run(&mut ScriptedSource::new(HAPPY_ANSWERS)).await.unwrap();

    let json = std::fs::read_to_string(temp_dir.path().join("provision-report.json")).unwrap();
    assert!(json.contains("NATIONAL_1"));
    assert!(json.contains("\"password\": \"********\""));
}

#[tokio::test]
async fn test_bad_settings_abort_before_touching_host() {
    let host = Arc::new(FakeHost::new());
    let store = Arc::new(MemoryStore::new());
    let mut settings = Settings::default();
    settings.defaults.database = "iwt db".to_string();
    let orch = Orchestrator::new(settings, host.clone(), store.clone());

    let err = orch
        .run(&mut ScriptedSource::new(HAPPY_ANSWERS))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Settings(_)));
    assert_eq!(err.component(), "settings");
    assert!(host.calls().is_empty(), "host touched: {:?}", host.calls());
    assert!(store.paths().is_empty());
    let state = orch.state().await;
    assert_eq!(state.phase, ProvisionPhase::Aborted);
    assert_eq!(state.abort.unwrap().phase, ProvisionPhase::CollectingConfig);
}
