//! End-to-end tests for the phased bootstrap running on a fully wired
//! runtime: configuration, error boundary, degraded mode and health.

use anyhow::Result;
use beacon_bootstrap::{keys, BeaconRuntime, BootstrapError, PhaseOptions};
use beacon_config::{BeaconConfig, BootstrapConfig};
use beacon_core::{BeaconError, LifecycleEvent, ServiceRegistry};
use beacon_resilience::{FallbackLevel, HealthStatus};
use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use temp_env::with_vars;

fn quick_runtime() -> BeaconRuntime {
    let config = BeaconConfig {
        bootstrap: BootstrapConfig {
            default_max_retries: 1,
            recovery_delay: Duration::from_millis(10),
        },
        ..Default::default()
    };
    BeaconRuntime::from_config(&config).expect("default config is valid")
}

/// An optional phase that keeps failing leaves the app running degraded
#[tokio::test(start_paused = true)]
async fn test_optional_phase_degrades_and_health_reports_it() -> Result<()> {
    beacon_logging::init_simple_tracing("warn")?;
    let runtime = quick_runtime();
    let weather_calls = Arc::new(AtomicU32::new(0));
    let later_calls = Arc::new(AtomicU32::new(0));

    let counter = weather_calls.clone();
    let later = later_calls.clone();
    let bootstrap = runtime
        .bootstrap()
        .required_phase("core", |ctx| async move {
            ctx.state.set("core.ready", json!(true));
            Ok(())
        })
        .optional_phase("weather", move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(BeaconError::other("weather feed unavailable")) }
        })
        .optional_phase("sidebar", move |_ctx| {
            later.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .build();
    let mut rx = runtime.events().subscribe();

    let report = bootstrap.init().await?;
    println!("Bootstrap report: {:?}", report);

    assert_eq!(weather_calls.load(Ordering::SeqCst), 2, "max_retries=1 runs the phase twice");
    assert_eq!(later_calls.load(Ordering::SeqCst), 1, "later phases still run");
    assert_eq!(report.completed, vec!["core", "sidebar"]);
    assert_eq!(report.degraded, vec!["weather"]);

    assert!(bootstrap.is_degraded_mode());
    let info = bootstrap.get_degraded_mode_info().expect("degraded info recorded");
    assert_eq!(info.phase, "weather");
    assert_eq!(info.error, "weather feed unavailable");

    assert_eq!(runtime.state().get(keys::DEGRADED_MODE), Some(json!(true)));
    assert_eq!(runtime.state().get("core.ready"), Some(json!(true)));
    assert_eq!(runtime.state().get(keys::BOOTSTRAP_STATUS), Some(json!("degraded")));

    // Both failed runs land in the shared error history
    let stats = runtime.error_boundary().get_error_statistics();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_component.get("bootstrap"), Some(&2));

    let mut saw_degraded_event = false;
    while let Ok(event) = rx.try_recv() {
        if let LifecycleEvent::DegradedModeEntered { phase, .. } = event {
            assert_eq!(phase, "weather");
            saw_degraded_event = true;
        }
    }
    assert!(saw_degraded_event);

    let snapshot = runtime.health().perform_comprehensive_health_check().await;
    assert_eq!(snapshot.status.label(), "degraded");
    let probe = snapshot.component("degraded_mode").expect("degraded mode probe registered");
    assert!(matches!(probe.status, HealthStatus::Degraded { .. }));

    Ok(())
}

/// A failing required phase aborts startup before later phases run
#[tokio::test(start_paused = true)]
async fn test_required_phase_failure_is_fatal() {
    let runtime = quick_runtime();
    let later_calls = Arc::new(AtomicU32::new(0));
    let later = later_calls.clone();

    let bootstrap = runtime
        .bootstrap()
        .required_phase("services", |_ctx| async {
            Err(BeaconError::network("config service unreachable"))
        })
        .optional_phase("search", move |_ctx| {
            later.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .build();

    let err = bootstrap.init().await.unwrap_err();

    match &err {
        BootstrapError::Fatal { phase, source } => {
            assert_eq!(phase, "services");
            assert_eq!(source, &BeaconError::network("config service unreachable"));
        }
        other => panic!("expected a fatal bootstrap error, got {other}"),
    }
    assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    assert!(!bootstrap.is_degraded_mode());
    assert_eq!(runtime.state().get(keys::BOOTSTRAP_STATUS), Some(json!("failed")));
    assert_eq!(bootstrap.phase_status("services"), Some(json!("failed")));
}

/// A fallback chain keyed by the phase name stands in for a failing required phase
#[tokio::test(start_paused = true)]
async fn test_phase_fallback_chain_rescues_required_phase() -> Result<()> {
    let runtime = quick_runtime();
    runtime.fallback_manager().register_level(
        "boundaries",
        FallbackLevel::from_data("bundled", "Bundled boundaries", json!({ "features": [] })),
    );
    let later_calls = Arc::new(AtomicU32::new(0));
    let later = later_calls.clone();

    let bootstrap = runtime
        .bootstrap()
        .required_phase("boundaries", |_ctx| async {
            Err(BeaconError::network("boundary service unreachable"))
        })
        .required_phase("map", move |_ctx| {
            later.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .build();

    let report = bootstrap.init().await?;

    assert_eq!(report.completed, vec!["boundaries", "map"]);
    assert_eq!(report.fell_back, vec!["boundaries"]);
    assert_eq!(later_calls.load(Ordering::SeqCst), 1);
    assert!(!bootstrap.is_degraded_mode());
    assert_eq!(bootstrap.phase_status("boundaries"), Some(json!("fallback")));
    assert_eq!(runtime.state().get(keys::BOOTSTRAP_STATUS), Some(json!("completed")));
    Ok(())
}

/// Components degraded through the error boundary show up in the shared degraded mode
#[tokio::test]
async fn test_boundary_degradation_is_visible_to_runtime() -> Result<()> {
    let runtime = quick_runtime();
    let context = beacon_core::ErrorContext::new("geolocation", "locate");

    let located: Vec<f64> = runtime
        .error_boundary()
        .handle_error(
            BeaconError::other("Geolocation permission denied"),
            &context,
            || async { Ok(vec![52.1, 4.3]) },
        )
        .await?;

    assert!(located.is_empty());
    assert!(runtime.degraded_mode().is_degraded());
    let info = runtime.degraded_mode().info().expect("degradation recorded");
    assert_eq!(info.phase, "geolocation");
    assert_eq!(runtime.state().get(keys::DEGRADED_MODE), Some(json!(true)));

    let snapshot = runtime.health().perform_comprehensive_health_check().await;
    let degraded = snapshot.component("degraded_mode").expect("degraded mode check registered");
    assert!(matches!(degraded.status, HealthStatus::Degraded { .. }));
    Ok(())
}

/// safe_execute can be driven directly for ad-hoc startup work
#[tokio::test(start_paused = true)]
async fn test_safe_execute_recovers_flaky_step() -> Result<()> {
    let runtime = quick_runtime();
    let bootstrap = runtime.bootstrap().build();

    let outcome = bootstrap
        .safe_execute(
            "tiles",
            |attempt| async move {
                if attempt < 3 {
                    Err(BeaconError::timeout("tile index timed out"))
                } else {
                    Ok(())
                }
            },
            &PhaseOptions::default()
                .max_retries(2)
                .recovery_delay(Duration::from_millis(5)),
        )
        .await?;

    assert_eq!(outcome, beacon_bootstrap::PhaseOutcome::Recovered { attempts: 3 });
    assert!(!bootstrap.is_degraded_mode());
    Ok(())
}

#[tokio::test]
async fn test_phases_share_service_registry() -> Result<()> {
    let runtime = quick_runtime();
    let services: &Arc<ServiceRegistry> = runtime.services();

    let bootstrap = runtime
        .bootstrap()
        .required_phase("register", |ctx| async move {
            ctx.services.register_singleton("geocoder", String::from("nominatim"));
            Ok(())
        })
        .build();
    bootstrap.init().await?;

    let geocoder: Arc<String> = services.resolve("geocoder")?;
    assert_eq!(geocoder.as_str(), "nominatim");
    Ok(())
}

#[test]
fn test_runtime_loads_yaml_with_env_overrides() {
    let yaml = r#"
retry:
  max_retries: 1
  base_delay: 50ms
bootstrap:
  default_max_retries: 4
  recovery_delay: 250ms
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    with_vars(
        vec![
            ("BEACON_RETRY_MAX_RETRIES", Some("3")),
            ("BEACON_ERROR_HISTORY_LIMIT", None),
        ],
        || {
            let runtime = BeaconRuntime::load(Some(file.path())).unwrap();
            let config = runtime.config();

            assert_eq!(config.retry.max_retries, 3, "environment wins over the file");
            assert_eq!(config.retry.base_delay, Duration::from_millis(50));
            assert_eq!(config.bootstrap.default_max_retries, 4);
            assert_eq!(config.bootstrap.recovery_delay, Duration::from_millis(250));
            assert_eq!(runtime.error_boundary().config().history_limit, 100);
        },
    );
}

#[test]
fn test_runtime_rejects_invalid_env() {
    with_vars(vec![("BEACON_CB_FAILURE_THRESHOLD", Some("0"))], || {
        let result = BeaconRuntime::load(None);
        assert!(matches!(result, Err(BootstrapError::Config(_))));
    });
}
