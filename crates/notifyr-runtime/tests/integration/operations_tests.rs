//! Late registration, shutdown, remote state changes, events and the
//! link-time catalog

use crate::fixtures::{dependent, probe, registry, scripted, webhooks};
use crate::test_utils::{CallLog, Probe, Script, Unfinished, WebhookManager};
use notifyr_domain::build::{BuildOutcome, BuildToken};
use notifyr_domain::error::{Error, GateError};
use notifyr_domain::status::ComponentStatus;
use notifyr_runtime::config::AbortPolicy;
use notifyr_runtime::constants::ABORT_EXIT_CODE;
use notifyr_runtime::registry::COMPONENTS;
use notifyr_runtime::{
    ComponentDescriptor, ComponentRegistry, LifecycleEvent, Resolver, Runtime, RuntimeConfig,
    StateChange,
};

async fn started(log: &CallLog) -> Runtime {
    let registry = registry(vec![
        probe("vault", log),
        dependent("mongo", "vault", log),
        probe("twilio", log).build_only_if(false),
    ]);
    Runtime::start(&registry, RuntimeConfig::default())
        .await
        .unwrap()
}

// =============================================================================
// Late registration
// =============================================================================

#[tokio::test]
async fn test_register_after_start() {
    let log = CallLog::new();
    let runtime = started(&log).await;

    let report = runtime
        .register(dependent("audit", "mongo", &log))
        .await
        .unwrap();
    assert_eq!(report.token, BuildToken::BOOT);
    assert_eq!(report.outcome, BuildOutcome::Ok);
    assert_eq!(runtime.order(), vec!["vault", "mongo", "audit"]);
    assert!(runtime.get::<Probe>("audit").is_ok());
}

#[tokio::test]
async fn test_late_registration_errors() {
    let log = CallLog::new();
    let runtime = started(&log).await;

    let err = runtime.register(probe("vault", &log)).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateComponent { .. }));

    let err = runtime
        .register(dependent("search", "elastic", &log))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvedDependency { .. }));

    let err = runtime
        .register(dependent("sms", "twilio", &log))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ComponentSkipped { .. }));
    assert!(matches!(
        runtime.component("sms").err(),
        Some(Error::ComponentSkipped { .. })
    ));

    let err = runtime
        .register(probe("push", &log).build_only_if(false))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ComponentSkipped { reason, .. } if reason.contains("condition")));
    assert!(log.position("construct:push").is_none());
}

/// Of two racing registrations under one name, exactly one boots
#[tokio::test]
async fn test_concurrent_registration_boots_once() {
    let log = CallLog::new();
    let runtime = started(&log).await;

    let (first, second) = tokio::join!(
        runtime.register(probe("audit", &log)),
        runtime.register(probe("audit", &log)),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(Error::DuplicateComponent { name }) if name == "audit"))
    );

    assert_eq!(runtime.order(), vec!["vault", "mongo", "audit"]);
    let builds = log
        .entries()
        .iter()
        .filter(|e| e.starts_with("build:audit"))
        .count();
    assert_eq!(builds, 1);
}

// =============================================================================
// Abort policy
// =============================================================================

#[tokio::test]
async fn test_abort_after_boot_is_returned() {
    let log = CallLog::new();
    let registry = registry(vec![
        scripted("vault", &log, &[Script::Ok, Script::Abort, Script::Abort]),
        probe("twilio", &log),
    ]);
    let runtime = Runtime::start(&registry, RuntimeConfig::default())
        .await
        .unwrap();
    assert_eq!(runtime.config().abort_policy, AbortPolicy::Propagate);

    let err = runtime.rebuild("vault", BuildToken::ADMIN).await.unwrap_err();
    assert!(matches!(err, Error::BuildAborted { component, .. } if component == "vault"));
    assert_eq!(runtime.status("vault").await.unwrap(), ComponentStatus::Unavailable);

    let change = StateChange::new("vault", ComponentStatus::Unavailable).build(BuildToken::REMOTE);
    let err = runtime.apply_state_change(&change).await.unwrap_err();
    assert!(matches!(err, Error::BuildAborted { .. }));

    // nothing else is torn down and the component can recover
    assert_eq!(runtime.status("twilio").await.unwrap(), ComponentStatus::Available);
    assert!(log.position("destroy:twilio").is_none());
    let report = runtime.rebuild("vault", BuildToken::ADMIN).await.unwrap();
    assert_eq!(report.reports[0].status, ComponentStatus::Available);
}

const ABORT_CHILD_ENV: &str = "NOTIFYR_TEST_ABORT_CHILD";

/// Child half of `test_abort_after_boot_exits_process`; a no-op otherwise
#[tokio::test]
async fn test_abort_after_boot_exit_child() {
    if std::env::var_os(ABORT_CHILD_ENV).is_none() {
        return;
    }
    let log = CallLog::new();
    let registry = registry(vec![scripted("vault", &log, &[Script::Ok, Script::Abort])]);
    let config = RuntimeConfig {
        abort_policy: AbortPolicy::Exit,
        ..RuntimeConfig::default()
    };
    let runtime = Runtime::start(&registry, config).await.unwrap();

    let result = runtime.rebuild("vault", BuildToken::ADMIN).await;
    panic!("rebuild returned under the exit policy: {:?}", result.err());
}

#[test]
fn test_abort_after_boot_exits_process() {
    let status = std::process::Command::new(std::env::current_exe().unwrap())
        .args([
            "--exact",
            "operations_tests::test_abort_after_boot_exit_child",
            "--nocapture",
        ])
        .env(ABORT_CHILD_ENV, "1")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(ABORT_EXIT_CODE));
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_shutdown_in_reverse_order() {
    let log = CallLog::new();
    let runtime = started(&log).await;

    let destroyed = runtime.shutdown().await;
    assert_eq!(destroyed, vec!["mongo", "vault"]);
    assert!(log.position("destroy:mongo").unwrap() < log.position("destroy:vault").unwrap());

    let vault = runtime.get::<Probe>("vault").unwrap();
    assert!(matches!(
        vault.gate("ping").await.err(),
        Some(GateError::Destroyed { .. })
    ));
}

// =============================================================================
// Remote state changes
// =============================================================================

#[tokio::test]
async fn test_remote_status_assignment() {
    let log = CallLog::new();
    let runtime = started(&log).await;

    let change =
        StateChange::from_json(r#"{"component":"vault","status":"temporarily_unavailable"}"#)
            .unwrap();
    assert!(runtime.apply_state_change(&change).await.unwrap().is_none());

    let vault = runtime.get::<Probe>("vault").unwrap();
    let err = vault.gate("ping").await.err().unwrap();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_remote_destroy_then_build() {
    let log = CallLog::new();
    let runtime = started(&log).await;

    let change = StateChange::new("mongo", ComponentStatus::Unavailable)
        .destroy()
        .build(BuildToken::REMOTE);
    let payload = change.to_json().unwrap();
    let report = runtime
        .apply_state_change(&StateChange::from_json(&payload).unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.token, BuildToken::REMOTE);
    assert_eq!(report.status, ComponentStatus::Available);
    assert!(log.position("destroy:mongo").unwrap() < log.position("build:mongo:remote").unwrap());
}

async fn started_with_webhooks(log: &CallLog) -> Runtime {
    let registry = registry(vec![probe("vault", log), webhooks("webhooks")]);
    Runtime::start(&registry, RuntimeConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_remote_change_targets_mini_service() {
    let log = CallLog::new();
    let runtime = started_with_webhooks(&log).await;

    let change = StateChange::from_json(
        r#"{"component":"webhooks","id":"p3","status":"unavailable","to_destroy":true}"#,
    )
    .unwrap();
    assert!(runtime.apply_state_change(&change).await.unwrap().is_none());

    let manager = runtime.get::<WebhookManager>("webhooks").unwrap();
    let guard = manager.guard().read().await;
    let pool = &guard.component().pool;
    assert!(pool.get("p3").unwrap().snapshot().await.destroyed);
    assert!(!pool.get("p1").unwrap().snapshot().await.destroyed);
    assert_eq!(guard.component().teardown_count(), 2);
    drop(guard);
    assert_eq!(runtime.status("webhooks").await.unwrap(), ComponentStatus::Available);

    let change = StateChange::new("webhooks", ComponentStatus::Available)
        .mini("p3")
        .build(BuildToken::REMOTE);
    let report = runtime.apply_state_change(&change).await.unwrap().unwrap();
    assert_eq!(report.component, "p3");
    assert_eq!(report.token, BuildToken::REMOTE);
    assert_eq!(report.status, ComponentStatus::Available);
}

#[tokio::test]
async fn test_mini_service_change_errors() {
    let log = CallLog::new();
    let runtime = started_with_webhooks(&log).await;

    let change = StateChange::new("vault", ComponentStatus::Unavailable).mini("p1");
    let err = runtime.apply_state_change(&change).await.unwrap_err();
    assert!(matches!(err, Error::NotAManager { name } if name == "vault"));
    assert_eq!(runtime.status("vault").await.unwrap(), ComponentStatus::Available);

    // p2 failed its build and was never pooled
    let change = StateChange::new("webhooks", ComponentStatus::Unavailable).mini("p2");
    let err = runtime.apply_state_change(&change).await.unwrap_err();
    assert!(matches!(
        err,
        Error::MiniServiceNotFound { manager, id } if manager == "webhooks" && id == "p2"
    ));
    assert_eq!(runtime.status("webhooks").await.unwrap(), ComponentStatus::Available);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_rebuild_publishes_events() {
    let log = CallLog::new();
    let runtime = started(&log).await;
    let mut rx = runtime.subscribe();

    runtime.rebuild("vault", BuildToken::ADMIN).await.unwrap();
    runtime
        .apply_state_change(&StateChange::new("vault", ComponentStatus::Degraded))
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        LifecycleEvent::Built {
            component,
            token,
            outcome,
            ..
        } => {
            assert_eq!(component, "vault");
            assert_eq!(token, BuildToken::ADMIN);
            assert_eq!(outcome, BuildOutcome::Ok);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        rx.recv().await.unwrap(),
        LifecycleEvent::StatusChanged {
            component: "vault".into(),
            previous: ComponentStatus::Available,
            status: ComponentStatus::Degraded,
        }
    );
}

// =============================================================================
// Link-time catalog
// =============================================================================

fn clock() -> ComponentDescriptor {
    ComponentDescriptor::of("clock", |_resolver: &Resolver<'_>| Ok(Unfinished))
}

#[linkme::distributed_slice(COMPONENTS)]
static CLOCK: fn() -> ComponentDescriptor = clock;

/// Components without a build implementation boot unavailable
#[tokio::test]
async fn test_catalog_runtime() {
    let registry = ComponentRegistry::from_registered().unwrap();
    let runtime = Runtime::start(&registry, RuntimeConfig::default())
        .await
        .unwrap();

    assert_eq!(runtime.order(), vec!["clock"]);
    assert_eq!(runtime.status("clock").await.unwrap(), ComponentStatus::Unavailable);
    let report = &runtime.boot_reports()[0];
    assert_eq!(report.outcome, BuildOutcome::Failure);
}
