//! Unit tests for the call gate and reader/writer exclusion

use crate::test_utils::{CallLog, Probe};
use async_trait::async_trait;
use notifyr_domain::build::{BuildResult, BuildToken};
use notifyr_domain::error::GateError;
use notifyr_domain::status::ComponentStatus;
use notifyr_runtime::{BuildScope, Component, ComponentCell};
use std::sync::Arc;
use std::time::Duration;

/// A call issued while a rebuild runs waits for it and never sees it mid-flight
#[tokio::test]
async fn test_business_call_waits_for_rebuild() {
    let log = CallLog::new();
    let cell = ComponentCell::new(
        "redis",
        Probe::new("redis", &log).slow(Duration::from_millis(50)),
    );
    cell.build(BuildToken::BOOT).await.unwrap();

    let rebuilding = Arc::clone(&cell);
    let rebuild = tokio::spawn(async move { rebuilding.build(BuildToken::ADMIN).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let gate = cell.gate("ping").await.expect("gate should admit the call");
    assert!(gate.ping(), "call observed a component mid-rebuild");
    assert_eq!(gate.build_count(), 2, "call ran before the rebuild finished");
    drop(gate);

    rebuild.await.unwrap().unwrap();
}

/// A rebuild waits for in-flight calls to release the read side
#[tokio::test]
async fn test_rebuild_waits_for_readers() {
    let log = CallLog::new();
    let cell = ComponentCell::new("redis", Probe::new("redis", &log));
    cell.build(BuildToken::BOOT).await.unwrap();

    let gate = cell.gate("ping").await.unwrap();
    let rebuilding = Arc::clone(&cell);
    let rebuild = tokio::spawn(async move { rebuilding.build(BuildToken::ADMIN).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(gate.build_count(), 1);
    assert!(!rebuild.is_finished());
    drop(gate);

    rebuild.await.unwrap().unwrap();
    assert_eq!(cell.gate("ping").await.unwrap().build_count(), 2);
}

/// Each refusal names the guarantee that failed
#[tokio::test]
async fn test_gate_error_kinds() {
    let log = CallLog::new();
    let cell = ComponentCell::new("twilio", Probe::new("twilio", &log).disabling("send_sms"));

    assert_eq!(
        cell.gate("send_email").await.err(),
        Some(GateError::NotBuilt {
            component: "twilio".into()
        })
    );

    cell.build(BuildToken::BOOT).await.unwrap();
    assert!(cell.gate("send_email").await.is_ok());
    assert_eq!(
        cell.gate("send_sms").await.err(),
        Some(GateError::MethodDisabled {
            component: "twilio".into(),
            method: "send_sms".into()
        })
    );

    cell.set_status(ComponentStatus::TemporarilyUnavailable).await;
    let err = cell.gate("send_email").await.err().unwrap();
    assert!(err.is_retryable());

    cell.set_status(ComponentStatus::Unavailable).await;
    assert!(matches!(
        cell.gate("send_email").await,
        Err(GateError::Unavailable { .. })
    ));

    cell.destroy().await;
    assert!(matches!(
        cell.gate("send_email").await,
        Err(GateError::Destroyed { .. })
    ));
}

/// Disables `send_sms` only on the boot pass
struct BootOnlyRestriction;

#[async_trait]
impl Component for BootOnlyRestriction {
    async fn verify_dependency(&mut self, scope: &mut BuildScope) -> BuildResult {
        if scope.token() == BuildToken::BOOT {
            scope.disable_method("send_sms");
        }
        Ok(())
    }

    async fn do_build(&mut self, _scope: &mut BuildScope) -> BuildResult {
        Ok(())
    }
}

/// Disabled methods are recomputed on every pass
#[tokio::test]
async fn test_disabled_methods_reset_on_rebuild() {
    let cell = ComponentCell::new("twilio", BootOnlyRestriction);
    cell.build(BuildToken::BOOT).await.unwrap();
    assert!(cell.gate("send_sms").await.is_err());
    assert_eq!(cell.snapshot().await.disabled_methods, vec!["send_sms"]);

    cell.build(BuildToken::ADMIN).await.unwrap();
    assert!(cell.gate("send_sms").await.is_ok());
    assert!(cell.snapshot().await.disabled_methods.is_empty());
}
