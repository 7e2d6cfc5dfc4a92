//! Unit tests for the component status model

use notifyr_domain::{ComponentStatus, GateError, LifecyclePhase};

#[test]
fn test_accepts_calls() {
    assert!(ComponentStatus::Available.accepts_calls());
    assert!(ComponentStatus::Degraded.accepts_calls());
    assert!(ComponentStatus::PartiallyAvailable.accepts_calls());
    assert!(!ComponentStatus::Unavailable.accepts_calls());
    assert!(!ComponentStatus::TemporarilyUnavailable.accepts_calls());
}

#[test]
fn test_worst_is_commutative() {
    for a in ComponentStatus::BY_SEVERITY {
        for b in ComponentStatus::BY_SEVERITY {
            assert_eq!(a.worst(b), b.worst(a));
        }
    }
}

#[test]
fn test_status_serialization() {
    let json = serde_json::to_string(&ComponentStatus::TemporarilyUnavailable)
        .expect("serialization failed");
    assert_eq!(json, "\"temporarily_unavailable\"");

    let status: ComponentStatus =
        serde_json::from_str("\"partially_available\"").expect("deserialization failed");
    assert_eq!(status, ComponentStatus::PartiallyAvailable);
}

#[test]
fn test_defaults() {
    assert_eq!(ComponentStatus::default(), ComponentStatus::Unavailable);
    assert_eq!(LifecyclePhase::default(), LifecyclePhase::Unbuilt);
}

#[test]
fn test_only_temporary_gate_error_is_retryable() {
    let temp = GateError::TemporarilyUnavailable {
        component: "vault".into(),
    };
    let down = GateError::Unavailable {
        component: "vault".into(),
    };
    assert!(temp.is_retryable());
    assert!(!down.is_retryable());
    assert_eq!(down.component(), "vault");
}
