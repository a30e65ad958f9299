use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeZone, Utc};

use s_curve_gate::config::GateConfig;
use s_curve_gate::models::{AuthorizationRecord, Identity, Role};
use s_curve_gate::providers::memory::{MemoryIdentityProvider, MemoryNavigator, MemoryRecordStore};
use s_curve_gate::providers::NavigationController;
use s_curve_gate::{create_gate, ScreenRequirement};

async fn wait_for_root(navigator: &MemoryNavigator, expected: &str) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(2), async {
        while navigator.current_root().as_deref() != Some(expected) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn protected_screen_follows_session_changes() -> Result<()> {
    let records = Arc::new(MemoryRecordStore::new());
    records.put_record(&AuthorizationRecord::new(
        "u1",
        Role::Member,
        false,
        Utc.timestamp_opt(100, 0).unwrap(),
    ));
    let gate = create_gate(
        GateConfig::default(),
        Arc::new(MemoryIdentityProvider::with_identity(Identity::new("u1", "dev@example.com"))),
        records.clone(),
    );

    let navigator = Arc::new(MemoryNavigator::starting_at("Main"));
    let follower = tokio::spawn(
        gate.screen_gate(ScreenRequirement::approved_only(), navigator.clone())
            .follow(gate.subscribe()),
    );

    // Mounted while signed out.
    wait_for_root(&navigator, "Login").await?;

    gate.sign_in().await?;
    wait_for_root(&navigator, "PendingApproval").await?;

    // Approval lets the screen render in place.
    records.set_approval("u1", true, Utc.timestamp_opt(200, 0).unwrap())?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(navigator.current_root().as_deref(), Some("PendingApproval"));

    gate.sign_out().await;
    wait_for_root(&navigator, "Login").await?;

    follower.abort();
    assert_eq!(
        navigator.resets(),
        vec!["Login".to_string(), "PendingApproval".to_string(), "Login".to_string()]
    );
    Ok(())
}
