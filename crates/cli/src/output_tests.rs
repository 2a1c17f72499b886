// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use lease_core::{HolderId, ResourceType};

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
}

fn alice() -> HolderInfo {
    HolderInfo {
        id: HolderId::new("u-1"),
        name: "Alice".to_string(),
        role: "editor".to_string(),
    }
}

fn view() -> LeaseView {
    LeaseView {
        resource_type: ResourceType::Project,
        resource_id: "P1".to_string(),
        holder: alice(),
        locked_at: at(),
        last_activity: at(),
    }
}

#[test]
fn denied_text_names_holder_and_time() {
    let output = AcquireOutput::denied(LeaseKey::new(ResourceType::Project, "P1"), alice(), at());
    assert_eq!(
        output.to_string(),
        "project/P1 is locked by Alice (editor) since 2026-03-01 09:30:00 UTC"
    );
}

#[test]
fn denied_json_uses_denied_by() {
    let output = AcquireOutput::denied(LeaseKey::new(ResourceType::Project, "P1"), alice(), at());
    let json = serde_json::to_value(&output).unwrap();

    assert_eq!(json["granted"], false);
    assert_eq!(json["deniedBy"]["name"], "Alice");
    assert!(json.get("lease").is_none());
}

#[test]
fn granted_json_carries_holder_and_lease() {
    let json = serde_json::to_value(AcquireOutput::granted(view(), false)).unwrap();

    assert_eq!(json["granted"], true);
    assert_eq!(json["holder"]["role"], "editor");
    assert_eq!(json["lease"]["resourceId"], "P1");
}

#[test]
fn inspect_text_distinguishes_own_lease() {
    let status = LeaseStatus {
        active: true,
        is_own_lease: true,
        holder: Some(alice()),
        locked_at: Some(at()),
        ..Default::default()
    };
    let output = InspectOutput {
        key: LeaseKey::new(ResourceType::Project, "P1"),
        status,
    };

    assert!(output.to_string().starts_with("project/P1 is locked by you (Alice (editor))"));
}

#[test]
fn inspect_json_is_the_bare_status() {
    let output = InspectOutput {
        key: LeaseKey::new(ResourceType::Vehicle, "V1"),
        status: LeaseStatus::default(),
    };

    assert_eq!(output.to_string(), "vehicle/V1 is not locked");
    assert_eq!(
        serde_json::to_value(&output).unwrap(),
        serde_json::json!({"active": false, "isOwnLease": false})
    );
}

#[test]
fn event_line_is_readable() {
    let line = EventLine(LeaseEvent::Released {
        resource_type: ResourceType::Employee,
        resource_id: "E4".to_string(),
        released_count: 1,
        at: at(),
    });
    assert_eq!(line.to_string(), "2026-03-01 09:30:00 UTC released employee/E4");
}
