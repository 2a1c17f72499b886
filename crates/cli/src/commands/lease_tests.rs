// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn identity(session: Option<&str>) -> Identity {
    Identity {
        user: Some("u-7".to_string()),
        name: None,
        role: Some("fleet".to_string()),
        session: session.map(str::to_string),
    }
}

#[test]
fn holder_defaults_name_to_user() {
    let holder = identity(Some("abc")).holder().unwrap();

    assert_eq!(holder.id.0, "u-7");
    assert_eq!(holder.name, "u-7");
    assert_eq!(holder.role, "fleet");
    assert_eq!(holder.token.as_str(), "abc");
}

#[test]
fn missing_or_blank_session_is_an_error() {
    assert!(identity(None).token().is_err());
    assert!(identity(Some("  ")).holder().is_err());
    assert!(identity(None).optional_token().is_none());
}

#[test]
fn watch_pattern_narrows_with_arguments() {
    let all = WatchArgs {
        resource_type: None,
        resource_id: None,
    };
    let by_type = WatchArgs {
        resource_type: Some(ResourceType::Vehicle),
        resource_id: None,
    };
    let one = WatchArgs {
        resource_type: Some(ResourceType::Vehicle),
        resource_id: Some("V2".to_string()),
    };

    assert_eq!(all.pattern(), TopicPattern::all());
    assert!(by_type.pattern().matches("lease_acquired:vehicle:V9"));
    assert!(!by_type.pattern().matches("lease_acquired:project:V9"));
    assert!(one.pattern().matches("lease_released:vehicle:V2"));
    assert!(!one.pattern().matches("lease_released:vehicle:V3"));
}

#[test]
fn watch_on_wildcard_looking_id_stays_on_that_record() {
    let star = WatchArgs {
        resource_type: Some(ResourceType::Project),
        resource_id: Some("*".to_string()),
    };

    assert!(star.pattern().matches("lease_acquired:project:*"));
    assert!(!star.pattern().matches("lease_acquired:project:P2"));
    assert!(!star.pattern().matches("lease_released:project:P3"));
}
