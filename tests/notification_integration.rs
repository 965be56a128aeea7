// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for push notification routing.

use std::sync::Arc;

use http_outlet::subscription::Subscribable;
use http_outlet::{
    Accessory, DeviceState, Notification, NotificationRouter, Outlet, OutletConfig, PushHandler,
    ReconcileError, RouteOutcome, StateChange,
};
use parking_lot::Mutex;

fn outlet(router: &Arc<NotificationRouter>, id: &str, extra: &serde_json::Value) -> Outlet {
    let mut config = serde_json::json!({
        "onUrl": "http://127.0.0.1:9/on",
        "offUrl": "http://127.0.0.1:9/off",
        "statusUrl": "http://127.0.0.1:9/status",
        "notificationID": id,
    });
    if let (Some(config), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            config.insert(key.clone(), value.clone());
        }
    }

    let validated = OutletConfig::from_json(&config).unwrap();
    Outlet::builder(validated.config)
        .with_notification_router(router.clone())
        .build()
        .unwrap()
}

// ============================================================================
// Routing Tests
// ============================================================================

mod routing {
    use super::*;

    #[tokio::test]
    async fn routes_by_notification_id() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(&router, "kitchen", &serde_json::json!({}));
        let garage = outlet(&router, "garage", &serde_json::json!({}));

        let outcome = router.route_json("garage", None, r#"{"characteristic":"On","value":true}"#);

        assert!(outcome.is_delivered());
        assert_eq!(garage.state().power(), Some(true));
        assert_eq!(kitchen.state(), DeviceState::new());
    }

    #[tokio::test]
    async fn unknown_id_is_dropped() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(&router, "kitchen", &serde_json::json!({}));

        let outcome = router.route("attic", None, &Notification::new("On", true));

        assert_eq!(outcome, RouteOutcome::UnknownId);
        assert_eq!(kitchen.state(), DeviceState::new());
    }

    #[tokio::test]
    async fn password_protected_registration() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(
            &router,
            "kitchen",
            &serde_json::json!({ "notificationPassword": "hunter2" }),
        );
        let body = r#"{"characteristic":"On","value":1}"#;

        assert_eq!(router.route_json("kitchen", None, body), RouteOutcome::Unauthorized);
        assert_eq!(
            router.route_json("kitchen", Some("guess"), body),
            RouteOutcome::Unauthorized
        );
        assert_eq!(kitchen.state().power(), None);

        assert!(router.route_json("kitchen", Some("hunter2"), body).is_delivered());
        assert_eq!(kitchen.state().power(), Some(true));
    }

    #[tokio::test]
    async fn value_conversions() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(&router, "kitchen", &serde_json::json!({}));

        for (value, expected) in [
            (serde_json::json!(true), true),
            (serde_json::json!("off"), false),
            (serde_json::json!(1), true),
            (serde_json::json!("FALSE"), false),
        ] {
            let notification = Notification {
                characteristic: "On".to_string(),
                value,
            };
            assert!(router.route("kitchen", None, &notification).is_delivered());
            assert_eq!(kitchen.state().power(), Some(expected));
        }
    }

    #[tokio::test]
    async fn unconvertible_value_is_rejected() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(&router, "kitchen", &serde_json::json!({}));

        let outcome = router.route_json("kitchen", None, r#"{"characteristic":"On","value":"dim"}"#);

        assert!(matches!(
            outcome,
            RouteOutcome::Rejected(ReconcileError::InvalidValue { .. })
        ));
        assert_eq!(kitchen.state().power(), None);
    }

    #[tokio::test]
    async fn malformed_body_is_dropped() {
        let router = Arc::new(NotificationRouter::new());
        let _kitchen = outlet(&router, "kitchen", &serde_json::json!({}));

        assert!(matches!(
            router.route_json("kitchen", None, r#"{"value":true}"#),
            RouteOutcome::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn dropped_outlet_is_unregistered() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(&router, "kitchen", &serde_json::json!({}));
        assert_eq!(router.registration_count(), 1);

        drop(kitchen);

        assert_eq!(router.registration_count(), 0);
        assert_eq!(
            router.route("kitchen", None, &Notification::new("On", true)),
            RouteOutcome::UnknownId
        );
    }
}

// ============================================================================
// Reconciliation Tests
// ============================================================================

mod reconciliation {
    use super::*;

    #[tokio::test]
    async fn unknown_characteristic_leaves_state_unchanged() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(&router, "kitchen", &serde_json::json!({}));

        let outcome = router.route("kitchen", None, &Notification::new("Brightness", true));

        assert_eq!(
            outcome,
            RouteOutcome::Rejected(ReconcileError::UnknownProperty("Brightness".to_string()))
        );
        assert_eq!(kitchen.state(), DeviceState::new());
    }

    #[tokio::test]
    async fn outlet_in_use_requires_configuration() {
        let router = Arc::new(NotificationRouter::new());
        let plain = outlet(&router, "plain", &serde_json::json!({}));
        let metered = outlet(
            &router,
            "metered",
            &serde_json::json!({ "outletInUse": { "statusUrl": "http://127.0.0.1:9/load" } }),
        );

        let notification = Notification::new("OutletInUse", true);
        assert!(!router.route("plain", None, &notification).is_delivered());
        assert!(router.route("metered", None, &notification).is_delivered());

        assert_eq!(plain.state().outlet_in_use(), None);
        assert_eq!(metered.state().outlet_in_use(), Some(true));
    }

    #[tokio::test]
    async fn subscribers_see_pushed_changes() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(&router, "kitchen", &serde_json::json!({}));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorder = seen.clone();
        let id = kitchen.on_state_changed(move |change| recorder.lock().push(*change));

        router.route("kitchen", None, &Notification::new("On", true));
        router.route("kitchen", None, &Notification::new("On", true));
        router.route("kitchen", None, &Notification::new("power", false));

        assert_eq!(
            seen.lock().as_slice(),
            &[StateChange::Power(true), StateChange::Power(false)]
        );

        assert!(kitchen.unsubscribe(id));
        router.route("kitchen", None, &Notification::new("On", true));
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let router = Arc::new(NotificationRouter::new());
        let kitchen = outlet(&router, "kitchen", &serde_json::json!({}));

        kitchen.apply_notification("On", true).unwrap();
        router.route("kitchen", None, &Notification::new("On", false));
        assert_eq!(kitchen.state().power(), Some(false));

        kitchen.push_handler().apply_notification("On", true).unwrap();
        assert_eq!(kitchen.state().power(), Some(true));
    }
}
