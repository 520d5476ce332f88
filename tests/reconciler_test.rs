// Subscription reconciler behavior against in-memory doubles

mod common;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use common::{MemoryEventDedup, MemoryUserStore, MockPaymentProvider};
use reviewflow_backend::services::reconciler::{ReconcileOutcome, SubscriptionReconciler};
use reviewflow_backend::services::stripe::webhook::{WebhookEvent, WebhookEventType};
use reviewflow_backend::services::stripe::SubscriptionSnapshot;

struct Fixture {
    users: Arc<MemoryUserStore>,
    provider: Arc<MockPaymentProvider>,
    reconciler: SubscriptionReconciler,
}

fn fixture() -> Fixture {
    let users = Arc::new(MemoryUserStore::new());
    let provider = Arc::new(MockPaymentProvider::new());
    let reconciler = SubscriptionReconciler::new(
        users.clone(),
        provider.clone(),
        Arc::new(MemoryEventDedup::new()),
    );
    Fixture {
        users,
        provider,
        reconciler,
    }
}

fn subscription_updated_event(
    event_id: &str,
    subscription_id: &str,
    customer_id: &str,
    status: &str,
    period_end: i64,
) -> WebhookEvent {
    WebhookEvent {
        id: event_id.to_string(),
        event_type: WebhookEventType::SubscriptionUpdated,
        data_object: json!({
            "id": subscription_id,
            "customer": customer_id,
            "status": status,
            "current_period_end": period_end,
            "items": {
                "data": [{"price": {"id": "price_pro", "nickname": "Pro"}}]
            }
        }),
    }
}

fn invoice_event(succeeded: bool, event_id: &str, subscription_id: &str) -> WebhookEvent {
    WebhookEvent {
        id: event_id.to_string(),
        event_type: if succeeded {
            WebhookEventType::InvoicePaymentSucceeded
        } else {
            WebhookEventType::InvoicePaymentFailed
        },
        data_object: json!({
            "customer": "cus_1",
            "subscription": subscription_id
        }),
    }
}

#[tokio::test]
async fn test_subscription_updated_overwrites_snapshot() {
    let f = fixture();
    let user_id = f.users.add_user("a@example.com", Some("cus_1"), Some("sub_1"));

    let period_end = Utc.timestamp_opt(1_767_225_600, 0).unwrap();
    let event = subscription_updated_event("evt_1", "sub_1", "cus_1", "active", 1_767_225_600);

    let outcome = f.reconciler.handle_event(&event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let user = f.users.get(user_id);
    assert_eq!(user.subscription_status.as_deref(), Some("active"));
    assert_eq!(user.subscription_plan.as_deref(), Some("price_pro"));
    assert_eq!(user.subscription_plan_name.as_deref(), Some("Pro"));
    assert_eq!(user.subscription_period_end, Some(period_end));
    assert_eq!(user.subscription_version, 1);
}

#[tokio::test]
async fn test_duplicate_event_is_skipped_and_state_stable() {
    let f = fixture();
    let user_id = f.users.add_user("a@example.com", Some("cus_1"), Some("sub_1"));

    let event = subscription_updated_event("evt_1", "sub_1", "cus_1", "active", 1_767_225_600);

    assert_eq!(
        f.reconciler.handle_event(&event).await.unwrap(),
        ReconcileOutcome::Applied
    );
    let after_first = f.users.get(user_id);

    assert_eq!(
        f.reconciler.handle_event(&event).await.unwrap(),
        ReconcileOutcome::DuplicateSkipped
    );
    let after_second = f.users.get(user_id);

    assert_eq!(after_first.subscription_status, after_second.subscription_status);
    assert_eq!(after_first.subscription_version, after_second.subscription_version);
    assert_eq!(after_first.subscription_period_end, after_second.subscription_period_end);
}

#[tokio::test]
async fn test_payment_failed_then_succeeded_recovers_active() {
    let f = fixture();
    let user_id = f.users.add_user("a@example.com", Some("cus_1"), Some("sub_1"));

    let refreshed_end = Utc::now() + Duration::days(30);
    f.provider.set_subscription(SubscriptionSnapshot {
        subscription_id: "sub_1".to_string(),
        customer_id: "cus_1".to_string(),
        status: "active".to_string(),
        price_id: Some("price_pro".to_string()),
        plan_name: Some("Pro".to_string()),
        current_period_end: Some(refreshed_end),
    });

    let failed = invoice_event(false, "evt_fail", "sub_1");
    f.reconciler.handle_event(&failed).await.unwrap();
    assert_eq!(
        f.users.get(user_id).subscription_status.as_deref(),
        Some("past_due")
    );

    let succeeded = invoice_event(true, "evt_ok", "sub_1");
    f.reconciler.handle_event(&succeeded).await.unwrap();

    let user = f.users.get(user_id);
    assert_eq!(user.subscription_status.as_deref(), Some("active"));
    assert_eq!(user.subscription_period_end, Some(refreshed_end));
}

#[tokio::test]
async fn test_subscription_deleted_marks_canceled() {
    let f = fixture();
    let user_id = f.users.add_user("a@example.com", Some("cus_1"), Some("sub_1"));

    let event = WebhookEvent {
        id: "evt_del".to_string(),
        event_type: WebhookEventType::SubscriptionDeleted,
        data_object: json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "canceled",
            "current_period_end": 1_767_225_600,
            "items": {"data": []}
        }),
    };

    let outcome = f.reconciler.handle_event(&event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);
    assert_eq!(
        f.users.get(user_id).subscription_status.as_deref(),
        Some("canceled")
    );
}

#[tokio::test]
async fn test_unknown_user_is_absorbed() {
    let f = fixture();

    let event = subscription_updated_event("evt_x", "sub_missing", "cus_missing", "active", 0);
    let outcome = f.reconciler.handle_event(&event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Ignored);
}

#[tokio::test]
async fn test_unknown_event_type_is_ignored() {
    let f = fixture();
    f.users.add_user("a@example.com", Some("cus_1"), Some("sub_1"));

    let event = WebhookEvent {
        id: "evt_odd".to_string(),
        event_type: WebhookEventType::Unknown("charge.refunded".to_string()),
        data_object: json!({}),
    };
    let outcome = f.reconciler.handle_event(&event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Ignored);
}

#[tokio::test]
async fn test_checkout_completed_links_user_and_pulls_snapshot() {
    let f = fixture();
    // Fresh user with no Stripe linkage yet
    let user_id = f.users.add_user("new@example.com", None, None);

    let period_end = Utc::now() + Duration::days(30);
    f.provider.set_subscription(SubscriptionSnapshot {
        subscription_id: "sub_new".to_string(),
        customer_id: "cus_new".to_string(),
        status: "active".to_string(),
        price_id: Some("price_pro".to_string()),
        plan_name: Some("Pro".to_string()),
        current_period_end: Some(period_end),
    });

    let event = WebhookEvent {
        id: "evt_checkout".to_string(),
        event_type: WebhookEventType::CheckoutSessionCompleted,
        data_object: json!({
            "customer": "cus_new",
            "subscription": "sub_new",
            "client_reference_id": user_id.to_string()
        }),
    };

    let outcome = f.reconciler.handle_event(&event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let user = f.users.get(user_id);
    assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_new"));
    assert_eq!(user.stripe_subscription_id.as_deref(), Some("sub_new"));
    assert_eq!(user.subscription_status.as_deref(), Some("active"));
}

#[tokio::test]
async fn test_checkout_resolves_user_by_email_when_unlinked() {
    // Payment-link sessions carry no client_reference_id, and a first-time
    // subscriber has no stored customer id; the buyer email is the only key.
    let f = fixture();
    let user_id = f.users.add_user("buyer@example.com", None, None);

    let period_end = Utc::now() + Duration::days(30);
    f.provider.set_subscription(SubscriptionSnapshot {
        subscription_id: "sub_link".to_string(),
        customer_id: "cus_link".to_string(),
        status: "active".to_string(),
        price_id: Some("price_pro".to_string()),
        plan_name: Some("Pro".to_string()),
        current_period_end: Some(period_end),
    });

    let event = WebhookEvent {
        id: "evt_paylink".to_string(),
        event_type: WebhookEventType::CheckoutSessionCompleted,
        data_object: json!({
            "customer": "cus_link",
            "subscription": "sub_link",
            "client_reference_id": null,
            "customer_details": {"email": "buyer@example.com"}
        }),
    };

    let outcome = f.reconciler.handle_event(&event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let user = f.users.get(user_id);
    assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_link"));
    assert_eq!(user.stripe_subscription_id.as_deref(), Some("sub_link"));
    assert_eq!(user.subscription_status.as_deref(), Some("active"));
}

#[tokio::test]
async fn test_checkout_without_subscription_is_ignored() {
    let f = fixture();
    let user_id = f.users.add_user("new@example.com", None, None);

    let event = WebhookEvent {
        id: "evt_onetime".to_string(),
        event_type: WebhookEventType::CheckoutSessionCompleted,
        data_object: json!({
            "customer": "cus_new",
            "subscription": null,
            "client_reference_id": user_id.to_string()
        }),
    };

    let outcome = f.reconciler.handle_event(&event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert!(f.users.get(user_id).subscription_status.is_none());
}

#[tokio::test]
async fn test_stale_customer_lookup_falls_back() {
    let f = fixture();
    // User has a customer id but the subscription id does not match the event
    let user_id = f.users.add_user("a@example.com", Some("cus_1"), None);

    let event = subscription_updated_event("evt_fb", "sub_newer", "cus_1", "trialing", 0);
    let outcome = f.reconciler.handle_event(&event).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Applied);

    let user = f.users.get(user_id);
    assert_eq!(user.stripe_subscription_id.as_deref(), Some("sub_newer"));
    assert_eq!(user.subscription_status.as_deref(), Some("trialing"));
}

#[tokio::test]
async fn test_event_applied_twice_converges_same_state() {
    // Even with dedup bypassed (two distinct event ids carrying the same
    // payload), snapshot overwrite keeps the final state identical.
    let f = fixture();
    let user_id = f.users.add_user("a@example.com", Some("cus_1"), Some("sub_1"));

    let first = subscription_updated_event("evt_a", "sub_1", "cus_1", "active", 1_767_225_600);
    let second = subscription_updated_event("evt_b", "sub_1", "cus_1", "active", 1_767_225_600);

    f.reconciler.handle_event(&first).await.unwrap();
    let state_one = f.users.get(user_id);
    f.reconciler.handle_event(&second).await.unwrap();
    let state_two = f.users.get(user_id);

    assert_eq!(state_one.subscription_status, state_two.subscription_status);
    assert_eq!(state_one.subscription_plan, state_two.subscription_plan);
    assert_eq!(state_one.subscription_period_end, state_two.subscription_period_end);
}
