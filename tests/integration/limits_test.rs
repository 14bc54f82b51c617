//! Integration tests for limit accounting and the account lifecycle.

mod helpers;

use std::sync::Arc;

use futures::future::join_all;

use mailhub_core::error::ErrorKind;
use mailhub_core::traits::limit_store::{LimitStore, StoreCounts};
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::{LimitKind, LimitMax};
use mailhub_entity::user::UserRole;
use plugin_relay_domains::{RELAY_DOMAIN_ALIASES_LIMIT, RELAY_DOMAINS_LIMIT};

fn domains_kind() -> LimitKind {
    LimitKind::new(RELAY_DOMAINS_LIMIT)
}

#[tokio::test]
async fn test_count_is_stepwise_floor_of_events() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, -1)]).await;
    let owner = UserId::new();
    let kind = domains_kind();

    // true = increment, false = decrement
    let steps = [
        false, true, true, false, false, false, true, true, true, false, true, false,
    ];
    let mut expected: u32 = 0;
    for up in steps {
        if up {
            app.accounting.increment_usage(&owner, &kind).await.unwrap();
            expected += 1;
        } else {
            app.accounting.decrement_usage(&owner, &kind).await.unwrap();
            expected = expected.saturating_sub(1);
        }
        assert_eq!(app.domains(&owner).await, expected);
    }

    // The leading decrement found no pool; only the one at zero was clamped.
    assert_eq!(app.accounting.clamp_count(), 1);
}

#[tokio::test]
async fn test_decrement_with_nothing_stored() {
    let app = helpers::TestApp::new().await;
    let owner = UserId::new();

    let result = app
        .accounting
        .decrement_usage(&owner, &domains_kind())
        .await
        .unwrap();
    assert!(result.is_none());

    let unknown = app
        .accounting
        .decrement_usage(&owner, &LimitKind::new("mailboxes_limit"))
        .await
        .unwrap();
    assert!(unknown.is_none());

    assert_eq!(app.store.counts().await.unwrap(), StoreCounts::default());
    assert_eq!(app.accounting.clamp_count(), 0);
}

#[tokio::test]
async fn test_get_usage_on_untouched_pair() {
    let app = helpers::TestApp::with_defaults(&[("deflt_relay_domains_limit", 7)]).await;
    let owner = UserId::new();

    let usage = app
        .accounting
        .get_usage(&owner, &domains_kind())
        .await
        .unwrap();
    assert_eq!(usage.current, 0);
    assert_eq!(usage.max, LimitMax::Fixed(7));
    assert!(app.store.pool_usage(&owner).await.unwrap().is_none());
    assert_eq!(app.store.counts().await.unwrap(), StoreCounts::default());
}

#[tokio::test]
async fn test_unknown_kind_fails_loudly() {
    let app = helpers::TestApp::new().await;

    let err = app
        .accounting
        .increment_usage(&UserId::new(), &LimitKind::new("mailboxes_limit"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownKind);
    assert!(err.is_unknown_kind());
    assert_eq!(app.store.counts().await.unwrap(), StoreCounts::default());
}

#[tokio::test]
async fn test_limited_roles_get_a_pool() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAIN_ALIASES_LIMIT, 3)]).await;

    let reseller = app.create_account(UserRole::Reseller).await;
    let domain_admin = app.create_account(UserRole::DomainAdmin).await;
    let super_admin = app.create_account(UserRole::SuperAdmin).await;
    let user = app.create_account(UserRole::SimpleUser).await;

    for owner in [reseller, domain_admin] {
        let pool = app.store.pool_usage(&owner).await.unwrap().unwrap();
        let kinds: Vec<&str> = pool.iter().map(|u| u.kind.as_str()).collect();
        assert_eq!(kinds, vec![RELAY_DOMAINS_LIMIT, RELAY_DOMAIN_ALIASES_LIMIT]);
        assert!(pool.iter().all(|u| u.current == 0));
        assert_eq!(pool[0].max, LimitMax::Fixed(0));
        assert_eq!(pool[1].max, LimitMax::Fixed(3));
    }
    assert!(app.store.pool_usage(&super_admin).await.unwrap().is_none());
    assert!(app.store.pool_usage(&user).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_role_creates_no_pool() {
    let app = helpers::TestApp::new().await;
    let user_id = UserId::new();

    app.publish(mailhub_core::events::DomainEvent::system(
        mailhub_core::events::AccountEvent::Created {
            user_id,
            username: "postmaster@example.com".to_string(),
            role: "postmaster".to_string(),
        }
        .into(),
    ))
    .await
    .unwrap();

    assert!(app.store.pool_usage(&user_id).await.unwrap().is_none());
    assert_eq!(app.store.counts().await.unwrap(), StoreCounts::default());
}

#[tokio::test]
async fn test_set_max_changes_one_owner_only() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, 1)]).await;
    let raised = app.create_account(UserRole::DomainAdmin).await;
    let other = app.create_account(UserRole::DomainAdmin).await;
    app.create_domain(raised, "relay.example.com").await.unwrap();

    let usage = app
        .accounting
        .set_max(&raised, &domains_kind(), LimitMax::Fixed(3))
        .await
        .unwrap();
    assert_eq!(usage.current, 1);
    assert_eq!(usage.max, LimitMax::Fixed(3));

    let dispatcher = app.manager.dispatcher();
    let admission = dispatcher
        .can_create(raised, domains_kind())
        .await
        .unwrap()
        .unwrap();
    assert!(admission.is_granted());
    let untouched = app.accounting.get_usage(&other, &domains_kind()).await.unwrap();
    assert_eq!(untouched.max, LimitMax::Fixed(1));
}

#[tokio::test]
async fn test_account_deletion_drops_pool() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, 5)]).await;
    let owner = app.create_account(UserRole::DomainAdmin).await;
    app.create_domain(owner, "relay.example.com").await.unwrap();

    app.publish(mailhub_core::events::DomainEvent::system(
        mailhub_core::events::AccountEvent::Deleted {
            user_id: owner,
            username: "admin@example.com".to_string(),
        }
        .into(),
    ))
    .await
    .unwrap();

    assert!(app.store.pool_usage(&owner).await.unwrap().is_none());
    assert_eq!(app.store.counts().await.unwrap(), StoreCounts::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_and_decrements_are_exact() {
    let app = Arc::new(helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, -1)]).await);
    let owner = UserId::new();

    for _ in 0..20 {
        app.accounting
            .increment_usage(&owner, &domains_kind())
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for i in 0..50 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let kind = domains_kind();
            if i % 5 < 3 {
                app.accounting.increment_usage(&owner, &kind).await.map(|_| ())
            } else {
                app.accounting.decrement_usage(&owner, &kind).await.map(|_| ())
            }
        }));
    }
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    // 20 + 30 increments - 20 decrements; never below zero on the way
    assert_eq!(app.domains(&owner).await, 30);
    assert_eq!(app.accounting.clamp_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_optimistic_admission_keeps_exact_counts() {
    let app = Arc::new(helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, 1)]).await);
    let owner = UserId::new();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let granted = app
                .manager
                .dispatcher()
                .can_create(owner, domains_kind())
                .await
                .unwrap()
                .map(|a| a.is_granted())
                .unwrap_or(true);
            if granted {
                app.create_domain(owner, &format!("relay{i}.example.com"))
                    .await
                    .unwrap();
            }
            granted
        }));
    }

    let granted = join_all(tasks)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count() as u32;

    // Several checks may pass before any increment lands; the count still
    // matches what was actually created.
    assert!(granted >= 1);
    assert_eq!(app.domains(&owner).await, granted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reservation_is_a_hard_gate() {
    let app = Arc::new(helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, 3)]).await);
    let owner = UserId::new();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            app.accounting
                .reserve_usage(&owner, &domains_kind())
                .await
                .unwrap()
                .is_granted()
        }));
    }

    let granted = join_all(tasks)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();

    assert_eq!(granted, 3);
    let usage = app
        .accounting
        .get_usage(&owner, &domains_kind())
        .await
        .unwrap();
    assert_eq!(usage.current, 3);
    assert!(!usage.is_exceeded());
}
