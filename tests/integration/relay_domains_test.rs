//! Integration tests for relay domain accounting.

mod helpers;

use mailhub_core::traits::owner::OwnedObject;
use mailhub_core::types::id::UserId;
use mailhub_core::types::limit::{LimitKind, LimitMax};
use mailhub_core::types::parameter::ParameterLevel;
use mailhub_entity::user::UserRole;
use plugin_relay_domains::{RELAY_DOMAIN_ALIASES_LIMIT, RELAY_DOMAINS_LIMIT};

#[tokio::test]
async fn test_domain_creation_counts_for_creator() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, 10)]).await;
    let admin = app.create_account(UserRole::DomainAdmin).await;
    let other = app.create_account(UserRole::Reseller).await;

    app.create_domain(admin, "relay1.example.com").await.unwrap();
    app.create_domain(admin, "relay2.example.com").await.unwrap();

    assert_eq!(app.domains(&admin).await, 2);
    assert_eq!(app.domains(&other).await, 0);
    assert_eq!(app.aliases(&admin).await, 0);
}

#[tokio::test]
async fn test_domain_creation_without_pool_creates_one() {
    let app = helpers::TestApp::new().await;
    // No account event seen for this owner
    let admin = UserId::new();

    app.create_domain(admin, "relay.example.com").await.unwrap();

    let pool = app.accounting.pool_usage(&admin).await.unwrap().unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].current, 1);
    // Past the registered default of zero; creation is never refused here.
    assert!(pool[0].is_exceeded());
}

#[tokio::test]
async fn test_domain_deletion_releases_domain_and_aliases() {
    let app = helpers::TestApp::with_defaults(&[
        (RELAY_DOMAINS_LIMIT, 5),
        (RELAY_DOMAIN_ALIASES_LIMIT, 5),
    ])
    .await;
    let admin = app.create_account(UserRole::DomainAdmin).await;

    let mut domain = app.create_domain(admin, "relay.example.com").await.unwrap();
    app.create_alias(admin, &mut domain, "alias1.example.com")
        .await
        .unwrap();
    app.create_alias(admin, &mut domain, "alias2.example.com")
        .await
        .unwrap();
    let _kept = app.create_domain(admin, "other.example.com").await.unwrap();

    assert_eq!(app.domains(&admin).await, 2);
    assert_eq!(app.aliases(&admin).await, 2);

    app.delete_domain(domain).await.unwrap();

    assert_eq!(app.domains(&admin).await, 1);
    assert_eq!(app.aliases(&admin).await, 0);
    assert_eq!(app.accounting.clamp_count(), 0);
}

#[tokio::test]
async fn test_redelivered_events_count_once() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, 5)]).await;
    let admin = app.create_account(UserRole::DomainAdmin).await;

    let domain = app.create_domain(admin, "relay.example.com").await.unwrap();
    app.replay_domain_created(admin, &domain).await.unwrap();
    assert_eq!(app.domains(&admin).await, 1);

    app.delete_domain(domain.clone()).await.unwrap();
    app.delete_domain(domain).await.unwrap();
    assert_eq!(app.domains(&admin).await, 0);
    assert_eq!(app.accounting.clamp_count(), 0);
}

#[tokio::test]
async fn test_deletion_releases_the_recorded_owner() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAIN_ALIASES_LIMIT, -1)]).await;
    let admin = app.create_account(UserRole::Reseller).await;
    let other = app.create_account(UserRole::Reseller).await;

    let mut domain = app.create_domain(admin, "relay.example.com").await.unwrap();
    let alias = app
        .create_alias(other, &mut domain, "alias.example.com")
        .await
        .unwrap();
    assert_eq!(
        app.accounting
            .owner_of(&OwnedObject::RelayDomainAlias(alias.id))
            .await
            .unwrap(),
        Some(other)
    );

    app.delete_domain(domain).await.unwrap();

    assert_eq!(app.domains(&admin).await, 0);
    assert_eq!(app.aliases(&other).await, 0);
    assert!(
        app.accounting
            .owner_of(&OwnedObject::RelayDomainAlias(alias.id))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_cascade_skips_alias_with_failed_owner_lookup() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAIN_ALIASES_LIMIT, -1)]).await;
    let admin = app.create_account(UserRole::DomainAdmin).await;

    let mut domain = app.create_domain(admin, "relay.example.com").await.unwrap();
    let broken = app
        .create_alias(admin, &mut domain, "broken.example.com")
        .await
        .unwrap();
    app.create_alias(admin, &mut domain, "fine.example.com")
        .await
        .unwrap();
    app.store
        .break_object(OwnedObject::RelayDomainAlias(broken.id))
        .await;

    app.delete_domain(domain).await.unwrap();

    assert_eq!(app.domains(&admin).await, 0);
    assert_eq!(app.aliases(&admin).await, 1);
}

#[tokio::test]
async fn test_cascade_continues_when_domain_owner_is_unknown() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAIN_ALIASES_LIMIT, -1)]).await;
    let admin = app.create_account(UserRole::DomainAdmin).await;

    let mut domain = app.create_domain(admin, "relay.example.com").await.unwrap();
    app.create_alias(admin, &mut domain, "alias1.example.com")
        .await
        .unwrap();
    app.create_alias(admin, &mut domain, "alias2.example.com")
        .await
        .unwrap();
    app.store
        .break_object(OwnedObject::RelayDomain(domain.id))
        .await;

    app.delete_domain(domain).await.unwrap();

    assert_eq!(app.domains(&admin).await, 1);
    assert_eq!(app.aliases(&admin).await, 0);
}

#[tokio::test]
async fn test_alias_deletion_releases_each_alias() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAIN_ALIASES_LIMIT, -1)]).await;
    let admin = app.create_account(UserRole::Reseller).await;
    let other = app.create_account(UserRole::Reseller).await;

    let mut domain = app.create_domain(admin, "relay.example.com").await.unwrap();
    let mut aliases = Vec::new();
    for i in 0..4 {
        aliases.push(
            app.create_alias(admin, &mut domain, &format!("alias{i}.example.com"))
                .await
                .unwrap(),
        );
    }
    let mut theirs = app.create_domain(other, "theirs.example.com").await.unwrap();
    aliases.push(
        app.create_alias(other, &mut theirs, "their-alias.example.com")
            .await
            .unwrap(),
    );

    assert_eq!(app.aliases(&admin).await, 4);
    assert_eq!(app.aliases(&other).await, 1);

    // Keep the last alias of `admin`
    let kept = aliases.remove(3);
    app.delete_aliases(aliases).await.unwrap();

    assert_eq!(app.aliases(&admin).await, 1);
    assert_eq!(app.aliases(&other).await, 0);
    assert_eq!(app.domains(&admin).await, 1);

    app.delete_aliases(vec![kept]).await.unwrap();
    assert_eq!(app.aliases(&admin).await, 0);
}

#[tokio::test]
async fn test_can_create_follows_the_maximum() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, 1)]).await;
    let admin = app.create_account(UserRole::DomainAdmin).await;
    let dispatcher = app.manager.dispatcher();
    let kind = LimitKind::new(RELAY_DOMAINS_LIMIT);

    let admission = dispatcher
        .can_create(admin, kind.clone())
        .await
        .unwrap()
        .unwrap();
    assert!(admission.is_granted());
    assert_eq!(admission.usage().max, LimitMax::Fixed(1));

    let domain = app.create_domain(admin, "relay.example.com").await.unwrap();

    let admission = dispatcher
        .can_create(admin, kind.clone())
        .await
        .unwrap()
        .unwrap();
    assert!(!admission.is_granted());
    assert_eq!(admission.usage().current, 1);

    app.delete_domain(domain).await.unwrap();

    let admission = dispatcher.can_create(admin, kind).await.unwrap().unwrap();
    assert!(admission.is_granted());
}

#[tokio::test]
async fn test_can_create_unknown_kind_fails() {
    let app = helpers::TestApp::new().await;
    let admin = app.create_account(UserRole::DomainAdmin).await;

    let err = app
        .manager
        .dispatcher()
        .can_create(admin, LimitKind::new("mailboxes_limit"))
        .await
        .unwrap_err();
    assert!(err.is_unknown_kind());
}

#[tokio::test]
async fn test_extra_parameters_on_limits_admin_form() {
    let app = helpers::TestApp::with_defaults(&[("deflt_relay_domains_limit", 4)]).await;
    let dispatcher = app.manager.dispatcher();

    let fields = dispatcher
        .collect_parameters("limits", ParameterLevel::Admin)
        .await
        .unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, "deflt_relay_domains_limit");
    assert_eq!(fields[0].label, "Relay domains");
    assert_eq!(fields[0].initial, 4);
    assert_eq!(fields[1].name, "deflt_relay_domain_aliases_limit");
    assert_eq!(fields[1].label, "Relay domain aliases");
    assert_eq!(fields[1].initial, 0);
    assert!(fields.iter().all(|f| !f.help_text.is_empty()));

    let user_level = dispatcher
        .collect_parameters("limits", ParameterLevel::User)
        .await
        .unwrap();
    assert!(user_level.is_empty());

    let other_app = dispatcher
        .collect_parameters("core", ParameterLevel::Admin)
        .await
        .unwrap();
    assert!(other_app.is_empty());
}

#[tokio::test]
async fn test_new_default_applies_to_new_pools_only() {
    let app = helpers::TestApp::with_defaults(&[(RELAY_DOMAINS_LIMIT, 2)]).await;
    let kind = LimitKind::new(RELAY_DOMAINS_LIMIT);
    let before = app.create_account(UserRole::DomainAdmin).await;

    app.accounting
        .parameters()
        .set_parameter("deflt_relay_domains_limit", 9)
        .await
        .unwrap();
    let after = app.create_account(UserRole::DomainAdmin).await;

    let old = app.accounting.get_usage(&before, &kind).await.unwrap();
    let new = app.accounting.get_usage(&after, &kind).await.unwrap();
    assert_eq!(old.max, LimitMax::Fixed(2));
    assert_eq!(new.max, LimitMax::Fixed(9));
}
