mod common;

use std::sync::Arc;

use common::{quick_config, FakeAuth, FakeFactory, FakeSurface};
use portal_e2e::config::SuiteConfig;
use portal_e2e::resolver::MenuSelectors;
use portal_e2e::runner::TestSuiteResult;
use portal_e2e::{LayoutRegime, MenuTopology, SuiteRunner};

const SMALL_MENU: &str = r#"
entries:
  - name: Dashboard
  - name: Billing
    sub_entries:
      - label: Invoices
"#;

fn desktop_only() -> SuiteConfig {
    let mut config = quick_config();
    config.projects = vec![LayoutRegime::Expanded];
    config.contacts.enabled = false;
    config
}

/// A wide page with a working Dashboard and Billing > Invoices.
fn portal_page() -> FakeSurface {
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(1920);
    page.show(&s.text("Dashboard", true))
        .show(&s.text("Billing", true))
        .show(&s.text("Invoices", true))
        .show(&s.heading("Invoices"));
    page.on_click(&s.text("Dashboard", true), &[&s.heading("Dashboard")], &[]);
    page
}

async fn run(
    config: SuiteConfig,
    factory: Arc<FakeFactory>,
    auth: Arc<FakeAuth>,
) -> TestSuiteResult {
    let topology = MenuTopology::from_yaml(SMALL_MENU).unwrap();
    let runner = SuiteRunner::new(config, topology, factory, auth).unwrap();
    runner.run().await.unwrap()
}

#[test]
fn plan_covers_every_leaf_in_every_project() {
    let runner = SuiteRunner::new(
        quick_config(),
        MenuTopology::builtin().unwrap(),
        Arc::new(FakeFactory::new(FakeSurface::default())),
        Arc::new(FakeAuth::default()),
    )
    .unwrap();

    let groups = runner.plan();
    let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["mobile/navigation", "tablet/navigation", "desktop/navigation", "desktop/contacts"]
    );
    assert_eq!(groups[0].checks.len(), 14);
    assert_eq!(groups[0].checks[0].name, "navigation/dashboard");
    assert!(groups[2]
        .checks
        .iter()
        .any(|c| c.name == "navigation/billing/payment-methods"));
    assert_eq!(groups[3].checks.len(), 2);
}

#[test]
fn filter_drops_groups_without_matching_checks() {
    let runner = SuiteRunner::new(
        quick_config(),
        MenuTopology::builtin().unwrap(),
        Arc::new(FakeFactory::new(FakeSurface::default())),
        Arc::new(FakeAuth::default()),
    )
    .unwrap()
    .with_filter(Some("contacts/".to_string()));

    let groups = runner.plan();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "desktop/contacts");
}

#[tokio::test]
async fn group_shares_one_login() {
    let page = portal_page();
    let factory = Arc::new(FakeFactory::new(page.clone()));
    let auth = Arc::new(FakeAuth::default());

    let results = run(desktop_only(), factory.clone(), auth.clone()).await;

    assert!(results.success(), "{results:#?}");
    assert_eq!(results.total, 2);
    assert_eq!(factory.opened(), 1);
    assert_eq!(auth.logins(), 1);
    assert!(page.is_closed());
}

#[tokio::test]
async fn failing_check_does_not_stop_the_group_and_session_still_closes() {
    let s = MenuSelectors::default();
    let page = portal_page();
    // Dashboard never shows its heading.
    page.on_click(&s.text("Dashboard", true), &[], &[]);
    let factory = Arc::new(FakeFactory::new(page.clone()));
    let auth = Arc::new(FakeAuth::default());

    let results = run(desktop_only(), factory.clone(), auth.clone()).await;

    assert_eq!(results.passed, 1);
    assert_eq!(results.failed, 1);
    let checks = &results.groups[0].results;
    assert!(!checks[0].success);
    assert!(checks[0].error.as_deref().unwrap().contains("Dashboard"));
    assert!(checks[1].success);
    assert_eq!(auth.logins(), 1);
    assert!(page.is_closed());
}

#[tokio::test]
async fn failing_check_is_retried() {
    let s = MenuSelectors::default();
    let page = portal_page();
    page.on_click(&s.text("Dashboard", true), &[], &[]);
    let mut config = desktop_only();
    config.retries = 2;

    let results = run(config, Arc::new(FakeFactory::new(page)), Arc::new(FakeAuth::default())).await;

    let checks = &results.groups[0].results;
    assert_eq!(checks[0].attempts, 3);
    assert_eq!(checks[1].attempts, 1);
}

#[tokio::test]
async fn rejected_login_fails_every_check() {
    let factory = Arc::new(FakeFactory::new(portal_page()));
    let auth = Arc::new(FakeAuth::failing());

    let results = run(desktop_only(), factory.clone(), auth.clone()).await;

    assert_eq!(results.failed, 2);
    assert!(results.groups[0].results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("403"));
    // Each check retries the login from scratch.
    assert_eq!(auth.logins(), 2);
    assert_eq!(factory.opened(), 2);
}

#[tokio::test]
async fn each_group_gets_its_own_session() {
    let factory = Arc::new(FakeFactory::new(portal_page()));
    let auth = Arc::new(FakeAuth::default());
    let mut config = desktop_only();
    config.projects = vec![LayoutRegime::Expanded, LayoutRegime::Compact];
    config.workers = 2;

    let results = run(config, factory.clone(), auth.clone()).await;

    assert_eq!(results.groups.len(), 2);
    assert_eq!(auth.logins(), 2);
    assert_eq!(factory.opened(), 2);
}

#[tokio::test]
async fn first_capture_becomes_the_baseline_and_results_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = desktop_only();
    config.visual.enabled = true;
    config.visual.baseline_dir = dir.path().join("baselines");
    config.visual.actual_dir = dir.path().join("screenshots");
    config.visual.diff_dir = dir.path().join("diffs");
    config.output_dir = dir.path().join("results");

    let topology = MenuTopology::from_yaml(SMALL_MENU).unwrap();
    let runner = SuiteRunner::new(
        config,
        topology,
        Arc::new(FakeFactory::new(portal_page())),
        Arc::new(FakeAuth::default()),
    )
    .unwrap();

    let first = runner.run().await.unwrap();
    assert!(first.success(), "{first:#?}");
    let diff = first.groups[0].results[0].visual_diff.as_ref().unwrap();
    assert!(diff.baseline_created);
    assert!(dir
        .path()
        .join("baselines/desktop/navigation/dashboard.png")
        .exists());

    let second = runner.run().await.unwrap();
    let diff = second.groups[0].results[0].visual_diff.as_ref().unwrap();
    assert!(diff.matches);
    assert!(!diff.baseline_created);

    let path = runner.write_results(&second).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["passed"], 2);
}

#[tokio::test]
async fn baseline_update_captures_instead_of_comparing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = desktop_only();
    config.visual.enabled = true;
    config.visual.baseline_dir = dir.path().join("baselines");
    config.visual.actual_dir = dir.path().join("screenshots");
    config.visual.diff_dir = dir.path().join("diffs");

    // A stale baseline the white fake page can never match.
    let stale = dir.path().join("baselines/desktop/navigation/dashboard.png");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]))
        .save(&stale)
        .unwrap();

    let topology = MenuTopology::from_yaml(SMALL_MENU).unwrap();
    let comparing = SuiteRunner::new(
        config.clone(),
        topology.clone(),
        Arc::new(FakeFactory::new(portal_page())),
        Arc::new(FakeAuth::default()),
    )
    .unwrap();
    let before = comparing.run().await.unwrap();
    assert_eq!(before.failed, 1);

    let updating = SuiteRunner::new(
        config,
        topology,
        Arc::new(FakeFactory::new(portal_page())),
        Arc::new(FakeAuth::default()),
    )
    .unwrap()
    .with_baseline_updates(true);
    let results = updating.run().await.unwrap();
    assert!(results.success(), "{results:#?}");
    assert!(results.groups[0].results.iter().all(|r| r.visual_diff.is_none()));
    assert_eq!(updating.update_baselines().unwrap(), 2);

    let after = comparing.run().await.unwrap();
    assert!(after.success(), "{after:#?}");
    let diff = after.groups[0].results[0].visual_diff.as_ref().unwrap();
    assert!(diff.matches && !diff.baseline_created);
}
