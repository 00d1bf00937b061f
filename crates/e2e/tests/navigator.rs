mod common;

use std::time::Duration;

use common::{key, quick_config, FakeSurface};
use portal_e2e::resolver::MenuSelectors;
use portal_e2e::surface::{Surface, WaitState};
use portal_e2e::{E2eError, LayoutRegime, MenuNavigator, NavigationTarget};

fn position(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|line| line == entry)
        .unwrap_or_else(|| panic!("{entry:?} not in {log:#?}"))
}

#[tokio::test]
async fn unknown_width_uses_the_fallback() {
    let config = quick_config();
    let page = FakeSurface::default();

    let wide = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    assert_eq!(wide.regime().await, LayoutRegime::Expanded);

    let narrow = MenuNavigator::new(&page, &config.menu, &config.timeouts, 390);
    assert_eq!(narrow.regime().await, LayoutRegime::Compact);
}

#[tokio::test]
async fn expanded_sidebar_discloses_then_clicks_sub_entry() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(1920);

    let billing = s.text("Billing", true);
    let invoices = s.text("Invoices", true);
    let heading = s.heading("Invoices");
    page.show(&billing);
    page.on_click(&billing, &[&invoices], &[]);
    page.on_click(&invoices, &[&heading], &[]);

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    let target = NavigationTarget::entry(&["Billing"]).with_sub_entry(&["Invoices"]);
    navigator.navigate_to(&target).await.unwrap();

    let log = page.log();
    assert!(position(&log, &format!("click {}", key(&billing))) < position(&log, &format!("click {}", key(&invoices))));
    assert_eq!(log.last().map(String::as_str), Some("load Load"));
    page.wait_for(&heading, WaitState::Visible, Duration::from_millis(10))
        .await
        .unwrap();
}

#[tokio::test]
async fn expanded_sidebar_skips_entry_click_when_already_disclosed() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(1600);

    let domains = s.text("Domains", true);
    let dns = s.text("DNS", true);
    page.show(&domains).show(&dns);

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    navigator
        .navigate_to(&NavigationTarget::entry(&["Domains"]).with_sub_entry(&["DNS"]))
        .await
        .unwrap();

    assert!(!page.clicked(&domains));
    assert!(page.clicked(&dns));
}

#[tokio::test]
async fn icon_only_hovers_entry_and_closes_flyout_last() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(1000);

    let monitoring = s.structural_label("Monitoring", true);
    let healthchecks = s.text("Healthchecks", true);
    page.show(&monitoring).show(&s.anchor());
    page.on_hover(&monitoring, &[&healthchecks]);

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    navigator
        .navigate_to(&NavigationTarget::entry(&["Monitoring"]).with_sub_entry(&["Healthchecks"]))
        .await
        .unwrap();

    let log = page.log();
    let hovered = position(&log, &format!("hover {}", key(&monitoring)));
    let clicked = position(&log, &format!("click {}", key(&healthchecks)));
    let anchored = position(&log, &format!("hover {}", key(&s.anchor())));
    assert!(hovered < clicked && clicked < anchored);
    assert!(!page.clicked(&monitoring));
}

#[tokio::test]
async fn icon_only_clicks_entry_when_hover_does_not_disclose() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(900);

    let monitoring = s.structural_label("Monitoring", true);
    let alerts = s.text("Alerts", true);
    page.show(&monitoring).show(&s.anchor());
    page.on_click(&monitoring, &[&alerts], &[]);

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    navigator
        .navigate_to(&NavigationTarget::entry(&["Monitoring"]).with_sub_entry(&["Alerts"]))
        .await
        .unwrap();

    let log = page.log();
    assert!(position(&log, &format!("click {}", key(&monitoring))) < position(&log, &format!("click {}", key(&alerts))));
}

#[tokio::test]
async fn icon_only_top_level_entry_is_clicked() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(1024);

    let dashboard = s.structural_label("Dashboard", true);
    page.show(&dashboard);

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    navigator
        .navigate_to(&NavigationTarget::entry(&["Dashboard"]))
        .await
        .unwrap();

    assert!(page.clicked(&dashboard));
}

#[tokio::test]
async fn compact_opens_overlay_and_stays_inside_it() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(390);

    let panel = s.overlay_panel();
    let servers = s.text("Servers", true).within(&panel);
    let cloud = s.text("Cloud", true).within(&panel);
    page.show(&s.overlay_toggle());
    page.on_click(&s.overlay_toggle(), &[&panel, &servers], &[]);
    page.on_click(&servers, &[&cloud], &[]);
    // A same-named element outside the panel must not be used.
    page.show(&s.text("Cloud", true));

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    navigator
        .navigate_to(&NavigationTarget::entry(&["Servers"]).with_sub_entry(&["Cloud"]))
        .await
        .unwrap();

    let log = page.log();
    let toggled = position(&log, &format!("click {}", key(&s.overlay_toggle())));
    let scrolled = position(&log, &format!("scroll {}", key(&cloud)));
    let clicked = position(&log, &format!("click {}", key(&cloud)));
    assert!(toggled < scrolled && scrolled < clicked);
    assert!(!page.clicked(&s.text("Cloud", true)));
}

#[tokio::test]
async fn compact_does_not_toggle_an_open_overlay() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(390);

    let panel = s.overlay_panel();
    let dashboard = s.text("Dashboard", true).within(&panel);
    page.show(&s.overlay_toggle()).show(&panel).show(&dashboard);

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    navigator
        .navigate_to(&NavigationTarget::entry(&["Dashboard"]))
        .await
        .unwrap();

    assert!(!page.clicked(&s.overlay_toggle()));
    assert!(page.clicked(&dashboard));
}

#[tokio::test]
async fn unactionable_entry_reports_navigation_timeout() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(1000);

    let billing = s.structural_label("Billing", true);
    page.show(&billing).hover_times_out(&billing);

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    let err = navigator
        .navigate_to(&NavigationTarget::entry(&["Billing"]).with_sub_entry(&["Invoices"]))
        .await
        .unwrap_err();

    match err {
        E2eError::NavigationTimeout { target, timeout_ms } => {
            assert!(target.contains("Billing"));
            assert_eq!(timeout_ms, config.timeouts.action_ms);
        }
        other => panic!("expected navigation timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_sub_entry_fails_resolution() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(1920);
    page.show(&s.text("Billing", true));

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    let err = navigator
        .navigate_to(&NavigationTarget::entry(&["Billing"]).with_sub_entry(&["Refunds"]))
        .await
        .unwrap_err();

    assert!(matches!(err, E2eError::Resolution { regime: LayoutRegime::Expanded, .. }));
}

#[tokio::test]
async fn sub_entry_sharing_the_entry_label_is_not_the_entry_itself() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(390);

    let panel = s.overlay_panel();
    let domains = s.text("Domains", true).within(&panel);
    let domain_list = s.text("Domain List", true).within(&panel);
    page.show(&s.overlay_toggle()).show(&panel).show(&domains);
    page.on_click(&domains, &[&domain_list], &[]);

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    let target = NavigationTarget::entry(&["Domains"]).with_sub_entry(&["Domains", "Domain List"]);
    navigator.navigate_to(&target).await.unwrap();

    let log = page.log();
    let opened = position(&log, &format!("click {}", key(&domains)));
    let clicked = position(&log, &format!("click {}", key(&domain_list)));
    assert!(opened < clicked);
    assert!(!log.contains(&format!("scroll {}", key(&domains))));
}

#[tokio::test]
async fn overlay_that_never_opens_reports_navigation_timeout() {
    let config = quick_config();
    let s = MenuSelectors::default();
    let page = FakeSurface::with_width(390);
    page.show(&s.overlay_toggle());

    let navigator = MenuNavigator::new(&page, &config.menu, &config.timeouts, 1920);
    let err = navigator
        .navigate_to(&NavigationTarget::entry(&["Dashboard"]))
        .await
        .unwrap_err();

    match err {
        E2eError::NavigationTimeout { target, .. } => assert!(target.contains("#mobile-menu")),
        other => panic!("expected navigation timeout, got {other:?}"),
    }
}
