//! End-to-end supervisor runs against a fake engine.

use std::time::Duration;

use tpclash::engine::PrivilegeDescriptor;
use tpclash::lifecycle::ShutdownPhase;
use tpclash::{Shutdown, Supervisor, SupervisorError};

mod common;

use common::{MockController, RecordingProxyMode};

#[tokio::test]
async fn test_local_config_startup_and_shutdown() {
    let controller = MockController::start(vec![]).await;
    let home = tempfile::tempdir().unwrap();
    let source_dir = tempfile::tempdir().unwrap();
    let source = source_dir.path().join("clash.yaml");
    let config_text = common::engine_config(controller.port, "s3cret", "MATCH,DIRECT");
    std::fs::write(&source, &config_text).unwrap();
    common::install_engine(home.path(), "exec sleep 60");

    let proxy_mode = RecordingProxyMode::watching(home.path());
    let supervisor = Supervisor::new(
        common::supervisor_config(home.path(), source.to_str().unwrap()),
        proxy_mode.clone(),
        PrivilegeDescriptor::none(),
    );
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(supervisor.run(shutdown.clone()));

    let pid = common::engine_pid(home.path())
        .await
        .expect("engine should start");
    assert!(common::is_alive(pid));

    // The engine reads exactly what was fetched.
    let persisted = std::fs::read_to_string(home.path().join("xclash.yaml")).unwrap();
    assert_eq!(persisted, config_text);

    // Give startup time to reach the enable step.
    for _ in 0..50 {
        if proxy_mode.events() == vec!["enable"] {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(proxy_mode.events(), vec!["enable"]);

    shutdown.trigger();
    let report = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("supervisor should stop")
        .unwrap()
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.phases.last(), Some(&ShutdownPhase::Stopped));
    assert_eq!(proxy_mode.events(), vec!["enable", "disable"]);
    assert_eq!(proxy_mode.engine_alive_on_disable(), Some(true));
    assert!(!common::is_alive(pid));
    assert!(controller.calls().is_empty());
}

#[tokio::test]
async fn test_remote_first_fetch_failure_is_fatal() {
    let (addr, hits) =
        common::start_config_server(vec![(500, "upstream broken".to_string())]).await;
    let home = tempfile::tempdir().unwrap();
    common::install_engine(home.path(), "exec sleep 60");

    let proxy_mode = RecordingProxyMode::default();
    let supervisor = Supervisor::new(
        common::supervisor_config(home.path(), &format!("http://{addr}/config")),
        proxy_mode.clone(),
        PrivilegeDescriptor::none(),
    );

    let err = supervisor.run(Shutdown::new()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::FirstFetch(_)));
    assert_eq!(err.as_label(), "first_fetch");
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(proxy_mode.events().is_empty());
    assert!(!home.path().join("engine.pid").exists());
}

#[tokio::test]
async fn test_invalid_first_config_is_fatal() {
    let (addr, _) = common::start_config_server(vec![(200, "proxies: [unclosed\n".to_string())]).await;
    let home = tempfile::tempdir().unwrap();
    common::install_engine(home.path(), "exec sleep 60");

    let proxy_mode = RecordingProxyMode::default();
    let supervisor = Supervisor::new(
        common::supervisor_config(home.path(), &format!("http://{addr}/config")),
        proxy_mode.clone(),
        PrivilegeDescriptor::none(),
    );

    let err = supervisor.run(Shutdown::new()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::FirstValidation(_)));
    assert!(proxy_mode.events().is_empty());
    assert!(!home.path().join("xclash.yaml").exists());
}

#[tokio::test]
async fn test_missing_engine_binary_is_fatal() {
    let controller = MockController::start(vec![]).await;
    let (addr, _) = common::start_config_server(vec![(
        200,
        common::engine_config(controller.port, "", "MATCH,DIRECT"),
    )])
    .await;
    let home = tempfile::tempdir().unwrap();

    let proxy_mode = RecordingProxyMode::default();
    let supervisor = Supervisor::new(
        common::supervisor_config(home.path(), &format!("http://{addr}/config")),
        proxy_mode.clone(),
        PrivilegeDescriptor::none(),
    );

    let err = supervisor.run(Shutdown::new()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Spawn(_)));
    // Redirection was never enabled, the cleanup disable is still issued.
    assert_eq!(proxy_mode.events(), vec!["disable"]);
    assert!(home.path().join("xclash.yaml").exists());
}

#[tokio::test]
async fn test_enable_failure_tears_down_engine() {
    let controller = MockController::start(vec![]).await;
    let (addr, _) = common::start_config_server(vec![(
        200,
        common::engine_config(controller.port, "", "MATCH,DIRECT"),
    )])
    .await;
    let home = tempfile::tempdir().unwrap();
    common::install_engine(home.path(), "exec sleep 60");

    let proxy_mode = RecordingProxyMode {
        fail_enable: true,
        ..RecordingProxyMode::watching(home.path())
    };
    let supervisor = Supervisor::new(
        common::supervisor_config(home.path(), &format!("http://{addr}/config")),
        proxy_mode.clone(),
        PrivilegeDescriptor::none(),
    );

    let err = supervisor.run(Shutdown::new()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::EnableProxy(_)));
    assert_eq!(proxy_mode.events(), vec!["enable", "disable"]);
    assert_eq!(proxy_mode.engine_alive_on_disable(), Some(true));

    let pid = common::engine_pid(home.path()).await.unwrap();
    assert!(!common::is_alive(pid));
}

#[tokio::test]
async fn test_unexpected_engine_exit_shuts_down() {
    let controller = MockController::start(vec![]).await;
    let (addr, _) = common::start_config_server(vec![(
        200,
        common::engine_config(controller.port, "", "MATCH,DIRECT"),
    )])
    .await;
    let home = tempfile::tempdir().unwrap();
    common::install_engine(home.path(), "sleep 1\nexit 3");

    let proxy_mode = RecordingProxyMode::default();
    let supervisor = Supervisor::new(
        common::supervisor_config(home.path(), &format!("http://{addr}/config")),
        proxy_mode.clone(),
        PrivilegeDescriptor::none(),
    );

    let err = tokio::time::timeout(Duration::from_secs(10), supervisor.run(Shutdown::new()))
        .await
        .expect("supervisor should stop on its own")
        .unwrap_err();

    match err {
        SupervisorError::EngineExited { status, report } => {
            assert!(status.contains('3'), "{status}");
            assert_eq!(report.phases.last(), Some(&ShutdownPhase::Stopped));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(proxy_mode.events(), vec!["enable", "disable"]);
}

#[tokio::test]
async fn test_settings_rejected_before_startup() {
    let home = tempfile::tempdir().unwrap();
    let mut config = common::supervisor_config(home.path(), "/etc/clash.yaml");
    config.check_interval_secs = 1;

    let proxy_mode = RecordingProxyMode::default();
    let supervisor = Supervisor::new(config, proxy_mode.clone(), PrivilegeDescriptor::none());

    let err = supervisor.run(Shutdown::new()).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Settings(_)));
    assert!(proxy_mode.events().is_empty());
}

#[tokio::test]
async fn test_shutdown_waits_for_inflight_reload() {
    // The engine answers reloads slowly; shutdown is requested mid-call.
    let controller = MockController::start_delayed(vec![], Duration::from_millis(800)).await;
    let home = tempfile::tempdir().unwrap();
    let source_dir = tempfile::tempdir().unwrap();
    let source = source_dir.path().join("clash.yaml");
    std::fs::write(
        &source,
        common::engine_config(controller.port, "s3cret", "MATCH,DIRECT"),
    )
    .unwrap();
    common::install_engine(home.path(), "exec sleep 60");

    let proxy_mode = RecordingProxyMode {
        events: controller.events(),
        ..RecordingProxyMode::watching(home.path())
    };
    let supervisor = Supervisor::new(
        common::supervisor_config(home.path(), source.to_str().unwrap()),
        proxy_mode.clone(),
        PrivilegeDescriptor::none(),
    );
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(supervisor.run(shutdown.clone()));

    for _ in 0..100 {
        if proxy_mode.events().contains(&"enable") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(proxy_mode.events(), vec!["enable"]);

    // Editing the local source triggers an immediate re-fetch and reload.
    let updated = common::engine_config(controller.port, "rotated", "MATCH,REJECT");
    std::fs::write(&source, &updated).unwrap();

    // Worst case the periodic tick picks the change up.
    for _ in 0..750 {
        if proxy_mode.events().contains(&"reload-received") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(proxy_mode.events().contains(&"reload-received"));
    shutdown.trigger();

    let report = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("supervisor should stop")
        .unwrap()
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(
        proxy_mode.events(),
        vec!["enable", "reload-received", "reload-answered", "disable"]
    );
    assert_eq!(proxy_mode.engine_alive_on_disable(), Some(true));

    let calls = controller.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].authorization, "Bearer rotated");
    assert_eq!(
        std::fs::read_to_string(home.path().join("xclash.yaml")).unwrap(),
        updated
    );
}
