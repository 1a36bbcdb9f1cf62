//! Development session tests.

use std::time::Duration;

use usbuild_lib::bridge::handoff_url;
use usbuild_lib::grants::CATALOG;
use usbuild_lib::manifest::BuildConfiguration;
use usbuild_lib::options::{BuildOptions, ReloadMode};

use super::common::{FakeBundler, Project, RecordingLauncher, dev, file_name, orchestrator};

#[tokio::test]
async fn writes_bridge_that_loads_the_live_bundle() {
  let project = Project::new("live-demo.js");
  let bundler = FakeBundler::with_body("console.log('live');");
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), dev()))
    .await
    .unwrap();

  assert_eq!(file_name(&launched.artifact), "live-demo.proxy.user.js");
  let base = launched.endpoint().base_url();
  let bridge = project.read("live-demo.proxy.user.js");

  assert!(bridge.starts_with("// ==UserScript==\n// @name     live demo\n// @version  0.1.0\n"));
  assert!(bridge.contains(&format!("script.src = \"{base}live-demo.user.js\";")));
  assert!(bridge.contains(&format!("new EventSource(\"{base}esbuild\")")));
  assert!(bridge.contains("location.reload();"));

  assert_eq!(launched.artifact_url, format!("{base}live-demo.proxy.user.js"));
  assert_eq!(launcher.opened(), vec![handoff_url(&launched.artifact_url)]);
}

#[tokio::test]
async fn bridge_manifest_grants_the_whole_catalog() {
  let project = Project::new("grants.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();
  let config = BuildConfiguration::new().with("grant", "GM_setValue");

  orchestrator(&bundler, &launcher)
    .launch(project.request(config, dev()))
    .await
    .unwrap();

  let bridge = project.read("grants.proxy.user.js");
  let grants: Vec<&str> = bridge
    .lines()
    .filter_map(|l| l.strip_prefix("// @grant"))
    .map(str::trim)
    .collect();
  assert_eq!(grants.len(), CATALOG.len());
  assert_eq!(grants[0], "GM_setValue");
  for entry in CATALOG {
    assert!(grants.contains(entry), "missing {entry}");
  }
}

#[tokio::test]
async fn watch_session_keeps_guards_and_writes_into_outdir() {
  let project = Project::new("watched.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();

  orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), dev()))
    .await
    .unwrap();

  let session = bundler.last_session();
  assert!(!session.drop_guards);
  assert_eq!(session.outfile, project.outdir().join("watched.user.js"));
}

#[tokio::test]
async fn serves_the_live_bundle() {
  let project = Project::new("bundle.js");
  let bundler = FakeBundler::with_body("console.log('fresh');");
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), dev()))
    .await
    .unwrap();

  let url = format!("{}bundle.user.js", launched.endpoint().base_url());
  let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
  assert_eq!(body, "console.log('fresh');");
}

#[tokio::test]
async fn rebuilds_are_pushed_on_the_change_stream() {
  let project = Project::new("stream.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), dev()))
    .await
    .unwrap();

  let mut response = reqwest::get(format!("{}esbuild", launched.endpoint().base_url()))
    .await
    .unwrap();
  assert!(response.status().is_success());
  assert_eq!(response.headers()["content-type"], "text/event-stream");

  bundler.rebuild();

  let received = tokio::time::timeout(Duration::from_secs(5), async {
    let mut seen = String::new();
    while let Some(chunk) = response.chunk().await.unwrap() {
      seen.push_str(&String::from_utf8_lossy(&chunk));
      if seen.contains("event: change") {
        break;
      }
    }
    seen
  })
  .await
  .expect("no change event received");
  assert!(received.contains("event: change"));
}

#[tokio::test]
async fn disabled_auto_reload_has_no_stream_and_no_subscription() {
  let project = Project::new("static.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();
  let options = BuildOptions {
    auto_reload: false,
    ..dev()
  };

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), options))
    .await
    .unwrap();

  let bridge = project.read("static.proxy.user.js");
  assert!(!bridge.contains("EventSource"));
  assert!(bridge.contains("function insertScript()"));

  let response = reqwest::get(format!("{}esbuild", launched.endpoint().base_url()))
    .await
    .unwrap();
  assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn local_file_require_points_at_the_bundle_on_disk() {
  let project = Project::new("local.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();
  let options = BuildOptions {
    local_file_require: true,
    auto_reload_mode: ReloadMode::Reinstall,
    ..dev()
  };

  orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), options))
    .await
    .unwrap();

  let bridge = project.read("local.proxy.user.js");
  let bundle_path = project.outdir().join("local.user.js");
  let require = bridge
    .lines()
    .find_map(|l| l.strip_prefix("// @require"))
    .map(str::trim)
    .expect("no @require line");
  assert_eq!(require, usbuild_lib::orchestrate::file_url(&bundle_path));
  assert!(!bridge.contains("insertScript"));
  assert!(bridge.contains("location.reload();"));
}

#[tokio::test]
async fn settle_removes_the_bridge_and_keeps_running() {
  let project = Project::new("forever.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), dev()))
    .await
    .unwrap();
  assert!(project.exists("forever.proxy.user.js"));

  let outcome = tokio::time::timeout(Duration::from_millis(600), launched.settle()).await;
  assert!(outcome.is_err(), "development session settled");
  assert!(!project.exists("forever.proxy.user.js"));
  assert!(project.exists("forever.user.js"));
}

#[tokio::test]
async fn watch_failure_is_fatal_at_startup() {
  let project = Project::new("nostart.js");
  let bundler = FakeBundler::failing();
  let launcher = RecordingLauncher::default();

  let err = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), dev()))
    .await
    .unwrap_err();

  assert!(matches!(err, usbuild_lib::BuildError::Compile(_)));
  assert!(!project.exists("nostart.proxy.user.js"));
  assert!(launcher.opened().is_empty());
}

#[tokio::test]
async fn reserved_url_characters_in_the_entry_name_are_encoded() {
  let project = Project::new("v2#beta.js");
  let bundler = FakeBundler::with_body("console.log('beta');");
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), dev()))
    .await
    .unwrap();

  let base = launched.endpoint().base_url();
  assert_eq!(launched.artifact_url, format!("{base}v2%23beta.proxy.user.js"));
  assert_eq!(launcher.opened(), vec![handoff_url(&launched.artifact_url)]);

  let bridge = project.read("v2#beta.proxy.user.js");
  let bundle_url = format!("{base}v2%23beta.user.js");
  assert!(bridge.contains(&format!("script.src = \"{bundle_url}\";")));

  let bundle = reqwest::get(&bundle_url).await.unwrap();
  assert!(bundle.status().is_success());
  assert_eq!(bundle.text().await.unwrap(), "console.log('beta');");

  let installed = reqwest::get(&launched.artifact_url).await.unwrap();
  assert!(installed.status().is_success());
  assert_eq!(installed.text().await.unwrap(), bridge);
}
