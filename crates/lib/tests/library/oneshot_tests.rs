//! One-shot build tests.

use std::time::{Duration, Instant};

use usbuild_lib::BuildError;
use usbuild_lib::bridge::handoff_url;
use usbuild_lib::manifest::BuildConfiguration;

use super::common::{FakeBundler, Project, RecordingLauncher, file_name, one_shot, orchestrator};

#[tokio::test]
async fn writes_final_artifact_with_detected_grants() {
  let project = Project::new("hello-world.js");
  let body = "\n;(async function () {\nGM_setValue('k', 1);\nwindow.open('x');\nwindow.close();\n})();";
  let bundler = FakeBundler::with_body(body);
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap();

  assert_eq!(file_name(&launched.artifact), "hello-world.user.js");
  let expected = format!(
    "// ==UserScript==\n\
     // @name     hello world\n\
     // @version  0.1.0\n\
     // @grant    GM_setValue\n\
     // @grant    window.close\n\
     // ==/UserScript==\n\n{body}"
  );
  assert_eq!(project.read("hello-world.user.js"), expected);
}

#[tokio::test]
async fn trivial_module_gets_derived_name_default_version_and_no_grants() {
  let project = Project::new("my_trivial-script.js");
  let bundler = FakeBundler::with_body("console.log(1);");
  let launcher = RecordingLauncher::default();

  orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap();

  assert_eq!(
    project.read("my_trivial-script.user.js"),
    "// ==UserScript==\n// @name     my trivial script\n// @version  0.1.0\n// ==/UserScript==\n\nconsole.log(1);"
  );
}

#[tokio::test]
async fn user_grants_come_first_and_are_not_duplicated() {
  let project = Project::new("demo.js");
  let bundler = FakeBundler::with_body("GM_getValue('a'); GM_log('b');");
  let launcher = RecordingLauncher::default();
  let config = BuildConfiguration::new()
    .with("namespace", "https://example.com")
    .with("grant", vec!["GM_log", "GM_notification"])
    .with("name", "Demo");

  orchestrator(&bundler, &launcher)
    .launch(project.request(config, one_shot()))
    .await
    .unwrap();

  let artifact = project.read("demo.user.js");
  let fields: Vec<&str> = artifact.lines().filter(|l| l.starts_with("// @")).collect();
  assert_eq!(
    fields,
    [
      "// @name       Demo",
      "// @namespace  https://example.com",
      "// @grant      GM_log",
      "// @grant      GM_notification",
      "// @grant      GM_getValue",
      "// @version    0.1.0",
    ]
  );
}

#[tokio::test]
async fn rebuilding_is_byte_identical() {
  let project = Project::new("same.js");
  let bundler = FakeBundler::with_body("GM_addStyle('a{}');");
  let launcher = RecordingLauncher::default();
  let orchestrator = orchestrator(&bundler, &launcher);

  orchestrator
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap();
  let first = project.read("same.user.js");

  orchestrator
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap();
  assert_eq!(project.read("same.user.js"), first);
}

#[tokio::test]
async fn production_compile_drops_guards() {
  let project = Project::new("guarded.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();

  orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap();

  let session = bundler.last_session();
  assert!(session.drop_guards);
  assert_eq!(file_name(&session.entry), "guarded.js");
}

#[tokio::test]
async fn serves_artifact_and_hands_it_to_the_browser() {
  let project = Project::new("served.js");
  let bundler = FakeBundler::with_body("GM_info;");
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap();

  assert_eq!(
    launched.artifact_url,
    format!("{}served.user.js", launched.endpoint().base_url())
  );
  assert_eq!(launcher.opened(), vec![handoff_url(&launched.artifact_url)]);

  let response = reqwest::get(&launched.artifact_url).await.unwrap();
  assert!(response.status().is_success());
  assert_eq!(
    response.headers()["content-type"],
    "application/javascript; charset=utf-8"
  );
  assert_eq!(response.headers()["access-control-allow-origin"], "*");
  assert_eq!(response.text().await.unwrap(), project.read("served.user.js"));

  let missing = reqwest::get(format!("{}nope.js", launched.endpoint().base_url()))
    .await
    .unwrap();
  assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn no_change_stream_outside_development() {
  let project = Project::new("quiet.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap();

  let response = reqwest::get(format!("{}esbuild", launched.endpoint().base_url()))
    .await
    .unwrap();
  assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn compile_failure_writes_nothing_and_skips_handoff() {
  let project = Project::new("broken.js");
  let bundler = FakeBundler::failing();
  let launcher = RecordingLauncher::default();

  let err = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap_err();

  assert!(matches!(err, BuildError::Compile(_)));
  assert!(err.to_string().contains("Could not resolve"));
  assert!(!project.exists("broken.user.js"));
  assert!(launcher.opened().is_empty());
}

#[tokio::test]
async fn unparseable_output_is_fatal() {
  let project = Project::new("garbled.js");
  let bundler = FakeBundler::with_body("function (");
  let launcher = RecordingLauncher::default();

  let err = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap_err();

  assert!(matches!(err, BuildError::Detect(_)));
  assert!(!project.exists("garbled.user.js"));
}

#[tokio::test]
async fn missing_entry_fails_before_compiling() {
  let project = Project::new("present.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();

  let mut request = project.request(BuildConfiguration::new(), one_shot());
  request.entry = project.temp.path().join("absent.js");

  let err = orchestrator(&bundler, &launcher).launch(request).await.unwrap_err();
  assert!(matches!(err, BuildError::Entry { .. }));
  assert!(bundler.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn settle_returns_only_after_the_handoff_delay() {
  let project = Project::new("timed.js");
  let bundler = FakeBundler::with_body("1;");
  let launcher = RecordingLauncher::default();

  let launched = orchestrator(&bundler, &launcher)
    .launch(project.request(BuildConfiguration::new(), one_shot()))
    .await
    .unwrap();

  let started = Instant::now();
  launched.settle().await.unwrap();
  assert!(started.elapsed() >= Duration::from_millis(100));
  assert!(project.exists("timed.user.js"));
}
