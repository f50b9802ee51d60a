//! Install pipeline tests

use std::sync::Arc;

use containerizer::errors::ManagerError;
use containerizer::installer::install::{InstallOutcome, Installer};
use containerizer::pipeline::progress::read_progress;
use containerizer::storage::layout::StorageLayout;
use containerizer::storage::version::{has_version, load_version};
use tokio_test::{assert_err, assert_ok};

use crate::common::{config, env, RecordingRunner, HEAD};

fn installer(base: &std::path::Path, extra: &str, runner: Arc<RecordingRunner>) -> Installer {
    Installer::new(
        Arc::new(config(base, extra)),
        StorageLayout::new(base),
        runner,
    )
}

#[tokio::test]
async fn test_fresh_install_runs_every_stage_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let runner = Arc::new(RecordingRunner::new().sampling_progress(layout.progress_file().path()));
    let installer = installer(dir.path(), "", runner.clone());

    let record = assert_ok!(installer.install(false, &env(&[("API_URL", "https://api.example.com")])).await);

    assert_eq!(
        runner.lines(),
        vec![
            "git clone -b main https://github.com/hrueger/app .",
            "npm install",
            "sh -c npm run build:app",
            "sh -c npm run build",
            "git rev-parse HEAD",
        ]
    );
    let work = dir.path().join("work");
    let commands = runner.commands();
    assert_eq!(commands[0].cwd, work);
    assert_eq!(commands[1].cwd, work.join("api"));
    assert_eq!(commands[2].cwd, work);
    assert_eq!(commands[3].cwd, work.join("api"));

    // pruned after the clone created it
    assert!(!work.join("README.md").exists());
    assert_eq!(record.commit, HEAD);
}

#[tokio::test]
async fn test_fresh_install_ignores_fast_update_mode() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let installer = installer(dir.path(), r#", "fastUpdateMode": true"#, runner.clone());

    assert_eq!(installer.plan(false).total_steps(), 9);
    assert_ok!(installer.install(false, &env(&[])).await);
    assert!(runner.lines()[0].starts_with("git clone"));
}

#[tokio::test]
async fn test_pinned_commit_is_checked_out_after_clone() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let installer = installer(dir.path(), r#", "commit": "abc1234""#, runner.clone());

    assert_ok!(installer.install(false, &env(&[])).await);
    let lines = runner.lines();
    assert!(lines[0].starts_with("git clone"));
    assert_eq!(lines[1], "git checkout abc1234");
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let runner = Arc::new(RecordingRunner::new().sampling_progress(layout.progress_file().path()));
    let installer = installer(dir.path(), "", runner.clone());

    assert_ok!(installer.install(false, &env(&[])).await);

    let samples = runner.progress_samples();
    assert_eq!(samples, vec![2, 4, 6, 7, 8]);
    assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    assert!(samples.iter().all(|step| *step < 9));

    let progress = read_progress(&layout.progress_file()).await.unwrap();
    assert_eq!(progress.step_nr, 9);
    assert_eq!(progress.total_steps, 9);
    assert!(progress.is_complete());
}

#[tokio::test]
async fn test_generated_file_uses_install_time_environment() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let installer = installer(dir.path(), "", runner.clone());

    assert_ok!(installer.install(false, &env(&[("API_URL", "https://api.example.com")])).await);

    let generated = std::fs::read_to_string(dir.path().join("work/api/src/environment.ts")).unwrap();
    assert!(generated.contains("export const environment = "));
    assert!(generated.contains(r#""API_URL": "https://api.example.com""#));
    assert!(generated.contains(r#""production": true"#));
}

#[tokio::test]
async fn test_version_records_resolved_head_not_branch() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let installer = installer(dir.path(), "", Arc::new(RecordingRunner::new()));

    assert!(installer.run(false, &env(&[])).await.is_success());

    let version = load_version(&layout.version_file()).await.unwrap();
    assert_eq!(version.commit, HEAD);
    assert_ne!(version.commit, "main");
    assert_eq!(version.branch, "main");
    assert_eq!(version.repository, "https://github.com/hrueger/app");
    assert!(version.installed_at.is_some());
}

#[tokio::test]
async fn test_fast_update_pulls_and_keeps_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    std::fs::write(work.join("keep.txt"), "local state").unwrap();

    let runner = Arc::new(RecordingRunner::new());
    let installer = installer(dir.path(), "", runner.clone());
    assert_eq!(installer.plan(true).total_steps(), 5);

    assert_ok!(installer.install(true, &env(&[])).await);

    assert_eq!(
        runner.lines(),
        vec![
            "git checkout main",
            "git pull origin main",
            "npm install",
            "sh -c npm run build:app",
            "sh -c npm run build",
            "git rev-parse HEAD",
        ]
    );
    assert!(work.join("keep.txt").exists());

    let progress = read_progress(&layout.progress_file()).await.unwrap();
    assert_eq!((progress.step_nr, progress.total_steps), (5, 5));
}

#[tokio::test]
async fn test_fast_update_honours_pinned_commit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("work")).unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let installer = installer(dir.path(), r#", "commit": "abc1234""#, runner.clone());

    assert_ok!(installer.install(true, &env(&[])).await);
    assert_eq!(
        &runner.lines()[..3],
        &["git checkout main", "git pull origin main", "git checkout abc1234"]
    );
}

#[tokio::test]
async fn test_update_without_fast_mode_reinstalls() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let installer = installer(dir.path(), r#", "fastUpdateMode": false"#, runner.clone());

    assert_eq!(installer.plan(true).total_steps(), 9);
    assert_ok!(installer.install(true, &env(&[])).await);
    assert!(runner.lines()[0].starts_with("git clone"));
}

#[tokio::test]
async fn test_unsupported_template_aborts_before_build() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let runner = Arc::new(RecordingRunner::new());
    let json = crate::common::config_json(dir.path(), "").replace(r#""typescript""#, r#""yaml""#);
    let config = containerizer::storage::config::Configuration::from_json(&json).unwrap();
    let installer = Installer::new(Arc::new(config), layout.clone(), runner.clone());

    let err = assert_err!(installer.install(false, &env(&[])).await);
    assert!(matches!(err, ManagerError::UnsupportedTemplate { ref template, .. } if template == "yaml"));

    assert_eq!(
        runner.lines(),
        vec!["git clone -b main https://github.com/hrueger/app .", "npm install"]
    );
    assert!(!has_version(&layout.version_file()).await);
}

#[tokio::test]
async fn test_failed_command_leaves_progress_stalled_and_no_version() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let runner = Arc::new(RecordingRunner::new().failing_on("npm run build:app"));
    let installer = installer(dir.path(), "", runner.clone());

    let outcome = installer.run(false, &env(&[])).await;
    assert!(matches!(outcome, InstallOutcome::Failed(_)));

    // the additional build never ran
    assert!(!runner.lines().iter().any(|l| l == "sh -c npm run build"));
    assert!(!has_version(&layout.version_file()).await);

    let progress = read_progress(&layout.progress_file()).await.unwrap();
    assert_eq!(progress.step_nr, 6);
    assert_eq!(progress.total_steps, 9);
    assert!(!progress.is_complete());
}

#[tokio::test]
async fn test_reset_progress_rewinds_a_finished_run() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let installer = installer(dir.path(), "", Arc::new(RecordingRunner::new()));

    assert_ok!(installer.install(false, &env(&[])).await);
    let finished = assert_ok!(read_progress(&layout.progress_file()).await);
    assert_eq!(finished.percent(), 100);

    assert_ok!(installer.reset_progress(true).await);
    let rewound = assert_ok!(read_progress(&layout.progress_file()).await);
    assert_eq!(rewound.step_nr, 0);
    assert_eq!(rewound.total_steps, installer.plan(true).total_steps());
    assert!(!rewound.is_complete());
    assert_eq!(rewound.percent(), 0);
}
