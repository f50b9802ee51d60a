//! The managed client application process.
//!
//! The app runs as a child process whose stdout/stderr are read line by line
//! and published as [`AppEvent`]s on a broadcast channel. Every event is also
//! relayed to the manager's own log with a tag naming the stream.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::ManagerError;

const EVENT_CAPACITY: usize = 1024;
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle events of the managed app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Started { pid: Option<u32> },
    Stdout(String),
    Stderr(String),
    /// Exit code, `None` when killed by a signal
    Exited(Option<i32>),
    SpawnFailed(String),
}

/// How to launch the app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl AppCommand {
    /// `<start_command> <start_file>` run from `cwd`
    pub fn new(start_command: &str, start_file: PathBuf, cwd: PathBuf) -> Self {
        Self {
            program: start_command.to_string(),
            args: vec![start_file.to_string_lossy().to_string()],
            cwd,
        }
    }
}

struct RunningApp {
    pid: Option<u32>,
    stop_tx: oneshot::Sender<Duration>,
    monitor: JoinHandle<()>,
}

/// Handle to the managed app. At most one instance runs at a time.
pub struct ManagedApp {
    command: AppCommand,
    events: broadcast::Sender<AppEvent>,
    running: Mutex<Option<RunningApp>>,
}

impl ManagedApp {
    pub fn new(command: AppCommand) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            command,
            events,
            running: Mutex::new(None),
        }
    }

    pub fn command(&self) -> &AppCommand {
        &self.command
    }

    /// Subscribe to app events
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Whether the app process is alive
    pub async fn is_running(&self) -> bool {
        match self.running.lock().await.as_ref() {
            Some(app) => !app.monitor.is_finished(),
            None => false,
        }
    }

    /// Spawn the app. Does nothing if it is already running.
    pub async fn start(&self) -> Result<(), ManagerError> {
        let mut running = self.running.lock().await;
        if let Some(app) = running.as_ref() {
            if !app.monitor.is_finished() {
                debug!("Client app already running (pid {:?})", app.pid);
                return Ok(());
            }
        }

        info!(
            "Starting client app: {} {}",
            self.command.program,
            self.command.args.join(" ")
        );

        let mut child = match Command::new(&self.command.program)
            .args(&self.command.args)
            .current_dir(&self.command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let message = format!("Failed to start {}: {}", self.command.program, e);
                relay(&self.events, AppEvent::SpawnFailed(message.clone()));
                return Err(ManagerError::ProcessError(message));
            }
        };

        let pid = child.id();
        relay(&self.events, AppEvent::Started { pid });

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, self.events.clone(), AppEvent::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, self.events.clone(), AppEvent::Stderr));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor(child, readers, stop_rx, self.events.clone()));

        *running = Some(RunningApp {
            pid,
            stop_tx,
            monitor,
        });
        Ok(())
    }

    /// Send the termination signal and wait up to `grace` for the app to
    /// exit, then kill it.
    pub async fn stop(&self, grace: Duration) -> Result<(), ManagerError> {
        let app = match self.running.lock().await.take() {
            Some(app) => app,
            None => return Ok(()),
        };

        if app.monitor.is_finished() {
            return Ok(());
        }

        info!("Stopping client app (pid {:?})", app.pid);
        let _ = app.stop_tx.send(grace);
        app.monitor
            .await
            .map_err(|e| ManagerError::ProcessError(format!("Client app monitor failed: {}", e)))
    }
}

fn spawn_reader<R>(
    stream: R,
    events: broadcast::Sender<AppEvent>,
    wrap: fn(String) -> AppEvent,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => relay(&events, wrap(line)),
                Ok(None) => break,
                Err(e) => {
                    warn!("Client app output read error: {}", e);
                    break;
                }
            }
        }
    })
}

enum Wake {
    Exited(std::io::Result<ExitStatus>),
    Stop(Duration),
}

async fn monitor(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    stop_rx: oneshot::Receiver<Duration>,
    events: broadcast::Sender<AppEvent>,
) {
    let wake = tokio::select! {
        status = child.wait() => Wake::Exited(status),
        Ok(grace) = stop_rx => Wake::Stop(grace),
    };

    let status = match wake {
        Wake::Exited(status) => status,
        Wake::Stop(grace) => {
            terminate(&mut child);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!("Client app did not exit within {:?}, killing it", grace);
                    if let Err(e) = child.kill().await {
                        error!("Failed to kill client app: {}", e);
                    }
                    child.wait().await
                }
            }
        }
    };

    // flush remaining output before reporting the exit
    for reader in readers {
        let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, reader).await;
    }

    match status {
        Ok(status) => relay(&events, AppEvent::Exited(status.code())),
        Err(e) => {
            error!("Failed to wait for client app: {}", e);
            relay(&events, AppEvent::Exited(None));
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("Failed to send SIGTERM to client app: {}", e);
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Log an event with its stream tag and publish it to subscribers
fn relay(events: &broadcast::Sender<AppEvent>, event: AppEvent) {
    match &event {
        AppEvent::Started { pid } => info!("Client app started (pid {:?})", pid),
        AppEvent::Stdout(line) => info!("{} {}", "Client app:".cyan(), line),
        AppEvent::Stderr(line) => info!("{} {}", "Client app:".red(), line),
        AppEvent::Exited(code) => {
            let code = code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
            info!("{}", format!("Client app exited with code {}.", code).yellow());
        }
        AppEvent::SpawnFailed(message) => error!("{}", message),
    }
    // no subscribers is fine
    let _ = events.send(event);
}
