//! Supervision of the Node.js sidecar process.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    anyhow::{Context, Result, bail},
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, BufReader},
        process::{Child, Command},
    },
    tracing::{Level, debug, error, info, warn},
};

use crate::sidecar::DEFAULT_SIDECAR_PORT;

/// Overrides where the sidecar sources live.
pub const ENV_SIDECAR_DIR: &str = "COURIER_WHATSAPP_SIDECAR_DIR";
/// Port the sidecar listens on (set for the child).
pub const ENV_SIDECAR_PORT: &str = "COURIER_WHATSAPP_PORT";
/// Session store directory (set for the child).
pub const ENV_AUTH_DIR: &str = "COURIER_WHATSAPP_AUTH_DIR";

const SIDECAR_SUBDIR: &str = "sidecar/whatsapp-baileys";
const STOP_GRACE: Duration = Duration::from_secs(5);
const STARTUP_PROBE: Duration = Duration::from_millis(500);

/// A running sidecar.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, then kill if the process is still alive after the grace period.
    pub async fn stop(&mut self) -> Result<()> {
        info!(port = self.port, "stopping WhatsApp sidecar process");

        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{Signal, kill},
                unistd::Pid,
            };

            if let Some(pid) = self.child.id().and_then(|pid| i32::try_from(pid).ok()) {
                let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "WhatsApp sidecar process exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for sidecar process"),
            Err(_) => {
                warn!("sidecar process did not exit gracefully, killing");
                self.child
                    .kill()
                    .await
                    .context("failed to kill sidecar process")?;
            },
        }
        Ok(())
    }
}

/// How to launch the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Directory containing the sidecar's `package.json`.
    pub sidecar_dir: PathBuf,
    pub port: u16,
    pub auth_dir: Option<PathBuf>,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            sidecar_dir: PathBuf::new(),
            port: DEFAULT_SIDECAR_PORT,
            auth_dir: None,
        }
    }
}

/// Locate the sidecar sources.
///
/// Order: explicit path, `COURIER_WHATSAPP_SIDECAR_DIR`, next to the
/// executable (installed layout and `cargo run`), then relative to the
/// working directory.
pub fn find_sidecar_dir(explicit_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        if has_package_json(path) {
            return Ok(path.to_path_buf());
        }
        bail!(
            "sidecar directory does not exist or missing package.json: {}",
            path.display()
        );
    }

    if let Ok(dir) = std::env::var(ENV_SIDECAR_DIR) {
        let path = PathBuf::from(&dir);
        if has_package_json(&path) {
            return Ok(path);
        }
        warn!(path = %dir, "{ENV_SIDECAR_DIR} set but package.json not found");
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let mut candidates = Vec::new();
    if let Some(exe_dir) = exe_dir {
        candidates.push(exe_dir.join("..").join(SIDECAR_SUBDIR));
        candidates.push(exe_dir.join("../..").join(SIDECAR_SUBDIR));
    }
    for prefix in [".", "..", "../.."] {
        candidates.push(Path::new(prefix).join(SIDECAR_SUBDIR));
    }

    first_with_package_json(candidates).with_context(|| {
        format!(
            "WhatsApp sidecar not found. Set {ENV_SIDECAR_DIR} or ensure {SIDECAR_SUBDIR} \
             exists with package.json"
        )
    })
}

fn first_with_package_json(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .find(|p| has_package_json(p))
        .map(|p| p.canonicalize().unwrap_or(p))
}

fn has_package_json(dir: &Path) -> bool {
    dir.join("package.json").exists()
}

pub fn is_sidecar_built(sidecar_dir: &Path) -> bool {
    sidecar_dir.join("dist/index.js").exists()
}

/// Build if needed, spawn, and check the process survives its first moments.
pub async fn start_sidecar(config: SidecarConfig) -> Result<SidecarProcess> {
    let sidecar_dir = &config.sidecar_dir;
    if !has_package_json(sidecar_dir) {
        bail!(
            "WhatsApp sidecar not found at {dir}. Run `cd {dir} && npm install && npm run \
             build` first.",
            dir = sidecar_dir.display()
        );
    }

    if !is_sidecar_built(sidecar_dir) {
        info!(path = %sidecar_dir.display(), "building WhatsApp sidecar");
        if !sidecar_dir.join("node_modules").exists() {
            run_npm(sidecar_dir, &["install"]).await?;
        }
        run_npm(sidecar_dir, &["run", "build"]).await?;
    }

    info!(
        path = %sidecar_dir.display(),
        port = config.port,
        "starting WhatsApp sidecar process"
    );

    let mut cmd = Command::new("node");
    cmd.arg("dist/index.js")
        .current_dir(sidecar_dir)
        .env(ENV_SIDECAR_PORT, config.port.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(auth_dir) = &config.auth_dir {
        std::fs::create_dir_all(auth_dir)
            .with_context(|| format!("failed to create {}", auth_dir.display()))?;
        cmd.env(ENV_AUTH_DIR, auth_dir);
    }

    let mut child = cmd.spawn().context("failed to spawn sidecar process")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, false));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, true));
    }

    tokio::time::sleep(STARTUP_PROBE).await;
    match child.try_wait() {
        Ok(Some(status)) => bail!("sidecar process exited immediately with status: {status}"),
        Ok(None) => {},
        Err(e) => bail!("failed to check sidecar process status: {e}"),
    }

    info!(port = config.port, "WhatsApp sidecar process started");
    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

async fn run_npm(sidecar_dir: &Path, args: &[&str]) -> Result<()> {
    let command = format!("npm {}", args.join(" "));
    info!(path = %sidecar_dir.display(), command, "running for sidecar");

    let output = Command::new("npm")
        .args(args)
        .current_dir(sidecar_dir)
        .output()
        .await
        .with_context(|| format!("failed to run {command}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{command} failed: {stderr}");
    }
    Ok(())
}

async fn forward_lines(stream: impl AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let (level, msg) = if is_stderr {
            (Level::WARN, line.clone())
        } else {
            parse_log_line(&line)
        };
        match level {
            Level::TRACE | Level::DEBUG => debug!(target: "whatsapp_sidecar", "{msg}"),
            Level::INFO => info!(target: "whatsapp_sidecar", "{msg}"),
            Level::WARN => warn!(target: "whatsapp_sidecar", "{msg}"),
            _ => error!(target: "whatsapp_sidecar", "{msg}"),
        }
    }
}

/// Read a pino JSON log line. Non-JSON lines are logged as info.
fn parse_log_line(line: &str) -> (Level, String) {
    let parsed = line
        .starts_with('{')
        .then(|| serde_json::from_str::<serde_json::Value>(line).ok())
        .flatten();
    let Some(log) = parsed else {
        return (Level::INFO, line.to_string());
    };

    let level = match log.get("level").and_then(serde_json::Value::as_u64) {
        Some(0..=20) => Level::DEBUG,
        Some(21..=30) | None => Level::INFO,
        Some(31..=40) => Level::WARN,
        Some(_) => Level::ERROR,
    };
    let msg = log
        .get("msg")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(line)
        .to_string();
    (level, msg)
}
