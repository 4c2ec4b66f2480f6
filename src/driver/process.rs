//! Optional local `chromedriver` process.
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A spawned driver binary; killed when dropped.
#[derive(Debug)]
pub struct DriverProcess {
    binary: PathBuf,
    port: u16,
    child: Child,
}

impl DriverProcess {
    /// Locate `binary` on `PATH`, start it on `port`, and wait for `/status`.
    pub fn spawn(binary: &str, port: u16, ready_timeout: Duration) -> Result<Self> {
        let binary = which::which(binary).with_context(|| format!("locate {binary} on PATH"))?;
        let mut process = Self::launch(binary, port)?;
        process.wait_ready(ready_timeout)?;
        Ok(process)
    }

    fn launch(binary: PathBuf, port: u16) -> Result<Self> {
        let child = Command::new(&binary)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn {}", binary.display()))?;
        tracing::info!(binary = %binary.display(), port, pid = child.id(), "driver process started");
        Ok(Self {
            binary,
            port,
            child,
        })
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// True while the child has not exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Restart the binary if it exited since the last check.
    pub fn ensure_running(&mut self, ready_timeout: Duration) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        tracing::warn!(binary = %self.binary.display(), "driver process exited; restarting");
        let mut replacement = Self::launch(self.binary.clone(), self.port)?;
        replacement.wait_ready(ready_timeout)?;
        std::mem::swap(self, &mut replacement);
        Ok(())
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<()> {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(READY_POLL_INTERVAL * 5))
            .build();
        let agent = ureq::Agent::new_with_config(agent_config);
        let status_url = format!("{}/status", self.url());
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_running() {
                return Err(anyhow!("{} exited during startup", self.binary.display()));
            }
            if let Ok(mut response) = agent.get(&status_url).call() {
                let ready = response
                    .body_mut()
                    .read_json::<serde_json::Value>()
                    .ok()
                    .and_then(|body| body.pointer("/value/ready").and_then(|v| v.as_bool()))
                    .unwrap_or(false);
                if ready {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(anyhow!(
                    "{} not ready on port {} after {}s",
                    self.binary.display(),
                    self.port,
                    timeout.as_secs()
                ));
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Port component of an `http://host:port` endpoint, defaulting to 9515.
pub fn endpoint_port(url: &str) -> Result<u16> {
    let authority = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest)
        .split('/')
        .next()
        .unwrap_or_default();
    match authority.rsplit_once(':') {
        Some((_, port)) => port
            .parse()
            .with_context(|| format!("invalid port in webdriver url {url:?}")),
        None => Ok(9515),
    }
}
