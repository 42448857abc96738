//! Test server management utilities
//!
//! Spawns the spaserve binary against a fixture directory and waits until it
//! answers requests.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use reqwest::Client;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use super::filesystem::{FileSystemHelper, TestStructure};
use super::network::NetworkTestHelper;

/// Offset added to a per-process base port, so parallel tests do not race
static PORT_COUNTER: AtomicU16 = AtomicU16::new(0);

const STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct TestServer {
    pub process: Child,
    pub port: u16,
    pub base_url: String,
    pub temp_dir: TempDir,
    pub server_dir: PathBuf,
}

/// Result of running the binary when it is expected to refuse to start
pub struct ExitedServer {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
}

impl ExitedServer {
    pub fn output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

impl TestServer {
    /// Serve the standard SPA fixture over HTTP
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_structure(&FileSystemHelper::spa_structure(), &[]).await
    }

    /// Serve the standard SPA fixture with extra command line flags
    pub async fn with_args(args: &[&str]) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_structure(&FileSystemHelper::spa_structure(), args).await
    }

    pub async fn with_structure(
        structure: &TestStructure,
        args: &[&str],
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let https = args.iter().any(|a| *a == "--ssl" || *a == "--https");
        Self::start(structure, args, https).await
    }

    async fn start(
        structure: &TestStructure,
        args: &[&str],
        https: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let port = get_available_port().await?;
        let temp_dir = TempDir::new()?;
        let server_dir = temp_dir.path().join("dist");

        // The cache is built at startup, so the fixture must exist first
        std::fs::create_dir_all(&server_dir)?;
        FileSystemHelper::create_test_structure(&server_dir, structure)?;

        // Access lines are not read; an undrained pipe would eventually block the server
        let mut process =
            spawn_server(&server_dir, port, args, temp_dir.path(), Stdio::null())?;

        let scheme = if https { "https" } else { "http" };
        let base_url = format!("{}://localhost:{}", scheme, port);
        if let Err(e) = wait_for_server_ready(&base_url, &mut process).await {
            let _ = process.kill();
            let _ = process.wait();
            return Err(e);
        }

        Ok(TestServer {
            process,
            port,
            base_url,
            temp_dir,
            server_dir,
        })
    }

    /// Run the binary with a fixture that should make it exit on its own
    pub async fn expect_exit(
        structure: &TestStructure,
        args: &[&str],
    ) -> Result<ExitedServer, Box<dyn std::error::Error>> {
        let port = get_available_port().await?;
        let temp_dir = TempDir::new()?;
        let server_dir = temp_dir.path().join("dist");
        std::fs::create_dir_all(&server_dir)?;
        FileSystemHelper::create_test_structure(&server_dir, structure)?;

        let process = spawn_server(&server_dir, port, args, temp_dir.path(), Stdio::piped())?;
        wait_for_exit(process).await
    }

    /// Run the binary with exactly `args`, from an empty working directory
    pub async fn run_binary(args: &[&str]) -> Result<ExitedServer, Box<dyn std::error::Error>> {
        let working_dir = TempDir::new()?;
        let process = Command::new(binary_path())
            .args(args)
            .current_dir(working_dir.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        wait_for_exit(process).await
    }

    pub async fn free_port() -> Result<u16, Box<dyn std::error::Error>> {
        get_available_port().await
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("{}{}", self.base_url, path)
    }

    pub fn fixture(&self, path: &str) -> Vec<u8> {
        FileSystemHelper::read(&self.server_dir, path)
    }

    pub fn stop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.process.kill()?;
        self.process.wait()?;
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Spawn with `working_dir` as the current directory, for relative config paths
pub fn spawn_server(
    server_dir: &Path,
    port: u16,
    args: &[&str],
    working_dir: &Path,
    stdout: Stdio,
) -> Result<Child, Box<dyn std::error::Error>> {
    let child = Command::new(binary_path())
        .arg("--port")
        .arg(port.to_string())
        .arg("--path")
        .arg(server_dir)
        .arg("--no-timestamps")
        .args(args)
        .current_dir(working_dir)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .spawn()?;
    Ok(child)
}

pub fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_spaserve"))
}

async fn get_available_port() -> Result<u16, Box<dyn std::error::Error>> {
    let base = 20_000 + (std::process::id() % 200) as u16 * 100;
    let offset = PORT_COUNTER.fetch_add(7, Ordering::SeqCst) % 5_000;
    NetworkTestHelper::get_available_port_from(base + offset).await
}

/// Poll until the server answers; fail fast if the process exits.
async fn wait_for_server_ready(
    base_url: &str,
    process: &mut Child,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(5))
        .build()?;
    let delay = Duration::from_millis(100);
    let started = Instant::now();

    while started.elapsed() < STARTUP_TIMEOUT {
        if let Some(status) = process.try_wait()? {
            let stderr = read_pipe(process.stderr.take());
            return Err(format!(
                "Server at {} exited during startup with {}: {}",
                base_url, status, stderr
            )
            .into());
        }

        match timeout(Duration::from_secs(5), client.get(base_url).send()).await {
            Ok(Ok(_)) => return Ok(()),
            _ => sleep(delay).await,
        }
    }

    Err(format!("Server at {} did not become ready in time", base_url).into())
}

async fn wait_for_exit(mut process: Child) -> Result<ExitedServer, Box<dyn std::error::Error>> {
    let started = Instant::now();
    let mut status = None;

    while started.elapsed() < STARTUP_TIMEOUT {
        if let Some(exit) = process.try_wait()? {
            status = Some(exit);
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    if status.is_none() {
        let _ = process.kill();
        let _ = process.wait();
    }

    Ok(ExitedServer {
        status,
        stdout: read_pipe(process.stdout.take()),
        stderr: read_pipe(process.stderr.take()),
    })
}

fn read_pipe<R: std::io::Read>(pipe: Option<R>) -> String {
    let mut out = String::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_string(&mut out);
    }
    out
}
