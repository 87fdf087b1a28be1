//! 샌드박스 프로세스 관리자
//!
//! 레지스트리의 샌드박스마다 `survival-sandboxd` 프로세스를 하나씩 띄우고,
//! 실행이 끝나면 모두 정리합니다.
//!
//! # 수명 보장
//!
//! - 기동은 순차적이며, 하나라도 실패하면 이미 띄운 프로세스를 모두 정리한 뒤 에러를 반환
//! - [`SandboxManager::stop_all`]: SIGTERM → 유예 시간 대기 → SIGKILL, 두 번 호출해도 안전
//! - 자식 프로세스는 `kill_on_drop`으로 띄우고 관리자 `Drop`에서도 강제 종료하므로
//!   패닉이나 취소로 빠져나가도 프로세스가 남지 않음

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use survival_core::config::SandboxProcessConfig;
use survival_core::metrics as m;
use survival_core::types::SandboxKind;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::error::SandboxError;
use crate::registry::{SandboxConfig, SandboxEndpoints, SandboxRegistry};

/// 샌드박스 바이너리 이름
pub const SANDBOX_BINARY: &str = "survival-sandboxd";

/// 헬스 체크 폴링 간격
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 헬스 체크 요청 하나의 타임아웃
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_millis(250);

struct RunningSandbox {
    config: SandboxConfig,
    child: Child,
}

/// 샌드박스 프로세스 그룹
pub struct SandboxManager {
    registry: SandboxRegistry,
    binary: PathBuf,
    magick_binary: String,
    startup_timeout: Duration,
    shutdown_grace: Duration,
    client: reqwest::Client,
    running: Vec<RunningSandbox>,
}

impl SandboxManager {
    /// 설정으로 관리자를 만듭니다.
    ///
    /// `binary`가 비어 있으면 현재 실행 파일과 같은 디렉토리의 `survival-sandboxd`를 사용합니다.
    pub fn from_config(config: &SandboxProcessConfig) -> Result<Self, SandboxError> {
        let binary = if config.binary.is_empty() {
            default_binary()?
        } else {
            PathBuf::from(&config.binary)
        };

        Self::new(binary, config)
    }

    /// 바이너리 경로를 지정하여 만듭니다.
    pub fn new(binary: impl Into<PathBuf>, config: &SandboxProcessConfig) -> Result<Self, SandboxError> {
        let client = reqwest::Client::builder()
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SandboxError::Spawn {
                sandbox: SANDBOX_BINARY.to_owned(),
                reason: format!("failed to build health client: {e}"),
            })?;

        Ok(Self {
            registry: SandboxRegistry::builtin(),
            binary: binary.into(),
            magick_binary: config.magick_binary.clone(),
            startup_timeout: config.startup_timeout(),
            shutdown_grace: config.shutdown_grace(),
            client,
            running: Vec::new(),
        })
    }

    /// 레지스트리를 교체합니다 (테스트용 포트 지정 등).
    pub fn with_registry(mut self, registry: SandboxRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &SandboxRegistry {
        &self.registry
    }

    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }

    /// 추적 중인 프로세스 수
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// 모든 샌드박스를 순차적으로 띄우고 헬스 체크를 통과할 때까지 기다립니다.
    pub async fn start_all(&mut self) -> Result<(), SandboxError> {
        let entries: Vec<SandboxConfig> = self.registry.iter().cloned().collect();

        for config in entries {
            match self.start_one(&config).await {
                Ok(child) => {
                    metrics::counter!(
                        m::SANDBOX_STARTS_TOTAL,
                        m::LABEL_SANDBOX => config.name.clone(),
                        m::LABEL_RESULT => "success"
                    )
                    .increment(1);
                    tracing::info!(
                        sandbox = %config.name,
                        port = config.port,
                        pid = child.id(),
                        "sandbox started"
                    );
                    self.running.push(RunningSandbox { config, child });
                }
                Err(e) => {
                    metrics::counter!(
                        m::SANDBOX_STARTS_TOTAL,
                        m::LABEL_SANDBOX => config.name.clone(),
                        m::LABEL_RESULT => "failure"
                    )
                    .increment(1);
                    tracing::error!(sandbox = %config.name, error = %e, "sandbox failed to start");
                    if let Err(stop_err) = self.stop_all().await {
                        tracing::error!(error = %stop_err, "rollback after failed start was incomplete");
                    }
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    async fn start_one(&self, config: &SandboxConfig) -> Result<Child, SandboxError> {
        let mut child = Command::new(&self.binary)
            .arg("--variant")
            .arg(config.kind.as_str())
            .arg("--port")
            .arg(config.port.to_string())
            .arg("--magick-bin")
            .arg(&self.magick_binary)
            .arg("--log-format")
            .arg("json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Spawn {
                sandbox: config.name.clone(),
                reason: format!("{}: {e}", self.binary.display()),
            })?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(config.name.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(config.name.clone(), "stderr", stderr);
        }

        // 실패 시 child가 드롭되며 kill_on_drop으로 정리됨
        self.wait_healthy(config, &mut child).await?;
        Ok(child)
    }

    async fn wait_healthy(&self, config: &SandboxConfig, child: &mut Child) -> Result<(), SandboxError> {
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut last_error = String::from("no response");

        loop {
            attempts += 1;

            let exited = child.try_wait().map_err(|e| SandboxError::Spawn {
                sandbox: config.name.clone(),
                reason: e.to_string(),
            })?;
            if let Some(status) = exited {
                return Err(SandboxError::Exited {
                    sandbox: config.name.clone(),
                    status: status.to_string(),
                });
            }

            match self.check_health(config).await {
                Ok(()) => {
                    tracing::debug!(sandbox = %config.name, attempts, "sandbox healthy");
                    return Ok(());
                }
                Err(reason) => last_error = reason,
            }

            if start.elapsed() >= self.startup_timeout {
                return Err(SandboxError::Unhealthy {
                    sandbox: config.name.clone(),
                    port: config.port,
                    reason: format!("readiness timeout after {attempts} attempts: {last_error}"),
                });
            }

            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    async fn check_health(&self, config: &SandboxConfig) -> Result<(), String> {
        let response = self
            .client
            .get(config.health_url())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("health endpoint returned {}", response.status()));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        match body.get("sandbox").and_then(serde_json::Value::as_str) {
            Some(name) if name == config.kind.as_str() => Ok(()),
            other => Err(format!(
                "port {} is served by {other:?}, expected {}",
                config.port, config.kind
            )),
        }
    }

    /// 추적 중인 모든 프로세스를 종료하고 추적 상태를 비웁니다.
    ///
    /// 개별 종료 실패가 있어도 나머지 프로세스를 계속 정리하며, 첫 번째 에러를 반환합니다.
    /// 이미 비어 있으면 아무 일도 하지 않습니다.
    pub async fn stop_all(&mut self) -> Result<(), SandboxError> {
        let mut first_error = None;

        // 띄운 역순으로 정리
        while let Some(running) = self.running.pop() {
            let name = running.config.name.clone();
            if let Err(e) = stop_child(running, self.shutdown_grace).await {
                tracing::error!(sandbox = %name, error = %e, "failed to stop sandbox");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 이름으로 기본 URL을 찾습니다.
    pub fn sandbox_url(&self, name: &str) -> Result<String, SandboxError> {
        self.registry.get(name).map(SandboxConfig::base_url)
    }

    /// 종류로 기본 URL을 찾습니다.
    pub fn sandbox_url_for(&self, kind: SandboxKind) -> Result<String, SandboxError> {
        self.registry.for_kind(kind).map(SandboxConfig::base_url)
    }

    /// 러너에 넘길 종류별 URL 맵
    pub fn endpoints(&self) -> SandboxEndpoints {
        let mut endpoints = SandboxEndpoints::new();
        for config in self.registry.iter() {
            endpoints.insert(config.kind, config.base_url());
        }
        endpoints
    }
}

impl Drop for SandboxManager {
    fn drop(&mut self) {
        for running in &mut self.running {
            tracing::warn!(sandbox = %running.config.name, "sandbox still running on drop, killing");
            let _ = running.child.start_kill();
        }
    }
}

async fn stop_child(mut running: RunningSandbox, grace: Duration) -> Result<(), SandboxError> {
    let name = running.config.name.clone();
    let stop_err = |e: std::io::Error| SandboxError::Stop {
        sandbox: name.clone(),
        reason: e.to_string(),
    };

    if let Some(pid) = running.child.id() {
        send_terminate(pid, &name);
    }

    match tokio::time::timeout(grace, running.child.wait()).await {
        Ok(Ok(status)) => {
            tracing::info!(sandbox = %name, %status, "sandbox stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(stop_err(e)),
        Err(_) => {
            tracing::warn!(sandbox = %name, grace_ms = grace.as_millis() as u64, "grace period elapsed, killing sandbox");
            running.child.kill().await.map_err(stop_err)
        }
    }
}

#[cfg(unix)]
fn send_terminate(pid: u32, name: &str) {
    // SAFETY: kill(2)은 메모리를 건드리지 않으며, pid는 아직 회수되지 않은 자식 프로세스
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result != 0 {
        tracing::warn!(
            sandbox = %name,
            pid,
            error = %std::io::Error::last_os_error(),
            "failed to send SIGTERM"
        );
    }
}

#[cfg(not(unix))]
fn send_terminate(pid: u32, name: &str) {
    // 유예 시간 후 kill로 정리됨
    tracing::debug!(sandbox = %name, pid, "graceful termination unsupported on this platform");
}

fn forward_output<R>(sandbox: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(sandbox = %sandbox, stream, "{line}");
        }
    });
}

fn default_binary() -> Result<PathBuf, SandboxError> {
    let exe = std::env::current_exe().map_err(|e| SandboxError::Spawn {
        sandbox: SANDBOX_BINARY.to_owned(),
        reason: format!("cannot locate current executable: {e}"),
    })?;
    let dir = exe.parent().ok_or_else(|| SandboxError::Spawn {
        sandbox: SANDBOX_BINARY.to_owned(),
        reason: format!("{} has no parent directory", exe.display()),
    })?;
    Ok(dir.join(format!("{SANDBOX_BINARY}{}", std::env::consts::EXE_SUFFIX)))
}
