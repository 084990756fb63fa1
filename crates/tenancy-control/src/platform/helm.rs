//! Helm command invocation.
//!
//! Helm is driven as a child process. Helm's own `--timeout` bounds the
//! `--wait` phase; the process itself is killed if it outlives that limit
//! by more than [`PROCESS_GRACE`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::config::HelmConfig;

/// Extra time granted to the process beyond Helm's own timeout.
pub const PROCESS_GRACE: Duration = Duration::from_secs(30);

/// A failed Helm invocation.
#[derive(Debug, thiserror::Error)]
pub enum HelmFailure {
    /// The process could not be started.
    #[error("failed to spawn helm: {0}")]
    Spawn(#[source] std::io::Error),

    /// The process was killed after exceeding its time limit.
    #[error("helm timed out after {0:?}")]
    Timeout(Duration),

    /// The process exited unsuccessfully.
    #[error("helm exited with code {code}: {}", stderr.trim())]
    Exit {
        /// Exit code, or -1 if terminated by a signal.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The process succeeded but its output could not be understood.
    #[error("unexpected helm output: {0}")]
    Output(String),
}

impl HelmFailure {
    /// Standard error of a failed run, when the process got that far.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Exit { stderr, .. } => Some(stderr),
            Self::Spawn(_) | Self::Timeout(_) | Self::Output(_) => None,
        }
    }
}

/// A release as reported by `helm list --output json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HelmRelease {
    /// Release name.
    pub name: String,
    /// Namespace the release lives in.
    pub namespace: String,
    /// Helm release status (e.g. `deployed`, `failed`).
    #[serde(default)]
    pub status: String,
    /// Chart name and version.
    #[serde(default)]
    pub chart: String,
}

/// Parse the JSON array printed by `helm list --output json`.
pub fn parse_releases(stdout: &str) -> Result<Vec<HelmRelease>, HelmFailure> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|e| HelmFailure::Output(e.to_string()))
}

/// Runs Helm commands against the current cluster context.
#[derive(Debug, Clone)]
pub struct HelmClient {
    binary: PathBuf,
    chart: String,
    values_file: Option<PathBuf>,
    timeout: Duration,
}

impl HelmClient {
    /// Create a Helm client from configuration.
    #[must_use]
    pub fn new(config: &HelmConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            chart: config.chart.clone(),
            values_file: config.values_file.clone(),
            timeout: config.timeout(),
        }
    }

    /// Arguments for installing the tenant chart.
    #[must_use]
    pub fn install_args(&self, release: &str, namespace: &str, tenant_id: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "install".into(),
            release.into(),
            self.chart.clone().into(),
            "--namespace".into(),
            namespace.into(),
            "--set".into(),
            format!("tenantId={tenant_id}").into(),
            "--wait".into(),
            "--timeout".into(),
            format!("{}s", self.timeout.as_secs()).into(),
        ];
        if let Some(values) = &self.values_file {
            args.push("--values".into());
            args.push(values.clone().into_os_string());
        }
        args
    }

    /// Install the tenant chart as `release` into `namespace`.
    #[instrument(skip(self), fields(chart = %self.chart))]
    pub async fn install(
        &self,
        release: &str,
        namespace: &str,
        tenant_id: &str,
    ) -> Result<(), HelmFailure> {
        self.run(self.install_args(release, namespace, tenant_id))
            .await
            .map(|_| ())
    }

    /// List releases in a namespace.
    pub async fn list(&self, namespace: &str) -> Result<Vec<HelmRelease>, HelmFailure> {
        let stdout = self
            .run(vec![
                "list".into(),
                "--namespace".into(),
                namespace.into(),
                "--all".into(),
                "--output".into(),
                "json".into(),
            ])
            .await?;
        parse_releases(&stdout)
    }

    /// Check whether a release exists in a namespace.
    pub async fn release_exists(&self, release: &str, namespace: &str) -> Result<bool, HelmFailure> {
        let releases = self.list(namespace).await?;
        Ok(releases.iter().any(|r| r.name == release))
    }

    /// Uninstall a release.
    #[instrument(skip(self))]
    pub async fn uninstall(&self, release: &str, namespace: &str) -> Result<(), HelmFailure> {
        self.run(vec![
            "uninstall".into(),
            release.into(),
            "--namespace".into(),
            namespace.into(),
        ])
        .await
        .map(|_| ())
    }

    async fn run(&self, args: Vec<OsString>) -> Result<String, HelmFailure> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary.display(), ?args, "spawning helm");
        let start = Instant::now();

        let limit = self.timeout + PROCESS_GRACE;
        let output = match timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(HelmFailure::Spawn(e)),
            Err(_) => return Err(HelmFailure::Timeout(limit)),
        };

        debug!(
            duration_secs = start.elapsed().as_secs_f32(),
            status = %output.status,
            "helm finished"
        );

        if !output.status.success() {
            return Err(HelmFailure::Exit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> HelmClient {
        HelmClient::new(&HelmConfig::default())
    }

    #[test]
    fn install_args_target_tenant_namespace() {
        let args = client().install_args("acme", "tenant-acme", "acme");
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(
            args,
            [
                "install",
                "acme",
                "./charts/tenant-app",
                "--namespace",
                "tenant-acme",
                "--set",
                "tenantId=acme",
                "--wait",
                "--timeout",
                "300s",
            ]
        );
    }

    #[test]
    fn install_args_include_values_file() {
        let config = HelmConfig {
            values_file: Some(PathBuf::from("/etc/tenancy/values.yaml")),
            ..HelmConfig::default()
        };
        let args = HelmClient::new(&config).install_args("acme", "tenant-acme", "acme");
        let tail: Vec<_> = args[args.len() - 2..]
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(tail, ["--values", "/etc/tenancy/values.yaml"]);
    }

    #[test]
    fn parses_release_list() {
        let stdout = r#"[{"name":"acme","namespace":"tenant-acme","revision":"1","updated":"2024-01-01 00:00:00","status":"deployed","chart":"tenant-app-0.1.0","app_version":"1.0"}]"#;
        let releases = parse_releases(stdout).unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].name, "acme");
        assert_eq!(releases[0].status, "deployed");

        assert!(parse_releases("").unwrap().is_empty());
        assert!(parse_releases("[]\n").unwrap().is_empty());
        assert!(matches!(
            parse_releases("not json"),
            Err(HelmFailure::Output(_))
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let config = HelmConfig {
            binary: PathBuf::from("/nonexistent/helm"),
            ..HelmConfig::default()
        };
        let err = HelmClient::new(&config)
            .uninstall("acme", "tenant-acme")
            .await
            .unwrap_err();
        assert!(matches!(err, HelmFailure::Spawn(_)));
        assert!(err.stderr().is_none());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_captures_stderr() {
        // `sh uninstall ...` fails because there is no script named "uninstall"
        let config = HelmConfig {
            binary: PathBuf::from("sh"),
            ..HelmConfig::default()
        };
        let err = HelmClient::new(&config)
            .uninstall("acme", "tenant-acme")
            .await
            .unwrap_err();
        match err {
            HelmFailure::Exit { code, stderr } => {
                assert_ne!(code, 0);
                assert!(!stderr.is_empty());
            }
            other => panic!("expected exit failure, got {other:?}"),
        }
    }
}
