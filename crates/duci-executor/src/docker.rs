//! Docker daemon client.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::BuildImageOptions;
use bollard::models::HostConfig;
use chrono::Utc;
use futures::channel::mpsc;
use futures::StreamExt;
use tracing::debug;

use duci_core::client::LogStream;
use duci_core::{ContainerClient, Error, LogLine, Result, RuntimeOptions};

/// Client for the local Docker daemon.
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }
}

/// Bind strings for the host config, verbatim from the runtime options.
fn binds(options: &RuntimeOptions) -> Option<Vec<String>> {
    if options.volumes.is_empty() {
        None
    } else {
        Some(options.volumes.clone())
    }
}

#[async_trait]
impl ContainerClient for DockerClient {
    async fn build(&self, context_tar: Vec<u8>, tag: &str, dockerfile: &str) -> Result<LogStream> {
        let options = BuildImageOptions {
            dockerfile: dockerfile.to_string(),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };

        let docker = self.docker.clone();
        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(async move {
            let stream = docker.build_image(options, None, Some(context_tar.into()));

            // The daemon emits JSON messages; progress text arrives in the
            // `stream` field and build failures in the `error` field.
            let mapped = stream.filter_map(|result| async move {
                match result {
                    Ok(info) => {
                        if let Some(error) = info.error {
                            return Some(Err(Error::Build(error)));
                        }
                        let text = info.stream?;
                        let text = text.trim_end();
                        if text.is_empty() {
                            return None;
                        }
                        Some(Ok(LogLine {
                            timestamp: Utc::now(),
                            text: text.to_string(),
                        }))
                    }
                    Err(e) => Some(Err(Error::Build(e.to_string()))),
                }
            });
            let mut mapped = Box::pin(mapped);

            while let Some(item) = mapped.next().await {
                if tx.unbounded_send(item).is_err() {
                    break;
                }
            }
        });

        Ok(Box::pin(rx))
    }

    async fn run(
        &self,
        options: &RuntimeOptions,
        tag: &str,
        command: &[String],
    ) -> Result<(String, LogStream)> {
        let host_config = HostConfig {
            binds: binds(options),
            ..Default::default()
        };

        let config = Config {
            image: Some(tag.to_string()),
            cmd: if command.is_empty() {
                None
            } else {
                Some(command.to_vec())
            },
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| Error::Run(format!("failed to create container: {e}")))?;

        debug!(container = %container.id, image = %tag, "starting container");
        self.docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Run(format!("failed to start container: {e}")))?;

        let logs = self.docker.logs(
            &container.id,
            Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mapped = logs.filter_map(|result| async move {
            match result {
                Ok(output) => {
                    let message = match output {
                        LogOutput::StdOut { message } => message,
                        LogOutput::StdErr { message } => message,
                        LogOutput::Console { message } => message,
                        LogOutput::StdIn { message } => message,
                    };
                    let text = String::from_utf8_lossy(&message);
                    let text = text.trim_end();
                    if text.is_empty() {
                        return None;
                    }
                    Some(Ok(LogLine {
                        timestamp: Utc::now(),
                        text: text.to_string(),
                    }))
                }
                Err(e) => Some(Err(Error::Run(e.to_string()))),
            }
        });

        Ok((container.id, Box::pin(mapped)))
    }

    async fn exit_code(&self, container_id: &str) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(container_id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // A non-zero exit surfaces as a dedicated error carrying the code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(Error::Inspect(e.to_string())),
            None => Err(Error::Inspect(format!(
                "wait ended without a status for {container_id}"
            ))),
        }
    }

    async fn rm(&self, container_id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(container_id, Some(options))
            .await
            .map_err(|e| Error::Cleanup(format!("failed to remove container: {e}")))?;

        Ok(())
    }
}


/// Integration tests that require a running Docker daemon.
/// Run with: cargo test -- --ignored
#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::archive;
    use futures::StreamExt;
    use std::fs;

    #[tokio::test]
    #[ignore]
    async fn build_run_inspect_remove_lifecycle() {
        let client = DockerClient::new().unwrap();

        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Dockerfile"),
            b"FROM alpine\nENTRYPOINT [\"echo\"]\n",
        )
        .unwrap();
        let tar = archive::pack(dir.path()).unwrap();

        let mut build_log = client
            .build(tar, "duci-test/lifecycle:latest", "./Dockerfile")
            .await
            .unwrap();
        while let Some(line) = build_log.next().await {
            line.unwrap();
        }

        let (container_id, mut run_log) = client
            .run(
                &RuntimeOptions::default(),
                "duci-test/lifecycle:latest",
                &["Hello World.".to_string()],
            )
            .await
            .unwrap();

        let mut output = Vec::new();
        while let Some(line) = run_log.next().await {
            output.push(line.unwrap().text);
        }
        assert!(output.iter().any(|l| l.contains("Hello World.")));

        let code = client.exit_code(&container_id).await.unwrap();
        assert_eq!(code, 0);

        client.rm(&container_id).await.unwrap();
    }
}
