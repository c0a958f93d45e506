//! Image recipe and runtime-option resolution inside a cloned tree.

use std::path::Path;

use duci_core::{Error, Result, RuntimeOptions};

const NESTED_DOCKERFILE: &str = ".duci/Dockerfile";
const ROOT_DOCKERFILE: &str = "./Dockerfile";
const CONFIG_FILE: &str = ".duci/config.yml";

/// Path of the image recipe relative to the build context. The nested
/// `.duci/Dockerfile` wins over a top-level `Dockerfile`; the build context
/// is the workspace in both cases.
pub fn dockerfile(workspace: &Path) -> String {
    if workspace.join(NESTED_DOCKERFILE).is_file() {
        NESTED_DOCKERFILE.to_string()
    } else {
        ROOT_DOCKERFILE.to_string()
    }
}

/// Load `.duci/config.yml` if present. An absent file yields the defaults;
/// a malformed file is fatal to the job.
pub fn runtime_options(workspace: &Path) -> Result<RuntimeOptions> {
    let path = workspace.join(CONFIG_FILE);
    if !path.is_file() {
        return Ok(RuntimeOptions::default());
    }

    let raw = std::fs::read_to_string(&path)
        .map_err(|e| Error::Resolve(format!("failed to read {CONFIG_FILE}: {e}")))?;
    serde_yaml::from_str(&raw).map_err(|e| Error::Resolve(format!("malformed {CONFIG_FILE}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn top_level_dockerfile_is_the_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), b"FROM alpine\n").unwrap();

        assert_eq!(dockerfile(dir.path()), "./Dockerfile");
    }

    #[test]
    fn nested_dockerfile_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), b"FROM alpine\n").unwrap();
        fs::create_dir_all(dir.path().join(".duci")).unwrap();
        fs::write(dir.path().join(".duci/Dockerfile"), b"FROM alpine\n").unwrap();

        assert_eq!(dockerfile(dir.path()), ".duci/Dockerfile");
    }

    #[test]
    fn absent_config_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(runtime_options(dir.path()).unwrap(), RuntimeOptions::default());
    }

    #[test]
    fn config_volumes_are_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".duci")).unwrap();
        fs::write(
            dir.path().join(".duci/config.yml"),
            b"---\nvolumes:\n  - /hello:/hello\n",
        )
        .unwrap();

        let options = runtime_options(dir.path()).unwrap();
        assert_eq!(options.volumes, vec!["/hello:/hello".to_string()]);
    }

    #[test]
    fn malformed_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".duci")).unwrap();
        fs::write(dir.path().join(".duci/config.yml"), b"volumes: {not: [a list\n").unwrap();

        let err = runtime_options(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Resolve(_)));
    }
}
