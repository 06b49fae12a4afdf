use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use super::CompiledCircuit;
use crate::utils::errors::LoadError;

/// Supplies compiled circuits by name.
pub trait CircuitLoader: Send + Sync {
    fn load(&self, name: &str) -> impl Future<Output = Result<CompiledCircuit, LoadError>> + Send;
}

/// Reads `<dir>/<name>.json` artifacts, as written by `export-circuits`.
#[derive(Clone, Debug)]
pub struct ArtifactDirLoader {
    dir: PathBuf,
}

impl ArtifactDirLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl CircuitLoader for ArtifactDirLoader {
    async fn load(&self, name: &str) -> Result<CompiledCircuit, LoadError> {
        let path = self.artifact_path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LoadError::NotFound(name.to_string()))
            }
            Err(source) => {
                return Err(LoadError::Io {
                    name: name.to_string(),
                    source,
                })
            }
        };
        debug!("read {} bytes from {}", bytes.len(), path.display());

        let circuit: CompiledCircuit =
            serde_json::from_slice(&bytes).map_err(|err| LoadError::Compilation {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        if circuit.name != name {
            return Err(LoadError::Compilation {
                name: name.to_string(),
                reason: format!("artifact declares circuit `{}`", circuit.name),
            });
        }
        circuit.check()?;
        Ok(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::BuiltinCircuits;
    use common::serializable::Serializable;

    #[tokio::test]
    async fn builtin_loader_knows_both_circuits() {
        let loader = BuiltinCircuits;
        assert_eq!(loader.load("main").await.unwrap(), BuiltinCircuits::main());
        assert_eq!(loader.load("recursive").await.unwrap(), BuiltinCircuits::recursive());
        assert!(matches!(loader.load("nope").await, Err(LoadError::NotFound(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn loads_exported_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ArtifactDirLoader::new(dir.path());
        for circuit in BuiltinCircuits::all() {
            circuit
                .serialize_to_file(&loader.artifact_path(&circuit.name))
                .unwrap();
        }

        assert_eq!(loader.load("main").await.unwrap(), BuiltinCircuits::main());
        assert_eq!(loader.load("recursive").await.unwrap(), BuiltinCircuits::recursive());
        assert!(matches!(loader.load("missing").await, Err(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_artifacts_fail_compilation() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ArtifactDirLoader::new(dir.path());

        std::fs::write(loader.artifact_path("garbage"), b"{ not json").unwrap();
        assert!(matches!(
            loader.load("garbage").await,
            Err(LoadError::Compilation { name, .. }) if name == "garbage"
        ));

        BuiltinCircuits::main()
            .serialize_to_file(&loader.artifact_path("renamed"))
            .unwrap();
        assert!(matches!(
            loader.load("renamed").await,
            Err(LoadError::Compilation { reason, .. }) if reason.contains("`main`")
        ));
    }
}
