//! Per-pipeline filesystem workspace
//!
//! Each pipeline owns a scratch directory under the configured working
//! dir, holding the snippet source under `src/` and compiled artifacts
//! under `bin/`. The [`LifeCycle`] handle derives the path triple the
//! executor builder needs and knows how to recover the compiled
//! executable's name after the compile stage (the Java main class is only
//! known once `javac` has written it).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

use playpen_core::domain::Sdk;

const SOURCE_FOLDER: &str = "src";
pub(crate) const EXECUTABLE_FOLDER: &str = "bin";

/// Handle owning the scratch workspace of one pipeline.
#[derive(Debug, Clone)]
pub struct LifeCycle {
    sdk: Sdk,
    pipeline_id: Uuid,
    base_dir: PathBuf,
}

impl LifeCycle {
    /// Derives the workspace paths for a pipeline. Does not touch disk;
    /// call [`LifeCycle::create_folders`] to materialise the workspace.
    pub fn new(sdk: Sdk, pipeline_id: Uuid, working_dir: &Path) -> Self {
        let base_dir = working_dir.join(pipeline_id.to_string());
        Self {
            sdk,
            pipeline_id,
            base_dir,
        }
    }

    pub fn pipeline_id(&self) -> Uuid {
        self.pipeline_id
    }

    /// Root of this pipeline's workspace; external commands run with this
    /// as their working directory.
    pub fn absolute_base_folder_path(&self) -> PathBuf {
        self.base_dir.clone()
    }

    /// Path of the snippet source file, named `{pipeline_id}.{ext}`.
    pub fn absolute_source_file_path(&self) -> PathBuf {
        self.base_dir
            .join(SOURCE_FOLDER)
            .join(format!("{}.{}", self.pipeline_id, self.sdk.source_file_extension()))
    }

    /// Path of the compiled artifact the run stage executes.
    ///
    /// For Java this is the classpath root (the concrete class name is
    /// looked up separately); interpreted SDKs run the source directly.
    pub fn absolute_executable_file_path(&self) -> PathBuf {
        match self.sdk {
            Sdk::Java => self.base_dir.join(EXECUTABLE_FOLDER),
            Sdk::Go | Sdk::Scio => self.base_dir.join(EXECUTABLE_FOLDER).join("main"),
            Sdk::Python => self.absolute_source_file_path(),
        }
    }

    /// Creates the workspace folder structure.
    pub fn create_folders(&self) -> Result<()> {
        for folder in [
            self.base_dir.join(SOURCE_FOLDER),
            self.base_dir.join(EXECUTABLE_FOLDER),
        ] {
            std::fs::create_dir_all(&folder)
                .with_context(|| format!("creating workspace folder {}", folder.display()))?;
        }
        Ok(())
    }

    /// Writes the snippet source into the workspace and returns its path.
    pub fn create_source_file(&self, code: &str) -> Result<PathBuf> {
        let path = self.absolute_source_file_path();
        std::fs::write(&path, code)
            .with_context(|| format!("writing source file {}", path.display()))?;
        Ok(path)
    }

    /// Looks up the name of the compiled executable.
    ///
    /// Scans the `bin/` folder and returns the file stem of the main
    /// artifact. For Java, compiler-generated inner classes (`Outer$Inner`)
    /// are skipped so the entry-point class is returned.
    pub fn executable_name(&self) -> Result<String> {
        let bin_dir = self.base_dir.join(EXECUTABLE_FOLDER);
        let entries = std::fs::read_dir(&bin_dir)
            .with_context(|| format!("reading executable folder {}", bin_dir.display()))?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(|stem| stem.to_string())
            })
            .filter(|stem| !stem.contains('$'))
            .collect();
        names.sort();

        names.into_iter().next().with_context(|| {
            format!(
                "{}: no executable found in {}",
                self.pipeline_id,
                bin_dir.display()
            )
        })
    }

    /// Removes the whole workspace.
    ///
    /// Returns an error if the workspace no longer exists, so a repeated
    /// call surfaces to the caller (which logs it) instead of passing
    /// silently.
    pub fn delete_folders(&self) -> Result<()> {
        std::fs::remove_dir_all(&self.base_dir)
            .with_context(|| format!("deleting workspace {}", self.base_dir.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_path_triple_derivation() {
        let working_dir = PathBuf::from("/work");
        let id = Uuid::new_v4();
        let lc = LifeCycle::new(Sdk::Java, id, &working_dir);

        assert_eq!(lc.absolute_base_folder_path(), working_dir.join(id.to_string()));
        assert_eq!(
            lc.absolute_source_file_path(),
            working_dir
                .join(id.to_string())
                .join("src")
                .join(format!("{}.java", id))
        );
        assert_eq!(
            lc.absolute_executable_file_path(),
            working_dir.join(id.to_string()).join("bin")
        );
    }

    #[test]
    fn test_python_runs_the_source_file() {
        let lc = LifeCycle::new(Sdk::Python, Uuid::new_v4(), Path::new("/work"));
        assert_eq!(
            lc.absolute_executable_file_path(),
            lc.absolute_source_file_path()
        );
    }

    #[test]
    fn test_create_folders_and_source_file() {
        let dir = tempdir().unwrap();
        let lc = LifeCycle::new(Sdk::Go, Uuid::new_v4(), dir.path());

        lc.create_folders().unwrap();
        let path = lc.create_source_file("package main").unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(path).unwrap(), "package main");
    }

    #[test]
    fn test_executable_name_skips_inner_classes() {
        let dir = tempdir().unwrap();
        let lc = LifeCycle::new(Sdk::Java, Uuid::new_v4(), dir.path());
        lc.create_folders().unwrap();

        let bin = lc.absolute_base_folder_path().join("bin");
        std::fs::write(bin.join("Main$Helper.class"), b"").unwrap();
        std::fs::write(bin.join("Main.class"), b"").unwrap();

        assert_eq!(lc.executable_name().unwrap(), "Main");
    }

    #[test]
    fn test_executable_name_empty_bin() {
        let dir = tempdir().unwrap();
        let lc = LifeCycle::new(Sdk::Java, Uuid::new_v4(), dir.path());
        lc.create_folders().unwrap();

        assert!(lc.executable_name().is_err());
    }

    #[test]
    fn test_delete_folders_twice_errors() {
        let dir = tempdir().unwrap();
        let lc = LifeCycle::new(Sdk::Python, Uuid::new_v4(), dir.path());
        lc.create_folders().unwrap();

        assert!(lc.delete_folders().is_ok());
        assert!(lc.delete_folders().is_err());
    }
}
