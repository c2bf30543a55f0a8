//! Executors
//!
//! An [`Executor`] bundles the four capabilities one pipeline needs:
//! in-process validate and prepare callables, and external compile and
//! run commands. The [`ExecutorBuilder`] assembles them from the
//! workspace path triple and the SDK's command table; the driver rebuilds
//! the executor once for Java after compilation, when the main class name
//! becomes known.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;

use playpen_core::domain::Sdk;

use crate::config::{ExecutorConfig, SdkEnv};
use crate::fs::{LifeCycle, EXECUTABLE_FOLDER};

/// One named in-process step run during the validate or prepare stage.
#[derive(Clone)]
pub struct Check {
    pub name: &'static str,
    task: Arc<dyn Fn() -> Result<()> + Send + Sync>,
}

impl Check {
    pub fn new(name: &'static str, task: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            name,
            task: Arc::new(task),
        }
    }

    fn run(&self) -> Result<()> {
        (self.task)().with_context(|| format!("{} check failed", self.name))
    }
}

/// External command descriptor for one stage.
///
/// Commands run rooted at the pipeline's base folder so the static args
/// from the SDK command table can use workspace-relative paths.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl CommandSpec {
    /// Builds the process command: piped stdio for capture, and the child
    /// is killed when its handle is dropped, which is how a timed-out or
    /// canceled pipeline terminates a still-running stage.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Capability bundle for one pipeline execution.
pub struct Executor {
    validators: Vec<Check>,
    preparers: Vec<Check>,
    compile: Option<CommandSpec>,
    run: CommandSpec,
}

impl Executor {
    /// Returns the validate-stage callable. The driver invokes it in a
    /// background task reporting through the stage channels.
    pub fn validate(&self) -> impl FnOnce() -> Result<()> + Send + 'static {
        let checks = self.validators.clone();
        move || run_checks(&checks)
    }

    /// Returns the prepare-stage callable.
    pub fn prepare(&self) -> impl FnOnce() -> Result<()> + Send + 'static {
        let checks = self.preparers.clone();
        move || run_checks(&checks)
    }

    /// Compile command, absent for interpreted SDKs.
    pub fn compile_spec(&self) -> Option<&CommandSpec> {
        self.compile.as_ref()
    }

    pub fn run_spec(&self) -> &CommandSpec {
        &self.run
    }
}

fn run_checks(checks: &[Check]) -> Result<()> {
    for check in checks {
        check.run()?;
    }
    Ok(())
}

/// Builder holding everything needed to assemble an [`Executor`].
#[derive(Debug, Clone)]
pub struct ExecutorBuilder {
    sdk: Sdk,
    source_path: PathBuf,
    base_dir: PathBuf,
    executable_path: PathBuf,
    config: ExecutorConfig,
    executable_name: Option<String>,
}

/// Creates the executor builder for a pipeline workspace.
///
/// Fails when the SDK has no executor command table, which is the one
/// setup failure reachable before any stage begins.
pub fn setup_executor_builder(lc: &LifeCycle, sdk_env: &SdkEnv) -> Result<ExecutorBuilder> {
    let config = sdk_env
        .executor_config
        .clone()
        .ok_or_else(|| anyhow!("no executor configuration for sdk {}", sdk_env.sdk))?;

    Ok(ExecutorBuilder {
        sdk: sdk_env.sdk,
        source_path: lc.absolute_source_file_path(),
        base_dir: lc.absolute_base_folder_path(),
        executable_path: lc.absolute_executable_file_path(),
        config,
        executable_name: None,
    })
}

impl ExecutorBuilder {
    /// Sets the compiled executable's name for the run command. The Java
    /// main class is only known after compilation, so the driver rebuilds
    /// the executor with the looked-up name before the run stage.
    pub fn with_executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = Some(name.into());
        self
    }

    pub fn build(&self) -> Executor {
        Executor {
            validators: default_validators(self.sdk, &self.source_path),
            preparers: default_preparers(self.sdk, &self.base_dir),
            compile: self.compile_spec(),
            run: self.run_spec(),
        }
    }

    fn compile_spec(&self) -> Option<CommandSpec> {
        if self.config.compile_cmd.is_empty() {
            return None;
        }

        let mut args = self.config.compile_args.clone();
        args.push(self.source_path.to_string_lossy().into_owned());

        Some(CommandSpec {
            program: self.config.compile_cmd.clone(),
            args,
            working_dir: self.base_dir.clone(),
        })
    }

    fn run_spec(&self) -> CommandSpec {
        match self.sdk {
            Sdk::Java => {
                let mut args = self.config.run_args.clone();
                if let Some(name) = &self.executable_name {
                    args.push(name.clone());
                }
                CommandSpec {
                    program: self.config.run_cmd.clone(),
                    args,
                    working_dir: self.base_dir.clone(),
                }
            }
            // Compiled to a standalone binary; run it directly.
            Sdk::Go | Sdk::Scio => CommandSpec {
                program: self.executable_path.to_string_lossy().into_owned(),
                args: self.config.run_args.clone(),
                working_dir: self.base_dir.clone(),
            },
            Sdk::Python => {
                let mut args = self.config.run_args.clone();
                args.push(self.source_path.to_string_lossy().into_owned());
                CommandSpec {
                    program: self.config.run_cmd.clone(),
                    args,
                    working_dir: self.base_dir.clone(),
                }
            }
        }
    }
}

fn default_validators(sdk: Sdk, source_path: &Path) -> Vec<Check> {
    let expected_extension = sdk.source_file_extension();

    let path = source_path.to_path_buf();
    let exists = Check::new("source file exists", move || {
        if path.is_file() {
            Ok(())
        } else {
            Err(anyhow!("source file {} does not exist", path.display()))
        }
    });

    let path = source_path.to_path_buf();
    let extension = Check::new("source file extension", move || {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext == expected_extension => Ok(()),
            other => Err(anyhow!(
                "expected a .{} file, got {:?}",
                expected_extension,
                other
            )),
        }
    });

    vec![exists, extension]
}

fn default_preparers(sdk: Sdk, base_dir: &Path) -> Vec<Check> {
    if !sdk.is_compiled() {
        return vec![];
    }

    let bin_dir = base_dir.join(EXECUTABLE_FOLDER);
    vec![Check::new("executable folder", move || {
        std::fs::create_dir_all(&bin_dir)
            .with_context(|| format!("creating {}", bin_dir.display()))?;
        Ok(())
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn builder_for(sdk: Sdk, working_dir: &Path) -> ExecutorBuilder {
        let lc = LifeCycle::new(sdk, Uuid::new_v4(), working_dir);
        setup_executor_builder(&lc, &SdkEnv::new(sdk)).unwrap()
    }

    #[test]
    fn test_setup_fails_for_unsupported_sdk() {
        let lc = LifeCycle::new(Sdk::Scio, Uuid::new_v4(), Path::new("/work"));
        assert!(setup_executor_builder(&lc, &SdkEnv::new(Sdk::Scio)).is_err());
    }

    #[test]
    fn test_java_command_shape() {
        let builder = builder_for(Sdk::Java, Path::new("/work"));
        let executor = builder.clone().with_executable_name("Main").build();

        let compile = executor.compile_spec().unwrap();
        assert_eq!(compile.program, "javac");
        assert!(compile.args.last().unwrap().ends_with(".java"));

        let run = executor.run_spec();
        assert_eq!(run.program, "java");
        assert_eq!(run.args.last().unwrap(), "Main");
    }

    #[test]
    fn test_go_runs_the_compiled_binary() {
        let builder = builder_for(Sdk::Go, Path::new("/work"));
        let executor = builder.build();

        assert!(executor.compile_spec().is_some());
        assert!(executor.run_spec().program.ends_with("bin/main"));
    }

    #[test]
    fn test_python_has_no_compile_command() {
        let builder = builder_for(Sdk::Python, Path::new("/work"));
        let executor = builder.build();

        assert!(executor.compile_spec().is_none());
        let run = executor.run_spec();
        assert_eq!(run.program, "python3");
        assert!(run.args.last().unwrap().ends_with(".py"));
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let dir = tempdir().unwrap();
        let builder = builder_for(Sdk::Python, dir.path());

        let validate = builder.build().validate();
        assert!(validate().is_err());
    }

    #[test]
    fn test_validate_accepts_existing_source() {
        let dir = tempdir().unwrap();
        let lc = LifeCycle::new(Sdk::Python, Uuid::new_v4(), dir.path());
        lc.create_folders().unwrap();
        lc.create_source_file("print('hi')").unwrap();

        let builder = setup_executor_builder(&lc, &SdkEnv::new(Sdk::Python)).unwrap();
        let validate = builder.build().validate();
        assert!(validate().is_ok());
    }

    #[test]
    fn test_prepare_creates_executable_folder() {
        let dir = tempdir().unwrap();
        let lc = LifeCycle::new(Sdk::Go, Uuid::new_v4(), dir.path());
        std::fs::create_dir_all(lc.absolute_base_folder_path()).unwrap();

        let builder = setup_executor_builder(&lc, &SdkEnv::new(Sdk::Go)).unwrap();
        let prepare = builder.build().prepare();
        assert!(prepare().is_ok());
        assert!(lc.absolute_base_folder_path().join("bin").is_dir());
    }
}
