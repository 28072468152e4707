// src/exec/command.rs

//! Shell-command build steps configured per target kind.
//!
//! Each `[kind.<name>]` section names the commands to run. The command sees
//! the target through environment variables:
//!
//! - `GEOCOMPILE_TARGET`: target (or subtarget) name
//! - `GEOCOMPILE_KIND`: the kind
//! - `GEOCOMPILE_OWNER`, `GEOCOMPILE_MIN`, `GEOCOMPILE_MAX`: subtargets only
//! - `GEOCOMPILE_PARAM_<KEY>`: one per target parameter, key upper-cased
//!
//! A non-zero exit status is a build-step failure.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::model::{ConfigFile, KindConfig};
use crate::dag::{Subtarget, Target, TargetKind};
use crate::errors::{GeocompileError, Result};
use crate::exec::delegate::{BuildStep, ComplexBuildStep, DelegateRegistry, StepFuture};

/// Build step running the shell commands of one kind.
#[derive(Debug, Clone)]
pub struct ShellStep {
    kind: TargetKind,
    commands: KindConfig,
    workdir: Option<PathBuf>,
}

impl ShellStep {
    pub fn new(kind: impl Into<TargetKind>, commands: KindConfig) -> Self {
        Self {
            kind: kind.into(),
            commands,
            workdir: None,
        }
    }

    /// Run commands from `dir` instead of the current directory.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    fn target_env(&self, target: &Target) -> Vec<(String, String)> {
        let mut env = vec![
            ("GEOCOMPILE_TARGET".to_string(), target.name.clone()),
            ("GEOCOMPILE_KIND".to_string(), self.kind.clone()),
        ];
        env.extend(param_env(&target.params));
        env
    }

    fn subtarget_env(&self, sub: &Subtarget) -> Vec<(String, String)> {
        let mut env = vec![
            ("GEOCOMPILE_TARGET".to_string(), sub.name.clone()),
            ("GEOCOMPILE_KIND".to_string(), self.kind.clone()),
            ("GEOCOMPILE_OWNER".to_string(), sub.owner.clone()),
            ("GEOCOMPILE_MIN".to_string(), sub.range.min().to_string()),
            ("GEOCOMPILE_MAX".to_string(), sub.range.max().to_string()),
        ];
        env.extend(param_env(&sub.params));
        env
    }

    async fn run_optional(
        &self,
        name: &str,
        what: &str,
        cmd: Option<&str>,
        env: Vec<(String, String)>,
    ) -> Result<()> {
        match cmd {
            Some(cmd) => self.run(name, what, cmd, env).await,
            None => {
                debug!(target_name = %name, kind = %self.kind, "no {what} command configured; nothing to do");
                Ok(())
            }
        }
    }

    async fn run(&self, name: &str, what: &str, cmd: &str, env: Vec<(String, String)>) -> Result<()> {
        run_shell(name, what, cmd, env, self.workdir.as_ref())
            .await
            .map_err(|e| GeocompileError::build_step(name, format!("{e:#}")))
    }
}

fn param_env(params: &BTreeMap<String, String>) -> impl Iterator<Item = (String, String)> + '_ {
    params.iter().map(|(k, v)| {
        let key = k
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect::<String>();
        (format!("GEOCOMPILE_PARAM_{key}"), v.clone())
    })
}

/// Run one shell command to completion, logging its output at debug level.
async fn run_shell(
    name: &str,
    what: &str,
    cmd_line: &str,
    env: Vec<(String, String)>,
    workdir: Option<&PathBuf>,
) -> anyhow::Result<()> {
    info!(target_name = %name, step = what, cmd = %cmd_line, "starting build command");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.envs(env)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {what} command for '{name}'"))?;

    // Always consume output so pipe buffers don't fill.
    if let Some(stdout) = child.stdout.take() {
        let label = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target_name = %label, "stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let label = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target_name = %label, "stderr: {}", line);
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for {what} command of '{name}'"))?;

    let code = status.code().unwrap_or(-1);
    info!(
        target_name = %name,
        step = what,
        exit_code = code,
        success = status.success(),
        "build command exited"
    );

    if !status.success() {
        anyhow::bail!("{what} command exited with status {code}");
    }
    Ok(())
}

impl BuildStep for ShellStep {
    fn compile<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.run(&target.name, "compile", &self.commands.cmd, self.target_env(target))
                .await
        })
    }

    fn clean<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.run_optional(&target.name, "clean", self.commands.clean.as_deref(), self.target_env(target))
                .await
        })
    }
}

impl ComplexBuildStep for ShellStep {
    fn split<'a>(&'a self, target: &'a Target) -> StepFuture<'a, Vec<Subtarget>> {
        Box::pin(async move { target.split_by_ids() })
    }

    fn compile_subtarget<'a>(&'a self, subtarget: &'a Subtarget) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.run(&subtarget.name, "compile", &self.commands.cmd, self.subtarget_env(subtarget))
                .await
        })
    }

    fn clean_subtarget<'a>(&'a self, subtarget: &'a Subtarget) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.run_optional(
                &subtarget.name,
                "clean",
                self.commands.clean.as_deref(),
                self.subtarget_env(subtarget),
            )
            .await
        })
    }

    fn merge<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()> {
        Box::pin(async move {
            self.run_optional(&target.name, "merge", self.commands.merge.as_deref(), self.target_env(target))
                .await
        })
    }

    fn clean_all<'a>(&'a self, target: &'a Target) -> StepFuture<'a, ()> {
        Box::pin(async move {
            if let Some(cmd) = self.commands.clean_all.as_deref() {
                return self.run(&target.name, "clean_all", cmd, self.target_env(target)).await;
            }
            // No bulk command: clean partition by partition.
            for sub in target.split_by_ids()? {
                self.clean_subtarget(&sub).await?;
            }
            self.run_optional(&target.name, "clean", self.commands.clean.as_deref(), self.target_env(target))
                .await
        })
    }
}

/// Register a [`ShellStep`] for every `[kind.<name>]` in the config.
///
/// Kinds with a `merge` command are registered as complex.
pub fn registry_from_config(cfg: &ConfigFile, workdir: Option<PathBuf>) -> DelegateRegistry {
    let mut registry = DelegateRegistry::new();

    for (kind, spec) in cfg.kind.iter() {
        let mut step = ShellStep::new(kind.clone(), spec.clone());
        if let Some(dir) = &workdir {
            step = step.with_workdir(dir.clone());
        }

        if spec.is_complex() {
            registry.register_complex(kind.clone(), Arc::new(step));
        } else {
            registry.register_simple(kind.clone(), Arc::new(step));
        }
    }

    registry
}
