//! # Context Provisioner Module / 上下文配置模块
//!
//! This module owns the isolated execution contexts. A context is keyed by
//! the descriptor's content hash and shared by every environment with the
//! same key; builds for one key are serialized through a per-key lock so
//! concurrent environments trigger exactly one installation. A stamp file
//! inside the context directory records the key, and a context is reused as
//! long as its stamp is valid.
//!
//! 此模块拥有隔离的执行上下文。上下文以描述符的内容哈希为键，
//! 由所有具有相同键的环境共享；对同一键的构建通过按键加锁串行化，
//! 因此并发环境只会触发一次安装。上下文目录中的标记文件记录该键，
//! 只要标记有效，上下文就会被复用。

use colored::*;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::errors::RunnerError;
use crate::core::interp::LateBindings;
use crate::core::models::EnvDescriptor;
use crate::infra::{command, fs, t};

/// File inside a context directory recording the key it was built for.
pub const STAMP_FILE: &str = "context.key";

#[cfg(windows)]
const BIN_DIR_NAME: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR_NAME: &str = "bin";

/// An isolated execution context on disk.
/// 磁盘上的一个隔离执行上下文。
#[derive(Debug, Clone)]
pub struct IsolatedContext {
    /// The content key this context was built for.
    pub key: String,
    /// The context directory under `{workdir}/ctx/`.
    pub dir: PathBuf,
    /// The directory prepended to `PATH` for commands.
    pub bin_dir: PathBuf,
}

impl IsolatedContext {
    fn at(workdir: &Path, key: &str) -> Self {
        let dir = workdir.join("ctx").join(key);
        let bin_dir = dir.join(BIN_DIR_NAME);
        IsolatedContext {
            key: key.to_string(),
            dir,
            bin_dir,
        }
    }
}

/// The result of provisioning one descriptor.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub context: Arc<IsolatedContext>,
    /// The context already existed with a valid stamp; no install ran.
    pub reused: bool,
    /// Captured output of the provisioning commands, empty on reuse.
    pub output: String,
}

/// Builds and caches isolated contexts for one invocation.
///
/// Shared across all environment pipelines; the per-key locks guarantee that
/// two environments needing the same context never install concurrently.
///
/// 为一次调用构建并缓存隔离上下文。由所有环境流水线共享；
/// 按键加锁保证需要相同上下文的两个环境绝不会并发安装。
pub struct Provisioner {
    workdir: PathBuf,
    confdir: PathBuf,
    skip_missing_interpreters: bool,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    built: Mutex<HashMap<String, Arc<IsolatedContext>>>,
}

impl Provisioner {
    pub fn new(workdir: PathBuf, confdir: PathBuf, skip_missing_interpreters: bool) -> Self {
        Provisioner {
            workdir,
            confdir,
            skip_missing_interpreters,
            locks: Mutex::new(HashMap::new()),
            built: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a missing interpreter skips the environment instead of
    /// failing it.
    pub fn skips_missing_interpreters(&self) -> bool {
        self.skip_missing_interpreters
    }

    /// The invocation's working directory root.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Provisions the context for `descriptor`, reusing a cached one when
    /// its stamp is still valid.
    ///
    /// # Errors
    /// `MissingInterpreter` when the interpreter executable does not exist,
    /// `Provision` for every other failure. On failure no stamp is written,
    /// so a later run rebuilds from scratch.
    pub async fn provision(
        &self,
        descriptor: &EnvDescriptor,
        stop_token: &CancellationToken,
    ) -> Result<Provisioned, RunnerError> {
        if !descriptor.interpreter.is_empty() {
            self.probe_interpreter(descriptor, stop_token).await?;
        }

        let key = descriptor.cache_key();
        if let Some(context) = self.built.lock().await.get(&key) {
            return Ok(Provisioned {
                context: Arc::clone(context),
                reused: true,
                output: String::new(),
            });
        }

        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let _guard = lock.lock().await;

        // Another pipeline may have finished the build while we waited.
        // 在我们等待期间，另一条流水线可能已经完成了构建。
        if let Some(context) = self.built.lock().await.get(&key) {
            return Ok(Provisioned {
                context: Arc::clone(context),
                reused: true,
                output: String::new(),
            });
        }

        let context = IsolatedContext::at(&self.workdir, &key);
        let stamp_path = context.dir.join(STAMP_FILE);
        if fs::read_stamp(&stamp_path)
            .map(|stamp| stamp.lines().next() == Some(key.as_str()))
            .unwrap_or(false)
        {
            println!(
                "{}",
                t!("provision.reusing", env = descriptor.name, key = key).dimmed()
            );
            let context = Arc::new(context);
            self.built.lock().await.insert(key, Arc::clone(&context));
            return Ok(Provisioned {
                context,
                reused: true,
                output: String::new(),
            });
        }

        println!(
            "{}",
            t!("provision.building", env = descriptor.name, key = key).cyan()
        );
        let output = self.build_context(descriptor, &context, stop_token).await?;

        let stamp = stamp_material(descriptor, &key);
        fs::write_stamp(&stamp_path, &stamp).map_err(|e| RunnerError::Provision {
            env: descriptor.name.clone(),
            message: format!("{:#}", e),
        })?;

        let context = Arc::new(context);
        self.built.lock().await.insert(key, Arc::clone(&context));
        Ok(Provisioned {
            context,
            reused: false,
            output,
        })
    }

    /// Checks that the descriptor's interpreter can be spawned at all.
    async fn probe_interpreter(
        &self,
        descriptor: &EnvDescriptor,
        stop_token: &CancellationToken,
    ) -> Result<(), RunnerError> {
        let mut cmd = tokio::process::Command::new(&descriptor.interpreter);
        cmd.arg("--version").kill_on_drop(true);

        let (status_res, output, _) = command::spawn_and_capture(cmd, Some(stop_token)).await;
        match status_res {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(RunnerError::Provision {
                env: descriptor.name.clone(),
                message: format!(
                    "interpreter probe `{} --version` exited with {}: {}",
                    descriptor.interpreter,
                    status,
                    output.trim()
                ),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RunnerError::MissingInterpreter {
                env: descriptor.name.clone(),
                interpreter: descriptor.interpreter.clone(),
            }),
            Err(e) => Err(RunnerError::Provision {
                env: descriptor.name.clone(),
                message: format!(
                    "failed to probe interpreter '{}': {}",
                    descriptor.interpreter, e
                ),
            }),
        }
    }

    /// Creates the context directory and runs the provisioning and install
    /// commands. Called with the per-key lock held.
    async fn build_context(
        &self,
        descriptor: &EnvDescriptor,
        context: &IsolatedContext,
        stop_token: &CancellationToken,
    ) -> Result<String, RunnerError> {
        let provision_error = |message: String| RunnerError::Provision {
            env: descriptor.name.clone(),
            message,
        };

        fs::fresh_dir(&context.dir).map_err(|e| provision_error(format!("{:#}", e)))?;
        fs::ensure_dir(&context.bin_dir).map_err(|e| provision_error(format!("{:#}", e)))?;

        let packages = self
            .packages_argument(descriptor)
            .map_err(provision_error)?;
        let late = LateBindings {
            ctxdir: context.dir.clone(),
            envbindir: context.bin_dir.clone(),
            packages: packages.clone(),
        };

        let mut output = String::new();

        if !descriptor.provision_command.is_empty() {
            let chunk = self
                .run_step(descriptor, context, &descriptor.provision_command, &late, stop_token)
                .await?;
            output.push_str(&chunk);
        }

        if !packages.is_empty() {
            let chunk = self
                .run_step(descriptor, context, &descriptor.install_command, &late, stop_token)
                .await?;
            output.push_str(&chunk);
        }

        Ok(output)
    }

    /// Runs one provisioning step and fails on nonzero exit.
    async fn run_step(
        &self,
        descriptor: &EnvDescriptor,
        context: &IsolatedContext,
        template: &str,
        late: &LateBindings,
        stop_token: &CancellationToken,
    ) -> Result<String, RunnerError> {
        let provision_error = |message: String| RunnerError::Provision {
            env: descriptor.name.clone(),
            message,
        };

        let line = late.substitute(template);
        let parts = shlex::split(&line)
            .ok_or_else(|| provision_error(format!("cannot parse command `{}`", line)))?;
        if parts.is_empty() {
            return Err(provision_error("empty provisioning command".to_string()));
        }

        let mut cmd = tokio::process::Command::new(&parts[0]);
        cmd.args(&parts[1..])
            .current_dir(&self.confdir)
            .env("PATH", command::prepend_to_path(&context.bin_dir))
            .env("FACTOR_CTX_DIR", &context.dir)
            .kill_on_drop(true);

        let (status_res, output, _) = command::spawn_and_capture(cmd, Some(stop_token)).await;
        let status =
            status_res.map_err(|e| provision_error(format!("failed to run `{}`: {}", line, e)))?;
        if !status.success() {
            return Err(provision_error(format!(
                "`{}` exited with {}\n{}",
                line,
                status,
                output.trim_end()
            )));
        }
        Ok(output)
    }

    /// The `{packages}` argument for the install command: the dependencies
    /// in accumulation order, then the project requirement unless
    /// `skip_install` is set. Every element is shell-quoted.
    fn packages_argument(&self, descriptor: &EnvDescriptor) -> Result<String, String> {
        let mut packages: Vec<String> = descriptor.deps.clone();
        if !descriptor.skip_install {
            let project = self.confdir.display().to_string();
            if descriptor.extras.is_empty() {
                packages.push(project);
            } else {
                packages.push(format!("{}[{}]", project, descriptor.extras.join(",")));
            }
        }
        packages
            .iter()
            .map(|p| {
                shlex::try_quote(p)
                    .map(|q| q.into_owned())
                    .map_err(|_| format!("package specification contains a NUL byte: {:?}", p))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|quoted| quoted.join(" "))
    }
}

/// The stamp content: the key on the first line, the inputs after it.
fn stamp_material(descriptor: &EnvDescriptor, key: &str) -> String {
    format!(
        "{}\ninterpreter={}\ndeps={}\nextras={}\nskip_install={}\n",
        key,
        descriptor.interpreter,
        descriptor.deps.join(";"),
        descriptor.extras.join(";"),
        descriptor.skip_install,
    )
}
