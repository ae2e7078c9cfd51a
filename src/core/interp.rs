//! # Placeholder Interpolation Module / 占位符插值模块
//!
//! This module substitutes `{placeholder}` references inside configuration
//! values. Substitution is fail-closed: a name without a binding is an error,
//! never silently passed through. The only exceptions are the late-bound
//! names that depend on the context cache key and are substituted after
//! resolution.
//!
//! 此模块替换配置值中的 `{placeholder}` 引用。
//! 替换采用故障关闭策略：没有绑定的名称是错误，绝不会被静默传递。
//! 唯一的例外是依赖上下文缓存键的延迟绑定名称，它们在解析之后才被替换。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::errors::{RunnerError, RunnerResult};

/// Placeholder names that survive resolution untouched and are substituted
/// once the context directory is known.
pub const LATE_PLACEHOLDERS: &[&str] = &["ctxdir", "envbindir", "packages"];

/// The typed substitution context for one environment.
///
/// `{env:VAR}` reads from `environ`, a snapshot of the invoking process
/// environment taken when the bindings are built, so resolving the same
/// inputs twice yields the same output.
///
/// 单个环境的类型化替换上下文。
/// `{env:VAR}` 读取 `environ`，即构建绑定时对调用进程环境的快照，
/// 因此对相同输入的两次解析会得到相同的结果。
#[derive(Debug, Clone)]
pub struct Bindings {
    pub confdir: PathBuf,
    pub workdir: PathBuf,
    pub envname: String,
    pub envdir: PathBuf,
    pub envtmpdir: PathBuf,
    pub posargs: Vec<String>,
    pub environ: HashMap<String, String>,
}

impl Bindings {
    /// Builds the bindings for `envname`, snapshotting the process
    /// environment. The environment directory layout is derived from the
    /// work directory.
    pub fn new(confdir: &Path, workdir: &Path, envname: &str) -> Self {
        let envdir = workdir.join("envs").join(envname);
        let envtmpdir = envdir.join("tmp");
        Bindings {
            confdir: confdir.to_path_buf(),
            workdir: workdir.to_path_buf(),
            envname: envname.to_string(),
            envdir,
            envtmpdir,
            posargs: Vec::new(),
            environ: std::env::vars().collect(),
        }
    }

    /// Attaches the invoker's positional arguments.
    pub fn with_posargs(mut self, posargs: Vec<String>) -> Self {
        self.posargs = posargs;
        self
    }
}

/// Substitutes every placeholder in `input`.
///
/// Supported names: `confdir`, `workdir`, `envname`, `envdir`, `envtmpdir`,
/// `posargs` (with optional `:default`), `env:VAR` (with optional
/// `:default`). `{{` and `}}` escape literal braces. Late-bound names pass
/// through unchanged; any other name fails with `UnresolvedPlaceholder`
/// naming `key` and the environment.
///
/// 替换 `input` 中的每个占位符。`{{` 和 `}}` 转义字面花括号。
pub fn interpolate(input: &str, bindings: &Bindings, key: &str) -> RunnerResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            // A lone closing brace is literal text.
            out.push('}');
            rest = &tail[1..];
            continue;
        }
        let Some(close) = tail.find('}') else {
            return Err(RunnerError::UnresolvedPlaceholder {
                placeholder: tail[1..].to_string(),
                location: location(key, &bindings.envname),
            });
        };
        let token = &tail[1..close];
        out.push_str(&resolve_token(token, bindings, key)?);
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn location(key: &str, envname: &str) -> String {
    format!("key '{}' of environment '{}'", key, envname)
}

fn resolve_token(token: &str, bindings: &Bindings, key: &str) -> RunnerResult<String> {
    if let Some(spec) = token.strip_prefix("env:") {
        let (var, default) = match spec.split_once(':') {
            Some((var, default)) => (var, Some(default)),
            None => (spec, None),
        };
        if var.is_empty() {
            return Err(RunnerError::UnresolvedPlaceholder {
                placeholder: token.to_string(),
                location: location(key, &bindings.envname),
            });
        }
        return match bindings.environ.get(var) {
            Some(value) => Ok(value.clone()),
            None => default.map(str::to_string).ok_or_else(|| {
                RunnerError::UnresolvedPlaceholder {
                    placeholder: token.to_string(),
                    location: location(key, &bindings.envname),
                }
            }),
        };
    }

    if token == "posargs" || token.starts_with("posargs:") {
        let default = token.strip_prefix("posargs:").unwrap_or("");
        return if bindings.posargs.is_empty() {
            Ok(default.to_string())
        } else {
            quote_join(&bindings.posargs, &bindings.envname, key)
        };
    }

    match token {
        "confdir" => Ok(bindings.confdir.display().to_string()),
        "workdir" => Ok(bindings.workdir.display().to_string()),
        "envname" => Ok(bindings.envname.clone()),
        "envdir" => Ok(bindings.envdir.display().to_string()),
        "envtmpdir" => Ok(bindings.envtmpdir.display().to_string()),
        late if LATE_PLACEHOLDERS.contains(&late) => Ok(format!("{{{}}}", late)),
        _ => Err(RunnerError::UnresolvedPlaceholder {
            placeholder: token.to_string(),
            location: location(key, &bindings.envname),
        }),
    }
}

/// Joins positional arguments into one shell-safe string.
/// 将位置参数连接为一个对 shell 安全的字符串。
fn quote_join(args: &[String], envname: &str, key: &str) -> RunnerResult<String> {
    let quoted: Result<Vec<String>, _> = args
        .iter()
        .map(|arg| shlex::try_quote(arg).map(|q| q.into_owned()))
        .collect();
    match quoted {
        Ok(parts) => Ok(parts.join(" ")),
        Err(_) => Err(RunnerError::Resolution {
            env: envname.to_string(),
            message: format!(
                "positional argument contains a NUL byte and cannot be quoted into key '{}'",
                key
            ),
        }),
    }
}

/// Values substituted for the late-bound placeholders once the context
/// cache key, and with it the context directory, is known.
/// 一旦上下文缓存键（以及由此确定的上下文目录）已知，
/// 用于替换延迟绑定占位符的值。
#[derive(Debug, Clone)]
pub struct LateBindings {
    pub ctxdir: PathBuf,
    pub envbindir: PathBuf,
    pub packages: String,
}

impl LateBindings {
    /// Substitutes the late placeholders in an already-resolved value.
    pub fn substitute(&self, input: &str) -> String {
        input
            .replace("{ctxdir}", &self.ctxdir.display().to_string())
            .replace("{envbindir}", &self.envbindir.display().to_string())
            .replace("{packages}", &self.packages)
    }
}
