// src/cli.rs
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::process::ExitCode;
use std::{env, path::PathBuf};

use crate::core::config::DEFAULT_CONFIG_NAME;
use crate::infra::t;

pub mod commands;

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> String {
    let args: Vec<String> = env::args().collect();
    let requested = args
        .iter()
        .position(|arg| arg == "--lang")
        .and_then(|pos| args.get(pos + 1).cloned());
    // Fallback to system language detection
    let locale = requested
        .or_else(sys_locale::get_locale)
        .unwrap_or_else(|| "en".to_string());
    normalize_locale(&locale)
}

/// Maps a locale tag onto the bundled translations. It attempts to match the
/// full locale (e.g. "zh-CN"), then just the language code (e.g. "en"), and
/// finally falls back to the default language ("en").
pub fn normalize_locale(locale: &str) -> String {
    let available_locales = rust_i18n::available_locales!();
    if available_locales.contains(&locale) {
        locale.to_string()
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
            .to_string()
    }
}

fn build_cli(locale: &str) -> Command {
    Command::new("factor-runner")
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help(t!("arg_config", locale = locale).to_string())
                        .value_name("CONFIG")
                        .default_value(DEFAULT_CONFIG_NAME)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("envs")
                        .short('e')
                        .long("envs")
                        .help(t!("arg_envs", locale = locale).to_string())
                        .value_name("ENVS")
                        .value_delimiter(',')
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .conflicts_with("serial")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("serial")
                        .long("serial")
                        .help(t!("arg_serial", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help(t!("arg_timeout", locale = locale).to_string())
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(u64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("posargs")
                        .help(t!("arg_posargs", locale = locale).to_string())
                        .value_name("POSARGS")
                        .num_args(0..)
                        .last(true)
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("list")
                .about(t!("cmd_list_about", locale = locale).to_string())
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help(t!("arg_config", locale = locale).to_string())
                        .value_name("CONFIG")
                        .default_value(DEFAULT_CONFIG_NAME)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("envs")
                        .short('e')
                        .long("envs")
                        .help(t!("arg_envs", locale = locale).to_string())
                        .value_name("ENVS")
                        .value_delimiter(',')
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

pub async fn run() -> Result<ExitCode> {
    // Pre-parse language and initialize i18n first.
    let language = pre_parse_language();
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let config = run_matches
                .get_one::<PathBuf>("config")
                .unwrap() // Has default
                .clone();
            let envs: Vec<String> = run_matches
                .get_many::<String>("envs")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default();
            let jobs = run_matches.get_one::<usize>("jobs").copied();
            let serial = run_matches.get_flag("serial");
            let timeout = run_matches.get_one::<u64>("timeout").copied();
            let html = run_matches.get_one::<PathBuf>("html").cloned();
            let posargs: Vec<String> = run_matches
                .get_many::<String>("posargs")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default();

            commands::run::execute(config, envs, jobs, serial, timeout, html, posargs, &language)
                .await
        }
        Some(("list", list_matches)) => {
            let config = list_matches
                .get_one::<PathBuf>("config")
                .unwrap() // Has default
                .clone();
            let envs: Vec<String> = list_matches
                .get_many::<String>("envs")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default();

            commands::list::execute(config, envs, &language)
        }
        Some(("init", init_matches)) => {
            let non_interactive = init_matches.get_flag("non-interactive");

            // Show language detection message if it was auto-detected
            if env::args().all(|arg| arg != "--lang") {
                println!(
                    "🌐 {}",
                    t!("system_language_detected", locale = &language, lang = &language)
                );
            }
            commands::init::run_init_wizard(&language, non_interactive)?;
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            // This case handles when no subcommand is given.
            // Clap will have already printed help info.
            Ok(ExitCode::SUCCESS)
        }
    }
}
