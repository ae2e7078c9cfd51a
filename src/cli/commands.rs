//! # CLI Commands Module / CLI 命令模块
//!
//! The subcommands of the command-line interface.
//! 命令行接口的子命令。

pub mod init;
pub mod list;
pub mod run;
