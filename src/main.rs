use factor_runner::cli;
use factor_runner::errors::RunnerError;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            // The error class decides the exit code: configuration and
            // resolution problems are reported differently from execution
            // failures.
            match e.downcast_ref::<RunnerError>() {
                Some(error) => ExitCode::from(error.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}
