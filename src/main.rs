//! garmin-fetch - CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use secrecy::ExposeSecret;
use tracing_subscriber::{fmt, EnvFilter};

use garmin_fetch::{
    api::Credentials,
    cancel::CancelSignal,
    cli::Args,
    config::{validate_config, Config},
    error::{exit_codes, Error, Result},
    output::{
        print_banner, print_config_summary, print_error, print_info, print_run_stats,
        print_success, print_warning,
    },
    pipeline::{FetchPipeline, RunResult},
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(result) => {
            let code = if result.cancelled {
                exit_codes::ABORT
            } else if result.has_failures() {
                exit_codes::SOME_ITEMS_FAILED
            } else {
                exit_codes::SUCCESS
            };
            ExitCode::from(code as u8)
        }
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Config(_) | Error::ConfigValidation { .. } | Error::MissingConfig(_) => {
                    ExitCode::from(exit_codes::CONFIG_ERROR as u8)
                }
                Error::Authentication(_) | Error::Handshake(_) => {
                    ExitCode::from(exit_codes::AUTH_ERROR as u8)
                }
                Error::Filesystem { .. } | Error::Io(_) => {
                    ExitCode::from(exit_codes::FILESYSTEM_ERROR as u8)
                }
                Error::Cancelled => ExitCode::from(exit_codes::ABORT as u8),
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run() -> Result<RunResult> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));

    fmt().with_env_filter(filter).with_target(false).init();

    if !args.quiet {
        print_banner();
    }

    // Load configuration
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            args.config.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;

    let output_dir = config.output_directory();
    let count = args.activity_count(&config);
    let overwrite = config.options.overwrite;

    if !args.quiet {
        print_config_summary(
            &config.account.username,
            count,
            &output_dir.display().to_string(),
            overwrite,
        );
    }

    let credentials = Credentials::new(
        config.account.username.clone(),
        config.account.password.expose_secret(),
    );

    // Ctrl-C stops the run between activities
    let (handle, cancel) = CancelSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            print_warning("Interrupted, finishing the current activity...");
            handle.cancel();
        }
    });

    print_info("Logging in to Garmin Connect...");
    let pipeline = FetchPipeline::new(config, credentials).with_staging(args.resume_staging.clone());
    let result = pipeline.run(&output_dir, count, overwrite, &cancel).await?;

    print_run_stats(&result);

    if result.cancelled {
        print_warning("Run cancelled");
    } else if result.has_failures() {
        print_warning("Some activities could not be fetched");
    } else {
        print_success("Done");
    }

    Ok(result)
}
