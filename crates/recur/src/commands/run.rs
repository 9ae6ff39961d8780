//! Run command

use anyhow::{anyhow, Result};
use camino::Utf8Path;
use recur_core::retry::{AnyOf, RetryError, RetryExecutorBuilder, TracingObserver};
use recur_core::RecurConfig;
use tokio_util::sync::CancellationToken;

use crate::cli::RunArgs;
use crate::commands::resolve_policy;
use crate::output;
use crate::process::{self, CommandError, ExitCodePredicate, StderrPredicate};

/// Exit status used when the run is interrupted
const INTERRUPTED_EXIT_CODE: i32 = 130;

pub async fn run(args: RunArgs, config: Option<&Utf8Path>) -> Result<()> {
    let config = RecurConfig::load(config)?;
    let policy = resolve_policy(&config, &args.policy)?;

    let (program, program_args) = args
        .command
        .split_first()
        .ok_or_else(|| anyhow!("No command given"))?;

    tracing::debug!(
        program = %program,
        max_retries = policy.max_retry_count(),
        max_delay_ms = policy.max_retry_delay().as_millis() as u64,
        "resolved retry policy"
    );

    let executor = RetryExecutorBuilder::new()
        .with_policy(policy)
        .with_predicate(predicate(&args))
        .with_observer(TracingObserver::new(program.as_str()))
        .with_jitter(!args.policy.no_jitter)
        .build();

    let result = if args.blocking {
        executor.execute(|_ctx| process::run_blocking(program, program_args))
    } else {
        let cancellation = CancellationToken::new();
        let ctrl_c = tokio::spawn(cancel_on_ctrl_c(cancellation.clone()));

        let result = executor
            .execute_async(
                |_ctx| process::run_async(program, program_args),
                &cancellation,
            )
            .await;

        ctrl_c.abort();
        result
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            report(program, &err);
            std::process::exit(exit_code(&err));
        }
    }
}

/// Classify failures from the retry flags
///
/// Without flags every non-zero exit is transient. With flags, a failure is
/// transient if its exit code is listed or its stderr matches a pattern.
fn predicate(args: &RunArgs) -> AnyOf<ExitCodePredicate, StderrPredicate> {
    let exit_codes = if args.retry_on_exit.is_empty() && args.retry_on_output.is_empty() {
        ExitCodePredicate::any()
    } else {
        ExitCodePredicate::only(args.retry_on_exit.clone())
    };

    AnyOf(exit_codes, StderrPredicate::new(args.retry_on_output.clone()))
}

async fn cancel_on_ctrl_c(cancellation: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("interrupt received, cancelling");
        cancellation.cancel();
    }
}

fn report(program: &str, err: &RetryError<CommandError>) {
    match err {
        RetryError::Operation(failure) => {
            output::error(&failure.to_string());
        }
        RetryError::LimitExceeded { failures, .. } => {
            output::error(&format!(
                "`{}` failed after {} attempts",
                program,
                failures.len()
            ));
            for (i, failure) in failures.iter().enumerate() {
                output::detail(&format!("attempt {}", i + 1), &failure.to_string());
            }
        }
        RetryError::Cancelled { attempts, .. } => {
            output::warning(&format!(
                "`{}` cancelled after {} attempts",
                program, attempts
            ));
        }
    }
}

fn exit_code(err: &RetryError<CommandError>) -> i32 {
    match err {
        RetryError::Cancelled { .. } => INTERRUPTED_EXIT_CODE,
        _ => err.last_failure().map(CommandError::exit_code).unwrap_or(1),
    }
}
