use std::sync::Arc;

use surge_runner::prelude::*;

fn setup(ctx: &mut RunnerContext<()>) -> HookResult {
    log::info!(
        "Load testing {} with a ramp of {:?}",
        ctx.get_connection_string(),
        ctx.config().profile.total_duration()
    );

    Ok(())
}

fn iteration(ctx: &mut VuContext<(), ()>) -> IterationOutcome {
    let response = ctx.http_get(&ctx.url("/get"));

    // Uncomment to pace each virtual user to at most one request per second.
    // let _ = ctx.sleep(std::time::Duration::from_secs(1));

    IterationOutcome::checked(response, &[status_was("status was 200", 200)])
}

fn teardown(ctx: Arc<RunnerContext<()>>) -> HookResult {
    let totals = ctx.reporter().totals();
    if totals.operation_errors > 0 {
        log::warn!(
            "{} of {} requests failed without a response",
            totals.operation_errors,
            totals.operations
        );
    }

    Ok(())
}

fn main() -> SurgeResult<()> {
    let builder = ScenarioDefinitionBuilder::<(), ()>::new_with_init(env!("CARGO_PKG_NAME"))
        .with_default_connection_string("http://localhost:8080")
        .with_stages(vec![
            StageOptions::new("15s", 500),
            StageOptions::new("1m30s", 500),
            StageOptions::new("15s", 0),
        ])
        .use_setup(setup)
        .use_iteration(iteration)
        .use_teardown(teardown);

    let summary = run(builder)?;

    if summary.checks_failed() > 0 {
        log::warn!(
            "{} of {} checks failed",
            summary.checks_failed(),
            summary.checks_failed() + summary.checks_passed()
        );
    }

    Ok(())
}
