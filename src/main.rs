//! CLI Entry Point for daq-sequencer
//!
//! Runs a demo experiment on mock hardware: home the stage, sweep it across a range
//! of positions sampling a meter at each one, park the stage, close the shutter.
//!
//! # Usage
//!
//! ```bash
//! daq-sequencer demo --points 7 --fail-at 3
//! daq-sequencer demo --stop-after-ms 400 --resume
//! daq-sequencer --config config/sequencer.toml config
//! ```
//!
//! Ctrl-C stops the running queue; the current action is marked Interrupted.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use daq_sequencer::config::{SequencerConfig, DEFAULT_CONFIG_PATH};
use daq_sequencer::mock::{MockMeter, MockStage, StageScan};
use daq_sequencer::{logging, Action, ActionQueue, QueueOutcome, SweepValue};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "daq-sequencer")]
#[command(about = "Action queue and parameter-sweep sequencer", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stage-scan demo queue on mock hardware
    Demo {
        /// Number of sweep positions (overrides demo.points)
        #[arg(long)]
        points: Option<usize>,

        /// Inject a measurement failure at this position index
        #[arg(long)]
        fail_at: Option<usize>,

        /// Make the measurement critical so a failure aborts the queue
        #[arg(long)]
        critical: bool,

        /// Request a stop after this many milliseconds
        #[arg(long)]
        stop_after_ms: Option<u64>,

        /// Resume the queue once after an interrupted run
        #[arg(long)]
        resume: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SequencerConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Config => {
            config.validate()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Demo {
            points,
            fail_at,
            critical,
            stop_after_ms,
            resume,
        } => {
            if let Some(points) = points {
                config.demo.points = points;
            }
            if fail_at.is_some() {
                config.demo.fail_at_point = fail_at;
            }
            config.demo.critical_failure |= critical;
            config.validate()?;
            logging::init_from_config(&config)?;

            run_demo(config, stop_after_ms, resume).await
        }
    }
}

async fn run_demo(config: SequencerConfig, stop_after_ms: Option<u64>, resume: bool) -> Result<()> {
    let queue = Arc::new(build_demo_queue(&config)?);
    tracing::info!(
        application = %config.application.name,
        actions = queue.len(),
        "Demo queue ready"
    );

    let ctrl_c_queue = Arc::clone(&queue);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received; stopping queue");
            ctrl_c_queue.stop();
        }
    });

    if let Some(ms) = stop_after_ms {
        let timed_queue = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            tracing::info!(after_ms = ms, "Requesting stop");
            timed_queue.stop();
        });
    }

    let mut outcome = run_blocking(&queue, false).await?;
    if outcome == QueueOutcome::Interrupted && resume {
        tracing::info!("Resuming interrupted queue");
        outcome = run_blocking(&queue, true).await?;
    }

    print_summary(&queue, outcome)?;
    Ok(())
}

/// Run the queue on the blocking pool; queue runs are synchronous.
async fn run_blocking(queue: &Arc<ActionQueue>, resume: bool) -> Result<QueueOutcome> {
    let queue = Arc::clone(queue);
    let outcome = tokio::task::spawn_blocking(move || {
        if resume {
            queue.resume()
        } else {
            queue.start()
        }
    })
    .await
    .map_err(|e| anyhow!("queue task failed: {}", e))??;
    Ok(outcome)
}

fn build_demo_queue(config: &SequencerConfig) -> Result<ActionQueue> {
    let demo = &config.demo;

    let stage = Arc::new(
        MockStage::with_speed(20.0).with_settle(Duration::from_millis(demo.settle_ms)),
    );
    let centre = (demo.start_mm + demo.stop_mm) / 2.0;
    let width = ((demo.stop_mm - demo.start_mm) / 4.0).abs().max(0.1);
    let meter = Arc::new(MockMeter::new(1.0, centre, width));

    let values = SweepValue::linear(demo.start_mm, demo.stop_mm, demo.points);
    let retries = demo.retry_count.max(config.engine.default_retry_count);

    // Measurement template
    let mut scan = StageScan::new(Arc::clone(&stage), meter, demo.samples_per_point);
    if let Some(index) = demo.fail_at_point {
        let position = values
            .get(index)
            .and_then(SweepValue::as_f64)
            .ok_or_else(|| anyhow!("no sweep position at index {}", index))?;
        // Every attempt at this position fails.
        scan = scan.fail_at(position, retries);
    }
    let template = Action::measurement(scan);
    config.engine.apply(&template);
    template
        .as_measurement()
        .ok_or_else(|| anyhow!("measurement template has the wrong kind"))?
        .set_retry_count(retries);
    // Copies inherit the flag and the sweep adopts it from the running child.
    template.set_critical(demo.critical_failure);

    // Sweep
    let sweep = Action::sweep("Stage position");
    let handle = sweep
        .as_sweep()
        .ok_or_else(|| anyhow!("sweep has the wrong kind"))?;
    handle.set_formatter(|value| match value.as_f64() {
        Some(mm) => format!("{:.2} mm", mm),
        None => value.to_string(),
    })?;
    let move_stage = Arc::clone(&stage);
    handle.set_generator(move |value: &SweepValue, copies: Vec<Action>| {
        let target = value.as_f64().unwrap_or_default();
        let stage = Arc::clone(&move_stage);
        let mut actions = vec![Action::simple(
            format!("Move stage to {:.2} mm", target),
            move |ctx| stage.move_abs(ctx, target),
        )];
        actions.extend(copies);
        actions
    })?;
    handle.add_template(template)?;
    handle.set_values(values)?;

    let park_stage = Arc::clone(&stage);
    let park = demo.start_mm;
    handle.add_final_action(Action::simple("Park stage", move |ctx| {
        park_stage.move_abs(ctx, park)
    }))?;

    // Hooks
    let pre_hooks = ActionQueue::new();
    let home_stage = Arc::clone(&stage);
    let home = demo.start_mm;
    pre_hooks.add_action(Action::simple("Home stage", move |ctx| {
        home_stage.move_abs(ctx, home)
    }))?;

    let post_hooks = ActionQueue::new();
    post_hooks.add_action(Action::simple("Close shutter", |ctx| {
        ctx.sleep(Duration::from_millis(20))
    }))?;

    let queue = ActionQueue::new();
    queue.set_pre_hooks(Some(Arc::new(pre_hooks)))?;
    queue.set_post_hooks(Some(Arc::new(post_hooks)))?;
    queue.add_action(Action::wait(Duration::from_millis(100)))?;
    queue.add_action(sweep)?;
    for action in queue.actions() {
        config.engine.apply(&action);
    }

    queue.add_message_listener(|message| {
        if let Some(action) = &message.action {
            println!("[{}] {:?}: {}", action, message.level, message.text);
        }
    });

    Ok(queue)
}

fn print_summary(queue: &ActionQueue, outcome: QueueOutcome) -> Result<()> {
    let snapshots: Vec<_> = queue.actions().iter().map(Action::snapshot).collect();
    let summary = serde_json::json!({
        "outcome": outcome,
        "actions": snapshots,
        "messages": queue.messages(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
