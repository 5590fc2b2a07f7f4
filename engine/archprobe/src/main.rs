use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use archhooks::{
    ArchHooks, BackendChoice, HooksConfig, IgnoreList, SectionStats, SystemInfo,
    TimeCriticalConfig,
};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "archprobe",
    about = "Run time-critical sections and report how the OS treated them"
)]
struct Args {
    /// Number of time-critical sections to run
    #[arg(long, default_value_t = 10)]
    iterations: u32,

    /// Work simulated inside each section (ms)
    #[arg(long, default_value_t = 1)]
    hold_ms: u64,

    /// Pause between sections (ms)
    #[arg(long, default_value_t = 50)]
    gap_ms: u64,

    /// Runtime/deadline = reference period / divisor
    #[arg(long, default_value_t = 60)]
    budget_divisor: u64,

    /// Report sections longer than this (ms)
    #[arg(long, default_value_t = 100)]
    overrun_ms: u64,

    /// Never touch the scheduler
    #[arg(long)]
    no_elevate: bool,

    /// Message IDs already silenced
    #[arg(long = "ignore")]
    ignored: Vec<String>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn hooks_config(&self) -> HooksConfig {
        let backend = if self.no_elevate {
            BackendChoice::Unsupported
        } else {
            BackendChoice::Native
        };

        HooksConfig::default()
            .with_backend(backend)
            .with_time_critical(TimeCriticalConfig::new(
                self.budget_divisor,
                Duration::from_millis(self.overrun_ms),
            ))
            .with_ignored_messages(self.ignored.iter().cloned())
    }
}

#[derive(Debug, serde::Serialize)]
struct Report {
    system: SystemInfo,
    backend: String,
    sections_run: u32,
    stats: SectionStats,
    interrupted_by: Option<String>,
    ignored_messages: IgnoreList,
}

fn run_sections(hooks: &ArchHooks, args: &Args, stop: &AtomicBool) -> u32 {
    let hold = Duration::from_millis(args.hold_ms);
    let gap = Duration::from_millis(args.gap_ms);
    let mut done = 0;

    for i in 0..args.iterations {
        if stop.load(Ordering::Acquire) {
            log::info!("Stopping after {} sections", done);
            break;
        }

        let guard = hooks.enter_time_critical_section();
        let elevated = guard.is_elevated();
        std::thread::sleep(hold);
        guard.exit();

        done += 1;
        log::debug!("section {}: elevated={}", i, elevated);
        std::thread::sleep(gap);
    }
    done
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let hooks = Arc::new(ArchHooks::new(args.hooks_config()).context("building arch hooks")?);
    hooks
        .install_signal_handlers()
        .context("installing crash handler")?;
    let system = hooks.dump_debug_info();
    let mut shutdown = hooks
        .shutdown_listener()
        .context("registering shutdown signals")?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut worker = {
        let hooks = hooks.clone();
        let args = args.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || run_sections(&hooks, &args, &stop))
    };

    let (sections_run, interrupted_by) = tokio::select! {
        done = &mut worker => (done.context("section worker panicked")?, None),
        sig = shutdown.recv() => {
            stop.store(true, Ordering::Release);
            let done = worker.await.context("section worker panicked")?;
            (done, Some(sig.as_str().to_string()))
        }
    };

    let stats = hooks.time_critical_stats();
    if stats.clock_failures > 0 {
        hooks.message_box_ok(
            "The scheduler could not be asked for real-time priority; audio may stutter.",
            "no-realtime-scheduling",
        );
    }
    if stats.overruns > 0 {
        hooks.message_box_ok(
            &format!(
                "{} of {} time-critical sections were preempted by the OS.",
                stats.overruns, stats.entries
            ),
            "time-critical-overruns",
        );
    }

    let report = Report {
        system,
        backend: hooks.time_critical().backend_name().to_string(),
        sections_run,
        stats,
        interrupted_by,
        ignored_messages: hooks.alerts().ignore_list(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        log::info!(
            "{} sections on '{}': {} overruns, {} clock failures, max {:?}",
            report.sections_run,
            report.backend,
            report.stats.overruns,
            report.stats.clock_failures,
            report.stats.max_elapsed
        );
    }

    Ok(())
}
