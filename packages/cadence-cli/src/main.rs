use anyhow::{Context, Result};
use cadence_scheduler::{
    EventLoop, Host, HostAdapter, HostCapabilities, RecordingSink, ScheduledCallback,
    SchedulerBuilder, SchedulerConfig, Time, WorkError,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::rc::{Rc, Weak};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Run simulated workloads through the cooperative scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic workload and report every slice
    Run(RunArgs),
    /// Print the default scheduler configuration as JSON
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum HostKind {
    /// Message channel, input query and high-resolution clock
    Interactive,
    /// Timers only
    TimerOnly,
}

#[derive(Args)]
struct RunArgs {
    /// Host capabilities to simulate
    #[arg(long, value_enum, default_value = "interactive")]
    mode: HostKind,
    /// Number of work units in the workload
    #[arg(long, default_value_t = 20)]
    units: u32,
    /// Milliseconds each unit takes
    #[arg(long, default_value_t = 1.5)]
    unit_cost: Time,
    /// Target frame rate; 0 resets the slice length
    #[arg(long, allow_negative_numbers = true)]
    fps: Option<f64>,
    /// Make this unit (0-based) fail
    #[arg(long)]
    fail_at: Option<u32>,
    /// Raise the host's input-pending flag after every n-th unit
    #[arg(long)]
    input_every: Option<u32>,
    /// Request a paint after every n-th unit
    #[arg(long)]
    paint_every: Option<u32>,
    /// Arm a timeout alongside the workload
    #[arg(long)]
    timeout: Option<Time>,
    /// Scheduler configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    force_fallback: bool,
    #[arg(long)]
    no_input_pending: bool,
    /// Use the monotonic clock instead of virtual time
    #[arg(long)]
    real_time: bool,
    /// Print stats as JSON
    #[arg(long)]
    json: bool,
}

struct Workload {
    units: u32,
    unit_cost: Time,
    fail_at: Option<u32>,
    input_every: Option<u32>,
    paint_every: Option<u32>,
}

fn every(n: Option<u32>, done: u32) -> bool {
    n.is_some_and(|n| n > 0 && done % n == 0)
}

impl Workload {
    /// Processes units until the scheduler asks for a yield.
    fn into_callback(self, host: Rc<EventLoop>, scheduler: Weak<dyn HostAdapter>) -> ScheduledCallback {
        let mut next = 0;
        let mut slice = 0;
        Box::new(move |has_time_remaining, started_at| {
            let Some(scheduler) = scheduler.upgrade() else {
                return Ok(false);
            };
            slice += 1;
            let first = next;
            while next < self.units {
                let unit = next;
                next += 1;
                host.advance(self.unit_cost);
                if self.fail_at == Some(unit) {
                    println!("slice {slice:>3} @ {started_at:>8.1}ms  unit {unit} failed");
                    return Err(WorkError::msg(format!("unit {unit} failed")));
                }
                if every(self.input_every, next) {
                    host.set_input_pending(true);
                    // the host handles the input on its next turn
                    let input_host = host.clone();
                    host.post_message(Box::new(move || {
                        input_host.set_input_pending(false);
                        Ok(())
                    }));
                }
                if every(self.paint_every, next) {
                    scheduler.request_paint();
                }
                if scheduler.should_yield() {
                    break;
                }
            }
            println!(
                "slice {slice:>3} @ {started_at:>8.1}ms  units {first:>3}..{next:<3} \
                 ran {:>6.1}ms  time_remaining={has_time_remaining}",
                host.now() - started_at
            );
            Ok(next < self.units)
        })
    }
}

fn load_config(args: &RunArgs) -> Result<SchedulerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            SchedulerConfig::from_json_str(&json)?
        }
        None => SchedulerConfig::default(),
    };
    if args.force_fallback {
        config.force_fallback = true;
    }
    if args.no_input_pending {
        config.enable_input_pending = false;
    }
    Ok(config)
}

fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let capabilities = match args.mode {
        HostKind::Interactive => HostCapabilities::interactive(),
        HostKind::TimerOnly => HostCapabilities::timer_only(),
    };
    let host = Rc::new(if args.real_time {
        EventLoop::real_time(capabilities)
    } else {
        EventLoop::virtual_time(capabilities)
    });

    let diagnostics = RecordingSink::new();
    let scheduler = SchedulerBuilder::new(host.clone())
        .config(config)
        .diagnostics(diagnostics.sink())
        .build()?;
    tracing::info!(mode = ?scheduler.mode(), "scheduler ready");

    if let Some(fps) = args.fps {
        scheduler.set_frame_rate(fps);
    }
    if let Some(delay) = args.timeout {
        scheduler.request_timeout(
            Box::new(|now| println!("timeout fired @ {now:>8.1}ms")),
            delay,
        );
    }

    let workload = Workload {
        units: args.units,
        unit_cost: args.unit_cost,
        fail_at: args.fail_at,
        input_every: args.input_every,
        paint_every: args.paint_every,
    };
    scheduler.request_callback(workload.into_callback(host.clone(), Rc::downgrade(&scheduler)));

    let turns = host.run_until_idle();
    println!("{turns} host turns, finished @ {:.1}ms", host.now());

    for diagnostic in diagnostics.take() {
        println!("diagnostic: {diagnostic}");
    }
    for err in host.take_unhandled_errors() {
        println!("unhandled: {err}");
    }

    let stats = scheduler.stats();
    if args.json {
        println!("{}", stats.to_json());
    } else {
        println!(
            "{:?}/{:?}: {} slices ({} failed), {} yields signalled, interval {}ms",
            stats.mode,
            stats.policy,
            stats.slices_run,
            stats.slices_failed,
            stats.yields_signalled,
            stats.yield_interval_ms
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args)?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&SchedulerConfig::default())?);
        }
    }

    Ok(())
}
