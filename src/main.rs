use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::info;

use pulsed_extraction::config::RunConfig;
use pulsed_extraction::{Collaborators, Extraction, ExtractionDispatcher, SaveMetadata};

#[derive(Parser, Debug)]
#[command(version, about = "Extract and analyze laser pulses from a measurement trace")]
struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Run load → extract → analyze → save as described by a JSON config.
    Run(RunArgs),
    /// List the supported extraction methods.
    Methods,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON run configuration.
    config: PathBuf,
    /// Override the trace file.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Override the extraction method tag.
    #[arg(short, long)]
    method: Option<String>,
    /// Discard the first extracted pulse.
    #[arg(long)]
    drop_first: bool,
    /// Print results without saving.
    #[arg(long)]
    no_save: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.action {
        Action::Methods => {
            for method in ExtractionDispatcher::get_supported_methods() {
                println!("{method}");
            }
            Ok(())
        }
        Action::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = RunConfig::load(&args.config)?;
    if let Some(input) = args.input {
        config.input.path = input;
    }
    if let Some(method) = args.method {
        config.extraction.method = method;
    }
    if args.drop_first {
        config.extraction.drop_first = true;
    }
    if args.no_save {
        config.save = None;
    }

    let save_root = config
        .save
        .as_ref()
        .map(|s| s.root.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let dispatcher = ExtractionDispatcher::activate(Collaborators::standard(save_root));
    let started = Local::now();

    let options = config.input.load_options()?;
    let trace = dispatcher
        .load_with(&config.input.path, &options)
        .with_context(|| format!("loading {}", config.input.path.display()))?;
    info!("loaded {} rows", trace.n_rows());

    let extraction = dispatcher
        .extract(
            &trace,
            &config.extraction.method,
            config.extraction.drop_first,
            &config.extraction.params,
        )
        .context("extracting laser pulses")?;
    let pulses = match extraction {
        Extraction::Pulses(p) => p,
        Extraction::Unsupported { method } => {
            println!("Method '{method}' is not implemented; nothing extracted.");
            dispatcher.deactivate();
            return Ok(());
        }
    };

    println!("Pulses: {}", dispatcher.pulse_count(&pulses));
    if let Ok(sum) = dispatcher.sum_pulses(&pulses) {
        let total: f64 = sum.iter().sum();
        println!("Summed pulse: {} bins, {total} counts", sum.len());
    }

    let a = config.analysis;
    let results = dispatcher
        .analyze(&pulses, a.norm_start, a.norm_end, a.signal_start, a.signal_end)
        .context("analyzing pulses")?;
    let x = dispatcher.compute_x_axis(
        results.signal(),
        config.x_axis.start,
        config.x_axis.increment,
        config.x_axis.alternating,
    );

    print_table(&x, results.signal(), results.measuring_error(), config.x_axis.alternating);

    if let Some(save) = &config.save {
        let metadata = SaveMetadata {
            start: started,
            stop: Local::now(),
            count_frequency: save.count_frequency,
            oversampling: save.oversampling,
            smooth_window_length: save.smooth_window_length,
        };
        let files = dispatcher
            .save_results(&results, &x, &metadata, &save.save_options(config.x_axis.alternating))
            .context("saving results")?;
        println!("Saved {}", files.data.display());
        if let Some(fig) = files.figure {
            println!("Figure {}", fig.display());
        }
    }

    dispatcher.deactivate();
    Ok(())
}

fn print_table(x: &[f64], signal: &[f64], error: &[f64], alternating: bool) {
    let step = if alternating { 2 } else { 1 };
    println!("{:>14} {:>14} {:>14}", "x", "signal", "error");
    for (i, xi) in x.iter().enumerate() {
        for j in 0..step {
            let k = i * step + j;
            if let (Some(s), Some(e)) = (signal.get(k), error.get(k)) {
                println!("{xi:>14.6} {s:>14.6} {e:>14.6}");
            }
        }
    }
}
