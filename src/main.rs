//! math-melody: render a mathematical expression as notes or samples.

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use math_melody::config::SessionConfig;
use math_melody::control::{Param, ParameterController};
use math_melody::expr::{Expression, PRESETS};
use math_melody::mapping::{
    midi_to_freq, parse_note_name, MappingEngine, MappingOutput, ScaleSpec,
};
use math_melody::synth::{CancelFlag, Renderer, Voice};

#[derive(Parser)]
#[command(name = "math-melody")]
#[command(about = "Turn mathematical expressions into note sequences and samples", long_about = None)]
struct Cli {
    /// Session config (YAML). Defaults to ~/.math-melody/config.yaml if present.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set a parameter before rendering, e.g. `--set morph_factor=0.5`.
    #[arg(long = "set", value_name = "PARAM=VALUE", global = true)]
    params: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map f(x) directly to notes
    Notes {
        expr: String,
        #[command(flatten)]
        mapping: MappingArgs,
    },

    /// Blend two functions by the morph factor and map the result
    Morph {
        first: String,
        second: String,
        #[command(flatten)]
        mapping: MappingArgs,
    },

    /// Map the curve (x(t), y(t)) to notes
    Parametric {
        x: String,
        y: String,
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        t_min: f64,
        #[arg(long, default_value = "6.283185307179586", allow_hyphen_values = true)]
        t_max: f64,
        #[command(flatten)]
        mapping: MappingArgs,
    },

    /// Print oscillator samples
    Samples {
        expr: String,
        #[arg(short, long, conflicts_with = "note")]
        frequency: Option<f64>,
        /// Base frequency as a note name, e.g. `A4`
        #[arg(long)]
        note: Option<String>,
        #[arg(short = 'n', long, default_value = "64")]
        count: usize,
        #[arg(long)]
        sample_rate: Option<u32>,
        #[arg(long)]
        harmonics: Option<u32>,
    },

    /// List the built-in expressions
    Presets,
}

/// Overrides for the mapping section of the session config.
#[derive(Args)]
struct MappingArgs {
    #[arg(short = 'n', long)]
    sample_count: Option<usize>,
    #[arg(long, allow_hyphen_values = true)]
    x_min: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    x_max: Option<f64>,
    #[arg(long)]
    min_note: Option<u8>,
    #[arg(long)]
    max_note: Option<u8>,
    /// Scale name, e.g. `major` or `pentatonic_minor`
    #[arg(long)]
    scale: Option<String>,
    #[arg(long)]
    root_note: Option<u8>,
    #[arg(long, allow_hyphen_values = true)]
    transpose: Option<i32>,
    /// Print start and duration in seconds instead of beats
    #[arg(long)]
    seconds: bool,
}

impl MappingArgs {
    fn apply(&self, session: &mut SessionConfig) {
        let m = &mut session.mapping;
        if let Some(n) = self.sample_count {
            m.sample_count = n;
        }
        if let Some(lo) = self.x_min {
            m.x_range.0 = lo;
        }
        if let Some(hi) = self.x_max {
            m.x_range.1 = hi;
        }
        if let Some(n) = self.min_note {
            m.min_note = n;
        }
        if let Some(n) = self.max_note {
            m.max_note = n;
        }
        if let Some(name) = &self.scale {
            m.scale = Some(ScaleSpec::Named(name.clone()));
        }
        if let Some(n) = self.root_note {
            m.root_note = n;
        }
        if let Some(t) = self.transpose {
            m.transpose = t;
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut session = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::load_default()?.unwrap_or_default(),
    };

    let controller = ParameterController::new(session.controls.clone())
        .with_channel_filter(session.channel_filter);
    for assignment in &cli.params {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected PARAM=VALUE, got '{assignment}'"))?;
        let param: Param = name.trim().parse()?;
        let value: f64 = value.trim().parse()?;
        if controller.set(param, value) {
            info!(%param, value, stored = controller.snapshot().get(param), "value clamped");
        }
    }

    match cli.command {
        Commands::Notes { expr, mapping } => {
            mapping.apply(&mut session);
            let engine = engine_for(&session)?;
            let f = Expression::parse(&expr)?;
            print_notes(&engine.direct(&f)?, &session, mapping.seconds);
        }

        Commands::Morph {
            first,
            second,
            mapping,
        } => {
            mapping.apply(&mut session);
            let engine = engine_for(&session)?;
            let a = Expression::parse(&first)?;
            let b = Expression::parse(&second)?;
            let out = engine.morph(&a, &b, &controller.snapshot())?;
            print_notes(&out, &session, mapping.seconds);
        }

        Commands::Parametric {
            x,
            y,
            t_min,
            t_max,
            mapping,
        } => {
            mapping.apply(&mut session);
            let engine = engine_for(&session)?;
            let x_t = Expression::parse_with_vars(&x, &["t"])?;
            let y_t = Expression::parse_with_vars(&y, &["t"])?;
            let out = engine.parametric(&x_t, &y_t, (t_min, t_max))?;
            print_notes(&out, &session, mapping.seconds);
        }

        Commands::Samples {
            expr,
            frequency,
            note,
            count,
            sample_rate,
            harmonics,
        } => {
            if let Some(f) = frequency {
                session.frequency = f;
            }
            if let Some(name) = note {
                let midi =
                    parse_note_name(&name).ok_or_else(|| format!("invalid note name '{name}'"))?;
                session.frequency = midi_to_freq(midi);
            }
            if let Some(rate) = sample_rate {
                session.sample_rate = rate;
            }
            if let Some(h) = harmonics {
                session.mapping.harmonics = h;
            }
            session.validate()?;

            let voice = Voice::new(Expression::parse(&expr)?, session.mapping.harmonics)?;
            let mut renderer = Renderer::from_session(voice, controller, &session)?;

            let cancel = CancelFlag::new();
            let handler_flag = cancel.clone();
            ctrlc::set_handler(move || handler_flag.cancel())?;

            let summary = renderer.render(count, &cancel, |buf| {
                for s in buf {
                    println!("{s:.6}");
                }
            });
            info!(
                buffers = summary.buffers,
                samples = summary.samples,
                domain_errors = summary.domain_errors,
                cancelled = summary.cancelled,
                "done"
            );
        }

        Commands::Presets => {
            for preset in PRESETS {
                println!("{preset}");
            }
        }
    }

    Ok(())
}

fn engine_for(session: &SessionConfig) -> Result<MappingEngine, Box<dyn Error>> {
    session.validate()?;
    Ok(MappingEngine::new(session.mapping.clone())?.with_derivative(session.derivative_estimator()))
}

fn print_notes(out: &MappingOutput, session: &SessionConfig, seconds: bool) {
    let notes = if seconds {
        out.to_seconds(session.mapping.tempo)
    } else {
        out.notes.clone()
    };
    println!("start\tdur\tpitch\tvel\tmod\tbend");
    for n in &notes {
        let bend = n.pitch_bend.map(|b| b.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:.3}\t{:.3}\t{}\t{}\t{:.3}\t{}",
            n.start_time, n.duration, n.pitch, n.velocity, n.modulation, bend
        );
    }
    let r = out.report;
    if !r.is_clean() {
        info!(
            domain_errors = r.domain_errors,
            degraded_derivatives = r.degraded_derivatives,
            clamped_derivatives = r.clamped_derivatives,
            "mapping report"
        );
    }
}
