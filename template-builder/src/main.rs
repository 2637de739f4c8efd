mod loader;
mod parameters;
mod processing;
mod save_to_file;

use anyhow::{Context, Result};
use clap::Parser;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use parameters::{
    FixedPedestalWrapper, GeometryWrapper, Mode, PedestalWindowWrapper, Polarity,
    QualityWindowWrapper, RangeWrapper,
};
use processing::{ProcessSettings, RESULT_HEADER, ResultRow};
use pulsecal_analysis::{
    Channel, ChannelConfig, PedestalMode, Real, fitter::DEFAULT_MAX_ITERATIONS,
    template::{DEFAULT_TIME_OFFSET, persistence::TemplateReader},
};
use pulsecal_common::{
    init_tracer,
    metrics::{
        component_info_metric,
        failures::{self, FailureKind},
        names::{
            FAILURES, FITS_PERFORMED, WAVEFORMS_ACCEPTED, WAVEFORMS_PROCESSED, WAVEFORMS_REJECTED,
        },
    },
    tracer::TracerEngine,
};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    net::SocketAddr,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// File of raw waveforms, one channel trace per line as `event,channel,v0,v1,...`.
    #[clap(long)]
    input: PathBuf,

    /// Time between consecutive samples, in the units of all other positions.
    #[clap(long, default_value = "1")]
    sample_time: Real,

    /// Number of samples every trace must have.
    #[clap(long, default_value = "31")]
    num_samples: usize,

    /// The polarity of the trace signal.
    #[clap(long, value_enum, default_value_t)]
    polarity: Polarity,

    /// Estimate the pedestal of each event over this window: `samples:<first>,<last>` or `positions:<begin>,<end>`.
    #[clap(long)]
    pedestal_window: Option<PedestalWindowWrapper>,

    /// Subtract this pedestal, given as `<mean>,<rms>`, from every trace.
    #[clap(long, conflicts_with = "pedestal_window")]
    fixed_pedestal: Option<FixedPedestalWrapper>,

    /// Range of amplitudes, as `<min>,<max>`, of waveforms used for training.
    #[clap(long, default_value = "20,4080")]
    quality_window: QualityWindowWrapper,

    /// Template layout, as `<time points>,<value bins>,<begin>,<end>`.
    #[clap(long, default_value = "120,2048,-2,9.9")]
    geometry: GeometryWrapper,

    /// If set, only samples in this inclusive range of positions, as `<begin>,<end>`, are fitted.
    #[clap(long)]
    fit_range: Option<RangeWrapper>,

    /// Subtracted from the half maximum time of each waveform when training without a template.
    #[clap(long, default_value_t = DEFAULT_TIME_OFFSET)]
    time_offset: Real,

    /// Maximum number of iterations of each template fit.
    #[clap(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// If set, OpenMetrics flavour metrics are served on this address.
    #[clap(long, env)]
    observability_address: Option<SocketAddr>,

    /// If set, conditioned waveforms and fit traces are saved to this directory.
    #[clap(long)]
    save_path: Option<PathBuf>,

    #[command(subcommand)]
    mode: Mode,
}

impl Cli {
    fn channel_config(&self) -> ChannelConfig {
        let pedestal = match (&self.pedestal_window, &self.fixed_pedestal) {
            (Some(window), _) => PedestalMode::PerEvent(window.0),
            (None, Some(pedestal)) => PedestalMode::Fixed(pedestal.0),
            (None, None) => PedestalMode::None,
        };
        ChannelConfig {
            polarity: self.polarity.into(),
            pedestal,
            quality: self.quality_window.0,
            fit_range: self.fit_range.as_ref().map(|range| range.0),
            geometry: self.geometry.0,
            time_offset: self.time_offset,
            max_iterations: self.max_iterations,
            ..ChannelConfig::new(0, self.num_samples)
        }
    }
}

fn setup_metrics(address: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .context("Prometheus metrics exporter should be setup")?;

    metrics::describe_counter!(
        WAVEFORMS_PROCESSED,
        metrics::Unit::Count,
        "Number of channel waveforms processed"
    );
    metrics::describe_counter!(
        WAVEFORMS_ACCEPTED,
        metrics::Unit::Count,
        "Number of waveforms accumulated into a template"
    );
    metrics::describe_counter!(
        WAVEFORMS_REJECTED,
        metrics::Unit::Count,
        "Number of waveforms rejected for training"
    );
    metrics::describe_counter!(
        FITS_PERFORMED,
        metrics::Unit::Count,
        "Number of template fits performed"
    );
    metrics::describe_counter!(
        FAILURES,
        metrics::Unit::Count,
        "Number of failures encountered"
    );
    component_info_metric("template-builder");
    Ok(())
}

fn write_results(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{RESULT_HEADER}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    file.flush()?;
    Ok(())
}

fn write_templates(channels: &[Channel], means: &Path, errors: &Path) -> Result<()> {
    let mut means = BufWriter::new(File::create(means)?);
    let mut errors = BufWriter::new(File::create(errors)?);
    for channel in channels {
        if channel.template().is_none() {
            warn!("No template to write for channel {0}", channel.id());
            continue;
        }
        channel.write_template(&mut means, &mut errors)?;
    }
    means.flush()?;
    errors.flush()?;
    Ok(())
}

fn load_templates(channels: &mut [Channel], means: &Path, errors: &Path) -> Result<()> {
    let mut reader = TemplateReader::new(
        BufReader::new(File::open(means)?),
        BufReader::new(File::open(errors)?),
    );
    for channel in channels {
        channel
            .load_template(&mut reader)
            .with_context(|| format!("Loading template of channel {0}", channel.id()))?;
    }
    Ok(())
}

fn report_on_error<T>(result: Result<T>, kind: FailureKind) -> Result<T> {
    if let Err(e) = &result {
        error!("{e:#}");
        counter!(FAILURES, &[failures::get_label(kind)]).increment(1);
    }
    result
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let _tracer = init_tracer!();

    if let Some(address) = args.observability_address {
        setup_metrics(address)?;
    }

    if let Some(save_path) = &args.save_path {
        std::fs::create_dir_all(save_path)?;
    }
    let settings = ProcessSettings {
        sample_time: args.sample_time,
        save_path: args.save_path.as_deref(),
    };

    let input = File::open(&args.input)
        .with_context(|| format!("Opening {0}", args.input.display()))?;
    let events = report_on_error(
        loader::load_events(BufReader::new(input)),
        FailureKind::InputParseFailed,
    )?;
    let ids = loader::channel_ids(&events);
    info!("Read {0} events over {1} channels", events.len(), ids.len());

    let mut config = args.channel_config();
    if let Mode::Extract(parameters) = &args.mode {
        config.strategy = parameters.strategy.0;
    }
    let mut channels = processing::make_channels(&ids, &config)?;

    match &args.mode {
        Mode::Build(parameters) => {
            processing::build_templates(
                &mut channels,
                &events,
                parameters.refinement_passes,
                &settings,
            )?;
            report_on_error(
                write_templates(&channels, &parameters.means, &parameters.errors),
                FailureKind::TemplateWriteFailed,
            )?;
            info!(
                "Templates written to {0} and {1}",
                parameters.means.display(),
                parameters.errors.display()
            );
        }
        Mode::Fit(parameters) => {
            report_on_error(
                load_templates(&mut channels, &parameters.means, &parameters.errors),
                FailureKind::TemplateLoadFailed,
            )?;
            let rows: Vec<_> = events
                .iter()
                .flat_map(|event| processing::fit_event(&mut channels, event, &settings))
                .collect();
            report_on_error(
                write_results(&parameters.output, &rows),
                FailureKind::FileWriteFailed,
            )?;
        }
        Mode::Extract(parameters) => {
            let rows: Vec<_> = events
                .iter()
                .flat_map(|event| processing::extract_event(&mut channels, event, &settings))
                .collect();
            report_on_error(
                write_results(&parameters.output, &rows),
                FailureKind::FileWriteFailed,
            )?;
        }
    }
    Ok(())
}
