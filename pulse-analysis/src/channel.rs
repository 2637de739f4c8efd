use crate::{
    ChannelId, Real, SENTINEL,
    conditioner::{Polarity, condition},
    error::ChannelError,
    extraction::{Amplitude, ExtractionStatus, ExtractionStrategy},
    fitter::{DEFAULT_MAX_ITERATIONS, FitResult, FitStatus, FitTrace, TemplateFitter},
    pedestal::{Pedestal, PedestalEstimator, PedestalMode},
    template::{
        DEFAULT_TIME_OFFSET, QualityWindow, TemplateAccumulator, TemplateFunction,
        TemplateGeometry, TemplateLookupTable, TrainingOutcome,
        persistence::{TemplateReader, write_template},
    },
    waveform::{ConditionedWaveform, Waveform},
};
use std::{
    io::{BufRead, Write},
    sync::Arc,
};
use tracing::{debug, instrument, warn};

/// Static configuration of a channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    pub id: ChannelId,
    /// Number of samples every waveform of this channel must have.
    pub num_samples: usize,
    pub polarity: Polarity,
    pub pedestal: PedestalMode,
    /// Used by [Channel::extract].
    pub strategy: ExtractionStrategy,
    pub quality: QualityWindow,
    /// Inclusive range of positions used by the template fit, all positions if `None`.
    pub fit_range: Option<(Real, Real)>,
    pub geometry: TemplateGeometry,
    /// Subtracted from the half maximum time when training without a template.
    pub time_offset: Real,
    pub max_iterations: usize,
}

impl ChannelConfig {
    pub fn new(id: ChannelId, num_samples: usize) -> Self {
        Self {
            id,
            num_samples,
            polarity: Polarity::default(),
            pedestal: PedestalMode::default(),
            strategy: ExtractionStrategy::default(),
            quality: QualityWindow::default(),
            fit_range: None,
            geometry: TemplateGeometry::default(),
            time_offset: DEFAULT_TIME_OFFSET,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Owns every stage of the analysis of a single digitiser channel.
///
/// Each event, a waveform is set on the channel, after which any of
/// [Self::extract], [Self::fit_template] or [Self::train] may be called.
#[derive(Clone, Debug)]
pub struct Channel {
    config: ChannelConfig,
    estimator: PedestalEstimator,
    pedestal: Option<Pedestal>,
    conditioned: ConditionedWaveform,
    has_waveform: bool,
    accumulator: TemplateAccumulator,
    template: Option<Arc<TemplateLookupTable>>,
    fitter: Option<TemplateFitter>,
    result: FitResult,
}

impl Channel {
    pub fn new(config: ChannelConfig) -> Result<Self, ChannelError> {
        let accumulator =
            TemplateAccumulator::new(config.geometry, config.quality, config.time_offset)?;
        let pedestal = match config.pedestal {
            PedestalMode::Fixed(pedestal) => Some(pedestal),
            _ => None,
        };
        Ok(Self {
            config,
            estimator: PedestalEstimator::default(),
            pedestal,
            conditioned: ConditionedWaveform::default(),
            has_waveform: false,
            accumulator,
            template: None,
            fitter: None,
            result: FitResult::default(),
        })
    }

    pub fn id(&self) -> ChannelId {
        self.config.id
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Uses an externally estimated pedestal for all subsequent waveforms.
    pub fn set_fixed_pedestal(&mut self, pedestal: Pedestal) {
        self.config.pedestal = PedestalMode::Fixed(pedestal);
        self.pedestal = Some(pedestal);
    }

    /// The pedestal applied to the current waveform.
    pub fn pedestal(&self) -> Option<&Pedestal> {
        self.pedestal.as_ref()
    }

    /// Conditions `raw` as the waveform of the current event and clears the previous result.
    ///
    /// If the per-event pedestal window holds no samples the waveform is discarded and
    /// the channel has no waveform until the next successful call.
    #[instrument(skip_all, fields(channel = self.config.id))]
    pub fn set_waveform(&mut self, raw: Waveform) -> Result<(), ChannelError> {
        if raw.len() != self.config.num_samples {
            warn!("Waveform has {0} samples", raw.len());
            return Err(ChannelError::SampleCountMismatch {
                channel: self.config.id,
                expected: self.config.num_samples,
                found: raw.len(),
            });
        }
        if let PedestalMode::PerEvent(window) = self.config.pedestal {
            let pedestal = self.estimator.estimate(&raw, window);
            self.pedestal = Some(pedestal);
            if pedestal.is_empty() {
                warn!("Pedestal window {window:?} contains no samples");
                self.has_waveform = false;
                self.result = FitResult::default();
                return Err(ChannelError::NoPedestal(self.config.id));
            }
            if pedestal.rms == 0.0 {
                debug!("Pedestal window gave zero rms");
            }
        }
        self.conditioned = condition(&raw, self.pedestal.as_ref(), self.config.polarity);
        self.has_waveform = true;
        self.result = FitResult::default();
        Ok(())
    }

    pub fn conditioned(&self) -> &ConditionedWaveform {
        &self.conditioned
    }

    fn require_waveform(&self) -> Result<(), ChannelError> {
        if self.has_waveform {
            Ok(())
        } else {
            Err(ChannelError::NoWaveform(self.config.id))
        }
    }

    /// Applies the configured extraction strategy to the current waveform, merging its
    /// amplitude and time into the result.
    ///
    /// A fallback amplitude only replaces an amplitude that has not yet been set.
    #[instrument(skip_all, fields(channel = self.config.id))]
    pub fn extract(&mut self) -> Result<FitResult, ChannelError> {
        self.require_waveform()?;
        let extraction = self.config.strategy.extract(&self.conditioned)?;
        match extraction.amplitude {
            Amplitude::Measured(amplitude) => self.result.amplitude = amplitude,
            Amplitude::Fallback(amplitude) if self.result.amplitude == SENTINEL => {
                self.result.amplitude = amplitude
            }
            _ => {}
        }
        if let Some(time) = extraction.time {
            self.result.time = time;
        }
        self.result.status = match extraction.status {
            ExtractionStatus::Ok => FitStatus::Ok,
            ExtractionStatus::NoSignal => FitStatus::NoSignal,
            ExtractionStatus::EmptyChannel => FitStatus::EmptyChannel,
        };
        Ok(self.result)
    }

    /// Fits the current waveform against the loaded template.
    #[instrument(skip_all, fields(channel = self.config.id))]
    pub fn fit_template(&mut self) -> Result<FitResult, ChannelError> {
        self.require_waveform()?;
        let fitter = self
            .fitter
            .as_ref()
            .ok_or(ChannelError::NoTemplate(self.config.id))?;
        self.result = fitter.fit(&self.conditioned);
        Ok(self.result)
    }

    /// Compares the current waveform with the model of the current result.
    pub fn fit_trace(&self) -> Option<FitTrace> {
        self.fitter
            .as_ref()
            .map(|fitter| fitter.trace(&self.conditioned, &self.result))
    }

    /// Offers the current waveform for template training.
    ///
    /// Without a template, the amplitude and reference time come from a spline through the samples.
    /// Once a template is installed, they come from a fit against it.
    #[instrument(skip_all, fields(channel = self.config.id))]
    pub fn train(&mut self) -> Result<TrainingOutcome, ChannelError> {
        self.require_waveform()?;
        let outcome = match &self.fitter {
            Some(fitter) => {
                self.result = fitter.fit(&self.conditioned);
                self.accumulator.train_refined(&self.conditioned, &self.result)
            }
            None => {
                let outcome = self.accumulator.train_bootstrap(&self.conditioned);
                if let TrainingOutcome::Accepted { amplitude, time } = outcome {
                    self.result = FitResult {
                        amplitude,
                        time,
                        status: FitStatus::Ok,
                        quality: None,
                    };
                }
                outcome
            }
        };
        debug!("Training outcome {outcome:?}");
        Ok(outcome)
    }

    pub fn accumulator(&self) -> &TemplateAccumulator {
        &self.accumulator
    }

    /// Discards accumulated training data, keeping any installed template.
    pub fn reset_training(&mut self) {
        self.accumulator.reset();
    }

    /// Collapses the accumulated training data into a template and installs it.
    #[instrument(skip_all, fields(channel = self.config.id))]
    pub fn make_template(&mut self) -> Result<Arc<TemplateLookupTable>, ChannelError> {
        let table = self.accumulator.collapse()?;
        Ok(self.install_template(table))
    }

    /// Replaces the template used for fitting.
    pub fn install_template(&mut self, table: TemplateLookupTable) -> Arc<TemplateLookupTable> {
        let table = Arc::new(table);
        self.fitter = Some(TemplateFitter::new(
            TemplateFunction::new(table.clone()),
            self.config.fit_range,
            self.config.max_iterations,
        ));
        self.template = Some(table.clone());
        table
    }

    pub fn template(&self) -> Option<&Arc<TemplateLookupTable>> {
        self.template.as_ref()
    }

    /// Appends this channel's template to the means and errors streams.
    pub fn write_template<M: Write, E: Write>(
        &self,
        means: &mut M,
        errors: &mut E,
    ) -> Result<(), ChannelError> {
        let table = self
            .template
            .as_ref()
            .ok_or(ChannelError::NoTemplate(self.config.id))?;
        write_template(means, errors, self.config.id, table)?;
        Ok(())
    }

    /// Reads the next record of `reader` as this channel's template.
    ///
    /// On failure the previously installed template, if any, is kept.
    #[instrument(skip_all, fields(channel = self.config.id))]
    pub fn load_template<M: BufRead, E: BufRead>(
        &mut self,
        reader: &mut TemplateReader<M, E>,
    ) -> Result<(), ChannelError> {
        let table = reader.read_next(self.config.id)?;
        self.install_template(table);
        Ok(())
    }

    pub fn result(&self) -> &FitResult {
        &self.result
    }
}
