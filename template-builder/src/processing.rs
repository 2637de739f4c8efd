use crate::{
    loader::{ChannelTrace, Event},
    save_to_file::{SaveToFileFilter, get_save_file_name},
};
use anyhow::Result;
use metrics::counter;
use pulsecal_analysis::{Channel, ChannelConfig, FitResult, Real, TrainingOutcome};
use pulsecal_common::{
    ChannelId, EventId,
    metrics::{
        failures::{self, FailureKind},
        fit_status,
        names::{
            FAILURES, FITS_PERFORMED, WAVEFORMS_ACCEPTED, WAVEFORMS_PROCESSED, WAVEFORMS_REJECTED,
        },
        rejections,
    },
};
use rayon::prelude::*;
use std::{collections::BTreeSet, fmt::Display, path::Path};
use tracing::{info, warn};

pub(crate) const RESULT_HEADER: &str = "event,channel,amplitude,time,status,chi2,ndf";

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProcessSettings<'a> {
    /// Time between consecutive samples.
    pub(crate) sample_time: Real,
    /// If set, conditioned waveforms and fit traces are saved here.
    pub(crate) save_path: Option<&'a Path>,
}

/// One line of the result file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResultRow {
    pub(crate) event: EventId,
    pub(crate) channel: ChannelId,
    pub(crate) result: FitResult,
}

impl Display for ResultRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{0},{1},{2},{3},{4},",
            self.event, self.channel, self.result.amplitude, self.result.time, self.result.status
        )?;
        if let Some(quality) = &self.result.quality {
            write!(f, "{0},{1}", quality.chi2, quality.ndf)
        } else {
            write!(f, ",")
        }
    }
}

/// Creates one channel per id, each a copy of `config` with its own id.
pub(crate) fn make_channels(
    ids: &BTreeSet<ChannelId>,
    config: &ChannelConfig,
) -> Result<Vec<Channel>> {
    Ok(ids
        .iter()
        .map(|&id| {
            Channel::new(ChannelConfig {
                id,
                ..config.clone()
            })
        })
        .collect::<Result<Vec<_>, _>>()?)
}

fn report_failure(kind: FailureKind) {
    counter!(FAILURES, &[failures::get_label(kind)]).increment(1);
}

fn report_save_result(result: std::io::Result<()>) {
    if let Err(e) = result {
        warn!("Failed to save waveform: {e}");
        report_failure(FailureKind::FileWriteFailed);
    }
}

/// Sets the trace as the channel's current waveform, saving the conditioned waveform if required.
///
/// Returns `false` if the trace was not usable.
fn set_waveform(
    channel: &mut Channel,
    trace: &ChannelTrace,
    event: EventId,
    settings: &ProcessSettings,
) -> bool {
    counter!(WAVEFORMS_PROCESSED).increment(1);
    let waveform = trace
        .to_waveform(settings.sample_time)
        .and_then(|waveform| Ok(channel.set_waveform(waveform)?));
    if let Err(e) = waveform {
        warn!("Event {event}: {e}");
        report_failure(FailureKind::InputParseFailed);
        return false;
    }
    if let Some(save_path) = settings.save_path {
        report_save_result(channel.conditioned().samples().iter().save_to_file(
            &get_save_file_name(save_path, event, channel.id(), "conditioned"),
            "position,value,error",
        ));
    }
    true
}

#[tracing::instrument(skip_all, fields(channel = channel.id(), accepted))]
fn train_channel(
    channel: &mut Channel,
    trace: &ChannelTrace,
    event: EventId,
    settings: &ProcessSettings,
) -> Option<TrainingOutcome> {
    if !set_waveform(channel, trace, event, settings) {
        return None;
    }
    let outcome = match channel.train() {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{e}");
            report_failure(FailureKind::FitFailed);
            return None;
        }
    };
    match outcome {
        TrainingOutcome::Accepted { .. } => counter!(WAVEFORMS_ACCEPTED).increment(1),
        TrainingOutcome::Rejected(reason) => {
            counter!(WAVEFORMS_REJECTED, &[rejections::get_label(&reason)]).increment(1)
        }
    }
    tracing::Span::current().record("accepted", outcome.is_accepted());
    Some(outcome)
}

#[tracing::instrument(skip_all, fields(channel = channel.id(), status))]
fn fit_channel(
    channel: &mut Channel,
    trace: &ChannelTrace,
    event: EventId,
    settings: &ProcessSettings,
) -> Option<ResultRow> {
    if !set_waveform(channel, trace, event, settings) {
        return None;
    }
    let result = match channel.fit_template() {
        Ok(result) => result,
        Err(e) => {
            warn!("{e}");
            report_failure(FailureKind::FitFailed);
            return None;
        }
    };
    counter!(FITS_PERFORMED, &[fit_status::get_label(&result.status)]).increment(1);
    tracing::Span::current().record("status", result.status.to_string());

    if let Some(save_path) = settings.save_path {
        if let Some(trace) = channel.fit_trace() {
            report_save_result(trace.points.iter().save_to_file(
                &get_save_file_name(save_path, event, channel.id(), "fit"),
                "position,value,model,residual,rejected",
            ));
        }
    }
    Some(ResultRow {
        event,
        channel: channel.id(),
        result,
    })
}

#[tracing::instrument(skip_all, fields(channel = channel.id(), status))]
fn extract_channel(
    channel: &mut Channel,
    trace: &ChannelTrace,
    event: EventId,
    settings: &ProcessSettings,
) -> Option<ResultRow> {
    if !set_waveform(channel, trace, event, settings) {
        return None;
    }
    match channel.extract() {
        Ok(result) => {
            tracing::Span::current().record("status", result.status.to_string());
            Some(ResultRow {
                event,
                channel: channel.id(),
                result,
            })
        }
        Err(e) => {
            warn!("{e}");
            report_failure(FailureKind::FitFailed);
            None
        }
    }
}

/// Pairs every channel with its trace in `event`, skipping channels absent from the event.
fn with_traces<'a>(
    channels: &'a mut [Channel],
    event: &'a Event,
) -> impl ParallelIterator<Item = (&'a mut Channel, &'a ChannelTrace)> {
    channels.par_iter_mut().filter_map(move |channel| {
        event
            .traces
            .get(&channel.id())
            .map(|trace| (channel, trace))
    })
}

#[tracing::instrument(skip_all, fields(event = event.id))]
pub(crate) fn train_event(
    channels: &mut [Channel],
    event: &Event,
    settings: &ProcessSettings,
) -> Vec<TrainingOutcome> {
    with_traces(channels, event)
        .filter_map(|(channel, trace)| train_channel(channel, trace, event.id, settings))
        .collect()
}

#[tracing::instrument(skip_all, fields(event = event.id))]
pub(crate) fn fit_event(
    channels: &mut [Channel],
    event: &Event,
    settings: &ProcessSettings,
) -> Vec<ResultRow> {
    with_traces(channels, event)
        .filter_map(|(channel, trace)| fit_channel(channel, trace, event.id, settings))
        .collect()
}

#[tracing::instrument(skip_all, fields(event = event.id))]
pub(crate) fn extract_event(
    channels: &mut [Channel],
    event: &Event,
    settings: &ProcessSettings,
) -> Vec<ResultRow> {
    with_traces(channels, event)
        .filter_map(|(channel, trace)| extract_channel(channel, trace, event.id, settings))
        .collect()
}

/// Trains on every event, then collapses a template for every channel with accepted waveforms.
///
/// Each refinement pass discards the accumulated data and retrains against the template
/// of the previous pass.
#[tracing::instrument(skip_all)]
pub(crate) fn build_templates(
    channels: &mut [Channel],
    events: &[Event],
    refinement_passes: usize,
    settings: &ProcessSettings,
) -> Result<()> {
    for pass in 0..=refinement_passes {
        for channel in channels.iter_mut() {
            channel.reset_training();
        }
        for event in events {
            train_event(channels, event, settings);
        }
        for channel in channels.iter_mut() {
            let diagnostics = channel.accumulator().diagnostics();
            info!(
                "Pass {pass}, channel {0}: {1} accepted, {2} rejected",
                channel.id(),
                diagnostics.accepted(),
                diagnostics.total_rejected()
            );
            if diagnostics.accepted() == 0 {
                warn!("Channel {0} has no training data", channel.id());
                continue;
            }
            channel.make_template()?;
        }
    }
    Ok(())
}
