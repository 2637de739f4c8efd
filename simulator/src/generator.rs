use crate::{
    distribution::DistributionError,
    noise::Noise,
    pulse::Pulse,
    scenario::Scenario,
};
use pulsecal_common::{ChannelId, EventId};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use std::io::{self, Write};
use tracing::instrument;

/// One channel trace of one event, written as `<event>,<channel>,<v0>,<v1>,...`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TraceLine {
    pub(crate) event: EventId,
    pub(crate) channel: ChannelId,
    pub(crate) values: Vec<f64>,
}

impl TraceLine {
    pub(crate) fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{0},{1}", self.event, self.channel)?;
        for value in &self.values {
            write!(out, ",{value}")?;
        }
        writeln!(out)
    }
}

fn generate_trace<R: Rng>(
    scenario: &Scenario,
    event: EventId,
    channel: ChannelId,
    rng: &mut R,
) -> Result<TraceLine, DistributionError> {
    let pulse = if rng.random::<f64>() < scenario.occupancy {
        Some(Pulse::sample(&scenario.pulse, rng)?)
    } else {
        None
    };
    let mut noises: Vec<_> = scenario.noises.iter().map(Noise::new).collect();
    let sign = scenario.polarity.sign();
    let values = (0..scenario.num_samples)
        .map(|i| {
            let signal = pulse
                .as_ref()
                .map(|pulse| pulse.value_at(i as f64))
                .unwrap_or_default();
            let mut value = scenario.pedestal + sign * signal;
            for noise in noises.iter_mut() {
                value = noise.noisify(value, rng)?;
            }
            Ok(if scenario.quantise {
                value.round()
            } else {
                value
            })
        })
        .collect::<Result<_, DistributionError>>()?;
    Ok(TraceLine {
        event,
        channel,
        values,
    })
}

/// Generates every trace of the scenario, in event then channel order.
///
/// Each event draws from its own generator, seeded from `seed` and the event number,
/// so the output does not depend on how events are scheduled.
#[instrument(skip_all, fields(num_events = scenario.num_events, seed = seed))]
pub(crate) fn generate(scenario: &Scenario, seed: u64) -> Result<Vec<TraceLine>, DistributionError> {
    let events = (0..scenario.num_events)
        .into_par_iter()
        .map(|event| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(event));
            scenario
                .channels
                .iter()
                .map(|&channel| generate_trace(scenario, event, channel, &mut rng))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::SCENARIO;

    fn scenario() -> Scenario {
        serde_json::from_str(SCENARIO).unwrap()
    }

    #[test]
    fn same_seed_same_traces() {
        let scenario = scenario();
        let first = generate(&scenario, 42).unwrap();
        assert_eq!(first.len(), 40);
        assert_eq!(first, generate(&scenario, 42).unwrap());
        assert_ne!(first, generate(&scenario, 43).unwrap());
    }

    #[test]
    fn negative_pulses_below_pedestal() {
        let traces = generate(&scenario(), 7).unwrap();
        for trace in traces {
            assert_eq!(trace.values.len(), 31);
            assert!(trace.values.iter().all(|value| value.fract() == 0.0));
            let min = trace.values.iter().copied().fold(f64::INFINITY, f64::min);
            assert!(min < 1500.0 - 150.0);
            // The first samples hold only pedestal and noise.
            assert!((trace.values[0] - 1500.0).abs() <= 3.0);
        }
    }

    #[test]
    fn empty_traces_without_occupancy() {
        let scenario = Scenario {
            occupancy: 0.0,
            noises: Vec::new(),
            ..scenario()
        };
        let traces = generate(&scenario, 1).unwrap();
        assert!(
            traces
                .iter()
                .all(|trace| trace.values.iter().all(|&value| value == 1500.0))
        );
    }

    #[test]
    fn line_format() {
        let line = TraceLine {
            event: 3,
            channel: 1,
            values: vec![1500.0, 1499.5],
        };
        let mut out = Vec::new();
        line.write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3,1,1500,1499.5\n");
    }
}
