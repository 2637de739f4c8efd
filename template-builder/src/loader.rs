//! Reads raw waveforms from the plain text input format.
//!
//! Each non-empty line holds one channel trace of one event, as
//! `<event>,<channel>,<v0>,<v1>,...`. Lines starting with `#` are ignored.
use anyhow::{Context, Result, anyhow};
use pulsecal_analysis::{Real, Waveform};
use pulsecal_common::{ChannelId, EventId};
use std::{
    collections::{BTreeMap, BTreeSet},
    io::BufRead,
    str::FromStr,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChannelTrace {
    pub(crate) channel: ChannelId,
    pub(crate) values: Vec<Real>,
}

impl ChannelTrace {
    /// Places the samples `sample_time` apart, starting at zero.
    pub(crate) fn to_waveform(&self, sample_time: Real) -> Result<Waveform> {
        let positions: Vec<Real> = (0..self.values.len())
            .map(|i| i as Real * sample_time)
            .collect();
        Ok(Waveform::from_positions(&positions, &self.values)?)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Event {
    pub(crate) id: EventId,
    pub(crate) traces: BTreeMap<ChannelId, ChannelTrace>,
}

fn parse_line(line: &str) -> Result<(EventId, ChannelTrace)> {
    let mut fields = line.split(',').map(str::trim);
    let event = fields.next().ok_or_else(|| anyhow!("Missing event id"))?;
    let event = EventId::from_str(event).with_context(|| format!("Invalid event id '{event}'"))?;
    let channel = fields.next().ok_or_else(|| anyhow!("Missing channel id"))?;
    let channel =
        ChannelId::from_str(channel).with_context(|| format!("Invalid channel id '{channel}'"))?;
    let values = fields
        .map(|value| Real::from_str(value).with_context(|| format!("Invalid sample '{value}'")))
        .collect::<Result<Vec<_>>>()?;
    Ok((event, ChannelTrace { channel, values }))
}

/// Reads every event of `reader`, in increasing event order.
///
/// A channel appearing twice in the same event keeps its last trace.
pub(crate) fn load_events<R: BufRead>(reader: R) -> Result<Vec<Event>> {
    let mut events = BTreeMap::<EventId, Event>::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (id, trace) = parse_line(line).with_context(|| format!("Line {0}", index + 1))?;
        let event = events.entry(id).or_insert_with(|| Event {
            id,
            ..Default::default()
        });
        if let Some(previous) = event.traces.insert(trace.channel, trace) {
            warn!(
                "Event {id} has more than one trace for channel {0}",
                previous.channel
            );
        }
    }
    debug!("Loaded {0} events", events.len());
    Ok(events.into_values().collect())
}

/// Every channel which appears in any event, in increasing order.
pub(crate) fn channel_ids(events: &[Event]) -> BTreeSet<ChannelId> {
    events
        .iter()
        .flat_map(|event| event.traces.keys().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn groups_by_event() {
        let input = "# event,channel,samples\n\
                     2,1,0,1,2\n\
                     1,0,3,4,5\n\
                     \n\
                     2,0,6,7,8\n";
        let events = load_events(Cursor::new(input)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, 1);
        assert_eq!(events[1].traces.len(), 2);
        assert_eq!(events[1].traces[&1].values, vec![0.0, 1.0, 2.0]);
        assert_eq!(
            channel_ids(&events).into_iter().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn reports_line_of_bad_sample() {
        let error = load_events(Cursor::new("0,0,1,2\n0,1,1,x\n")).unwrap_err();
        assert_eq!(error.to_string(), "Line 2");
        assert!(format!("{error:#}").contains("Invalid sample 'x'"));
    }

    #[test]
    fn positions_scale_with_sample_time() {
        let trace = ChannelTrace {
            channel: 0,
            values: vec![1.0, 2.0, 3.0],
        };
        let waveform = trace.to_waveform(2.5).unwrap();
        assert_eq!(waveform.positions().collect::<Vec<_>>(), vec![0.0, 2.5, 5.0]);
        assert!(trace.to_waveform(0.0).is_err());
    }
}
