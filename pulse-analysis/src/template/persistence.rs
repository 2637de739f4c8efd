//! Plain text template files.
//!
//! A template is stored as two parallel streams, one holding the means and one the RMS values.
//! Each stream holds one record per channel, in the same order:
//! ```text
//! <channel>	<npoints>	<begin>	<end>
//! <value_0>	<value_1>	...	<value_9>
//! ...
//! ```
//! with ten values per line, the last line possibly shorter.
use super::TemplateLookupTable;
use crate::{ChannelId, Real, error::TemplateError};
use std::{
    collections::VecDeque,
    io::{BufRead, Write},
};
use tracing::{debug, instrument};

const VALUES_PER_LINE: usize = 10;

type Header = (ChannelId, usize, Real, Real);

fn write_record<W: Write>(
    out: &mut W,
    channel: ChannelId,
    begin: Real,
    end: Real,
    values: &[Real],
) -> Result<(), TemplateError> {
    writeln!(out, "{channel}\t{0}\t{begin}\t{end}", values.len())?;
    for line in values.chunks(VALUES_PER_LINE) {
        let line = line
            .iter()
            .map(Real::to_string)
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Appends the record for `channel` to both streams.
#[instrument(skip_all, fields(channel = channel))]
pub fn write_template<M: Write, E: Write>(
    means: &mut M,
    errors: &mut E,
    channel: ChannelId,
    table: &TemplateLookupTable,
) -> Result<(), TemplateError> {
    write_record(means, channel, table.begin(), table.end(), table.means())?;
    write_record(errors, channel, table.begin(), table.end(), table.errors())?;
    Ok(())
}

/// Whitespace separated tokens of a stream, read a line at a time.
struct Tokens<R> {
    reader: R,
    pending: VecDeque<String>,
}

impl<R: BufRead> Tokens<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
        }
    }

    fn next(&mut self) -> Result<Option<String>, TemplateError> {
        while self.pending.is_empty() {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.pending
                .extend(line.split_whitespace().map(ToOwned::to_owned));
        }
        Ok(self.pending.pop_front())
    }

    fn header(&mut self) -> Result<Option<Header>, TemplateError> {
        let Some(channel) = self.next()? else {
            return Ok(None);
        };
        let mut field = || {
            self.next()?
                .ok_or_else(|| TemplateError::MalformedHeader(channel.clone()))
        };
        let npoints: usize = field()?.parse()?;
        let begin: Real = field()?.parse()?;
        let end: Real = field()?.parse()?;
        let channel: ChannelId = channel.parse()?;
        Ok(Some((channel, npoints, begin, end)))
    }

    fn values(&mut self, expected: usize) -> Result<Vec<Real>, TemplateError> {
        let mut values = Vec::with_capacity(expected);
        while values.len() < expected {
            let Some(token) = self.next()? else {
                return Err(TemplateError::Truncated {
                    expected,
                    found: values.len(),
                });
            };
            values.push(token.parse()?);
        }
        Ok(values)
    }
}

/// Reads template records sequentially from a pair of streams.
pub struct TemplateReader<M, E> {
    means: Tokens<M>,
    errors: Tokens<E>,
}

impl<M: BufRead, E: BufRead> TemplateReader<M, E> {
    pub fn new(means: M, errors: E) -> Self {
        Self {
            means: Tokens::new(means),
            errors: Tokens::new(errors),
        }
    }

    /// Reads the next record from both streams, which must belong to `channel`.
    ///
    /// A record for any other channel is an [TemplateError::IdentityMismatch].
    #[instrument(skip(self))]
    pub fn read_next(&mut self, channel: ChannelId) -> Result<TemplateLookupTable, TemplateError> {
        let means_header = self
            .means
            .header()?
            .ok_or(TemplateError::MissingRecord(channel))?;
        if means_header.0 != channel {
            return Err(TemplateError::IdentityMismatch {
                expected: channel,
                found: means_header.0,
            });
        }
        let means = self.means.values(means_header.1)?;

        let errors_header = self
            .errors
            .header()?
            .ok_or(TemplateError::MissingRecord(channel))?;
        if errors_header.0 != channel {
            return Err(TemplateError::IdentityMismatch {
                expected: channel,
                found: errors_header.0,
            });
        }
        if errors_header != means_header {
            return Err(TemplateError::InconsistentHeaders {
                means: means_header,
                errors: errors_header,
            });
        }
        let errors = self.errors.values(errors_header.1)?;

        debug!("Read template of {0} points", means.len());
        TemplateLookupTable::new(means_header.2, means_header.3, means, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn table(offset: Real) -> TemplateLookupTable {
        let means = (0..23).map(|i| offset + i as Real / 22.0).collect();
        let errors = (0..23).map(|i| 0.01 * i as Real).collect();
        TemplateLookupTable::new(-2.0, 9.9, means, errors).unwrap()
    }

    #[test]
    fn record_layout() {
        let (mut means, mut errors) = (Vec::new(), Vec::new());
        write_template(&mut means, &mut errors, 7, &table(0.0)).unwrap();
        let means = String::from_utf8(means).unwrap();
        let lines: Vec<_> = means.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "7\t23\t-2\t9.9");
        assert_eq!(lines[1].split('\t').count(), 10);
        assert_eq!(lines[3].split('\t').count(), 3);
    }

    #[test]
    fn round_trip_of_several_channels() {
        let (mut means, mut errors) = (Vec::new(), Vec::new());
        write_template(&mut means, &mut errors, 0, &table(0.0)).unwrap();
        write_template(&mut means, &mut errors, 1, &table(0.5)).unwrap();

        let mut reader = TemplateReader::new(Cursor::new(means), Cursor::new(errors));
        assert_eq!(reader.read_next(0).unwrap(), table(0.0));
        assert_eq!(reader.read_next(1).unwrap(), table(0.5));
        assert!(matches!(
            reader.read_next(2),
            Err(TemplateError::MissingRecord(2))
        ));
    }

    #[test]
    fn identity_mismatch() {
        let (mut means, mut errors) = (Vec::new(), Vec::new());
        write_template(&mut means, &mut errors, 3, &table(0.0)).unwrap();
        let mut reader = TemplateReader::new(Cursor::new(means), Cursor::new(errors));
        assert!(matches!(
            reader.read_next(4),
            Err(TemplateError::IdentityMismatch {
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn truncated_record() {
        let means = "0\t5\t0\t1\n0.1\t0.2\n";
        let errors = "0\t5\t0\t1\n0\t0\t0\t0\t0\n";
        let mut reader = TemplateReader::new(Cursor::new(means), Cursor::new(errors));
        assert!(matches!(
            reader.read_next(0),
            Err(TemplateError::Truncated {
                expected: 5,
                found: 2
            })
        ));
    }

    #[test]
    fn inconsistent_headers() {
        let means = "0\t2\t0\t1\n0.1\t0.2\n";
        let errors = "0\t2\t0\t2\n0\t0\n";
        let mut reader = TemplateReader::new(Cursor::new(means), Cursor::new(errors));
        assert!(matches!(
            reader.read_next(0),
            Err(TemplateError::InconsistentHeaders { .. })
        ));
    }

    #[test]
    fn malformed_header() {
        let means = "0\t2\n";
        let mut reader = TemplateReader::new(Cursor::new(means), Cursor::new(""));
        assert!(matches!(
            reader.read_next(0),
            Err(TemplateError::MalformedHeader(_))
        ));
    }
}
