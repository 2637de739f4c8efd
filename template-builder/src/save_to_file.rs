use pulsecal_analysis::{Sample, TracePoint};
use pulsecal_common::{ChannelId, EventId};
use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Error, Write},
    path::{Path, PathBuf},
};

pub(crate) fn get_save_file_name(
    save_path: &Path,
    event: EventId,
    channel: ChannelId,
    kind: &str,
) -> PathBuf {
    save_path.join(format!("{kind}_{event}_{channel}.csv"))
}

pub(crate) trait SavablePoint {
    fn write_to_file<W: Write>(&self, file: &mut W) -> Result<(), Error>;
}

impl SavablePoint for Sample {
    fn write_to_file<W: Write>(&self, file: &mut W) -> Result<(), Error> {
        writeln!(file, "{0}", self)
    }
}

impl SavablePoint for TracePoint {
    fn write_to_file<W: Write>(&self, file: &mut W) -> Result<(), Error> {
        writeln!(file, "{0}", self)
    }
}

impl<T: SavablePoint> SavablePoint for &T {
    fn write_to_file<W: Write>(&self, file: &mut W) -> Result<(), Error> {
        (*self).write_to_file(file)
    }
}

pub(crate) trait SaveToFileFilter<I>
where
    I: Iterator,
    I::Item: SavablePoint,
{
    /// Writes a header line followed by one line per item.
    fn save_to_file(self, path: &Path, header: impl Display) -> Result<(), Error>;
}

impl<I> SaveToFileFilter<I> for I
where
    I: Iterator,
    I::Item: SavablePoint,
{
    fn save_to_file(self, path: &Path, header: impl Display) -> Result<(), Error> {
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(file, "{header}")?;
        for item in self {
            item.write_to_file(&mut file)?;
        }
        file.flush()
    }
}
