use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use crate::core::error::Result;
use crate::core::types::Quote;

/// Writes quotes as an indented JSON array of `{id, text, author}`.
pub fn write_export<W, I>(writer: W, quotes: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = Quote>,
{
    let quotes: Vec<Quote> = quotes.into_iter().collect();
    serde_json::to_writer_pretty(writer, &quotes)?;
    Ok(())
}

pub fn write_export_file(path: impl AsRef<Path>, quotes: Vec<Quote>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_export(&mut writer, quotes)?;
    writer.flush()?;
    Ok(())
}
