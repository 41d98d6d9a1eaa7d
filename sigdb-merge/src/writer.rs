//! Database writer
//!
//! Serializes a resolved [`SignatureDatabase`] in the same line format it was
//! read from, followed by the `---` terminator. There is no partial-output
//! recovery; an interrupted write leaves a truncated file behind.

use crate::database::SignatureDatabase;
use crate::parser::TERMINATOR;
use crate::types::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write the database to any writer
pub fn write_database<W: Write>(db: &SignatureDatabase, mut out: W) -> Result<()> {
    for line in db.lines() {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "{}", TERMINATOR)?;
    out.flush()?;
    Ok(())
}

/// Create (or truncate) `path` and write the database into it
pub fn write_database_file(db: &SignatureDatabase, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_database(db, BufWriter::new(file))?;
    log::info!("{} has been created", path.display());
    Ok(())
}
