//! `rawFileRead`: replays frames from dump files.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use kotekan_runner_core::dump::{DEFAULT_EXT, decode_records, matching_files};

use super::{Stage, StageContext};
use crate::buffer::FrameSender;
use crate::error::SimError;

pub struct RawFileRead {
    name: String,
    out: FrameSender,
    base_dir: PathBuf,
    file_name: String,
    file_ext: String,
}

impl RawFileRead {
    pub fn from_config(ctx: &mut StageContext<'_>) -> Result<Self, SimError> {
        let end_interrupt = ctx.get_bool_or("end_interrupt", true)?;
        if !end_interrupt {
            // A replay has a natural end; the stage always finishes there.
            debug!(stage = %ctx.unique_name(), "end_interrupt=false treated as true");
        }
        Ok(Self {
            name: ctx.unique_name(),
            base_dir: PathBuf::from(ctx.get_string("base_dir")?),
            file_name: ctx.get_string("file_name")?,
            file_ext: ctx.get_string_or("file_ext", DEFAULT_EXT)?,
            out: ctx.output("out_buf")?,
        })
    }
}

impl Stage for RawFileRead {
    fn unique_name(&self) -> &str {
        &self.name
    }

    async fn run(self) -> Result<(), SimError> {
        let prefix = format!("{}_", self.file_name);
        let files = matching_files(&self.base_dir, &prefix, &self.file_ext)?;
        if files.is_empty() {
            warn!(
                stage = %self.name,
                dir = %self.base_dir.display(),
                prefix = %prefix,
                "no input files found"
            );
        }

        let mut sent = 0u64;
        for file in &files {
            let bytes = tokio::fs::read(file).await?;
            let frames = decode_records(&bytes)?;
            debug!(stage = %self.name, path = %file.display(), frames = frames.len(), "read file");
            for frame in frames {
                self.out.send(frame).await?;
                sent += 1;
            }
        }

        info!(stage = %self.name, files = files.len(), frames = sent, "replay finished");
        Ok(())
    }
}
