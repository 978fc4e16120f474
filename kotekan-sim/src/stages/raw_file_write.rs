//! `rawFileWrite`: captures frames into numbered dump files.
//!
//! Files are named `<file_name>_<nnnnnnn>.<file_ext>`; a new file is started
//! every `frames_per_file` frames.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use kotekan_runner_core::dump::{DEFAULT_EXT, encode_record};
use kotekan_runner_core::frame::VisFrame;

use super::{Stage, StageContext};
use crate::buffer::FrameReceiver;
use crate::error::SimError;

const DEFAULT_FRAMES_PER_FILE: u64 = 1024;

pub struct RawFileWrite {
    name: String,
    input: FrameReceiver,
    base_dir: PathBuf,
    file_name: String,
    file_ext: String,
    frames_per_file: u64,
}

/// One open capture file, written through the runtime's async file IO.
struct CaptureFile {
    path: PathBuf,
    out: BufWriter<File>,
    frames_written: u64,
}

impl CaptureFile {
    async fn create(path: PathBuf) -> Result<Self, SimError> {
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            frames_written: 0,
        })
    }

    async fn write_frame(&mut self, frame: &VisFrame) -> Result<(), SimError> {
        let record = encode_record(frame)?;
        self.out.write_all(&record).await?;
        self.frames_written += 1;
        Ok(())
    }

    async fn finish(mut self) -> Result<(), SimError> {
        self.out.flush().await?;
        debug!(path = %self.path.display(), frames = self.frames_written, "capture file closed");
        Ok(())
    }
}

/// Path of the `index`-th file of a capture.
pub fn capture_file_path(base_dir: &Path, file_name: &str, index: u64, ext: &str) -> PathBuf {
    base_dir.join(format!("{file_name}_{index:07}.{ext}"))
}

impl RawFileWrite {
    pub fn from_config(ctx: &mut StageContext<'_>) -> Result<Self, SimError> {
        let name = ctx.unique_name();
        let frames_per_file = ctx.get_u64_or("frames_per_file", DEFAULT_FRAMES_PER_FILE)?;
        if frames_per_file == 0 {
            return Err(SimError::config(name, "frames_per_file", "must be greater than 0"));
        }
        Ok(Self {
            name,
            base_dir: PathBuf::from(ctx.get_string("base_dir")?),
            file_name: ctx.get_string("file_name")?,
            file_ext: ctx.get_string_or("file_ext", DEFAULT_EXT)?,
            frames_per_file,
            input: ctx.input("in_buf")?,
        })
    }
}

impl Stage for RawFileWrite {
    fn unique_name(&self) -> &str {
        &self.name
    }

    async fn run(mut self) -> Result<(), SimError> {
        tokio::fs::create_dir_all(&self.base_dir).await?;

        let mut writer: Option<CaptureFile> = None;
        let mut file_index = 0u64;
        let mut total = 0u64;

        while let Some(frame) = self.input.recv().await {
            let mut w = match writer.take() {
                Some(w) if w.frames_written < self.frames_per_file => w,
                full => {
                    if let Some(full) = full {
                        full.finish().await?;
                        file_index += 1;
                    }
                    let path =
                        capture_file_path(&self.base_dir, &self.file_name, file_index, &self.file_ext);
                    debug!(stage = %self.name, path = %path.display(), "opening capture file");
                    CaptureFile::create(path).await?
                }
            };
            w.write_frame(&frame).await?;
            writer = Some(w);
            total += 1;
        }

        let files = match writer {
            Some(w) => {
                w.finish().await?;
                file_index + 1
            }
            None => 0,
        };
        info!(stage = %self.name, frames = total, files, "capture finished");
        Ok(())
    }
}
