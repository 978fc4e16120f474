//! `kotekan-dump summary` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use kotekan_runner_core::dump::{matching_files, read_dump_file};

use crate::cli::SummaryArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `summary` command.
pub fn execute(args: SummaryArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let report = build_report(&args.dir, &args.prefix, &args.ext)?;
    writer.render(&report)
}

/// Read every matching file under `dir` and tally its frames.
pub fn build_report(dir: &Path, prefix: &str, ext: &str) -> Result<SummaryReport, CliError> {
    info!(dir = %dir.display(), prefix, ext, "summarizing dump files");
    let files = matching_files(dir, prefix, ext)?;
    if files.is_empty() {
        return Err(CliError::Command(format!(
            "no '{prefix}*.{ext}' files in {}",
            dir.display()
        )));
    }

    let mut entries = Vec::with_capacity(files.len());
    let mut groups: BTreeMap<(u32, u32), u64> = BTreeMap::new();
    let mut fpga_seq: Option<(u64, u64)> = None;
    let mut total = 0u64;

    for file in &files {
        let frames = read_dump_file(file)?;
        debug!(path = %file.display(), frames = frames.len(), "read dump file");
        for frame in &frames {
            let m = &frame.metadata;
            *groups.entry((m.freq_id, m.dataset_id)).or_default() += 1;
            fpga_seq = Some(match fpga_seq {
                Some((lo, hi)) => (lo.min(m.fpga_seq), hi.max(m.fpga_seq)),
                None => (m.fpga_seq, m.fpga_seq),
            });
        }
        total += frames.len() as u64;
        entries.push(FileEntry {
            name: file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            frames: frames.len() as u64,
        });
    }

    Ok(SummaryReport {
        dir: dir.display().to_string(),
        total_frames: total,
        files: entries,
        groups: groups
            .into_iter()
            .map(|((freq_id, dataset_id), frames)| GroupEntry {
                freq_id,
                dataset_id,
                frames,
            })
            .collect(),
        fpga_seq: fpga_seq.map(|(first, last)| FpgaRange { first, last }),
    })
}

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub dir: String,
    pub total_frames: u64,
    pub files: Vec<FileEntry>,
    pub groups: Vec<GroupEntry>,
    pub fpga_seq: Option<FpgaRange>,
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub frames: u64,
}

/// Frames sharing a `(freq_id, dataset_id)`.
#[derive(Debug, Serialize)]
pub struct GroupEntry {
    pub freq_id: u32,
    pub dataset_id: u32,
    pub frames: u64,
}

#[derive(Debug, Serialize)]
pub struct FpgaRange {
    pub first: u64,
    pub last: u64,
}

impl Render for SummaryReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Dump Summary: {}", self.dir.bold())?;
        writeln!(
            w,
            "  Files: {}, frames: {}",
            self.files.len(),
            self.total_frames.to_string().bold()
        )?;
        if let Some(range) = &self.fpga_seq {
            writeln!(w, "  fpga_seq: {} .. {}", range.first, range.last)?;
        }
        writeln!(w)?;

        writeln!(w, "{:<40} {:>10}", "File", "Frames")?;
        writeln!(w, "{}", "-".repeat(51))?;
        for f in &self.files {
            writeln!(w, "{:<40} {:>10}", f.name, f.frames)?;
        }
        writeln!(w)?;

        writeln!(w, "{:<10} {:<10} {:>10}", "Freq", "Dataset", "Frames")?;
        writeln!(w, "{}", "-".repeat(32))?;
        for g in &self.groups {
            writeln!(
                w,
                "{:<10} {:<10} {:>10}",
                g.freq_id.to_string().cyan(),
                g.dataset_id,
                g.frames
            )?;
        }
        Ok(())
    }
}
