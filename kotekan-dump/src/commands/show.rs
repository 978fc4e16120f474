//! `kotekan-dump show` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use kotekan_runner_core::dump::read_dump_file;
use kotekan_runner_core::frame::VisFrame;

use crate::cli::ShowArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `show` command.
pub fn execute(args: ShowArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let report = build_report(&args.file, args.limit, args.vis)?;
    writer.render(&report)
}

/// Buffer name a capture file was written for: `<name>_<index>.<ext>`.
pub fn buffer_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.rsplit_once('_') {
        Some((name, index)) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
            name.to_owned()
        }
        _ => stem,
    }
}

pub fn build_report(
    path: &Path,
    limit: Option<usize>,
    with_vis: bool,
) -> Result<ShowReport, CliError> {
    info!(path = %path.display(), ?limit, "reading dump file");
    let frames = read_dump_file(path)?;
    let buffer = buffer_name(path);
    let shown = limit.unwrap_or(frames.len()).min(frames.len());

    Ok(ShowReport {
        file: path.display().to_string(),
        total_frames: frames.len(),
        frames: frames
            .iter()
            .take(shown)
            .enumerate()
            .map(|(index, frame)| FrameEntry::new(index, frame, &buffer, with_vis))
            .collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct ShowReport {
    pub file: String,
    pub total_frames: usize,
    pub frames: Vec<FrameEntry>,
}

#[derive(Debug, Serialize)]
pub struct FrameEntry {
    pub index: usize,
    pub freq_id: u32,
    pub dataset_id: u32,
    pub fpga_seq: u64,
    pub ctime: f64,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vis: Option<Vec<[f32; 2]>>,
}

impl FrameEntry {
    fn new(index: usize, frame: &VisFrame, buffer: &str, with_vis: bool) -> Self {
        let m = &frame.metadata;
        Self {
            index,
            freq_id: m.freq_id,
            dataset_id: m.dataset_id,
            fpga_seq: m.fpga_seq,
            ctime: m.ctime.as_secs_f64(),
            summary: frame.summary(buffer),
            vis: with_vis.then(|| frame.vis.iter().map(|v| [v.re, v.im]).collect()),
        }
    }
}

impl Render for ShowReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} ({} of {} frames)",
            self.file.bold(),
            self.frames.len(),
            self.total_frames
        )?;
        for f in &self.frames {
            writeln!(w, "{:>6}  {}", f.index.to_string().dimmed(), f.summary)?;
            if let Some(vis) = &f.vis {
                let samples: Vec<String> = vis
                    .iter()
                    .map(|[re, im]| format!("{re}{im:+}j"))
                    .collect();
                writeln!(w, "        vis: [{}]", samples.join(", "))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kotekan_runner_core::dump::DumpWriter;
    use kotekan_runner_core::frame::Cf32;
    use tempfile::TempDir;

    fn write_frames(path: &Path, count: u64) {
        let mut writer = DumpWriter::create(path).unwrap();
        for t in 0..count {
            let mut frame = VisFrame::new(2, 0);
            frame.metadata.fpga_seq = t;
            frame.vis[0] = Cf32::new(1.0, -2.0);
            writer.write_frame(&frame).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_buffer_name_strips_file_index() {
        assert_eq!(
            buffer_name(Path::new("/tmp/dumpvis_buf0_0000012.dump")),
            "dumpvis_buf0"
        );
        assert_eq!(buffer_name(Path::new("plain.dump")), "plain");
        assert_eq!(buffer_name(Path::new("run_a.dump")), "run_a");
    }

    #[test]
    fn test_show_respects_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out_0000000.dump");
        write_frames(&path, 5);

        let report = build_report(&path, Some(2), false).unwrap();
        assert_eq!(report.total_frames, 5);
        assert_eq!(report.frames.len(), 2);
        assert!(report.frames[1].summary.starts_with("visBuffer[name=out]"));
        assert!(report.frames[0].vis.is_none());
    }

    #[test]
    fn test_show_includes_vis_when_asked() {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out_0000000.dump");
        write_frames(&path, 1);

        let report = build_report(&path, None, true).unwrap();
        assert_eq!(report.frames[0].vis.as_ref().unwrap()[0], [1.0, -2.0]);

        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("vis: [1-2j, 0+0j, 0+0j]"));
    }

    #[test]
    fn test_show_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = build_report(&dir.path().join("missing.dump"), None, false).unwrap_err();
        assert_eq!(err.exit_code(), 10);
    }
}
