//! 버퍼 협력자 — 테스트 대상 프로세스의 입력과 출력
//!
//! 각 협력자는 설정 문서에 두 가지를 기여합니다.
//! - 버퍼 블록: `kotekan_buffer: vis` 블록 하나
//! - 프로세스 블록: 버퍼를 채우는 생산자 또는 비우는 소비자
//!
//! 버퍼 이름은 프로세스 안에서 고유합니다 (`fakevis_buf0`, `fakevis_buf1`, ...).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use kotekan_runner_core::dump::{DEFAULT_EXT, DumpWriter, load_files};
use kotekan_runner_core::error::RunnerError;
use kotekan_runner_core::frame::VisFrame;
use kotekan_runner_core::generator::FakeVisMode;

/// 모든 vis 버퍼가 공유하는 메타데이터 풀 이름
pub const METADATA_POOL: &str = "vis_pool";

static FAKEVIS_COUNT: AtomicUsize = AtomicUsize::new(0);
static READ_COUNT: AtomicUsize = AtomicUsize::new(0);
static DUMP_COUNT: AtomicUsize = AtomicUsize::new(0);

/// 설정 문서의 이름 붙은 블록
pub type Block = (String, Mapping);

/// 설정 문서에 버퍼 하나와 그 버퍼를 다루는 프로세스를 기여하는 협력자
pub trait Buffer: Send + Sync {
    /// 버퍼 고유 이름
    fn name(&self) -> &str;

    /// 버퍼 블록
    fn buffer_block(&self) -> Block {
        (self.name().to_owned(), vis_buffer_block())
    }

    /// 버퍼를 채우거나 비우는 프로세스 블록
    fn process_blocks(&self, run_dir: &Path) -> Vec<Block>;
}

/// 테스트 대상 프로세스에 프레임을 공급하는 버퍼
pub trait InputBuffer: Buffer {
    /// 실행 전에 필요한 파일을 준비합니다.
    fn prepare(&self, _run_dir: &Path) -> Result<(), RunnerError> {
        Ok(())
    }
}

/// 테스트 대상 프로세스의 출력을 캡처하는 버퍼
pub trait OutputBuffer: Buffer {
    /// 캡처 파일이 기록되는 디렉토리
    fn output_dir(&self) -> Option<&Path>;
}

/// `{kotekan_buffer: vis, metadata_pool: vis_pool, num_frames: buffer_depth}`
pub fn vis_buffer_block() -> Mapping {
    let mut block = Mapping::new();
    block.insert("kotekan_buffer".into(), "vis".into());
    block.insert("metadata_pool".into(), METADATA_POOL.into());
    block.insert("num_frames".into(), "buffer_depth".into());
    block
}

fn next_index(counter: &AtomicUsize) -> usize {
    counter.fetch_add(1, Ordering::Relaxed)
}

fn path_value(path: &Path) -> Value {
    Value::String(path.display().to_string())
}

// ─── FakeVisBuffer ───────────────────────────────────────────────────

/// `fakeVis` 프로세스로 합성 프레임을 공급하는 입력 버퍼
#[derive(Debug, Clone)]
pub struct FakeVisBuffer {
    name: String,
    process_name: String,
    num_frames: u64,
    mode: FakeVisMode,
    freq_ids: Vec<u32>,
    cadence: Option<f64>,
    seed: Option<u64>,
    wait: bool,
}

impl FakeVisBuffer {
    /// 시간 샘플 `num_frames`개를 `mode`로 생성하는 버퍼를 만듭니다.
    pub fn new(num_frames: u64, mode: FakeVisMode) -> Self {
        let index = next_index(&FAKEVIS_COUNT);
        Self {
            name: format!("fakevis_buf{index}"),
            process_name: format!("fakevis{index}"),
            num_frames,
            mode,
            freq_ids: vec![0],
            cadence: None,
            seed: None,
            wait: false,
        }
    }

    pub fn freq_ids(mut self, ids: Vec<u32>) -> Self {
        self.freq_ids = ids;
        self
    }

    /// 샘플 간격 (초)
    pub fn cadence(mut self, secs: f64) -> Self {
        self.cadence = Some(secs);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 샘플 사이에 실제로 `cadence`만큼 기다릴지 여부
    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    pub fn num_frames(&self) -> u64 {
        self.num_frames
    }

    pub fn mode(&self) -> FakeVisMode {
        self.mode
    }
}

impl Buffer for FakeVisBuffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_blocks(&self, _run_dir: &Path) -> Vec<Block> {
        let mut block = Mapping::new();
        block.insert("kotekan_process".into(), "fakeVis".into());
        block.insert("out_buf".into(), self.name.clone().into());
        block.insert("num_frames".into(), self.num_frames.into());
        block.insert("mode".into(), self.mode.as_str().into());
        block.insert(
            "freq_ids".into(),
            Value::Sequence(self.freq_ids.iter().map(|&f| u64::from(f).into()).collect()),
        );
        if let Some(cadence) = self.cadence {
            block.insert("cadence".into(), cadence.into());
        }
        if let Some(seed) = self.seed {
            block.insert("seed".into(), seed.into());
        }
        block.insert("wait".into(), self.wait.into());
        vec![(self.process_name.clone(), block)]
    }
}

impl InputBuffer for FakeVisBuffer {}

// ─── ReadVisBuffer ───────────────────────────────────────────────────

/// 주어진 프레임을 파일로 써 두고 `rawFileRead`로 공급하는 입력 버퍼
#[derive(Debug, Clone)]
pub struct ReadVisBuffer {
    name: String,
    process_name: String,
    frames: Vec<VisFrame>,
}

impl ReadVisBuffer {
    pub fn new(frames: Vec<VisFrame>) -> Self {
        let index = next_index(&READ_COUNT);
        Self {
            name: format!("read_buf{index}"),
            process_name: format!("read{index}"),
            frames,
        }
    }

    pub fn frames(&self) -> &[VisFrame] {
        &self.frames
    }

    fn file_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(format!("{}_{:07}.{}", self.name, 0, DEFAULT_EXT))
    }
}

impl Buffer for ReadVisBuffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_blocks(&self, run_dir: &Path) -> Vec<Block> {
        let mut block = Mapping::new();
        block.insert("kotekan_process".into(), "rawFileRead".into());
        block.insert("out_buf".into(), self.name.clone().into());
        block.insert("base_dir".into(), path_value(run_dir));
        block.insert("file_name".into(), self.name.clone().into());
        block.insert("file_ext".into(), DEFAULT_EXT.into());
        block.insert("end_interrupt".into(), true.into());
        vec![(self.process_name.clone(), block)]
    }
}

impl InputBuffer for ReadVisBuffer {
    fn prepare(&self, run_dir: &Path) -> Result<(), RunnerError> {
        let mut writer = DumpWriter::create(self.file_path(run_dir))?;
        for frame in &self.frames {
            writer.write_frame(frame)?;
        }
        let written = writer.finish()?;
        debug!(buffer = %self.name, frames = written, "prepared input file");
        Ok(())
    }
}

// ─── DumpVisBuffer ───────────────────────────────────────────────────

/// `rawFileWrite`로 출력 프레임을 디렉토리에 캡처하는 출력 버퍼
#[derive(Debug, Clone)]
pub struct DumpVisBuffer {
    name: String,
    process_name: String,
    output_dir: PathBuf,
}

impl DumpVisBuffer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let index = next_index(&DUMP_COUNT);
        Self {
            name: format!("dumpvis_buf{index}"),
            process_name: format!("dumpvis{index}"),
            output_dir: output_dir.into(),
        }
    }

    /// 캡처된 프레임을 파일 이름순으로 모두 읽습니다.
    pub fn load(&self) -> Result<Vec<VisFrame>, RunnerError> {
        let frames = load_files(&self.output_dir, &format!("{}_", self.name), DEFAULT_EXT)?;
        debug!(buffer = %self.name, frames = frames.len(), "loaded captured frames");
        Ok(frames)
    }
}

impl Buffer for DumpVisBuffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_blocks(&self, _run_dir: &Path) -> Vec<Block> {
        let mut block = Mapping::new();
        block.insert("kotekan_process".into(), "rawFileWrite".into());
        block.insert("in_buf".into(), self.name.clone().into());
        block.insert("base_dir".into(), path_value(&self.output_dir));
        block.insert("file_name".into(), self.name.clone().into());
        block.insert("file_ext".into(), DEFAULT_EXT.into());
        vec![(self.process_name.clone(), block)]
    }
}

impl OutputBuffer for DumpVisBuffer {
    fn output_dir(&self) -> Option<&Path> {
        Some(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn get<'a>(block: &'a Mapping, key: &str) -> &'a Value {
        block.get(key).unwrap_or_else(|| panic!("missing key {key}"))
    }

    #[test]
    fn buffer_names_are_unique() {
        let a = FakeVisBuffer::new(1, FakeVisMode::Default);
        let b = FakeVisBuffer::new(1, FakeVisMode::Default);
        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with("fakevis_buf"));
    }

    #[test]
    fn vis_buffer_block_references_pool_and_depth() {
        let buf = DumpVisBuffer::new("/tmp/out");
        let (name, block) = buf.buffer_block();
        assert_eq!(name, buf.name());
        assert_eq!(get(&block, "kotekan_buffer").as_str(), Some("vis"));
        assert_eq!(get(&block, "metadata_pool").as_str(), Some(METADATA_POOL));
        assert_eq!(get(&block, "num_frames").as_str(), Some("buffer_depth"));
    }

    #[test]
    fn fakevis_process_block() {
        let buf = FakeVisBuffer::new(128, FakeVisMode::Gaussian)
            .freq_ids(vec![1, 2])
            .seed(7);
        let blocks = buf.process_blocks(Path::new("/unused"));
        assert_eq!(blocks.len(), 1);
        let (_, block) = &blocks[0];
        assert_eq!(get(block, "kotekan_process").as_str(), Some("fakeVis"));
        assert_eq!(get(block, "out_buf").as_str(), Some(buf.name()));
        assert_eq!(get(block, "num_frames").as_u64(), Some(128));
        assert_eq!(get(block, "mode").as_str(), Some("gaussian"));
        assert_eq!(get(block, "seed").as_u64(), Some(7));
        assert_eq!(get(block, "freq_ids").as_sequence().map(Vec::len), Some(2));
        assert!(block.get("cadence").is_none());
    }

    #[test]
    fn dump_process_block_points_at_output_dir() {
        let buf = DumpVisBuffer::new("/data/out");
        let (_, block) = &buf.process_blocks(Path::new("/unused"))[0];
        assert_eq!(get(block, "kotekan_process").as_str(), Some("rawFileWrite"));
        assert_eq!(get(block, "in_buf").as_str(), Some(buf.name()));
        assert_eq!(get(block, "base_dir").as_str(), Some("/data/out"));
        assert_eq!(get(block, "file_ext").as_str(), Some("dump"));
        assert_eq!(buf.output_dir(), Some(Path::new("/data/out")));
    }

    #[test]
    fn read_buffer_prepares_file_loadable_by_prefix() {
        let dir = TempDir::new().unwrap();
        let mut frame = VisFrame::new(3, 0);
        frame.metadata.fpga_seq = 42;
        let buf = ReadVisBuffer::new(vec![frame.clone(), frame]);
        buf.prepare(dir.path()).unwrap();

        let (_, block) = &buf.process_blocks(dir.path())[0];
        assert_eq!(get(block, "kotekan_process").as_str(), Some("rawFileRead"));
        assert_eq!(get(block, "end_interrupt").as_bool(), Some(true));

        let frames = load_files(dir.path(), &format!("{}_", buf.name()), DEFAULT_EXT).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].metadata.fpga_seq, 42);
    }

    #[test]
    fn dump_load_ignores_other_buffers() {
        let dir = TempDir::new().unwrap();
        let buf = DumpVisBuffer::new(dir.path());

        let mut w = DumpWriter::create(dir.path().join(format!("{}_0000000.dump", buf.name())))
            .unwrap();
        w.write_frame(&VisFrame::new(2, 0)).unwrap();
        w.finish().unwrap();

        let mut w = DumpWriter::create(dir.path().join("dumpvis_buf99999_0000000.dump")).unwrap();
        w.write_frame(&VisFrame::new(2, 0)).unwrap();
        w.write_frame(&VisFrame::new(2, 0)).unwrap();
        w.finish().unwrap();

        assert_eq!(buf.load().unwrap().len(), 1);
    }

    #[test]
    fn dump_load_on_empty_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let buf = DumpVisBuffer::new(dir.path());
        assert!(buf.load().unwrap().is_empty());
    }
}
