//! 원시 덤프 파일 — 파이프라인이 내보낸 프레임의 디스크 형식
//!
//! 레코드는 파일 끝까지 반복되며 모두 리틀 엔디언입니다.
//!
//! ```text
//! | u32 metadata_size | metadata (44 bytes) | u32 frame_size | frame bytes |
//! ```
//!
//! 메타데이터 패킹 순서:
//! `fpga_seq u64, ctime_sec i64, ctime_nsec i64, freq_id u32, dataset_id u32,
//! num_elements u32, num_prod u32, num_ev u32`
//!
//! 프레임 바이트는 [`VisLayout`](crate::layout::VisLayout)을 따릅니다.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, RunnerError};
use crate::frame::{Timespec, VisFrame, VisMetadata};
use crate::layout::VisLayout;

/// 메타데이터 직렬화 크기 (바이트)
pub const METADATA_SIZE: usize = 44;

/// 덤프 파일 기본 확장자
pub const DEFAULT_EXT: &str = "dump";

/// 메타데이터를 버퍼에 씁니다.
pub fn put_metadata(buf: &mut impl BufMut, m: &VisMetadata) {
    buf.put_u64_le(m.fpga_seq);
    buf.put_i64_le(m.ctime.sec);
    buf.put_i64_le(m.ctime.nsec);
    buf.put_u32_le(m.freq_id);
    buf.put_u32_le(m.dataset_id);
    buf.put_u32_le(m.num_elements);
    buf.put_u32_le(m.num_prod);
    buf.put_u32_le(m.num_ev);
}

/// 버퍼에서 메타데이터를 읽습니다. 호출자가 길이를 보장해야 합니다.
fn get_metadata(buf: &mut impl Buf) -> VisMetadata {
    VisMetadata {
        fpga_seq: buf.get_u64_le(),
        ctime: Timespec {
            sec: buf.get_i64_le(),
            nsec: buf.get_i64_le(),
        },
        freq_id: buf.get_u32_le(),
        dataset_id: buf.get_u32_le(),
        num_elements: buf.get_u32_le(),
        num_prod: buf.get_u32_le(),
        num_ev: buf.get_u32_le(),
    }
}

/// 프레임 하나를 레코드로 인코딩합니다.
pub fn encode_record(frame: &VisFrame) -> Result<BytesMut, FrameError> {
    let layout = VisLayout::for_metadata(&frame.metadata);
    let frame_size = layout.required_size();
    let data = layout.encode(frame, frame_size)?;

    let mut buf = BytesMut::with_capacity(8 + METADATA_SIZE + frame_size);
    buf.put_u32_le(METADATA_SIZE as u32);
    put_metadata(&mut buf, &frame.metadata);
    buf.put_u32_le(frame_size as u32);
    buf.put_slice(&data);
    Ok(buf)
}

/// 바이트열 전체를 레코드 단위로 디코딩합니다.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<VisFrame>, FrameError> {
    let mut frames = Vec::new();
    let mut cursor = bytes;

    while cursor.has_remaining() {
        let offset = bytes.len() - cursor.remaining();

        ensure(cursor, offset, 4)?;
        let metadata_size = cursor.get_u32_le() as usize;
        if metadata_size != METADATA_SIZE {
            return Err(FrameError::MetadataSize {
                offset,
                expected: METADATA_SIZE,
                actual: metadata_size,
            });
        }

        ensure(cursor, offset + 4, METADATA_SIZE + 4)?;
        let metadata = get_metadata(&mut cursor);
        let frame_size = cursor.get_u32_le() as usize;

        let data_offset = offset + 8 + METADATA_SIZE;
        ensure(cursor, data_offset, frame_size)?;
        metadata.check_structure()?;
        let layout = VisLayout::for_metadata(&metadata);
        let frame = layout.decode(metadata, &cursor[..frame_size])?;
        cursor.advance(frame_size);
        frames.push(frame);
    }

    Ok(frames)
}

fn ensure(cursor: &[u8], offset: usize, needed: usize) -> Result<(), FrameError> {
    if cursor.remaining() < needed {
        return Err(FrameError::Truncated {
            offset,
            needed,
            available: cursor.remaining(),
        });
    }
    Ok(())
}

/// 덤프 파일에 프레임을 순서대로 기록하는 writer
pub struct DumpWriter {
    path: PathBuf,
    out: BufWriter<File>,
    frames_written: u64,
}

impl DumpWriter {
    /// 파일을 새로 만들어 writer를 엽니다 (기존 파일은 덮어씀).
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            frames_written: 0,
        })
    }

    /// 프레임 하나를 기록합니다.
    pub fn write_frame(&mut self, frame: &VisFrame) -> Result<(), RunnerError> {
        let record = encode_record(frame)?;
        self.out.write_all(&record)?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 버퍼를 비우고 파일을 닫습니다.
    pub fn finish(mut self) -> Result<u64, RunnerError> {
        self.out.flush()?;
        tracing::debug!(
            path = %self.path.display(),
            frames = self.frames_written,
            "dump file closed"
        );
        Ok(self.frames_written)
    }
}

/// 덤프 파일 하나를 읽어 모든 프레임을 반환합니다.
pub fn read_dump_file(path: impl AsRef<Path>) -> Result<Vec<VisFrame>, RunnerError> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(decode_records(&bytes)?)
}

/// 디렉토리에서 `<prefix>*.<ext>` 파일 목록을 이름순으로 반환합니다.
pub fn matching_files(
    dir: impl AsRef<Path>,
    prefix: &str,
    ext: &str,
) -> Result<Vec<PathBuf>, RunnerError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name_ok = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix));
        let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(ext);
        if name_ok && ext_ok {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// 디렉토리의 `<prefix>*.<ext>` 파일을 이름순으로 모두 읽어 프레임을 이어 붙입니다.
pub fn load_files(
    dir: impl AsRef<Path>,
    prefix: &str,
    ext: &str,
) -> Result<Vec<VisFrame>, RunnerError> {
    let files = matching_files(dir, prefix, ext)?;
    let mut frames = Vec::new();
    for file in &files {
        let mut chunk = read_dump_file(file)?;
        tracing::debug!(path = %file.display(), frames = chunk.len(), "loaded dump file");
        frames.append(&mut chunk);
    }
    Ok(frames)
}
