//! 프레임 메모리 레이아웃 — vis 프레임 데이터 영역의 배치 계산
//!
//! 각 멤버는 원소 크기에 맞춰 정렬된 오프셋에 놓이고, 전체 구조체 크기는
//! 가장 큰 정렬 단위로 올림됩니다.
//!
//! ```text
//! | vis (cf32 x num_prod) | weight (f32 x num_prod) | evals | evecs | rms | pad |
//! ```

use std::ops::Range;

use bytes::{Buf, BufMut};

use crate::error::FrameError;
use crate::frame::{Cf32, VisFrame, VisMetadata};

const CF32_SIZE: usize = 8;
const F32_SIZE: usize = 4;

/// 이름 붙은 멤버들의 바이트 범위
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    members: Vec<(&'static str, Range<usize>)>,
    size: usize,
}

impl StructLayout {
    /// 멤버의 바이트 범위를 조회합니다.
    pub fn range(&self, name: &str) -> Option<Range<usize>> {
        self.members
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| r.clone())
    }

    /// 정렬 패딩을 포함한 전체 크기
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn members(&self) -> impl Iterator<Item = (&'static str, Range<usize>)> + '_ {
        self.members.iter().map(|(n, r)| (*n, r.clone()))
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    if align <= 1 {
        return offset;
    }
    offset.div_ceil(align) * align
}

/// `(이름, 원소 크기, 원소 개수)` 목록으로 레이아웃을 계산합니다.
pub fn struct_alignment(members: &[(&'static str, usize, usize)]) -> StructLayout {
    let mut offset = 0;
    let mut max_align = 1;
    let mut ranges = Vec::with_capacity(members.len());

    for &(name, elem_size, count) in members {
        let start = align_up(offset, elem_size);
        let end = start + elem_size * count;
        ranges.push((name, start..end));
        offset = end;
        max_align = max_align.max(elem_size);
    }

    StructLayout {
        members: ranges,
        size: align_up(offset, max_align),
    }
}

/// vis 프레임 데이터 레이아웃
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisLayout {
    layout: StructLayout,
    num_elements: usize,
    num_prod: usize,
    num_ev: usize,
}

impl VisLayout {
    pub fn new(num_elements: u32, num_prod: u32, num_ev: u32) -> Self {
        let (n, p, e) = (num_elements as usize, num_prod as usize, num_ev as usize);
        let layout = struct_alignment(&[
            ("vis", CF32_SIZE, p),
            ("weight", F32_SIZE, p),
            ("evals", F32_SIZE, e),
            ("evecs", CF32_SIZE, e * n),
            ("rms", F32_SIZE, 1),
        ]);
        Self {
            layout,
            num_elements: n,
            num_prod: p,
            num_ev: e,
        }
    }

    /// 메타데이터의 구조 정보로 레이아웃을 계산합니다.
    pub fn for_metadata(metadata: &VisMetadata) -> Self {
        Self::new(metadata.num_elements, metadata.num_prod, metadata.num_ev)
    }

    /// 프레임을 담는 데 필요한 최소 바이트 수
    pub fn required_size(&self) -> usize {
        self.layout.size()
    }

    pub fn struct_layout(&self) -> &StructLayout {
        &self.layout
    }

    fn member(&self, name: &str) -> Range<usize> {
        // 멤버 이름은 new()에서 고정되므로 항상 존재
        self.layout.range(name).unwrap_or(0..0)
    }

    /// 프레임 데이터를 `frame_size` 바이트 버퍼로 인코딩합니다.
    pub fn encode(&self, frame: &VisFrame, frame_size: usize) -> Result<Vec<u8>, FrameError> {
        let required = self.required_size();
        if required > frame_size {
            return Err(FrameError::BufferTooSmall {
                required,
                actual: frame_size,
            });
        }
        frame.check_shape()?;
        if frame.vis.len() != self.num_prod || frame.evals.len() != self.num_ev {
            return Err(FrameError::ShapeMismatch(format!(
                "frame ({} prods, {} evs) does not match layout ({} prods, {} evs)",
                frame.vis.len(),
                frame.evals.len(),
                self.num_prod,
                self.num_ev
            )));
        }

        let mut data = vec![0u8; frame_size];
        put_cf32(&mut data[self.member("vis")], &frame.vis);
        put_f32(&mut data[self.member("weight")], &frame.weight);
        put_f32(&mut data[self.member("evals")], &frame.evals);
        put_cf32(&mut data[self.member("evecs")], &frame.evecs);
        put_f32(&mut data[self.member("rms")], &[frame.rms]);
        Ok(data)
    }

    /// 바이트 버퍼에서 프레임을 디코딩합니다.
    pub fn decode(&self, metadata: VisMetadata, data: &[u8]) -> Result<VisFrame, FrameError> {
        let required = self.required_size();
        if data.len() < required {
            return Err(FrameError::Truncated {
                offset: 0,
                needed: required,
                available: data.len(),
            });
        }

        let frame = VisFrame {
            metadata,
            vis: get_cf32(&data[self.member("vis")]),
            weight: get_f32(&data[self.member("weight")]),
            evals: get_f32(&data[self.member("evals")]),
            evecs: get_cf32(&data[self.member("evecs")]),
            rms: get_f32(&data[self.member("rms")])
                .first()
                .copied()
                .unwrap_or_default(),
        };
        if frame.evecs.len() != self.num_ev * self.num_elements {
            return Err(FrameError::ShapeMismatch("evecs".to_owned()));
        }
        frame.check_shape()?;
        Ok(frame)
    }
}

fn put_f32(mut dst: &mut [u8], values: &[f32]) {
    for v in values {
        dst.put_f32_le(*v);
    }
}

fn put_cf32(mut dst: &mut [u8], values: &[Cf32]) {
    for v in values {
        dst.put_f32_le(v.re);
        dst.put_f32_le(v.im);
    }
}

fn get_f32(mut src: &[u8]) -> Vec<f32> {
    let mut out = Vec::with_capacity(src.len() / F32_SIZE);
    while src.remaining() >= F32_SIZE {
        out.push(src.get_f32_le());
    }
    out
}

fn get_cf32(mut src: &[u8]) -> Vec<Cf32> {
    let mut out = Vec::with_capacity(src.len() / CF32_SIZE);
    while src.remaining() >= CF32_SIZE {
        let re = src.get_f32_le();
        let im = src.get_f32_le();
        out.push(Cf32::new(re, im));
    }
    out
}
