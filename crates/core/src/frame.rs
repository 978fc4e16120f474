//! vis 프레임 — 상관기 출력 한 프레임의 인메모리 표현
//!
//! 프레임 구조는 `num_elements`(입력 수)와 `num_ev`(고유벡터 수)로 결정됩니다.
//! `num_prod = n(n+1)/2`개의 상관 곱이 상삼각 순서로 저장됩니다.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// 복소수 샘플 (단정도)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cf32 {
    pub re: f32,
    pub im: f32,
}

impl Cf32 {
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    /// 크기 (절댓값)
    pub fn norm(&self) -> f32 {
        self.re.hypot(self.im)
    }
}

/// `timespec` 형태의 타임스탬프
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: i64,
}

impl Timespec {
    /// 초 단위 부동소수점 값에서 생성합니다.
    pub fn from_secs_f64(secs: f64) -> Self {
        let sec = secs.floor();
        let nsec = ((secs - sec) * 1e9).round() as i64;
        Self {
            sec: sec as i64,
            nsec,
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 * 1e-9
    }
}

/// 프레임 메타데이터
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VisMetadata {
    pub fpga_seq: u64,
    pub ctime: Timespec,
    pub freq_id: u32,
    pub dataset_id: u32,
    pub num_elements: u32,
    pub num_prod: u32,
    pub num_ev: u32,
}

impl VisMetadata {
    /// 구조 필드(`num_elements`, `num_prod`)가 서로 맞는지 검증합니다.
    ///
    /// 덤프 파일처럼 신뢰할 수 없는 메타데이터로 레이아웃을 만들기 전에 호출합니다.
    pub fn check_structure(&self) -> Result<(), FrameError> {
        if self.num_elements > MAX_NUM_ELEMENTS {
            return Err(FrameError::ShapeMismatch(format!(
                "num_elements: {} exceeds maximum {MAX_NUM_ELEMENTS}",
                self.num_elements
            )));
        }
        let expected = num_prod(self.num_elements);
        if self.num_prod != expected {
            return Err(FrameError::ShapeMismatch(format!(
                "num_prod: expected {expected}, got {}",
                self.num_prod
            )));
        }
        Ok(())
    }
}

/// vis 프레임
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisFrame {
    pub metadata: VisMetadata,
    /// 상관 곱 (상삼각, `num_prod`개)
    pub vis: Vec<Cf32>,
    /// 상관 곱별 가중치
    pub weight: Vec<f32>,
    /// 고유값 (`num_ev`개)
    pub evals: Vec<f32>,
    /// 고유벡터 (`num_ev * num_elements`개)
    pub evecs: Vec<Cf32>,
    /// 잔차 RMS
    pub rms: f32,
}

/// 프레임 하나의 최대 입력 수 (`num_prod`가 `u32`에 들어가는 범위)
pub const MAX_NUM_ELEMENTS: u32 = 65535;

/// 상관 곱 개수: `n(n+1)/2`
///
/// `u32`를 넘으면 `u32::MAX`로 포화됩니다. [`MAX_NUM_ELEMENTS`] 이하에서는 정확합니다.
pub fn num_prod(num_elements: u32) -> u32 {
    let n = u64::from(num_elements);
    u32::try_from(n * (n + 1) / 2).unwrap_or(u32::MAX)
}

/// 상삼각 행렬에서 `(i, j)` (i <= j) 곱의 인덱스
pub fn product_index(i: usize, j: usize, n: usize) -> usize {
    debug_assert!(i <= j && j < n);
    i * (2 * n - i + 1) / 2 + (j - i)
}

impl VisFrame {
    /// 주어진 구조로 0 초기화된 프레임을 생성합니다.
    pub fn new(num_elements: u32, num_ev: u32) -> Self {
        let num_prod = num_prod(num_elements);
        Self {
            metadata: VisMetadata {
                num_elements,
                num_prod,
                num_ev,
                ..VisMetadata::default()
            },
            vis: vec![Cf32::default(); num_prod as usize],
            weight: vec![0.0; num_prod as usize],
            evals: vec![0.0; num_ev as usize],
            evecs: vec![Cf32::default(); num_ev as usize * num_elements as usize],
            rms: 0.0,
        }
    }

    /// 배열 길이가 메타데이터의 구조와 일치하는지 검증합니다.
    pub fn check_shape(&self) -> Result<(), FrameError> {
        self.metadata.check_structure()?;
        let m = &self.metadata;
        let checks = [
            ("vis", m.num_prod as usize, self.vis.len()),
            ("weight", m.num_prod as usize, self.weight.len()),
            ("evals", m.num_ev as usize, self.evals.len()),
            (
                "evecs",
                (m.num_ev as usize) * (m.num_elements as usize),
                self.evecs.len(),
            ),
        ];
        for (name, expected, actual) in checks {
            if expected != actual {
                return Err(FrameError::ShapeMismatch(format!(
                    "{name}: expected {expected}, got {actual}"
                )));
            }
        }
        Ok(())
    }

    /// 시각 정보를 UTC 시각으로 변환합니다.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let nsec = u32::try_from(self.metadata.ctime.nsec).ok()?;
        DateTime::from_timestamp(self.metadata.ctime.sec, nsec)
    }

    /// 디버그용 한 줄 요약을 반환합니다.
    ///
    /// `visBuffer[name=<buffer>]: freq=.. dataset=.. fpga_seq=.. time=%F %T`
    pub fn summary(&self, buffer_name: &str) -> String {
        let time = self
            .timestamp()
            .map(|t| t.format("%F %T").to_string())
            .unwrap_or_else(|| "invalid".to_owned());
        format!(
            "visBuffer[name={}]: freq={} dataset={} fpga_seq={} time={}",
            buffer_name,
            self.metadata.freq_id,
            self.metadata.dataset_id,
            self.metadata.fpga_seq,
            time
        )
    }

    /// vis 값의 집합을 반환합니다.
    ///
    /// 모든 샘플이 허수부 0인 정수일 때만 `Some`을 반환합니다.
    /// `{0, 1}`처럼 리터럴 집합과 비교할 때 사용합니다.
    pub fn vis_levels(&self) -> Option<BTreeSet<i64>> {
        self.vis
            .iter()
            .map(|v| {
                if v.im == 0.0 && v.re.fract() == 0.0 && v.re.is_finite() {
                    Some(v.re as i64)
                } else {
                    None
                }
            })
            .collect()
    }
}
