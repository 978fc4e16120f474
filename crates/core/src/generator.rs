//! 합성 프레임 생성기 — 알려진 통계적 형태의 가짜 vis 데이터
//!
//! 시간 샘플 하나당 주파수 ID마다 프레임 하나를 만듭니다.
//! 같은 시드와 파라미터로 만든 생성기는 항상 같은 프레임을 냅니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::frame::{Cf32, Timespec, VisFrame, product_index};

/// 초당 FPGA 카운트 수
pub const FPGA_COUNTS_PER_SEC: f64 = 390_625.0;

/// 생성 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FakeVisMode {
    /// 대각 원소 `(0, i)`, 그 외 `(frame_index, freq_id)`
    #[default]
    Default,
    /// `(i, j)`
    FillIj,
    /// `exp(i * (i - j))`
    PhaseIj,
    /// 실수부/허수부 독립 N(0, 1)
    Gaussian,
}

impl FakeVisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::FillIj => "fill_ij",
            Self::PhaseIj => "phase_ij",
            Self::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for FakeVisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FakeVisMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "fill_ij" => Ok(Self::FillIj),
            "phase_ij" => Ok(Self::PhaseIj),
            "gaussian" => Ok(Self::Gaussian),
            other => Err(ConfigError::InvalidValue {
                field: "mode".to_owned(),
                reason: format!(
                    "unknown mode '{other}', expected one of: default, fill_ij, phase_ij, gaussian"
                ),
            }),
        }
    }
}

/// 생성기 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeVisParams {
    pub num_elements: u32,
    pub num_ev: u32,
    /// 생성할 시간 샘플 수
    pub num_frames: u64,
    pub mode: FakeVisMode,
    pub freq_ids: Vec<u32>,
    /// 샘플 간격 (초)
    pub cadence_secs: f64,
    pub seed: u64,
    /// 첫 샘플의 시각 (유닉스 초)
    pub start_time: f64,
}

impl Default for FakeVisParams {
    fn default() -> Self {
        Self {
            num_elements: 10,
            num_ev: 0,
            num_frames: 10,
            mode: FakeVisMode::Default,
            freq_ids: vec![0],
            cadence_secs: 5.0,
            seed: 0,
            start_time: 1_500_000_000.0,
        }
    }
}

impl FakeVisParams {
    /// 총 출력 프레임 수: `num_frames * freq_ids.len()`
    pub fn total_output_frames(&self) -> u64 {
        self.num_frames * self.freq_ids.len() as u64
    }
}

/// SplitMix64 기반 결정적 난수 생성기
#[derive(Debug, Clone)]
struct SplitMix64(u64);

impl SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// (0, 1] 구간 균등 분포
    fn next_unit(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64 + 1.0) / (1u64 << 53) as f64
    }

    /// Box-Muller 변환으로 표준 정규 분포 샘플 두 개
    fn next_gaussian_pair(&mut self) -> (f64, f64) {
        let u1 = self.next_unit();
        let u2 = self.next_unit();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        (r * theta.cos(), r * theta.sin())
    }
}

/// 합성 프레임 iterator
///
/// 시간 순서대로, 각 시간 샘플 안에서는 `freq_ids` 순서대로 프레임을 냅니다.
#[derive(Debug, Clone)]
pub struct FakeVisGenerator {
    params: FakeVisParams,
    rng: SplitMix64,
    sample: u64,
    freq_pos: usize,
}

impl FakeVisGenerator {
    pub fn new(params: FakeVisParams) -> Self {
        let rng = SplitMix64(params.seed);
        Self {
            params,
            rng,
            sample: 0,
            freq_pos: 0,
        }
    }

    pub fn params(&self) -> &FakeVisParams {
        &self.params
    }

    fn build_frame(&mut self, sample: u64, freq_id: u32) -> VisFrame {
        let p = &self.params;
        let n = p.num_elements as usize;
        let mut frame = VisFrame::new(p.num_elements, p.num_ev);

        let elapsed = sample as f64 * p.cadence_secs;
        frame.metadata.fpga_seq = (elapsed * FPGA_COUNTS_PER_SEC).round() as u64;
        frame.metadata.ctime = Timespec::from_secs_f64(p.start_time + elapsed);
        frame.metadata.freq_id = freq_id;

        let mode = p.mode;
        for i in 0..n {
            for j in i..n {
                let value = match mode {
                    FakeVisMode::Default if i == j => Cf32::new(0.0, i as f32),
                    FakeVisMode::Default => Cf32::new(sample as f32, freq_id as f32),
                    FakeVisMode::FillIj => Cf32::new(i as f32, j as f32),
                    FakeVisMode::PhaseIj => {
                        let phase = i as f32 - j as f32;
                        Cf32::new(phase.cos(), phase.sin())
                    }
                    FakeVisMode::Gaussian => {
                        let (re, im) = self.rng.next_gaussian_pair();
                        Cf32::new(re as f32, im as f32)
                    }
                };
                frame.vis[product_index(i, j, n)] = value;
            }
        }

        frame.weight.fill(1.0);
        for ev in 0..frame.evals.len() {
            frame.evals[ev] = ev as f32;
            for i in 0..n {
                frame.evecs[ev * n + i] = Cf32::new(ev as f32, i as f32);
            }
        }
        frame.rms = 1.0;
        frame
    }
}

impl Iterator for FakeVisGenerator {
    type Item = VisFrame;

    fn next(&mut self) -> Option<VisFrame> {
        if self.sample >= self.params.num_frames || self.params.freq_ids.is_empty() {
            return None;
        }
        let sample = self.sample;
        let freq_id = self.params.freq_ids[self.freq_pos];

        self.freq_pos += 1;
        if self.freq_pos == self.params.freq_ids.len() {
            self.freq_pos = 0;
            self.sample += 1;
        }

        Some(self.build_frame(sample, freq_id))
    }
}
