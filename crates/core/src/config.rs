//! 설정 관리 — 파이프라인 전역 설정
//!
//! [`GlobalConfig`]는 테스트가 파이프라인에 넘기는 전역 파라미터입니다.
//! 기본 템플릿([`Default`]) 위에 테스트별 오버라이드를 병합해 만들며,
//! 생성 이후에는 변경할 수 없습니다.
//!
//! # 키 규칙
//! - 인식되는 키는 [`RECOGNIZED_KEYS`]에 열거됩니다.
//! - 프로세스 전용 키는 빌더의 [`GlobalConfigBuilder::param`]으로 명시적으로 선언해야 합니다.
//! - 그 밖의 키는 생성 시점에 [`ConfigError::UnknownKey`]로 거부됩니다.
//!
//! # 사용 예시
//! ```
//! use kotekan_runner_core::config::GlobalConfig;
//!
//! let config = GlobalConfig::builder()
//!     .num_elements(7)
//!     .num_ev(0)
//!     .total_frames(128)
//!     .param("variable_my_process_needs", -1)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.num_prod(), 28);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RunnerError};
use crate::frame::{self, MAX_NUM_ELEMENTS};

/// 파이프라인이 인식하는 전역 키 목록
pub const RECOGNIZED_KEYS: &[&str] = &[
    "log_level",
    "num_elements",
    "num_ev",
    "total_frames",
    "buffer_depth",
    "freq_ids",
    "cpu_affinity",
];

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const MAX_FREQ_ID: u32 = 1024;
const MAX_BUFFER_DEPTH: u32 = 1024;

/// 설정 값 (스칼라 또는 리스트)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// 정수 값으로 해석합니다.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// 문자열 값으로 해석합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// YAML 값으로 변환합니다.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Self::Bool(b) => serde_yaml::Value::Bool(*b),
            Self::Int(i) => serde_yaml::Value::Number((*i).into()),
            Self::Float(f) => serde_yaml::Value::Number((*f).into()),
            Self::Str(s) => serde_yaml::Value::String(s.clone()),
            Self::List(items) => {
                serde_yaml::Value::Sequence(items.iter().map(Self::to_yaml).collect())
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// 파이프라인 전역 설정
///
/// 필드는 생성 이후 읽기 전용입니다. 값을 바꾸려면 빌더로 새로 만듭니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    log_level: String,
    num_elements: u32,
    num_ev: u32,
    total_frames: u64,
    buffer_depth: u32,
    freq_ids: Vec<u32>,
    cpu_affinity: Vec<u32>,
    /// 명시적으로 선언된 프로세스 전용 파라미터
    params: BTreeMap<String, ParamValue>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            num_elements: 10,
            num_ev: 0,
            total_frames: 10,
            buffer_depth: 4,
            freq_ids: vec![0],
            cpu_affinity: Vec::new(),
            params: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// 기본 템플릿에서 시작하는 빌더를 생성합니다.
    pub fn builder() -> GlobalConfigBuilder {
        GlobalConfigBuilder::new()
    }

    /// TOML 파일에서 설정을 로드합니다.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                RunnerError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    ///
    /// 인식되는 키는 루트에, 프로세스 전용 키는 `[params]` 테이블에 둡니다.
    pub fn parse(toml_str: &str) -> Result<Self, RunnerError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            if let Some(key) = unknown_field_name(&e.to_string()) {
                ConfigError::UnknownKey { key }
            } else {
                ConfigError::ParseFailed {
                    reason: e.to_string(),
                }
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 템플릿 위에 매핑을 병합합니다.
    ///
    /// 인식되는 키는 기본값을 대체하고, `declared`에 포함된 키는
    /// 프로세스 전용 파라미터가 됩니다. 그 외의 키는 거부됩니다.
    pub fn from_mapping(
        mapping: BTreeMap<String, ParamValue>,
        declared: &[&str],
    ) -> Result<Self, RunnerError> {
        let mut builder = GlobalConfigBuilder::new();
        for (key, value) in mapping {
            builder = if RECOGNIZED_KEYS.contains(&key.as_str()) {
                builder.set_recognized(&key, value)
            } else if declared.contains(&key.as_str()) {
                builder.param(key, value)
            } else {
                return Err(ConfigError::UnknownKey { key }.into());
            };
        }
        builder.build()
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(invalid(
                "log_level",
                format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            ));
        }

        if self.num_elements == 0 || self.num_elements > MAX_NUM_ELEMENTS {
            return Err(invalid(
                "num_elements",
                format!("must be 1-{MAX_NUM_ELEMENTS}"),
            ));
        }

        if self.num_ev > self.num_elements {
            return Err(invalid(
                "num_ev",
                format!("must not exceed num_elements ({})", self.num_elements),
            ));
        }

        if self.total_frames == 0 {
            return Err(invalid("total_frames", "must be greater than 0".to_owned()));
        }

        if self.buffer_depth == 0 || self.buffer_depth > MAX_BUFFER_DEPTH {
            return Err(invalid(
                "buffer_depth",
                format!("must be 1-{MAX_BUFFER_DEPTH}"),
            ));
        }

        if self.freq_ids.is_empty() {
            return Err(invalid("freq_ids", "must not be empty".to_owned()));
        }
        if let Some(bad) = self.freq_ids.iter().find(|&&f| f >= MAX_FREQ_ID) {
            return Err(invalid(
                "freq_ids",
                format!("frequency id {bad} out of range 0-{}", MAX_FREQ_ID - 1),
            ));
        }

        if let Some(key) = self
            .params
            .keys()
            .find(|k| RECOGNIZED_KEYS.contains(&k.as_str()))
        {
            return Err(ConfigError::DuplicateKey { key: key.clone() }.into());
        }

        Ok(())
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn num_elements(&self) -> u32 {
        self.num_elements
    }

    pub fn num_ev(&self) -> u32 {
        self.num_ev
    }

    /// 상관 곱(product) 개수: `n(n+1)/2`
    pub fn num_prod(&self) -> u32 {
        frame::num_prod(self.num_elements)
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn buffer_depth(&self) -> u32 {
        self.buffer_depth
    }

    pub fn freq_ids(&self) -> &[u32] {
        &self.freq_ids
    }

    pub fn cpu_affinity(&self) -> &[u32] {
        &self.cpu_affinity
    }

    /// 프로세스 전용 파라미터를 조회합니다.
    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// 모든 키를 루트 레벨에 펼친 YAML 매핑으로 렌더링합니다.
    ///
    /// 파이프라인은 전역 파라미터를 설정 문서의 루트에서 찾습니다.
    pub fn to_yaml_mapping(&self) -> serde_yaml::Mapping {
        let mut map = serde_yaml::Mapping::new();
        map.insert("log_level".into(), self.log_level.clone().into());
        map.insert("num_elements".into(), u64::from(self.num_elements).into());
        map.insert("num_ev".into(), u64::from(self.num_ev).into());
        map.insert("total_frames".into(), self.total_frames.into());
        map.insert("buffer_depth".into(), u64::from(self.buffer_depth).into());
        map.insert("freq_ids".into(), u32_sequence(&self.freq_ids));
        map.insert("cpu_affinity".into(), u32_sequence(&self.cpu_affinity));
        for (key, value) in &self.params {
            map.insert(key.clone().into(), value.to_yaml());
        }
        map
    }
}

fn u32_sequence(values: &[u32]) -> serde_yaml::Value {
    serde_yaml::Value::Sequence(values.iter().map(|&v| u64::from(v).into()).collect())
}

fn invalid(field: &str, reason: String) -> RunnerError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// serde의 "unknown field `x`" 메시지에서 필드 이름을 추출합니다.
fn unknown_field_name(message: &str) -> Option<String> {
    let rest = message.split("unknown field `").nth(1)?;
    let end = rest.find('`')?;
    Some(rest[..end].to_owned())
}

/// 전역 설정 빌더
///
/// 설정 중 발생한 첫 번째 에러를 기억했다가 [`build`](Self::build)에서 반환합니다.
#[derive(Debug)]
pub struct GlobalConfigBuilder {
    config: GlobalConfig,
    error: Option<ConfigError>,
}

impl Default for GlobalConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalConfigBuilder {
    /// 기본 템플릿으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
            error: None,
        }
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.log_level = level.to_owned();
        self
    }

    pub fn num_elements(mut self, n: u32) -> Self {
        self.config.num_elements = n;
        self
    }

    pub fn num_ev(mut self, n: u32) -> Self {
        self.config.num_ev = n;
        self
    }

    pub fn total_frames(mut self, n: u64) -> Self {
        self.config.total_frames = n;
        self
    }

    pub fn buffer_depth(mut self, depth: u32) -> Self {
        self.config.buffer_depth = depth;
        self
    }

    pub fn freq_ids(mut self, ids: Vec<u32>) -> Self {
        self.config.freq_ids = ids;
        self
    }

    pub fn cpu_affinity(mut self, cores: Vec<u32>) -> Self {
        self.config.cpu_affinity = cores;
        self
    }

    /// 프로세스 전용 파라미터를 선언합니다.
    ///
    /// 인식되는 키와 같은 이름이거나 이미 선언된 키면 `DuplicateKey` 에러가 됩니다.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let key = key.into();
        if RECOGNIZED_KEYS.contains(&key.as_str()) || self.config.params.contains_key(&key) {
            self.record(ConfigError::DuplicateKey { key });
            return self;
        }
        self.config.params.insert(key, value.into());
        self
    }

    fn set_recognized(mut self, key: &str, value: ParamValue) -> Self {
        let result = match key {
            "log_level" => as_string(key, &value).map(|v| self.config.log_level = v),
            "num_elements" => as_u32(key, &value).map(|v| self.config.num_elements = v),
            "num_ev" => as_u32(key, &value).map(|v| self.config.num_ev = v),
            "total_frames" => as_u64(key, &value).map(|v| self.config.total_frames = v),
            "buffer_depth" => as_u32(key, &value).map(|v| self.config.buffer_depth = v),
            "freq_ids" => as_u32_list(key, &value).map(|v| self.config.freq_ids = v),
            "cpu_affinity" => as_u32_list(key, &value).map(|v| self.config.cpu_affinity = v),
            other => Err(ConfigError::UnknownKey {
                key: other.to_owned(),
            }),
        };
        if let Err(e) = result {
            self.record(e);
        }
        self
    }

    fn record(&mut self, err: ConfigError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// 설정을 검증하고 완성합니다.
    pub fn build(self) -> Result<GlobalConfig, RunnerError> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

fn type_error(key: &str, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: key.to_owned(),
        reason: format!("expected {expected}"),
    }
}

fn as_string(key: &str, value: &ParamValue) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| type_error(key, "a string"))
}

fn as_u64(key: &str, value: &ParamValue) -> Result<u64, ConfigError> {
    value
        .as_i64()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| type_error(key, "a non-negative integer"))
}

fn as_u32(key: &str, value: &ParamValue) -> Result<u32, ConfigError> {
    value
        .as_i64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| type_error(key, "a non-negative 32-bit integer"))
}

fn as_u32_list(key: &str, value: &ParamValue) -> Result<Vec<u32>, ConfigError> {
    match value {
        ParamValue::List(items) => items.iter().map(|item| as_u32(key, item)).collect(),
        _ => Err(type_error(key, "a list of integers")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        let config = GlobalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_elements(), 10);
        assert_eq!(config.buffer_depth(), 4);
        assert_eq!(config.freq_ids(), &[0]);
    }

    #[test]
    fn builder_merges_overrides_over_defaults() {
        let config = GlobalConfig::builder()
            .num_elements(7)
            .total_frames(128)
            .build()
            .unwrap();
        assert_eq!(config.num_elements(), 7);
        assert_eq!(config.total_frames(), 128);
        // 오버라이드하지 않은 키는 기본값 유지
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.num_prod(), 28);
    }

    #[test]
    fn declared_param_is_kept() {
        let config = GlobalConfig::builder()
            .param("variable_my_process_needs", -1)
            .build()
            .unwrap();
        assert_eq!(
            config.param("variable_my_process_needs"),
            Some(&ParamValue::Int(-1))
        );
    }

    #[test]
    fn param_shadowing_recognized_key_is_rejected() {
        let err = GlobalConfig::builder()
            .param("num_elements", 3)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Config(ConfigError::DuplicateKey { ref key }) if key == "num_elements"
        ));
    }

    #[test]
    fn param_declared_twice_is_rejected() {
        let err = GlobalConfig::builder()
            .param("gain", 1)
            .param("gain", 2)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Config(ConfigError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn from_mapping_rejects_undeclared_key() {
        let map = mapping(&[
            ("num_elements", ParamValue::Int(7)),
            ("variable_my_process_needs", ParamValue::Int(-1)),
        ]);
        let err = GlobalConfig::from_mapping(map, &[]).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Config(ConfigError::UnknownKey { ref key }) if key == "variable_my_process_needs"
        ));
    }

    #[test]
    fn from_mapping_accepts_declared_key() {
        let map = mapping(&[
            ("num_elements", ParamValue::Int(7)),
            ("num_ev", ParamValue::Int(0)),
            ("total_frames", ParamValue::Int(128)),
            ("variable_my_process_needs", ParamValue::Int(-1)),
        ]);
        let config = GlobalConfig::from_mapping(map, &["variable_my_process_needs"]).unwrap();
        assert_eq!(config.num_elements(), 7);
        assert_eq!(config.total_frames(), 128);
        assert!(config.param("variable_my_process_needs").is_some());
    }

    #[test]
    fn from_mapping_rejects_wrong_type() {
        let map = mapping(&[("num_elements", ParamValue::Str("seven".to_owned()))]);
        let err = GlobalConfig::from_mapping(map, &[]).unwrap_err();
        assert!(err.to_string().contains("num_elements"));
    }

    #[test]
    fn validate_rejects_num_ev_above_num_elements() {
        let err = GlobalConfig::builder()
            .num_elements(4)
            .num_ev(5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("num_ev"));
    }

    #[test]
    fn validate_rejects_oversized_num_elements() {
        let err = GlobalConfig::builder()
            .num_elements(MAX_NUM_ELEMENTS + 1)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("num_elements"));

        let config = GlobalConfig::builder()
            .num_elements(MAX_NUM_ELEMENTS)
            .build()
            .unwrap();
        assert_eq!(config.num_prod(), 2_147_450_880);
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let err = GlobalConfig::builder()
            .log_level("verbose")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_out_of_range_freq_id() {
        let err = GlobalConfig::builder()
            .freq_ids(vec![0, 2048])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("2048"));
    }

    #[test]
    fn parse_toml_with_params_table() {
        let config = GlobalConfig::parse(
            r#"
num_elements = 7
total_frames = 128

[params]
variable_my_process_needs = -1
"#,
        )
        .unwrap();
        assert_eq!(config.num_elements(), 7);
        assert_eq!(
            config.param("variable_my_process_needs"),
            Some(&ParamValue::Int(-1))
        );
    }

    #[test]
    fn parse_toml_rejects_unknown_root_key() {
        let err = GlobalConfig::parse("num_elemnts = 7\n").unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Config(ConfigError::UnknownKey { ref key }) if key == "num_elemnts"
        ));
    }

    #[test]
    fn yaml_mapping_is_flat() {
        let config = GlobalConfig::builder()
            .num_elements(7)
            .param("variable_my_process_needs", -1)
            .build()
            .unwrap();
        let map = config.to_yaml_mapping();
        assert_eq!(
            map.get("num_elements").and_then(|v| v.as_u64()),
            Some(7)
        );
        assert_eq!(
            map.get("variable_my_process_needs").and_then(|v| v.as_i64()),
            Some(-1)
        );
        assert!(map.get("params").is_none());
    }
}
