//! 실행기 — 설정 문서를 조립하고 파이프라인을 실행
//!
//! [`KotekanRunner`]는 버퍼 협력자와 프로세스 블록으로 설정 문서를 만든 뒤
//! 실행 파일을 띄웁니다. [`KotekanProcessTester`]는 프로세스 하나를 입력/출력
//! 버퍼 사이에 연결하는 단축형입니다.
//!
//! # 설정 문서 구조
//! ```text
//! log_level: info          # 전역 키는 루트에
//! num_elements: 7
//! ...
//! vis_pool:                # 메타데이터 풀
//!   kotekan_metadata_pool: visMetadata
//! fakevis_buf0:            # 버퍼 블록
//!   kotekan_buffer: vis
//! fakevis0:                # 프로세스 블록
//!   kotekan_process: fakeVis
//! ```

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use kotekan_runner_core::config::GlobalConfig;
use kotekan_runner_core::error::{ConfigError, ProcessError, RunnerError};

use crate::buffers::{Block, InputBuffer, METADATA_POOL, OutputBuffer};
use crate::settings::RunnerSettings;
use crate::supervisor;
use crate::workdir::Workdir;

/// 실행 디렉토리에 기록되는 설정 파일 이름
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// 테스트 대상 프로세스와 버퍼를 잇는 키
const WIRING_KEYS: &[&str] = &["kotekan_process", "in_buf", "in_bufs", "out_buf"];

/// 버퍼 하나당 할당하는 메타데이터 객체 수 (`buffer_depth` 배수)
const METADATA_OBJECTS_PER_BUFFER: u64 = 2;

/// 파이프라인 실행기
pub struct KotekanRunner<'a> {
    inputs: Vec<&'a dyn InputBuffer>,
    output: Option<&'a dyn OutputBuffer>,
    processes: Vec<Block>,
    config: GlobalConfig,
    settings: RunnerSettings,
}

impl<'a> KotekanRunner<'a> {
    /// 실행기를 생성합니다.
    ///
    /// 하네스 설정은 [`RunnerSettings::load`]로 읽습니다.
    pub fn new(
        inputs: Vec<&'a dyn InputBuffer>,
        output: Option<&'a dyn OutputBuffer>,
        processes: Vec<Block>,
        config: &GlobalConfig,
    ) -> Result<Self, RunnerError> {
        Ok(Self {
            inputs,
            output,
            processes,
            config: config.clone(),
            settings: RunnerSettings::load()?,
        })
    }

    /// 하네스 설정을 교체합니다.
    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// 실행 디렉토리 기준으로 설정 문서를 조립합니다.
    pub fn config_document(&self, run_dir: &Path) -> Result<Mapping, RunnerError> {
        let mut doc = self.config.to_yaml_mapping();
        if let Some(level) = &self.settings.log_level {
            doc.insert("log_level".into(), level.clone().into());
        }

        let num_buffers = self.inputs.len() + usize::from(self.output.is_some());
        let mut pool = Mapping::new();
        pool.insert("kotekan_metadata_pool".into(), "visMetadata".into());
        pool.insert(
            "num_metadata_objects".into(),
            (METADATA_OBJECTS_PER_BUFFER
                * u64::from(self.config.buffer_depth())
                * num_buffers.max(1) as u64)
                .into(),
        );
        insert_block(&mut doc, (METADATA_POOL.to_owned(), pool))?;

        for input in &self.inputs {
            insert_block(&mut doc, input.buffer_block())?;
            for block in input.process_blocks(run_dir) {
                insert_block(&mut doc, block)?;
            }
        }
        if let Some(output) = self.output {
            insert_block(&mut doc, output.buffer_block())?;
            for block in output.process_blocks(run_dir) {
                insert_block(&mut doc, block)?;
            }
        }
        for block in &self.processes {
            insert_block(&mut doc, block.clone())?;
        }

        Ok(doc)
    }

    /// 설정 문서를 YAML 문자열로 렌더링합니다.
    pub fn render_config(&self, run_dir: &Path) -> Result<String, RunnerError> {
        let doc = self.config_document(run_dir)?;
        serde_yaml::to_string(&Value::Mapping(doc)).map_err(|e| {
            ConfigError::RenderFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// 파이프라인을 동기적으로 실행합니다.
    ///
    /// 내부에서 전용 런타임을 만들기 때문에 async 컨텍스트 안에서는
    /// [`run_async`](Self::run_async)를 사용해야 합니다.
    pub fn run(&self) -> Result<(), RunnerError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ProcessError::LaunchFailed {
                binary: self.settings.binary.display().to_string(),
                reason: "run() called inside an async runtime, use run_async()".to_owned(),
            }
            .into());
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run_async())
    }

    /// 파이프라인을 실행하고 종료를 기다립니다.
    pub async fn run_async(&self) -> Result<(), RunnerError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("kotekan_run", %run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<(), RunnerError> {
        // 출력 디렉토리가 없으면 실행기 소유의 작업 디렉토리 사용
        let mut scratch = None;
        let run_dir: PathBuf = match self.output.and_then(|o| o.output_dir()) {
            Some(dir) => dir.to_path_buf(),
            None => {
                let mut workdir = Workdir::new("kotekan_run")?;
                if self.settings.keep_workdir {
                    workdir.keep();
                }
                let path = workdir.path().to_path_buf();
                scratch = Some(workdir);
                path
            }
        };

        for input in &self.inputs {
            input.prepare(&run_dir)?;
        }

        let config_path = run_dir.join(CONFIG_FILE_NAME);
        let rendered = self.render_config(&run_dir)?;
        tokio::fs::write(&config_path, rendered).await?;
        debug!(path = %config_path.display(), "wrote pipeline config");

        info!(
            run_dir = %run_dir.display(),
            inputs = self.inputs.len(),
            processes = self.processes.len(),
            "running pipeline"
        );
        let result = supervisor::run_pipeline(&self.settings, &config_path, &run_dir).await;
        drop(scratch);
        result
    }
}

fn insert_block(doc: &mut Mapping, (name, block): Block) -> Result<(), RunnerError> {
    let key = Value::String(name);
    if doc.contains_key(&key) {
        let key = key.as_str().unwrap_or_default().to_owned();
        return Err(ConfigError::DuplicateKey { key }.into());
    }
    doc.insert(key, Value::Mapping(block));
    Ok(())
}

/// 프로세스 하나를 입력/출력 버퍼 사이에 연결해 실행하는 테스터
pub struct KotekanProcessTester<'a> {
    runner: KotekanRunner<'a>,
    process_name: String,
}

impl<'a> KotekanProcessTester<'a> {
    /// 입력 버퍼 하나와 출력 버퍼 하나로 테스터를 생성합니다.
    ///
    /// 테스트 대상 프로세스는 `<process_type>_test` 블록에 놓입니다.
    pub fn new(
        process_type: &str,
        process_config: Mapping,
        input: &'a dyn InputBuffer,
        output: &'a dyn OutputBuffer,
        global: &GlobalConfig,
    ) -> Result<Self, RunnerError> {
        Self::with_buffers(process_type, process_config, vec![input], Some(output), global)
    }

    /// 입력 버퍼 여러 개(또는 0개)와 선택적 출력 버퍼로 테스터를 생성합니다.
    ///
    /// 입력이 하나면 `in_buf`, 여럿이면 `in_bufs`로 연결됩니다.
    pub fn with_buffers(
        process_type: &str,
        process_config: Mapping,
        inputs: Vec<&'a dyn InputBuffer>,
        output: Option<&'a dyn OutputBuffer>,
        global: &GlobalConfig,
    ) -> Result<Self, RunnerError> {
        if let Some(key) = WIRING_KEYS
            .iter()
            .find(|k| process_config.contains_key(**k))
        {
            return Err(ConfigError::DuplicateKey {
                key: (*key).to_owned(),
            }
            .into());
        }

        let mut block = process_config;
        block.insert("kotekan_process".into(), process_type.into());
        match inputs.as_slice() {
            [] => {}
            [single] => {
                block.insert("in_buf".into(), single.name().into());
            }
            many => {
                block.insert(
                    "in_bufs".into(),
                    Value::Sequence(many.iter().map(|b| b.name().into()).collect()),
                );
            }
        }
        if let Some(output) = output {
            block.insert("out_buf".into(), output.name().into());
        }

        let process_name = format!("{process_type}_test");
        let runner = KotekanRunner::new(
            inputs,
            output,
            vec![(process_name.clone(), block)],
            global,
        )?;
        Ok(Self {
            runner,
            process_name,
        })
    }

    /// 하네스 설정을 교체합니다.
    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.runner = self.runner.with_settings(settings);
        self
    }

    /// 테스트 대상 프로세스 블록 이름
    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn runner(&self) -> &KotekanRunner<'a> {
        &self.runner
    }

    pub fn config_document(&self, run_dir: &Path) -> Result<Mapping, RunnerError> {
        self.runner.config_document(run_dir)
    }

    pub fn run(&self) -> Result<(), RunnerError> {
        self.runner.run()
    }

    pub async fn run_async(&self) -> Result<(), RunnerError> {
        self.runner.run_async().await
    }
}
