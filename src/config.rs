//! Configuração do conductor carregada de `conductor.toml`.
//!
//! [`ConductorConfig`] reúne os parâmetros ajustáveis: endereço da API, quantas
//! chains rodam ao mesmo tempo, URL usada pelo cliente de polling e uma tabela por
//! estágio remoto. Chaves ausentes caem nos valores padrão; as URLs podem ser
//! sobrescritas por variáveis de ambiente.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::error::ConductorError;
use crate::planner::StageKind;

const CONFIG_FILE: &str = "conductor.toml";

/// Connection and retry settings for one remote stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    pub url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl StageConfig {
    fn new(url: &str, timeout_secs: u64, max_retries: u32, retry_delay_secs: u64) -> Self {
        Self {
            url: url.to_string(),
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            retry_delay: Duration::from_secs(retry_delay_secs),
        }
    }

    fn merge(&mut self, table: StageTable) {
        if let Some(url) = table.url {
            self.url = url;
        }
        if let Some(secs) = table.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = table.max_retries {
            self.max_retries = retries;
        }
        if let Some(secs) = table.retry_delay_secs {
            self.retry_delay = Duration::from_secs(secs);
        }
    }
}

/// Per-stage settings. Generation gets the longest timeout and retry delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagesConfig {
    pub parse: StageConfig,
    pub analyze: StageConfig,
    pub generate: StageConfig,
    pub master: StageConfig,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            parse: StageConfig::new("http://prompt-parser:8000/api/v1/parse", 30, 3, 10),
            analyze: StageConfig::new("http://style-analysis:8000/analyze/", 60, 3, 10),
            generate: StageConfig::new("http://sound-generation:8000/generate", 300, 3, 60),
            master: StageConfig::new("http://mixing-mastering:8000/process", 180, 3, 30),
        }
    }
}

impl StagesConfig {
    /// Settings for a remote stage; `None` for stages that run in-process.
    pub fn get(&self, kind: StageKind) -> Option<&StageConfig> {
        match kind {
            StageKind::Parse => Some(&self.parse),
            StageKind::Analyze => Some(&self.analyze),
            StageKind::Generate => Some(&self.generate),
            StageKind::Master => Some(&self.master),
            StageKind::Finalize => None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct ConductorConfig {
    /// Endereço onde a API HTTP escuta.
    pub bind: String,
    /// Número de chains executadas em paralelo.
    pub workers: usize,
    /// Base URL the polling client talks to.
    pub orchestrator_url: String,
    /// Segundos entre consultas de status.
    pub poll_interval_secs: u64,
    pub stages: StagesConfig,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            workers: 4,
            orchestrator_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_secs: 5,
            stages: StagesConfig::default(),
        }
    }
}

// On-disk shape; every key optional so partial files merge onto defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    bind: Option<String>,
    workers: Option<usize>,
    orchestrator_url: Option<String>,
    poll_interval_secs: Option<u64>,
    #[serde(default)]
    stages: StagesFile,
}

#[derive(Debug, Default, Deserialize)]
struct StagesFile {
    parse: Option<StageTable>,
    analyze: Option<StageTable>,
    generate: Option<StageTable>,
    master: Option<StageTable>,
}

#[derive(Debug, Default, Deserialize)]
struct StageTable {
    url: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_secs: Option<u64>,
}

impl ConductorConfig {
    /// Carrega `conductor.toml` do diretório atual, ou de `path` se informado.
    /// Usa os valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        let mut config = Self::default();

        if let Some(bind) = file.bind {
            config.bind = bind;
        }
        if let Some(workers) = file.workers {
            config.workers = workers;
        }
        if let Some(url) = file.orchestrator_url {
            config.orchestrator_url = url;
        }
        if let Some(secs) = file.poll_interval_secs {
            config.poll_interval_secs = secs;
        }

        let stages = &mut config.stages;
        for (slot, table) in [
            (&mut stages.parse, file.stages.parse),
            (&mut stages.analyze, file.stages.analyze),
            (&mut stages.generate, file.stages.generate),
            (&mut stages.master, file.stages.master),
        ] {
            if let Some(table) = table {
                slot.merge(table);
            }
        }

        Ok(config)
    }

    /// Environment variables take precedence over the file for service URLs.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 5] = [
            ("PROMPT_PARSER_URL", &mut self.stages.parse.url),
            ("STYLE_ANALYSIS_URL", &mut self.stages.analyze.url),
            ("SOUND_GENERATION_URL", &mut self.stages.generate.url),
            ("MIXING_MASTERING_URL", &mut self.stages.master.url),
            ("ORCHESTRATOR_URL", &mut self.orchestrator_url),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
            }
        }
    }

    fn validate(&self) -> Result<(), ConductorError> {
        if self.workers == 0 {
            return Err(ConductorError::Config(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
