use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    /// `None` means generation always takes the fallback path.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub output_dir: PathBuf,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests never touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid BIND_ADDR: {}", e))?;

        let timeout_secs = match var("LLM_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("invalid LLM_TIMEOUT_SECS {:?}: {}", raw, e))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(AppConfig {
            bind_addr,
            output_dir: PathBuf::from(
                var("EBOOK_OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
            llm: LlmConfig {
                api_key: var("LLM_API_KEY"),
                api_url: var("LLM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout_secs,
            },
        })
    }
}
