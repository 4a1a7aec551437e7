/// チャットクライアントの設定ファイル
///
/// `.bedrock/agent-chat.json` の読み込みと、コマンドライン引数による上書きを扱う。
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::assembler::AssemblerOptions;
use crate::directory::DEFAULT_ALIAS_PAGE_SIZE;
use crate::error::AgentError;

/// `list_agent_aliases` の `maxResults` の上限
const MAX_ALIAS_PAGE_SIZE: i32 = 1000;

/// 設定ファイルのルート構造
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// リージョン（オプション）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// AWS プロファイル名（オプション）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// エージェントの推論過程を表示するかどうか
    pub show_rationale: bool,

    /// エージェントごとに取得するエイリアスの数
    pub alias_page_size: i32,

    /// 単語ごとの表示間隔（ミリ秒）
    pub word_delay_ms: u64,

    /// observation ごとの待ち時間（ミリ秒）
    pub observation_pause_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            show_rationale: true,
            alias_page_size: DEFAULT_ALIAS_PAGE_SIZE,
            word_delay_ms: 20,
            observation_pause_ms: 500,
        }
    }
}

impl ChatConfig {
    /// 設定ファイルを読み込む
    ///
    /// # Errors
    /// ファイルの読み込み、パース、値の検証に失敗した場合
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            AgentError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ChatConfig = serde_json::from_str(&content).map_err(|e| {
            AgentError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// デフォルトの設定ファイルパスを取得
    ///
    /// 以下の順序で検索：
    /// 1. `.bedrock/agent-chat.json`
    /// 2. `agent-chat.json`（カレントディレクトリ）
    pub fn default_path() -> Option<PathBuf> {
        [".bedrock/agent-chat.json", "agent-chat.json"]
            .into_iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// デフォルトパスから設定を読み込む。見つからない場合は既定値
    pub fn load_default() -> Result<Self, AgentError> {
        match Self::default_path() {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if !(1..=MAX_ALIAS_PAGE_SIZE).contains(&self.alias_page_size) {
            return Err(AgentError::ConfigError(format!(
                "aliasPageSize must be between 1 and {}, got {}",
                MAX_ALIAS_PAGE_SIZE, self.alias_page_size
            )));
        }
        Ok(())
    }

    /// コマンドライン引数で上書きする（`None` の項目はそのまま）
    pub fn with_overrides(
        mut self,
        profile: Option<String>,
        region: Option<String>,
        hide_rationale: bool,
    ) -> Self {
        if profile.is_some() {
            self.profile = profile;
        }
        if region.is_some() {
            self.region = region;
        }
        if hide_rationale {
            self.show_rationale = false;
        }
        self
    }

    pub fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            show_rationale: self.show_rationale,
            word_delay: Duration::from_millis(self.word_delay_ms),
            observation_pause: Duration::from_millis(self.observation_pause_ms),
        }
    }
}
