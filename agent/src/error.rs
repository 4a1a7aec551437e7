/// agent クレート共通のエラー型
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    #[error("AWS SDK error: {0}")]
    AwsSdkError(String),

    #[error("Event stream error: {0}")]
    StreamError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Unknown alias {alias_id} for agent {agent_id}")]
    UnknownAlias { agent_id: String, alias_id: String },

    #[error("No agent selected")]
    NoAgentSelected,
}

impl AgentError {
    /// SDK のエラーを、原因チェーンを含めた文字列に変換する
    pub fn from_sdk<E>(err: E) -> Self
    where
        E: std::error::Error,
    {
        AgentError::AwsSdkError(error_context(err))
    }

    /// イベントストリーム受信中の SDK エラーを変換する
    pub fn from_stream<E>(err: E) -> Self
    where
        E: std::error::Error,
    {
        AgentError::StreamError(error_context(err))
    }
}

fn error_context<E: std::error::Error>(err: E) -> String {
    aws_smithy_types::error::display::DisplayErrorContext(err).to_string()
}
