//! Bedrock Agents のトレースイベントのデコード
//!
//! `invoke_agent` のレスポンスストリームに流れるトレースを
//! `{"trace": {"<category>": {...}}}` 形式の JSON として扱い、
//! トークン使用量と表示対象テキスト（rationale / final response）を取り出す。
use serde::Deserialize;
use serde_json::Value;

/// トレースのデコードエラー
#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("trace bytes are not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("malformed trace document: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// ストリームイベントが運ぶトレースのペイロード
#[derive(Debug, Clone, PartialEq)]
pub enum TracePayload {
    /// UTF-8 の JSON バイト列
    Bytes(Vec<u8>),
    /// JSON 文字列
    Text(String),
    /// デコード済みの JSON
    Document(Value),
}

/// レスポンスストリームの 1 イベント
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionEvent {
    pub trace: Option<TracePayload>,
}

impl CompletionEvent {
    pub fn trace(payload: TracePayload) -> Self {
        Self {
            trace: Some(payload),
        }
    }
}

/// トークン使用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// デコード済みのトレースドキュメント
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceDocument {
    #[serde(default)]
    trace: Option<TraceCategories>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceCategories {
    post_processing_trace: Option<CategoryTrace>,
    orchestration_trace: Option<CategoryTrace>,
    pre_processing_trace: Option<CategoryTrace>,
    routing_classifier_trace: Option<CategoryTrace>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryTrace {
    model_invocation_output: Option<ModelInvocationOutput>,
    rationale: Option<Rationale>,
    observation: Option<Observation>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelInvocationOutput {
    metadata: InvocationMetadata,
}

#[derive(Debug, Clone, Deserialize)]
struct InvocationMetadata {
    usage: TokenUsage,
}

#[derive(Debug, Clone, Deserialize)]
struct Rationale {
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    final_response: Option<FinalResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct FinalResponse {
    text: String,
}

/// トレースから取り出した表示ステップ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceStep {
    /// エージェントの推論過程
    Rationale(String),
    /// observation。final response があればそのテキストを持つ
    Observation(Option<String>),
}

/// 1 トレース分の解析結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceDigest {
    pub usage: TokenUsage,
    pub steps: Vec<TraceStep>,
}

impl TraceDocument {
    /// ペイロードをデコードする
    pub fn decode(payload: &TracePayload) -> Result<Self, TraceError> {
        let document: Self = match payload {
            TracePayload::Bytes(bytes) => serde_json::from_str(std::str::from_utf8(bytes)?)?,
            TracePayload::Text(text) => serde_json::from_str(text)?,
            TracePayload::Document(value) => Self::deserialize(value)?,
        };
        Ok(document)
    }

    /// 使用量と表示ステップを取り出す
    ///
    /// カテゴリは post-processing, orchestration, pre-processing,
    /// routing-classifier の順に全て調べる。1 カテゴリ内では rationale
    /// （表示が有効な場合のみ）が observation より優先される。
    pub fn digest(&self, show_rationale: bool) -> TraceDigest {
        let mut digest = TraceDigest::default();
        let Some(categories) = &self.trace else {
            return digest;
        };

        for category in categories.in_checked_order().into_iter().flatten() {
            if let Some(output) = &category.model_invocation_output {
                digest.usage += output.metadata.usage;
            }

            match (&category.rationale, &category.observation) {
                (Some(rationale), _) if show_rationale => {
                    digest.steps.push(TraceStep::Rationale(rationale.text.clone()));
                }
                (_, Some(observation)) => {
                    let text = observation.final_response.as_ref().map(|r| r.text.clone());
                    digest.steps.push(TraceStep::Observation(text));
                }
                _ => {}
            }
        }

        digest
    }
}

impl TraceCategories {
    fn in_checked_order(&self) -> [Option<&CategoryTrace>; 4] {
        [
            self.post_processing_trace.as_ref(),
            self.orchestration_trace.as_ref(),
            self.pre_processing_trace.as_ref(),
            self.routing_classifier_trace.as_ref(),
        ]
    }
}
