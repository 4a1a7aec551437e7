//! ストリーミングレスポンスの組み立て
//!
//! `invoke_agent` のトレースイベントを順に読み、表示用のテキストチャンクを
//! チャネル経由で呼び出し元へ流す。ストリームが正常に終わった場合のみ
//! メトリクスを公開する。
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::metrics::InvokeMetrics;
use crate::trace::{CompletionEvent, TokenUsage, TraceDocument, TraceStep};

/// rationale の前に表示するマーカー
pub const RATIONALE_LEAD_IN: &str = "\n💭 ";
/// final response の前に表示するマーカー
pub const ANSWER_LEAD_IN: &str = "\n\n💬 ";
/// completion ストリームが無い場合の通知
pub const NO_RESPONSE_NOTICE: &str = "⛔ No Response Text Available. Please try again later!!!";
const INVOKE_ERROR_PREFIX: &str = "⛔ Error invoking agent: ";
const PARSE_ERROR_PREFIX: &str = "⛔ Could not parse trace data: ";

const CHUNK_BUFFER: usize = 32;

/// `invoke_agent` に渡すリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    pub input_text: String,
}

/// トレースイベントの供給元（completion ストリーム）
#[async_trait]
pub trait TraceSource: Send {
    /// 次のイベントを受け取る。ストリームが閉じた場合は `None`
    async fn next_event(&mut self) -> Result<Option<CompletionEvent>, AgentError>;
}

/// エージェントの推論 API
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// トレースを有効にしてエージェントを呼び出す
    ///
    /// レスポンスに completion ストリームが含まれない場合は `Ok(None)` を返す。
    async fn invoke(
        &self,
        request: &InvokeRequest,
    ) -> Result<Option<Box<dyn TraceSource>>, AgentError>;
}

/// 表示とペーシングの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerOptions {
    pub show_rationale: bool,
    /// 単語ごとの待ち時間
    pub word_delay: Duration,
    /// observation を受け取るたびの待ち時間
    pub observation_pause: Duration,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            show_rationale: true,
            word_delay: Duration::from_millis(20),
            observation_pause: Duration::from_millis(500),
        }
    }
}

/// 正常終了した呼び出しの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeOutcome {
    pub metrics: InvokeMetrics,
    /// マーカーと rationale / final response を連結したテキスト
    pub response_text: String,
}

/// 呼び出しが終わった後に残るもの
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// 呼び出し元へ流したチャンクの連結
    pub transcript: String,
    /// メトリクスが公開されなかった場合は `None`
    pub outcome: Option<InvokeOutcome>,
}

/// 1 回の呼び出しのチャンクストリーム
///
/// ドロップするとプロデューサータスクを中断し、ネットワークストリームを解放する。
pub struct ResponseStream {
    chunks: mpsc::Receiver<String>,
    outcome: oneshot::Receiver<InvokeOutcome>,
    transcript: String,
    task: JoinHandle<()>,
}

impl ResponseStream {
    /// 次のチャンクを受け取る。ストリームが終わった場合は `None`
    pub async fn recv(&mut self) -> Option<String> {
        let chunk = self.chunks.recv().await?;
        self.transcript.push_str(&chunk);
        Some(chunk)
    }

    /// これまでに受け取ったチャンクの連結
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// 残りのチャンクを読み捨て、結果を返す
    pub async fn finish(mut self) -> StreamSummary {
        while self.recv().await.is_some() {}
        let outcome = (&mut self.outcome).await.ok();
        StreamSummary {
            transcript: std::mem::take(&mut self.transcript),
            outcome,
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// レスポンス組み立て器
pub struct ResponseAssembler<R> {
    runtime: Arc<R>,
    options: AssemblerOptions,
}

impl<R> ResponseAssembler<R>
where
    R: AgentRuntime + 'static,
{
    pub fn new(runtime: Arc<R>, options: AssemblerOptions) -> Self {
        Self { runtime, options }
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// rationale の表示を切り替える
    pub fn set_show_rationale(&mut self, show: bool) {
        self.options.show_rationale = show;
    }

    /// エージェントを呼び出し、チャンクストリームを返す
    ///
    /// セッション ID は呼び出しごとに新しく生成されるため、ターン間で
    /// エージェント側のセッションは共有されない。
    pub fn invoke(&self, agent_id: &str, agent_alias_id: &str, prompt: &str) -> ResponseStream {
        let request = InvokeRequest {
            agent_id: agent_id.to_string(),
            agent_alias_id: agent_alias_id.to_string(),
            session_id: new_session_id(),
            input_text: prompt.to_string(),
        };

        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_BUFFER);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let producer = Producer {
            chunks: chunk_tx,
            options: self.options.clone(),
        };
        let runtime = Arc::clone(&self.runtime);

        let task = tokio::spawn(async move {
            match producer.run(runtime.as_ref(), &request).await {
                Ok(Some(outcome)) => {
                    info!(
                        session_id = %request.session_id,
                        metrics = %outcome.metrics,
                        "agent invocation finished"
                    );
                    let _ = outcome_tx.send(outcome);
                }
                Ok(None) => {}
                Err(ConsumerGone) => {
                    debug!(session_id = %request.session_id, "response stream dropped by consumer");
                }
            }
        });

        ResponseStream {
            chunks: chunk_rx,
            outcome: outcome_rx,
            transcript: String::new(),
            task,
        }
    }
}

/// 呼び出しごとのセッション ID（例: `session-20250101120000-1a2b3c4d`）
pub fn new_session_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "session-{}-{}",
        Local::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

/// テキストを半角スペースで区切り、各単語の後ろにスペースを 1 つ付けたチャンクにする
///
/// 区切りは半角スペースのみ。改行はチャンク内にそのまま残る。
pub fn word_chunks(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(' ')
        .filter(|word| !word.is_empty())
        .map(|word| format!("{} ", word))
}

/// 消費側がいなくなったことを表す
struct ConsumerGone;

impl<T> From<mpsc::error::SendError<T>> for ConsumerGone {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        ConsumerGone
    }
}

struct Producer {
    chunks: mpsc::Sender<String>,
    options: AssemblerOptions,
}

impl Producer {
    async fn run<R>(
        &self,
        runtime: &R,
        request: &InvokeRequest,
    ) -> Result<Option<InvokeOutcome>, ConsumerGone>
    where
        R: AgentRuntime + ?Sized,
    {
        let started = Instant::now();
        info!(
            agent_id = %request.agent_id,
            agent_alias_id = %request.agent_alias_id,
            session_id = %request.session_id,
            "invoking agent"
        );

        let mut source = match runtime.invoke(request).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                warn!(session_id = %request.session_id, "response has no completion stream");
                self.emit_words(NO_RESPONSE_NOTICE).await?;
                return Ok(None);
            }
            Err(e) => {
                warn!(session_id = %request.session_id, error = %e, "agent invocation failed");
                self.emit_words(&format!("{}{}", INVOKE_ERROR_PREFIX, e)).await?;
                return Ok(None);
            }
        };

        let mut usage = TokenUsage::default();
        let mut response_text = String::new();

        loop {
            let event = match source.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    warn!(session_id = %request.session_id, error = %e, "completion stream failed");
                    self.emit_words(&format!("{}{}", INVOKE_ERROR_PREFIX, e)).await?;
                    return Ok(None);
                }
            };

            let Some(payload) = event.trace else {
                continue;
            };

            let document = match TraceDocument::decode(&payload) {
                Ok(document) => document,
                Err(e) => {
                    warn!(error = %e, "could not parse trace data");
                    self.emit_words(&format!("{}{}", PARSE_ERROR_PREFIX, e)).await?;
                    continue;
                }
            };

            let digest = document.digest(self.options.show_rationale);
            debug!(?digest, "trace event");
            usage += digest.usage;

            for step in digest.steps {
                match step {
                    TraceStep::Rationale(text) => {
                        self.emit_section(RATIONALE_LEAD_IN, &text, &mut response_text)
                            .await?;
                    }
                    TraceStep::Observation(final_response) => {
                        pause(self.options.observation_pause).await;
                        if let Some(text) = final_response {
                            self.emit_section(ANSWER_LEAD_IN, &text, &mut response_text)
                                .await?;
                        }
                    }
                }
            }
        }

        debug!(response = %response_text, "full response");
        Ok(Some(InvokeOutcome {
            metrics: InvokeMetrics::new(started.elapsed(), usage),
            response_text,
        }))
    }

    async fn emit_section(
        &self,
        lead_in: &str,
        text: &str,
        response_text: &mut String,
    ) -> Result<(), ConsumerGone> {
        response_text.push_str(lead_in);
        self.chunks.send(lead_in.to_string()).await?;
        response_text.push_str(text);
        self.emit_words(text).await
    }

    async fn emit_words(&self, text: &str) -> Result<(), ConsumerGone> {
        for chunk in word_chunks(text) {
            self.chunks.send(chunk).await?;
            pause(self.options.word_delay).await;
        }
        Ok(())
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}
