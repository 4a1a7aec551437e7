use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::{self, BehaviorVersion};
use aws_sdk_bedrockagent::Client as ManagementClient;
use aws_sdk_bedrockagentruntime::Client as RuntimeClient;
use aws_sdk_bedrockagentruntime::operation::invoke_agent::InvokeAgentOutput;
use aws_sdk_bedrockagentruntime::types::{
    Metadata, Observation, OrchestrationTrace, PostProcessingTrace, PreProcessingTrace,
    ResponseStream, RoutingClassifierTrace, Trace, TracePart,
};
use serde_json::{Map, Value, json};

use crate::assembler::{AgentRuntime, InvokeRequest, TraceSource};
use crate::directory::{AgentCatalog, AgentSummary, AliasSummary};
use crate::error::AgentError;
use crate::trace::{CompletionEvent, TracePayload};

/// リージョンが解決できない場合に使用するリージョン
const FALLBACK_REGION: &str = "us-east-1";

/// Agent クライアント構造体
///
/// Bedrock Agents の管理 API（エージェント・エイリアスの一覧）と
/// ランタイム API（`invoke_agent`）をまとめて扱う。
/// 会話履歴や表示は持たず、`AgentCatalog` / `AgentRuntime` として利用される。
pub struct AgentClient {
    management: ManagementClient,
    runtime: RuntimeClient,
}

impl AgentClient {
    /// 新しい AgentClient を作成する
    ///
    /// # Arguments
    /// * `profile` - 使用する AWS プロファイル名（オプション）
    /// * `region` - リージョン（オプション）。指定しない場合はデフォルトプロファイルの設定またはus-east-1を使用
    pub async fn new(profile: Option<String>, region: Option<String>) -> Result<Self, AgentError> {
        let region_provider = RegionProviderChain::first_try(region.map(aws_config::Region::new))
            .or_default_provider()
            .or_else(aws_config::Region::new(FALLBACK_REGION));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        Ok(Self {
            management: ManagementClient::new(&config),
            runtime: RuntimeClient::new(&config),
        })
    }
}

#[async_trait]
impl AgentCatalog for AgentClient {
    async fn list_agents(&self) -> Result<Vec<AgentSummary>, AgentError> {
        let output = self
            .management
            .list_agents()
            .send()
            .await
            .map_err(AgentError::from_sdk)?;

        Ok(output
            .agent_summaries()
            .iter()
            .map(|summary| AgentSummary {
                agent_id: summary.agent_id().to_string(),
                agent_name: summary.agent_name().to_string(),
            })
            .collect())
    }

    async fn agent_collaboration(&self, agent_id: &str) -> Result<Option<String>, AgentError> {
        let output = self
            .management
            .get_agent()
            .agent_id(agent_id)
            .send()
            .await
            .map_err(AgentError::from_sdk)?;

        Ok(output
            .agent()
            .and_then(|agent| agent.agent_collaboration())
            .map(|collaboration| collaboration.as_str().to_string()))
    }

    async fn list_agent_aliases(
        &self,
        agent_id: &str,
        max_results: i32,
    ) -> Result<Vec<AliasSummary>, AgentError> {
        let output = self
            .management
            .list_agent_aliases()
            .agent_id(agent_id)
            .max_results(max_results)
            .send()
            .await
            .map_err(AgentError::from_sdk)?;

        Ok(output
            .agent_alias_summaries()
            .iter()
            .map(|alias| AliasSummary {
                agent_alias_id: alias.agent_alias_id().to_string(),
                agent_alias_name: alias.agent_alias_name().to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl AgentRuntime for AgentClient {
    async fn invoke(
        &self,
        request: &InvokeRequest,
    ) -> Result<Option<Box<dyn TraceSource>>, AgentError> {
        let output = self
            .runtime
            .invoke_agent()
            .agent_id(&request.agent_id)
            .agent_alias_id(&request.agent_alias_id)
            .session_id(&request.session_id)
            .input_text(&request.input_text)
            .enable_trace(true)
            .send()
            .await
            .map_err(AgentError::from_sdk)?;

        Ok(Some(Box::new(SdkCompletion { output })))
    }
}

/// SDK の completion ストリーム
struct SdkCompletion {
    output: InvokeAgentOutput,
}

#[async_trait]
impl TraceSource for SdkCompletion {
    async fn next_event(&mut self) -> Result<Option<CompletionEvent>, AgentError> {
        let event = self
            .output
            .completion
            .recv()
            .await
            .map_err(AgentError::from_stream)?;

        Ok(event.map(|event| match event {
            ResponseStream::Trace(part) => {
                CompletionEvent::trace(TracePayload::Document(trace_document(&part)))
            }
            // 本文は final response のトレースからも得られるため、チャンクは使わない
            _ => CompletionEvent::default(),
        }))
    }
}

/// SDK のトレースを `{"trace": {"<category>": {...}}}` 形式の JSON に変換する
fn trace_document(part: &TracePart) -> Value {
    let mut categories = Map::new();
    let category = match part.trace() {
        Some(Trace::PreProcessingTrace(trace)) => Some(("preProcessingTrace", pre_processing(trace))),
        Some(Trace::OrchestrationTrace(trace)) => Some(("orchestrationTrace", orchestration(trace))),
        Some(Trace::PostProcessingTrace(trace)) => {
            Some(("postProcessingTrace", post_processing(trace)))
        }
        Some(Trace::RoutingClassifierTrace(trace)) => {
            Some(("routingClassifierTrace", routing_classifier(trace)))
        }
        _ => None,
    };
    if let Some((key, body)) = category {
        categories.insert(key.to_string(), body);
    }
    json!({ "trace": Value::Object(categories) })
}

fn pre_processing(trace: &PreProcessingTrace) -> Value {
    match trace {
        PreProcessingTrace::ModelInvocationOutput(output) => model_invocation_output(output.metadata()),
        _ => json!({}),
    }
}

fn orchestration(trace: &OrchestrationTrace) -> Value {
    match trace {
        OrchestrationTrace::ModelInvocationOutput(output) => model_invocation_output(output.metadata()),
        OrchestrationTrace::Rationale(rationale) => {
            json!({ "rationale": { "text": rationale.text().unwrap_or_default() } })
        }
        OrchestrationTrace::Observation(observation) => observation_document(observation),
        _ => json!({}),
    }
}

fn post_processing(trace: &PostProcessingTrace) -> Value {
    match trace {
        PostProcessingTrace::ModelInvocationOutput(output) => model_invocation_output(output.metadata()),
        _ => json!({}),
    }
}

fn routing_classifier(trace: &RoutingClassifierTrace) -> Value {
    match trace {
        RoutingClassifierTrace::ModelInvocationOutput(output) => {
            model_invocation_output(output.metadata())
        }
        RoutingClassifierTrace::Observation(observation) => observation_document(observation),
        _ => json!({}),
    }
}

fn model_invocation_output(metadata: Option<&Metadata>) -> Value {
    match metadata.and_then(|metadata| metadata.usage()) {
        Some(usage) => json!({ "modelInvocationOutput": { "metadata": { "usage": {
            "inputTokens": usage.input_tokens().unwrap_or_default(),
            "outputTokens": usage.output_tokens().unwrap_or_default(),
        } } } }),
        None => json!({}),
    }
}

fn observation_document(observation: &Observation) -> Value {
    match observation.final_response().and_then(|response| response.text()) {
        Some(text) => json!({ "observation": { "finalResponse": { "text": text } } }),
        None => json!({ "observation": {} }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_bedrockagentruntime::types::{
        FinalResponse, OrchestrationModelInvocationOutput, Rationale, Usage,
    };

    fn part(trace: Trace) -> TracePart {
        TracePart::builder().trace(trace).build()
    }

    #[test]
    fn test_rationale_trace_document() {
        let rationale = Rationale::builder().text("look up the order").build();
        let value = trace_document(&part(Trace::OrchestrationTrace(
            OrchestrationTrace::Rationale(rationale),
        )));

        assert_eq!(
            value,
            json!({ "trace": { "orchestrationTrace": { "rationale": { "text": "look up the order" } } } })
        );
    }

    #[test]
    fn test_usage_trace_document() {
        let usage = Usage::builder().input_tokens(120).output_tokens(45).build();
        let output = OrchestrationModelInvocationOutput::builder()
            .metadata(Metadata::builder().usage(usage).build())
            .build();
        let value = trace_document(&part(Trace::OrchestrationTrace(
            OrchestrationTrace::ModelInvocationOutput(output),
        )));

        assert_eq!(
            value["trace"]["orchestrationTrace"]["modelInvocationOutput"]["metadata"]["usage"],
            json!({ "inputTokens": 120, "outputTokens": 45 })
        );
    }

    #[test]
    fn test_final_response_trace_document() {
        let observation = Observation::builder()
            .final_response(FinalResponse::builder().text("Your order shipped.").build())
            .build();
        let value = trace_document(&part(Trace::OrchestrationTrace(
            OrchestrationTrace::Observation(observation),
        )));

        assert_eq!(
            value["trace"]["orchestrationTrace"]["observation"]["finalResponse"]["text"],
            "Your order shipped."
        );
    }

    #[test]
    fn test_part_without_trace() {
        let value = trace_document(&TracePart::builder().build());
        assert_eq!(value, json!({ "trace": {} }));
    }
}
