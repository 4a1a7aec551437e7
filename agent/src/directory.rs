//! エージェントとエイリアスの一覧の取得
use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::AgentError;

/// 1 ページで取得するエイリアスの既定数
pub const DEFAULT_ALIAS_PAGE_SIZE: i32 = 10;

/// マルチエージェントコラボレーションが無効であることを示す値
const COLLABORATION_DISABLED: &str = "DISABLED";

/// `list_agents` の 1 件分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSummary {
    pub agent_id: String,
    pub agent_name: String,
}

/// `list_agent_aliases` の 1 件分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSummary {
    pub agent_alias_id: String,
    pub agent_alias_name: String,
}

/// エージェント管理 API
#[async_trait]
pub trait AgentCatalog: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<AgentSummary>, AgentError>;

    /// エージェント詳細の `agentCollaboration`（例: `"SUPERVISOR"`, `"DISABLED"`）
    async fn agent_collaboration(&self, agent_id: &str) -> Result<Option<String>, AgentError>;

    async fn list_agent_aliases(
        &self,
        agent_id: &str,
        max_results: i32,
    ) -> Result<Vec<AliasSummary>, AgentError>;
}

/// 取得したエージェントの情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    /// マルチエージェントのスーパーバイザーかどうか
    pub is_supervisor: bool,
    /// alias_id → alias_name
    pub aliases: BTreeMap<String, String>,
}

impl AgentDescriptor {
    /// 一覧表示用の名前（スーパーバイザーかどうかでアイコンを変える）
    pub fn display_name(&self) -> String {
        let icon = if self.is_supervisor { "👩‍✈️" } else { "👨‍💼" };
        format!("{} {} ({})", icon, self.name, self.id)
    }

    pub fn kind_label(&self) -> &'static str {
        if self.is_supervisor {
            "Multi-Agent Supervisor"
        } else {
            "Standard Agent"
        }
    }

    /// 既定で選択されるエイリアス
    pub fn first_alias(&self) -> Option<(&str, &str)> {
        self.aliases
            .iter()
            .next()
            .map(|(id, name)| (id.as_str(), name.as_str()))
    }
}

/// エージェント一覧の取得結果
///
/// 個別のエージェントに対する失敗は `warnings` に、一覧取得そのものの失敗は
/// `error` に記録される。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentDirectory {
    agents: BTreeMap<String, AgentDescriptor>,
    warnings: Vec<String>,
    error: Option<String>,
}

impl AgentDirectory {
    pub fn get(&self, agent_id: &str) -> Option<&AgentDescriptor> {
        self.agents.get(agent_id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.agents.values()
    }

    pub fn first(&self) -> Option<&AgentDescriptor> {
        self.agents.values().next()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// エージェント、スーパーバイザー判定、エイリアスをまとめて取得する
///
/// 個々のエージェントの詳細・エイリアス取得に失敗しても全体は失敗しない。
/// `list_agents` 自体が失敗した場合のみ、空の一覧とエラーを返す。
pub async fn load_agents<C>(catalog: &C, alias_page_size: i32) -> AgentDirectory
where
    C: AgentCatalog + ?Sized,
{
    let summaries = match catalog.list_agents().await {
        Ok(summaries) => summaries,
        Err(e) => {
            warn!(error = %e, "failed to list agents");
            return AgentDirectory {
                error: Some(format!("Error listing agents: {}", e)),
                ..Default::default()
            };
        }
    };

    let mut directory = AgentDirectory::default();

    for summary in summaries {
        let is_supervisor = match catalog.agent_collaboration(&summary.agent_id).await {
            Ok(collaboration) => collaboration.as_deref() != Some(COLLABORATION_DISABLED),
            Err(e) => {
                directory.record_warning(format!(
                    "Could not check multi-agent status for {}: {}",
                    summary.agent_name, e
                ));
                false
            }
        };

        let aliases = match catalog
            .list_agent_aliases(&summary.agent_id, alias_page_size)
            .await
        {
            Ok(aliases) => aliases
                .into_iter()
                .map(|alias| (alias.agent_alias_id, alias.agent_alias_name))
                .collect(),
            Err(e) => {
                directory.record_warning(format!(
                    "Could not fetch aliases for agent {}: {}",
                    summary.agent_name, e
                ));
                BTreeMap::new()
            }
        };

        debug!(
            agent_id = %summary.agent_id,
            is_supervisor,
            aliases = aliases.len(),
            "loaded agent"
        );

        directory.agents.insert(
            summary.agent_id.clone(),
            AgentDescriptor {
                id: summary.agent_id,
                name: summary.agent_name,
                is_supervisor,
                aliases,
            },
        );
    }

    directory
}

impl AgentDirectory {
    fn record_warning(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}
