/// エージェント一覧取得の統合テスト
///
/// 管理 API をスクリプト化した `AgentCatalog` に置き換えて、
/// 部分的な失敗が一覧全体を壊さないことを検証します。
use agent::{AgentCatalog, AgentClient, AgentError, AgentSummary, AliasSummary, load_agents};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct ScriptedCatalog {
    list_error: Option<String>,
    agents: Vec<(&'static str, &'static str)>,
    collaboration: HashMap<&'static str, Result<Option<&'static str>, &'static str>>,
    aliases: HashMap<&'static str, Result<Vec<(&'static str, &'static str)>, &'static str>>,
    requested_page_sizes: Mutex<Vec<i32>>,
}

#[async_trait]
impl AgentCatalog for ScriptedCatalog {
    async fn list_agents(&self) -> Result<Vec<AgentSummary>, AgentError> {
        if let Some(message) = &self.list_error {
            return Err(AgentError::AwsSdkError(message.clone()));
        }
        Ok(self
            .agents
            .iter()
            .map(|(id, name)| AgentSummary {
                agent_id: id.to_string(),
                agent_name: name.to_string(),
            })
            .collect())
    }

    async fn agent_collaboration(&self, agent_id: &str) -> Result<Option<String>, AgentError> {
        match self.collaboration.get(agent_id) {
            Some(Ok(value)) => Ok(value.map(str::to_string)),
            Some(Err(message)) => Err(AgentError::AwsSdkError(message.to_string())),
            None => Ok(None),
        }
    }

    async fn list_agent_aliases(
        &self,
        agent_id: &str,
        max_results: i32,
    ) -> Result<Vec<AliasSummary>, AgentError> {
        self.requested_page_sizes.lock().unwrap().push(max_results);
        match self.aliases.get(agent_id) {
            Some(Ok(aliases)) => Ok(aliases
                .iter()
                .map(|(id, name)| AliasSummary {
                    agent_alias_id: id.to_string(),
                    agent_alias_name: name.to_string(),
                })
                .collect()),
            Some(Err(message)) => Err(AgentError::AwsSdkError(message.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

#[tokio::test]
async fn test_supervisor_flag_from_collaboration() {
    let catalog = ScriptedCatalog {
        agents: vec![("AGENT1", "standalone"), ("AGENT2", "supervisor")],
        collaboration: HashMap::from([("AGENT1", Ok(Some("DISABLED"))), ("AGENT2", Ok(None))]),
        ..Default::default()
    };

    let directory = load_agents(&catalog, 10).await;

    assert_eq!(directory.len(), 2);
    assert!(!directory.get("AGENT1").unwrap().is_supervisor);
    assert!(directory.get("AGENT2").unwrap().is_supervisor);
    assert!(directory.warnings().is_empty());
    assert!(directory.error().is_none());
}

#[tokio::test]
async fn test_supervisor_router_counts_as_supervisor() {
    let catalog = ScriptedCatalog {
        agents: vec![("AGENT1", "router")],
        collaboration: HashMap::from([("AGENT1", Ok(Some("SUPERVISOR_ROUTER")))]),
        ..Default::default()
    };

    let directory = load_agents(&catalog, 10).await;
    assert!(directory.get("AGENT1").unwrap().is_supervisor);
}

#[tokio::test]
async fn test_detail_failure_degrades_to_standard_agent() {
    let catalog = ScriptedCatalog {
        agents: vec![("AGENT1", "flaky")],
        collaboration: HashMap::from([("AGENT1", Err("AccessDeniedException"))]),
        aliases: HashMap::from([("AGENT1", Ok(vec![("TSTALIASID", "AgentTestAlias")]))]),
        ..Default::default()
    };

    let directory = load_agents(&catalog, 10).await;
    let agent = directory.get("AGENT1").unwrap();

    assert!(!agent.is_supervisor);
    assert_eq!(agent.aliases.len(), 1);
    assert_eq!(directory.warnings().len(), 1);
    assert!(
        directory.warnings()[0].starts_with("Could not check multi-agent status for flaky:"),
        "unexpected warning: {}",
        directory.warnings()[0]
    );
}

#[tokio::test]
async fn test_alias_failure_leaves_aliases_empty() {
    let catalog = ScriptedCatalog {
        agents: vec![("AGENT1", "broken"), ("AGENT2", "healthy")],
        aliases: HashMap::from([
            ("AGENT1", Err("ThrottlingException")),
            ("AGENT2", Ok(vec![("ALIAS1", "live"), ("ALIAS2", "beta")])),
        ]),
        ..Default::default()
    };

    let directory = load_agents(&catalog, 10).await;

    assert_eq!(directory.len(), 2);
    assert!(directory.get("AGENT1").unwrap().aliases.is_empty());
    assert_eq!(
        directory.get("AGENT2").unwrap().aliases.get("ALIAS2"),
        Some(&"beta".to_string())
    );
    assert_eq!(
        directory.warnings(),
        ["Could not fetch aliases for agent broken: AWS SDK error: ThrottlingException"]
    );
}

#[tokio::test]
async fn test_list_failure_yields_empty_directory_with_error() {
    let catalog = ScriptedCatalog {
        list_error: Some("UnrecognizedClientException".to_string()),
        ..Default::default()
    };

    let directory = load_agents(&catalog, 10).await;

    assert!(directory.is_empty());
    assert_eq!(
        directory.error(),
        Some("Error listing agents: AWS SDK error: UnrecognizedClientException")
    );
}

#[tokio::test]
async fn test_alias_page_size_is_forwarded() {
    let catalog = ScriptedCatalog {
        agents: vec![("AGENT1", "a"), ("AGENT2", "b")],
        ..Default::default()
    };

    load_agents(&catalog, 25).await;

    assert_eq!(*catalog.requested_page_sizes.lock().unwrap(), vec![25, 25]);
}

/// 実際の AWS アカウントを使用したテスト
///
/// 実行方法:
/// ```bash
/// cargo test --test directory_test -- --ignored
/// ```
#[tokio::test]
#[ignore] // AWS 認証情報が必要
async fn test_load_agents_from_aws() {
    let client = AgentClient::new(None, None)
        .await
        .expect("AgentClientの初期化に失敗");

    let directory = load_agents(&client, 10).await;

    assert!(directory.error().is_none(), "{:?}", directory.error());
    for agent in directory.agents() {
        eprintln!("{} aliases={}", agent.display_name(), agent.aliases.len());
    }
}
