//! 会話の状態
//!
//! 選択中のエージェント・エイリアスと、追記のみのターン履歴を保持する。
use crate::directory::AgentDirectory;
use crate::error::AgentError;
use crate::metrics::InvokeMetrics;

const NO_METRICS_LABEL: &str = "No invoke metrics available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// 会話の 1 ターン。作成後は変更されない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    role: Role,
    content: String,
    metrics: Option<InvokeMetrics>,
}

impl ConversationTurn {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metrics(&self) -> Option<&InvokeMetrics> {
        self.metrics.as_ref()
    }

    /// メトリクスの表示文字列
    pub fn metrics_label(&self) -> String {
        match &self.metrics {
            Some(metrics) => metrics.to_string(),
            None => NO_METRICS_LABEL.to_string(),
        }
    }
}

/// 選択中のエージェント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub agent_id: String,
    pub agent_name: String,
    /// エイリアスが 1 つも無いエージェントでは `None`
    pub alias_id: Option<String>,
}

/// 会話の状態
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
    selection: Option<Selection>,
}

impl Conversation {
    /// 履歴が空で、エージェントが未選択の状態を作る
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// メッセージを送れる状態なら `(agent_id, alias_id)` を返す
    pub fn target(&self) -> Option<(&str, &str)> {
        let selection = self.selection.as_ref()?;
        let alias_id = selection.alias_id.as_deref()?;
        Some((selection.agent_id.as_str(), alias_id))
    }

    /// エージェントを選択する
    ///
    /// エイリアスは先頭のものが選ばれる。エイリアスが無い場合は未選択になる。
    pub fn select_agent(
        &mut self,
        directory: &AgentDirectory,
        agent_id: &str,
    ) -> Result<&Selection, AgentError> {
        let agent = directory
            .get(agent_id)
            .ok_or_else(|| AgentError::UnknownAgent(agent_id.to_string()))?;

        let selection = self.selection.insert(Selection {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            alias_id: agent.first_alias().map(|(id, _)| id.to_string()),
        });
        Ok(selection)
    }

    /// 選択中のエージェントのエイリアスを切り替える
    pub fn select_alias(
        &mut self,
        directory: &AgentDirectory,
        alias_id: &str,
    ) -> Result<(), AgentError> {
        let selection = self.selection.as_mut().ok_or(AgentError::NoAgentSelected)?;
        let known = directory
            .get(&selection.agent_id)
            .is_some_and(|agent| agent.aliases.contains_key(alias_id));
        if !known {
            return Err(AgentError::UnknownAlias {
                agent_id: selection.agent_id.clone(),
                alias_id: alias_id.to_string(),
            });
        }

        selection.alias_id = Some(alias_id.to_string());
        Ok(())
    }

    /// 一覧の先頭のエージェントを選択する。一覧が空なら何もしない
    pub fn select_default(&mut self, directory: &AgentDirectory) -> Option<&Selection> {
        let first_id = directory.first()?.id.clone();
        self.select_agent(directory, &first_id).ok()
    }

    /// 取り直した一覧に合わせて選択を検証し直す
    ///
    /// エージェントが消えていれば先頭のエージェントを、エイリアスが消えていれば
    /// そのエージェントの先頭のエイリアスを選び直す。
    pub fn refresh_selection(&mut self, directory: &AgentDirectory) -> Option<&Selection> {
        let Some(selection) = self.selection.as_mut() else {
            return self.select_default(directory);
        };
        let Some(agent) = directory.get(&selection.agent_id) else {
            self.selection = None;
            return self.select_default(directory);
        };

        let alias_listed = selection
            .alias_id
            .as_deref()
            .is_some_and(|alias_id| agent.aliases.contains_key(alias_id));
        if !alias_listed {
            selection.alias_id = agent.first_alias().map(|(id, _)| id.to_string());
        }
        selection.agent_name = agent.name.clone();
        self.selection.as_ref()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            content: content.into(),
            metrics: None,
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, metrics: Option<InvokeMetrics>) {
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: content.into(),
            metrics,
        });
    }
}
