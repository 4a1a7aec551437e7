use agent::{
    AgentClient, AgentDirectory, ChatConfig, Conversation, ResponseAssembler, Role, load_agents,
};
use clap::{Args, Parser, Subcommand};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// UI関連の設定
const USER_NAME: &str = "User";
const AGENT_NAME: &str = "Assistant";
const LOADING_ANIMATION_INTERVAL: u64 = 200;
const LOADING_ANIMATION_CHARACTER: &str = ".";
// ローディングアニメーションをクリアするためのスペース文字列
// (ローディング中に表示される可能性のある最大文字数を想定: 約30-40文字分のドット)
const CLEAR_LINE_SPACES: &str = "                                     "; // 37 spaces

const HELP_TEXT: &str = "\
Commands:
  /agents                     list agents and their aliases
  /use <agent-id> [alias-id]  select an agent (and optionally an alias)
  /rationale on|off           show or hide the agent rationale
  /history                    print the conversation so far
  /reload                     fetch the agent list again
  /help                       show this help
  exit | quit                 leave the chat";

// CLIの引数構造体定義
#[derive(Parser)]
#[command(name = "agent-chat")]
#[command(about = "Chat with Amazon Bedrock Agents from the terminal", long_about = None)]
struct Cli {
    /// デバッグログを出力する
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AwsArgs {
    /// 使用するAWSプロファイル名
    #[arg(long)]
    aws_profile: Option<String>,

    /// リージョン (オプション: デフォルトはプロファイル設定またはus-east-1など)
    #[arg(long)]
    region: Option<String>,

    /// 設定ファイルのパス (オプション: デフォルトは .bedrock/agent-chat.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// 利用可能なエージェントとエイリアスを表示します
    Agents {
        #[command(flatten)]
        aws: AwsArgs,
    },

    /// エージェントとのチャットを開始します
    Run {
        #[command(flatten)]
        aws: AwsArgs,

        /// 最初に選択するエージェントID
        #[arg(long)]
        agent_id: Option<String>,

        /// 最初に選択するエイリアスID
        #[arg(long, requires = "agent_id")]
        alias_id: Option<String>,

        /// エージェントの推論過程 (rationale) を表示しない
        #[arg(long)]
        no_rationale: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env の AWS_* 環境変数を読み込む
    dotenvy::dotenv().ok();

    // 引数の解析
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Agents { aws } => {
            let config = load_config(&aws, false)?;
            let client = AgentClient::new(config.profile.clone(), config.region.clone()).await?;
            let directory = load_agents(&client, config.alias_page_size).await;
            print_directory(&directory);
            print_directory_notices(&directory);
        }
        Commands::Run {
            aws,
            agent_id,
            alias_id,
            no_rationale,
        } => {
            let config = load_config(&aws, no_rationale)?;
            run_agent_cli(config, agent_id, alias_id).await?;
        }
    }

    Ok(())
}

/// ログ出力を初期化する（チャットの表示と混ざらないよう標準エラーへ）
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(aws: &AwsArgs, no_rationale: bool) -> anyhow::Result<ChatConfig> {
    let config = match &aws.config {
        Some(path) => ChatConfig::load_from_file(path)?,
        None => ChatConfig::load_default()?,
    };
    Ok(config.with_overrides(aws.aws_profile.clone(), aws.region.clone(), no_rationale))
}

/// CLI対話型エージェントを実行する
///
/// エージェント一覧の取得、選択、ユーザー入力の受け付け、
/// ストリーミングレスポンスの表示など、すべてのUI/UX処理を担当する。
async fn run_agent_cli(
    config: ChatConfig,
    agent_id: Option<String>,
    alias_id: Option<String>,
) -> anyhow::Result<()> {
    println!(
        "Initializing Agent Chat with profile: {}",
        config.profile.as_deref().unwrap_or("default")
    );

    let client = Arc::new(AgentClient::new(config.profile.clone(), config.region.clone()).await?);
    let mut assembler = ResponseAssembler::new(Arc::clone(&client), config.assembler_options());

    let mut directory = load_agents(client.as_ref(), config.alias_page_size).await;
    tracing::debug!(agents = directory.len(), "agent directory loaded");
    print_directory_notices(&directory);

    // 会話の状態（履歴は追記のみ）
    let mut conversation = Conversation::new();
    match agent_id {
        Some(agent_id) => {
            use_agent(&mut conversation, &directory, &agent_id, alias_id.as_deref());
        }
        None => {
            if conversation.select_default(&directory).is_some() {
                print_selection(&conversation, &directory);
            }
        }
    }

    // rustylineエディタの初期化（UI層）
    let mut rl = DefaultEditor::new()?;

    println!("+--------------------------------------------------------+");
    println!("| Bedrock Agent Chat. Type '/help' for commands, 'exit'. |");
    println!("+--------------------------------------------------------+");

    loop {
        // ユーザー入力の受け付け
        let readline = rl.readline(&format!("{} > ", USER_NAME));
        match readline {
            Ok(line) => {
                let input = line.trim();

                // 空入力はスキップ
                if input.is_empty() {
                    continue;
                }

                // 終了コマンドの処理
                if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
                    break;
                }

                let _ = rl.add_history_entry(input);

                if let Some(command) = input.strip_prefix('/') {
                    let mut parts = command.split_whitespace();
                    match (parts.next(), parts.next(), parts.next()) {
                        (Some("agents"), _, _) => print_directory(&directory),
                        (Some("use"), Some(agent_id), alias_id) => {
                            use_agent(&mut conversation, &directory, agent_id, alias_id);
                        }
                        (Some("rationale"), Some("on"), _) => {
                            assembler.set_show_rationale(true);
                            println!("Agent rationale will be shown.");
                        }
                        (Some("rationale"), Some("off"), _) => {
                            assembler.set_show_rationale(false);
                            println!("Agent rationale will be hidden.");
                        }
                        (Some("rationale"), None, _) => {
                            let state = if assembler.options().show_rationale {
                                "shown"
                            } else {
                                "hidden"
                            };
                            println!("Agent rationale is {}.", state);
                        }
                        (Some("history"), _, _) => print_history(&conversation),
                        (Some("reload"), _, _) => {
                            directory = load_agents(client.as_ref(), config.alias_page_size).await;
                            print_directory_notices(&directory);
                            conversation.refresh_selection(&directory);
                            print_selection(&conversation, &directory);
                        }
                        _ => println!("{}", HELP_TEXT),
                    }
                    continue;
                }

                let Some((agent_id, alias_id)) = conversation
                    .target()
                    .map(|(agent, alias)| (agent.to_string(), alias.to_string()))
                else {
                    println!(
                        "Please select both an agent and an alias to start chatting (see /agents and /use)."
                    );
                    continue;
                };

                conversation.push_user(input);

                // アシスタントの応答開始を表示
                print!("{} > ", AGENT_NAME);
                std::io::stdout().flush()?;

                // ローディングアニメーション開始
                let loading_task = tokio::spawn(async {
                    loop {
                        sleep(Duration::from_millis(LOADING_ANIMATION_INTERVAL)).await;
                        print!("{}", LOADING_ANIMATION_CHARACTER);
                        if std::io::stdout().flush().is_err() {
                            break;
                        }
                    }
                });

                let mut stream = assembler.invoke(&agent_id, &alias_id, input);
                let mut is_first_chunk = true;

                // ストリーム受信ループ
                while let Some(chunk) = stream.recv().await {
                    // 最初のチャンクが届いたタイミングでローディングを消す
                    if is_first_chunk {
                        loading_task.abort();
                        clear_loading_animation();
                        is_first_chunk = false;
                    }
                    print!("{}", chunk);
                    std::io::stdout().flush()?;
                }

                // チャンクが一つも来ずに終了した場合もローディングを消す
                if is_first_chunk {
                    loading_task.abort();
                    clear_loading_animation();
                }

                let summary = stream.finish().await;
                let metrics = summary.outcome.map(|outcome| outcome.metrics);
                println!();
                if let Some(metrics) = &metrics {
                    println!("({})", metrics);
                }

                // 表示したテキストとメトリクスを履歴に追加
                conversation.push_assistant(summary.transcript, metrics);
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// エージェント（と任意のエイリアス）を選択し、結果を表示する
fn use_agent(
    conversation: &mut Conversation,
    directory: &AgentDirectory,
    agent_id: &str,
    alias_id: Option<&str>,
) {
    if let Err(e) = conversation.select_agent(directory, agent_id) {
        println!("[Error] {}", e);
        return;
    }
    if let Some(alias_id) = alias_id
        && let Err(e) = conversation.select_alias(directory, alias_id)
    {
        println!("[Error] {}", e);
    }
    print_selection(conversation, directory);
}

fn print_selection(conversation: &Conversation, directory: &AgentDirectory) {
    let Some(selection) = conversation.selection() else {
        println!("No agents found. Please check your AWS credentials and permissions.");
        return;
    };
    let Some(agent) = directory.get(&selection.agent_id) else {
        return;
    };

    println!("Selected {}: {}", agent.kind_label(), agent.name);
    match selection
        .alias_id
        .as_deref()
        .and_then(|alias_id| agent.aliases.get(alias_id))
    {
        Some(alias_name) => println!("Selected alias: {}", alias_name),
        None => println!("No aliases available for this agent. Please select another agent."),
    }
}

fn print_directory(directory: &AgentDirectory) {
    if directory.is_empty() {
        println!("No agents found. Please check your AWS credentials and permissions.");
        return;
    }

    for agent in directory.agents() {
        println!("{}", agent.display_name());
        if agent.aliases.is_empty() {
            println!("    (no aliases)");
        }
        for (alias_id, alias_name) in &agent.aliases {
            println!("    {} ({})", alias_name, alias_id);
        }
    }
}

fn print_directory_notices(directory: &AgentDirectory) {
    for warning in directory.warnings() {
        eprintln!("[Warning] {}", warning);
    }
    if let Some(error) = directory.error() {
        eprintln!("[Error] {}", error);
    }
}

fn print_history(conversation: &Conversation) {
    if conversation.turns().is_empty() {
        println!("(no messages yet)");
        return;
    }

    for turn in conversation.turns() {
        match turn.role() {
            Role::User => println!("{} > {}", USER_NAME, turn.content()),
            Role::Assistant => {
                println!("{} > {}", AGENT_NAME, turn.content().trim_end());
                println!("    ({})", turn.metrics_label());
            }
        }
    }
}

/// ローディングアニメーションをクリアしてカーソルを戻す
///
/// 行頭に戻り、スペースで上書きしてから再度行頭に戻り、プロンプトを表示する。
fn clear_loading_animation() {
    print!(
        "\r{} > {}\r{} > ",
        AGENT_NAME, CLEAR_LINE_SPACES, AGENT_NAME
    );
    let _ = std::io::stdout().flush();
}
