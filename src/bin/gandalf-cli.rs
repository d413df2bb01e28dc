//! Thin example binary exercising `gandalf_core` end to end for manual
//! testing — mirrors the way the teacher crate (`vigilo`) ships a `main.rs`
//! over its own library-shaped modules, minus the MCP/stdio server loop
//! (spec §1: the RPC/transport layer is an external collaborator, not the
//! core's concern).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use gandalf_core::aggregator::{Aggregator, RecallRequest, SearchRequest};
use gandalf_core::export::{export_individual, ExportArgs};
use gandalf_core::model::{ShapedConversations, SourceTool};
use gandalf_core::pool::ConnectionPool;
use gandalf_core::query::{query_conversations, QueryArgs, QueryFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") || args.first().map(String::as_str) == Some("help") {
        print_help();
        return Ok(());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("gandalf-cli {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match args.first().map(String::as_str) {
        Some("recall") => run_recall(&args[1..]).await,
        Some("search") => run_search(&args[1..]).await,
        Some("query") => run_query(&args[1..]),
        Some("export") => run_export(&args[1..]).await,
        Some(other) => {
            eprintln!("gandalf-cli: unknown command '{other}'\n");
            eprintln!("Run 'gandalf-cli help' for usage.");
            std::process::exit(1);
        }
        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("gandalf-cli {}", env!("CARGO_PKG_VERSION"));
    println!("Local conversation aggregator over Cursor, Claude Code, and Windsurf.\n");
    println!("USAGE:");
    println!("  gandalf-cli recall [OPTIONS]          Rank recent conversations across tools");
    println!("  gandalf-cli search <query> [OPTIONS]  Search conversations for a query");
    println!("  gandalf-cli query <tool> [OPTIONS]     Raw dump from one source tool");
    println!("  gandalf-cli export [OPTIONS]           Export ranked conversations to files");
    println!("  gandalf-cli help | --help | -h         Show this message");
    println!("  gandalf-cli --version | -V             Show version\n");
    println!("RECALL / SEARCH OPTIONS:");
    println!("  --days <n>        Lookback window in days");
    println!("  --limit <n>       Maximum conversations to return");
    println!("  --min-score <f>   Minimum relevance score");
    println!("  --tools <list>    Comma-separated subset of: cursor, claude-code, windsurf");
    println!("  --prompt <text>   User prompt, folded into context keywords (recall only)\n");
    println!("QUERY OPTIONS:");
    println!("  --format <fmt>    json | markdown | <tool-native> (default: json)");
    println!("  --limit <n>       Maximum conversations to return");
    println!("  --summary         Return per-source counts instead of full records\n");
    println!("EXPORT OPTIONS:");
    println!("  --format <fmt>    json | md | markdown | txt (default: json)");
    println!("  --output <dir>    Output directory (default: ~/.gandalf/exports)");
    println!("  --limit <n>       Maximum conversations to export");
    println!("  --filter <text>   Only export conversations whose title contains <text>");
}

fn get_flag(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

fn split_tools(args: &[String]) -> Option<Vec<String>> {
    get_flag(args, "--tools").map(|s| s.split(',').map(str::trim).map(str::to_string).collect())
}

fn cache_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".gandalf/cache")
}

async fn run_recall(args: &[String]) -> Result<()> {
    let aggregator = Aggregator::new(cache_dir());
    let request = RecallRequest {
        fast_mode: !args.iter().any(|a| a == "--detailed"),
        days_lookback: get_flag(args, "--days").and_then(|s| s.parse().ok()),
        limit: get_flag(args, "--limit").and_then(|s| s.parse().ok()),
        min_score: get_flag(args, "--min-score").and_then(|s| s.parse().ok()),
        conversation_types: None,
        tools: split_tools(args),
        user_prompt: get_flag(args, "--prompt"),
        search_query: None,
        project_root: None,
    };

    let response = aggregator.recall(request).await?;
    print_response(&response.summary, &response.status, response.partial, &response.conversations);
    Ok(())
}

async fn run_search(args: &[String]) -> Result<()> {
    let query = args
        .first()
        .filter(|s| !s.starts_with("--"))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("usage: gandalf-cli search <query> [OPTIONS]"))?;

    let aggregator = Aggregator::new(cache_dir());
    let request = SearchRequest {
        query,
        days_lookback: get_flag(args, "--days").and_then(|s| s.parse().ok()),
        limit: get_flag(args, "--limit").and_then(|s| s.parse().ok()),
        min_score: get_flag(args, "--min-score").and_then(|s| s.parse().ok()),
        conversation_types: None,
        tools: split_tools(args),
        include_content: false,
        project_root: None,
    };

    let response = aggregator.search(request).await?;
    print_response(&response.summary, &response.status, response.partial, &response.conversations);
    Ok(())
}

fn print_response(summary: &str, status: &str, partial: bool, conversations: &ShapedConversations) {
    println!("status: {status} ({summary}){}", if partial { " [partial]" } else { "" });
    match conversations {
        ShapedConversations::Full(records) => {
            for record in records {
                println!("  [{:.2}] {} — {}", record.relevance_score, record.source_tool, record.title);
            }
        }
        ShapedConversations::Lightweight(records) => {
            println!("  (lightweight form — response was too large for full fidelity)");
            for record in records {
                println!("  [{:.2}] {} — {}", record.relevance_score, record.source_tool, record.title);
            }
        }
        ShapedConversations::Summary { per_source, .. } => {
            println!("  (summary mode — response exceeded the size budget even lightweight)");
            for s in per_source {
                println!("  {}: {} conversations, avg score {:.2}", s.source_tool, s.count, s.average_score);
            }
        }
    }
}

fn run_query(args: &[String]) -> Result<()> {
    let tool_name = args
        .first()
        .filter(|s| !s.starts_with("--"))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("usage: gandalf-cli query <tool> [OPTIONS]"))?;
    let tool = SourceTool::parse(&tool_name).ok_or_else(|| anyhow::anyhow!("unknown tool '{tool_name}'"))?;

    let format_name = get_flag(args, "--format").unwrap_or_else(|| "json".to_string());
    let format = QueryFormat::parse(&format_name, tool).map_err(|e| anyhow::anyhow!("{e}"))?;
    let limit = get_flag(args, "--limit").and_then(|s| s.parse().ok()).unwrap_or(20);

    let pool = Arc::new(ConnectionPool::default());
    let response = query_conversations(
        &pool,
        tool,
        QueryArgs {
            format,
            limit,
            project_root: None,
            summary: args.iter().any(|a| a == "--summary"),
        },
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("{} conversations from {}", response.total_conversations, response.source_tool);
    println!("{}", response.content);
    Ok(())
}

async fn run_export(args: &[String]) -> Result<()> {
    let format = get_flag(args, "--format").unwrap_or_else(|| "json".to_string());
    let output_dir = get_flag(args, "--output")
        .map(PathBuf::from)
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".gandalf/exports"));
    let limit = get_flag(args, "--limit").and_then(|s| s.parse().ok());
    let filter = get_flag(args, "--filter");

    let export_args = ExportArgs::validated(&format, output_dir, limit, filter).map_err(|e| anyhow::anyhow!("{e}"))?;

    let aggregator = Aggregator::new(cache_dir());
    let records = match aggregator.recall(RecallRequest::default()).await {
        Ok(response) => match response.conversations {
            ShapedConversations::Full(records) => records,
            _ => Vec::new(),
        },
        Err(_) => Vec::new(),
    };

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let response = export_individual(&records, &export_args, now).map_err(|e| anyhow::anyhow!("{e}"))?;

    println!(
        "exported {} conversation(s) to {}",
        response.exported_count,
        response.output_directory.display()
    );
    Ok(())
}
