// crates/relaycli/src/main.rs

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::CliConfig;
use relaycore::{
    ConditionalConfig, DelayConfig, Edge, ExecutionEvent, NodeConfig, NodeSpec, NodeType,
    SlackConfig, TransformConfig, Workflow,
};
use relayruntime::{EventCallback, RelayRuntime};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show debug logging
        #[arg(short, long)]
        verbose: bool,

        /// TOML file with [runtime] and [nodes] tables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the parallel node limit
        #[arg(long)]
        max_parallel: Option<usize>,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("RELAY_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
            config,
            max_parallel,
        } => {
            init_logging(verbose);

            let mut settings = CliConfig::load(config.as_deref())?;
            if let Some(limit) = max_parallel {
                settings.runtime.max_parallel_nodes = limit;
            }
            run_workflow(&file, input.as_deref(), settings).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read workflow {}", file.display()))?;
    let workflow: Workflow = serde_json::from_str(&text)
        .with_context(|| format!("Invalid workflow {}", file.display()))?;
    tracing::debug!(path = %file.display(), workflow_id = %workflow.id, "Loaded workflow");
    Ok(workflow)
}

fn parse_input(input: Option<&str>) -> Result<Map<String, Value>> {
    let Some(text) = input else {
        return Ok(Map::new());
    };

    match serde_json::from_str::<Value>(text).context("Input is not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("Input must be a JSON object"),
    }
}

fn print_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::ExecutionStarted { execution_id, .. } => {
            println!("▶️  Execution {} started", execution_id);
        }
        ExecutionEvent::TaskStarted {
            node_id, node_type, ..
        } => {
            println!("  ⚡ Starting node: {} ({})", node_id, node_type);
        }
        ExecutionEvent::TaskCompleted {
            node_id,
            duration_ms,
            attempts,
            branch,
            ..
        } => {
            let branch = branch
                .as_deref()
                .map(|b| format!(" -> {}", b))
                .unwrap_or_default();
            println!(
                "  ✅ Node {} completed in {}ms (attempts: {}){}",
                node_id, duration_ms, attempts, branch
            );
        }
        ExecutionEvent::TaskFailed {
            node_id,
            error,
            attempts,
            ..
        } => {
            println!("  ❌ Node {} failed after {} attempt(s): {}", node_id, attempts, error);
        }
        ExecutionEvent::ExecutionCompleted {
            success,
            duration_ms,
            error,
            ..
        } => {
            if *success {
                println!("✨ Workflow completed successfully in {}ms", duration_ms);
            } else {
                println!(
                    "💥 Workflow failed after {}ms: {}",
                    duration_ms,
                    error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}

async fn run_workflow(file: &Path, input: Option<&str>, settings: CliConfig) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(file)?;
    let inputs = parse_input(input)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let registry = relaynodes::standard_registry(&settings.nodes);
    let runtime = RelayRuntime::with_registry(Arc::new(registry), settings.runtime);

    let on_event: EventCallback = Arc::new(print_event);
    let result = runtime.run_workflow(&workflow, inputs, Some(on_event)).await?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.execution_id);
    println!("   Completed: {}/{} nodes", result.results.len(), workflow.nodes.len());

    if !result.shared_context.is_empty() {
        println!();
        println!("📤 Context:");
        println!("{}", serde_json::to_string_pretty(&result.shared_context)?);
    }

    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    let issues = relaycore::validation_issues(&workflow);

    if issues.is_empty() {
        println!("✅ Workflow is valid:");
        println!("   Name: {}", workflow.name);
        println!("   Nodes: {}", workflow.nodes.len());
        println!("   Edges: {}", workflow.edges.len());
        return Ok(());
    }

    println!("❌ Found {} issue(s):", issues.len());
    for issue in &issues {
        match &issue.node_id {
            Some(node_id) => println!("   [{}] {}", node_id, issue.message),
            None => println!("   {}", issue.message),
        }
    }
    bail!("Workflow {} is invalid", file.display())
}

fn describe(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Start => "Entry point; publishes the run input",
        NodeType::End => "Terminal marker",
        NodeType::Email => "Render and send an email (to, subject, body)",
        NodeType::Slack => "Post a chat notification (channel, message)",
        NodeType::Http => "Simulated HTTP request (url, method)",
        NodeType::Delay => "Wait for durationMs, capped",
        NodeType::Conditional => "Evaluate an expression and pick a branch",
        NodeType::Transform => "Render a mapper object against the context",
        NodeType::Webhook => "Simulated webhook delivery",
    }
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = relaynodes::standard_registry(&relaynodes::NodesConfig::default());
    for node_type in registry.node_types() {
        println!("  • {}", node_type);
        println!("    {}", describe(node_type));
    }
}

fn example_workflow() -> Workflow {
    let mut workflow = Workflow::new("Example Lead Routing");
    workflow.description = Some("Scores a lead and notifies sales about hot ones".to_string());

    workflow.add_node(NodeSpec::new("start", NodeConfig::Start).with_position(100.0, 100.0));
    workflow.add_node(
        NodeSpec::new(
            "shape",
            NodeConfig::Transform(TransformConfig {
                mapper: json!({"lead": "{{ name }} <{{ email }}>"})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            }),
        )
        .with_label("Format lead")
        .with_position(300.0, 100.0),
    );
    workflow.add_node(
        NodeSpec::new(
            "score",
            NodeConfig::Conditional(ConditionalConfig {
                expression: Some("score > 50".to_string()),
                branch_true: "high".to_string(),
                branch_false: "low".to_string(),
            }),
        )
        .with_label("High score?")
        .with_position(500.0, 100.0),
    );
    workflow.add_node(
        NodeSpec::new(
            "notify",
            NodeConfig::Slack(SlackConfig {
                channel: Some("#sales".to_string()),
                message: Some("Hot lead: {{ lead }} scored {{ score }}".to_string()),
            }),
        )
        .parallel()
        .with_position(700.0, 50.0),
    );
    workflow.add_node(
        NodeSpec::new(
            "nurture",
            NodeConfig::Delay(DelayConfig {
                duration_ms: Some(500),
            }),
        )
        .parallel()
        .with_position(700.0, 150.0),
    );

    workflow.connect("start", "shape");
    workflow.connect("shape", "score");
    workflow.add_edge(Edge::new("score", "notify").with_label("high"));
    workflow.add_edge(Edge::new("score", "nurture").with_label("low"));
    workflow
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&example_workflow())?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  relay run --file {} --input '{{\"name\": \"Ada\", \"email\": \"ada@example.com\", \"score\": 75}}'",
        output.display()
    );

    Ok(())
}
