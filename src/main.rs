use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feishu_approval::models::message::MessageContent;
use feishu_approval::{config, FeishuClient, OperationOutcome};

mod cli;

use cli::{ApprovalCommands, Cli, Commands, MessageCommands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "feishu_approval=info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let cfg = config::load().context("failed to load configuration")?;
    let client = FeishuClient::connect(cfg)
        .await
        .context("failed to authenticate with feishu")?;

    run(&client, args.command).await
}

async fn run(client: &FeishuClient, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Resolve { account } => {
            let identity = client.directory().resolve(&account).await?;
            print_json(&identity)?;
        }
        Commands::Approval { command } => handle_approval_command(client, command).await?,
        Commands::Message { command } => match command {
            MessageCommands::Send { account, text } => {
                client
                    .messages()
                    .send_to_account(&account, &MessageContent::Text(text))
                    .await?;
                println!("✅ Message sent to {}", account);
            }
        },
    }
    Ok(())
}

async fn handle_approval_command(client: &FeishuClient, command: ApprovalCommands) -> anyhow::Result<()> {
    match command {
        ApprovalCommands::Query { instance } => {
            let snapshot = client.approvals().query(&instance).await?;
            print_json(&snapshot)?;
        }
        ApprovalCommands::Cancel {
            workflow,
            instance,
            account,
        } => {
            let outcome = client.withdraw(&workflow, &instance, &account).await?;
            print_json(&outcome)?;
            if let OperationOutcome::Failure(reason) = outcome {
                anyhow::bail!("cancel failed: {}", reason);
            }
        }
        ApprovalCommands::Comment { instance, stage } => {
            let comment = match stage {
                Some(stage) => client.stage_comment(&instance, &stage).await?,
                None => client.approval_content(&instance).await?,
            };
            print_json(&json!({ "instance_code": instance, "comment": comment }))?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
