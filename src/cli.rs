use clap::{Parser, Subcommand};

/// Feishu approval and notification operator tool
#[derive(Parser)]
#[command(name = "feishu-approval", version, about)]
pub struct Cli {
    /// Emit JSON log lines instead of human-readable ones
    #[arg(long, env = "FEISHU_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a company account to its platform identity
    Resolve {
        account: String,
    },

    /// Inspect and act on approval instances
    Approval {
        #[command(subcommand)]
        command: ApprovalCommands,
    },

    /// Send bot messages
    Message {
        #[command(subcommand)]
        command: MessageCommands,
    },
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// Print an instance snapshot
    Query {
        instance: String,
    },
    /// Withdraw an instance on behalf of its applicant
    Cancel {
        #[arg(long)]
        workflow: String,
        #[arg(long)]
        instance: String,
        #[arg(long)]
        account: String,
    },
    /// Print the first comment, or the decision comment of one stage
    Comment {
        instance: String,
        #[arg(long)]
        stage: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MessageCommands {
    /// Send a text message to one account
    Send {
        #[arg(long)]
        account: String,
        #[arg(long)]
        text: String,
    },
}
