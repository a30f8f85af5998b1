//! Interactive chat session (`coder chat`).

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use coder::chat::{ChatSession, SendOutcome};
use coder::client::ServiceSet;
use coder::code_sync::{CodeSyncRouter, EditorState, FileEditor};
use coder::config::CoderConfig;
use coder::execution::{RunReport, RunSnapshot};
use coder::history::Role;

use super::super::Cli;

const HELP: &str = "\
Commands:
  /run          run the editor content
  /status       show the state of the latest run
  /show         print the editor content
  /copy N       print code block N of the last reply
  /edit-run N   load code block N into the editor and run it
  /analyze      ask for a fix for the last failed run
  /summary      print the running conversation summary
  /history      list the turns still in the buffer
  /help         show this help
  /quit         end the session
Anything else is sent as a message.";

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Send(String),
    Run,
    Status,
    Show,
    Copy(usize),
    EditRun(usize),
    Analyze,
    Summary,
    History,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Send(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or("");
        let arg = parts.next();

        match name {
            "run" => Self::Run,
            "status" => Self::Status,
            "show" => Self::Show,
            "copy" => block_number(arg).map_or_else(Self::Invalid, Self::Copy),
            "edit-run" => block_number(arg).map_or_else(Self::Invalid, Self::EditRun),
            "analyze" => Self::Analyze,
            "summary" => Self::Summary,
            "history" => Self::History,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Invalid(format!("Unknown command '/{}'. Type /help.", other)),
        }
    }
}

/// Parse a 1-based block number into a 0-based index.
fn block_number(arg: Option<&str>) -> Result<usize, String> {
    match arg.map(str::parse::<usize>) {
        Some(Ok(n)) if n > 0 => Ok(n - 1),
        _ => Err("Expected a block number starting at 1.".to_string()),
    }
}

fn build_session(config: &CoderConfig) -> Result<ChatSession> {
    let policy = config
        .compaction_policy()
        .context("Invalid [history] settings in coder.toml")?;
    let services = Arc::new(super::http_services(config)?);
    let editor = EditorState::new(Box::new(FileEditor::new(config.scratch_file())));

    Ok(ChatSession::new(
        ServiceSet::shared(services),
        policy,
        CodeSyncRouter::new(config.language()),
        editor,
    ))
}

pub async fn cmd_chat(cli: &Cli, project_dir: PathBuf) -> Result<()> {
    let config = super::load_config(cli, project_dir)?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let session = build_session(&config)?;
    tracing::info!(session_id = %session.id(), base_url = %config.base_url(), "chat session started");

    println!(
        "{} connected to {}",
        console::style("coder").bold().cyan(),
        config.base_url()
    );
    println!(
        "Editor: {}  (type /help for commands)",
        config.scratch_file().display()
    );
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", console::style(">").bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Send(message) => {
                let outcome = session.send(&message).await;
                print_outcome(&session, &outcome);
            }
            ReplCommand::Run => match session.run_editor().await {
                Some(report) => print_report(&report),
                None => println!("{}", console::style("Editor is empty.").dim()),
            },
            ReplCommand::Status => print_status(&session.run_state()),
            ReplCommand::Show => {
                let code = session.editor_code();
                if code.trim().is_empty() {
                    println!("{}", console::style("Editor is empty.").dim());
                } else {
                    println!("{}", code);
                }
            }
            ReplCommand::Copy(index) => match session.copy_block(index) {
                Some(code) => println!("{}", code),
                None => println!("No code block {} in the last reply.", index + 1),
            },
            ReplCommand::EditRun(index) => match session.copy_block(index) {
                Some(code) => {
                    if let Some(report) = session.edit_and_run(&code).await {
                        print_report(&report);
                    }
                }
                None => println!("No code block {} in the last reply.", index + 1),
            },
            ReplCommand::Analyze => match session.analyze_last_failure().await {
                Ok(Some(analysis)) => {
                    println!("{}", analysis.explanation);
                    if !analysis.fixed_code.trim().is_empty() {
                        println!();
                        println!("{}", console::style("Fixed code loaded into the editor:").green());
                        println!("{}", session.editor_code());
                    }
                }
                Ok(None) => println!("The last run did not fail; nothing to analyze."),
                Err(e) => println!("{}", console::style(e.user_message()).red()),
            },
            ReplCommand::Summary => {
                let summary = session.history().summary();
                if summary.is_empty() {
                    println!("{}", console::style("No summary yet.").dim());
                } else {
                    println!("{}", summary);
                }
            }
            ReplCommand::History => {
                for turn in session.history().turns() {
                    let role = match turn.role() {
                        Role::User => console::style("you").bold(),
                        Role::Assistant => console::style("assistant").cyan(),
                    };
                    println!("{}: {}", role, turn.content());
                }
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Quit => break,
            ReplCommand::Invalid(message) => println!("{}", console::style(message).yellow()),
        }
    }

    if let Some(outcome) = session.settle().await {
        tracing::debug!(compacted = outcome.is_compacted(), "pending compaction settled");
    }
    Ok(())
}

fn print_outcome(session: &ChatSession, outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Rejected => {}
        SendOutcome::Replied { reply, code, .. } => {
            println!();
            println!("{}", reply);
            println!();
            if let Some(code) = code {
                println!(
                    "{}",
                    console::style(format!(
                        "[{} lines synced to the editor; /run to execute]",
                        code.code.lines().count()
                    ))
                    .dim()
                );
            } else if session.is_sidecar_visible() {
                println!("{}", console::style("[editor open; /show to view]").dim());
            }
        }
        SendOutcome::Failed { message, .. } => {
            println!("{}", console::style(message).red());
        }
    }
}

fn print_status(snapshot: &RunSnapshot) {
    if snapshot.run_id == 0 {
        println!("{}", console::style("No runs yet.").dim());
        return;
    }

    println!("Run {}: {}", snapshot.run_id, snapshot.state);
    if snapshot.state.is_terminal() && !snapshot.output.is_empty() {
        println!("{}", console::style(&snapshot.output).dim());
    }
}

fn print_report(report: &RunReport) {
    if report.succeeded() {
        println!("{}", report.output);
    } else {
        println!("{}", console::style(&report.output).red());
    }
}
