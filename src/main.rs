use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use tfterm::api::ApiClient;
use tfterm::chat::{ChatCenter, MessagesState, ThreadsState};
use tfterm::config::Config;
use tfterm::realtime::{ChangeFeed, WsChangeFeed};
use tfterm::session::SessionProvider;
use tfterm::transcript;
use tfterm::types::{Thread, UserRole};

const DEFAULT_CONFIG_PATH: &str = "tfterm.toml";

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut args: Vec<String> = env::args().collect();
    let _bin = args.remove(0);
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    match args[0].as_str() {
        "chat" => run_chat(&args[1..]).await,
        "normalize" => run_normalize(&args[1..]),
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn run_normalize(args: &[String]) -> Result<()> {
    let text = if args.is_empty() {
        std::io::read_to_string(std::io::stdin())
            .context("failed to read transcript from stdin")?
    } else {
        args.join(" ")
    };
    println!("{}", transcript::normalize(&text));
    Ok(())
}

async fn run_chat(args: &[String]) -> Result<()> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut user_id: Option<String> = None;
    let mut role: Option<UserRole> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let value = args.get(i + 1).context("--config requires a value")?;
                config_path = PathBuf::from(value);
                i += 2;
            }
            "--user" => {
                let value = args.get(i + 1).context("--user requires a value")?;
                user_id = Some(value.to_string());
                i += 2;
            }
            "--role" => {
                let value = args.get(i + 1).context("--role requires a value")?;
                role = Some(
                    UserRole::parse(value)
                        .with_context(|| format!("invalid --role: {value}"))?,
                );
                i += 2;
            }
            "--help" | "-h" => {
                print_chat_usage();
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown chat argument: {other}"));
            }
        }
    }

    let user_id = user_id.context("--user is required")?;
    let role = role.context("--role is required (candidate or recruiter)")?;

    let config = Config::load(&config_path)?;
    let session = Arc::new(SessionProvider::new(
        &config.session,
        config.api.auth_refresh_url(),
    ));
    let api = ApiClient::new(config.api.base_url.as_str(), session);
    let feed = WsChangeFeed::connect(
        config.realtime.url.as_str(),
        config.realtime.reconnect_attempts,
        Duration::from_millis(config.realtime.reconnect_delay_ms),
    )
    .await?;

    let mut center = ChatCenter::new(
        api,
        feed,
        user_id,
        role,
        config.chat.messages_table.as_str(),
    );
    center.load_threads().await;
    render_threads(&center);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            maybe_event = center.recv_event() => {
                match maybe_event {
                    Some(event) => {
                        let before = center.messages().len();
                        center.apply_event(event);
                        for message in &center.messages()[before..] {
                            print_message(message.created_at.as_str(), &message.sender_id, &message.content);
                        }
                    }
                    None => {
                        warn!("chat: subscription closed, messages may be stale");
                        center.deselect();
                    }
                }
            }
            maybe_line = lines.next_line() => {
                let line = match maybe_line.context("failed to read stdin")? {
                    Some(line) => line,
                    None => break,
                };
                if !handle_line(&mut center, &line).await {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn handle_line<S, F>(center: &mut ChatCenter<S, F>, line: &str) -> bool
where
    S: tfterm::api::ChatStore,
    F: ChangeFeed,
{
    let line = line.trim();
    if line.is_empty() {
        return true;
    }

    if line == ":quit" {
        return false;
    }
    if line == ":threads" {
        render_threads(center);
        return true;
    }
    if let Some(rest) = line.strip_prefix(":open") {
        let index: usize = match rest.trim().parse() {
            Ok(index) => index,
            Err(_) => {
                println!("usage: :open <thread number>");
                return true;
            }
        };
        let Some(thread_id) = center.threads().get(index).map(|t| t.id.clone()) else {
            println!("no such thread: {index}");
            return true;
        };
        if let Err(err) = center.select_thread(&thread_id).await {
            warn!("chat: failed to open thread {thread_id}: {err:#}");
            return true;
        }
        render_messages(center);
        return true;
    }
    if line == ":close" {
        let Some(thread_id) = center.active_thread_id().map(str::to_string) else {
            println!("no thread is open");
            return true;
        };
        center.close_thread(&thread_id).await;
        render_threads(center);
        return true;
    }

    if center.active_thread_id().is_none() {
        println!("open a thread first (:open <n>)");
        return true;
    }
    center.send(line).await;
    true
}

fn render_threads<S, F>(center: &ChatCenter<S, F>)
where
    S: tfterm::api::ChatStore,
    F: ChangeFeed,
{
    if center.threads_state() != ThreadsState::Loaded {
        println!("loading conversations...");
        return;
    }
    if center.threads().is_empty() {
        println!("no active conversations yet");
        return;
    }
    for (index, thread) in center.threads().iter().enumerate() {
        println!("[{index}] {}", describe_thread(thread, center.role()));
    }
}

fn render_messages<S, F>(center: &ChatCenter<S, F>)
where
    S: tfterm::api::ChatStore,
    F: ChangeFeed,
{
    match center.messages_state() {
        Some(MessagesState::Loaded) => {
            for message in center.messages() {
                print_message(
                    message.created_at.as_str(),
                    &message.sender_id,
                    &message.content,
                );
            }
        }
        Some(MessagesState::Loading) => println!("loading messages..."),
        None => println!("no thread is open"),
    }
}

fn describe_thread(thread: &Thread, viewer: UserRole) -> String {
    let name = thread
        .counterpart(viewer)
        .map(|profile| profile.full_name.as_str())
        .unwrap_or("(unknown)");
    match &thread.last_message_at {
        Some(ts) => format!("{name} (last activity {ts})"),
        None => format!("{name} (new thread)"),
    }
}

fn print_message(created_at: &str, sender_id: &str, content: &str) {
    println!("[{}] {sender_id}: {content}", clock(created_at));
}

/// hh:mm slice of an ISO-8601 timestamp, the full string when malformed.
fn clock(ts: &str) -> &str {
    ts.get(11..16).unwrap_or(ts)
}

fn print_usage() {
    eprintln!("tfterm usage:\n  tfterm chat [options]\n  tfterm normalize [text...]");
}

fn print_chat_usage() {
    eprintln!(
        "tfterm chat options:\n  --config <path>\n  --user <id>\n  --role <candidate|recruiter>\n\ncommands:\n  :threads\n  :open <n>\n  :close\n  :quit\n  anything else is sent to the open thread"
    );
}
