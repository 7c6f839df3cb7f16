use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use parley::app::{ChatApp, Command, HELP_TEXT, render_conversation, render_conversation_list};
use parley::chat::ReplyOutcome;
use parley::settings::SettingsStore;

/// Terminal front end. Logs go to stderr so they do not interleave with the chat.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = SettingsStore::load();
    tracing::info!("using settings file {:?}", settings.config_path());
    let mut app = ChatApp::new(settings);

    print!(
        "{}",
        render_conversation_list(&app.controller().conversations(), &Local::now())
    );
    println!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(error = %error, "failed to read from stdin");
                break;
            }
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Help => println!("{HELP_TEXT}"),
            Command::Quit => break,
            Command::List => print!(
                "{}",
                render_conversation_list(&app.controller().conversations(), &Local::now())
            ),
            Command::Open(id) => match app.controller().select_conversation(&id) {
                Ok(()) => show_active(&app),
                Err(error) => println!("cannot open {id}: {error}"),
            },
            Command::Back => app.controller().clear_selection(),
            Command::Show => show_active(&app),
            Command::Reload => {
                app.reload();
                println!("settings reloaded");
            }
            Command::Unknown(input) => println!("unknown command {input:?}, try /help"),
            Command::Send(text) => send(&app, &text),
        }
    }
}

fn show_active(app: &ChatApp) {
    match app.controller().active_conversation() {
        Some(active) => print!("{}", render_conversation(&active, &Local::now())),
        None => println!("no conversation is open, use /open <id>"),
    }
}

fn send(app: &ChatApp, text: &str) {
    let Some(active) = app.controller().active_conversation() else {
        println!("no conversation is open, use /open <id>");
        return;
    };

    let pending = match app.controller().send_message(&active.conversation.id, text) {
        Ok(pending) => pending,
        Err(error) => {
            println!("message not sent: {error}");
            return;
        }
    };
    println!("{} is typing...", active.user.name);

    let name = active.user.name;
    tokio::spawn(async move {
        match pending.wait().await {
            Ok(ReplyOutcome::Delivered(reply)) => println!("{name}: {}", reply.text),
            Ok(outcome) => tracing::debug!(?outcome, "reply was not delivered"),
            Err(error) => tracing::error!(error = %error, "reply task failed"),
        }
    });
}
