use std::io;
use std::sync::Arc;

use chat_api::{ChatApiClient, ChatApiConfig, ChatApiError};
use chat_cli::app::{Action, ChatApp, PendingSend, HELP_TEXT};
use chat_cli::terminal::TerminalTarget;
use chat_stream::{init_logging, EnvConfig, PlainTextFormatter, SessionController, StreamOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> io::Result<()> {
    let env = EnvConfig::from_env();
    init_logging(&env);

    let mut config = ChatApiConfig::default();
    if let Some(base_url) = &env.base_url {
        config = config.with_base_url(base_url.clone());
    }
    let client = Arc::new(ChatApiClient::new(config).map_err(io::Error::other)?);
    info!(endpoint = %client.endpoint(), "chat client ready");

    let mut app = ChatApp::new(env.conversation_id.clone(), env.model.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight: Option<JoinHandle<()>> = None;

    eprintln!("{HELP_TEXT}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match app.handle_input(&line) {
                    Action::Send(pending) => {
                        in_flight = Some(spawn_send(Arc::clone(&client), pending));
                    }
                    Action::Notice(text) => eprintln!("{text}"),
                    Action::Quit => break,
                    Action::Nothing => {}
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                if !app.cancel_active() {
                    break;
                }
                eprintln!("Cancelling response");
            }
        }
    }

    app.cancel_active();
    if let Some(handle) = in_flight {
        if let Err(error) = handle.await {
            warn!(%error, "send task did not finish cleanly");
        }
    }

    Ok(())
}

fn spawn_send(client: Arc<ChatApiClient>, pending: PendingSend) -> JoinHandle<()> {
    tokio::spawn(async move {
        let PendingSend {
            request,
            cancel,
            observer,
            permit,
        } = pending;

        let mut controller = SessionController::new(TerminalTarget::new(io::stdout()), observer)
            .with_formatter(PlainTextFormatter);
        if let Some(conversation_id) = &request.conversation_id {
            controller = controller.with_conversation_id(conversation_id.clone());
        }

        let result = client.send(&request, &mut controller, Some(&cancel)).await;
        println!();

        match result {
            Ok(report) if report.outcome == StreamOutcome::EndedWithoutCompletion => {
                eprintln!("[response ended before completion]");
            }
            Ok(_) => {}
            Err(ChatApiError::Cancelled) => eprintln!("[cancelled]"),
            Err(error) => eprintln!("send failed: {error}"),
        }

        drop(permit);
    })
}
