//! Line-oriented front end.
//!
//! One task owns the state machine and serializes everything onto it:
//! stdin lines, channel events, and connectivity changes all arrive through
//! the same select loop, so no two state operations ever overlap.

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};

use chat_core::state::ChatStateMachine;
use chat_types::event::{ClientEvent, ServerEvent};
use chat_types::message::Role;
use chat_types::Result;

use crate::connection::ConnectionHandle;

enum Flow {
    Continue,
    Quit,
}

pub async fn run(mut machine: ChatStateMachine, mut handle: ConnectionHandle) -> Result<()> {
    println!("chat-relay client — /help for commands");
    print_transcript(&machine);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Cumulative buffer for the in-flight stream; the state machine is
    // always handed the whole text, not the fragment.
    let mut pending = String::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.map_err(|e| chat_types::ChatError::Other(e.to_string()))? else {
                    break;
                };
                if let Flow::Quit = handle_line(&mut machine, &handle, &line).await {
                    break;
                }
            }
            event = handle.events.recv() => {
                let Some(event) = event else { break };
                handle_server_event(&mut machine, &mut pending, event).await;
            }
            changed = handle.connected.changed() => {
                if changed.is_err() {
                    break;
                }
                let connected = *handle.connected.borrow();
                println!("[{}]", if connected { "connected" } else { "disconnected" });
            }
        }
    }

    handle.shutdown();
    Ok(())
}

async fn handle_server_event(
    machine: &mut ChatStateMachine,
    pending: &mut String,
    event: ServerEvent,
) {
    match event {
        ServerEvent::Delta { content } => {
            pending.push_str(&content);
            machine.update_streaming_message(pending.clone());
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        ServerEvent::Complete { full_response } => {
            machine.finalize_streaming_message(full_response).await;
            pending.clear();
            println!();
        }
        ServerEvent::Error { error } => {
            // Surface the failure in the transcript and reset streaming state.
            machine
                .add_message(Role::Assistant, format!("Error: {error}"))
                .await;
            machine.update_streaming_message("");
            pending.clear();
            println!("\n[error] {error}");
        }
        ServerEvent::Broadcast { data } => println!("[broadcast] {data}"),
        ServerEvent::RoomMessage { from, message } => println!("[{from}] {message}"),
        ServerEvent::UserJoined { client_id } => println!("[{client_id} joined]"),
        ServerEvent::UserLeft { client_id } => println!("[{client_id} left]"),
    }
}

async fn handle_line(
    machine: &mut ChatStateMachine,
    handle: &ConnectionHandle,
    line: &str,
) -> Flow {
    let line = line.trim();
    if line.is_empty() {
        return Flow::Continue;
    }

    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["/quit"] | ["/exit"] => return Flow::Quit,
        ["/help"] => print_help(),
        ["/new"] => {
            machine.create_new_chat().await;
            println!("[new chat]");
        }
        ["/list"] => {
            for (i, chat) in machine.sorted_chats().iter().enumerate() {
                let marker = if machine.active_chat_id() == Some(chat.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {i}: {} ({} messages)", chat.title, chat.messages.len());
            }
        }
        ["/switch", index] => match chat_id_at(machine, index) {
            Some(id) => {
                machine.switch_chat(&id);
                print_transcript(machine);
            }
            None => println!("no chat at index {index}"),
        },
        ["/delete", index] => match chat_id_at(machine, index) {
            Some(id) => {
                machine.delete_chat(&id).await;
                println!("[deleted]");
            }
            None => println!("no chat at index {index}"),
        },
        ["/clear"] => {
            machine.clear_current_chat().await;
            println!("[cleared]");
        }
        _ if line.starts_with('/') => println!("unknown command: {line}"),
        _ => return submit_prompt(machine, handle, line).await,
    }
    Flow::Continue
}

async fn submit_prompt(
    machine: &mut ChatStateMachine,
    handle: &ConnectionHandle,
    prompt: &str,
) -> Flow {
    if !handle.is_connected() {
        println!("[not connected — try again shortly]");
        return Flow::Continue;
    }
    if machine.is_streaming() {
        println!("[a response is still streaming]");
        return Flow::Continue;
    }

    machine.add_message(Role::User, prompt).await;
    if let Err(e) = handle.send(ClientEvent::SubmitPrompt {
        prompt: prompt.to_string(),
    }) {
        println!("[send failed: {e}]");
        return Flow::Continue;
    }
    machine.update_streaming_message("");
    Flow::Continue
}

fn chat_id_at(machine: &ChatStateMachine, index: &str) -> Option<String> {
    let index: usize = index.parse().ok()?;
    machine
        .sorted_chats()
        .get(index)
        .map(|chat| chat.id.clone())
}

fn print_transcript(machine: &ChatStateMachine) {
    if let Some(chat) = machine.active_chat() {
        println!("── {} ──", chat.title);
        for message in &chat.messages {
            let who = match message.role {
                Role::User => "you",
                Role::Assistant => "assistant",
            };
            println!("{who}: {}", message.content);
        }
    }
}

fn print_help() {
    println!("/new            start a new chat");
    println!("/list           list chats, most recent first");
    println!("/switch <n>     switch to chat n from /list");
    println!("/delete <n>     delete chat n from /list");
    println!("/clear          clear the current chat");
    println!("/quit           exit");
    println!("anything else is sent as a prompt");
}
