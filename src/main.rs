use std::io::Read;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod ai;
mod app;
mod auth;
mod cli;
mod config;
mod folders;
mod notes;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::{App, AppFactory, RelatedOptions};
use cli::{Command, FolderArgs};
use folders::{FolderCreate, FolderUpdate};
use notes::{parse_tags, NoteCreate, NoteQuery, NoteUpdate};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nb=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `-` reads the text from stdin.
fn read_text(arg: String) -> anyhow::Result<String> {
    if arg != "-" {
        return Ok(arg);
    }

    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read stdin")?;
    Ok(text)
}

async fn run(app: App, user: &str, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Daemon { addr } => web::serve(app, &addr).await,

        Command::Add {
            title,
            content,
            tags,
            color,
            folder,
        } => {
            let create = NoteCreate {
                title,
                content: read_text(content)?,
                tags: parse_tags(&tags),
                color,
                folder_id: folder,
            };
            let note = app.create_note(user, create).await?;
            print_json(&json!({ "has_embedding": note.has_embedding(), "note": note }))
        }

        Command::Update {
            id,
            title,
            content,
            tags,
            color,
            pin,
            folder,
        } => {
            let update = NoteUpdate {
                title,
                content: content.map(read_text).transpose()?,
                tags: tags.as_deref().map(parse_tags),
                color,
                is_pinned: pin,
                folder_id: folder,
                ..Default::default()
            };
            print_json(&app.update_note(user, id, update).await?)
        }

        Command::Delete { id } => {
            app.delete_note(user, id)?;
            print_json(&json!({ "deleted": id }))
        }

        Command::Show { id } => print_json(&app.get_note(user, id)?),

        Command::List {
            search,
            tags,
            folder,
        } => {
            let query = NoteQuery {
                search,
                tags: tags.as_deref().map(parse_tags),
                folder_id: folder,
            };
            print_json(&app.list_notes(user, query)?)
        }

        Command::Tags {} => print_json(&app.tags(user)?),

        Command::Related {
            id,
            threshold,
            limit,
        } => {
            let opts = RelatedOptions { threshold, limit };
            print_json(&app.related_notes(user, id, opts)?)
        }

        Command::Reembed { id } => {
            let note = app.reembed_note(user, id).await?;
            print_json(&json!({ "has_embedding": note.has_embedding(), "note": note }))
        }

        Command::Summarize { content } => {
            let summary = app.summarize(&read_text(content)?).await?;
            print_json(&json!({ "summary": summary }))
        }

        Command::Expand { shorthand } => {
            let expanded = app.expand(&read_text(shorthand)?).await?;
            print_json(&json!({ "expanded_content": expanded }))
        }

        Command::Title { content } => {
            let title = app.generate_title(&read_text(content)?).await?;
            print_json(&json!({ "title": title }))
        }

        Command::Folder { action } => match action {
            FolderArgs::Add { name, color } => {
                print_json(&app.create_folder(user, FolderCreate { name, color })?)
            }
            FolderArgs::List {} => print_json(&app.list_folders(user)?),
            FolderArgs::Update { id, name, color } => {
                print_json(&app.update_folder(user, &id, FolderUpdate { name, color })?)
            }
            FolderArgs::Delete { id } => {
                app.delete_folder(user, &id)?;
                print_json(&json!({ "deleted": id }))
            }
        },
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = cli::Args::parse();

    let paths = AppFactory::get_paths()?;
    let app = AppFactory::create_app(&paths)?;
    let user = args
        .user
        .unwrap_or_else(|| app.config().default_user.clone());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(app, &user, args.command))
}
