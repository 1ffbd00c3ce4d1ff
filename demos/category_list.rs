//! Category list example demonstrating a Query subscription and a Mutation.
//!
//! This example shows:
//! - Query subscription with loading, success, and error states
//! - Creating a category from the command line, then reloading every query
//! - Network failures arriving on the notice channel instead of `on_error`
//!
//! Set `RECIPEBOOK_BACKEND_HOST` (or put it in `.env`), then run with:
//! `RUST_LOG=recipebook=debug cargo run --example category_list -- [new category name]`

use color_eyre::eyre::Result;
use recipebook::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Messages that the example loop receives
#[derive(Debug)]
enum Message {
    /// Query result for categories
    Categories(QueryResult<Vec<Category>>),
    /// Create category result
    Created(MutationResult<recipebook::api::Empty>),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let book = RecipeBook::from_config(&ClientConfig::from_env()?);
    let new_category = std::env::args().nth(1);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut subscriptions = SubscriptionManager::new(tx.clone());
    subscriptions.update([Subscription::new(
        book.category_list()
            .on_error(|err| eprintln!("failed to load categories: {}", err.user_message())),
    )
    .map(Message::Categories)]);

    let mut notices = book.client().notices();
    let mut pending = new_category.is_some();

    loop {
        tokio::select! {
            Some(notice) = notices.next() => match notice {
                Notice::NetworkUnreachable { message } => {
                    eprintln!("network connection failed: {message}");
                    break;
                }
            },
            Some(msg) = rx.recv() => match msg {
                Message::Categories(result) => match result.state {
                    QueryState::Loading => println!("loading categories..."),
                    QueryState::Success { data, .. } => {
                        for category in &data {
                            println!("{:>4}  {}", category.id, category.name);
                        }

                        let Some(name) = new_category.as_ref().filter(|_| pending) else {
                            break;
                        };
                        pending = false;

                        let create = book
                            .create_category()
                            .on_error(|err| eprintln!("{}", err.user_message()))
                            .reload_on_success();
                        let tx = tx.clone();
                        let mut messages = create
                            .command(CategoryForm::new(name.clone()))
                            .map(Message::Created)
                            .into_stream();
                        tokio::spawn(async move {
                            while let Some(msg) = messages.next().await {
                                let _ = tx.send(msg);
                            }
                        });
                    }
                    QueryState::Error(_) | QueryState::Idle => break,
                },
                Message::Created(result) => {
                    if result.is_success() {
                        println!("created; reloading");
                    } else {
                        break;
                    }
                }
            },
            else => break,
        }
    }

    subscriptions.shutdown().await;
    Ok(())
}
