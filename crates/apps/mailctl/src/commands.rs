//! Command implementations

use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use mailstore::{Message, MessageId, NamespacedStore, SearchKind, SmtpEnvelope, StoreConfig};

use crate::Command;

/// Run a store command against `namespace`, printing results to `out`
pub fn run(
    store: &dyn NamespacedStore,
    namespace: &str,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Namespaces => {
            let mut namespaces = store.list_namespaces()?;
            namespaces.sort();
            for name in namespaces {
                let marker = if name == store.default_namespace() { " (mirror)" } else { "" };
                writeln!(out, "{}{}", name, marker)?;
            }
        }
        Command::Count => {
            writeln!(out, "{}", store.count_with_namespace(namespace))?;
        }
        Command::List { start, limit } => {
            let messages = store.list_with_namespace(namespace, start, limit)?;
            for message in &messages {
                write_summary(out, message)?;
            }
        }
        Command::Search {
            kind,
            query,
            start,
            limit,
        } => {
            let kind = SearchKind::parse(&kind);
            let results = store.search_with_namespace(namespace, kind, &query, start, limit)?;
            for message in &results.messages {
                write_summary(out, message)?;
            }
            writeln!(
                out,
                "{} of {} matches ({} {:?})",
                results.len(),
                results.total,
                kind,
                query
            )?;
        }
        Command::Show { id } => {
            let message = store.load_with_namespace(namespace, &MessageId::new(id))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&message)?)?;
        }
        Command::Delete { id } => {
            store.delete_one_with_namespace(namespace, &MessageId::new(id.as_str()))?;
            info!("Deleted message {} from {}", id, namespace);
        }
        Command::Clear => {
            let count = store.count_with_namespace(namespace);
            store.delete_all_with_namespace(namespace)?;
            info!("Deleted {} messages from {}", count, namespace);
        }
        Command::Import {
            from,
            to,
            helo,
            file,
        } => {
            let data = read_data(file.as_deref())?;
            let mut message = Message::from_envelope(SmtpEnvelope {
                helo,
                from,
                to,
                data,
            });
            let id = store.store_with_namespace(namespace, &mut message)?;
            writeln!(out, "{}", id)?;
        }
        Command::Config { .. } => {
            anyhow::bail!("config is handled before the store is opened");
        }
    }

    Ok(())
}

/// Print the resolved configuration, optionally persisting it
pub fn show_config(store_config: &StoreConfig, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(store_config)?);

    if save {
        let path = store_config.save()?;
        info!("Saved store configuration to {}", path.display());
    }

    Ok(())
}

fn write_summary(out: &mut impl Write, message: &Message) -> io::Result<()> {
    writeln!(
        out,
        "{:>8}  {}  {} -> {}  ({} bytes)",
        message.id,
        message.created.format("%Y-%m-%d %H:%M:%S"),
        message.sender(),
        message.recipients().join(", "),
        message.size
    )
}

fn read_data(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read message file: {}", path.display())),
        None => {
            let mut data = String::new();
            io::stdin()
                .read_to_string(&mut data)
                .context("Failed to read message from stdin")?;
            Ok(data)
        }
    }
}
