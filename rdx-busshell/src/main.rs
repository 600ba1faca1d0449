use anyhow::Result;
use colored::Colorize;
use eventbus::config::TypeDecl;
use eventbus::prelude::*;
use eventbus::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use tracing::info;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-------------------------------------------------------------".dimmed());
    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    ";
    println!("{}", version_string);
    println!("{}", license_blurb.dimmed());
    println!("{}", "-------------------------------------------------------------".dimmed());
}

/// A parsed `add` command.
#[derive(Debug)]
struct AddCommand {
    event_types: Vec<EventType>,
    options: ListenerOptions,
    /// Option keys that were not recognized and will be ignored.
    ignored: Vec<String>,
}

/// Parses the arguments of `add <T[,T]> [id=X] [priority=N] [before=X] [after=X]`.
fn parse_add(args: &[&str]) -> Result<AddCommand, String> {
    let Some(types_arg) = args.first() else {
        return Err("Usage: add <TYPE[,TYPE]> [id=X] [priority=N] [before=X] [after=X]".into());
    };
    let event_types: Vec<EventType> = types_arg
        .split(',')
        .filter(|name| !name.is_empty())
        .map(EventType::from)
        .collect();

    let mut options = ListenerOptions::new();
    let mut ignored = Vec::new();
    for option in &args[1..] {
        let Some((key, value)) = option.split_once('=') else {
            return Err(format!("Expected key=value, got '{}'.", option));
        };
        match key {
            "id" => options = options.with_id(value),
            "before" => options = options.before(value),
            "after" => options = options.after(value),
            "priority" => {
                let priority = value
                    .parse::<i32>()
                    .map_err(|_| format!("'{}' is not a valid priority.", value))?;
                options = options.with_priority(priority);
            }
            // Unknown keys are ignored, as in configuration files.
            _ => ignored.push(key.to_string()),
        }
    }
    Ok(AddCommand {
        event_types,
        options,
        ignored,
    })
}

/// Builds the shell's echo listener.
fn echo_listener(label: String) -> Listener {
    Listener::new(move |event| {
        println!("<-- [LISTENER {}] handled '{}'", label.as_str().green(), event.event_type());
    })
}

/// Builds a `DynamicEvent` for `name` using the declared type hierarchy.
fn event_for(config: &EventBusConfig, name: &str) -> DynamicEvent {
    let event_type = EventType::from(name);
    let ancestors = config.ancestors_of(&event_type);
    DynamicEvent::new(event_type).with_ancestors(ancestors)
}

fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let mut config = EventBusConfig::load(config_path.as_deref())?;
    let bus = EventBus::from_config(config.clone(), |decl| {
        let label = decl
            .label
            .clone()
            .or_else(|| decl.id.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| "declared".to_string());
        echo_listener(label)
    })?;
    info!("{} loaded {} declared type(s).", ENGINE_NAME.cyan(), config.types.len());

    let mut next_handle: usize = 0;

    let mut rl = Editor::new()?;
    let helper = MyHighlighter {};
    rl.set_helper(Some(helper));

    println!("{} is ready. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();

                if let Some(command) = args.first() {
                    match *command {
                        "type" => match (args.get(1), args.get(2), args.get(3)) {
                            (Some(name), None, None) => {
                                config.types.push(TypeDecl {
                                    name: EventType::from(*name),
                                    extends: Vec::new(),
                                });
                                println!("--> Declared type '{}'.", name);
                            }
                            (Some(name), Some(&"extends"), Some(parents)) => {
                                let extends = parents.split(',').map(EventType::from).collect();
                                config.types.push(TypeDecl {
                                    name: EventType::from(*name),
                                    extends,
                                });
                                println!("--> Declared type '{}' extending {}.", name, parents);
                            }
                            _ => println!("Usage: type <NAME> [extends <A,B>]"),
                        },
                        "add" => match parse_add(&args[1..]) {
                            Ok(AddCommand {
                                event_types,
                                options,
                                ignored,
                            }) => {
                                for key in &ignored {
                                    println!("Ignoring unknown option '{}'.", key);
                                }
                                let label = options
                                    .id
                                    .as_ref()
                                    .map(ToString::to_string)
                                    .unwrap_or_else(|| format!("#{}", next_handle));
                                match bus.add_listener(event_types, echo_listener(label), options) {
                                    Ok(id) => {
                                        next_handle += 1;
                                        println!("--> Added listener with id: {}", id);
                                    }
                                    Err(e) => println!("Error: {}", e),
                                }
                            }
                            Err(message) => println!("{}", message),
                        },
                        "remove" => {
                            if let Some(target) = args.get(1) {
                                let removed = bus.remove_listener(*target);
                                println!("--> Removed {} listener(s).", removed);
                            } else {
                                println!("Usage: remove <ID>");
                            }
                        }
                        "resolve" => {
                            if let Some(name) = args.get(1) {
                                let event = event_for(&config, name);
                                match bus.get_listeners_for_event(&event) {
                                    Ok(resolved) if resolved.is_empty() => {
                                        println!("--> No listeners apply to '{}'.", name)
                                    }
                                    Ok(resolved) => {
                                        println!("Resolved order for '{}':", name);
                                        for (position, id) in resolved.ids().enumerate() {
                                            println!("  {:>3}. {}", position, id);
                                        }
                                    }
                                    Err(e) => println!("{} {}", "Error:".red().bold(), e),
                                }
                            } else {
                                println!("Usage: resolve <TYPE>");
                            }
                        }
                        "fire" => {
                            if let Some(name) = args.get(1) {
                                let mut event = event_for(&config, name);
                                match bus.dispatch_dyn(&mut event) {
                                    Ok(count) => println!(
                                        "--> '{}' delivered to {} listener(s).",
                                        name, count
                                    ),
                                    Err(e) => println!("{} {}", "Error:".red().bold(), e),
                                }
                            } else {
                                println!("Usage: fire <TYPE>");
                            }
                        }
                        "list" => {
                            println!("Registered Listeners:");
                            bus.with_registry(|registry| {
                                for event_type in registry.event_types() {
                                    let ids = registry.listener_ids(&event_type);
                                    println!("  {}:", event_type.to_string().yellow());
                                    for id in ids {
                                        println!("    {}", id);
                                    }
                                }
                            });
                        }
                        "help" => {
                            println!("Available commands:");
                            println!("  type <T> [extends <A,B>]      - Declares an event type and its supertypes.");
                            println!("  add <T[,T]> [id=] [priority=] [before=] [after=]");
                            println!("                                - Registers an echo listener.");
                            println!("  remove <ID>                   - Removes every listener with this id.");
                            println!("  resolve <T>                   - Shows the resolved listener order.");
                            println!("  fire <T>                      - Dispatches an event of type T.");
                            println!("  list                          - Shows listeners per event type.");
                            println!("  exit                          - Quits the shell.");
                        }
                        "exit" => break,
                        _ => println!("Unknown command: '{}'. Type 'help'.", line),
                    }
                }
            }
            Err(_) => {
                println!("Exiting busshell...");
                break;
            }
        }
    }

    Ok(())
}
