//! Interactive session: one stdin command per UI action.

use crate::controller::Controller;
use crate::text;
use anyhow::Result;
use facefind_api::Backend;
use facefind_core::render;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  open <path>      open a JPEG image (other types are ignored)
  select <n>       select face n and look up similar faces
  show             print the current session
  render <path>    write the current session as an HTML page
  url [<backend>]  show or change the backend URL for images opened next
  help             show this help
  quit             leave";

#[derive(Debug, PartialEq)]
pub enum Command {
    Open(PathBuf),
    Select(usize),
    Show,
    Render(PathBuf),
    Url(Option<String>),
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        let command = match (verb, arg) {
            ("open" | "o", "") | ("render" | "r", "") => {
                return Err(format!("{verb}: missing path"));
            }
            ("open" | "o", path) => Command::Open(PathBuf::from(path)),
            ("select" | "s", n) => Command::Select(
                n.parse()
                    .map_err(|_| format!("select: expected a face number, got {n:?}"))?,
            ),
            ("show", "") => Command::Show,
            ("render" | "r", path) => Command::Render(PathBuf::from(path)),
            ("url", "") => Command::Url(None),
            ("url", url) => Command::Url(Some(url.to_string())),
            ("help" | "?", _) => Command::Help,
            ("quit" | "q" | "exit", _) => Command::Quit,
            _ => return Err(format!("unknown command: {line} (try help)")),
        };
        Ok(Some(command))
    }
}

/// Run commands from stdin until `quit` or end of input, applying request
/// completions as they arrive in between.
pub async fn run<B: Backend>(controller: &mut Controller<B>, crop_size: u32) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(err) = execute(controller, command, crop_size).await {
                            eprintln!("error: {err:#}");
                        }
                    }
                    Ok(None) => {}
                    Err(msg) => eprintln!("{msg}"),
                }
            }
            true = controller.next_completion(), if controller.in_flight() > 0 => {
                print!("{}", text::session_summary(controller.session()));
            }
        }
    }
    Ok(())
}

async fn execute<B: Backend>(
    controller: &mut Controller<B>,
    command: Command,
    crop_size: u32,
) -> Result<()> {
    match command {
        Command::Open(path) => {
            if controller.open_path(&path).await? {
                print!("{}", text::session_summary(controller.session()));
            }
        }
        Command::Select(index) => {
            controller.select(index);
            print!("{}", text::session_summary(controller.session()));
        }
        Command::Show => print!("{}", text::session_summary(controller.session())),
        Command::Render(path) => {
            tokio::fs::write(&path, render::report_html(controller.session(), crop_size)).await?;
            println!("wrote {}", path.display());
        }
        Command::Url(None) => println!("{}", controller.backend_url()),
        Command::Url(Some(url)) => {
            facefind_api::client::endpoint(&url, "")?;
            controller.set_backend_url(url);
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}
