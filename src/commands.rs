use std::path::PathBuf;

use crate::error::{AppError, Result};

pub const USAGE: &str = "\
usage: feedwatch [--config <path>] [command]

commands:
  run                       poll feeds until interrupted (default)
  check                     run a single check and exit
  add-source <url>          add an RSS feed
  remove-source <url>       remove an RSS feed
  add-keyword <word>        add a keyword
  remove-keyword <word>     remove a keyword
  list                      show feeds and keywords
  news [limit] [--json]     show the latest matching items
  help                      show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Check,
    AddSource(String),
    RemoveSource(String),
    AddKeyword(String),
    RemoveKeyword(String),
    List,
    News { limit: Option<usize>, json: bool },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

/// Parse the arguments following the program name.
pub fn parse_args<I, S>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args: Vec<String> = args.into_iter().map(Into::into).collect();

    let mut config_path = None;
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        if pos + 1 >= args.len() {
            return Err(usage("--config needs a path"));
        }
        config_path = Some(PathBuf::from(args.remove(pos + 1)));
        args.remove(pos);
    }

    let mut rest = args.into_iter();
    let command = match rest.next().as_deref() {
        None | Some("run") => Command::Run,
        Some("check") => Command::Check,
        Some("add-source") => Command::AddSource(value(rest.next(), "add-source needs a url")?),
        Some("remove-source") => {
            Command::RemoveSource(value(rest.next(), "remove-source needs a url")?)
        }
        Some("add-keyword") => {
            Command::AddKeyword(value(rest.next(), "add-keyword needs a word")?)
        }
        Some("remove-keyword") => {
            Command::RemoveKeyword(value(rest.next(), "remove-keyword needs a word")?)
        }
        Some("list") => Command::List,
        Some("news") => {
            let mut limit = None;
            let mut json = false;
            for arg in rest.by_ref() {
                if arg == "--json" {
                    json = true;
                } else {
                    let n = arg
                        .parse::<usize>()
                        .map_err(|_| usage(&format!("invalid limit {arg:?}")))?;
                    limit = Some(n);
                }
            }
            Command::News { limit, json }
        }
        Some("help") | Some("-h") | Some("--help") => Command::Help,
        Some(other) => return Err(usage(&format!("unknown command {other:?}"))),
    };

    if let Some(extra) = rest.next() {
        return Err(usage(&format!("unexpected argument {extra:?}")));
    }

    Ok(Invocation {
        config_path,
        command,
    })
}

fn value(arg: Option<String>, message: &str) -> Result<String> {
    arg.ok_or_else(|| usage(message))
}

fn usage(message: &str) -> AppError {
    AppError::Usage(format!("{message}\n\n{USAGE}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> Command {
        parse_args(args.iter().copied()).unwrap().command
    }

    #[test]
    fn defaults_to_run() {
        assert_eq!(command(&[]), Command::Run);
        assert_eq!(command(&["run"]), Command::Run);
    }

    #[test]
    fn parses_management_commands() {
        assert_eq!(
            command(&["add-source", "http://x/rss"]),
            Command::AddSource("http://x/rss".to_string())
        );
        assert_eq!(
            command(&["remove-keyword", "funding"]),
            Command::RemoveKeyword("funding".to_string())
        );
        assert_eq!(
            command(&["news", "5", "--json"]),
            Command::News {
                limit: Some(5),
                json: true
            }
        );
        assert_eq!(
            command(&["news"]),
            Command::News {
                limit: None,
                json: false
            }
        );
    }

    #[test]
    fn config_flag_anywhere() {
        let invocation = parse_args(["check", "--config", "/tmp/fw.toml"]).unwrap();
        assert_eq!(invocation.command, Command::Check);
        assert_eq!(invocation.config_path, Some(PathBuf::from("/tmp/fw.toml")));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(["add-source"]).is_err());
        assert!(parse_args(["news", "many"]).is_err());
        assert!(parse_args(["list", "extra"]).is_err());
        assert!(parse_args(["frobnicate"]).is_err());
        assert!(parse_args(["--config"]).is_err());
    }
}
