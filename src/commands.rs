//! Command-line surface

use clap::{Args, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Sign in and store the session token
  Login {
    #[arg(short, long)]
    username: String,
    /// Read from CMSDECK_PASSWORD or stdin when omitted
    #[arg(short, long)]
    password: Option<String>,
  },
  /// Discard the stored session token
  Logout,
  /// Show the signed-in user
  Whoami,
  Pages {
    #[command(subcommand)]
    action: ResourceAction,
  },
  Tracks {
    #[command(subcommand)]
    action: ResourceAction,
  },
  Playlists {
    #[command(subcommand)]
    action: ResourceAction,
  },
  /// Contact form submissions (read and delete only)
  Contacts {
    #[command(subcommand)]
    action: ContactAction,
  },
  Images {
    #[command(subcommand)]
    action: ImageAction,
  },
  Audios {
    #[command(subcommand)]
    action: AudioAction,
  },
  /// Totals and recent activity
  Dashboard,
  /// Generate HTML page content with the configured AI provider
  Generate {
    topic: String,
    #[arg(long)]
    instructions: Option<String>,
  },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
  #[arg(long)]
  pub page: Option<u32>,
  /// Items per page
  #[arg(long)]
  pub limit: Option<u32>,
  /// Server-side search
  #[arg(short, long)]
  pub search: Option<String>,
  /// Server-side filter as name=value; repeatable
  #[arg(short, long = "filter")]
  pub filters: Vec<String>,
  /// Case-insensitive match within the fetched page
  #[arg(long)]
  pub grep: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ResourceAction {
  List(ListArgs),
  Get {
    id: String,
    /// Look the page up by slug instead of id
    #[arg(long)]
    slug: bool,
  },
  /// Create from a JSON file
  Create {
    #[arg(long)]
    file: PathBuf,
  },
  /// Replace from a JSON file
  Update {
    id: String,
    #[arg(long)]
    file: PathBuf,
  },
  Delete {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum ContactAction {
  List(ListArgs),
  Get { id: String },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ImageAction {
  List {
    /// Extra batches to load after the first
    #[arg(long, default_value_t = 0)]
    more: u32,
  },
  Upload {
    path: PathBuf,
    #[arg(long)]
    folder: Option<String>,
  },
  Delete {
    public_id: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum AudioAction {
  List {
    #[arg(long)]
    folder: Option<String>,
    #[arg(long, default_value_t = 0)]
    more: u32,
  },
  Upload {
    path: PathBuf,
    #[arg(long)]
    folder: Option<String>,
  },
  Delete {
    public_id: String,
  },
  /// Browse the folder tree; PATH selects a folder
  Folders {
    path: Option<String>,
    /// Show the parent of PATH instead
    #[arg(long)]
    up: bool,
  },
}

/// Split `name=value` and check the name against the resource's filters.
pub fn parse_filter(raw: &str, allowed: &[&str]) -> Result<(String, String)> {
  let (name, value) = raw
    .split_once('=')
    .ok_or_else(|| eyre!("Filter must look like name=value, got {:?}", raw))?;
  let name = name.trim();

  if !allowed.contains(&name) {
    return Err(if allowed.is_empty() {
      eyre!("This resource has no filters")
    } else {
      eyre!("Unknown filter {:?}; expected one of {}", name, allowed.join(", "))
    });
  }

  Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct TestCli {
    #[command(subcommand)]
    command: Command,
  }

  #[test]
  fn test_parse_filter() {
    let allowed = &["group", "visibility"];
    assert_eq!(
      parse_filter("group = live", allowed).unwrap(),
      ("group".to_string(), "live".to_string())
    );
    assert_eq!(parse_filter("visibility=", allowed).unwrap().1, "");
    assert!(parse_filter("group", allowed).is_err());
    assert!(parse_filter("author=x", allowed)
      .unwrap_err()
      .to_string()
      .contains("group, visibility"));
    assert!(parse_filter("a=b", &[]).is_err());
  }

  #[test]
  fn test_list_args_parse() {
    let cli = TestCli::try_parse_from([
      "cmsdeck", "pages", "list", "--page", "2", "-s", "news", "-f", "status=draft", "-f",
      "tag=jazz",
    ])
    .unwrap();
    match cli.command {
      Command::Pages {
        action: ResourceAction::List(args),
      } => {
        assert_eq!(args.page, Some(2));
        assert_eq!(args.search.as_deref(), Some("news"));
        assert_eq!(args.filters, vec!["status=draft", "tag=jazz"]);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn test_audio_folders_parse() {
    let cli = TestCli::try_parse_from(["cmsdeck", "audios", "folders", "albums/live"]).unwrap();
    assert!(matches!(
      cli.command,
      Command::Audios {
        action: AudioAction::Folders { path: Some(ref p), up: false }
      } if p == "albums/live"
    ));

    let cli = TestCli::try_parse_from(["cmsdeck", "audios", "folders", "albums/live", "--up"]).unwrap();
    assert!(matches!(
      cli.command,
      Command::Audios {
        action: AudioAction::Folders { up: true, .. }
      }
    ));
  }
}
