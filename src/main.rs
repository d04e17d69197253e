mod commands;

use clap::Parser;
use cmsdeck::auth::{SqliteTokenStore, TokenStore};
use cmsdeck::cache::{Cacheable, ListSlice};
use cmsdeck::cms::{filters, slugify, CachedCmsClient, ContentGenerator, Page, PageInput, Store};
use cmsdeck::config::Config;
use cmsdeck::logging;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use commands::{AudioAction, Command, ContactAction, ImageAction, ListArgs, ResourceAction};

#[derive(Parser, Debug)]
#[command(name = "cmsdeck")]
#[command(about = "Command-line client for the CMS admin backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/cmsdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&SqliteTokenStore::data_dir()?.join("logs"))?;

  let tokens: Arc<dyn TokenStore> = Arc::new(SqliteTokenStore::open()?);
  let client = CachedCmsClient::new(&config, Store::new(&config.cache), tokens)?;

  match args.command {
    Command::Login { username, password } => {
      let password = match password {
        Some(p) => p,
        None => read_password()?,
      };
      let user = client.login(&username, &password).await?;
      println!("Signed in as {} ({})", user.username, user.role);
    }
    Command::Logout => {
      client.logout();
      println!("Signed out");
    }
    Command::Generate {
      topic,
      instructions,
    } => {
      let generate = config
        .generate
        .as_ref()
        .ok_or_else(|| eyre!("No `generate` section in the configuration"))?;
      let key = Config::get_generate_key(generate.provider)?;
      let generator = ContentGenerator::new(generate, key)?;
      println!("{}", generator.generate(&topic, instructions.as_deref()).await?);
    }
    command => {
      let status = client.bootstrap().await?;
      if !status.is_authenticated() {
        return Err(eyre!("Not signed in. Run `cmsdeck login` first."));
      }
      run(&client, command).await?;
    }
  }

  Ok(())
}

fn read_password() -> Result<String> {
  if let Ok(password) = std::env::var("CMSDECK_PASSWORD") {
    return Ok(password);
  }
  eprint!("Password: ");
  let mut line = String::new();
  std::io::stdin()
    .lock()
    .read_line(&mut line)
    .map_err(|e| eyre!("Failed to read password: {}", e))?;
  Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn run(client: &CachedCmsClient, command: Command) -> Result<()> {
  let store = client.store();

  match command {
    Command::Whoami => match client.session().user() {
      Some(user) => println!("{} <{}> {}", user.username, user.email, user.role),
      None => println!("Signed in (server unreachable, user not verified)"),
    },

    Command::Pages { action } => match action {
      ResourceAction::List(args) => {
        apply_list_args(&store.pages, &args, filters::PAGES)?;
        client.pages(false).await?;
        print_list(&store.pages, args.grep.as_deref(), |p| {
          format!(
            "{}  {}  /{}  [{}]",
            p.id,
            p.title,
            p.slug,
            p.status.as_deref().unwrap_or("draft")
          )
        });
      }
      ResourceAction::Get { id, slug } => {
        let page = if slug {
          client.get_page_by_slug(&id).await?
        } else {
          client.get_page(&id).await?
        };
        print_json(&page)?;
      }
      ResourceAction::Create { file } => {
        let mut input: PageInput = read_json(&file)?;
        if input.slug.trim().is_empty() {
          input.slug = slugify(&input.title);
        }
        let page = client.create_page(&input).await?;
        println!("Created page {} /{}", page.id, page.slug);
      }
      ResourceAction::Update { id, file } => {
        let page: Page = client.update_page(&id, &read_json(&file)?).await?;
        println!("Updated page {}", page.id);
      }
      ResourceAction::Delete { id } => {
        client.delete_page(&id).await?;
        println!("Deleted page {}", id);
      }
    },

    Command::Tracks { action } => match action {
      ResourceAction::List(args) => {
        apply_list_args(&store.tracks, &args, filters::TRACKS)?;
        client.tracks(false).await?;
        print_list(&store.tracks, args.grep.as_deref(), |t| {
          format!(
            "{}  {}  {}  {}",
            t.id,
            t.title,
            t.artist.as_deref().unwrap_or("-"),
            if t.is_public { "public" } else { "private" }
          )
        });
      }
      ResourceAction::Get { id, slug } => {
        reject_slug(slug)?;
        print_json(&client.get_track(&id).await?)?;
      }
      ResourceAction::Create { file } => {
        let track = client.create_track(&read_json(&file)?).await?;
        println!("Created track {}", track.id);
      }
      ResourceAction::Update { id, file } => {
        let track = client.update_track(&id, &read_json(&file)?).await?;
        println!("Updated track {}", track.id);
      }
      ResourceAction::Delete { id } => {
        client.delete_track(&id).await?;
        println!("Deleted track {}", id);
      }
    },

    Command::Playlists { action } => match action {
      ResourceAction::List(args) => {
        apply_list_args(&store.playlists, &args, filters::PLAYLISTS)?;
        client.playlists(false).await?;
        print_list(&store.playlists, args.grep.as_deref(), |p| {
          format!("{}  {}  {} tracks", p.id, p.name, p.tracks.len())
        });
      }
      ResourceAction::Get { id, slug } => {
        reject_slug(slug)?;
        print_json(&client.get_playlist(&id).await?)?;
      }
      ResourceAction::Create { file } => {
        let playlist = client.create_playlist(&read_json(&file)?).await?;
        println!("Created playlist {}", playlist.id);
      }
      ResourceAction::Update { id, file } => {
        let playlist = client.update_playlist(&id, &read_json(&file)?).await?;
        println!("Updated playlist {}", playlist.id);
      }
      ResourceAction::Delete { id } => {
        client.delete_playlist(&id).await?;
        println!("Deleted playlist {}", id);
      }
    },

    Command::Contacts { action } => match action {
      ContactAction::List(args) => {
        apply_list_args(&store.contacts, &args, filters::CONTACTS)?;
        client.contacts(false).await?;
        print_list(&store.contacts, args.grep.as_deref(), |c| {
          format!(
            "{}  {} <{}>  {}",
            c.id,
            c.name,
            c.email,
            c.subject.as_deref().unwrap_or("")
          )
        });
      }
      ContactAction::Get { id } => print_json(&client.get_contact(&id).await?)?,
      ContactAction::Delete { id } => {
        client.delete_contact(&id).await?;
        println!("Deleted contact {}", id);
      }
    },

    Command::Images { action } => match action {
      ImageAction::List { more } => {
        client.images(false).await?;
        for _ in 0..more {
          if client.load_more_images().await?.is_none() {
            break;
          }
        }
        store.images.read(|state| {
          for image in state.items() {
            println!("{}  {}", image.public_id, image.secure_url);
          }
          if state.has_more() {
            println!("(more available)");
          }
        });
      }
      ImageAction::Upload { path, folder } => {
        let image = client.upload_image(&path, folder.as_deref()).await?;
        println!("Uploaded {}", image.secure_url);
      }
      ImageAction::Delete { public_id } => {
        client.delete_image(&public_id).await?;
        println!("Deleted image {}", public_id);
      }
    },

    Command::Audios { action } => match action {
      AudioAction::List { folder, more } => {
        client.audios(folder.as_deref(), false).await?;
        for _ in 0..more {
          if client.load_more_audios().await?.is_none() {
            break;
          }
        }
        store.audios.read(|state| {
          for audio in state.items() {
            println!(
              "{}  {}  {}",
              audio.public_id,
              audio
                .duration
                .map(|d| format!("{:.0}s", d))
                .unwrap_or_else(|| "-".to_string()),
              audio.secure_url
            );
          }
          if state.has_more() {
            println!("(more available)");
          }
        });
      }
      AudioAction::Upload { path, folder } => {
        let audio = client.upload_audio(&path, folder.as_deref()).await?;
        println!("Uploaded {}", audio.secure_url);
      }
      AudioAction::Delete { public_id } => {
        client.delete_audio(&public_id).await?;
        println!("Deleted audio {}", public_id);
      }
      AudioAction::Folders { path, up } => {
        client.audio_folders(false).await?;
        if !store.audio_folders.select(path.as_deref()) && path.is_some() {
          return Err(eyre!("No folder at {}", path.unwrap_or_default()));
        }
        if up && !store.audio_folders.navigate_up() {
          return Err(eyre!("Already at the root folder"));
        }
        store.audio_folders.read(|state| {
          let trail: Vec<_> = state.breadcrumbs().into_iter().map(|b| b.label).collect();
          println!("{}", trail.join(" / "));
          for child in state.children() {
            println!("  {}/  ({} audios)", child.name, child.item_count);
          }
          for audio in state.selected_items() {
            println!("  {}", audio.public_id);
          }
        });
      }
    },

    Command::Dashboard => {
      let stats = client.dashboard(false).await?.data;
      println!(
        "pages {}  tracks {}  playlists {}  contacts {}",
        stats.total_pages, stats.total_tracks, stats.total_playlists, stats.total_contacts
      );
      println!("\nRecent pages:");
      for page in &stats.recent_pages {
        println!("  {}  /{}", page.title, page.slug);
      }
      println!("\nRecent contacts:");
      for contact in &stats.recent_contacts {
        println!("  {} <{}>", contact.name, contact.email);
      }
    }

    Command::Login { .. } | Command::Logout | Command::Generate { .. } => {}
  }

  Ok(())
}

fn apply_list_args<T: Cacheable>(slice: &ListSlice<T>, args: &ListArgs, allowed: &[&str]) -> Result<()> {
  if let Some(limit) = args.limit {
    if limit == 0 {
      return Err(eyre!("--limit must be greater than zero"));
    }
    slice.set_page_size(limit);
  }
  if let Some(search) = &args.search {
    slice.set_search(search);
  }
  for raw in &args.filters {
    let (name, value) = commands::parse_filter(raw, allowed)?;
    slice.set_filter(&name, Some(&value));
  }
  // Search and filter changes reset the page, so the page goes last
  if let Some(page) = args.page {
    slice.set_page(page);
  }
  Ok(())
}

fn print_list<T: Cacheable>(slice: &ListSlice<T>, grep: Option<&str>, line: impl Fn(&T) -> String) {
  slice.read(|state| {
    let items: Vec<&T> = match grep {
      Some(needle) => state.filter_local(needle),
      None => state.items().iter().collect(),
    };
    for item in items {
      println!("{}", line(item));
    }
    let p = state.pagination();
    println!(
      "page {}/{}  ({} total)",
      p.page,
      p.total_pages.max(1),
      p.total_items
    );
  });
}

fn reject_slug(slug: bool) -> Result<()> {
  if slug {
    return Err(eyre!("--slug only applies to pages"));
  }
  Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
  serde_json::from_str(&contents).map_err(|e| eyre!("Invalid JSON in {}: {}", path.display(), e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
