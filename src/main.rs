//! lifelog command-line interface

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use lifelog::auth::Authenticator;
use lifelog::config::Config;
use lifelog::error::{LifelogError, Result};
use lifelog::graph::onedrive::OneDriveClient;
use lifelog::graph::onenote::{NewPage, OneNoteClient};

#[derive(Parser)]
#[command(
    name = "lifelog",
    version,
    about = "Capture notes and files into OneNote and OneDrive"
)]
struct Cli {
    /// Path to the configuration file (defaults to ./config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to a Microsoft account
    Auth,
    /// OneNote operations
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Upload files to OneDrive
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Target folder path
        #[arg(short = 'd', long)]
        folder: Option<String>,
    },
    /// OneDrive operations
    Drive {
        #[command(subcommand)]
        command: DriveCommands,
    },
    /// Configuration management
    Config {
        /// What to do with the configuration
        #[arg(value_enum)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Create a note
    Create {
        /// Note title
        title: String,
        /// Note content
        #[arg(short, long, default_value = "")]
        content: String,
        /// Read the content from a file instead
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Target notebook id
        #[arg(long)]
        notebook_id: Option<String>,
        /// Target section id (takes precedence over the notebook)
        #[arg(long)]
        section_id: Option<String>,
    },
    /// List notebooks
    List {
        /// Also show each notebook's sections
        #[arg(short, long)]
        sections: bool,
    },
}

#[derive(Subcommand)]
enum DriveCommands {
    /// List files in a folder
    List {
        /// Folder path (drive root when omitted)
        #[arg(short = 'd', long)]
        folder: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Write a configuration file template
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    let result = match cli.command {
        Commands::Auth => cmd_auth(&config).await,
        Commands::Note { command } => match command {
            NoteCommands::Create {
                title,
                content,
                file,
                notebook_id,
                section_id,
            } => cmd_note_create(&config, title, content, file, notebook_id, section_id).await,
            NoteCommands::List { sections } => cmd_note_list(&config, sections).await,
        },
        Commands::Upload { files, folder } => cmd_upload(&config, &files, folder).await,
        Commands::Drive {
            command: DriveCommands::List { folder },
        } => cmd_drive_list(&config, folder.as_deref()).await,
        Commands::Config { action } => cmd_config(&config, cli.config.as_deref(), action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Build an authenticator and require a usable token
async fn connect(config: &Config) -> Result<Authenticator> {
    config.validate()?;
    let auth = Authenticator::new(config.client_identity());
    if !auth.is_authenticated().await {
        return Err(LifelogError::NotAuthenticated);
    }
    Ok(auth)
}

async fn cmd_auth(config: &Config) -> Result<()> {
    println!("=== Microsoft account sign-in ===");
    config.validate().map_err(|e| {
        eprintln!("Set microsoft.client_id / microsoft.client_secret in config.json,");
        eprintln!("or export MS_CLIENT_ID and MS_CLIENT_SECRET.");
        e
    })?;

    let auth = Authenticator::new(config.client_identity());
    if auth.authenticate().await {
        println!("\nSigned in. OneNote and OneDrive commands are now available.");
        Ok(())
    } else {
        Err(LifelogError::AuthenticationFailed)
    }
}

async fn cmd_note_create(
    config: &Config,
    title: String,
    content: String,
    file: Option<PathBuf>,
    notebook_id: Option<String>,
    section_id: Option<String>,
) -> Result<()> {
    let auth = connect(config).await?;

    let content = match file {
        Some(path) => std::fs::read_to_string(&path).map_err(|e| {
            LifelogError::not_found(format!("could not read {}: {e}", path.display()))
        })?,
        None => content,
    };

    let onenote = OneNoteClient::new(&auth);
    let page = onenote
        .create_page(&NewPage {
            title,
            content,
            notebook_id: notebook_id.or_else(|| config.onenote.default_notebook_id.clone()),
            section_id: section_id.or_else(|| config.onenote.default_section_id.clone()),
        })
        .await?;

    println!("Note created.");
    println!("  id: {}", page.id);
    if let Some(href) = page
        .links
        .as_ref()
        .and_then(|l| l.one_note_web_url.as_ref())
        .map(|l| l.href.as_str())
    {
        println!("  url: {href}");
    }
    Ok(())
}

async fn cmd_note_list(config: &Config, with_sections: bool) -> Result<()> {
    let auth = connect(config).await?;
    let onenote = OneNoteClient::new(&auth);

    let notebooks = onenote.list_notebooks().await?;
    if notebooks.is_empty() {
        println!("No notebooks found.");
        return Ok(());
    }

    for notebook in &notebooks {
        println!("{} ({})", notebook.display_name, notebook.id);
        if with_sections {
            for section in onenote.list_sections(&notebook.id).await? {
                println!("  - {} ({})", section.display_name, section.id);
            }
        }
    }
    Ok(())
}

async fn cmd_upload(config: &Config, files: &[PathBuf], folder: Option<String>) -> Result<()> {
    let auth = connect(config).await?;
    let onedrive = OneDriveClient::new(&auth);

    let folder = folder.unwrap_or_else(|| config.onedrive.default_folder.clone());

    if let [file] = files {
        let item = onedrive.upload_file(file, Some(&folder), None).await?;
        println!("Uploaded {}.", item.name);
        if let Some(size) = item.size {
            println!("  size: {size} bytes");
        }
        if let Some(url) = &item.web_url {
            println!("  url: {url}");
        }
        return Ok(());
    }

    let results = onedrive.upload_files(files, Some(&folder)).await;
    let ok = results.iter().filter(|r| r.is_ok()).count();
    println!("Uploaded {ok}/{} files.", results.len());
    if ok < results.len() {
        return Err(LifelogError::api(0, "some uploads failed"));
    }
    Ok(())
}

async fn cmd_drive_list(config: &Config, folder: Option<&str>) -> Result<()> {
    let auth = connect(config).await?;
    let onedrive = OneDriveClient::new(&auth);

    let items = onedrive.list_files(folder).await?;
    if items.is_empty() {
        println!("Folder is empty.");
        return Ok(());
    }

    println!("{}:", folder.unwrap_or("/"));
    for item in items {
        let marker = if item.is_folder() { "d" } else { "-" };
        match item.size {
            Some(size) => println!("{marker} {:>10}  {}", size, item.name),
            None => println!("{marker} {:>10}  {}", "", item.name),
        }
    }
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("client_id:       {}", mask_or_unset(&config.microsoft.client_id, false));
            println!(
                "client_secret:   {}",
                mask_or_unset(&config.microsoft.client_secret, true)
            );
            println!("redirect_uri:    {}", config.microsoft.redirect_uri);
            println!("scopes:          {}", config.microsoft.scopes.join(" "));
            println!(
                "default notebook: {}",
                config
                    .onenote
                    .default_notebook_id
                    .as_deref()
                    .unwrap_or("(auto)")
            );
            println!("default folder:  {}", config.onedrive.default_folder);
            Ok(())
        }
        ConfigAction::Init => {
            config.save(path)?;
            let shown = path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(lifelog::config::DEFAULT_CONFIG_FILE));
            println!("Configuration written to {}.", shown.display());
            println!("Fill in microsoft.client_id and microsoft.client_secret.");
            Ok(())
        }
    }
}

fn mask_or_unset(value: &str, mask: bool) -> String {
    if value.is_empty() {
        "(not set)".to_string()
    } else if mask {
        "***".to_string()
    } else {
        value.to_string()
    }
}
