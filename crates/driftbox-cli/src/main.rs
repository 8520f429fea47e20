//! driftbox: command-line client for the driftbox end-to-end encrypted
//! cloud storage service.
//!
//! Commands:
//!   login                      - authenticate and store credentials locally
//!   ls <path>                  - list a folder's children
//!   mkdir <path>                - create a folder (and its missing ancestors)
//!   upload / up <sources..> <target>   - upload one or more files/directories
//!   download <remote> [<local>]        - download a file or folder tree
//!   mv <from> <to>              - move or rename a file or folder
//!   rename <path> <new-name>    - rename in place
//!   trash <path>                - move to trash
//!   restore <id>                 - restore a trashed item by id
//!   rm <path>                    - permanently delete
//!   search <query>                - substring search from the root
//!   find <start> <pattern>        - glob search under a starting folder
//!   tree [<path>]                 - print a folder tree
//!   copy <from> <to>              - copy a single remote file
//!   verify <path>                 - recompute a local file's hash against the remote record

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use driftbox_core::config::DriftboxConfig;
use driftbox_core::types::{ConflictPolicy, Credentials, OperationKind};
use driftbox_crypto::{derive_auth, envelope_decrypt, AuthVersion, MasterKey, MasterKeyRing};
use driftbox_fs::FsContext;
use driftbox_transport::TransportClient;

// ── CLI structure ───────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "driftbox",
    version,
    about = "driftbox end-to-end encrypted storage client",
    long_about = "driftbox: manage an end-to-end encrypted cloud storage account from the command line"
)]
struct Cli {
    /// Path to driftbox.toml configuration file
    #[arg(long, short = 'c', env = "DRIFTBOX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate and store credentials locally
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// List a folder's children
    Ls {
        /// Remote path (default: root)
        path: Option<String>,
    },
    /// Create a folder, creating missing ancestors
    Mkdir { path: String },
    /// Upload one or more local files/directories
    #[command(alias = "up")]
    Upload {
        /// Local source files or directories
        sources: Vec<String>,
        /// Remote destination folder
        #[arg(long, short = 't')]
        target: String,
        /// Recurse into directory sources
        #[arg(long, short = 'r')]
        recursive: bool,
        /// What to do when the destination already exists
        #[arg(long, value_enum, default_value = "skip")]
        conflict: ConflictArg,
        /// Proceed regardless of conflicts
        #[arg(long)]
        force: bool,
        /// Glob patterns to include (repeatable)
        #[arg(long = "include")]
        include: Vec<String>,
        /// Glob patterns to exclude (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Download a remote file or folder tree
    Download {
        /// Remote path to a file or folder
        remote_path: String,
        /// Local destination (default: current directory)
        local_dest: Option<PathBuf>,
        /// Recurse into folders
        #[arg(long, short = 'r')]
        recursive: bool,
        #[arg(long, value_enum, default_value = "skip")]
        conflict: ConflictArg,
        #[arg(long)]
        force: bool,
        #[arg(long = "include")]
        include: Vec<String>,
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Move or rename a file or folder
    Mv { from: String, to: String },
    /// Rename a file or folder in place
    Rename { path: String, new_name: String },
    /// Move a file or folder to the trash
    Trash { path: String },
    /// Restore a trashed item by id
    Restore {
        id: String,
        /// Whether the id names a folder rather than a file
        #[arg(long)]
        folder: bool,
    },
    /// Permanently delete a file or folder
    Rm { path: String },
    /// Substring search across the whole account
    Search { query: String },
    /// Glob search starting from a folder
    Find {
        start: String,
        pattern: String,
        #[arg(long, default_value_t = -1)]
        max_depth: i64,
    },
    /// Print a folder tree
    Tree {
        path: Option<String>,
        #[arg(long, default_value_t = 5)]
        max_depth: u32,
    },
    /// Copy a single remote file
    Copy { from: String, to: String },
    /// Recompute a local file's hash and compare it against the remote record
    Verify { local_path: PathBuf, remote_path: String },
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum ConflictArg {
    Skip,
    Overwrite,
    Newer,
    Interactive,
}

impl From<ConflictArg> for ConflictPolicy {
    fn from(v: ConflictArg) -> Self {
        match v {
            ConflictArg::Skip => ConflictPolicy::Skip,
            ConflictArg::Overwrite => ConflictPolicy::Overwrite,
            ConflictArg::Newer => ConflictPolicy::Newer,
            ConflictArg::Interactive => ConflictPolicy::Interactive,
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("driftbox.toml"));
    let config = load_config(&config_path).await?;
    init_tracing(&config);

    if let Commands::Login { email } = &cli.command {
        return cmd_login(&config, email.clone()).await;
    }

    let creds = load_credentials(&config)?;
    let ring = build_master_key_ring(&creds)?;
    let transport = TransportClient::new(config.transport.clone()).context("building HTTP client")?;
    let ctx = FsContext::new(
        transport,
        creds.api_key.clone(),
        creds.email.clone(),
        ring,
        Duration::from_secs(config.cache.listing_ttl_secs),
    );
    let root_id = creds.base_folder_id.clone();

    match cli.command {
        Commands::Login { .. } => unreachable!("handled above"),
        Commands::Ls { path } => cmd_ls(&ctx, &root_id, path.as_deref().unwrap_or("/")).await,
        Commands::Mkdir { path } => cmd_mkdir(&ctx, &root_id, &path).await,
        Commands::Upload {
            sources,
            target,
            recursive,
            conflict,
            force,
            include,
            exclude,
        } => {
            cmd_upload(
                &ctx,
                &config,
                &root_id,
                &sources,
                &target,
                recursive,
                conflict.into(),
                force,
                &include,
                &exclude,
            )
            .await
        }
        Commands::Download {
            remote_path,
            local_dest,
            recursive,
            conflict,
            force,
            include,
            exclude,
        } => {
            let dest = local_dest.unwrap_or_else(|| PathBuf::from("."));
            cmd_download(
                &ctx,
                &config,
                &root_id,
                &remote_path,
                &dest,
                recursive,
                conflict.into(),
                force,
                &include,
                &exclude,
            )
            .await
        }
        Commands::Mv { from, to } => cmd_mv(&ctx, &root_id, &from, &to).await,
        Commands::Rename { path, new_name } => cmd_rename(&ctx, &root_id, &path, &new_name).await,
        Commands::Trash { path } => cmd_trash(&ctx, &root_id, &path).await,
        Commands::Restore { id, folder } => cmd_restore(&ctx, &id, folder).await,
        Commands::Rm { path } => cmd_rm(&ctx, &root_id, &path).await,
        Commands::Search { query } => cmd_search(&ctx, &root_id, &query).await,
        Commands::Find {
            start,
            pattern,
            max_depth,
        } => cmd_find(&ctx, &root_id, &start, &pattern, max_depth).await,
        Commands::Tree { path, max_depth } => {
            cmd_tree(&ctx, &root_id, path.as_deref().unwrap_or("/"), max_depth).await
        }
        Commands::Copy { from, to } => cmd_copy(&ctx, &root_id, &from, &to).await,
        Commands::Verify {
            local_path,
            remote_path,
        } => cmd_verify(&ctx, &root_id, &local_path, &remote_path).await,
    }
}

fn init_tracing(config: &DriftboxConfig) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(&config.logging.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.log_format == "json" {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

async fn load_config(path: &Path) -> Result<DriftboxConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(DriftboxConfig::default())
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_default();
        PathBuf::from(format!("{home}/{rest}"))
    } else {
        path.to_path_buf()
    }
}

fn credentials_path(config: &DriftboxConfig) -> PathBuf {
    expand_tilde(&config.state.credentials_file())
}

fn load_credentials(config: &DriftboxConfig) -> Result<Credentials> {
    let path = credentials_path(config);
    if !path.exists() {
        anyhow::bail!("no credentials found at {}; run `driftbox login` first", path.display());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("reading credentials: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing credentials: {}", path.display()))
}

fn save_credentials(config: &DriftboxConfig, creds: &Credentials) -> Result<()> {
    let path = credentials_path(config);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating state dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(creds).context("serializing credentials")?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &json).with_context(|| format!("writing: {}", tmp.display()))?;
    std::fs::rename(&tmp, &path).with_context(|| format!("renaming into place: {}", path.display()))?;
    Ok(())
}

fn build_master_key_ring(creds: &Credentials) -> Result<MasterKeyRing> {
    let keys = creds
        .master_keys
        .iter()
        .map(|k| MasterKey::new(k.clone()))
        .collect();
    MasterKeyRing::new(keys)
}

// ── `driftbox login` ─────────────────────────────────────────────────────────

#[derive(serde::Serialize)]
struct AuthInfoRequest<'a> {
    email: &'a str,
}

#[derive(serde::Deserialize)]
struct AuthInfoResponse {
    salt: String,
    #[serde(rename = "authVersion")]
    auth_version: u32,
}

#[derive(serde::Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(rename = "twoFactorCode", skip_serializing_if = "Option::is_none")]
    two_factor_code: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct LoginResponse {
    #[serde(rename = "apiKey")]
    api_key: String,
    #[serde(rename = "masterKeys")]
    master_keys: Vec<String>,
    #[serde(rename = "baseFolderUUID")]
    base_folder_id: String,
    #[serde(rename = "id")]
    user_id: u64,
}

async fn cmd_login(config: &DriftboxConfig, email_arg: Option<String>) -> Result<()> {
    let email = match email_arg {
        Some(e) => e,
        None => {
            print!("Email: ");
            use std::io::Write;
            std::io::stdout().flush().ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).context("reading email")?;
            line.trim().to_string()
        }
    };
    let password = rpassword::prompt_password("Password: ").context("reading password")?;
    let password = SecretString::from(password);

    let transport = TransportClient::new(config.transport.clone()).context("building HTTP client")?;

    let info: AuthInfoResponse = transport
        .post_json("/v3/auth/info", None, &AuthInfoRequest { email: &email })
        .await
        .context("fetching account salt")?;
    let version = AuthVersion::from_u32(info.auth_version)?;
    let derived = derive_auth(&password, &info.salt, version);

    let mut two_factor_code: Option<String> = None;
    let login: LoginResponse = loop {
        let req = LoginRequest {
            email: &email,
            password: &derived.login_password,
            two_factor_code: two_factor_code.as_deref(),
        };
        match transport.post_json("/v3/login", None, &req).await {
            Ok(resp) => break resp,
            Err(driftbox_core::error::DriftboxError::AuthChallenge(code)) if code == "enter_2fa" => {
                let code = rpassword::prompt_password("Two-factor code: ").context("reading 2FA code")?;
                two_factor_code = Some(code);
            }
            Err(e) => return Err(e).context("login failed"),
        }
    };

    let master_keys: Result<Vec<String>> = login
        .master_keys
        .iter()
        .map(|envelope| {
            envelope_decrypt(&derived.local_master_key, envelope)
                .map_err(|e| anyhow::anyhow!("decrypting master key: {e}"))
                .and_then(|bytes| String::from_utf8(bytes).context("master key is not valid UTF-8"))
        })
        .collect();
    let master_keys = master_keys?;

    let creds = Credentials {
        email: email.clone(),
        api_key: login.api_key,
        master_keys,
        base_folder_id: login.base_folder_id,
        user_id: login.user_id,
    };
    save_credentials(config, &creds)?;

    println!("Logged in as {email}.");
    println!("Credentials saved to {}", credentials_path(config).display());
    Ok(())
}

// ── `driftbox ls` ─────────────────────────────────────────────────────────────

async fn cmd_ls(ctx: &FsContext, root_id: &str, path: &str) -> Result<()> {
    let resolved = driftbox_fs::resolve_path(ctx, root_id, path).await?;
    let folder_id = match &resolved.kind {
        driftbox_core::types::ResolvedKind::Folder(f) => f.id.clone(),
        driftbox_core::types::ResolvedKind::File(_) => {
            anyhow::bail!("{path} is a file, not a folder");
        }
    };
    let (mut folders, mut files) = ctx.list_children(&folder_id).await?;
    folders.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    files.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    for folder in &folders {
        println!("{}/", folder.name);
    }
    for file in &files {
        println!("{}\t{}", file.name, fmt_bytes(file.size));
    }
    Ok(())
}

// ── `driftbox mkdir` ───────────────────────────────────────────────────────

async fn cmd_mkdir(ctx: &FsContext, root_id: &str, path: &str) -> Result<()> {
    let id = driftbox_fs::ops::mkdir_recursive(ctx, root_id, path, None, None).await?;
    println!("Created {path} ({id})");
    Ok(())
}

// ── `driftbox upload` ──────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
async fn cmd_upload(
    ctx: &FsContext,
    config: &DriftboxConfig,
    root_id: &str,
    sources: &[String],
    target: &str,
    recursive: bool,
    conflict: ConflictPolicy,
    force: bool,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let filter = driftbox_batch::TaskFilter::new(include, exclude)?;
    let tasks = driftbox_batch::build_upload_tasks(sources, target, recursive, &filter)?;
    if tasks.is_empty() {
        println!("Nothing to upload.");
        return Ok(());
    }

    let batch_id = driftbox_batch::batch_id(OperationKind::Upload, sources, target);
    let state_path = expand_tilde(&config.state.batch_state_file(&batch_id));
    let store = driftbox_batch::BatchStateStore::new(state_path);

    let mut state = store.load()?.unwrap_or(driftbox_core::types::BatchState {
        operation: OperationKind::Upload,
        target_remote_path: target.to_string(),
        local_destination: None,
        tasks,
    });

    let pb = make_progress_bar(state.tasks.len() as u64, "upload");
    let options = driftbox_batch::RunOptions {
        policy: conflict,
        force,
        persist_every_chunks: config.batch.persist_every_chunks,
        persist_every_secs: config.batch.persist_every_secs,
        interactive_prompt: Some(Box::new(confirm_overwrite)),
    };

    let summary = driftbox_batch::run_batch(ctx, root_id, &store, &mut state, options).await?;
    pb.set_position(summary.completed as u64);
    pb.finish_with_message("done");

    println!();
    println!("Upload complete:");
    println!("  completed: {}", summary.completed);
    println!("  skipped:   {}", summary.skipped);
    println!("  errored:   {}", summary.errored);
    if summary.errored > 0 {
        println!("  state kept at: {}", store.path().display());
        anyhow::bail!("{} task(s) failed; re-run to resume", summary.errored);
    }
    Ok(())
}

// ── `driftbox download` ────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
async fn cmd_download(
    ctx: &FsContext,
    config: &DriftboxConfig,
    root_id: &str,
    remote_path: &str,
    local_dest: &Path,
    recursive: bool,
    conflict: ConflictPolicy,
    force: bool,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let filter = driftbox_batch::TaskFilter::new(include, exclude)?;
    let tasks =
        driftbox_batch::build_download_tasks(ctx, root_id, remote_path, local_dest, recursive, &filter)
            .await?;
    if tasks.is_empty() {
        println!("Nothing to download.");
        return Ok(());
    }

    let batch_id = driftbox_batch::batch_id(
        OperationKind::Download,
        &[remote_path.to_string()],
        &local_dest.to_string_lossy(),
    );
    let state_path = expand_tilde(&config.state.batch_state_file(&batch_id));
    let store = driftbox_batch::BatchStateStore::new(state_path);

    let mut state = store.load()?.unwrap_or(driftbox_core::types::BatchState {
        operation: OperationKind::Download,
        target_remote_path: remote_path.to_string(),
        local_destination: Some(local_dest.to_string_lossy().to_string()),
        tasks,
    });

    let pb = make_progress_bar(state.tasks.len() as u64, "download");
    let options = driftbox_batch::RunOptions {
        policy: conflict,
        force,
        persist_every_chunks: config.batch.persist_every_chunks,
        persist_every_secs: config.batch.persist_every_secs,
        interactive_prompt: Some(Box::new(confirm_overwrite)),
    };

    let summary = driftbox_batch::run_batch(ctx, root_id, &store, &mut state, options).await?;
    pb.set_position(summary.completed as u64);
    pb.finish_with_message("done");

    println!();
    println!("Download complete:");
    println!("  completed: {}", summary.completed);
    println!("  skipped:   {}", summary.skipped);
    println!("  errored:   {}", summary.errored);
    if summary.errored > 0 {
        println!("  state kept at: {}", store.path().display());
        anyhow::bail!("{} task(s) failed; re-run to resume", summary.errored);
    }
    Ok(())
}

fn confirm_overwrite(what: &str) -> bool {
    print!("{what} already exists, overwrite? [y/N] ");
    use std::io::Write;
    std::io::stdout().flush().ok();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}

// ── `driftbox mv` / `rename` / `trash` / `restore` / `rm` ────────────────────

async fn cmd_mv(ctx: &FsContext, root_id: &str, from: &str, to: &str) -> Result<()> {
    let source = driftbox_fs::resolve_path(ctx, root_id, from).await?;
    let dest = driftbox_fs::resolve_path(ctx, root_id, to).await?;
    let dest_parent_id = match dest.kind {
        driftbox_core::types::ResolvedKind::Folder(f) => f.id,
        driftbox_core::types::ResolvedKind::File(_) => anyhow::bail!("{to} already exists as a file"),
    };

    match source.kind {
        driftbox_core::types::ResolvedKind::Folder(folder) => {
            let source_parent = folder
                .parent_id
                .clone()
                .ok_or_else(|| anyhow::anyhow!("cannot move the root folder"))?;
            driftbox_fs::ops::move_item(ctx, "/v3/dir/move", &folder.id, &source_parent, &dest_parent_id)
                .await?;
        }
        driftbox_core::types::ResolvedKind::File(file) => {
            driftbox_fs::ops::move_item(ctx, "/v3/file/move", &file.id, &file.parent_id, &dest_parent_id)
                .await?;
        }
    }
    println!("Moved {from} -> {to}");
    Ok(())
}

async fn cmd_rename(ctx: &FsContext, root_id: &str, path: &str, new_name: &str) -> Result<()> {
    let resolved = driftbox_fs::resolve_path(ctx, root_id, path).await?;
    match resolved.kind {
        driftbox_core::types::ResolvedKind::Folder(folder) => {
            driftbox_fs::ops::rename_folder(ctx, &folder, new_name).await?;
        }
        driftbox_core::types::ResolvedKind::File(file) => {
            driftbox_fs::ops::rename_file(ctx, &file, new_name).await?;
        }
    }
    println!("Renamed {path} -> {new_name}");
    Ok(())
}

async fn cmd_trash(ctx: &FsContext, root_id: &str, path: &str) -> Result<()> {
    let resolved = driftbox_fs::resolve_path(ctx, root_id, path).await?;
    match resolved.kind {
        driftbox_core::types::ResolvedKind::Folder(folder) => {
            driftbox_fs::ops::trash_folder(ctx, &folder).await?;
        }
        driftbox_core::types::ResolvedKind::File(file) => {
            driftbox_fs::ops::trash_file(ctx, &file).await?;
        }
    }
    println!("Trashed {path}");
    Ok(())
}

async fn cmd_restore(ctx: &FsContext, id: &str, folder: bool) -> Result<()> {
    if folder {
        driftbox_fs::ops::restore_folder(ctx, id).await?;
    } else {
        driftbox_fs::ops::restore_file(ctx, id).await?;
    }
    println!("Restored {id}");
    Ok(())
}

async fn cmd_rm(ctx: &FsContext, root_id: &str, path: &str) -> Result<()> {
    let resolved = driftbox_fs::resolve_path(ctx, root_id, path).await?;
    match resolved.kind {
        driftbox_core::types::ResolvedKind::Folder(folder) => {
            driftbox_fs::ops::delete_folder_permanent(ctx, &folder).await?;
        }
        driftbox_core::types::ResolvedKind::File(file) => {
            driftbox_fs::ops::delete_file_permanent(ctx, &file).await?;
        }
    }
    println!("Permanently deleted {path}");
    Ok(())
}

// ── `driftbox search` / `find` / `tree` ──────────────────────────────────────

async fn cmd_search(ctx: &FsContext, root_id: &str, query: &str) -> Result<()> {
    let matches = driftbox_fs::ops::search(ctx, root_id, query).await?;
    print_matches(&matches);
    Ok(())
}

async fn cmd_find(ctx: &FsContext, root_id: &str, start: &str, pattern: &str, max_depth: i64) -> Result<()> {
    let resolved = driftbox_fs::resolve_path(ctx, root_id, start).await?;
    let start_id = match resolved.kind {
        driftbox_core::types::ResolvedKind::Folder(f) => f.id,
        driftbox_core::types::ResolvedKind::File(_) => anyhow::bail!("{start} is a file, not a folder"),
    };
    let matches = driftbox_fs::ops::find(ctx, &start_id, start, pattern, max_depth).await?;
    print_matches(&matches);
    Ok(())
}

fn print_matches(matches: &[driftbox_fs::ops::FindMatch]) {
    if matches.is_empty() {
        println!("No matches.");
        return;
    }
    for m in matches {
        println!("{}{}", m.path, if m.is_folder { "/" } else { "" });
    }
}

async fn cmd_tree(ctx: &FsContext, root_id: &str, path: &str, max_depth: u32) -> Result<()> {
    let resolved = driftbox_fs::resolve_path(ctx, root_id, path).await?;
    let folder_id = match resolved.kind {
        driftbox_core::types::ResolvedKind::Folder(f) => f.id,
        driftbox_core::types::ResolvedKind::File(_) => anyhow::bail!("{path} is a file, not a folder"),
    };
    let lines = driftbox_fs::ops::tree(ctx, &folder_id, max_depth).await?;
    println!("{path}");
    for line in lines {
        let indent = "  ".repeat(line.depth as usize);
        let suffix = if line.is_folder { "/" } else { "" };
        println!("{indent}{}{suffix}", line.name);
    }
    Ok(())
}

// ── `driftbox copy` ────────────────────────────────────────────────────────

async fn cmd_copy(ctx: &FsContext, root_id: &str, from: &str, to: &str) -> Result<()> {
    let source = driftbox_fs::resolve_path(ctx, root_id, from).await?;
    let file = match source.kind {
        driftbox_core::types::ResolvedKind::File(f) => f,
        driftbox_core::types::ResolvedKind::Folder(_) => {
            return Err(driftbox_fs::ops::copy_folder_unsupported().into());
        }
    };

    let dest_parent = driftbox_fs::resolve_path(ctx, root_id, to).await;
    let (dest_parent_id, dest_name) = match dest_parent {
        Ok(resolved) => match resolved.kind {
            driftbox_core::types::ResolvedKind::Folder(f) => (f.id, file.name.clone()),
            driftbox_core::types::ResolvedKind::File(_) => anyhow::bail!("{to} already exists as a file"),
        },
        Err(_) => {
            let parent_path = Path::new(to).parent().and_then(|p| p.to_str()).unwrap_or("/");
            let name = Path::new(to)
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("invalid destination path: {to}"))?;
            let parent_id = driftbox_fs::ops::mkdir_recursive(ctx, root_id, parent_path, None, None).await?;
            (parent_id, name.to_string())
        }
    };

    let new_id = driftbox_fs::ops::copy_file(ctx, &file, &dest_parent_id, &dest_name).await?;
    println!("Copied {from} -> {to} ({new_id})");
    Ok(())
}

// ── `driftbox verify` ──────────────────────────────────────────────────────

async fn cmd_verify(ctx: &FsContext, root_id: &str, local_path: &Path, remote_path: &str) -> Result<()> {
    let resolved = driftbox_fs::resolve_path(ctx, root_id, remote_path).await?;
    let file = match resolved.kind {
        driftbox_core::types::ResolvedKind::File(f) => f,
        driftbox_core::types::ResolvedKind::Folder(_) => {
            anyhow::bail!("{remote_path} is a folder, not a file");
        }
    };

    let mut hasher = driftbox_crypto::StreamingHasher::new();
    let data = tokio::fs::read(local_path)
        .await
        .with_context(|| format!("reading {}", local_path.display()))?;
    hasher.update(&data);
    let local_hash = hasher.finalize_hex();

    if local_hash == file.total_hash {
        println!("OK: {} matches the remote record", local_path.display());
        Ok(())
    } else {
        println!("MISMATCH: {} does not match the remote record", local_path.display());
        println!("  local:  {local_hash}");
        println!("  remote: {}", file.total_hash);
        Err(driftbox_core::error::DriftboxError::IntegrityMismatch.into())
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_bytes_picks_the_right_unit() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(2048), "2.0 KB");
        assert_eq!(fmt_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(fmt_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn expand_tilde_substitutes_home() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(
            expand_tilde(Path::new("~/.driftbox/credentials.json")),
            PathBuf::from("/home/tester/.driftbox/credentials.json")
        );
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths_alone() {
        assert_eq!(
            expand_tilde(Path::new("/etc/driftbox.toml")),
            PathBuf::from("/etc/driftbox.toml")
        );
    }
}
