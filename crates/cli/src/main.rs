// sheetsync CLI - keep a local CSV mirror of remote spreadsheets and read ranges from it

mod exit_codes;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use sheetsync_client::{
    credentials_path, delete_credentials, load_credentials, save_credentials, Credentials,
    RemoteGrid, SheetsClient,
};
use sheetsync_config::Settings;
use sheetsync_core::{Dimension, FallbackGrid, Grid, GridError, GridSource, SheetRef};
use sheetsync_io::{csv, CachedGrid, SheetCache};

use exit_codes::{
    EXIT_ERROR, EXIT_IO, EXIT_NOT_AUTH, EXIT_NOT_CACHED, EXIT_REMOTE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "ssync")]
#[command(about = "Mirror remote spreadsheets to local CSV and read ranges from either")]
#[command(version)]
struct Cli {
    /// Cache directory (overrides "cache.root" in settings.json)
    #[arg(long, global = true, env = "SSYNC_CACHE_ROOT", value_name = "DIR")]
    cache_root: Option<PathBuf>,

    /// Spreadsheet service endpoint (overrides "remote.apiBase")
    #[arg(long, global = true, env = "SSYNC_API_BASE", value_name = "URL")]
    api_base: Option<String>,

    /// API key for publicly shared spreadsheets
    #[arg(long, global = true, env = "SSYNC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OAuth access token
    #[arg(long, global = true, env = "SSYNC_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every tab of a spreadsheet into the cache
    #[command(after_help = "\
Examples:
  ssync refresh 1AbCdEf
  ssync refresh 1AbCdEf --force")]
    Refresh {
        spreadsheet_id: String,

        /// Download even if the spreadsheet is already cached
        #[arg(long)]
        force: bool,
    },

    /// Print ranges of one tab as CSV
    #[command(after_help = "\
Examples:
  ssync get 1AbCdEf Heroes A1:D10
  ssync get 1AbCdEf 'Loot Table' A1:1 A2:A --cache
  ssync get 1AbCdEf Heroes B2:B --columns")]
    Get {
        spreadsheet_id: String,

        /// Tab title
        sheet: String,

        /// A1 ranges, printed in order and separated by a blank line
        #[arg(required = true)]
        ranges: Vec<String>,

        /// Read the local cache only
        #[arg(long)]
        cache: bool,

        /// Column-major output (each CSV line is one column)
        #[arg(long)]
        columns: bool,
    },

    /// List cached spreadsheets, or the cached tabs of one
    List { spreadsheet_id: Option<String> },

    /// Save --api-key / --access-token for later runs
    Login,

    /// Remove saved credentials
    Logout,

    /// Print settings, credentials and cache locations
    Paths,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();

    let ctx = Context::new(&cli);
    let result = match cli.command {
        Commands::Refresh { spreadsheet_id, force } => cmd_refresh(&ctx, &spreadsheet_id, force),
        Commands::Get {
            spreadsheet_id,
            sheet,
            ranges,
            cache,
            columns,
        } => cmd_get(&ctx, SheetRef::new(spreadsheet_id, sheet), &ranges, cache, columns),
        Commands::List { spreadsheet_id } => cmd_list(&ctx, spreadsheet_id.as_deref()),
        Commands::Login => cmd_login(&ctx),
        Commands::Logout => cmd_logout(),
        Commands::Paths => cmd_paths(&ctx),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Map a grid error onto the exit code registry.
    pub fn grid(err: GridError) -> Self {
        let code = match &err {
            GridError::NotAuthenticated => EXIT_NOT_AUTH,
            GridError::Network(_) | GridError::Http(..) => EXIT_REMOTE,
            GridError::NotCached { .. } => EXIT_NOT_CACHED,
            GridError::InvalidRange(_) => EXIT_USAGE,
            GridError::Io(_) | GridError::Parse(_) => EXIT_IO,
            GridError::ReadOnly(_) => EXIT_ERROR,
        };
        let hint = match &err {
            GridError::NotAuthenticated => {
                Some("run `ssync login --api-key <key>` or set SSYNC_API_KEY".to_string())
            }
            GridError::NotCached { spreadsheet_id, .. } => {
                Some(format!("run `ssync refresh {}` first", spreadsheet_id))
            }
            GridError::Http(401, _) | GridError::Http(403, _) => {
                Some("check that the spreadsheet is shared with these credentials".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Settings merged with command-line overrides.
struct Context {
    settings: Settings,
    cache_root: Option<PathBuf>,
    api_base: Option<String>,
    flag_credentials: Credentials,
}

impl Context {
    fn new(cli: &Cli) -> Self {
        Self {
            settings: Settings::load(),
            cache_root: cli.cache_root.clone(),
            api_base: cli.api_base.clone(),
            flag_credentials: Credentials {
                api_key: cli.api_key.clone(),
                access_token: cli.access_token.clone(),
            },
        }
    }

    fn cache(&self) -> SheetCache {
        let root = self
            .cache_root
            .clone()
            .unwrap_or_else(|| self.settings.cache_root());
        SheetCache::new(root)
    }

    fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(&self.settings.api_base)
    }

    fn credentials(&self) -> Option<Credentials> {
        if !self.flag_credentials.is_empty() {
            return Some(self.flag_credentials.clone());
        }
        load_credentials()
    }

    fn remote(&self) -> Result<RemoteGrid, CliError> {
        let creds = self
            .credentials()
            .ok_or_else(|| CliError::grid(GridError::NotAuthenticated))?;
        let client = SheetsClient::new(creds, self.api_base(), self.settings.timeout())
            .map_err(|e| CliError::grid(e.into()))?;
        Ok(RemoteGrid::new(client))
    }
}

// ============================================================================
// refresh
// ============================================================================

fn cmd_refresh(ctx: &Context, spreadsheet_id: &str, force: bool) -> Result<(), CliError> {
    let remote = ctx.remote()?;
    let cache = ctx.cache();

    if !force {
        let downloaded = smol::block_on(cache.cache_if_missing(&remote, spreadsheet_id))
            .map_err(CliError::grid)?;
        if !downloaded {
            eprintln!("{} is already cached (use --force to download again)", spreadsheet_id);
            return Ok(());
        }
    } else {
        smol::block_on(cache.refresh(&remote, spreadsheet_id)).map_err(CliError::grid)?;
    }

    let titles = cache.sheet_names(spreadsheet_id).map_err(CliError::grid)?;
    eprintln!(
        "cached {} sheet(s) of {} in {}",
        titles.len(),
        spreadsheet_id,
        cache.spreadsheet_dir(spreadsheet_id).display()
    );
    print_lines(&titles)
}

// ============================================================================
// get
// ============================================================================

fn cmd_get(
    ctx: &Context,
    sheet: SheetRef,
    ranges: &[String],
    cache_only: bool,
    columns: bool,
) -> Result<(), CliError> {
    let dimension = if columns { Dimension::Columns } else { Dimension::Rows };
    let cached = CachedGrid::new(ctx.cache());

    let grids = if cache_only || ctx.settings.prefer_cache {
        smol::block_on(cached.get_values(&sheet, dimension, ranges))
    } else {
        let source = FallbackGrid::new(ctx.remote()?, cached);
        smol::block_on(source.get_values(&sheet, dimension, ranges))
    }
    .map_err(CliError::grid)?;

    write_grids(&grids)
}

fn write_grids(grids: &[Grid]) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (i, grid) in grids.iter().enumerate() {
        if i > 0 {
            writeln!(out).map_err(|e| CliError::io(e.to_string()))?;
        }
        let text = csv::write_grid(grid).map_err(CliError::io)?;
        out.write_all(text.as_bytes())
            .map_err(|e| CliError::io(e.to_string()))?;
    }
    out.flush().map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// list / login / logout / paths
// ============================================================================

fn cmd_list(ctx: &Context, spreadsheet_id: Option<&str>) -> Result<(), CliError> {
    let cache = ctx.cache();
    let names = match spreadsheet_id {
        Some(id) => {
            if !cache.is_cached(id) {
                return Err(CliError::grid(GridError::NotCached {
                    spreadsheet_id: id.to_string(),
                    sheet_name: String::new(),
                }));
            }
            cache.sheet_names(id)
        }
        None => cache.spreadsheet_ids(),
    }
    .map_err(CliError::grid)?;
    print_lines(&names)
}

fn cmd_login(ctx: &Context) -> Result<(), CliError> {
    if ctx.flag_credentials.is_empty() {
        return Err(CliError::args("nothing to save")
            .with_hint("pass --api-key <key> or --access-token <token>"));
    }
    let path = save_credentials(&ctx.flag_credentials).map_err(CliError::io)?;
    eprintln!("credentials saved to {}", path.display());
    Ok(())
}

fn cmd_logout() -> Result<(), CliError> {
    delete_credentials().map_err(CliError::io)?;
    eprintln!("credentials removed");
    Ok(())
}

fn cmd_paths(ctx: &Context) -> Result<(), CliError> {
    let credentials = credentials_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no config directory)".to_string());
    print_lines(&[
        format!("settings:    {}", Settings::config_path().display()),
        format!("credentials: {}", credentials),
        format!("cache:       {}", ctx.cache().root().display()),
        format!("api base:    {}", ctx.api_base()),
    ])
}

fn print_lines(lines: &[String]) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        writeln!(out, "{}", line).map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}
