//! hima - share with your groups when you're free
//!
//! This is the command-line front end. It wires together:
//! - Configuration loading
//! - The local store (identity, notification settings, backups)
//! - The REST gateway and its polling change feed
//! - Group sessions from the core

mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hima_api::ChangeFilter;
use hima_config::{load_config, Config, Locale};
use hima_core::{AppContext, GroupSession, Profile, SessionSettings};
use hima_gateway::{ChangeFeed, Gateway, PollingFeed};
use hima_gateway_rest::{RestGateway, DEFAULT_REQUEST_TIMEOUT};
use hima_store::{export_backup, import_backup, SqliteStore};
use hima_util::{default_config_path, default_data_dir, GroupId, HimaError, RateLimiter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// hima - share with your groups when you're free
#[derive(Parser, Debug)]
#[command(name = "hima")]
#[command(about = "Share with your groups when you're free", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/hima/config.toml)
    #[arg(short, long, env = "HIMA_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set HIMA_DATA_DIR env var)
    #[arg(short, long, env = "HIMA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Backend anon key, overriding the config file
    #[arg(long, env = "HIMA_ANON_KEY", hide_env_values = true)]
    anon_key: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a nickname on this device
    Login { nickname: String },

    /// Show the registered user
    Whoami,

    /// Forget the registered user
    Logout,

    /// Create, join and list groups
    #[command(subcommand)]
    Group(GroupCommand),

    /// Show who in a group is free
    Status {
        group: String,
        /// Only list free members
        #[arg(long)]
        free_only: bool,
    },

    /// Mark yourself free in a group (see `hima options`)
    Free { group: String, option: String },

    /// Mark yourself busy in a group
    Busy { group: String },

    /// Show or change your plans for tomorrow
    Plans {
        group: String,
        /// Plan id to select or deselect; repeatable
        #[arg(long)]
        toggle: Vec<String>,
        /// Clear every plan
        #[arg(long, conflicts_with = "toggle")]
        clear: bool,
    },

    /// Keep a group's status on screen, refreshing on changes
    Watch {
        group: String,
        #[arg(long)]
        free_only: bool,
    },

    /// List status and plan options
    Options,

    /// Show or change notification settings
    Notify {
        #[arg(value_enum)]
        state: Option<OnOff>,
        /// Apply to one group only
        #[arg(long)]
        group: Option<String>,
    },

    /// Export identity and settings to a backup file
    Export {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Restore identity and settings from a backup file
    Import { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// Create a group and print its invite
    Create { name: String },
    /// Join with an invite code or link
    Join { invite: String },
    /// List your groups
    List,
    /// Print the invite for a group
    Invite { group: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnOff {
    On,
    Off,
}

/// Resolved configuration and local state
struct App {
    config_path: PathBuf,
    config: Option<Config>,
    anon_key: Option<String>,
    profile: Profile,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let config = if args.config.exists() {
            let config = load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?;
            info!(config_path = %args.config.display(), "Configuration loaded");
            Some(config)
        } else {
            debug!(config_path = %args.config.display(), "No config file, running local-only");
            None
        };

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.app.data_dir.clone()))
            .unwrap_or_else(default_data_dir);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("hima.db");
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database {:?}", db_path))?;
        debug!(db_path = %db_path.display(), "Store initialized");

        Ok(Self {
            config_path: args.config.clone(),
            config,
            anon_key: args.anon_key.clone(),
            profile: Profile::new(Arc::new(store)),
        })
    }

    fn locale(&self) -> Locale {
        self.config
            .as_ref()
            .map(|c| c.app.locale)
            .unwrap_or_default()
    }

    fn backend_config(&self) -> Result<&Config> {
        self.config.as_ref().with_context(|| {
            format!(
                "No backend configured; create {}",
                self.config_path.display()
            )
        })
    }

    fn connect(&self) -> Result<(AppContext, Arc<RestGateway>)> {
        let config = self.backend_config()?;
        let anon_key = self
            .anon_key
            .clone()
            .or_else(|| config.backend.anon_key.clone())
            .context("No anon key: set backend.anon_key or HIMA_ANON_KEY")?;

        let gateway = Arc::new(RestGateway::new(
            &config.backend.url,
            &anon_key,
            DEFAULT_REQUEST_TIMEOUT,
        )?);
        let ctx = AppContext::new(
            gateway.clone(),
            self.profile.clone(),
            SessionSettings::from_config(config),
        );
        Ok((ctx, gateway))
    }

    fn open(&self, group: &str) -> Result<(AppContext, GroupSession)> {
        let (ctx, _) = self.connect()?;
        let session = ctx.open_group(GroupId::new(group))?;
        Ok((ctx, session))
    }

    async fn run(&self, command: Commands) -> Result<()> {
        let locale = self.locale();

        match command {
            Commands::Login { nickname } => {
                let user = self.profile.register_user(&nickname)?;
                println!("{} ({})", user.nickname, user.id);
            }

            Commands::Whoami => match self.profile.current_user() {
                Ok(user) => println!("{} ({})", user.nickname, user.id),
                Err(HimaError::NoUser) => println!("not logged in"),
                Err(e) => return Err(e.into()),
            },

            Commands::Logout => self.profile.logout()?,

            Commands::Group(GroupCommand::Create { name }) => {
                let (ctx, _) = self.connect()?;
                let group = ctx.create_group(&name).await?;
                println!("{}\n", group.id);
                println!("{}", ctx.invite_message(&group));
            }

            Commands::Group(GroupCommand::Join { invite }) => {
                let (ctx, _) = self.connect()?;
                let group = ctx.join_group(&invite).await?;
                println!("{}  {}", group.id, group.name);
            }

            Commands::Group(GroupCommand::List) => {
                let (ctx, _) = self.connect()?;
                print!("{}", render::group_list(&ctx.my_groups().await?));
            }

            Commands::Group(GroupCommand::Invite { group }) => {
                let (ctx, _) = self.connect()?;
                let group_id = GroupId::new(group);
                let group = ctx
                    .gateway()
                    .get_group(&group_id)
                    .await?
                    .ok_or(HimaError::GroupNotFound(group_id))?;
                println!("{}", ctx.invite_message(&group));
            }

            Commands::Status { group, free_only } => {
                let (_, mut session) = self.open(&group)?;
                let snapshot = session.refresh().await?;
                print!("{}", render::snapshot(&snapshot, free_only, locale));
                session.flush().await;
            }

            Commands::Free { group, option } => {
                let (_, mut session) = self.open(&group)?;
                let snapshot = session.set_free(&option).await?;
                if let Some(me) = snapshot.me() {
                    println!("{}: {}", render::status_word(me.status, locale), me.badge);
                }
                session.flush().await;
            }

            Commands::Busy { group } => {
                let (_, mut session) = self.open(&group)?;
                let snapshot = session.set_busy().await?;
                if let Some(me) = snapshot.me() {
                    println!("{}", render::status_word(me.status, locale));
                }
                session.flush().await;
            }

            Commands::Plans {
                group,
                toggle,
                clear,
            } => {
                let (_, mut session) = self.open(&group)?;
                session.refresh().await?;

                if clear || !toggle.is_empty() {
                    if clear {
                        session.select_plans(Vec::new())?;
                    }
                    for plan in &toggle {
                        session.toggle_plan(plan)?;
                    }
                    session.save_tomorrow_plans().await?;
                }
                println!("{}", hima_core::plan_labels(session.selected_plans()));
                session.flush().await;
            }

            Commands::Watch { group, free_only } => {
                let (ctx, gateway) = self.connect()?;
                let config = self.backend_config()?;
                watch(&ctx, gateway, config, GroupId::new(group), free_only).await?;
            }

            Commands::Options => print!("{}", render::options()),

            Commands::Notify { state, group } => {
                let settings = match (state, group) {
                    (None, _) => self.profile.notification_settings(),
                    (Some(state), None) => self
                        .profile
                        .set_notifications_enabled(matches!(state, OnOff::On))?,
                    (Some(state), Some(group)) => self
                        .profile
                        .set_group_notifications(&GroupId::new(group), matches!(state, OnOff::On))?,
                };
                print!("{}", render::notification_settings(&settings));
            }

            Commands::Export { dir } => {
                let path = export_backup(
                    self.profile.store().as_ref(),
                    &dir,
                    hima_util::now_utc(),
                )?;
                println!("{}", path.display());
            }

            Commands::Import { path } => {
                let summary = import_backup(self.profile.store().as_ref(), &path)
                    .with_context(|| format!("Failed to import {:?}", path))?;
                println!(
                    "user: {}, notifications: {}",
                    if summary.user_restored { "restored" } else { "unchanged" },
                    if summary.settings_restored { "restored" } else { "unchanged" },
                );
            }
        }

        Ok(())
    }
}

/// Print the group, then reprint it on every change, on the periodic sweep,
/// until interrupted
async fn watch(
    ctx: &AppContext,
    gateway: Arc<RestGateway>,
    config: &Config,
    group_id: GroupId,
    free_only: bool,
) -> Result<()> {
    let locale = ctx.settings().locale;
    let mut session = ctx.open_group(group_id.clone())?;
    print!("{}", render::snapshot(&session.refresh().await?, free_only, locale));

    let feed = PollingFeed::new(gateway, config.sync.poll_interval);
    let mut changes = feed.subscribe(ChangeFilter::group(group_id.clone()));

    // Change bursts collapse into at most this many refreshes per second
    let mut limiter = RateLimiter::new(config.sync.events_per_second, Duration::from_secs(1));

    let mut refresh_timer = config.sync.refresh_interval.map(|period| {
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    });

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    info!(group_id = %group_id, "Watching group");

    loop {
        let refresh_due = async {
            match refresh_timer.as_mut() {
                Some(timer) => {
                    timer.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, stopping watch");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, stopping watch");
                break;
            }
            _ = refresh_due => {
                debug!("Periodic refresh");
            }
            event = changes.recv() => match event {
                Some(event) => {
                    if !limiter.check(&group_id) {
                        debug!(kind = ?event.kind, "Change rate limited");
                        continue;
                    }
                    debug!(kind = ?event.kind, user_id = ?event.user_id, "Change received");
                }
                None => {
                    warn!("Change feed closed");
                    break;
                }
            },
        }

        match session.refresh().await {
            Ok(snapshot) => {
                println!("[{}]", hima_util::format_clock_time(&hima_util::now()));
                print!("{}", render::snapshot(&snapshot, free_only, locale));
            }
            Err(e) => warn!(error = %e, "Refresh failed"),
        }
    }

    changes.unsubscribe();
    session.flush().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; output goes to stdout, logs to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "hima starting");

    let app = App::new(&args)?;
    app.run(args.command).await
}
