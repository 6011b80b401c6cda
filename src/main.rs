use std::path::PathBuf;
use std::rc::Rc;

use apiary_console::forms::{FormError, LoginForm, PasswordChangeForm};
use apiary_console::{
    ApiError, AppContext, ConsoleConfig, FileStorage, KeyValueStore, MemoryNavigator, Navigator,
};
use apiary_shared::AlertFilter;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Form(#[from] FormError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("not signed in; run `apiary-console login` first")]
    NotSignedIn,
    #[error("request failed: {0}")]
    Store(String),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "apiary-console", about = "Apiary monitoring platform console")]
struct Cli {
    /// Send every service request to one origin (e.g. a dev proxy).
    #[arg(long, env = "APIARY_ORIGIN")]
    origin: Option<String>,

    #[arg(long, env = "APIARY_STATE_FILE", default_value = ".apiary-console.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "APIARY_PASSWORD")]
        password: String,
    },
    Logout,
    Whoami,
    Passwd {
        #[arg(long, env = "APIARY_PASSWORD")]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    Health,
    Hives,
    Alerts {
        #[arg(long)]
        hive_id: Option<i64>,
        #[arg(long)]
        sensor_id: Option<i64>,
        #[arg(long)]
        unresolved: bool,
    },
}

impl Command {
    /// The view the command stands for.
    fn path(&self) -> &'static str {
        match self {
            Command::Login { .. } | Command::Logout => "/login",
            Command::Whoami | Command::Passwd { .. } | Command::Health => "/settings",
            Command::Hives => "/hives",
            Command::Alerts { .. } => "/",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = ConsoleConfig::from_env();
    if let Some(origin) = &cli.origin {
        config = config.with_single_origin(origin);
    }
    debug!(?config, state_file = %cli.state_file.display(), "configuration loaded");

    let storage: Rc<dyn KeyValueStore> = Rc::new(FileStorage::new(&cli.state_file));
    let navigator = Rc::new(MemoryNavigator::new(cli.command.path()));
    let ctx = AppContext::with_reqwest(config, storage, navigator.clone());

    run(&ctx, cli.command).await?;
    debug!(path = %navigator.current_path(), "finished");
    Ok(())
}

async fn run(ctx: &AppContext, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login { email, password } => {
            let creds = LoginForm::new(&email, &password).validate()?;
            ctx.session.initialize().await;
            let outcome = ctx.session.login(&creds.identifier, &creds.secret).await;
            if !outcome.success {
                let message = ctx.session.snapshot().error.unwrap_or_default();
                return Err(CliError::LoginFailed(message));
            }
            if let Some(user) = outcome.user {
                println!("signed in as {} <{}>", user.username, user.email);
            }
        }
        Command::Logout => {
            ctx.session.logout();
            println!("signed out");
        }
        Command::Whoami => {
            signed_in(ctx).await?;
            let user = ctx.session.snapshot().user;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Passwd {
            current,
            new,
            confirm,
        } => {
            let form = PasswordChangeForm {
                current_password: current,
                new_password: new,
                confirm_password: confirm,
            };
            form.validate()?;
            signed_in(ctx).await?;
            ctx.session
                .change_password(&form.current_password, &form.new_password)
                .await?;
            println!("password changed");
        }
        Command::Health => {
            for health in ctx.clients.check_health().await {
                let mark = if health.healthy { "up" } else { "down" };
                println!("{:<13} {:<5} {}", health.service.name(), mark, health.detail);
            }
        }
        Command::Hives => {
            signed_in(ctx).await?;
            ctx.hives.fetch_hives().await;
            let state = ctx.hives.snapshot();
            if let Some(message) = state.status.error {
                return Err(CliError::Store(message));
            }
            for hive in state.hives {
                println!("{:>5}  {:<24} {:<24} {:?}", hive.id, hive.name, hive.location, hive.status);
            }
        }
        Command::Alerts {
            hive_id,
            sensor_id,
            unresolved,
        } => {
            signed_in(ctx).await?;
            ctx.monitoring
                .fetch_alerts(AlertFilter { hive_id, sensor_id })
                .await;
            if let Some(message) = ctx.monitoring.snapshot().status.error {
                return Err(CliError::Store(message));
            }
            let alerts = if unresolved {
                ctx.monitoring.unresolved_alerts()
            } else {
                ctx.monitoring.snapshot().alerts
            };
            for alert in alerts {
                let state = if alert.is_resolved { "resolved" } else { "open" };
                println!(
                    "{:>5}  hive {:<5} {:<9} {:?}  {}",
                    alert.id, alert.hive_id, state, alert.severity, alert.message
                );
            }
        }
    }
    Ok(())
}

async fn signed_in(ctx: &AppContext) -> Result<(), CliError> {
    ctx.session.initialize().await;
    if ctx.session.is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotSignedIn)
    }
}
