//! `portal` command-line client.
//!
//! Signs in against the configured backend, keeps role-scoped sessions in
//! the session directory between invocations, and runs catalogue, saved
//! list, and application commands with the stored sessions.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{WrapErr, eyre};
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use scholarship_portal::domain::ports::SessionStore;
use scholarship_portal::domain::{
    Caste, Category, Credentials, DemographicProfile, IdentityReconciler, RemoteResourceClient,
    Role, Scholarship, ScholarshipFilter, ScholarshipId, SignUpProfile,
};
use scholarship_portal::outbound::{FileSessionStore, IdentityToolkitProvider, ReqwestTransport};
use scholarship_portal::state::{ClientStateStore, PortalActions, Settlement};
use scholarship_portal::{AuthStatus, ClientSettings};

#[derive(Debug, Parser)]
#[command(
    name = "portal",
    about = "Browse scholarships, manage saved entries, and apply from the terminal",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the session.
    SignIn {
        /// Account e-mail.
        #[arg(long)]
        email: String,
        /// Account password.
        #[arg(long)]
        password: String,
        /// Sign in to the admin surface.
        #[arg(long)]
        admin: bool,
    },
    /// Create an account and store the session.
    SignUp {
        /// Account e-mail.
        #[arg(long)]
        email: String,
        /// Account password.
        #[arg(long)]
        password: String,
        /// Full name shown on applications.
        #[arg(long)]
        full_name: String,
        /// Admin registration code; registers an admin when present.
        #[arg(long)]
        admin_code: Option<String>,
    },
    /// Drop every stored session.
    SignOut,
    /// Report which roles hold a session.
    Status,
    /// List scholarships.
    Scholarships {
        /// Restrict to one funding category.
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
        /// Minimum award amount.
        #[arg(long)]
        min_amount: Option<u64>,
        /// Maximum award amount.
        #[arg(long)]
        max_amount: Option<u64>,
    },
    /// Show one scholarship.
    Show {
        /// Scholarship identifier.
        id: String,
    },
    /// List saved scholarships.
    Saved,
    /// Save a scholarship.
    Save {
        /// Scholarship identifier.
        id: String,
    },
    /// Remove a scholarship from the saved list.
    Unsave {
        /// Scholarship identifier.
        id: String,
    },
    /// Apply for a scholarship.
    Apply {
        /// Scholarship identifier.
        id: String,
    },
    /// List submitted applications.
    Applications,
    /// Submit the demographic profile.
    Profile {
        /// Caste category.
        #[arg(long, value_enum)]
        caste: CasteArg,
        /// Religion.
        #[arg(long)]
        religion: String,
        /// Highest education level.
        #[arg(long)]
        education_level: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Government,
    Private,
    State,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Government => Self::Government,
            CategoryArg::Private => Self::Private,
            CategoryArg::State => Self::State,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CasteArg {
    General,
    Obc,
    Sc,
    St,
}

impl From<CasteArg> for Caste {
    fn from(value: CasteArg) -> Self {
        match value {
            CasteArg::General => Self::General,
            CasteArg::Obc => Self::Obc,
            CasteArg::Sc => Self::Sc,
            CasteArg::St => Self::St,
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build tokio runtime")?;
    runtime.block_on(run(cli))
}

fn wire(settings: &ClientSettings) -> color_eyre::Result<PortalActions> {
    let timeout = settings.request_timeout();
    let sessions: Arc<dyn SessionStore> = Arc::new(
        FileSessionStore::open(settings.session_dir()).wrap_err("failed to open session store")?,
    );
    let transport = ReqwestTransport::new(&settings.api_base_url()?, timeout)
        .wrap_err("failed to build backend client")?;
    let provider = IdentityToolkitProvider::new(
        &settings.identity_base_url()?,
        settings.identity_api_key(),
        timeout,
    )
    .wrap_err("failed to build identity provider client")?;

    let client = RemoteResourceClient::new(Arc::new(transport), sessions);
    let reconciler = IdentityReconciler::new(Arc::new(provider), client.clone());
    let actions = PortalActions::new(client, reconciler, Arc::new(ClientStateStore::new()));
    actions.restore_session();
    Ok(actions)
}

async fn run(cli: Cli) -> color_eyre::Result<()> {
    let settings = ClientSettings::load_from_iter([OsString::from("portal")])
        .map_err(|error| eyre!("failed to load configuration: {error}"))?;
    let actions = wire(&settings)?;
    let mut out = io::stdout().lock();

    match cli.command {
        Command::SignIn {
            email,
            password,
            admin,
        } => {
            let role = if admin { Role::Admin } else { Role::User };
            let credentials = Credentials::try_from_parts(&email, &password)?;
            let session = actions.sign_in(role, &credentials).await?;
            writeln!(out, "signed_in={} role={}", session.subject_email(), session.role())?;
        }
        Command::SignUp {
            email,
            password,
            full_name,
            admin_code,
        } => {
            let credentials = Credentials::try_from_parts(&email, &password)?;
            let (role, profile) = match admin_code.as_deref() {
                Some(code) => (Role::Admin, SignUpProfile::admin(&full_name, code)?),
                None => (Role::User, SignUpProfile::user(&full_name)?),
            };
            let session = actions.sign_up(role, &credentials, &profile).await?;
            writeln!(out, "signed_up={} role={}", session.subject_email(), session.role())?;
        }
        Command::SignOut => {
            actions.sign_out().await?;
            writeln!(out, "signed_out")?;
        }
        Command::Status => {
            let (status, roles) = actions.store().read(|state| {
                let auth = state.auth();
                (auth.status(), auth.roles().collect::<Vec<_>>())
            });
            match status {
                AuthStatus::Authenticated => {
                    for role in roles {
                        writeln!(out, "session={role}")?;
                    }
                }
                AuthStatus::Unauthenticated | AuthStatus::Unknown => {
                    writeln!(out, "signed_out")?;
                }
            }
        }
        Command::Scholarships {
            category,
            min_amount,
            max_amount,
        } => {
            let filter = ScholarshipFilter {
                category: category.map(Category::from),
                min_amount,
                max_amount,
                ..ScholarshipFilter::default()
            };
            settled(actions.fetch_scholarships(&filter, None).await)?;
            let items = actions
                .store()
                .read(|state| state.catalogue().items().to_vec());
            for item in &items {
                print_scholarship(&mut out, item)?;
            }
        }
        Command::Show { id: raw } => {
            let id = ScholarshipId::new(raw)?;
            settled(actions.fetch_scholarship(&id, None).await)?;
            let item = actions.store().read(|state| state.details().get(&id).cloned());
            if let Some(item) = item {
                print_scholarship(&mut out, &item)?;
                writeln!(out, "{}", item.description)?;
                writeln!(out, "apply_link={}", item.apply_link)?;
            }
        }
        Command::Saved => {
            settled(actions.fetch_saved(None).await)?;
            let marks = actions.store().read(|state| state.saved().items().to_vec());
            for mark in &marks {
                match mark.scholarship.as_ref() {
                    Some(item) => print_scholarship(&mut out, item)?,
                    None => writeln!(out, "{}", mark.scholarship_id)?,
                }
            }
        }
        Command::Save { id: raw } => {
            let id = ScholarshipId::new(raw)?;
            settled(actions.fetch_saved(None).await)?;
            settled(actions.save_scholarship(&id, None).await)?;
            writeln!(out, "saved={id}")?;
        }
        Command::Unsave { id: raw } => {
            let id = ScholarshipId::new(raw)?;
            settled(actions.fetch_saved(None).await)?;
            settled(actions.unsave_scholarship(&id, None).await)?;
            writeln!(out, "unsaved={id}")?;
        }
        Command::Apply { id: raw } => {
            let id = ScholarshipId::new(raw)?;
            settled(actions.fetch_applications(None).await)?;
            settled(actions.apply_for_scholarship(&id, None).await)?;
            writeln!(out, "applied={id}")?;
        }
        Command::Applications => {
            settled(actions.fetch_applications(None).await)?;
            let applications = actions
                .store()
                .read(|state| state.applications().items().to_vec());
            for application in &applications {
                let title = application
                    .scholarship
                    .as_ref()
                    .map_or("", |summary| summary.name.as_str());
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}",
                    application.id,
                    application.scholarship_id,
                    title,
                    application.status,
                    application.applied_at.format("%Y-%m-%d")
                )?;
            }
        }
        Command::Profile {
            caste,
            religion,
            education_level,
        } => {
            let profile = DemographicProfile::new(caste.into(), &religion, &education_level)?;
            actions.complete_profile(&profile).await?;
            writeln!(out, "profile_updated")?;
        }
    }
    Ok(())
}

fn settled(settlement: Settlement) -> color_eyre::Result<()> {
    match settlement {
        Settlement::Applied => Ok(()),
        Settlement::Failed(error) => Err(error.into()),
        Settlement::Stale | Settlement::Abandoned => Err(eyre!("result was superseded")),
    }
}

fn print_scholarship(out: &mut impl Write, item: &Scholarship) -> io::Result<()> {
    writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}",
        item.id,
        item.name,
        item.amount,
        item.category.as_str(),
        item.deadline.format("%Y-%m-%d")
    )
}
