//! NormaDeck command line interface.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use normadeck::auth::{SessionCache, SessionGuard};
use normadeck::backend::{AuthError, HttpBackend, RecordStore};
use normadeck::catalog::{recent, CatalogStore};
use normadeck::models::{
    FilterField, Norma, NormaDraft, Session, SortDirection, SortField, SortSpec,
};
use normadeck::services::{AdminService, DownloadResolver, SystemOpener};
use normadeck::Settings;

#[derive(Parser)]
#[command(
    name = "normadeck",
    about = "Browse and administer a catalog of graphic identity guidelines",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the catalog, with search, filters and sorting
    List {
        /// Free-text search over nome, país and categoria
        #[arg(long)]
        search: Option<String>,
        /// Keep records whose país equals this value
        #[arg(long)]
        pais: Option<String>,
        /// Keep records whose categoria equals this value
        #[arg(long)]
        categoria: Option<String>,
        /// Keep records whose ano equals this value
        #[arg(long)]
        ano: Option<String>,
        /// Sort field: nome, pais, categoria, ano, autor or created_at
        #[arg(long, default_value = "nome")]
        sort: String,
        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
    /// Show the most recently added normas
    Recent {
        #[arg(long, default_value_t = 4)]
        limit: u32,
    },
    /// Resolve and open the PDF for a norma
    Download {
        /// Record id to resolve through the backend
        id: Option<String>,
        /// Direct PDF URL, used alone or as fallback
        #[arg(long)]
        url: Option<String>,
    },
    /// Sign in as administrator
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "NORMADECK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and clear the cached session
    Logout,
    /// Show the authenticated administrator
    Whoami,
    /// Add a norma to the catalog
    Add {
        #[arg(long)]
        nome: String,
        #[arg(long)]
        pais: String,
        #[arg(long)]
        categoria: Option<String>,
        #[arg(long)]
        ano: Option<String>,
        #[arg(long)]
        imagem_url: String,
        #[arg(long)]
        pdf_url: String,
        #[arg(long)]
        autor: Option<String>,
    },
    /// Edit an existing norma
    Edit {
        id: String,
        #[arg(long)]
        nome: Option<String>,
        #[arg(long)]
        pais: Option<String>,
        #[arg(long)]
        categoria: Option<String>,
        #[arg(long)]
        ano: Option<String>,
        #[arg(long)]
        imagem_url: Option<String>,
        #[arg(long)]
        pdf_url: Option<String>,
        #[arg(long)]
        autor: Option<String>,
    },
    /// Delete a norma
    Delete { id: String },
    /// Run the PDF resolution endpoint
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8400)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("normadeck=warn")),
        )
        .init();

    let cli = Cli::parse();
    let settings = normadeck::load_settings().await;
    settings
        .ensure_directories()
        .context("failed to create data directory")?;

    match cli.command {
        Command::List {
            search,
            pais,
            categoria,
            ano,
            sort,
            desc,
        } => {
            let field: SortField = sort
                .parse()
                .map_err(|err| anyhow!("{err}; expected one of nome, pais, categoria, ano, autor, created_at"))?;
            let direction = if desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };

            let catalog = CatalogStore::new(backend(&settings)?);
            catalog.load().await;
            catalog.set_sort(SortSpec::new(field, direction)).await;
            if let Some(query) = search {
                catalog.set_search(query).await;
            }
            if let Some(value) = pais {
                catalog.set_filter(FilterField::Pais, value).await;
            }
            if let Some(value) = categoria {
                catalog.set_filter(FilterField::Categoria, value).await;
            }
            if let Some(value) = ano {
                catalog.set_filter(FilterField::Ano, value).await;
            }

            let view = catalog.current();
            if let Some(error) = view.error {
                bail!("{error}");
            }
            print_normas(&view.normas);
        }

        Command::Recent { limit } => {
            let store = backend(&settings)?;
            let normas = recent(store.as_ref(), limit)
                .await
                .map_err(|err| generic(err, "Não foi possível carregar as normas recentes"))?;
            print_normas(&normas);
        }

        Command::Download { id, url } => {
            let resolver = DownloadResolver::from_settings(&settings, Arc::new(SystemOpener))
                .ok_or_else(|| anyhow!(
                    "backend not configured; set NORMADECK_URL and NORMADECK_ANON_KEY"
                ))?;
            match resolver.resolve(id.as_deref(), url.as_deref()).await {
                Some(opened) => println!("Opened {}", style(opened).green()),
                None => println!("{}", style("No PDF could be opened.").yellow()),
            }
        }

        Command::Login { email, password } => {
            let guard = session_guard(&settings)?;
            match guard.sign_in(&email, &password).await {
                Ok(user) => println!("Signed in as {}", style(user.email).green()),
                Err(AuthError::InvalidCredentials) => bail!("invalid email or password"),
                Err(err) => {
                    tracing::error!(%err, "sign-in failed");
                    bail!("sign-in failed, try again later");
                }
            }
        }

        Command::Logout => {
            let guard = session_guard(&settings)?;
            guard.sign_out().await;
            println!("Signed out.");
        }

        Command::Whoami => {
            let guard = session_guard(&settings)?;
            guard.check_session().await;
            match guard.state().user {
                Some(user) => println!("{} ({})", style(user.email).green(), user.id),
                None => println!("Not signed in."),
            }
        }

        Command::Add {
            nome,
            pais,
            categoria,
            ano,
            imagem_url,
            pdf_url,
            autor,
        } => {
            let admin = admin_service(&settings).await?;
            let draft = NormaDraft {
                nome,
                pais,
                categoria,
                ano,
                imagem_url,
                pdf_url,
                autor,
            };
            let norma = admin
                .create(&draft)
                .await
                .map_err(|err| admin_error(err, "could not create the norma"))?;
            println!("Created {} ({})", style(&norma.nome).green(), norma.id);
        }

        Command::Edit {
            id,
            nome,
            pais,
            categoria,
            ano,
            imagem_url,
            pdf_url,
            autor,
        } => {
            let (admin, store) = admin_with_store(&settings).await?;
            let existing = store
                .get(&id)
                .await
                .map_err(|err| generic(err, "could not fetch the norma"))?
                .ok_or_else(|| anyhow!("no norma with id {id}"))?;

            let mut draft = NormaDraft::from(&existing);
            if let Some(value) = nome {
                draft.nome = value;
            }
            if let Some(value) = pais {
                draft.pais = value;
            }
            if let Some(value) = categoria {
                draft.categoria = Some(value);
            }
            if let Some(value) = ano {
                draft.ano = Some(value);
            }
            if let Some(value) = imagem_url {
                draft.imagem_url = value;
            }
            if let Some(value) = pdf_url {
                draft.pdf_url = value;
            }
            if let Some(value) = autor {
                draft.autor = Some(value);
            }

            let norma = admin
                .update(&id, &draft)
                .await
                .map_err(|err| admin_error(err, "could not update the norma"))?;
            println!("Updated {} ({})", style(&norma.nome).green(), norma.id);
        }

        Command::Delete { id } => {
            let admin = admin_service(&settings).await?;
            admin
                .delete(&id)
                .await
                .map_err(|err| admin_error(err, "could not delete the norma"))?;
            println!("Deleted {id}.");
        }

        Command::Serve { host, port } => {
            normadeck::server::serve(&settings, &host, port).await?;
        }
    }

    Ok(())
}

/// The configured backend, or a hint on how to configure one.
fn http_backend(settings: &Settings) -> anyhow::Result<HttpBackend> {
    HttpBackend::from_settings(settings).ok_or_else(|| {
        anyhow!("backend not configured; set NORMADECK_URL and NORMADECK_ANON_KEY")
    })
}

fn backend(settings: &Settings) -> anyhow::Result<Arc<dyn RecordStore>> {
    Ok(Arc::new(http_backend(settings)?))
}

fn session_guard(settings: &Settings) -> anyhow::Result<SessionGuard> {
    let provider = Arc::new(http_backend(settings)?);
    let cache = SessionCache::new(settings.session_path());
    Ok(SessionGuard::new(provider, cache))
}

/// An admin service running with the signed-in administrator's session.
async fn admin_service(settings: &Settings) -> anyhow::Result<AdminService> {
    Ok(admin_with_store(settings).await?.0)
}

async fn admin_with_store(
    settings: &Settings,
) -> anyhow::Result<(AdminService, Arc<dyn RecordStore>)> {
    let session = require_session(settings).await?;
    let store: Arc<dyn RecordStore> = Arc::new(http_backend(settings)?.with_session(&session));
    Ok((AdminService::new(store.clone()), store))
}

/// Administrative commands require an authenticated session.
async fn require_session(settings: &Settings) -> anyhow::Result<Session> {
    let guard = session_guard(settings)?;
    guard.check_session().await;
    guard
        .state()
        .session
        .ok_or_else(|| anyhow!("not signed in; run `normadeck login` first"))
}

/// Log the backend detail, surface a generic message.
fn generic(err: impl std::fmt::Display, message: &str) -> anyhow::Error {
    tracing::error!(%err, "backend operation failed");
    anyhow!("{message}")
}

fn admin_error(err: normadeck::services::AdminError, message: &str) -> anyhow::Error {
    match err {
        // Validation problems are precise and safe to show inline.
        normadeck::services::AdminError::Validation(err) => anyhow!("{err}"),
        normadeck::services::AdminError::Backend(err) => generic(err, message),
    }
}

fn print_normas(normas: &[Norma]) {
    if normas.is_empty() {
        println!(
            "{}",
            style("Nenhuma norma encontrada para os critérios de pesquisa.").dim()
        );
        return;
    }

    for norma in normas {
        let badge = if norma.is_new() {
            format!(" {}", style("Novo").magenta().bold())
        } else {
            String::new()
        };
        println!(
            "{}  {}{}",
            style(&norma.id).dim(),
            style(&norma.nome).bold(),
            badge
        );
        let detail = [
            Some(norma.pais.as_str()),
            norma.categoria.as_deref(),
            norma.ano.as_deref(),
            norma.autor.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" · ");
        println!("    {}", style(detail).dim());
    }
    println!();
    println!("{} norma(s)", normas.len());
}
