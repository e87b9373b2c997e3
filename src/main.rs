use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obra::config::{RemoteArgs, ServeArgs, StorageArgs};
use obra::models::MaterialLine;
use obra::workflow::WorkflowSession;
use obra::{api, mcp};
use obra_core::workflow::WorkflowView;

#[derive(Parser)]
#[command(name = "obra")]
#[command(about = "Worksite management server with a guided field-worker workflow")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Obra HTTP server
    Serve(ServeArgs),
    /// Start MCP server via stdio, acting as the given user
    Mcp {
        /// Username the MCP tools act as
        #[arg(short, long)]
        username: String,

        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Log in to a running server and print a bearer token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "OBRA_PASSWORD")]
        password: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Show the current workflow step of a worksite
    Workflow {
        /// Worksite ID
        #[arg(long)]
        obra: i64,

        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Complete the current workflow step of a worksite
    Complete {
        /// Worksite ID
        #[arg(long)]
        obra: i64,

        /// Comments recorded with the completion
        #[arg(long)]
        comments: Option<String>,

        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Request materials for a worksite, as MATERIAL_ID=QUANTITY pairs
    Request {
        /// Worksite ID
        #[arg(long)]
        obra: i64,

        #[arg(required = true, value_parser = parse_line)]
        lines: Vec<MaterialLine>,

        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Check server status
    Status {
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

/// Bare `obra` behaves like `obra serve` with defaults and environment.
#[derive(Parser)]
struct DefaultServe {
    #[command(flatten)]
    args: ServeArgs,
}

fn parse_line(s: &str) -> Result<MaterialLine, String> {
    let (id, qty) = s
        .split_once('=')
        .ok_or_else(|| format!("expected MATERIAL_ID=QUANTITY, got {s:?}"))?;
    Ok(MaterialLine {
        material_id: id.trim().parse().map_err(|e| format!("material id: {e}"))?,
        cantidad: qty.trim().parse().map_err(|e| format!("cantidad: {e}"))?,
    })
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let (db, photos) = args.storage.open()?;
    if db.seed_admin(&args.admin_password)? {
        tracing::info!("Created default admin account");
    }

    let app = api::create_router(db, photos);
    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!("Starting Obra server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Obra server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn print_session<B>(session: &WorkflowSession<B>)
where
    B: obra::workflow::WorkflowBackend,
{
    for row in session.progress() {
        let mark = if row.completado { "x" } else { " " };
        println!("[{mark}] {} {}", row.paso, row.paso.title());
    }
    match session.view() {
        WorkflowView::Done => println!("Todos los pasos completados."),
        WorkflowView::Step(step) => {
            println!("Paso actual: {} {}", step, step.title());
            if let Some(readiness) = session.readiness() {
                println!("Estado: {readiness:?}");
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "obra=debug,obra_core=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve(args)) => serve(args).await?,
        Some(Commands::Mcp { username, storage }) => {
            let (db, _photos) = storage.open()?;
            mcp::run_stdio_server(db, &username).await?;
        }
        Some(Commands::Login {
            username,
            password,
            remote,
        }) => {
            let mut client = remote.client();
            let session = client.login(&username, &password).await?;
            println!("{}", session.token);
            eprintln!(
                "Logged in as {} ({}), token valid until {}",
                session.user.username,
                session.user.rol.as_str(),
                session.expires_at
            );
        }
        Some(Commands::Workflow { obra, remote }) => {
            let session = WorkflowSession::open(remote.client(), obra, remote.min_photos).await?;
            print_session(&session);
        }
        Some(Commands::Complete {
            obra,
            comments,
            remote,
        }) => {
            let mut session = WorkflowSession::open(remote.client(), obra, remote.min_photos).await?;
            let completion = session.complete_current(comments).await?;
            println!(
                "Paso {} completado (obra {}, estado {})",
                completion.paso,
                completion.obra_id,
                completion.estado.as_str()
            );
            print_session(&session);
        }
        Some(Commands::Request { obra, lines, remote }) => {
            let mut session = WorkflowSession::open(remote.client(), obra, remote.min_photos).await?;
            let requests = session.submit_materials(lines).await?;
            for req in requests {
                println!("{} x{} {} ({})", req.nombre, req.cantidad_solicitada, req.unidad, req.estado.as_str());
            }
        }
        Some(Commands::Status { remote }) => match remote.client().health().await {
            Ok(_) => println!("Obra server at {} is running", remote.server),
            Err(e) => println!("Obra server at {} is not reachable: {}", remote.server, e),
        },
        None => {
            serve(DefaultServe::parse_from(["obra"]).args).await?;
        }
    }

    Ok(())
}
