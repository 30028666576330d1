use std::sync::Arc;

use actix_web::{get, middleware, web::Data, App, HttpRequest, HttpResponse, HttpServer, Responder};
use clap::Parser;
use edgelb_controller::config::{Cli, Command, Config};
use edgelb_controller::lbclient::FakePoolClient;
use edgelb_controller::secret_reflector::FakeSecretReflector;
use edgelb_controller::{controller, telemetry, State};
use kube::Client;
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};
use tracing::info;

#[get("/metrics")]
async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    use prometheus::{Encoder, TextEncoder};
    let families = c.metrics();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf).ok();
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buf)
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

async fn build_client(config: &Config) -> anyhow::Result<Client> {
    match &config.kubeconfig {
        Some(path) => {
            let kubeconfig = kube::config::Kubeconfig::read_from(path)?;
            let options = kube::config::KubeConfigOptions::default();
            let client_config =
                kube::Config::from_custom_kubeconfig(kubeconfig, &options).await?;
            Ok(Client::try_from(client_config)?)
        }
        None => Ok(Client::try_default().await?),
    }
}

fn tls_acceptor(config: &Config) -> anyhow::Result<SslAcceptorBuilder> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls())?;
    builder.set_private_key_file(&config.admission_tls_key, SslFiletype::PEM)?;
    builder.set_certificate_chain_file(&config.admission_tls_cert)?;
    Ok(builder)
}

async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let client = build_client(&config).await?;

    // No real DC/OS EdgeLB or secret-store backend is wired up; these
    // collaborators stand in for them until a production client exists.
    let pool_client = Arc::new(FakePoolClient::new(config.pool_group.clone()));
    let secret_reflector = Arc::new(FakeSecretReflector::default());

    let state = State::default();
    let ctx = state.create_context(client.clone(), config.clone(), pool_client, secret_reflector);

    let reconciler = controller::run(client, ctx);

    let metrics_config = config.clone();
    let metrics_state = state.clone();
    let metrics_server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(metrics_state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind(("0.0.0.0", metrics_config.metrics_bind_port))?
    .shutdown_timeout(5);

    let admission_config = config.clone();
    let acceptor = tls_acceptor(&admission_config)?;
    let admission_server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(admission_config.clone()))
            .wrap(middleware::Logger::default().exclude("/healthz"))
            .configure(edgelb_controller::admission::configure)
    })
    .bind_openssl(("0.0.0.0", config.admission_bind_port), acceptor)?
    .shutdown_timeout(5);

    info!(
        metrics_port = config.metrics_bind_port,
        admission_port = config.admission_bind_port,
        "starting edgelb-controller"
    );

    let (_, metrics_result, admission_result) =
        tokio::join!(reconciler, metrics_server.run(), admission_server.run());
    metrics_result?;
    admission_result?;
    Ok(())
}

async fn app_main() -> anyhow::Result<()> {
    telemetry::init().await;

    let cli = Cli::parse();
    match cli.command {
        Command::Run(config) => run(config).await,
    }
}

fn main() -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;
    rt.block_on(app_main())
}
