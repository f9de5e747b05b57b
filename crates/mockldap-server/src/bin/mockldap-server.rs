use anyhow::Context;
use clap::Parser;
use mockldap_client::seed::DEFAULT_MAIL_DOMAIN;
use mockldap_client::{roster_entries, DirectoryClient, DirectoryConfig};
use mockldap_core::config::{
    ServerConfig, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_ROOT_DN, DEFAULT_ROOT_PASSWORD,
    DEFAULT_SUFFIX,
};
use mockldap_server::RunningServer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// In-memory LDAP directory for tests.
#[derive(Debug, Parser)]
#[command(name = "mockldap-server", version, about)]
struct Opt {
    /// Host or address to listen on
    #[arg(long, env = "MOCK_LDAP_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(long, env = "MOCK_LDAP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Naming context all entries live beneath
    #[arg(long, env = "MOCK_LDAP_SUFFIX", default_value = DEFAULT_SUFFIX)]
    suffix: String,

    /// DN allowed to add, modify, delete and compare
    #[arg(long, env = "MOCK_LDAP_ROOT_DN", default_value = DEFAULT_ROOT_DN)]
    root_dn: String,

    /// Password of the privileged DN
    #[arg(
        long,
        env = "MOCK_LDAP_ROOT_PASSWORD",
        default_value = DEFAULT_ROOT_PASSWORD,
        hide_env_values = true
    )]
    root_password: String,

    /// Add the sample roster once the listener is up
    #[arg(long, env = "MOCK_LDAP_SEED")]
    seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opt = Opt::parse();
    let config = ServerConfig::new()
        .with_host(&opt.host)
        .with_port(opt.port)
        .with_suffix(&opt.suffix)
        .with_root_credentials(&opt.root_dn, &opt.root_password);

    let server = RunningServer::start(&config)
        .await
        .context("starting LDAP server")?;

    if opt.seed {
        let client_config = DirectoryConfig::new(server.url(), &opt.root_dn, &opt.root_password)?
            .with_search_base(&opt.suffix);
        let report = DirectoryClient::new(client_config)
            .seed(&roster_entries(&opt.suffix, DEFAULT_MAIL_DOMAIN))
            .await
            .context("seeding directory")?;
        if report.failed > 0 {
            warn!(failed = report.failed, "some roster entries were not added");
        }
        info!(
            added = report.added,
            entries = server.directory().entry_count().await,
            "directory seeded"
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("Shutting down");
    server.shutdown().await;
    Ok(())
}
