use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mockldap_client::config::{
    DEFAULT_AUTH_DN_TEMPLATE, DEFAULT_BIND_PASSWORD, DEFAULT_BIND_USER,
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_FILTER, DEFAULT_OPERATION_TIMEOUT_SECS,
    DEFAULT_SEARCH_BASE, DEFAULT_SERVER, DEFAULT_USERNAME_ATTRIBUTE,
};
use mockldap_client::seed::DEFAULT_MAIL_DOMAIN;
use mockldap_client::{roster_entries, DirectoryClient, DirectoryConfig};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Sample directory client.
#[derive(Debug, Parser)]
#[command(name = "mockldap-client", version, about)]
struct Opt {
    /// Directory server URL
    #[arg(long, env = "LDAP_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    /// DN to bind as for listing and seeding
    #[arg(long, env = "LDAP_USER", default_value = DEFAULT_BIND_USER)]
    user: String,

    /// Password for the bind DN
    #[arg(long, env = "LDAP_PASSWORD", default_value = DEFAULT_BIND_PASSWORD, hide_env_values = true)]
    password: String,

    /// User search filter
    #[arg(long, env = "LDAP_FILTER", default_value = DEFAULT_FILTER)]
    filter: String,

    /// User search base
    #[arg(long, env = "LDAP_SEARCH_BASE", default_value = DEFAULT_SEARCH_BASE)]
    search_base: String,

    /// Attribute holding the login name
    #[arg(long, env = "LDAP_USERNAME_FIELD", default_value = DEFAULT_USERNAME_ATTRIBUTE)]
    username_field: String,

    /// DN template for authentication; `%USERNAME%` is replaced by the login name
    #[arg(long, env = "LDAP_AUTH_DN", default_value = DEFAULT_AUTH_DN_TEMPLATE)]
    auth_dn: String,

    /// PEM CA certificate to trust for `ldaps://` servers
    #[arg(long, env = "LDAP_TLS_CA_CERT")]
    tls_ca_cert: Option<PathBuf>,

    /// Accept any server certificate
    #[arg(long, env = "LDAP_NO_TLS_VERIFY")]
    no_tls_verify: bool,

    /// Seconds to wait for the connection
    #[arg(long, env = "LDAP_CONNECT_TIMEOUT", default_value_t = DEFAULT_CONNECTION_TIMEOUT_SECS)]
    connect_timeout: u64,

    /// Seconds to wait for each operation
    #[arg(long, env = "LDAP_TIMEOUT", default_value_t = DEFAULT_OPERATION_TIMEOUT_SECS)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List users matching the search filter
    List,
    /// Authenticate a user by binding as them
    Auth {
        /// Login name
        username: String,
        /// Password
        password: String,
    },
    /// Add the sample roster beneath the search base
    Seed {
        /// Mail domain for the seeded users
        #[arg(long, default_value = DEFAULT_MAIL_DOMAIN)]
        mail_domain: String,
    },
    /// List users, then authenticate `clincoln`
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::parse();
    let mut config = DirectoryConfig::new(&opt.server, &opt.user, &opt.password)
        .context("invalid LDAP_SERVER")?
        .with_search_filter(&opt.filter)
        .with_search_base(&opt.search_base)
        .with_username_attribute(&opt.username_field)
        .with_auth_dn_template(&opt.auth_dn)
        .with_tls_verification(!opt.no_tls_verify)
        .with_connection_timeout_secs(opt.connect_timeout)
        .with_operation_timeout_secs(opt.timeout);
    if let Some(path) = opt.tls_ca_cert {
        config = config.with_tls_ca_cert(path);
    }
    let client = DirectoryClient::new(config);

    let output = match opt.command {
        Command::List => serde_json::to_value(client.list_users().await?)?,
        Command::Auth { username, password } => {
            client
                .authenticate(&username, &password)
                .await
                .with_context(|| format!("authentication failed for {username}"))?;
            json!("ok")
        }
        Command::Seed { mail_domain } => {
            let entries = roster_entries(&opt.search_base, &mail_domain);
            serde_json::to_value(client.seed(&entries).await?)?
        }
        Command::Demo => {
            let users = client.list_users().await.context("listing users")?;
            client
                .authenticate("clincoln", "123")
                .await
                .context("authenticating clincoln")?;
            json!({ "users": users, "auth": "ok" })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
