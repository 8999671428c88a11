use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idtables::storage::ConfiguredStore;
use idtables::{Config, IdentityTables};
use idtables_core::identity::{
    Claim, IdentityRole, IdentityUser, RecoveryCodes, RoleClaimStore, RoleStore, UserClaimStore,
    UserEmailStore, UserLoginInfo, UserLoginStore, UserStore, UserTwoFactorRecoveryCodeStore,
};
use idtables_core::storage::TableStore;

/// idtables - Manage identity records stored as table projections
#[derive(Parser, Debug)]
#[command(name = "idtables")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Prefix prepended to every table name (overrides IDTABLES_TABLE_PREFIX)
    #[arg(long, global = true)]
    table_prefix: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Table maintenance
    Tables {
        #[command(subcommand)]
        command: TablesCommand,
    },
    /// User records and their logins, claims and recovery codes
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Role records and their claims
    Roles {
        #[command(subcommand)]
        command: RolesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TablesCommand {
    /// Create every logical table that does not exist yet
    Ensure,
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    /// Create a user
    Create {
        #[arg(long)]
        user_name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Look a user up by exactly one key
    #[command(group(ArgGroup::new("lookup").required(true).args(["id", "name", "email", "login"])))]
    Find {
        #[arg(long)]
        id: Option<String>,
        /// User name (normalized before lookup)
        #[arg(long)]
        name: Option<String>,
        /// Email address (normalized before lookup)
        #[arg(long)]
        email: Option<String>,
        /// External login as PROVIDER:KEY
        #[arg(long)]
        login: Option<String>,
    },
    /// Delete a user and everything attached to it
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Bind an external login to a user
    AddLogin {
        #[arg(long)]
        id: String,
        #[arg(long)]
        provider: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Attach a claim to a user
    AddClaim {
        #[arg(long)]
        id: String,
        #[arg(long = "type")]
        claim_type: String,
        #[arg(long)]
        value: String,
    },
    /// List a user's claims
    Claims {
        #[arg(long)]
        id: String,
    },
    /// Replace a user's two-factor recovery codes
    RecoveryCodes {
        #[arg(long)]
        id: String,
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Count a user's remaining recovery codes
    CountCodes {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum RolesCommand {
    /// Create a role
    Create {
        #[arg(long)]
        name: String,
    },
    /// Look a role up by id or name
    #[command(group(ArgGroup::new("lookup").required(true).args(["id", "name"])))]
    Find {
        #[arg(long)]
        id: Option<String>,
        /// Role name (normalized before lookup)
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a role and its claims
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Attach a claim to a role
    AddClaim {
        #[arg(long)]
        id: String,
        #[arg(long = "type")]
        claim_type: String,
        #[arg(long)]
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idtables=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env()?;
    if let Some(prefix) = cli.table_prefix {
        config.table_prefix = prefix;
    }

    let store = ConfiguredStore::connect(&config)
        .await
        .with_context(|| format!("failed to open the {} backend", config.backend))?;
    tracing::info!(
        backend = %store.backend(),
        table_prefix = %config.table_prefix,
        "Opened table store"
    );

    let tables = IdentityTables::new(store).with_table_prefix(config.table_prefix.clone());

    match cli.command {
        Command::Tables { command } => run_tables(&tables, command).await,
        Command::Users { command } => run_users(&tables, command).await,
        Command::Roles { command } => run_roles(&tables, command).await,
    }
}

/// Upper-case invariant folding used for normalized names and emails.
fn normalize(value: &str) -> String {
    value.to_uppercase()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_login(login: &str) -> Result<(&str, &str)> {
    match login.split_once(':') {
        Some((provider, key)) if !provider.is_empty() && !key.is_empty() => Ok((provider, key)),
        _ => bail!("login must be PROVIDER:KEY, got '{login}'"),
    }
}

async fn require_user<S: TableStore>(tables: &IdentityTables<S>, id: &str) -> Result<IdentityUser> {
    tables
        .users()
        .find_user_by_id(id)
        .await?
        .with_context(|| format!("user '{id}' not found"))
}

async fn require_role<S: TableStore>(tables: &IdentityTables<S>, id: &str) -> Result<IdentityRole> {
    tables
        .roles()
        .find_role_by_id(id)
        .await?
        .with_context(|| format!("role '{id}' not found"))
}

async fn run_tables<S: TableStore>(
    tables: &IdentityTables<S>,
    command: TablesCommand,
) -> Result<()> {
    match command {
        TablesCommand::Ensure => {
            tables.ensure_tables().await?;
            tracing::info!("All tables present");
            Ok(())
        }
    }
}

async fn run_users<S: TableStore>(tables: &IdentityTables<S>, command: UsersCommand) -> Result<()> {
    let users = tables.users();

    match command {
        UsersCommand::Create { user_name, email } => {
            let mut user =
                IdentityUser::new(&user_name).with_normalized_user_name(normalize(&user_name));
            if let Some(email) = email {
                let normalized = normalize(&email);
                user = user.with_email(email, normalized);
            }
            users.create_user(&user).await?;
            print_json(&user)
        }
        UsersCommand::Find {
            id,
            name,
            email,
            login,
        } => {
            let found = if let Some(id) = id {
                users.find_user_by_id(&id).await?
            } else if let Some(name) = name {
                users.find_user_by_name(&normalize(&name)).await?
            } else if let Some(email) = email {
                users.find_user_by_email(&normalize(&email)).await?
            } else if let Some(login) = login {
                let (provider, key) = parse_login(&login)?;
                users.find_by_login(provider, key).await?
            } else {
                None
            };
            print_json(&found.context("user not found")?)
        }
        UsersCommand::Delete { id } => {
            let user = require_user(tables, &id).await?;
            users.delete_user(&user).await?;
            tracing::info!(user_id = %id, "Deleted user");
            Ok(())
        }
        UsersCommand::AddLogin {
            id,
            provider,
            key,
            display_name,
        } => {
            let user = require_user(tables, &id).await?;
            let mut login = UserLoginInfo::new(provider, key);
            if let Some(display_name) = display_name {
                login = login.with_display_name(display_name);
            }
            users.add_login(&user, &login).await?;
            print_json(&users.get_logins(&user).await?)
        }
        UsersCommand::AddClaim {
            id,
            claim_type,
            value,
        } => {
            let user = require_user(tables, &id).await?;
            users
                .add_claims(&user, &[Claim::new(claim_type, value)])
                .await?;
            print_json(&users.get_claims(&user).await?)
        }
        UsersCommand::Claims { id } => {
            let user = require_user(tables, &id).await?;
            print_json(&users.get_claims(&user).await?)
        }
        UsersCommand::RecoveryCodes { id, codes } => {
            let user = require_user(tables, &id).await?;
            let codes = RecoveryCodes::new(codes)?;
            users.replace_codes(&user, &codes).await?;
            print_json(&serde_json::json!({ "count": codes.len() }))
        }
        UsersCommand::CountCodes { id } => {
            let user = require_user(tables, &id).await?;
            let count = users.count_codes(&user).await?;
            print_json(&serde_json::json!({ "count": count }))
        }
    }
}

async fn run_roles<S: TableStore>(tables: &IdentityTables<S>, command: RolesCommand) -> Result<()> {
    let roles = tables.roles();

    match command {
        RolesCommand::Create { name } => {
            let role = IdentityRole::new(&name).with_normalized_name(normalize(&name));
            roles.create_role(&role).await?;
            print_json(&role)
        }
        RolesCommand::Find { id, name } => {
            let found = match (id, name) {
                (Some(id), _) => roles.find_role_by_id(&id).await?,
                (None, Some(name)) => roles.find_role_by_name(&normalize(&name)).await?,
                (None, None) => None,
            };
            print_json(&found.context("role not found")?)
        }
        RolesCommand::Delete { id } => {
            let role = require_role(tables, &id).await?;
            roles.delete_role(&role).await?;
            tracing::info!(role_id = %id, "Deleted role");
            Ok(())
        }
        RolesCommand::AddClaim {
            id,
            claim_type,
            value,
        } => {
            let role = require_role(tables, &id).await?;
            roles
                .add_role_claim(&role, &Claim::new(claim_type, value))
                .await?;
            print_json(&roles.get_role_claims(&role).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login() {
        assert_eq!(parse_login("github:gh-42").unwrap(), ("github", "gh-42"));
        assert_eq!(parse_login("p:a:b").unwrap(), ("p", "a:b"));
        assert!(parse_login("github").is_err());
        assert!(parse_login(":key").is_err());
    }

    #[test]
    fn test_find_requires_one_lookup() {
        assert!(Cli::try_parse_from(["idtables", "users", "find"]).is_err());
        let both = ["idtables", "users", "find", "--id", "u1", "--name", "a"];
        assert!(Cli::try_parse_from(both).is_err());
        assert!(Cli::try_parse_from(["idtables", "users", "find", "--email", "a@x.com"]).is_ok());
    }

    #[test]
    fn test_global_table_prefix() {
        let cli =
            Cli::try_parse_from(["idtables", "tables", "ensure", "--table-prefix", "dev"]).unwrap();
        assert_eq!(cli.table_prefix.as_deref(), Some("dev"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a@x.com"), "A@X.COM");
    }
}
