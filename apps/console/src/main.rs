//! Tramite console: drives the session, authorization and routing core from a terminal.
//!
//! Configuration comes from the environment (a `.env` file is honored):
//!
//! - `TRAMITE_API_URL`: API base URL
//! - `TRAMITE_AUTH_BACKEND`: `http` or `memory` (seeded demo accounts)
//! - `TRAMITE_SESSION_STORE`: `file`, `memory` or `redis`
//! - `TRAMITE_SESSION_FILE`, `REDIS_URL`, `TRAMITE_REDIS_KEY_PREFIX`: storage settings
//! - `TRAMITE_HTTP_TIMEOUT_SECONDS`, `TRAMITE_LOADING_DEBOUNCE_MS`: request pipeline timing
//! - `TRAMITE_GUARD_FAIL_CLOSED`: deny guarded routes that carry no requirement

#![forbid(unsafe_code)]

mod console_config;
mod console_services;
mod dev_seed;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tramite_application::{LoginRequest, NavigationOutcome, RegisterRequest};
use tramite_core::{AppError, AppResult};
use tramite_domain::{PermissionRequirement, RouteDefinition};
use tracing::warn;

use crate::console_config::{ConsoleConfig, init_tracing};
use crate::console_services::ConsoleServices;

/// Tramite console client
#[derive(Parser, Debug)]
#[command(name = "tramite")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session
    Login {
        /// Account email
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
        /// Ask for a long-lived refresh token
        #[arg(long)]
        remember: bool,
    },
    /// Create an account
    Register {
        /// Account email
        email: String,
        /// Account password
        #[arg(long)]
        password: String,
        /// Given name
        #[arg(long)]
        first_name: String,
        /// Family name
        #[arg(long)]
        last_name: String,
    },
    /// End the session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Exchange the refresh token for a new token pair
    Refresh,
    /// Run the route guards for a path
    Navigate {
        /// Absolute application path, for example /admin/workspaces/create
        path: String,
    },
    /// Check `resource:action` permissions of the signed-in user
    Can {
        /// Requirements such as workspace:create
        #[arg(required = true)]
        requirements: Vec<String>,
        /// Require every permission instead of any
        #[arg(long)]
        all: bool,
    },
    /// List the route table
    Routes,
    /// Send an authenticated GET request
    Get {
        /// Endpoint relative to the API base URL
        endpoint: String,
        /// Answer from the response cache when possible
        #[arg(long)]
        cached: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = ConsoleConfig::load()?;
    let services = console_services::build(&config).await?;

    if let Err(error) = services.session.initialize().await {
        warn!(error = %error, "failed to restore persisted session");
    }

    run(&services, args.command).await
}

async fn run(services: &ConsoleServices, command: Command) -> AppResult<()> {
    match command {
        Command::Login {
            email,
            password,
            remember,
        } => {
            let mut request = LoginRequest::new(email, password);
            request.remember_me = remember.then_some(true);
            let user = services.session.login(request).await?;
            println!("Signed in as {} <{}>", user.full_name(), user.email.as_str());
        }
        Command::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            let response = services
                .session
                .register(RegisterRequest {
                    email,
                    password,
                    first_name,
                    last_name,
                })
                .await?;
            println!("{}", response.message);
        }
        Command::Logout => {
            services.session.logout().await;
            println!("Signed out");
        }
        Command::Whoami => print_current_user(services),
        Command::Refresh => {
            services.session.refresh().await?;
            match services.session.access_token_expires_at() {
                Some(expires_at) => println!("Token refreshed, expires at {expires_at}"),
                None => println!("Token refreshed"),
            }
        }
        Command::Navigate { path } => match services.guards.navigate(&path) {
            NavigationOutcome::Allowed {
                path,
                params,
                title,
            } => {
                println!("allowed {path}");
                if let Some(title) = title {
                    println!("  title: {title}");
                }
                for (name, value) in params {
                    println!("  {name} = {value}");
                }
            }
            NavigationOutcome::Denied(denial) => {
                println!("denied: {:?}", denial.reason);
                println!(
                    "  redirected to {}",
                    services
                        .navigator
                        .current()
                        .unwrap_or_else(|| denial.redirect_to.to_owned())
                );
            }
        },
        Command::Can { requirements, all } => {
            let requirements = PermissionRequirement::parse_all(&requirements)?;
            let granted = if all {
                services.authorization.has_all_permissions(&requirements)
            } else {
                services.authorization.has_any_permission(&requirements)
            };
            println!("{}", if granted { "yes" } else { "no" });
        }
        Command::Routes => print_routes(services.guards.routes().routes(), "", 0),
        Command::Get { endpoint, cached } => {
            let body: Value = if cached {
                services.api_client.get_cached(&endpoint).await?
            } else {
                services.api_client.get(&endpoint).await?
            };
            let rendered = serde_json::to_string_pretty(&body).map_err(|error| {
                AppError::Internal(format!("failed to render response: {error}"))
            })?;
            println!("{rendered}");
        }
    }

    Ok(())
}

fn print_current_user(services: &ConsoleServices) {
    let Some(user) = services.session.current_user() else {
        println!("Not signed in");
        return;
    };

    println!("{} <{}> [{}]", user.full_name(), user.email.as_str(), user.initials());
    let roles: Vec<String> = user.role_names().iter().map(ToString::to_string).collect();
    println!("  roles: {}", roles.join(", "));
    for permission in &user.permissions {
        match permission.scope {
            Some(scope) => println!(
                "  {}:{} ({})",
                permission.resource,
                permission.action,
                scope.as_str()
            ),
            None => println!("  {}:{}", permission.resource, permission.action),
        }
    }
    if services.authorization.is_admin() {
        println!("  administrator");
    }
}

fn print_routes(routes: &[RouteDefinition], prefix: &str, depth: usize) {
    for route in routes {
        let path = if route.pattern.is_empty() {
            prefix.to_owned()
        } else {
            format!("{prefix}/{}", route.pattern)
        };
        let display = if path.is_empty() { "/" } else { path.as_str() };
        let guards: Vec<&str> = route.guards.iter().map(|guard| guard.as_str()).collect();

        let mut line = format!("{}{display}", "  ".repeat(depth));
        if let Some(target) = &route.redirect_to {
            line.push_str(&format!(" -> {target}"));
        }
        if !guards.is_empty() {
            line.push_str(&format!(" [{}]", guards.join(", ")));
        }
        if let Some(title) = &route.title {
            line.push_str(&format!(" \"{title}\""));
        }
        println!("{line}");

        print_routes(&route.children, &path, depth + 1);
    }
}
