//! Subcommand handlers.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, Utc};
use clap::ArgMatches;
use fastgram_core::{
    ApiRequest, Config, GuardDecision, RegisterRequest, RouteGuard, SessionManager,
};
use reqwest::Method;
use serde_json::Value;

use crate::settings::Settings;

pub async fn dispatch(
    matches: &ArgMatches,
    session: &SessionManager,
    config: &Config,
    settings: &mut Settings,
) -> Result<()> {
    match matches.subcommand() {
        Some(("login", sub)) => {
            let email = sub.get_one::<String>("email").or(config.last_email.as_ref());
            login(session, settings, email).await
        }
        Some(("register", sub)) => register(session, settings, sub).await,
        Some(("logout", _)) => {
            session.auth().logout().await;
            println!("Logged out.");
            Ok(())
        }
        Some(("logout-all", _)) => {
            session.auth().logout_all().await;
            println!("Logged out of every device.");
            Ok(())
        }
        Some(("whoami", _)) => whoami(session).await,
        Some(("status", _)) => {
            status(session);
            Ok(())
        }
        Some(("profile", _)) => profile(session).await,
        Some(("follow", sub)) => {
            let message = session.users().follow(required(sub, "username")?).await?;
            println!("{}", message.message);
            Ok(())
        }
        Some(("unfollow", sub)) => {
            let message = session.users().unfollow(required(sub, "username")?).await?;
            println!("{}", message.message);
            Ok(())
        }
        Some((list @ ("followers" | "following"), sub)) => connections(session, list, sub).await,
        Some(("request", sub)) => request(session, sub).await,
        Some(("route", sub)) => {
            route(session, required(sub, "target")?);
            Ok(())
        }
        _ => bail!("No subcommand given, see --help"),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: {}", name))
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn login(session: &SessionManager, settings: &mut Settings, email: Option<&String>) -> Result<()> {
    let email = match email.cloned() {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    if email.is_empty() {
        bail!("Email is required");
    }
    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    let signed_in = session.auth().login(&email, &password).await?;
    settings.remember_email(&email);
    println!(
        "Logged in as {} (@{})",
        signed_in.user.display_name(),
        signed_in.user.username
    );
    Ok(())
}

async fn register(session: &SessionManager, settings: &mut Settings, matches: &ArgMatches) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let confirm = rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let request = RegisterRequest {
        username: required(matches, "username")?.to_string(),
        email: required(matches, "email")?.to_string(),
        password,
        full_name: required(matches, "full-name")?.to_string(),
    };
    let signed_in = session.auth().register(&request).await?;
    settings.remember_email(&request.email);
    println!("Welcome to FastGram, @{}!", signed_in.user.username);
    Ok(())
}

async fn whoami(session: &SessionManager) -> Result<()> {
    if session.store().access_token().is_none() {
        bail!("Not logged in. Run `fastgram login` first.");
    }
    let user = session.auth().verify().await?;
    println!("{} (@{})", user.display_name(), user.username);
    if !user.email.is_empty() {
        println!("  email: {}", user.email);
    }
    Ok(())
}

fn status(session: &SessionManager) {
    let store = session.store();
    let flag = store.login_flag();

    match flag.expires_at().filter(|_| flag.is_set()) {
        Some(expires_at) => println!(
            "Logged in (flag valid until {})",
            expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        None => println!("Logged out"),
    }
    let presence = |present: bool| if present { "present" } else { "missing" };
    println!("  access token:  {}", presence(store.access_token().is_some()));
    println!("  refresh token: {}", presence(store.refresh_token().is_some()));
}

async fn profile(session: &SessionManager) -> Result<()> {
    let user = session.users().my_profile().await?;
    println!("{} (@{})", user.display_name(), user.username);
    if user.is_verified {
        println!("  verified");
    }
    if let Some(bio) = user.bio.as_deref().filter(|bio| !bio.is_empty()) {
        println!("  {}", bio);
    }
    if let Some(created_at) = user.created_at {
        println!("  member since {}", created_at.format("%B %Y"));
    }
    Ok(())
}

async fn connections(session: &SessionManager, list: &str, matches: &ArgMatches) -> Result<()> {
    let username = required(matches, "username")?;
    let page = matches.get_one::<u32>("page").copied().unwrap_or(1);
    let limit = matches
        .get_one::<u32>("limit")
        .copied()
        .unwrap_or(fastgram_core::services::users::DEFAULT_PAGE_SIZE);

    let users = if list == "followers" {
        session.users().list_followers(username, page, limit).await?
    } else {
        session.users().list_following(username, page, limit).await?
    };

    if users.is_empty() {
        println!("No {} on page {}", list, page);
    }
    for user in users {
        let badge = if user.is_verified { " (verified)" } else { "" };
        println!("@{}  {}{}", user.username, user.display_name(), badge);
    }
    Ok(())
}

async fn request(session: &SessionManager, matches: &ArgMatches) -> Result<()> {
    let method: Method = required(matches, "method")?
        .to_uppercase()
        .parse()
        .context("Invalid HTTP method")?;
    let mut request = ApiRequest::new(method, required(matches, "path")?);

    if let Some(data) = matches.get_one::<String>("data") {
        let body: Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.json(&body)?;
    }
    if matches.get_flag("no-retry") {
        request = request.without_auth_retry();
    }

    let response = session.api().send(&request).await?;
    let status = response.status();
    let text = response.text().await.context("Failed to read response body")?;

    eprintln!("{}", status);
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() {
        bail!("Request failed with {}", status);
    }
    Ok(())
}

fn route(session: &SessionManager, target: &str) {
    // Same cookie a browser would carry for this session
    let cookie = session.store().login_flag().set_cookie(Utc::now());
    match RouteGuard::default().decide_request(Some(cookie.as_str()), target) {
        GuardDecision::Proceed => println!("proceed {}", target),
        GuardDecision::Redirect(to) => println!("redirect {}", to),
    }
}
