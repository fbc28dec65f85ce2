//! Cookie store commands.

use std::io::Read;
use std::path::Path;

use tubesaver_core::{CookieStatus, CookieValidator, HttpCookieValidator, Result, Site};

use super::state::AppState;

/// `tubesaver cookies validate`: probe every supported site.
pub fn validate(state: &AppState) -> Result<bool> {
    let validator = HttpCookieValidator::new();
    let statuses = site_statuses(state, &validator);
    for (site, status) in &statuses {
        println!("{site}: {status}");
    }
    Ok(!statuses
        .iter()
        .any(|(_, status)| *status == CookieStatus::Invalid))
}

/// Status of each supported site's session.
pub fn site_statuses(
    state: &AppState,
    validator: &dyn CookieValidator,
) -> Vec<(Site, CookieStatus)> {
    Site::ALL
        .iter()
        .map(|&site| (site, state.cookies.status(site, validator)))
        .collect()
}

/// `tubesaver cookies expiry`.
pub fn expiry(state: &AppState) -> Result<bool> {
    let expirations = state.cookies.expirations();
    if expirations.is_empty() {
        println!("No cookies with an expiry date");
    }
    for cookie in expirations {
        println!("{} {} expires {} UTC", cookie.domain, cookie.name, cookie.expires_at);
    }
    Ok(true)
}

/// `tubesaver cookies path`.
pub fn path(state: &AppState) -> Result<bool> {
    println!("{}", state.cookies.path().display());
    Ok(true)
}

/// `tubesaver cookies replace`: a JSON array of cookies read from stdin.
pub fn replace(state: &AppState) -> Result<bool> {
    eprintln!("Paste the cookie JSON array, then end input (Ctrl-D):");
    let mut json = String::new();
    std::io::stdin().read_to_string(&mut json)?;
    replace_with(state, &json)
}

/// Replace the store with `json`.
pub fn replace_with(state: &AppState, json: &str) -> Result<bool> {
    let count = state.cookies.replace(json)?;
    println!("Saved {count} cookies");
    Ok(true)
}

/// `tubesaver cookies import <path>`.
pub fn import(state: &AppState, source: &Path) -> Result<bool> {
    let count = state.cookies.import(source)?;
    println!("Imported {count} cookies from {}", source.display());
    Ok(true)
}

/// `tubesaver cookies export <path>`.
pub fn export(state: &AppState, destination: &Path) -> Result<bool> {
    let target = state.cookies.export(destination)?;
    println!("Exported cookies to {}", target.display());
    Ok(true)
}

/// `tubesaver cookies delete`.
pub fn delete(state: &AppState) -> Result<bool> {
    if !state.prompt().confirm("Delete all stored cookies?", false) {
        println!("Cookies kept");
        return Ok(true);
    }
    if state.cookies.delete()? {
        println!("Cookies deleted");
    } else {
        println!("No cookies stored");
    }
    Ok(true)
}
