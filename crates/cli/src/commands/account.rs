//! Account commands: register, login, logout, profile.

#![allow(clippy::print_stdout)]

use duka_client::api::{NewAccount, RegisterRequest};
use duka_client::{ClientError, ProfileSnapshot, RegistrationOutcome};
use secrecy::{ExposeSecret, SecretString};

use super::App;

/// Register a new account, signing in if the backend issues tokens.
pub async fn register(
    app: &App,
    username: String,
    email: String,
    first_name: String,
    password: &SecretString,
) -> Result<(), ClientError> {
    let form = RegisterRequest {
        user: NewAccount {
            username,
            email,
            first_name,
        },
        password: password.expose_secret().to_string(),
        password2: password.expose_secret().to_string(),
    };

    match app.accounts().register(&form).await? {
        RegistrationOutcome::SignedIn(profile) => {
            println!("Account created. {}", greeting(profile.as_ref()));
        }
        RegistrationOutcome::PendingLogin { message } => {
            println!(
                "{}. Run `duka login` to sign in.",
                message.as_deref().unwrap_or("Account created")
            );
        }
    }
    Ok(())
}

pub async fn login(app: &App, username: &str, password: &SecretString) -> Result<(), ClientError> {
    let profile = app
        .accounts()
        .login(username, password.expose_secret())
        .await?;
    println!("{}", greeting(profile.as_ref()));
    Ok(())
}

pub async fn logout(app: &App) -> Result<(), ClientError> {
    app.accounts().logout().await?;
    println!("Signed out.");
    Ok(())
}

/// Print the cached profile, optionally re-fetching it first.
pub async fn profile(app: &App, refresh: bool) -> Result<(), ClientError> {
    let profile = if refresh {
        app.accounts().refresh_profile().await?
    } else {
        app.accounts()
            .current_profile()
            .await
            .ok_or(ClientError::NotAuthenticated)?
    };

    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("Customer:  {}", profile.customer_id().map_or_else(|| "-".to_string(), |id| id.to_string()));
    println!("Username:  {}", field(&profile.username));
    println!("Name:      {} {}", field(&profile.first_name), field(&profile.last_name));
    println!("Email:     {}", field(&profile.email));
    println!("Telephone: {}", field(&profile.telephone));
    println!("Location:  {}", field(&profile.location));
    Ok(())
}

fn greeting(profile: Option<&ProfileSnapshot>) -> String {
    format!(
        "Karibu, {}!",
        profile.map_or("customer", ProfileSnapshot::display_name)
    )
}
