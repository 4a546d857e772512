//! Account commands. The session token is kept in the CLI config.

use anyhow::Result;

use crate::client::{ApiClient, SignupRequest};
use crate::config::Config;
use crate::output::{print_info, print_success, print_warning};

pub async fn signup(
    client: &ApiClient,
    username: String,
    email: Option<String>,
    password: String,
) -> Result<()> {
    let response = client
        .signup(&SignupRequest {
            username,
            email,
            password,
        })
        .await?;
    print_success(&response.message);
    Ok(())
}

pub async fn login(client: &ApiClient, config: &mut Config, username: &str, password: &str) -> Result<()> {
    let response = client.login(username, password).await?;
    config.set_session(&response.username, &response.token);
    config.save()?;
    print_success(&format!("{} as {}", response.message, response.username));
    Ok(())
}

pub async fn logout(client: &ApiClient, config: &mut Config) -> Result<()> {
    if config.session_token.is_none() {
        print_info("Not logged in");
        return Ok(());
    }
    // Forget the local session even if the server already dropped it
    if let Err(e) = client.logout().await {
        print_warning(&format!("Server logout failed: {}", e));
    }
    config.clear_session();
    config.save()?;
    print_success("Logged out");
    Ok(())
}
