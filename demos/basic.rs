//! Basic example demonstrating the Sonar API client.
//!
//! Run with:
//! ```
//! SONAR_HOST_URL=https://sonar.example.com SONAR_TOKEN=squ_... cargo run --example basic
//! ```

use futures::TryStreamExt;
use sonarapi::{project_badge, BadgeMetric, Project, SonarClient, SonarError, User};

#[tokio::main]
async fn main() -> sonarapi::Result<()> {
    // Initialize tracing for debugging (optional)
    tracing_subscriber::fmt::init();

    // Create client from environment variables
    println!("Creating Sonar client...");
    let client = SonarClient::from_env()?;
    println!("Connected to: {} ({:?} auth)", client.base_url(), client.auth_type());

    // First page of projects
    println!("\n--- Searching Projects (first page) ---");
    let response = Project::search(&client).page_size(10).execute().await?;
    println!(
        "Found {} projects (showing {})",
        response.paging.total,
        response.components.len()
    );
    for project in &response.components {
        println!("  - {} ({})", project.name, project.key);
    }

    // Stream every active user; pages are fetched as the stream is consumed
    println!("\n--- Active Users ---");
    let mut users = User::search(&client).active(true).page_size(50).all();
    let mut count = 0;
    while let Some(user) = users.try_next().await? {
        count += 1;
        if count <= 5 {
            println!("  - {}", user.login);
        }
    }
    println!("{count} active users");

    // Badge for the first project, if any
    if let Some(first) = response.components.first() {
        println!("\n--- Quality Gate Badge ---");
        match project_badge(&client, &first.key, BadgeMetric::AlertStatus, None, None).await {
            Ok(svg) => println!("Badge SVG is {} bytes", svg.len()),
            Err(SonarError::Authorization { .. }) => println!("Badge requires a project badge token"),
            Err(e) => return Err(e),
        }
    }

    println!("\nDone!");
    Ok(())
}
