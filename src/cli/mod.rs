//! CLI argument parsing types.
//!
//! This module provides the command-line interface structure for the sonarapi binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::BadgeMetric;

/// Sonar Web API command-line interface.
#[derive(Parser, Debug)]
#[command(name = "sonarapi", about = "SonarQube / SonarCloud Web API CLI", version)]
pub struct Cli {
    /// Output results as JSON instead of a table.
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search projects.
    #[command(alias = "project")]
    Projects {
        /// Match on project name or key.
        #[arg(long, short)]
        query: Option<String>,

        /// SonarCloud organization key.
        #[arg(long, env = "SONAR_ORGANIZATION")]
        organization: Option<String>,

        #[command(flatten)]
        paging: PagingArgs,
    },

    /// List users.
    #[command(alias = "user")]
    Users {
        /// Only active (true) or deactivated (false) users.
        #[arg(long)]
        active: Option<bool>,

        /// Match on login, name or email.
        #[arg(long, short)]
        query: Option<String>,

        #[command(flatten)]
        paging: PagingArgs,
    },

    /// Download a project badge (SVG).
    Badge {
        /// Project key.
        project: String,

        /// Metric to display.
        #[arg(long, default_value = "alert_status")]
        metric: BadgeMetric,

        /// Branch name.
        #[arg(long)]
        branch: Option<String>,

        /// Badge token, required for private projects.
        #[arg(long, env = "SONAR_BADGE_TOKEN")]
        token: Option<String>,

        /// File to write the badge to.
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Download the regulatory report (zip) of a project.
    Report {
        /// Project key.
        project: String,

        /// Branch name.
        #[arg(long)]
        branch: Option<String>,

        /// File to write the report to.
        #[arg(long, short)]
        output: PathBuf,
    },
}

/// Pagination flags shared by list commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PagingArgs {
    /// Page number (1-indexed).
    #[arg(long)]
    pub page: Option<u32>,

    /// Number of items per page.
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Fetch every page.
    #[arg(long, conflicts_with = "page")]
    pub all: bool,
}
