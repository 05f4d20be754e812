//! Sonar Web API CLI binary.
//!
//! A command-line interface for interacting with the SonarQube / SonarCloud Web API.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use futures::{Stream, StreamExt};
use serde::Serialize;
use sonarapi::cli::{Cli, Command, PagingArgs};
use sonarapi::{
    download_regulatory_report, project_badge, BadgeMetric, DownloadChunk, Page, PrettyPrint, Project,
    SonarClient, SonarError, User,
};
use tabled::{Table, Tabled};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Failures of the command-line tool.
///
/// API outcomes keep their [`SonarError`] classification; local file and
/// formatting problems get their own variants.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Api(#[from] SonarError),

    #[error("Cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot format output as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

type CliResult<T> = std::result::Result<T, CliError>;

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = match SonarClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Hint: Set SONAR_HOST_URL and SONAR_TOKEN environment variables");
            return ExitCode::FAILURE;
        }
    };

    match run(&client, cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if let CliError::Api(SonarError::Authentication { .. }) = e {
                eprintln!("Hint: Check that SONAR_TOKEN is valid and not expired");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &SonarClient, cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Projects {
            query,
            organization,
            paging,
        } => handle_projects(client, query, organization, paging, cli.json).await,
        Command::Users {
            active,
            query,
            paging,
        } => handle_users(client, active, query, paging, cli.json).await,
        Command::Badge {
            project,
            metric,
            branch,
            token,
            output,
        } => handle_badge(client, &project, metric, branch.as_deref(), token.as_deref(), &output).await,
        Command::Report {
            project,
            branch,
            output,
        } => handle_report(client, &project, branch.as_deref(), &output).await,
    }
}

async fn handle_projects(
    client: &SonarClient,
    query: Option<String>,
    organization: Option<String>,
    paging: PagingArgs,
    json: bool,
) -> CliResult<()> {
    let mut builder = Project::search(client).page_size(paging.page_size.unwrap_or(DEFAULT_PAGE_SIZE));
    if let Some(q) = query {
        builder = builder.query(q);
    }
    if let Some(org) = organization {
        builder = builder.organization(org);
    }

    if paging.all {
        let projects = builder.collect_all().await?;
        output_list(&projects, json, |p| ProjectRow::from(p))
    } else {
        let page = builder.page(paging.page.unwrap_or(1)).execute_page().await?;
        output_page(&page, json, |p| ProjectRow::from(p))
    }
}

async fn handle_users(
    client: &SonarClient,
    active: Option<bool>,
    query: Option<String>,
    paging: PagingArgs,
    json: bool,
) -> CliResult<()> {
    let mut builder = User::search(client).page_size(paging.page_size.unwrap_or(DEFAULT_PAGE_SIZE));
    if let Some(active) = active {
        builder = builder.active(active);
    }
    if let Some(q) = query {
        builder = builder.q(q);
    }

    if paging.all {
        let users = builder.collect_all().await?;
        output_list(&users, json, |u| UserRow::from(u))
    } else {
        let page = builder.page(paging.page.unwrap_or(1)).execute_page().await?;
        output_page(&page, json, |u| UserRow::from(u))
    }
}

async fn handle_badge(
    client: &SonarClient,
    project: &str,
    metric: BadgeMetric,
    branch: Option<&str>,
    token: Option<&str>,
    output: &Path,
) -> CliResult<()> {
    let svg = project_badge(client, project, metric, branch, token).await?;
    tokio::fs::write(output, &svg).await.map_err(io_error(output))?;
    eprintln!("Wrote {} bytes to {}", svg.len(), output.display());
    Ok(())
}

async fn handle_report(
    client: &SonarClient,
    project: &str,
    branch: Option<&str>,
    output: &Path,
) -> CliResult<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let stream = download_regulatory_report(client, project, branch, Some(cancel)).await?;
    let written = save_stream(stream, output, |chunk| eprint!("\r{}", chunk.progress.pretty_print())).await?;
    eprintln!();
    eprintln!("Wrote {written} bytes to {}", output.display());
    Ok(())
}

/// Write a download to `output`, going through `<output>.part`.
///
/// The partial file is renamed into place only once the stream ends
/// cleanly; on any error it is removed, so `output` never holds a
/// truncated download.
async fn save_stream<S, F>(mut stream: S, output: &Path, mut on_chunk: F) -> CliResult<u64>
where
    S: Stream<Item = sonarapi::Result<DownloadChunk>> + Unpin,
    F: FnMut(&DownloadChunk),
{
    let partial = partial_path(output);

    let result = async {
        let mut file = tokio::fs::File::create(&partial).await.map_err(io_error(&partial))?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk.bytes).await.map_err(io_error(&partial))?;
            written += chunk.bytes.len() as u64;
            on_chunk(&chunk);
        }
        file.flush().await.map_err(io_error(&partial))?;
        Ok::<u64, CliError>(written)
    }
    .await;

    match result {
        Ok(written) => {
            tokio::fs::rename(&partial, output).await.map_err(io_error(output))?;
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::debug!(path = %partial.display(), error = %cleanup, "no partial file to remove");
            }
            Err(e)
        }
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn output_list<T, R, F>(items: &[T], json: bool, to_row: F) -> CliResult<()>
where
    T: Serialize + PrettyPrint,
    R: Tabled,
    F: Fn(&T) -> R,
{
    if json {
        println!("{}", to_json(items)?);
    } else if let [single] = items {
        println!("{}", single.pretty_print());
    } else {
        let rows: Vec<R> = items.iter().map(to_row).collect();
        println!("{}", Table::new(rows));
        println!("\n{} items", items.len());
    }
    Ok(())
}

fn output_page<T, R, F>(page: &Page<T>, json: bool, to_row: F) -> CliResult<()>
where
    T: Serialize + PrettyPrint,
    R: Tabled,
    F: Fn(&T) -> R,
{
    output_list(&page.items, json, to_row)?;
    if !json {
        if page.has_more {
            println!("Page {} (more available, use --page {} or --all)", page.page, page.page + 1);
        } else {
            println!("Page {} (end)", page.page);
        }
    }
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

// Table row types for non-JSON output

#[derive(Tabled)]
struct ProjectRow {
    key: String,
    name: String,
    visibility: String,
    #[tabled(rename = "last analysis")]
    last_analysis: String,
}

impl From<&Project> for ProjectRow {
    fn from(p: &Project) -> Self {
        Self {
            key: p.key.clone(),
            name: p.name.clone(),
            visibility: p.visibility.clone().unwrap_or_default(),
            last_analysis: p.last_analysis_date.clone().unwrap_or_else(|| "never".to_string()),
        }
    }
}

#[derive(Tabled)]
struct UserRow {
    login: String,
    name: String,
    active: bool,
    provider: String,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        Self {
            login: u.login.clone(),
            name: u.name.clone().unwrap_or_default(),
            active: u.active,
            provider: u.external_provider.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use sonarapi::{DownloadProgress, ErrorKind};

    fn scratch_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sonarapi-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn chunk(bytes: &[u8], loaded: u64) -> sonarapi::Result<DownloadChunk> {
        Ok(DownloadChunk {
            bytes: bytes.to_vec(),
            progress: DownloadProgress::new(loaded, Some(6)),
        })
    }

    #[tokio::test]
    async fn test_completed_download_is_renamed_into_place() {
        let output = scratch_path("complete.zip");
        let chunks = stream::iter(vec![chunk(b"abc", 3), chunk(b"def", 6)]);

        let mut seen = 0;
        let written = save_stream(chunks, &output, |_| seen += 1).await.unwrap();

        assert_eq!(written, 6);
        assert_eq!(seen, 2);
        assert_eq!(std::fs::read(&output).unwrap(), b"abcdef");
        assert!(!partial_path(&output).exists());
        std::fs::remove_file(&output).unwrap();
    }

    #[tokio::test]
    async fn test_interrupted_download_leaves_no_file() {
        let output = scratch_path("interrupted.zip");
        let chunks = stream::iter(vec![
            chunk(b"abc", 3),
            Err(SonarError::timeout("download cancelled")),
        ]);

        let err = save_stream(chunks, &output, |_| {}).await.unwrap_err();

        match err {
            CliError::Api(e) => assert_eq!(e.kind(), ErrorKind::Timeout),
            other => panic!("expected API error, got {other:?}"),
        }
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    async fn test_unwritable_output_is_io_error() {
        let output = scratch_path("missing-dir").join("nested").join("report.zip");
        let chunks = stream::iter(vec![chunk(b"abc", 3)]);

        let err = save_stream(chunks, &output, |_| {}).await.unwrap_err();

        assert!(matches!(err, CliError::Io { .. }), "{err:?}");
        assert!(err.to_string().starts_with("Cannot write"));
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("out/report.zip")),
            PathBuf::from("out/report.zip.part")
        );
    }
}
