//! Output formatting for CLI display.
//!
//! Provides the [`PrettyPrint`] trait for human-readable output
//! as an alternative to JSON serialization.

use crate::{DownloadProgress, Project, User};

/// Trait for human-readable key-value output.
///
/// Implemented by entity types to provide formatted output
/// suitable for terminal display when `--json` is not specified.
pub trait PrettyPrint {
    /// Returns a formatted string for terminal display.
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for Project {
    fn pretty_print(&self) -> String {
        let divider = "─".repeat(self.key.len().max(30));

        let mut lines = vec![
            format!("Project: {}", self.key),
            divider,
            format!("Name:           {}", self.name),
        ];

        if let Some(ref qualifier) = self.qualifier {
            lines.push(format!("Qualifier:      {}", qualifier));
        }

        if let Some(ref visibility) = self.visibility {
            lines.push(format!("Visibility:     {}", visibility));
        }

        match self.last_analysis_date {
            Some(ref date) => lines.push(format!("Last Analysis:  {}", date)),
            None => lines.push("Last Analysis:  never".to_string()),
        }

        if let Some(ref revision) = self.revision {
            lines.push(format!("Revision:       {}", revision));
        }

        if self.managed {
            lines.push("Managed:        yes".to_string());
        }

        lines.join("\n")
    }
}

impl PrettyPrint for User {
    fn pretty_print(&self) -> String {
        let divider = "─".repeat(self.login.len().max(30));

        let mut lines = vec![
            format!("User: {}", self.login),
            divider,
            format!("Active:         {}", if self.active { "yes" } else { "no" }),
        ];

        if let Some(ref name) = self.name {
            lines.push(format!("Name:           {}", name));
        }

        if let Some(ref email) = self.email {
            lines.push(format!("Email:          {}", email));
        }

        if let Some(ref provider) = self.external_provider {
            lines.push(format!("Provider:       {}", provider));
        }

        if let Some(ref last) = self.sonar_qube_last_connection_date {
            lines.push(format!("Last Seen:      {}", last.format("%Y-%m-%d %H:%M:%S UTC")));
        }

        lines.join("\n")
    }
}

impl PrettyPrint for DownloadProgress {
    fn pretty_print(&self) -> String {
        match (self.total, self.percentage) {
            (Some(total), Some(pct)) => format!("{} / {} bytes ({:.1}%)", self.loaded, total, pct),
            _ => format!("{} bytes", self.loaded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_pretty_print_format() {
        let project: Project = serde_json::from_value(serde_json::json!({
            "key": "my_project",
            "name": "My Project",
            "qualifier": "TRK"
        }))
        .unwrap();

        let output = project.pretty_print();
        assert!(output.starts_with("Project: my_project"));
        assert!(output.contains("Name:"));
        assert!(output.contains("never"));
    }

    #[test]
    fn test_progress_pretty_print() {
        assert_eq!(
            DownloadProgress::new(512, Some(1024)).pretty_print(),
            "512 / 1024 bytes (50.0%)"
        );
        assert_eq!(DownloadProgress::new(512, None).pretty_print(), "512 bytes");
    }
}
