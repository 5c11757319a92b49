use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tracing::info;

use crate::config::DEFAULT_EXPORT_DIR;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::types::Trader;

const CSV_HEADER: [&str; 8] = [
    "Rank",
    "Address",
    "Username",
    "Win Rate (%)",
    "P&L ($)",
    "ROI (%)",
    "Volume ($)",
    "Last Scanned",
];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILE_STAMP: &str = "%Y%m%d_%H%M%S";

/// Writes leaderboard CSVs and thesis Markdown files into one directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
}

impl Exporter {
    /// An empty `dir` means `exports`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_EXPORT_DIR)
        } else {
            dir.to_path_buf()
        };
        Self { dir }
    }

    /// Create the export directory and any missing parents.
    pub fn ensure_export_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Write traders in the given order, ranked from 1.
    pub fn export_leaderboard_csv(&self, traders: &[Trader], filename: Option<&str>) -> Result<PathBuf> {
        let name = match filename.filter(|f| !f.trim().is_empty()) {
            Some(f) => with_extension(f.trim(), "csv"),
            None => format!("leaderboard_{}.csv", Local::now().format(FILE_STAMP)),
        };
        let path = self.write(&name, &render_leaderboard_csv(traders))?;
        info!(path = %path.display(), rows = traders.len(), "Leaderboard exported");
        Ok(path)
    }

    pub fn export_thesis_markdown(&self, trader: &Trader, thesis: &str, filename: Option<&str>) -> Result<PathBuf> {
        if thesis.trim().is_empty() {
            return Err(AppError::EmptyThesis);
        }
        let name = match filename.filter(|f| !f.trim().is_empty()) {
            Some(f) => with_extension(f.trim(), "md"),
            None => format!(
                "thesis_{}_{}.md",
                short_address(&trader.address),
                Local::now().format(FILE_STAMP)
            ),
        };
        let path = self.write(&name, &render_thesis_markdown(trader, thesis, Utc::now()))?;
        info!(path = %path.display(), address = %trader.address, "Thesis exported");
        Ok(path)
    }

    /// Export the trader's most recent stored analysis.
    pub async fn export_analysis_from_db(&self, db: &Database, address: &str, filename: Option<&str>) -> Result<PathBuf> {
        let trader = db
            .get_trader(address)
            .await?
            .ok_or_else(|| AppError::TraderNotFound(address.to_string()))?;
        let analysis = db
            .get_latest_analysis(address)
            .await?
            .ok_or_else(|| AppError::NoAnalysis(address.to_string()))?;
        self.export_thesis_markdown(&trader, &analysis.thesis, filename)
    }

    fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        self.ensure_export_dir()?;
        let path = self.dir.join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_leaderboard_csv(traders: &[Trader]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');
    for (i, t) in traders.iter().enumerate() {
        let row = [
            (i + 1).to_string(),
            csv_field(&t.address),
            csv_field(t.username.as_deref().unwrap_or("")),
            format!("{:.2}", t.win_rate * 100.0),
            format!("{:.2}", t.profit_loss),
            format!("{:.2}", t.roi * 100.0),
            format!("{:.2}", t.volume),
            t.last_scanned.format(TIME_FORMAT).to_string(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

pub fn render_thesis_markdown(trader: &Trader, thesis: &str, generated_at: DateTime<Utc>) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Trading Thesis: {}\n\n", trader.address));
    if let Some(name) = trader.username.as_deref().filter(|n| !n.is_empty()) {
        md.push_str(&format!("**Trader:** {name}\n"));
    }
    md.push_str(&format!("**Generated:** {}\n\n", generated_at.format(TIME_FORMAT)));

    md.push_str("## Metrics\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Win Rate | {:.2}% |\n", trader.win_rate * 100.0));
    md.push_str(&format!("| P&L | ${:.2} |\n", trader.profit_loss));
    md.push_str(&format!("| ROI | {:.2}% |\n", trader.roi * 100.0));
    md.push_str(&format!("| Volume | ${:.2} |\n", trader.volume));
    md.push_str(&format!("| Last Scanned | {} |\n\n", trader.last_scanned.format(TIME_FORMAT)));

    md.push_str("## Analysis\n\n");
    md.push_str(thesis.trim_end());
    md.push_str("\n\n---\n\n_Generated by Polytracker_\n");
    md
}

/// Quote a field when it holds a delimiter, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn with_extension(name: &str, ext: &str) -> String {
    if name.to_ascii_lowercase().ends_with(&format!(".{ext}")) {
        name.to_string()
    } else {
        format!("{name}.{ext}")
    }
}

/// First ten characters, used in generated file names.
pub fn short_address(address: &str) -> String {
    address.chars().take(10).collect()
}
