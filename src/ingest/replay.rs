/// Replay mode for working with saved pages
///
/// When the live page is unavailable (or renders differently), save the
/// river-flow page for each year as `<dir>/<year>.html` and point the
/// service at the directory. Runs become reproducible: the same pages
/// always produce the same rows.

use std::path::{Path, PathBuf};

use super::wapda::{log_rejected, parse_table_rows};
use super::{RawRow, RawTableFetcher};
use crate::logging::{Logger, Source};

/// Serves raw rows from saved HTML pages.
pub struct ReplayFetcher {
    /// Directory holding one `<year>.html` file per year
    pub dir: PathBuf,
}

impl ReplayFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the saved page for `year`.
    pub fn page_path(&self, year: i32) -> PathBuf {
        self.dir.join(format!("{}.html", year))
    }

    /// Years with a saved page, ascending.
    pub fn available_years(dir: &Path) -> std::io::Result<Vec<i32>> {
        let mut years: Vec<i32> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("html") {
                    return None;
                }
                path.file_stem()?.to_str()?.parse().ok()
            })
            .collect();
        years.sort_unstable();
        Ok(years)
    }
}

impl RawTableFetcher for ReplayFetcher {
    fn fetch(
        &self,
        _url: &str,
        year: i32,
        logger: &Logger,
    ) -> Result<Vec<RawRow>, Box<dyn std::error::Error>> {
        let path = self.page_path(year);
        if !path.exists() {
            return Err(format!("No replay page for {} at {}", year, path.display()).into());
        }

        logger.debug(
            Source::Wapda,
            Some(&year.to_string()),
            &format!("Replaying {}", path.display()),
        );
        let html = std::fs::read_to_string(&path)?;
        let parsed = parse_table_rows(&html)?;
        log_rejected(logger, year, &parsed);
        Ok(parsed.rows)
    }
}
