use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use sourced_logging::LogDestination;

/// Fetch a resource once, cache it at PATH, and print it.
#[derive(Debug, Parser)]
#[command(name = "sourced", version)]
pub struct Args {
    /// Cache file; reused while younger than --max-age.
    pub path: PathBuf,

    /// URL template to fetch; repeat for several. `%pN` pages from N.
    #[arg(long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Request header as `Name: value`; repeatable.
    #[arg(long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Refresh once the cache file is older than this, e.g. "1 day".
    #[arg(long)]
    pub max_age: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    pub format: Format,

    /// JSON query; each page becomes the list of all matches.
    #[arg(long, conflicts_with = "pick")]
    pub find: Option<String>,

    /// JSON query; each page becomes its first match.
    #[arg(long)]
    pub pick: Option<String>,

    /// JSON query locating the next page URL.
    #[arg(long, value_name = "QUERY")]
    pub next_page: Option<String>,

    /// Keep matching lines, or a range with `ON..OFF`.
    ///
    /// In range mode a `=` at either end of the expression, or next to `..`,
    /// is always an include flag and never part of the pattern: `=ON..OFF=`
    /// keeps both boundary lines. Write `[=]` to match a literal `=` there.
    #[arg(long)]
    pub grep: Option<String>,

    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Indent width for the stored JSON.
    #[arg(long)]
    pub indent: Option<usize>,

    /// Encoding label for text and csv; text also accepts "detect".
    #[arg(long, default_value = "utf-8")]
    pub encoding: String,

    /// Per-request timeout.
    #[arg(long, env = "SOURCED_TIMEOUT")]
    pub timeout: Option<String>,

    /// Skip the `<path>.lock` file.
    #[arg(long)]
    pub no_lock: bool,

    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// More output; repeat for debug and trace.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Text,
    Binary,
    Csv,
    Ini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

impl Args {
    pub fn level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Whether any JSON-only option was given.
    pub fn uses_queries(&self) -> bool {
        self.find.is_some() || self.pick.is_some() || self.next_page.is_some()
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_splits_on_first_colon() {
        assert_eq!(
            parse_header("Authorization: Bearer a:b").unwrap(),
            ("Authorization".to_string(), "Bearer a:b".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn parses_full_command_line() {
        let args = Args::try_parse_from([
            "sourced",
            "kanji.json",
            "--url",
            "https://api.example.com/v2/subjects?types=kanji",
            "--header",
            "Wanikani-Revision: 20170710",
            "--find",
            "data[*].data.characters",
            "--next-page",
            "pages.next_url",
            "--max-age",
            "1 day",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.path, PathBuf::from("kanji.json"));
        assert_eq!(args.urls.len(), 1);
        assert_eq!(
            args.headers,
            vec![("Wanikani-Revision".to_string(), "20170710".to_string())]
        );
        assert_eq!(args.format, Format::Json);
        assert!(args.uses_queries());
        assert_eq!(args.level(), LevelFilter::Debug);
    }

    #[test]
    fn find_and_pick_conflict() {
        let err = Args::try_parse_from([
            "sourced", "x.json", "--url", "u", "--find", "a", "--pick", "b",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
