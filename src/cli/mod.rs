//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chat Backup Exporter - Turn a device backup into browsable chat documents.
#[derive(Parser, Debug)]
#[command(name = "chat-backup-exporter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to an alternative config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export a backup into a static document set.
    Export {
        /// Backup snapshot directory.
        #[arg(short, long)]
        backup: PathBuf,

        /// Output directory; must already exist.
        #[arg(short, long)]
        output: PathBuf,

        /// Work directory with res/ templates (defaults to the data dir).
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Output document extension, without the dot.
        #[arg(long)]
        extension: Option<String>,

        /// Template set directory name under the work dir's res/.
        #[arg(long)]
        template_set: Option<String>,

        /// Restrict the run to an account, or to one of its conversations
        /// with ACCOUNT:CONVERSATION. Repeatable.
        #[arg(short, long = "select", value_name = "ACCOUNT[:CONVERSATION]")]
        select: Vec<String>,

        /// Embed all messages inline instead of paginating.
        #[arg(long)]
        text_mode: bool,

        /// List conversations newest-first.
        #[arg(long)]
        newest_first: bool,

        /// Keep per-conversation icon folders inside the conversation
        /// asset directory.
        #[arg(long)]
        files_in_session: bool,

        /// Skip avatar downloads and placeholder folders.
        #[arg(long)]
        no_avatars: bool,

        /// Skip emoji asset folders.
        #[arg(long)]
        no_emoji: bool,

        /// Insert names and links without HTML-escaping/URL-encoding.
        #[arg(long)]
        raw_markup: bool,

        /// Media download worker threads.
        #[arg(long)]
        workers: Option<usize>,
    },

    /// List the accounts and conversations a backup contains, without
    /// exporting anything.
    Preview {
        /// Backup snapshot directory.
        #[arg(short, long)]
        backup: PathBuf,
    },

    /// Write the default configuration file if none exists.
    InitConfig,
}

/// Parse repeated `ACCOUNT[:CONVERSATION]` selectors into the coordinator's
/// filter map. A bare account maps to an empty set, meaning all of its
/// conversations.
#[must_use]
pub fn parse_selectors(selectors: &[String]) -> HashMap<String, HashSet<String>> {
    let mut filter: HashMap<String, HashSet<String>> = HashMap::new();
    for selector in selectors {
        match selector.split_once(':') {
            Some((account, conversation)) if !conversation.is_empty() => {
                filter
                    .entry(account.to_string())
                    .or_default()
                    .insert(conversation.to_string());
            }
            Some((account, _)) => {
                filter.entry(account.to_string()).or_default();
            }
            None => {
                filter.entry(selector.clone()).or_default();
            }
        }
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selectors() {
        let filter = parse_selectors(&[
            "alice".to_string(),
            "bob:work".to_string(),
            "bob:family".to_string(),
            "carol:".to_string(),
        ]);

        assert!(filter["alice"].is_empty());
        assert_eq!(filter["bob"].len(), 2);
        assert!(filter["bob"].contains("work"));
        assert!(filter["carol"].is_empty());
        assert!(!filter.contains_key("dave"));
    }

    #[test]
    fn test_whole_account_selector_wins_over_nothing() {
        // A bare account after a scoped one widens the set semantics; the
        // coordinator treats an empty set as "everything".
        let filter = parse_selectors(&["bob:work".to_string()]);
        assert_eq!(filter["bob"], HashSet::from(["work".to_string()]));
    }
}
