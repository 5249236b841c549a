use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trackbook")]
#[command(version, about = "A local-first tracker for classes, stock, sprints, fleets and clinics")]
#[command(propagate_version = true)]
pub struct Cli {
    /// App to work in (school, inventory, agile, transport, telehealth).
    /// Defaults to the one in .trackbook/config.yaml
    #[arg(long, short = 'a', global = true)]
    pub app: Option<String>,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new trackbook project in the current directory
    Init,

    /// List the records of a collection
    List {
        /// Collection to list (e.g. students, items, tasks, vehicles)
        collection: String,

        /// Query string: free text plus "facet:value" terms
        #[arg(long, short = 'q')]
        query: Option<String>,

        /// Free-text search across the record's text fields
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Facet filter in format "name=value" (can be specified multiple times)
        #[arg(long = "filter", short = 'f')]
        filters: Vec<String>,

        /// Sort column. Repeating the same column flips the direction
        #[arg(long = "sort")]
        sort: Vec<String>,

        /// Flip the final sort direction
        #[arg(long, requires = "sort")]
        desc: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one record with its derived fields
    Get {
        collection: String,

        /// Record ID (full or unique prefix)
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a record
    Add {
        collection: String,

        /// Field value in format "field=value" (can be specified multiple times)
        #[arg(long = "set", short = 's')]
        fields: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update a record through its form, or merge a JSON patch
    Update {
        collection: String,

        /// Record ID (full or unique prefix)
        id: String,

        /// Field value in format "field=value" (can be specified multiple times)
        #[arg(long = "set", short = 's', conflicts_with = "patch")]
        fields: Vec<String>,

        /// JSON object merged into the stored record
        #[arg(long)]
        patch: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a record and apply the app's cascade rules
    Delete {
        collection: String,

        /// Record ID (full or unique prefix)
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Append records from a CSV or JSON file
    Import {
        collection: String,

        /// File to read; stdin when omitted or "-"
        file: Option<PathBuf>,

        /// csv or json (default: from the file extension, else csv)
        #[arg(long)]
        format: Option<String>,

        /// CSV dialect: standard or legacy
        #[arg(long)]
        dialect: Option<String>,

        /// strict or lenient (default: the app's policy)
        #[arg(long)]
        policy: Option<String>,
    },

    /// Export a collection as CSV or JSON
    Export {
        collection: String,

        /// csv or json
        #[arg(long, default_value = "csv")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print the CSV header accepted by import
    Template {
        collection: String,

        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show the app's dashboard figures
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change the app's theme (dark, light, toggle)
    Theme {
        #[arg(value_name = "MODE")]
        mode: Option<String>,
    },
}
