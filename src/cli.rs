use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Act as this user. Defaults to `default_user` from config.yaml
    #[clap(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start nb as a service.
    Daemon {
        /// Address to listen on
        #[clap(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },

    /// Create a note
    Add {
        /// Note title
        #[clap(short, long)]
        title: String,

        /// Note content, `-` reads stdin
        #[clap(short, long, default_value = "")]
        content: String,

        /// Comma separated tags, at least one
        #[clap(short = 'g', long)]
        tags: String,

        /// Note color, e.g. #FFE066
        #[clap(long)]
        color: Option<String>,

        /// Folder id
        #[clap(long)]
        folder: Option<String>,
    },

    /// Update a note. Title or content changes regenerate its embedding
    Update {
        id: u64,

        #[clap(short, long)]
        title: Option<String>,

        /// `-` reads stdin
        #[clap(short, long)]
        content: Option<String>,

        /// Replace tags
        #[clap(short = 'g', long)]
        tags: Option<String>,

        #[clap(long)]
        color: Option<String>,

        /// Pin or unpin
        #[clap(long)]
        pin: Option<bool>,

        /// Move to folder, empty string removes from folder
        #[clap(long)]
        folder: Option<String>,
    },

    /// Delete a note
    Delete { id: u64 },

    /// Print a note
    Show { id: u64 },

    /// List notes, pinned first
    List {
        /// Match title or content, or an exact tag
        #[clap(short, long)]
        search: Option<String>,

        /// Comma separated tags, any may match
        #[clap(short = 'g', long)]
        tags: Option<String>,

        #[clap(long)]
        folder: Option<String>,
    },

    /// List distinct tags
    Tags {},

    /// Notes most similar to the given note
    Related {
        id: u64,

        /// Minimum similarity, -1.0 to 1.0
        #[clap(long, allow_hyphen_values = true)]
        threshold: Option<f32>,

        /// Maximum number of results
        #[clap(long)]
        limit: Option<usize>,
    },

    /// Regenerate a note's embedding
    Reembed { id: u64 },

    /// Summarize text, `-` reads stdin
    Summarize { content: String },

    /// Expand shorthand into a full note, `-` reads stdin
    Expand { shorthand: String },

    /// Suggest a title for text, `-` reads stdin
    Title { content: String },

    /// Manage folders
    Folder {
        #[clap(subcommand)]
        action: FolderArgs,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FolderArgs {
    /// Create a folder
    Add {
        name: String,

        /// Folder color, e.g. #4F46E5
        #[clap(long)]
        color: Option<String>,
    },

    /// List folders with their note counts, newest first
    List {},

    /// Rename or recolor a folder
    Update {
        id: String,

        #[clap(long)]
        name: Option<String>,

        #[clap(long)]
        color: Option<String>,
    },

    /// Delete a folder. Its notes are kept outside any folder
    Delete { id: String },
}
