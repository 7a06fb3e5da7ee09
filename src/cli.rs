use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "keybox",
    author,
    version,
    about = "An offline secret store: one encrypted file of site/user/password records.",
    long_about = "keybox keeps site/user/password records in a single encrypted file on disk. \
There is no network access, no daemon, and no cloud sync: every command opens the file, \
does one thing, and writes it back."
)]
pub struct Cli {
    /// Path to the keybox file. Overrides KEYBOX_FILE and the config file.
    #[arg(short = 'p', long, global = true)]
    pub path: Option<std::path::PathBuf>,

    /// Emit machine-readable JSON instead of text tables.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Create a new, empty keybox file.")]
    Init,

    #[command(about = "Add a new record.")]
    Add(AddArgs),

    #[command(about = "Show one record by index.")]
    Get(GetArgs),

    #[command(about = "Edit fields on an existing record.")]
    Edit(EditArgs),

    #[command(about = "Delete a record.")]
    Rm(RmArgs),

    #[command(about = "List all records.")]
    List,

    #[command(about = "Search records by a substring or column:value query.")]
    Find(FindArgs),

    #[command(about = "Import records from a file or stdin.")]
    Import(ImportArgs),

    #[command(about = "Export records to a file or stdout.")]
    Export(ExportArgs),

    #[command(about = "Change the master passphrase.")]
    Passwd,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub site: Option<String>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub tags: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
    /// Password value. Prompted for (with confirmation) if omitted.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    pub index: usize,
    /// Decrypt and print the password too.
    #[arg(long)]
    pub reveal: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    pub index: usize,
    #[arg(long)]
    pub site: Option<String>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub tags: Option<String>,
    #[arg(long)]
    pub note: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct RmArgs {
    pub index: usize,
}

#[derive(Debug, Args)]
pub struct FindArgs {
    pub query: String,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub format: ImportFormatArgs,
    /// Read from this path instead of stdin.
    #[arg(short = 'i', long)]
    pub input: Option<std::path::PathBuf>,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct ImportFormatArgs {
    #[arg(long)]
    pub plain: bool,
    #[arg(long)]
    pub json: bool,
    /// Import another keybox file's decrypted table (prompts for its passphrase).
    #[arg(long)]
    pub keybox: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub format: ExportFormatArgs,
    /// Write to this path instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<std::path::PathBuf>,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct ExportFormatArgs {
    #[arg(long)]
    pub plain: bool,
    #[arg(long)]
    pub json: bool,
}
