use cairn_pool::StoragePool;
use clap::Subcommand;
use std::path::PathBuf;

pub mod item;
pub mod pool;

#[derive(Subcommand)]
pub enum Commands {
    /// Store an item from a file or stdin
    Put {
        /// Item id
        id: String,

        /// Input file; reads stdin when omitted or `-`
        input: Option<PathBuf>,

        /// Tag to attach (repeatable); replaces existing tags when given
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Fail if the item already exists
        #[arg(long, conflicts_with = "append")]
        new: bool,

        /// Append to the item instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// Write an item's data to a file or stdout
    Get {
        /// Item id
        id: String,

        /// Output file; writes stdout when omitted or `-`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List items whose id or tags match a glob pattern
    #[command(visible_alias = "ls")]
    List {
        /// Glob over `Id=<id>` and tags (`*` and `?`)
        #[arg(default_value = "*")]
        pattern: String,

        /// Print items as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an item from every location
    #[command(visible_alias = "rm")]
    Delete {
        /// Item id
        id: String,
    },

    /// Rebuild damaged blocks of an item from parity
    Repair {
        /// Item id
        id: String,
    },

    /// Reconcile every location now
    Sync,

    /// Show configured locations
    Locations,
}

impl Commands {
    pub async fn execute(self, pool: &StoragePool) -> eyre::Result<()> {
        match self {
            Commands::Put {
                id,
                input,
                tags,
                new,
                append,
            } => item::put(pool, &id, input.as_deref(), tags, new, append),
            Commands::Get { id, output } => item::get(pool, &id, output.as_deref()),
            Commands::List { pattern, json } => item::list(pool, &pattern, json),
            Commands::Delete { id } => item::delete(pool, &id),
            Commands::Repair { id } => item::repair(pool, &id),
            Commands::Sync => pool::sync(pool).await,
            Commands::Locations => pool::locations(pool),
        }
    }
}
