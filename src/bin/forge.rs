//! Blueprint Forge command line
//!
//! Masters blueprints declared in TOML, runs tag queries against a class
//! family and rolls dice expressions.

use std::path::{Path, PathBuf};

use blueprint_forge::blueprints::{dice, BlueprintCollection, ClassLibrary, Value};
use blueprint_forge::core::error::Result;
use blueprint_forge::core::{ForgeConfig, Seed};
use blueprint_forge::tags::{Selector, TagQuery, Tagged};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(about = "Master declarative blueprints and query them by tag")]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Master a class and print the result as JSON
    Master {
        /// Library file or directory of .toml files
        library: PathBuf,
        /// Class to master
        class: String,
        /// Seed; integers and strings are both accepted
        #[arg(long)]
        seed: Option<String>,
        /// Number of instances, seeded "<seed>0", "<seed>1", ...
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// List the classes of a family matching a tag query
    Query {
        library: PathBuf,
        /// Any class of the family to search
        family: String,
        #[command(flatten)]
        tags: TagArgs,
    },
    /// Pick the best matching class of a family, rotating among ties
    Select {
        library: PathBuf,
        family: String,
        #[command(flatten)]
        tags: TagArgs,
        #[arg(long, default_value_t = 1)]
        times: usize,
    },
    /// Roll a dice expression such as "3d6+2"
    Roll {
        expr: String,
        #[arg(long)]
        seed: Option<String>,
    },
}

#[derive(Args, Debug)]
struct TagArgs {
    /// Required tags (space separated)
    #[arg(long = "with", default_value = "")]
    with_tags: String,
    /// Optional tags that raise a candidate's rank
    #[arg(long = "or", default_value = "")]
    or_tags: String,
    /// Excluded tags
    #[arg(long = "not", default_value = "")]
    not_tags: String,
}

impl TagArgs {
    fn selector(&self) -> Selector {
        Selector::new()
            .require(&self.with_tags)
            .prefer(&self.or_tags)
            .exclude(&self.not_tags)
    }
}

fn parse_seed(text: &str) -> Seed {
    text.parse::<u64>()
        .map(Seed::Int)
        .unwrap_or_else(|_| Seed::Text(text.to_string()))
}

fn load_library(path: &Path, config: &ForgeConfig) -> Result<ClassLibrary> {
    let mut library = ClassLibrary::with_config(config.clone());
    if path.is_dir() {
        library.load_directory(path)?;
    } else {
        library.load_file(path)?;
    }
    Ok(library)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blueprint_forge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ForgeConfig::load(path)?,
        None => ForgeConfig::default(),
    };
    let default_seed = |seed: &Option<String>| {
        seed.as_deref()
            .map(parse_seed)
            .or_else(|| config.default_seed.clone())
            .unwrap_or_else(Seed::fresh)
    };

    match cli.command {
        Command::Master {
            library,
            class,
            seed,
            count,
        } => {
            let library = load_library(&library, &config)?;
            let seed = default_seed(&seed);
            if count == 1 {
                let bp = library.master(&class, Some(seed))?;
                println!("{}", serde_json::to_string_pretty(&bp)?);
            } else {
                let collection =
                    BlueprintCollection::new(library.require(&class)?, seed.to_string())
                        .config(&config);
                let items = collection.par_range(0..count)?;
                println!("{}", serde_json::to_string_pretty(&items)?);
            }
        }
        Command::Query {
            library,
            family,
            tags,
        } => {
            let library = load_library(&library, &config)?;
            let selector = tags.selector();
            for class in library.family(&family)?.query(&selector) {
                let tags: Vec<String> = class.tags().into_iter().collect();
                println!("{}\t{}", class.name(), tags.join(" "));
            }
        }
        Command::Select {
            library,
            family,
            tags,
            times,
        } => {
            let library = load_library(&library, &config)?;
            let repo = library.family(&family)?;
            let selector = tags.selector();
            for _ in 0..times {
                println!("{}", repo.select(&selector)?.name());
            }
        }
        Command::Roll { expr, seed } => {
            let mut rng = default_seed(&seed).rng();
            let value = dice::roll(&expr, &mut rng)?;
            match &value {
                Value::Rolls(rolls) => println!("{} {:?}", value, rolls),
                other => println!("{}", other),
            }
        }
    }
    Ok(())
}
