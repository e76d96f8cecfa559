use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pantry",
    about = "Pantry: recipe catalog API and maintenance tool",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Save a recipe record and update its index entry
    Save(SaveArgs),
    /// Delete a recipe, its index entry and optionally its images
    Delete(DeleteArgs),
    /// Delete a single object under the recipe namespaces
    DeleteObject(DeleteObjectArgs),
    /// List the catalog index
    Index,
    /// Print a stored recipe record
    Show(ShowArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the bind address
    #[arg(long)]
    pub bind: Option<String>,
    /// Override the filesystem store root
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Serve the store root as a static site
    #[arg(long = "static")]
    pub serve_static: bool,
}

#[derive(Args)]
pub struct SaveArgs {
    /// Recipe record (JSON file)
    pub recipe: PathBuf,
    /// Index entry (JSON file); defaults to just the recipe id
    #[arg(short, long)]
    pub patch: Option<PathBuf>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: String,
    /// Also purge images/recipes/<id>/
    #[arg(short, long)]
    pub images: bool,
}

#[derive(Args)]
pub struct DeleteObjectArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["pantry", "serve", "--bind", "0.0.0.0:8080", "--static"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind.as_deref(), Some("0.0.0.0:8080"));
            assert!(args.serve_static);
            assert!(args.root.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_save_with_patch() {
        let cli = Cli::try_parse_from(["pantry", "save", "r1.json", "-p", "entry.json"]).unwrap();
        if let Command::Save(args) = cli.command {
            assert_eq!(args.recipe, PathBuf::from("r1.json"));
            assert_eq!(args.patch, Some(PathBuf::from("entry.json")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_delete_with_images() {
        let cli = Cli::try_parse_from(["pantry", "delete", "r1", "--images"]).unwrap();
        if let Command::Delete(args) = cli.command {
            assert_eq!(args.id, "r1");
            assert!(args.images);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_delete_object() {
        let cli = Cli::try_parse_from(["pantry", "delete-object", "images/recipes/r1/a.jpg"]).unwrap();
        assert!(matches!(cli.command, Command::DeleteObject(_)));
    }

    #[test]
    fn parse_index() {
        let cli = Cli::try_parse_from(["pantry", "index"]).unwrap();
        assert!(matches!(cli.command, Command::Index));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["pantry", "--config", "pantry.toml", "-v", "--format", "json", "index"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("pantry.toml")));
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
