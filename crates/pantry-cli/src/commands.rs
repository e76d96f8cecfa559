use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{json, Value};

use pantry_catalog::{
    CatalogService, DeleteObjectRequest, DeleteRecipeRequest, SaveRecipeRequest, UpsertOutcome,
};
use pantry_server::{PantryServer, ServerConfig, StoreBackend};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        command => {
            if config.store.backend == StoreBackend::Memory {
                tracing::warn!("in-memory store configured; changes made by this command are discarded");
            }
            let store = config.store.open().await?;
            let catalog = CatalogService::new(store, &config.catalog_config());
            run_catalog_command(&catalog, command, &cli.format).await
        }
    }
}

async fn run_catalog_command(
    catalog: &CatalogService,
    command: Command,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    match command {
        Command::Save(args) => cmd_save(catalog, args, format).await,
        Command::Delete(args) => cmd_delete(catalog, args, format).await,
        Command::DeleteObject(args) => cmd_delete_object(catalog, args, format).await,
        Command::Index => cmd_index(catalog, format).await,
        Command::Show(args) => cmd_show(catalog, args).await,
        Command::Serve(_) => bail!("serve does not operate on the catalog"),
    }
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;
    }
    if let Some(root) = args.root {
        config.store.root = root;
    }
    config.serve_static |= args.serve_static;

    println!("Pantry server on {} (store: {})", config.bind_addr.to_string().bold(), config.store.root.display());
    PantryServer::new(config).serve().await?;
    Ok(())
}

async fn cmd_save(catalog: &CatalogService, args: SaveArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let recipe_json = read_json_file(&args.recipe)?;
    let index_patch = match &args.patch {
        Some(path) => read_json_file(path)?,
        None => json!({}),
    };
    let saved = catalog
        .save_recipe(SaveRecipeRequest {
            recipe_json,
            index_patch,
        })
        .await?;

    match format {
        OutputFormat::Json => println!("{}", json!({ "ok": true, "id": saved.id.as_str() })),
        OutputFormat::Text => {
            let (verb, position) = match saved.index {
                UpsertOutcome::Inserted { position } => ("added at", position),
                UpsertOutcome::Replaced { position } => ("updated at", position),
            };
            println!("{} Saved recipe {}", "✓".green().bold(), saved.id.as_str().yellow());
            println!("  Index entry {verb} position {position}");
        }
    }
    Ok(())
}

async fn cmd_delete(catalog: &CatalogService, args: DeleteArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let (id, report) = catalog
        .delete_recipe(&DeleteRecipeRequest {
            id: args.id,
            delete_images: args.images,
        })
        .await?;

    match format {
        OutputFormat::Json => println!("{}", json!({ "ok": true, "id": id.as_str() })),
        OutputFormat::Text => {
            println!("{} Deleted recipe {}", "✓".green().bold(), id.as_str().yellow());
            println!("  Index entries removed: {}", report.index_entries_removed);
            if let Some(purge) = report.purge {
                println!("  Images purged: {} in {} batches", purge.deleted, purge.batches);
            }
        }
    }
    Ok(())
}

async fn cmd_delete_object(
    catalog: &CatalogService,
    args: DeleteObjectArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let request = DeleteObjectRequest { key: args.key };
    catalog.delete_object(&request).await?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "ok": true, "key": request.key })),
        OutputFormat::Text => println!("{} Deleted {}", "✓".green().bold(), request.key.blue()),
    }
    Ok(())
}

async fn cmd_index(catalog: &CatalogService, format: &OutputFormat) -> anyhow::Result<()> {
    let index = catalog.index().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&index)?),
        OutputFormat::Text if index.is_empty() => println!("Catalog is empty."),
        OutputFormat::Text => {
            for entry in index.entries() {
                let id = entry.get("id").and_then(Value::as_str).unwrap_or("<no id>");
                let title = entry.get("title").and_then(Value::as_str).unwrap_or("");
                println!("{}  {}", id.yellow(), title);
            }
            println!("{} recipes", index.len().to_string().bold());
        }
    }
    Ok(())
}

async fn cmd_show(catalog: &CatalogService, args: ShowArgs) -> anyhow::Result<()> {
    match catalog.recipe(&args.id).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => bail!("no recipe with id {}", args.id),
    }
    Ok(())
}

fn read_json_file(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pantry_catalog::CatalogConfig;
    use pantry_store::FsBlobStore;

    async fn catalog(dir: &Path) -> CatalogService {
        let store = FsBlobStore::open(dir.join("site")).await.unwrap();
        CatalogService::new(Arc::new(store), &CatalogConfig::default())
    }

    fn write(dir: &Path, name: &str, value: Value) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn save_index_show_delete() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog(dir.path()).await;
        let recipe = write(dir.path(), "r1.json", json!({"id": "r1", "steps": ["boil"]}));
        let patch = write(dir.path(), "entry.json", json!({"id": "r1", "title": "Soup"}));

        cmd_save(&catalog, SaveArgs { recipe, patch: Some(patch) }, &OutputFormat::Text)
            .await
            .unwrap();
        cmd_index(&catalog, &OutputFormat::Json).await.unwrap();
        cmd_show(&catalog, ShowArgs { id: "r1".into() }).await.unwrap();
        assert!(dir.path().join("site/data/recipes/r1.json").exists());

        cmd_delete(&catalog, DeleteArgs { id: "r1".into(), images: true }, &OutputFormat::Text)
            .await
            .unwrap();
        assert!(!dir.path().join("site/data/recipes/r1.json").exists());
        assert!(catalog.index().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn show_unknown_recipe_fails() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog(dir.path()).await;
        let err = cmd_show(&catalog, ShowArgs { id: "ghost".into() }).await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn unreadable_recipe_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog(dir.path()).await;
        let recipe = dir.path().join("missing.json");
        let err = cmd_save(&catalog, SaveArgs { recipe, patch: None }, &OutputFormat::Text)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }

    #[tokio::test]
    async fn delete_object_outside_prefixes_fails() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog(dir.path()).await;
        let args = DeleteObjectArgs { key: "secrets/config.json".into() };
        assert!(cmd_delete_object(&catalog, args, &OutputFormat::Text).await.is_err());
    }
}
