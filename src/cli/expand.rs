//! Expand, check and list commands.

use std::path::PathBuf;

use anyhow::{Context, Result};

use promptweave::config::Config;
use promptweave::directives::RegistryCache;
use promptweave::engine::Expander;

use super::{open_services, parse_seed, read_template};

fn registry_cache(config: &Config) -> RegistryCache {
    RegistryCache::new(config.custom_directive_files())
}

pub(crate) async fn cmd_expand(
    config: &Config,
    text: Option<String>,
    file: Option<PathBuf>,
    set: &[String],
    show_context: bool,
) -> Result<()> {
    let template = read_template(text, file).await?;
    let seed = parse_seed(set)?;
    let expander = Expander::new(config, registry_cache(config), open_services(config)?);

    let expansion = expander
        .expand(&template, seed)
        .await
        .with_context(|| "Failed to expand template")?;

    println!("{}", expansion.text);
    if show_context {
        let json = serde_json::to_string_pretty(&expansion.context)?;
        eprintln!("{}", json);
    }
    Ok(())
}

pub(crate) async fn cmd_check(
    config: &Config,
    text: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let template = read_template(text, file).await?;
    let registry = registry_cache(config)
        .current()
        .with_context(|| "Failed to load directive registry")?;

    let found = registry.check_for_directives(&template);
    if found.is_empty() {
        println!("No directives found.");
        return Ok(());
    }
    for def in found {
        println!("{:<24} {}", def.name, def.description);
    }
    Ok(())
}

pub(crate) fn cmd_list(config: &Config) -> Result<()> {
    let registry = registry_cache(config)
        .current()
        .with_context(|| "Failed to load directive registry")?;

    println!("{} directives", registry.len());
    println!();
    for def in registry.iter() {
        println!("{:<24} {}", def.name, def.example);
        if !def.description.is_empty() {
            println!("{:<24} {}", "", def.description);
        }
    }
    Ok(())
}
