//! Persistent variable management.

use anyhow::{Context, Result};

use promptweave::config::Config;

use super::open_services;

pub(crate) enum VarsCommand {
    List,
    Get(String),
    Set(String, String),
    Reset(String),
    Delete(String),
}

pub(crate) fn cmd_vars(config: &Config, command: VarsCommand) -> Result<()> {
    let services = open_services(config)?;
    let vars = &services.variables;

    match command {
        VarsCommand::List => {
            let all = vars.list();
            if all.is_empty() {
                println!("No persistent variables.");
            }
            for var in all {
                println!("{} = {} (initial: {})", var.name, var.value, var.initial_value);
            }
        }
        VarsCommand::Get(name) => {
            println!("{}", vars.get(&name));
        }
        VarsCommand::Set(name, value) => {
            vars.set(&name, &value)
                .with_context(|| format!("Failed to set {}", name))?;
            println!("Set {}.", name);
        }
        VarsCommand::Reset(name) => {
            match vars
                .reset(&name)
                .with_context(|| format!("Failed to reset {}", name))?
            {
                Some(value) => println!("Reset {} to {:?}.", name, value),
                None => println!("No variable named {}.", name),
            }
        }
        VarsCommand::Delete(name) => {
            if vars
                .delete(&name)
                .with_context(|| format!("Failed to delete {}", name))?
            {
                println!("Deleted {}.", name);
            } else {
                println!("No variable named {}.", name);
            }
        }
    }
    Ok(())
}
