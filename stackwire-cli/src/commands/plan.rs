//! `stackwire plan` command

use anyhow::Result;
use colored::Colorize;
use stackwire_core::{stacks, Config, Deployer};

/// Print the resolved order plus any registry contracts that cannot hold.
pub fn plan(config: &Config, environment: &str, target: Option<&str>) -> Result<()> {
    let deployer = Deployer::new(stacks::builtin(config, environment)?)?;
    let resolver = deployer.resolver();

    let order = match target {
        Some(target) => resolver.plan_for(target)?,
        None => resolver.order()?,
    };

    for (i, stack) in order.iter().enumerate() {
        println!("{:>2}. {:<16} {}", i + 1, stack.name.bold(), stack.region);
        for dependency in &stack.consumes {
            let policy = if dependency.is_hard() { "hard".red() } else { "soft".yellow() };
            println!("      reads  {} ({})", dependency.key, policy);
        }
        for key in &stack.produces {
            println!("      writes {}", key);
        }
    }

    let unsatisfied = resolver.unsatisfied_contracts();
    let hazards = resolver.ordering_hazards();

    if unsatisfied.is_empty() && hazards.is_empty() {
        println!("{} All registry reads have an upstream producer", "✓".green().bold());
        return Ok(());
    }

    for contract in unsatisfied {
        println!(
            "{} {} reads {} but no stack writes it",
            "!".yellow().bold(),
            contract.stack,
            contract.key
        );
    }
    for hazard in hazards {
        println!(
            "{} {} requires {} from {}, which is not one of its dependencies",
            "!".red().bold(),
            hazard.stack,
            hazard.key,
            hazard.producer
        );
    }

    Ok(())
}
