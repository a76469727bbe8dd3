//! `stackwire deploy` command

use anyhow::Result;
use colored::Colorize;
use stackwire_core::{
    registry, stacks, Config, DeployContext, DeployReport, Deployer, SimulatedProvisioner,
};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "STACK")]
    stack: String,
    #[tabled(rename = "REGION")]
    region: String,
    #[tabled(rename = "PUBLISHED")]
    published: usize,
    #[tabled(rename = "FAILED")]
    failed: usize,
    #[tabled(rename = "IMPORTED")]
    imported: String,
    #[tabled(rename = "UNAVAILABLE")]
    unavailable: String,
    #[tabled(rename = "TIME")]
    time: String,
}

/// Deploy `target` and its dependencies, or every stack.
pub async fn deploy(config: Config, environment: &str, target: Option<&str>) -> Result<()> {
    let config = Arc::new(config);
    let registry = registry::open(&config, environment).await?;
    let provisioner = Arc::new(SimulatedProvisioner::new());
    let ctx = DeployContext::new(environment, config.clone(), registry, provisioner.clone());

    let deployer = Deployer::new(stacks::builtin(&config, environment)?)?;
    let plan = deployer.plan(target)?;
    println!("Deploying to {}: {}", environment.bold(), plan.join(" -> "));

    let report = match deployer.deploy(target, &ctx).await {
        Ok(report) => report,
        Err(e) => {
            println!("{} Deployment failed: {}", "✗".red().bold(), e);
            return Err(e.into());
        }
    };

    print_report(&report);

    if let Some(routes) = provisioner.last_routing_table() {
        let patterns: Vec<&str> = routes.rules().iter().map(|r| r.path_pattern.as_str()).collect();
        println!("Edge routes: {}", patterns.join(", "));
    }
    Ok(())
}

fn print_report(report: &DeployReport) {
    let rows: Vec<StepRow> = report
        .steps
        .iter()
        .map(|step| StepRow {
            stack: step.name.clone(),
            region: step.region.clone(),
            published: step.outcome.published.len(),
            failed: step.outcome.publish_failures.len(),
            imported: if step.outcome.imported.is_empty() {
                "-".to_string()
            } else {
                step.outcome.imported.iter().map(|h| h.id()).collect::<Vec<_>>().join(", ")
            },
            unavailable: if step.outcome.unavailable.is_empty() {
                "-".to_string()
            } else {
                step.outcome
                    .unavailable
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            },
            time: format!("{:.1}s", step.duration.as_secs_f64()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{}", table);

    for step in &report.steps {
        for key in &step.outcome.publish_failures {
            println!("{} {}: failed to publish {}", "!".yellow().bold(), step.name, key);
        }
        for note in &step.outcome.notes {
            println!("  {} {}", format!("{}:", step.name).cyan(), note);
        }
    }

    if report.publish_failures() == 0 {
        println!("{} Environment {} deployed", "✓".green().bold(), report.environment.bold());
    } else {
        println!(
            "{} Environment {} deployed with {} unpublished output(s); consumers will not see them",
            "!".yellow().bold(),
            report.environment.bold(),
            report.publish_failures()
        );
    }
}
