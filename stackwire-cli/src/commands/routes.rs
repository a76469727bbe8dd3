//! `stackwire routes` command

use anyhow::Result;
use colored::Colorize;
use stackwire_core::stacks::{edge, EdgeStack};
use stackwire_core::{registry, Config, Consumer};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "BACKEND")]
    backend: String,
    #[tabled(rename = "CACHE")]
    cache: String,
    #[tabled(rename = "METHODS")]
    methods: String,
    #[tabled(rename = "VIEWER")]
    viewer: String,
}

/// Show the routing table the edge stack would deploy right now.
pub async fn routes(config: &Config, environment: &str) -> Result<()> {
    let registry = registry::open(config, environment).await?;
    let composer = EdgeStack::new(config, environment).composer();
    let table = composer.compose(&Consumer::new(edge::NAME, registry)).await?;

    let rows: Vec<RuleRow> = table
        .rules()
        .iter()
        .map(|rule| RuleRow {
            path: rule.path_pattern.clone(),
            backend: rule.backend_address.clone(),
            cache: rule.cache_policy.to_string(),
            methods: rule.allowed_methods.to_string(),
            viewer: rule.viewer_protocol.to_string(),
        })
        .collect();

    let mut output = Table::new(rows);
    output.with(Style::modern());
    println!("{}", output);

    for candidate in composer.declared() {
        if table.rule_for(&candidate.path_pattern).is_none() {
            println!(
                "{} {} not routed: {} is not published",
                "-".dimmed(),
                candidate.path_pattern,
                candidate.address_key
            );
        }
    }

    Ok(())
}
