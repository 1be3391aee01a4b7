use clap::Parser;
use tenant_stacks::config::lookups::ChainedResolver;
use tenant_stacks::domain::ports::PrefixListResolver;
use tenant_stacks::utils::logger;
use tenant_stacks::{CliConfig, ConfigLoader, LocalStorage, StackError, Synthesizer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting tenant-stacks");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Synthesis failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn run(cli: &CliConfig) -> Result<(), StackError> {
    let target_id = cli.target_id()?;
    let resolved = ConfigLoader::new(&cli.config_dir).resolve(target_id)?;

    let resolver = prefix_list_resolver(&resolved).await;
    let synthesizer = Synthesizer::new(LocalStorage::new(&cli.output_dir));

    if cli.dry_run {
        let output = synthesizer.render(&resolved, resolver.as_ref()).await?;
        println!("{}", output.template.to_json_pretty()?);
        tracing::info!("🧪 Dry run for {}, nothing written", output.manifest.stack_name);
        return Ok(());
    }

    let output = synthesizer.synth(&resolved, resolver.as_ref()).await?;
    println!("✅ Synthesized {}", output.manifest.stack_name);
    println!("📁 Output saved to: {}/{}", cli.output_dir, output.manifest.template_file);
    Ok(())
}

/// The EC2 API when built with `aws`; otherwise only ids pinned in config resolve.
async fn prefix_list_resolver(
    resolved: &tenant_stacks::ResolvedConfig,
) -> Box<dyn PrefixListResolver> {
    #[allow(unused_mut)]
    let mut chain: Vec<Box<dyn PrefixListResolver>> = Vec::new();

    #[cfg(feature = "aws")]
    {
        if let Some(region) = resolved.get("aws.region").and_then(|v| v.as_str()) {
            chain.push(Box::new(
                tenant_stacks::config::lookups::Ec2PrefixListResolver::for_region(region).await,
            ));
        }
    }
    #[cfg(not(feature = "aws"))]
    let _ = resolved;

    Box::new(ChainedResolver::new(chain))
}
