//! `branchloom config`: Configuration checks.

use super::CliResult;
use branchloom_config::{AppConfig, CompressionStrategy};

pub async fn validate() -> CliResult {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            let limiter = &config.context.limiter;
            if config.store.backend == "memory" {
                warnings.push("Memory store keeps nothing between runs".to_string());
            }
            if limiter.enabled && limiter.protect_recent_count >= limiter.min_history_count {
                warnings.push(format!(
                    "protect_recent_count ({}) >= min_history_count ({}): compression only starts above protect_recent_count",
                    limiter.protect_recent_count, limiter.min_history_count
                ));
            }
            if limiter.enabled && limiter.strategy == CompressionStrategy::Summarize {
                warnings.push(
                    "Summarize strategy needs a summarizer; the CLI preview truncates instead"
                        .to_string(),
                );
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Store:     {} ({})", config.store.backend, config.store_path().display());
            println!(
                "   Limiter:   {}",
                if limiter.enabled {
                    format!("{:?} / {:?}", limiter.mode, limiter.strategy)
                } else {
                    "disabled".to_string()
                }
            );
            println!("   Logging:   {}{}", config.logging.level, if config.logging.json { " (json)" } else { "" });
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}
