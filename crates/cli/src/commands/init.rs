//! `branchloom init`: First-time setup.

use super::CliResult;
use branchloom_config::AppConfig;

pub async fn run() -> CliResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🌿 Branchloom: Setup");
    println!("=====================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created data directory: {}", config_dir.display());
    } else {
        println!("  Data directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let template_path = config_dir.join("template.json");
    if !template_path.exists() {
        std::fs::write(&template_path, starter_template())?;
        println!("✅ Created starter agent template: {}", template_path.display());
    }

    println!("\n📝 Next steps:");
    println!("   branchloom new --title \"First chat\"");
    println!("   branchloom say <session> \"Hello!\"");
    println!("   branchloom preview <session> --template {}", template_path.display());
    Ok(())
}

/// A minimal template exercising the profile and history placeholders.
fn starter_template() -> String {
    let template = serde_json::json!({
        "id": "starter",
        "name": "Starter",
        "messages": [
            {"id": "main", "role": "system", "content": "You are {{char}}, a helpful assistant talking with {{user}}."},
            {"id": "persona", "role": "system", "kind": "user_profile"},
            {"id": "history", "role": "user", "kind": "chat_history"},
            {
                "id": "reminder",
                "role": "system",
                "content": "Answer concisely.",
                "injection": {"depth": 1}
            }
        ]
    });
    serde_json::to_string_pretty(&template).unwrap_or_default()
}
