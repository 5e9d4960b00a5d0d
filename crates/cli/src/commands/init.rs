//! `docbot init`: first-time setup.

use std::path::Path;

use docbot_config::AppConfig;

pub async fn run(path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => AppConfig::config_path(),
    };

    println!("Docbot setup");
    println!("============\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("  Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    if config_path.exists() && !force {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  Wrote config.toml at: {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. export OPENAI_API_KEY='sk-...'");
    println!("  2. export PINECONE_API_KEY='...'  (or configure an OpenSearch backend)");
    println!("  3. Set vector_store.index_name in {}", config_path.display());
    println!("  4. Run: docbot chat\n");
    Ok(())
}
