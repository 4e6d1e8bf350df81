use clap::Subcommand;

use meetslot_core::EngineConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Reset the stored configuration to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = EngineConfig::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Reset => {
            let config = EngineConfig::default();
            config.save()?;
            println!("configuration reset to defaults");
        }
    }
    Ok(())
}
