use crate::{
    anthropic::AnthropicConfig, google::GoogleConfig, state::VersionInfo, AppConfig, Result,
};

pub(crate) fn print_info() -> Result<()> {
    let app = AppConfig::from_env()?;
    let versions = VersionInfo::from_env();

    println!("Meal planner {}", versions.version);
    println!("Base URL: {}", app.base_url);
    println!("Scan images: {}", app.scan_image_dir.display());

    let yes_no = |configured: bool| if configured { "configured" } else { "not configured" };
    println!("Photo scanning: {}", yes_no(AnthropicConfig::from_env()?.is_some()));
    println!("Google Calendar: {}", yes_no(GoogleConfig::from_env()?.is_some()));

    Ok(())
}
