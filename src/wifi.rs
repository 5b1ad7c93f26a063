//! Render the WiFi interfaces template so the board joins the camera's
//! network on boot.
//!
//! The template carries `%WIFI_SSID%` / `%WIFI_PASSWD%` placeholders; the
//! rendered file replaces the system interfaces file wholesale.

use std::path::Path;

use log::info;

use crate::config::RigConfig;
use crate::error::{Result, RigError};

const GENERATED_BANNER: &str =
    "# This is a generated file. Do not edit directly; edit the interfaces template instead.\n\n";

/// Render `template` with `substitutions` and write the result to `interfaces`.
///
/// Every placeholder must occur in the template; a missing one is an error
/// naming the placeholder and the template file.
pub async fn apply_template(
    interfaces:    &Path,
    template:      &Path,
    substitutions: &[(&str, &str)],
) -> Result<()> {
    let template_text = tokio::fs::read_to_string(template)
        .await
        .map_err(|e| RigError::Template(format!("cannot read {}: {e}", template.display())))?;

    let rendered = render(&template_text, substitutions)
        .map_err(|missing| {
            RigError::Template(format!(
                "placeholder '{missing}' does not exist in {}",
                template.display()
            ))
        })?;

    tokio::fs::write(interfaces, rendered.as_bytes()).await?;
    info!("wrote {} from template {}", interfaces.display(), template.display());
    Ok(())
}

/// Apply the camera network credentials from the configuration.
pub async fn apply_camera_network(cfg: &RigConfig) -> Result<()> {
    apply_template(
        &cfg.wifi_interfaces,
        &cfg.wifi_template,
        &[
            ("%WIFI_SSID%",   cfg.camera_ssid.as_str()),
            ("%WIFI_PASSWD%", cfg.camera_psk.as_str()),
        ],
    )
    .await
}

/// Substitute placeholders into the template text and prepend the banner.
/// Returns the first missing placeholder on failure.
fn render<'a>(template: &str, substitutions: &[(&'a str, &str)]) -> std::result::Result<String, &'a str> {
    let mut out = template.to_string();
    for &(placeholder, value) in substitutions {
        if !out.contains(placeholder) {
            return Err(placeholder);
        }
        out = out.replace(placeholder, value);
    }
    Ok(format!("{GENERATED_BANNER}{out}"))
}
