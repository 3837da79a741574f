//! Preference command handlers

use anyhow::{bail, Result};

use microlend_core::{AppStores, Theme};

use crate::output::Output;

pub fn show(stores: &AppStores, output: &Output) -> Result<()> {
    output.print_preferences(&stores.preferences.snapshot());
    Ok(())
}

pub fn set(
    stores: &AppStores,
    language: Option<String>,
    theme: Option<Theme>,
    output: &Output,
) -> Result<()> {
    if language.is_none() && theme.is_none() {
        bail!("Nothing to set. Use --language and/or --theme.");
    }

    if let Some(language) = language {
        let language = language.trim().to_lowercase();
        if language.is_empty() {
            bail!("Language must not be empty");
        }
        stores.preferences.set_language(language);
    }
    if let Some(theme) = theme {
        stores.preferences.set_theme(theme);
    }

    output.success("Preferences saved");
    output.print_preferences(&stores.preferences.snapshot());
    Ok(())
}
