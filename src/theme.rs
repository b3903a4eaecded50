use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Unset follows the browser preference; toggling from it picks dark.
    pub fn toggled(current: Option<Self>) -> Self {
        match current {
            Some(Self::Dark) => Self::Light,
            Some(Self::Light) | None => Self::Dark,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(rename = "tracker-theme", default)]
    theme: Option<Theme>,
}

pub async fn load_theme(path: &Path) -> Option<Theme> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<Preferences>(&bytes) {
            Ok(prefs) => prefs.theme,
            Err(err) => {
                error!("failed to parse preferences file: {err}");
                None
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            error!("failed to read preferences file: {err}");
            None
        }
    }
}

pub async fn persist_theme(path: &Path, theme: Theme) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let prefs = Preferences { theme: Some(theme) };
    let payload = serde_json::to_vec_pretty(&prefs)?;
    fs::write(path, payload).await
}
