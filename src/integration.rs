//! Launcher-shortcut registration for AppImage runs, mirroring what a
//! packaged install gets from its .desktop file.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use tracing::debug;

pub const APP_ID: &str = "steamswap";
const APP_NAME: &str = "SteamSwap";

/// The AppImage path of the current run, when there is one. Set by the
/// AppImage runtime before our process starts.
#[must_use]
pub fn appimage_path() -> Option<PathBuf> {
    std::env::var_os("APPIMAGE").map(PathBuf::from)
}

pub struct DesktopIntegration {
    applications_dir: PathBuf,
    icons_dir: PathBuf,
}

impl DesktopIntegration {
    pub fn from_user_dirs() -> Result<Self> {
        let base = BaseDirs::new().context("Unable to resolve user directories")?;
        let data = base.data_dir();
        Ok(Self::with_dirs(
            data.join("applications"),
            data.join("icons/hicolor/scalable/apps"),
        ))
    }

    pub fn with_dirs(applications_dir: PathBuf, icons_dir: PathBuf) -> Self {
        Self {
            applications_dir,
            icons_dir,
        }
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.desktop_file().is_file()
    }

    /// Copy the icon asset (when the mounted image carries one) and write
    /// the launcher descriptor pointing at `appimage`.
    pub fn install(&self, appimage: &Path) -> Result<()> {
        if let Some(icon) = find_icon_asset() {
            self.install_icon(&icon)?;
        } else {
            debug!("no icon asset found; the launcher entry falls back to the theme");
        }

        fs::create_dir_all(&self.applications_dir).with_context(|| {
            format!("Creating {}", self.applications_dir.display())
        })?;
        let target = self.desktop_file();
        fs::write(&target, render_desktop_entry(appimage))
            .with_context(|| format!("Writing {}", target.display()))?;

        let mut permissions = fs::metadata(&target)
            .with_context(|| format!("Reading metadata of {}", target.display()))?
            .permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&target, permissions)
            .with_context(|| format!("Marking {} executable", target.display()))?;
        Ok(())
    }

    fn desktop_file(&self) -> PathBuf {
        self.applications_dir.join(format!("{APP_ID}.desktop"))
    }

    fn install_icon(&self, icon: &Path) -> Result<()> {
        fs::create_dir_all(&self.icons_dir)
            .with_context(|| format!("Creating {}", self.icons_dir.display()))?;
        let target = self.icons_dir.join(format!("{APP_ID}.svg"));
        fs::copy(icon, &target)
            .with_context(|| format!("Copying icon to {}", target.display()))?;
        Ok(())
    }
}

/// The icon shipped inside the mounted AppImage, probed at the places the
/// packaging puts it.
fn find_icon_asset() -> Option<PathBuf> {
    let appdir = std::env::var_os("APPDIR").map(PathBuf::from)?;
    [
        appdir.join(format!("{APP_ID}.svg")),
        appdir.join(format!(
            "usr/share/icons/hicolor/scalable/apps/{APP_ID}.svg"
        )),
    ]
    .into_iter()
    .find(|path| path.is_file())
}

fn render_desktop_entry(appimage: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={APP_NAME}\n\
         Comment=Switch the active Steam account\n\
         Exec=\"{}\"\n\
         Icon={APP_ID}\n\
         Categories=Game;Utility;\n\
         Terminal=false\n\
         StartupWMClass={APP_ID}\n",
        appimage.display()
    )
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn desktop_entry_points_at_the_appimage() {
        let entry = render_desktop_entry(Path::new("/opt/SteamSwap.AppImage"));
        assert!(entry.starts_with("[Desktop Entry]\n"));
        assert!(entry.contains("Exec=\"/opt/SteamSwap.AppImage\"\n"));
        assert!(entry.contains("Name=SteamSwap\n"));
    }

    #[test]
    fn install_writes_an_executable_launcher_entry() -> Result<()> {
        let dir = TempDir::new()?;
        let integration = DesktopIntegration::with_dirs(
            dir.path().join("applications"),
            dir.path().join("icons/hicolor/scalable/apps"),
        );
        assert!(!integration.is_installed());

        integration.install(Path::new("/opt/SteamSwap.AppImage"))?;
        assert!(integration.is_installed());

        let target = dir.path().join("applications/steamswap.desktop");
        let mode = fs::metadata(&target)?.permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
        assert!(fs::read_to_string(&target)?.contains("Exec=\"/opt/SteamSwap.AppImage\""));
        Ok(())
    }
}
