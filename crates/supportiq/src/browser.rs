//! Hands the authorization URL to the desktop browser.

use supportiq_auth::{Navigator, Result};

/// Opens the system browser, always printing the URL as a fallback.
///
/// With `json_output` the URL banner goes to stderr so stdout stays
/// machine-readable.
#[derive(Debug, Default)]
pub struct BrowserNavigator {
    /// Only print the URL; never launch a browser.
    pub print_only: bool,
    /// Keep human-readable text off stdout.
    pub json_output: bool,
}

impl BrowserNavigator {
    fn say(&self, line: &str) {
        if self.json_output {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &str) -> Result<()> {
        self.say("Open this URL in your browser to sign in:");
        self.say("");
        self.say(&format!("  {}", url));
        self.say("");

        if self.print_only {
            return Ok(());
        }

        // Try to open the browser automatically
        if let Err(e) = open_url(url) {
            tracing::debug!(error = %e, "Could not launch browser");
            self.say("(Could not open browser automatically)");
            self.say("");
        }
        Ok(())
    }
}

/// Try to open a URL in the default browser.
fn open_url(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).status()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).status()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .status()?;
    }
    Ok(())
}
