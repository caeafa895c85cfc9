use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no net app named {0}")]
    UnknownApp(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Hands a URL to something that can display it.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), LaunchError>;
}

/// Opens URLs in the default browser, or with a configured command.
#[derive(Debug, Clone, Default)]
pub struct SystemOpener {
    command: Option<String>,
}

impl SystemOpener {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    /// Program and arguments of the configured command for `url`; `None`
    /// when no (non-blank) override is set.
    pub fn command_line(&self, url: &str) -> Option<(String, Vec<String>)> {
        let mut parts = self.command.as_deref()?.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        let mut args: Vec<String> = parts.collect();
        args.push(url.to_string());
        Some((program, args))
    }
}

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), LaunchError> {
        let Some((program, args)) = self.command_line(url) else {
            tracing::debug!("Opening {} in the default browser", url);
            return open::that_detached(url).map_err(|source| LaunchError::Spawn {
                program: "default browser".to_string(),
                source,
            });
        };

        tracing::debug!("Running {} {:?}", program, args);
        let mut child = Command::new(&program)
            .args(&args)
            .spawn()
            .map_err(|source| LaunchError::Spawn { program, source })?;

        // Reap off the update loop
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_override_uses_default_browser() {
        assert!(SystemOpener::default().command_line("http://10.0.0.5:8080/").is_none());
    }

    #[test]
    fn test_override_command_line() {
        let opener = SystemOpener::new(Some("firefox --new-tab".to_string()));
        let (program, args) = opener.command_line("http://10.0.0.5:8080/").unwrap();
        assert_eq!(program, "firefox");
        assert_eq!(args, vec!["--new-tab".to_string(), "http://10.0.0.5:8080/".to_string()]);
    }

    #[test]
    fn test_blank_override_uses_default_browser() {
        let opener = SystemOpener::new(Some("   ".to_string()));
        assert!(opener.command_line("http://10.0.0.5:8080/").is_none());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let opener = SystemOpener::new(Some("/nonexistent/netapp-opener".to_string()));
        let err = opener.open("http://10.0.0.5:8080/").unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { program, .. } if program == "/nonexistent/netapp-opener"));
    }
}
