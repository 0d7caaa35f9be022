/// Delivery backend for the fan-out reporter
///
/// The backend is an optional capability: the reporting core receives an
/// `Option<Arc<dyn DeliveryBackend>>` and treats `None` as a normal,
/// recoverable state. `AppriseCli` is the concrete backend, driving the
/// `apprise` command line tool.
use crate::config::Format;
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;

const APPRISE_PROGRAM: &str = "apprise";

/// Body format understood by the delivery backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyFormat {
    Text,
    Markdown,
    Html,
}

impl NotifyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyFormat::Text => "text",
            NotifyFormat::Markdown => "markdown",
            NotifyFormat::Html => "html",
        }
    }
}

impl From<Format> for NotifyFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => NotifyFormat::Text,
            Format::Markdown => NotifyFormat::Markdown,
            Format::Html => NotifyFormat::Html,
        }
    }
}

/// A registered notification destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A service URL such as `discord://webhook_id/token`.
    Url(String),
    /// A URL pointing at a configuration file listing more service URLs.
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub format: NotifyFormat,
}

/// Creates notification clients.
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryBackend: Send + Sync {
    fn create_client(&self) -> Box<dyn NotifyClient>;
}

/// One notification session: collect targets, then send.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifyClient: Send + Sync {
    fn add(&mut self, target: Target);

    /// Sends to every registered target. `false` when delivery failed.
    async fn notify(&self, notification: &Notification) -> bool;
}

/// Backend driving the `apprise` executable.
#[derive(Debug, Clone)]
pub struct AppriseCli {
    program: PathBuf,
}

impl AppriseCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locates the executable: `program` when it is a path, otherwise the
    /// named program (default `apprise`) is looked up on `PATH`.
    pub fn detect(program: Option<&Path>) -> Option<Self> {
        let program = program.unwrap_or(Path::new(APPRISE_PROGRAM));
        if program.components().count() > 1 {
            return program.is_file().then(|| Self::new(program));
        }

        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
            .map(Self::new)
    }
}

impl DeliveryBackend for AppriseCli {
    fn create_client(&self) -> Box<dyn NotifyClient> {
        Box::new(AppriseCliClient {
            program: self.program.clone(),
            targets: Vec::new(),
        })
    }
}

struct AppriseCliClient {
    program: PathBuf,
    targets: Vec<Target>,
}

impl AppriseCliClient {
    fn command(&self, notification: &Notification) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--title")
            .arg(&notification.title)
            .arg("--body")
            .arg(&notification.body)
            .arg("--input-format")
            .arg(notification.format.as_str());
        for target in &self.targets {
            if let Target::Config(url) = target {
                command.arg("--config").arg(url);
            }
        }
        for target in &self.targets {
            if let Target::Url(url) = target {
                command.arg(url);
            }
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }
}

#[async_trait]
impl NotifyClient for AppriseCliClient {
    fn add(&mut self, target: Target) {
        self.targets.push(target);
    }

    async fn notify(&self, notification: &Notification) -> bool {
        match self.command(notification).output().await {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                tracing::warn!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                tracing::warn!("Failed to run {}: {}", self.program.display(), e);
                false
            }
        }
    }
}
