//! Mail notifier that shells out to the first available mail program

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::io::CommandRunner;
use crate::notifier::{Notification, Notifier};
use crate::LogwatchError;

/// Pipes alerts to `mail`-compatible programs, trying candidates in order
pub struct MailNotifier {
    recipients: Vec<String>,
    programs: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for MailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailNotifier")
            .field("recipients", &self.recipients)
            .field("programs", &self.programs)
            .finish()
    }
}

/// sendmail reads headers from stdin; mail/mailx take them as arguments
fn is_sendmail(program: &str) -> bool {
    Path::new(program)
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with("sendmail"))
}

impl MailNotifier {
    pub fn new(
        recipients: Vec<String>,
        programs: Vec<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            recipients,
            programs,
            runner,
        }
    }

    fn invocation(&self, program: &str, notification: &Notification) -> (Vec<String>, String) {
        if is_sendmail(program) {
            let stdin = format!(
                "To: {}\nSubject: {}\n\n{}\n",
                self.recipients.join(", "),
                notification.title,
                notification.message
            );
            (vec!["-t".to_string()], stdin)
        } else {
            let mut args = vec!["-s".to_string(), notification.title.clone()];
            args.extend(self.recipients.iter().cloned());
            (args, format!("{}\n", notification.message))
        }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    fn type_name(&self) -> &str {
        "mail"
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        for program in &self.programs {
            let (args, stdin) = self.invocation(program, notification);
            match self.runner.run_with_stdin(program, &args, &stdin).await {
                Ok(output) if output.success => {
                    tracing::debug!("Mail sent via '{}'", program);
                    return Ok(());
                }
                Ok(output) => {
                    return Err(LogwatchError::NotificationFailed(format!(
                        "'{}' exited with {:?}: {}",
                        program, output.code, output.stderr
                    )));
                }
                Err(LogwatchError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("Mail program '{}' not installed, trying next", program);
                }
                Err(e) => return Err(e),
            }
        }

        Err(LogwatchError::NotificationFailed(format!(
            "no mail program available (tried {})",
            self.programs.join(", ")
        )))
    }
}
